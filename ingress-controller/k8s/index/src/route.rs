use crate::{annotations::RouteAnnotations, proto::ProtocolOptions};
use ngress_controller_k8s_api::{path_type, HTTPIngressPath, ResourceId};
use std::fmt::{self, Write};

/// A resolved path rule within a host.
///
/// Routes are immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    path: String,
    path_match: PathMatch,
    destination: Destination,

    /// The ingress that created this route.
    owner: ResourceId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathMatch {
    Exact,
    Prefix,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Service {
        name: String,
        namespace: String,
        port: u16,
    },
    UnixSocket(String),
    StaticSite(String),
}

// === impl Route ===

impl Route {
    pub fn new(
        path: impl Into<String>,
        path_match: PathMatch,
        destination: Destination,
        owner: ResourceId,
    ) -> Self {
        Self {
            path: path.into(),
            path_match,
            destination,
            owner,
        }
    }

    /// Resolves an ingress path rule. Static sites take precedence over unix
    /// sockets, which take precedence over the service backend; the former two
    /// only apply when the backend port is referenced by name.
    ///
    /// Returns `None` if the rule does not reference a service backend.
    pub fn from_ingress_path(
        owner: &ResourceId,
        rule: &HTTPIngressPath,
        annotations: &RouteAnnotations,
    ) -> Option<Self> {
        let path = rule.path.clone().unwrap_or_else(|| "/".to_string());
        let service = match rule.backend.service.as_ref() {
            Some(service) => service,
            None => {
                tracing::warn!(ingress = %owner, %path, "Only service backends are supported, route skipped");
                return None;
            }
        };

        let port_name = service.port.as_ref().and_then(|p| p.name.as_deref());
        let destination = port_name
            .and_then(|name| {
                annotations
                    .static_site_for(name)
                    .map(|p| Destination::StaticSite(p.to_string()))
                    .or_else(|| {
                        annotations
                            .unix_socket_for(name)
                            .map(|p| Destination::UnixSocket(p.to_string()))
                    })
            })
            .unwrap_or_else(|| Destination::Service {
                name: service.name.clone(),
                namespace: owner.namespace.clone(),
                port: service
                    .port
                    .as_ref()
                    .and_then(|p| p.number)
                    .and_then(|n| u16::try_from(n).ok())
                    .unwrap_or(0),
            });

        Some(Self::new(
            path,
            PathMatch::from_path_type(&rule.path_type),
            destination,
            owner.clone(),
        ))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn owner(&self) -> &ResourceId {
        &self.owner
    }

    /// The backend this route must find in the service registry, if it
    /// proxies to a service.
    pub fn backend(&self) -> Option<String> {
        match &self.destination {
            Destination::Service { .. } => Some(self.destination.to_string()),
            _ => None,
        }
    }

    /// The location selector, e.g. `= /exact` or `/prefix`.
    pub fn location(&self) -> String {
        match self.path_match {
            PathMatch::Exact => format!("= {}", self.path),
            PathMatch::Prefix => self.path.clone(),
        }
    }

    /// Renders this route as a `location` block. `alt_svc` is only set on
    /// secure listeners.
    pub fn render(&self, opts: &ProtocolOptions, alt_svc: Option<&str>) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n    location {} {{", self.location());
        match &self.destination {
            Destination::StaticSite(root) => {
                let _ = writeln!(out, "        root {root};");
                out.push_str("        try_files $uri $uri/ /index.html;\n");
            }
            dst => {
                out.push_str("        proxy_http_version 1.1;\n");
                out.push_str("        proxy_set_header Host $http_host;\n");
                let _ = writeln!(out, "        proxy_pass http://{dst};");
            }
        }
        if opts.websocket {
            out.push_str("        proxy_set_header Upgrade $http_upgrade;\n");
            out.push_str("        proxy_set_header Connection \"upgrade\";\n");
        }
        if let Some(alt_svc) = alt_svc {
            let _ = writeln!(out, "        add_header Alt-Svc '{alt_svc}';");
        }
        out.push_str("    }\n");
        out
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' => '{}'", self.location(), self.destination)
    }
}

// === impl PathMatch ===

impl PathMatch {
    fn from_path_type(kind: &str) -> Self {
        if kind == path_type::EXACT {
            Self::Exact
        } else {
            Self::Prefix
        }
    }
}

// === impl Destination ===

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service {
                name,
                namespace,
                port,
            } => write!(f, "{name}.{namespace}:{port}"),
            Self::UnixSocket(path) => write!(f, "unix:{path}"),
            Self::StaticSite(path) => write!(f, "static-site:{path}"),
        }
    }
}

/// The catch-all location for hosts without a root route.
pub(crate) fn reject_root() -> &'static str {
    "\n    location / {\n        return 444;\n    }\n"
}
