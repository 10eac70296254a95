use crate::proto::{ProtocolOptions, DEFAULT_SECURE_PORT, DEFAULT_UNSECURE_PORT};
use std::{collections::BTreeMap, fmt};

pub const HTTP2_ANNOTATION: &str = "ngress.proto/http2";
pub const HTTP3_ANNOTATION: &str = "ngress.proto/http3";
pub const WEBSOCKET_ANNOTATION: &str = "ngress.proto/websocket";
pub const SECURE_PORT_ANNOTATION: &str = "ngress.port/secure";
pub const UNSECURE_PORT_ANNOTATION: &str = "ngress.port/unsecure";
pub const HOST_AFFINITY_ANNOTATION: &str = "ngress.affinity/host";
pub const UNIX_SOCKET_ANNOTATION: &str = "ngress.unix/socket";
pub const STATIC_SITE_ANNOTATION: &str = "ngress.static/site";

/// Routing configuration read from an ingress' annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteAnnotations {
    pub proto: ProtocolOptions,

    /// When set, only the controller running on this host applies the ingress.
    pub host_affinity: Option<String>,

    /// `portName=/path/to/socket` mappings.
    pub unix_socket: Option<String>,

    /// `portName=/path/to/site` mappings.
    pub static_site: Option<String>,
}

// === impl RouteAnnotations ===

impl RouteAnnotations {
    pub fn from_annotations(annotations: &BTreeMap<String, String>) -> Self {
        let flag = |key: &str| annotations.get(key).map(String::as_str) == Some("true");
        let value = |key: &str| {
            annotations
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
        };

        let proto = ProtocolOptions {
            http2: flag(HTTP2_ANNOTATION),
            http3: flag(HTTP3_ANNOTATION),
            websocket: flag(WEBSOCKET_ANNOTATION),
            secure_port: port_annotation(annotations, SECURE_PORT_ANNOTATION, DEFAULT_SECURE_PORT),
            unsecure_port: port_annotation(
                annotations,
                UNSECURE_PORT_ANNOTATION,
                DEFAULT_UNSECURE_PORT,
            ),
        };

        Self {
            proto,
            host_affinity: value(HOST_AFFINITY_ANNOTATION),
            unix_socket: value(UNIX_SOCKET_ANNOTATION),
            static_site: value(STATIC_SITE_ANNOTATION),
        }
    }

    /// Returns true if an ingress with these annotations should be ignored by
    /// the controller running on `hostname`.
    pub fn excludes(&self, hostname: &str) -> bool {
        matches!(&self.host_affinity, Some(affinity) if affinity != hostname)
    }

    pub fn merge(&mut self, other: &Self) {
        if other.host_affinity.is_some() {
            self.host_affinity.clone_from(&other.host_affinity);
        }
        if other.unix_socket.is_some() {
            self.unix_socket.clone_from(&other.unix_socket);
        }
        if other.static_site.is_some() {
            self.static_site.clone_from(&other.static_site);
        }
        self.proto.merge(&other.proto);
    }

    pub fn unix_socket_for(&self, port_name: &str) -> Option<&str> {
        self.unix_socket
            .as_deref()
            .and_then(|mappings| mapping_value(mappings, port_name))
    }

    pub fn static_site_for(&self, port_name: &str) -> Option<&str> {
        self.static_site
            .as_deref()
            .and_then(|mappings| mapping_value(mappings, port_name))
    }
}

impl fmt::Display for RouteAnnotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.proto)?;
        if let Some(affinity) = &self.host_affinity {
            write!(f, " hostAffinity: {affinity}")?;
        }
        if let Some(socket) = &self.unix_socket {
            write!(f, " unixSocket: {socket}")?;
        }
        if let Some(site) = &self.static_site {
            write!(f, " staticSite: {site}")?;
        }
        write!(f, " ]")
    }
}

/// Reads a port from `annotation`, falling back to `default` when the
/// annotation is unset or invalid.
fn port_annotation(annotations: &BTreeMap<String, String>, annotation: &str, default: u16) -> u16 {
    match annotations.get(annotation) {
        None => default,
        Some(spec) => spec.trim().parse().unwrap_or_else(|error| {
            tracing::warn!(%spec, %error, %annotation, default, "Invalid port, using default");
            default
        }),
    }
}

/// Looks up `key` in a comma-separated list of `key=value` pairs.
fn mapping_value<'m>(mappings: &'m str, key: &str) -> Option<&'m str> {
    mappings.split(',').find_map(|pair| {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(k), Some(v), None) if k == key => Some(v),
            _ => None,
        }
    })
}
