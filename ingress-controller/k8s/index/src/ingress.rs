use crate::{
    annotations::RouteAnnotations,
    host::{Host, HostMap},
    route::Route,
};
use ngress_controller_k8s_api::{self as k8s, ResourceExt, ResourceId};

/// Records the effects of one `Ingress` on the host map so that they can be
/// reverted when the resource is updated or deleted.
#[derive(Debug)]
pub struct Ingress {
    id: ResourceId,

    /// The resource as it was applied.
    resource: k8s::Ingress,

    /// One entry per rule that took a host reference.
    hosts: Vec<String>,

    /// Routes added by this ingress, by host.
    routes: Vec<(String, String)>,

    /// TLS references taken by this ingress.
    tls: Vec<(String, ResourceId)>,
}

// === impl Ingress ===

impl Ingress {
    /// Applies `resource` to `hosts`. Ingresses pinned to another host via
    /// host affinity are recorded but have no effect.
    pub fn apply(resource: k8s::Ingress, hosts: &mut HostMap, hostname: &str) -> Self {
        let id = ResourceId::of(&resource);
        let mut ingress = Self {
            id,
            resource,
            hosts: Vec::new(),
            routes: Vec::new(),
            tls: Vec::new(),
        };

        let annotations = RouteAnnotations::from_annotations(ingress.resource.annotations());
        if annotations.excludes(hostname) {
            tracing::info!(
                ingress = %ingress.id,
                %annotations,
                %hostname,
                "Skipping ingress with affinity to another host",
            );
            return ingress;
        }

        let Some(spec) = ingress.resource.spec.as_ref() else {
            return ingress;
        };

        for rule in spec.rules.iter().flatten() {
            let name = match rule.host.as_deref() {
                Some(name) if !name.is_empty() => name,
                _ => {
                    tracing::warn!(ingress = %ingress.id, "Skipping rule without a host");
                    continue;
                }
            };

            let host = hosts
                .entry(name.to_string())
                .or_insert_with(|| Host::new(name));
            host.apply_annotations(&ingress.id, &annotations);
            host.add_ref();
            ingress.hosts.push(name.to_string());

            // Mappings are resolved against the host's merged annotations.
            let host_annotations = host.annotations().clone();
            for path in rule.http.iter().flat_map(|http| http.paths.iter()) {
                if let Some(route) = Route::from_ingress_path(&ingress.id, path, &host_annotations)
                {
                    let path = route.path().to_string();
                    if host.add_route(route) {
                        ingress.routes.push((name.to_string(), path));
                    }
                }
            }
        }

        for tls in spec.tls.iter().flatten() {
            let Some(secret_name) = tls.secret_name.as_deref().filter(|n| !n.is_empty()) else {
                tracing::error!(ingress = %ingress.id, "TLS declaration without a secret name");
                continue;
            };
            let secret = ResourceId::new(&ingress.id.namespace, secret_name);
            for name in tls.hosts.iter().flatten() {
                if let Some(host) = hosts.get_mut(name) {
                    if host.attach_tls(secret.clone()) {
                        ingress.tls.push((name.clone(), secret.clone()));
                    }
                }
            }
        }

        tracing::info!(
            ingress = %ingress.id,
            %annotations,
            hosts = ?ingress.hosts,
            tls = ?ingress.tls,
            "Applied ingress",
        );
        ingress
    }

    pub fn resource(&self) -> &k8s::Ingress {
        &self.resource
    }

    /// Reverts this ingress' effects, dropping hosts that are no longer
    /// referenced. Returns the applied resource.
    pub fn remove(self, hosts: &mut HostMap) -> k8s::Ingress {
        tracing::info!(ingress = %self.id, "Removing ingress");

        for (name, secret) in &self.tls {
            if let Some(host) = hosts.get_mut(name) {
                host.detach_tls(secret);
            }
        }

        for (name, path) in &self.routes {
            if let Some(host) = hosts.get_mut(name) {
                host.remove_route(path, &self.id);
            }
        }

        for name in &self.hosts {
            if let Some(host) = hosts.get_mut(name) {
                host.remove_annotations(&self.id);
                if host.remove_ref() {
                    tracing::info!(host = %name, "Removing unreferenced host");
                    hosts.remove(name);
                }
            }
        }

        self.resource
    }
}
