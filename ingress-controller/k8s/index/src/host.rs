use crate::{
    annotations::RouteAnnotations, route::Route, secrets::Secrets, server::Server,
    services::Services,
};
use ngress_controller_k8s_api::ResourceId;
use std::{
    collections::{btree_map::Entry, BTreeMap},
    path::Path,
};

/// All hosts, ordered by hostname so that rendering is deterministic.
pub type HostMap = BTreeMap<String, Host>;

/// The routing state for one hostname, merged across all ingresses that
/// declare it.
#[derive(Debug)]
pub struct Host {
    name: String,

    /// Routes by path. Sorted so that rendered output doesn't depend on the
    /// order in which routes were added.
    routes: BTreeMap<String, Route>,

    /// Annotations merged across all contributing ingresses.
    annotations: RouteAnnotations,

    /// Annotations as declared by each contributing ingress.
    contributions: BTreeMap<ResourceId, RouteAnnotations>,

    /// The number of ingress rules referencing this host.
    refs: usize,

    tls: Option<TlsRef>,
}

#[derive(Debug)]
struct TlsRef {
    secret: ResourceId,
    refs: usize,
}

/// Shared state consulted while rendering hosts.
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub secrets: &'a mut Secrets,
    pub services: &'a Services,
    pub certs_dir: &'a Path,
}

// === impl Host ===

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: BTreeMap::new(),
            annotations: RouteAnnotations::default(),
            contributions: BTreeMap::new(),
            refs: 0,
            tls: None,
        }
    }

    pub fn annotations(&self) -> &RouteAnnotations {
        &self.annotations
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn route(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    pub fn ref_count(&self) -> usize {
        self.refs
    }

    pub fn tls_ref_count(&self) -> usize {
        self.tls.as_ref().map_or(0, |tls| tls.refs)
    }

    pub fn tls_secret(&self) -> Option<&ResourceId> {
        self.tls.as_ref().map(|tls| &tls.secret)
    }

    /// Records the annotations of the ingress `owner`. The host's annotations
    /// are always the merge of all contributions in ingress order.
    pub fn apply_annotations(&mut self, owner: &ResourceId, annotations: &RouteAnnotations) {
        self.contributions.insert(owner.clone(), annotations.clone());
        self.remerge();
    }

    /// Drops the annotations contributed by `owner`.
    pub fn remove_annotations(&mut self, owner: &ResourceId) {
        if self.contributions.remove(owner).is_some() {
            self.remerge();
        }
    }

    fn remerge(&mut self) {
        let mut merged = RouteAnnotations::default();
        for annotations in self.contributions.values() {
            merged.merge(annotations);
        }
        self.annotations = merged;
    }

    pub fn add_ref(&mut self) {
        self.refs += 1;
    }

    /// Drops a reference, returning true when the host is no longer
    /// referenced.
    pub fn remove_ref(&mut self) -> bool {
        self.refs = self.refs.saturating_sub(1);
        self.refs == 0
    }

    /// Adds a route unless one already exists for the path, in which case the
    /// existing route is kept. Returns true if the route was added.
    pub fn add_route(&mut self, route: Route) -> bool {
        match self.routes.entry(route.path().to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(route);
                true
            }
            Entry::Occupied(entry) => {
                tracing::error!(
                    host = %self.name,
                    existing = %entry.get(),
                    ignored = %route,
                    ingress = %route.owner(),
                    "Route already exists, ignoring",
                );
                false
            }
        }
    }

    /// Removes the route at `path` if it was created by `owner`.
    pub fn remove_route(&mut self, path: &str, owner: &ResourceId) {
        if let Entry::Occupied(entry) = self.routes.entry(path.to_string()) {
            if entry.get().owner() == owner {
                entry.remove();
            }
        }
    }

    /// Attaches a TLS secret. A host holds at most one secret at a time, so a
    /// different secret is rejected while the current one is referenced.
    /// Returns true if the reference was taken.
    pub fn attach_tls(&mut self, secret: ResourceId) -> bool {
        match &mut self.tls {
            Some(tls) if tls.secret != secret => {
                tracing::error!(
                    host = %self.name,
                    expected = %tls.secret,
                    got = %secret,
                    "Host already has a different TLS secret",
                );
                false
            }
            Some(tls) => {
                tls.refs += 1;
                true
            }
            None => {
                tracing::info!(host = %self.name, %secret, "Attached TLS secret");
                self.tls = Some(TlsRef { secret, refs: 1 });
                true
            }
        }
    }

    pub fn detach_tls(&mut self, secret: &ResourceId) {
        let Some(tls) = self.tls.as_mut() else {
            return;
        };
        if tls.secret != *secret {
            tracing::error!(
                host = %self.name,
                expected = %tls.secret,
                got = %secret,
                "Cannot detach a TLS secret the host does not hold",
            );
            return;
        }
        tls.refs = tls.refs.saturating_sub(1);
        if tls.refs == 0 {
            tracing::info!(host = %self.name, %secret, "Detached TLS secret");
            self.tls = None;
        }
    }

    /// Renders the host's `server` blocks, marking its TLS secret for write
    /// once the secret's material is found. Hosts without renderable routes
    /// render nothing.
    pub fn render(&self, ctx: &mut RenderContext<'_>) -> String {
        let mut server = Server::new(&self.name, &self.annotations.proto);

        if let Some(tls) = &self.tls {
            match ctx.secrets.tls_paths(&tls.secret, ctx.certs_dir) {
                Some(paths) => {
                    ctx.secrets.mark_for_write(&tls.secret);
                    server.set_tls(paths);
                }
                None => {
                    tracing::error!(host = %self.name, secret = %tls.secret, "TLS secret not found")
                }
            }
        }

        let mut has_root = false;
        for route in self.routes.values() {
            if let Some(backend) = route.backend() {
                if !ctx.services.contains(&backend) {
                    tracing::warn!(host = %self.name, %route, "Service not found, route skipped");
                    continue;
                }
            }
            tracing::debug!(host = %self.name, %route);
            has_root |= route.path() == "/";
            server.add_route(route);
        }
        if !has_root {
            server.reject_root();
        }

        server.render()
    }
}
