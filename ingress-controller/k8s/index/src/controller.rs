use crate::{
    apply::{Applied, ConfigApplier, Reload},
    debounce::Debounce,
    event::{Event, ResourceEvent},
    host::{Host, HostMap, RenderContext},
    ingress::Ingress,
    metrics::ApplyMetrics,
    secrets::{Certs, Secrets},
    services::Services,
};
use ahash::AHashMap as HashMap;
use ngress_controller_k8s_api::{self as k8s, ResourceExt, ResourceId};
use parking_lot::RwLock;
use std::{
    path::PathBuf,
    sync::{Arc, Weak},
};
use tokio::time;

pub type SharedController = Arc<RwLock<Controller>>;

/// Controller settings.
#[derive(Clone, Debug)]
pub struct Config {
    /// Identifies this controller for host affinity.
    pub hostname: String,

    /// The directory into which the configuration file is written.
    pub conf_dir: PathBuf,

    /// The directory holding exported certificates. Owned by the controller.
    pub certs_dir: PathBuf,

    /// The quiet period after the last change before configuration is rebuilt.
    pub debounce_interval: time::Duration,
}

/// Owns all routing state derived from the watched resources.
///
/// All mutation happens through `&mut self`, i.e. while holding the shared
/// controller's write lock. Each change schedules a debounced rebuild, which
/// takes the same lock for its whole duration.
#[derive(Debug)]
pub struct Controller {
    this: Weak<RwLock<Controller>>,
    hostname: String,
    certs_dir: PathBuf,

    hosts: HostMap,
    ingresses: HashMap<ResourceId, Ingress>,
    secrets: Secrets,
    services: Services,

    rebuilds: Debounce,
    applier: ConfigApplier,
    metrics: ApplyMetrics,
}

/// The output of a rebuild, before it is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    pub config: String,
    pub certs: Certs,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub hosts: usize,
    pub routes: usize,
    pub ingresses: usize,
    pub secrets: usize,
    pub services: usize,
}

// === impl Controller ===

impl Controller {
    pub fn shared(config: Config, reload: Box<dyn Reload>, metrics: ApplyMetrics) -> SharedController {
        let Config {
            hostname,
            conf_dir,
            certs_dir,
            debounce_interval,
        } = config;
        let applier = ConfigApplier::new(&conf_dir, certs_dir.clone(), reload, metrics.clone());
        Arc::new_cyclic(|this| {
            RwLock::new(Self {
                this: this.clone(),
                hostname,
                certs_dir,
                hosts: HostMap::new(),
                ingresses: HashMap::default(),
                secrets: Secrets::default(),
                services: Services::default(),
                rebuilds: Debounce::new(debounce_interval),
                applier,
                metrics,
            })
        })
    }

    /// Applies a resource event, scheduling a rebuild if state changed.
    /// Returns true if state changed.
    pub fn handle(&mut self, event: ResourceEvent) -> bool {
        let changed = match event {
            ResourceEvent::Ingress(ev) => self.dispatch(ev, Self::add_ingress, Self::remove_ingress),
            ResourceEvent::Secret(ev) => self.dispatch(ev, Self::add_secret, Self::remove_secret),
            ResourceEvent::Service(ev) => {
                self.dispatch(ev, Self::add_service, Self::remove_service)
            }
        };
        if changed {
            self.schedule_rebuild();
        }
        changed
    }

    pub fn hosts(&self) -> &HostMap {
        &self.hosts
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn stats(&self) -> Stats {
        Stats {
            hosts: self.hosts.len(),
            routes: self.hosts.values().map(|h| h.routes().count()).sum(),
            ingresses: self.ingresses.len(),
            secrets: self.secrets.len(),
            services: self.services.len(),
        }
    }

    /// Renders all hosts in hostname order and collects the certificates they
    /// use.
    pub fn render(&mut self) -> Rendered {
        self.secrets.reset_marks();
        let mut ctx = RenderContext {
            secrets: &mut self.secrets,
            services: &self.services,
            certs_dir: &self.certs_dir,
        };
        let config = self
            .hosts
            .values()
            .map(|host| host.render(&mut ctx))
            .collect::<String>();
        let certs = self.secrets.collect_marked(&self.certs_dir);
        Rendered { config, certs }
    }

    /// Renders and applies the configuration.
    pub fn rebuild(&mut self) -> Applied {
        self.metrics.rebuild();
        let Rendered { config, certs } = self.render();
        tracing::info!(hosts = self.hosts.len(), certs = certs.len(), "Rebuilding configuration");
        let applied = self.applier.apply(config, certs);
        tracing::debug!(?applied);
        applied
    }

    fn schedule_rebuild(&self) {
        let this = self.this.clone();
        self.rebuilds.schedule(move || {
            if let Some(controller) = this.upgrade() {
                controller.write().rebuild();
            }
        });
    }

    fn dispatch<T>(
        &mut self,
        event: Event<T>,
        add: fn(&mut Self, T) -> bool,
        remove: fn(&mut Self, &ResourceId) -> bool,
    ) -> bool
    where
        T: PartialEq + ResourceExt,
    {
        match event {
            Event::Added(new) => add(self, new),
            Event::Updated { old, new } => {
                if old == new {
                    tracing::debug!(resource = %ResourceId::of(&new), "Ignoring unchanged resource");
                    return false;
                }
                let removed = remove(self, &ResourceId::of(&old));
                add(self, new) || removed
            }
            Event::Deleted(old) => remove(self, &ResourceId::of(&old)),
        }
    }

    fn add_ingress(&mut self, resource: k8s::Ingress) -> bool {
        let id = ResourceId::of(&resource);
        if self.ingresses.contains_key(&id) {
            tracing::warn!(ingress = %id, "Ingress already exists");
            return false;
        }
        let ingress = Ingress::apply(resource, &mut self.hosts, &self.hostname);
        self.ingresses.insert(id, ingress);
        true
    }

    fn remove_ingress(&mut self, id: &ResourceId) -> bool {
        match self.ingresses.remove(id) {
            Some(ingress) => {
                ingress.remove(&mut self.hosts);
                true
            }
            None => false,
        }
    }

    fn add_secret(&mut self, secret: k8s::Secret) -> bool {
        self.secrets.add(secret);
        true
    }

    fn remove_secret(&mut self, id: &ResourceId) -> bool {
        let exists = self.secrets.get(id).is_some();
        self.secrets.remove(id);
        exists
    }

    fn add_service(&mut self, service: k8s::Service) -> bool {
        self.services.insert(service);
        true
    }

    fn remove_service(&mut self, id: &ResourceId) -> bool {
        let exists = self.services.get(id).is_some();
        self.services.remove(id);
        exists
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Ingress> for Controller {
    fn apply(&mut self, ingress: k8s::Ingress) {
        let id = ResourceId::of(&ingress);
        let event = match self.ingresses.get(&id) {
            Some(old) => Event::Updated {
                old: old.resource().clone(),
                new: ingress,
            },
            None => Event::Added(ingress),
        };
        self.handle(event.into());
    }

    fn delete(&mut self, namespace: String, name: String) {
        let id = ResourceId::new(namespace, name);
        if let Some(old) = self.ingresses.get(&id) {
            let event = Event::Deleted(old.resource().clone());
            self.handle(event.into());
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Secret> for Controller {
    fn apply(&mut self, secret: k8s::Secret) {
        let id = ResourceId::of(&secret);
        let event = match self.secrets.get(&id) {
            Some(old) => Event::Updated {
                old: old.clone(),
                new: secret,
            },
            None => Event::Added(secret),
        };
        self.handle(event.into());
    }

    fn delete(&mut self, namespace: String, name: String) {
        let id = ResourceId::new(namespace, name);
        if let Some(old) = self.secrets.get(&id) {
            let event = Event::Deleted(old.clone());
            self.handle(event.into());
        }
    }
}

impl kubert::index::IndexNamespacedResource<k8s::Service> for Controller {
    fn apply(&mut self, service: k8s::Service) {
        let id = ResourceId::of(&service);
        let event = match self.services.get(&id) {
            Some(old) => Event::Updated {
                old: old.clone(),
                new: service,
            },
            None => Event::Added(service),
        };
        self.handle(event.into());
    }

    fn delete(&mut self, namespace: String, name: String) {
        let id = ResourceId::new(namespace, name);
        if let Some(old) = self.services.get(&id) {
            let event = Event::Deleted(old.clone());
            self.handle(event.into());
        }
    }
}
