use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use ngress_controller_k8s_api::{ResourceExt, ResourceId, Service};

/// The set of known backends, as `name.namespace:port` of each service's first
/// declared port.
#[derive(Debug, Default)]
pub struct Services {
    by_id: HashMap<ResourceId, Service>,
    backends: HashSet<String>,
}

// === impl Services ===

impl Services {
    pub fn insert(&mut self, service: Service) {
        let id = ResourceId::of(&service);
        let backend = backend_name(&service);
        tracing::info!(%backend, "Added service");
        if let Some(old) = self.by_id.insert(id, service) {
            self.backends.remove(&backend_name(&old));
        }
        self.backends.insert(backend);
    }

    pub fn remove(&mut self, id: &ResourceId) {
        if let Some(service) = self.by_id.remove(id) {
            let backend = backend_name(&service);
            tracing::info!(%backend, "Removed service");
            self.backends.remove(&backend);
        }
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Service> {
        self.by_id.get(id)
    }

    pub fn contains(&self, backend: &str) -> bool {
        self.backends.contains(backend)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn backend_name(service: &Service) -> String {
    let port = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|p| p.port)
        .unwrap_or(0);
    format!(
        "{}.{}:{}",
        service.name_any(),
        service.namespace().unwrap_or_else(|| "default".to_string()),
        port
    )
}
