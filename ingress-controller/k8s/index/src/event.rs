use ngress_controller_k8s_api::{Ingress, Secret, Service};

/// A change to a single resource, carrying complete snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum Event<T> {
    Added(T),
    Updated { old: T, new: T },
    Deleted(T),
}

/// An event for one of the watched resource kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceEvent {
    Ingress(Event<Ingress>),
    Secret(Event<Secret>),
    Service(Event<Service>),
}

impl From<Event<Ingress>> for ResourceEvent {
    fn from(event: Event<Ingress>) -> Self {
        Self::Ingress(event)
    }
}

impl From<Event<Secret>> for ResourceEvent {
    fn from(event: Event<Secret>) -> Self {
        Self::Secret(event)
    }
}

impl From<Event<Service>> for ResourceEvent {
    fn from(event: Event<Service>) -> Self {
        Self::Service(event)
    }
}
