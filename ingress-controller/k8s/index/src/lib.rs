//! Ngress configuration controller
//!
//! The controller derives an nginx configuration and a set of certificate
//! files from the cluster's `Ingress`, `Secret`, and `Service` resources:
//!
//! - Each `Ingress` contributes rules to one or more hosts. A host is shared by
//!   all ingresses that name it and is reference counted so that it lives as
//!   long as any ingress declares it.
//! - An ingress' TLS declarations attach a `Secret` to its hosts. A host holds
//!   at most one secret, also reference counted.
//! - `Service`s form the set of known backends. Routes to unknown backends are
//!   omitted from the configuration.
//!
//! ```text
//! [ Ingress ] -> [ Host ] -> [ Route ] -> [ Service ]
//!                   |
//!                   +------> [ Secret ]
//! ```
//!
//! Changes are coalesced: every change re-arms a timer, and once resource
//! events quiesce the controller renders all hosts in hostname order, exports
//! the secrets in use, and writes the results only if they differ from what
//! was last written. The proxy is signaled to reload only after such a write.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod annotations;
pub mod apply;
mod controller;
pub mod debounce;
mod event;
pub mod host;
mod ingress;
pub mod metrics;
pub mod proto;
pub mod route;
pub mod secrets;
mod server;
pub mod services;

#[cfg(test)]
mod tests;

pub use self::{
    annotations::RouteAnnotations,
    apply::{Applied, ApplyError, ConfigApplier, PidFileReload, Reload},
    controller::{Config, Controller, Rendered, SharedController, Stats},
    debounce::Debounce,
    event::{Event, ResourceEvent},
    host::Host,
    ingress::Ingress,
    metrics::ApplyMetrics,
    proto::ProtocolOptions,
    route::Route,
    secrets::{Certs, Secrets},
    services::Services,
};
