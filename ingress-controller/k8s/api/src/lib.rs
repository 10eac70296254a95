#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod resource_id;

pub use self::resource_id::ResourceId;
pub use k8s_openapi::{
    api::{
        core::v1::{Secret, Service, ServicePort, ServiceSpec},
        networking::v1::{
            HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
            IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
        },
    },
    ByteString,
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    runtime::watcher,
};

/// The `Secret` data key holding a PEM-encoded certificate chain.
pub const TLS_CERT_KEY: &str = "tls.crt";

/// The `Secret` data key holding a PEM-encoded private key.
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// The `Secret` type for TLS material.
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Ingress path types, as defined by `networking.k8s.io/v1`.
pub mod path_type {
    pub const EXACT: &str = "Exact";
    pub const PREFIX: &str = "Prefix";
}
