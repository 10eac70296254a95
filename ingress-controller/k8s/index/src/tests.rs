mod rebuild;

use crate::{
    apply::{ApplyError, Reload},
    Config, Controller, Event, ResourceEvent, SharedController,
};
use maplit::btreemap;
use ngress_controller_k8s_api::{
    self as k8s, path_type, ByteString, HTTPIngressPath, HTTPIngressRuleValue, IngressBackend,
    IngressRule, IngressServiceBackend, IngressSpec, IngressTLS, ObjectMeta, ServiceBackendPort,
    ServicePort, ServiceSpec, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::time;

const HOSTNAME: &str = "this-host";

/// Counts reload requests instead of signaling a process.
#[derive(Clone, Debug, Default)]
pub(crate) struct CountReloads(Arc<AtomicUsize>);

impl CountReloads {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Reload for CountReloads {
    fn reload(&self) -> Result<(), ApplyError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct TestConfig {
    controller: SharedController,
    reloads: CountReloads,
    dir: tempfile::TempDir,
    _tracing: tracing::subscriber::DefaultGuard,
}

impl TestConfig {
    fn with_debounce(debounce_interval: time::Duration) -> Self {
        let _tracing = tracing::subscriber::set_default(
            tracing_subscriber::fmt().with_test_writer().finish(),
        );
        let dir = tempfile::tempdir().expect("must create temp dir");
        let reloads = CountReloads::default();
        let controller = Controller::shared(
            Config {
                hostname: HOSTNAME.to_string(),
                conf_dir: dir.path().join("conf.d"),
                certs_dir: dir.path().join("certs"),
                debounce_interval,
            },
            Box::new(reloads.clone()),
            Default::default(),
        );
        Self {
            controller,
            reloads,
            dir,
            _tracing,
        }
    }

    fn handle(&self, event: impl Into<ResourceEvent>) -> bool {
        self.controller.write().handle(event.into())
    }

    fn add_ingress(&self, ingress: k8s::Ingress) -> bool {
        self.handle(Event::Added(ingress))
    }

    fn delete_ingress(&self, ingress: k8s::Ingress) -> bool {
        self.handle(Event::Deleted(ingress))
    }

    fn add_secret(&self, secret: k8s::Secret) -> bool {
        self.handle(Event::Added(secret))
    }

    fn add_service(&self, service: k8s::Service) -> bool {
        self.handle(Event::Added(service))
    }

    fn render(&self) -> crate::Rendered {
        self.controller.write().render()
    }
}

impl Default for TestConfig {
    /// Rebuilds never fire on their own; tests render explicitly.
    fn default() -> Self {
        Self::with_debounce(time::Duration::from_secs(60 * 60))
    }
}

fn meta(ns: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(ns.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub(crate) fn mk_path(path: &str, path_type: &str, svc: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: path_type.to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: svc.to_string(),
                port: Some(ServiceBackendPort {
                    number: Some(port),
                    name: None,
                }),
            }),
            resource: None,
        },
    }
}

pub(crate) fn mk_path_named(
    path: &str,
    path_type: &str,
    svc: &str,
    port_name: &str,
) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path.to_string()),
        path_type: path_type.to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: svc.to_string(),
                port: Some(ServiceBackendPort {
                    number: None,
                    name: Some(port_name.to_string()),
                }),
            }),
            resource: None,
        },
    }
}

fn mk_ingress<'r>(
    ns: &str,
    name: &str,
    rules: impl IntoIterator<Item = (&'r str, Vec<HTTPIngressPath>)>,
) -> k8s::Ingress {
    k8s::Ingress {
        metadata: meta(ns, name),
        spec: Some(IngressSpec {
            rules: Some(
                rules
                    .into_iter()
                    .map(|(host, paths)| IngressRule {
                        host: Some(host.to_string()),
                        http: Some(HTTPIngressRuleValue { paths }),
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// An ingress routing `/` on `host` to `svc:8080`.
fn mk_simple_ingress(ns: &str, name: &str, host: &str, svc: &str) -> k8s::Ingress {
    mk_ingress(
        ns,
        name,
        Some((host, vec![mk_path("/", path_type::PREFIX, svc, 8080)])),
    )
}

fn with_tls(mut ingress: k8s::Ingress, secret: &str, hosts: &[&str]) -> k8s::Ingress {
    let spec = ingress.spec.get_or_insert_with(Default::default);
    spec.tls.get_or_insert_with(Vec::new).push(IngressTLS {
        secret_name: Some(secret.to_string()),
        hosts: Some(hosts.iter().map(|h| h.to_string()).collect()),
    });
    ingress
}

fn with_annotation(mut ingress: k8s::Ingress, key: &str, value: &str) -> k8s::Ingress {
    ingress
        .metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(key.to_string(), value.to_string());
    ingress
}

pub(crate) fn mk_secret(ns: &str, name: &str, cert: &[u8], key: &[u8]) -> k8s::Secret {
    k8s::Secret {
        metadata: meta(ns, name),
        type_: Some(k8s::TLS_SECRET_TYPE.to_string()),
        data: Some(btreemap! {
            TLS_CERT_KEY.to_string() => ByteString(cert.to_vec()),
            TLS_PRIVATE_KEY_KEY.to_string() => ByteString(key.to_vec()),
        }),
        ..Default::default()
    }
}

pub(crate) fn mk_service(ns: &str, name: &str, ports: &[i32]) -> k8s::Service {
    k8s::Service {
        metadata: meta(ns, name),
        spec: Some(ServiceSpec {
            ports: Some(
                ports
                    .iter()
                    .map(|&port| ServicePort {
                        port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}
