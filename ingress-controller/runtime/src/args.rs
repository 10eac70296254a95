use crate::{
    index::{self, ApplyMetrics, Controller, PidFileReload},
    k8s::{self, watcher},
};
use anyhow::{bail, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "ngress", about = "An nginx ingress configuration controller")]
pub struct Args {
    #[clap(long, default_value = "ngress=info,warn", env = "NGRESS_LOG")]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The nginx conf.d directory into which the generated configuration is
    /// written.
    #[clap(long, default_value = "/etc/nginx/conf.d")]
    nginx_confd_dir: PathBuf,

    /// The directory into which certificates are written. Its contents are
    /// managed entirely by the controller.
    #[clap(long, default_value = "/etc/nginx/certs")]
    nginx_certs_dir: PathBuf,

    #[clap(long, default_value = "/var/run/nginx.pid")]
    nginx_pid_file: PathBuf,

    /// How long resources must be unchanged before the configuration is
    /// rebuilt, limiting how often nginx is reloaded.
    #[clap(long, default_value = "10000")]
    nginx_reload_debounce_interval_ms: u64,

    /// Identifies this node for `ngress.affinity/host` annotations.
    #[clap(long, env = "HOSTNAME")]
    hostname: String,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            nginx_confd_dir,
            nginx_certs_dir,
            nginx_pid_file,
            nginx_reload_debounce_interval_ms,
            hostname,
        } = self;

        let mut prom = <Registry>::default();
        let apply_metrics = ApplyMetrics::register(prom.sub_registry_with_prefix("ngress"));

        let controller = Controller::shared(
            index::Config {
                hostname: hostname.clone(),
                conf_dir: nginx_confd_dir,
                certs_dir: nginx_certs_dir,
                debounce_interval: Duration::from_millis(nginx_reload_debounce_interval_ms),
            },
            Box::new(PidFileReload::new(nginx_pid_file)),
            apply_metrics,
        );
        index::metrics::register(
            prom.sub_registry_with_prefix("ngress_index"),
            controller.clone(),
        );
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        info!(%hostname, "Starting controller");

        // Spawn resource watches.

        let ingresses = runtime.watch_all::<k8s::Ingress>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(controller.clone(), ingresses)
                .instrument(info_span!("ingresses")),
        );

        let secrets = runtime.watch_all::<k8s::Secret>(
            watcher::Config::default().fields(&format!("type={}", k8s::TLS_SECRET_TYPE)),
        );
        tokio::spawn(
            kubert::index::namespaced(controller.clone(), secrets)
                .instrument(info_span!("secrets")),
        );

        let services = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(controller, services).instrument(info_span!("services")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
