use crate::{
    audit,
    core::{Mode, Reconciler, Recorder, Throttle},
    index::Deletions,
    k8s,
    metrics::{Instrumented, Metrics},
    tls::Verifier,
    KubeCluster,
};
use anyhow::{anyhow, bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::{sync::Arc, time::Duration};
use tracing::{info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "ingress-auditor",
    about = "Audits the TLS configuration of ingress resources"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress_auditor=info,warn",
        env = "INGRESS_AUDITOR_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Delay between audits of an ingress.
    ///
    /// A violation that was already recorded for an ingress is not recorded
    /// again within this interval unless its kind changes.
    #[clap(long, default_value = "10m", value_parser = parse_duration)]
    interval: Duration,

    /// Either `throttled` or `strict`. Strict mode records every violation.
    #[clap(long, value_enum, default_value = "throttled")]
    mode: AuditMode,

    /// Namespace in which IngressTLSLog resources are created.
    #[clap(long, default_value = "ingress-auditor-system")]
    audit_namespace: String,

    /// Bounds the connect and handshake phases of a TLS verification.
    #[clap(long, default_value = "5s", value_parser = parse_duration)]
    verify_timeout: Duration,

    #[clap(long, default_value = "443")]
    https_port: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum AuditMode {
    Throttled,
    Strict,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            admin,
            interval,
            mode,
            audit_namespace,
            verify_timeout,
            https_port,
        } = self;

        if interval.is_zero() {
            bail!("--interval must be greater than zero");
        }

        let mut prom = <Registry>::default();
        let metrics = Metrics::register(prom.sub_registry_with_prefix("ingress_audit"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let cluster = KubeCluster::new(runtime.client(), audit_namespace);
        let mode = Mode::from(mode);
        let recorder = match mode {
            Mode::Throttled => Recorder::throttled(cluster.clone(), Throttle::shared(interval)),
            Mode::Strict => Recorder::unthrottled(cluster.clone()),
        };
        let reconciler = Arc::new(Reconciler::new(
            cluster,
            Verifier::new(https_port, verify_timeout),
            Instrumented::new(recorder, metrics.clone()),
            mode,
            interval,
        ));

        // Forget throttled reports for deleted ingresses.
        let ingresses = runtime.watch_all::<k8s::Ingress>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(Deletions::shared(reconciler.clone()), ingresses)
                .instrument(info_span!("ingresses")),
        );

        tokio::spawn(
            audit::run(
                runtime.client(),
                audit::Context::shared(reconciler, metrics),
                runtime.shutdown_handle(),
            )
            .instrument(info_span!("audit")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait
        // for the background tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

// === impl AuditMode ===

impl From<AuditMode> for Mode {
    fn from(mode: AuditMode) -> Self {
        match mode {
            AuditMode::Throttled => Mode::Throttled,
            AuditMode::Strict => Mode::Strict,
        }
    }
}

/// Parses a duration such as `500ms`, `90s`, `10m`, `2h` or `1d`.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let (magnitude, unit) = match s.rfind(|c: char| c.is_ascii_digit()) {
        Some(offset) => {
            let (magnitude, unit) = s.split_at(offset + 1);
            (magnitude.parse::<u64>()?, unit)
        }
        None => bail!("{s} does not contain a duration value"),
    };

    let mul = match unit {
        "" if magnitude == 0 => 0,
        "ms" => 1,
        "s" => 1000,
        "m" => 1000 * 60,
        "h" => 1000 * 60 * 60,
        "d" => 1000 * 60 * 60 * 24,
        _ => bail!("invalid duration unit {unit:?} (expected one of 'ms', 's', 'm', 'h', or 'd')"),
    };

    let ms = magnitude
        .checked_mul(mul)
        .ok_or_else(|| anyhow!("duration {s} overflows when converted to milliseconds"))?;
    Ok(Duration::from_millis(ms))
}
