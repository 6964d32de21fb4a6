use crate::core::{IngressId, Outcome, Report, Violation};
use chrono::{offset::Utc, DateTime};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    reconciles: Counter,
    violations: Family<KindLabels, Counter>,
    records: Family<KindLabels, Counter>,
    suppressed: Family<KindLabels, Counter>,
    record_failures: Family<KindLabels, Counter>,
}

/// Counts the outcome of every report made through the inner reporter.
#[derive(Debug)]
pub struct Instrumented<R> {
    inner: R,
    metrics: Metrics,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: &'static str,
}

// === impl Metrics ===

impl Metrics {
    pub fn register(reg: &mut Registry) -> Self {
        let metrics = Self::default();

        reg.register(
            "reconciles",
            "Total number of ingress audits run",
            metrics.reconciles.clone(),
        );
        reg.register(
            "violations",
            "Total number of violations detected",
            metrics.violations.clone(),
        );
        reg.register(
            "records",
            "Total number of audit records created",
            metrics.records.clone(),
        );
        reg.register(
            "suppressed",
            "Total number of violations not recorded because they were recorded within the interval",
            metrics.suppressed.clone(),
        );
        reg.register(
            "record_failures",
            "Total number of audit records that could not be created",
            metrics.record_failures.clone(),
        );

        metrics
    }

    pub(crate) fn reconciled(&self) {
        self.reconciles.inc();
    }
}

// === impl Instrumented ===

impl<R> Instrumented<R> {
    pub fn new(inner: R, metrics: Metrics) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait::async_trait]
impl<R: Report> Report for Instrumented<R> {
    async fn report(
        &self,
        id: &IngressId,
        violation: &Violation,
        at: DateTime<Utc>,
    ) -> Result<Outcome, Violation> {
        let labels = KindLabels {
            kind: violation.kind().as_str(),
        };
        self.metrics.violations.get_or_create(&labels).inc();

        let outcome = self.inner.report(id, violation, at).await;
        let counter = match outcome {
            Ok(Outcome::Recorded) => &self.metrics.records,
            Ok(Outcome::Suppressed) => &self.metrics.suppressed,
            Err(_) => &self.metrics.record_failures,
        };
        counter.get_or_create(&labels).inc();
        outcome
    }

    fn forget(&self, id: &IngressId) {
        self.inner.forget(id)
    }
}
