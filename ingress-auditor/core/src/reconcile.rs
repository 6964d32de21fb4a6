use crate::{pipeline, Fetch, IngressId, Outcome, Report, Verify, Violation};
use chrono::{offset::Utc, DateTime};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Selects how [`Reconciler::reconcile`] surfaces violations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Violations are reported (subject to the reporter's throttle) and the
    /// ingress is always re-polled after the interval. Reconciliation never
    /// fails, so a run of bad ingresses cannot stall the caller's loop.
    #[default]
    Throttled,

    /// Violations are reported and then returned as the error. Used for
    /// direct invocation, where the caller inspects the exact violation.
    Strict,
}

/// Audits one ingress at a time.
///
/// `reconcile` may be called concurrently, for the same or different
/// ingresses. The reporter's throttle is the only shared mutable state; two
/// overlapping calls for the same ingress resolve by last write wins.
#[derive(Debug)]
pub struct Reconciler<F, V, R> {
    fetch: F,
    verify: V,
    report: R,
    mode: Mode,
    interval: Duration,
}

// === impl Reconciler ===

impl<F, V, R> Reconciler<F, V, R>
where
    F: Fetch,
    V: Verify,
    R: Report,
{
    pub fn new(fetch: F, verify: V, report: R, mode: Mode, interval: Duration) -> Self {
        Self {
            fetch,
            verify,
            report,
            mode,
            interval,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Audits the ingress, returning the delay after which it should be
    /// audited again.
    pub async fn reconcile(&self, id: &IngressId) -> Result<Duration, Violation> {
        self.reconcile_at(id, Utc::now()).await
    }

    #[instrument(skip_all, fields(namespace = %id.namespace, name = %id.name))]
    pub async fn reconcile_at(
        &self,
        id: &IngressId,
        now: DateTime<Utc>,
    ) -> Result<Duration, Violation> {
        let violation = match self.evaluate(id).await {
            Ok(()) => {
                info!("Ingress TLS is applied correctly");
                return Ok(self.interval);
            }
            Err(violation) => violation,
        };

        let kind = violation.kind();
        let reported = self.report.report(id, &violation, now).await;
        match self.mode {
            Mode::Throttled => {
                match reported {
                    Ok(Outcome::Recorded) => warn!(%kind, %violation, "Recorded violation"),
                    Ok(Outcome::Suppressed) => {
                        debug!(%kind, "Violation already recorded within interval")
                    }
                    Err(error) => tracing::error!(%error, "Failed to record violation"),
                }
                Ok(self.interval)
            }
            Mode::Strict => {
                reported?;
                Err(violation)
            }
        }
    }

    /// Discards throttling state for an ingress that has been deleted.
    pub fn forget(&self, id: &IngressId) {
        debug!(namespace = %id.namespace, name = %id.name, "Forgetting ingress");
        self.report.forget(id);
    }

    async fn evaluate(&self, id: &IngressId) -> Result<(), Violation> {
        let ingress = self
            .fetch
            .fetch_ingress(id)
            .await
            .map_err(Violation::IngressUnreachable)?;
        pipeline::check(&ingress, &self.fetch, &self.verify).await
    }
}
