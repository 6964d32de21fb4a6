use crate::{AuditRecord, IngressId, Reported, SharedThrottle, Violation};
use anyhow::Result;
use chrono::{offset::Utc, DateTime};
use std::sync::Arc;

/// Persists audit records.
#[async_trait::async_trait]
pub trait Create: Send + Sync {
    async fn create_record(&self, record: AuditRecord) -> Result<()>;
}

/// Records a detected violation.
///
/// An `Err` is always [`Violation::RecordCreation`].
#[async_trait::async_trait]
pub trait Report: Send + Sync {
    async fn report(
        &self,
        id: &IngressId,
        violation: &Violation,
        at: DateTime<Utc>,
    ) -> Result<Outcome, Violation>;

    /// Discards any state held for an ingress that no longer exists.
    fn forget(&self, _id: &IngressId) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A new audit record was created.
    Recorded,

    /// The same violation was already recorded within the throttle interval.
    Suppressed,
}

/// Builds audit records for violations and hands them to a [`Create`]
/// implementation, optionally suppressing repeats through a throttle.
///
/// The throttle is only updated once a record has been created, so a failed
/// creation is retried on the next report.
#[derive(Debug)]
pub struct Recorder<C> {
    create: C,
    throttle: Option<SharedThrottle>,
}

// === impl Recorder ===

impl<C> Recorder<C> {
    pub fn throttled(create: C, throttle: SharedThrottle) -> Self {
        Self {
            create,
            throttle: Some(throttle),
        }
    }

    /// Records every violation, with no suppression.
    pub fn unthrottled(create: C) -> Self {
        Self {
            create,
            throttle: None,
        }
    }

    pub fn throttle(&self) -> Option<&SharedThrottle> {
        self.throttle.as_ref()
    }
}

#[async_trait::async_trait]
impl<C: Create> Report for Recorder<C> {
    async fn report(
        &self,
        id: &IngressId,
        violation: &Violation,
        at: DateTime<Utc>,
    ) -> Result<Outcome, Violation> {
        let kind = violation.kind();
        if let Some(throttle) = &self.throttle {
            if throttle.suppresses(id, kind, at) {
                return Ok(Outcome::Suppressed);
            }
        }

        let record = AuditRecord::build(id, violation, at);
        let name = record.name.clone();
        self.create
            .create_record(record)
            .await
            .map_err(|error| Violation::RecordCreation { kind, error })?;
        tracing::debug!(record = %name, %kind, "Created audit record");

        if let Some(throttle) = &self.throttle {
            throttle.set(id.clone(), Reported { kind, at });
        }
        Ok(Outcome::Recorded)
    }

    fn forget(&self, id: &IngressId) {
        if let Some(throttle) = &self.throttle {
            throttle.delete(id);
        }
    }
}

#[async_trait::async_trait]
impl<T: Create + ?Sized> Create for Arc<T> {
    async fn create_record(&self, record: AuditRecord) -> Result<()> {
        (**self).create_record(record).await
    }
}

#[async_trait::async_trait]
impl<T: Report + ?Sized> Report for Arc<T> {
    async fn report(
        &self,
        id: &IngressId,
        violation: &Violation,
        at: DateTime<Utc>,
    ) -> Result<Outcome, Violation> {
        (**self).report(id, violation, at).await
    }

    fn forget(&self, id: &IngressId) {
        (**self).forget(id)
    }
}
