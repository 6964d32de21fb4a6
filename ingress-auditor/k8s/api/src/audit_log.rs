use chrono::{offset::Utc, DateTime};
use ingress_auditor_core::{AuditRecord, Level};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::{api::ObjectMeta, CustomResource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Records a TLS violation detected on an ingress.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "ingress-audit.morty.dev",
    version = "v1alpha1",
    kind = "IngressTLSLog",
    status = "IngressTLSLogStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IngressTLSLogSpec {
    pub level: LogLevel,

    #[schemars(length(min = 1, max = 15))]
    pub namespace: String,

    #[schemars(length(min = 1, max = 25))]
    pub ingress_name: String,

    #[schemars(length(min = 1, max = 120))]
    pub message: String,

    /// When the violation was detected, with second precision.
    pub generation_timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
}

/// Lifecycle state maintained outside of the auditor.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct IngressTLSLogStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

// === impl IngressTLSLog ===

impl IngressTLSLog {
    /// Builds the resource persisting `record` in the given namespace.
    pub fn from_record(record: AuditRecord, namespace: impl ToString) -> Self {
        let AuditRecord {
            name,
            level,
            namespace: ingress_namespace,
            ingress_name,
            message,
            generation_timestamp,
        } = record;

        Self {
            metadata: ObjectMeta {
                name: Some(name),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec: IngressTLSLogSpec {
                level: level.into(),
                namespace: ingress_namespace,
                ingress_name,
                message,
                generation_timestamp,
            },
            status: None,
        }
    }
}

// === impl LogLevel ===

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => Self::Error,
            Level::Warn => Self::Warn,
            Level::Info => Self::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ingress_auditor_core::{IngressId, Violation};
    use kube::CustomResourceExt;
    use pretty_assertions::assert_eq;

    fn record() -> AuditRecord {
        let at = Utc
            .with_ymd_and_hms(2025, 3, 7, 14, 5, 9)
            .single()
            .expect("valid timestamp");
        AuditRecord::build(
            &IngressId::new("default", "web"),
            &Violation::RedirectMissing,
            at,
        )
    }

    #[test]
    fn persists_record_in_audit_namespace() {
        let record = record();
        let name = record.name.clone();
        let log = IngressTLSLog::from_record(record, "ingress-auditor-system");

        assert_eq!(log.metadata.name, Some(name));
        assert_eq!(
            log.metadata.namespace.as_deref(),
            Some("ingress-auditor-system")
        );
        assert_eq!(log.spec.namespace, "default");
        assert_eq!(log.spec.ingress_name, "web");
        assert_eq!(log.spec.level, LogLevel::Error);
        assert!(log.status.is_none());
    }

    #[test]
    fn spec_serializes_with_persisted_field_names() {
        let log = IngressTLSLog::from_record(record(), "ingress-auditor-system");
        let spec = serde_json::to_value(&log.spec).expect("spec must serialize");
        assert_eq!(
            spec,
            serde_json::json!({
                "level": "Error",
                "namespace": "default",
                "ingressName": "web",
                "message": "TLS is not configured and no HTTPS redirect is applied",
                "generationTimestamp": "2025-03-07T14:05:09Z",
            })
        );
    }

    #[test]
    fn crd_bounds_field_lengths() {
        let crd = serde_json::to_value(IngressTLSLog::crd()).expect("CRD must serialize");
        assert_eq!(crd["spec"]["group"], "ingress-audit.morty.dev");
        assert_eq!(crd["spec"]["names"]["kind"], "IngressTLSLog");

        let schema = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"];
        let props = &schema["properties"]["spec"]["properties"];
        for (field, max) in [("namespace", 15), ("ingressName", 25), ("message", 120)] {
            assert_eq!(props[field]["minLength"], 1, "{field}");
            assert_eq!(props[field]["maxLength"], max, "{field}");
        }
    }
}
