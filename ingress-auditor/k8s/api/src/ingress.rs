use ingress_auditor_core::{IngressTarget, SecretBlob, TlsEntry, TLS_CERT_KEY, TLS_PRIVATE_KEY_KEY};
use k8s_openapi::api::{core::v1::Secret, networking::v1::Ingress};
use kube::ResourceExt;

/// Extracts the audited fields of an ingress.
pub fn ingress_target(ingress: &Ingress) -> IngressTarget {
    let tls = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .into_iter()
        .flatten()
        .map(|tls| TlsEntry {
            secret_name: tls.secret_name.clone(),
            hosts: tls.hosts.clone().unwrap_or_default(),
        })
        .collect();

    IngressTarget {
        namespace: ingress.namespace().unwrap_or_default(),
        name: ingress.name_any(),
        tls,
        annotations: ingress.annotations().clone(),
    }
}

/// Extracts the certificate and key from a TLS secret.
pub fn secret_blob(secret: &Secret) -> SecretBlob {
    let get = |key: &str| {
        secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|bytes| bytes.0.clone())
    };
    SecretBlob {
        certificate: get(TLS_CERT_KEY),
        key: get(TLS_PRIVATE_KEY_KEY),
    }
}
