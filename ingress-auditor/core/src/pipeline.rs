//! The ordered set of checks applied to a single ingress.
//!
//! Checks stop at the first failure, so at most one [`Violation`] is produced
//! per pass and later TLS entries or hosts are never examined once an earlier
//! one fails.

use crate::{IngressId, IngressTarget, SecretBlob, Violation};
use anyhow::Result;
use std::{collections::BTreeMap, sync::Arc};

/// Annotation key fragments that indicate plaintext traffic is redirected.
///
/// Matching is a case-sensitive substring match on annotation keys. A
/// `configuration-snippet` whose value returns a 30x status is not detected.
pub const REDIRECT_MARKERS: [&str; 2] = ["permanent-redirect", "temporary-redirect"];

/// Reads cluster resources by namespaced name.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_ingress(&self, id: &IngressId) -> Result<IngressTarget>;

    async fn fetch_secret(&self, namespace: &str, name: &str) -> Result<SecretBlob>;
}

/// Confirms that a host serves the given certificate.
///
/// Implementations must report malformed certificate material as an error.
#[async_trait::async_trait]
pub trait Verify: Send + Sync {
    async fn verify(&self, certificate: &[u8], key: &[u8], host: &str) -> Result<()>;
}

/// Runs every check against the ingress, returning the first violation.
pub async fn check<F, V>(ingress: &IngressTarget, fetch: &F, verify: &V) -> Result<(), Violation>
where
    F: Fetch + ?Sized,
    V: Verify + ?Sized,
{
    if ingress.tls.is_empty() {
        if has_redirect_annotation(&ingress.annotations) {
            tracing::debug!("TLS is not used but a redirect is applied");
            return Ok(());
        }
        return Err(Violation::RedirectMissing);
    }

    for entry in &ingress.tls {
        let secret_name = entry.secret_name().ok_or(Violation::SecretNameUnset)?;

        let secret = fetch
            .fetch_secret(&ingress.namespace, secret_name)
            .await
            .map_err(|error| Violation::SecretUnreachable {
                secret: secret_name.to_string(),
                error,
            })?;

        let (certificate, key) = secret.key_pair().ok_or_else(|| Violation::CertOrKeyMissing {
            secret: secret_name.to_string(),
        })?;

        if entry.hosts.is_empty() {
            return Err(Violation::HostsEmpty);
        }

        for host in &entry.hosts {
            verify
                .verify(certificate, key, host)
                .await
                .map_err(|error| Violation::HandshakeFailed {
                    host: host.clone(),
                    error,
                })?;
        }

        tracing::debug!(secret = %secret_name, hosts = ?entry.hosts, "TLS entry verified");
    }

    Ok(())
}

/// Returns true if any annotation key contains a redirect marker.
pub fn has_redirect_annotation(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .keys()
        .any(|key| REDIRECT_MARKERS.iter().any(|marker| key.contains(marker)))
}

#[async_trait::async_trait]
impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    async fn fetch_ingress(&self, id: &IngressId) -> Result<IngressTarget> {
        (**self).fetch_ingress(id).await
    }

    async fn fetch_secret(&self, namespace: &str, name: &str) -> Result<SecretBlob> {
        (**self).fetch_secret(namespace, name).await
    }
}

#[async_trait::async_trait]
impl<T: Verify + ?Sized> Verify for Arc<T> {
    async fn verify(&self, certificate: &[u8], key: &[u8], host: &str) -> Result<()> {
        (**self).verify(certificate, key, host).await
    }
}
