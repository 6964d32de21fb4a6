use std::fmt;

/// The reason an ingress failed its audit.
///
/// Exactly one kind is attributed per reconciliation: the first failing check.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    IngressUnreachable,
    SecretNameUnset,
    SecretUnreachable,
    CertOrKeyMissing,
    HostsEmpty,
    HandshakeFailed,
    RedirectMissing,
    RecordCreationFailed,
}

/// Coarse grouping of violation kinds by how they propagate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Class {
    /// The ingress or one of its secrets could not be fetched.
    UnreachableTarget,

    /// The ingress or its secret is misconfigured.
    MalformedConfiguration,

    /// The declared certificate is not served for a host.
    VerificationFailure,

    /// An audit record could not be persisted.
    PersistenceFailure,
}

/// A detected violation, carrying the underlying collaborator error when one
/// exists.
///
/// Each variant renders a stable, kind-specific message prefix so that
/// consumers of audit records may match on it.
#[derive(Debug, thiserror::Error)]
pub enum Violation {
    #[error("unable to fetch ingress: {0}")]
    IngressUnreachable(#[source] anyhow::Error),

    #[error("TLS entry does not set a secretName")]
    SecretNameUnset,

    #[error("unable to fetch secret {secret}: {error}")]
    SecretUnreachable {
        secret: String,
        #[source]
        error: anyhow::Error,
    },

    #[error("secret {secret} does not hold both tls.crt and tls.key")]
    CertOrKeyMissing { secret: String },

    #[error("TLS entry does not declare any hosts")]
    HostsEmpty,

    #[error("TLS verification failed for {host}: {error}")]
    HandshakeFailed {
        host: String,
        #[source]
        error: anyhow::Error,
    },

    #[error("TLS is not configured and no HTTPS redirect is applied")]
    RedirectMissing,

    #[error("failed to create audit record for {kind}: {error}")]
    RecordCreation {
        kind: ViolationKind,
        #[source]
        error: anyhow::Error,
    },
}

// === impl ViolationKind ===

impl ViolationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IngressUnreachable => "ingress_unreachable",
            Self::SecretNameUnset => "secret_name_unset",
            Self::SecretUnreachable => "secret_unreachable",
            Self::CertOrKeyMissing => "cert_or_key_missing",
            Self::HostsEmpty => "hosts_empty",
            Self::HandshakeFailed => "handshake_failed",
            Self::RedirectMissing => "redirect_missing",
            Self::RecordCreationFailed => "record_creation_failed",
        }
    }

    pub const fn class(&self) -> Class {
        match self {
            Self::IngressUnreachable | Self::SecretUnreachable => Class::UnreachableTarget,
            Self::SecretNameUnset
            | Self::CertOrKeyMissing
            | Self::HostsEmpty
            | Self::RedirectMissing => Class::MalformedConfiguration,
            Self::HandshakeFailed => Class::VerificationFailure,
            Self::RecordCreationFailed => Class::PersistenceFailure,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Violation ===

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Self::IngressUnreachable(_) => ViolationKind::IngressUnreachable,
            Self::SecretNameUnset => ViolationKind::SecretNameUnset,
            Self::SecretUnreachable { .. } => ViolationKind::SecretUnreachable,
            Self::CertOrKeyMissing { .. } => ViolationKind::CertOrKeyMissing,
            Self::HostsEmpty => ViolationKind::HostsEmpty,
            Self::HandshakeFailed { .. } => ViolationKind::HandshakeFailed,
            Self::RedirectMissing => ViolationKind::RedirectMissing,
            Self::RecordCreation { .. } => ViolationKind::RecordCreationFailed,
        }
    }
}
