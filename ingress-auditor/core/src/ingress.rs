use std::{collections::BTreeMap, fmt};

/// Identifies an ingress by namespace and name.
///
/// Formats as `<namespace>/<name>`, which is also the key used to throttle
/// repeated reports for the ingress.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IngressId {
    pub namespace: String,
    pub name: String,
}

/// The parts of an ingress resource that are audited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngressTarget {
    pub namespace: String,
    pub name: String,
    pub tls: Vec<TlsEntry>,
    pub annotations: BTreeMap<String, String>,
}

/// A TLS termination entry declared by an ingress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsEntry {
    pub secret_name: Option<String>,
    pub hosts: Vec<String>,
}

/// Certificate material read from a TLS secret. Either blob may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretBlob {
    pub certificate: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
}

// === impl IngressId ===

impl IngressId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for IngressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl IngressTarget ===

impl IngressTarget {
    pub fn id(&self) -> IngressId {
        IngressId::new(self.namespace.clone(), self.name.clone())
    }
}

// === impl TlsEntry ===

impl TlsEntry {
    /// Returns the referenced secret name, treating an empty name as unset.
    pub fn secret_name(&self) -> Option<&str> {
        self.secret_name.as_deref().filter(|name| !name.is_empty())
    }
}

// === impl SecretBlob ===

impl SecretBlob {
    /// Returns the certificate and key if both are present and non-empty.
    pub fn key_pair(&self) -> Option<(&[u8], &[u8])> {
        let certificate = self.certificate.as_deref().filter(|c| !c.is_empty())?;
        let key = self.key.as_deref().filter(|k| !k.is_empty())?;
        Some((certificate, key))
    }
}
