use crate::{
    core::{AuditRecord, Create, Fetch, IngressId, IngressTarget, SecretBlob},
    k8s::{self, Api, Client, IngressTLSLog, PostParams},
};
use anyhow::Result;

/// Reads ingresses and secrets from the API server and persists audit records
/// as `IngressTLSLog` resources.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    audit_namespace: String,
}

// === impl KubeCluster ===

impl KubeCluster {
    pub fn new(client: Client, audit_namespace: impl Into<String>) -> Self {
        Self {
            client,
            audit_namespace: audit_namespace.into(),
        }
    }
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster")
            .field("audit_namespace", &self.audit_namespace)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Fetch for KubeCluster {
    async fn fetch_ingress(&self, id: &IngressId) -> Result<IngressTarget> {
        let api = Api::<k8s::Ingress>::namespaced(self.client.clone(), &id.namespace);
        let ingress = api.get(&id.name).await?;
        Ok(k8s::ingress::ingress_target(&ingress))
    }

    async fn fetch_secret(&self, namespace: &str, name: &str) -> Result<SecretBlob> {
        let api = Api::<k8s::Secret>::namespaced(self.client.clone(), namespace);
        let secret = api.get(name).await?;
        Ok(k8s::ingress::secret_blob(&secret))
    }
}

#[async_trait::async_trait]
impl Create for KubeCluster {
    async fn create_record(&self, record: AuditRecord) -> Result<()> {
        let log = IngressTLSLog::from_record(record, &self.audit_namespace);
        let api = Api::<IngressTLSLog>::namespaced(self.client.clone(), &self.audit_namespace);
        api.create(&PostParams::default(), &log).await?;
        Ok(())
    }
}
