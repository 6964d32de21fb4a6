use crate::{
    core::{Fetch, IngressId, Reconciler, Report, Verify},
    k8s,
};
use parking_lot::RwLock;
use std::sync::Arc;

/// Watches ingresses so that the reconciler forgets an ingress once it is
/// deleted. A re-created ingress of the same name is then reported afresh.
///
/// Applies are ignored: audits are scheduled by the controller.
pub(crate) struct Deletions<F, V, R> {
    reconciler: Arc<Reconciler<F, V, R>>,
}

// === impl Deletions ===

impl<F, V, R> Deletions<F, V, R> {
    pub(crate) fn shared(reconciler: Arc<Reconciler<F, V, R>>) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self { reconciler }))
    }
}

impl<F, V, R> kubert::index::IndexNamespacedResource<k8s::Ingress> for Deletions<F, V, R>
where
    F: Fetch,
    V: Verify,
    R: Report,
{
    fn apply(&mut self, _: k8s::Ingress) {}

    fn delete(&mut self, namespace: String, name: String) {
        self.reconciler.forget(&IngressId::new(namespace, name));
    }
}
