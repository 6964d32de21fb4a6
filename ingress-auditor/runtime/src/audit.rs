use crate::{
    core::{IngressId, Reconciler, Recorder, Violation},
    k8s::{self, Api, Client, ResourceExt},
    metrics::{Instrumented, Metrics},
    tls::Verifier,
    KubeCluster,
};
use futures::prelude::*;
use kube::runtime::{
    controller::{self, Action, Controller},
    watcher,
};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

pub(crate) type AuditReconciler =
    Reconciler<KubeCluster, Verifier, Instrumented<Recorder<KubeCluster>>>;

pub(crate) struct Context {
    reconciler: Arc<AuditReconciler>,
    metrics: Metrics,
}

// === impl Context ===

impl Context {
    pub(crate) fn shared(reconciler: Arc<AuditReconciler>, metrics: Metrics) -> Arc<Self> {
        Arc::new(Self {
            reconciler,
            metrics,
        })
    }
}

/// Audits every ingress in the cluster, re-auditing each one after the
/// delay returned by the reconciler, until shutdown is signaled.
pub(crate) async fn run(client: Client, ctx: Arc<Context>, drain: drain::Watch) {
    let mode = ctx.reconciler.mode();
    let interval = ctx.reconciler.interval();
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let ingresses = Api::<k8s::Ingress>::all(client);
    let controller = Controller::new(ingresses, watcher::Config::default())
        .graceful_shutdown_on(close_rx.map(|_| ()))
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((ingress, _)) => trace!(%ingress, "Audited"),
                Err(controller::Error::ReconcilerFailed(error, ingress)) => {
                    debug!(%ingress, %error, "Audit failed")
                }
                Err(error) => warn!(%error, "Controller failed"),
            }
        });
    tokio::pin!(controller);

    info!(?mode, ?interval, "Auditing ingresses");
    tokio::select! {
        _ = &mut controller => {}
        release = drain.signaled() => {
            let _ = close_tx.send(());
            release.release_after(controller).await;
        }
    }
}

async fn reconcile(ingress: Arc<k8s::Ingress>, ctx: Arc<Context>) -> Result<Action, Violation> {
    ctx.metrics.reconciled();
    let delay = ctx.reconciler.reconcile(&ingress_id(&ingress)).await?;
    Ok(Action::requeue(delay))
}

fn error_policy(ingress: Arc<k8s::Ingress>, error: &Violation, ctx: Arc<Context>) -> Action {
    let id = ingress_id(&ingress);
    warn!(
        namespace = %id.namespace,
        name = %id.name,
        kind = %error.kind(),
        %error,
        "Ingress TLS is not applied correctly",
    );
    Action::requeue(ctx.reconciler.interval())
}

fn ingress_id(ingress: &k8s::Ingress) -> IngressId {
    IngressId::new(ingress.namespace().unwrap_or_default(), ingress.name_any())
}
