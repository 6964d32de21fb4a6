#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use ingress_auditor_core as core;
pub use ingress_auditor_k8s_api as k8s;
pub use ingress_auditor_tls as tls;

mod args;
mod audit;
mod cluster;
mod index;
mod metrics;

pub use self::{
    args::Args,
    cluster::KubeCluster,
    metrics::{Instrumented, Metrics},
};
