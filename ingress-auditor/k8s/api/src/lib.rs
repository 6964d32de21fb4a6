#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod audit_log;
pub mod ingress;

pub use self::audit_log::{IngressTLSLog, IngressTLSLogSpec, IngressTLSLogStatus, LogLevel};
pub use k8s_openapi::api::{core::v1::Secret, networking::v1::Ingress};
pub use kube::{
    api::{Api, ObjectMeta, PostParams, ResourceExt},
    Client, Error, Resource,
};
