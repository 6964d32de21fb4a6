#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod ingress;
pub mod pipeline;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod throttle;
mod violation;


pub use self::{
    ingress::{IngressId, IngressTarget, SecretBlob, TlsEntry},
    pipeline::{Fetch, Verify},
    reconcile::{Mode, Reconciler},
    record::{AuditRecord, Level},
    report::{Create, Outcome, Recorder, Report},
    throttle::{Reported, SharedThrottle, Throttle},
    violation::{Class, Violation, ViolationKind},
};

/// Secret data key holding the PEM encoded certificate chain.
pub const TLS_CERT_KEY: &str = "tls.crt";

/// Secret data key holding the PEM encoded private key.
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";
