use crate::{IngressId, ViolationKind};
use ahash::AHashMap as HashMap;
use chrono::{offset::Utc, DateTime};
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};

pub type SharedThrottle = Arc<Throttle>;

/// Remembers the last violation reported for each ingress so that the same
/// violation is reported at most once per interval.
///
/// Each ingress has at most one entry; setting an entry overwrites it. The
/// violation kind and report time live in a single value so that readers never
/// observe one without the other.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    reports: RwLock<HashMap<IngressId, Reported>>,
}

/// The last report made for an ingress.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reported {
    pub kind: ViolationKind,
    pub at: DateTime<Utc>,
}

// === impl Throttle ===

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            reports: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(interval: Duration) -> SharedThrottle {
        Arc::new(Self::new(interval))
    }

    pub fn get(&self, id: &IngressId) -> Option<Reported> {
        self.reports.read().get(id).copied()
    }

    pub fn set(&self, id: IngressId, reported: Reported) {
        self.reports.write().insert(id, reported);
    }

    pub fn delete(&self, id: &IngressId) -> Option<Reported> {
        self.reports.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }

    /// Returns true if `kind` was already reported for the ingress within the
    /// window `[at, at + interval)` containing `now`.
    pub fn suppresses(&self, id: &IngressId, kind: ViolationKind, now: DateTime<Utc>) -> bool {
        let Some(last) = self.get(id) else {
            return false;
        };
        if last.kind != kind {
            return false;
        }
        match now.signed_duration_since(last.at).to_std() {
            Ok(elapsed) => elapsed < self.interval,
            // The report is newer than `now`.
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn id() -> IngressId {
        IngressId::new("default", "web")
    }

    #[test]
    fn empty_does_not_suppress() {
        let throttle = Throttle::new(HOUR);
        assert!(!throttle.suppresses(&id(), ViolationKind::HostsEmpty, Utc::now()));
    }

    #[test]
    fn suppresses_same_kind_within_interval() {
        let throttle = Throttle::new(HOUR);
        let at = Utc::now();
        throttle.set(
            id(),
            Reported {
                kind: ViolationKind::HostsEmpty,
                at,
            },
        );

        assert!(throttle.suppresses(&id(), ViolationKind::HostsEmpty, at));
        assert!(throttle.suppresses(
            &id(),
            ViolationKind::HostsEmpty,
            at + TimeDelta::minutes(59)
        ));
        assert!(!throttle.suppresses(
            &id(),
            ViolationKind::HostsEmpty,
            at + TimeDelta::minutes(60)
        ));
    }

    #[test]
    fn different_kind_is_not_suppressed() {
        let throttle = Throttle::new(HOUR);
        let at = Utc::now();
        throttle.set(
            id(),
            Reported {
                kind: ViolationKind::HostsEmpty,
                at,
            },
        );
        assert!(!throttle.suppresses(&id(), ViolationKind::HandshakeFailed, at));
        assert!(!throttle.suppresses(
            &IngressId::new("default", "other"),
            ViolationKind::HostsEmpty,
            at
        ));
    }

    #[test]
    fn set_overwrites_and_delete_removes() {
        let throttle = Throttle::new(HOUR);
        let at = Utc::now();
        throttle.set(
            id(),
            Reported {
                kind: ViolationKind::HostsEmpty,
                at,
            },
        );
        let later = Reported {
            kind: ViolationKind::RedirectMissing,
            at: at + TimeDelta::seconds(5),
        };
        throttle.set(id(), later);
        assert_eq!(throttle.len(), 1);
        assert_eq!(throttle.get(&id()), Some(later));

        assert_eq!(throttle.delete(&id()), Some(later));
        assert!(throttle.is_empty());
        assert!(!throttle.suppresses(&id(), ViolationKind::RedirectMissing, later.at));
    }

    #[test]
    fn report_from_the_future_does_not_suppress() {
        let throttle = Throttle::new(HOUR);
        let at = Utc::now();
        throttle.set(
            id(),
            Reported {
                kind: ViolationKind::HostsEmpty,
                at,
            },
        );
        assert!(!throttle.suppresses(
            &id(),
            ViolationKind::HostsEmpty,
            at - TimeDelta::seconds(1)
        ));
    }

    #[test]
    fn concurrent_writers_leave_whole_entries() {
        let throttle = Throttle::shared(HOUR);
        let at = Utc::now();
        let kinds = [ViolationKind::HostsEmpty, ViolationKind::RedirectMissing];

        let handles = (0..8)
            .map(|i| {
                let throttle = throttle.clone();
                std::thread::spawn(move || {
                    for n in 0..1_000 {
                        let kind = kinds[(i + n) % 2];
                        let offset = if kind == ViolationKind::HostsEmpty { 0 } else { 1 };
                        throttle.set(
                            id(),
                            Reported {
                                kind,
                                at: at + TimeDelta::seconds(offset),
                            },
                        );
                        let seen = throttle.get(&id()).expect("entry must exist");
                        let expected = if seen.kind == ViolationKind::HostsEmpty {
                            0
                        } else {
                            1
                        };
                        assert_eq!(seen.at, at + TimeDelta::seconds(expected));
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("writer must not panic");
        }
        assert_eq!(throttle.len(), 1);
    }
}
