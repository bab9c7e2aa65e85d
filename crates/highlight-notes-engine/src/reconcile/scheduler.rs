//! Deciding when to re-resolve.
//!
//! The scheduler owns no timers. Callers feed it mutation records and the
//! current time, ask when it next needs attention with
//! [`ReconcileScheduler::next_deadline`], and call
//! [`ReconcileScheduler::poll`] at or after that instant.
//!
//! ```text
//! Idle ──start──▶ AwaitingCalm ──calm or max wait──▶ Watching ◀──┐
//!                                                      │         │
//!                                  childList ─▶ debounce ─▶ throttle ─▶ Reconcile
//! ```

use std::time::{Duration, Instant};

use highlight_notes_config::ReconcileConfig;

use crate::dom::{MutationKind, MutationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    AwaitingCalm,
    Watching,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    /// The page has settled after load; apply every anchor.
    InitialPass,
    /// Mutations were seen; check for wiped markers.
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingCalm {
        started: Instant,
        last_mutation: Instant,
    },
    Watching {
        due: Option<Instant>,
        last_pass: Option<Instant>,
    },
}

#[derive(Debug, Clone)]
pub struct ReconcileScheduler {
    calm: Duration,
    max_wait: Duration,
    debounce: Duration,
    throttle: Duration,
    suppression: Duration,
    phase: Phase,
    suppressed_until: Option<Instant>,
}

impl ReconcileScheduler {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            calm: config.calm(),
            max_wait: config.max_wait(),
            debounce: config.debounce(),
            throttle: config.throttle(),
            suppression: config.suppression(),
            phase: Phase::Idle,
            suppressed_until: None,
        }
    }

    pub fn state(&self, now: Instant) -> SchedulerState {
        match self.phase {
            Phase::Idle => SchedulerState::Idle,
            Phase::AwaitingCalm { .. } => SchedulerState::AwaitingCalm,
            Phase::Watching { .. } if self.is_suppressed(now) => SchedulerState::Suppressed,
            Phase::Watching { .. } => SchedulerState::Watching,
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }

    /// Begin waiting for the page to calm down. Ignored unless idle.
    pub fn start(&mut self, now: Instant) {
        if self.phase == Phase::Idle {
            log::debug!("Waiting for the page to settle");
            self.phase = Phase::AwaitingCalm {
                started: now,
                last_mutation: now,
            };
        }
    }

    pub fn on_mutations(&mut self, now: Instant, records: &[MutationRecord]) {
        if records.is_empty() {
            return;
        }
        match &mut self.phase {
            Phase::Idle => {}
            Phase::AwaitingCalm { last_mutation, .. } => *last_mutation = now,
            Phase::Watching { due, .. } => {
                if records.iter().any(|r| r.kind == MutationKind::ChildList) {
                    *due = Some(now + self.debounce);
                }
            }
        }
    }

    /// Open (or extend) the window during which passes are skipped.
    pub fn suppress(&mut self, now: Instant) {
        let until = now + self.suppression;
        self.suppressed_until = Some(self.suppressed_until.map_or(until, |u| u.max(until)));
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Idle => None,
            Phase::AwaitingCalm {
                started,
                last_mutation,
            } => Some((last_mutation + self.calm).min(started + self.max_wait)),
            Phase::Watching { due, .. } => due,
        }
    }

    /// Advance to `now` and report the pass to run, if any.
    pub fn poll(&mut self, now: Instant) -> Option<SchedulerAction> {
        match self.phase {
            Phase::Idle => None,
            Phase::AwaitingCalm {
                started,
                last_mutation,
            } => {
                let calm = now >= last_mutation + self.calm;
                let timed_out = now >= started + self.max_wait;
                if !calm && !timed_out {
                    return None;
                }
                if timed_out && !calm {
                    log::info!("Page never settled, applying highlights after max wait");
                } else {
                    log::info!("Page settled, applying highlights");
                }
                if let Some(until) = self.suppressed_until.filter(|_| self.is_suppressed(now)) {
                    // Run the initial pass once the window closes
                    self.phase = Phase::Watching {
                        due: Some(until),
                        last_pass: None,
                    };
                    return None;
                }
                self.phase = Phase::Watching {
                    due: None,
                    last_pass: Some(now),
                };
                Some(SchedulerAction::InitialPass)
            }
            Phase::Watching { due, last_pass } => {
                let due = due.filter(|&due| now >= due)?;
                if self.is_suppressed(now) {
                    log::debug!("Skipping reconciliation inside suppression window");
                    self.phase = Phase::Watching {
                        due: None,
                        last_pass,
                    };
                    return None;
                }
                if let Some(last) = last_pass
                    && now < last + self.throttle
                {
                    let deferred = (last + self.throttle).max(due);
                    self.phase = Phase::Watching {
                        due: Some(deferred),
                        last_pass,
                    };
                    return None;
                }
                self.phase = Phase::Watching {
                    due: None,
                    last_pass: Some(now),
                };
                Some(SchedulerAction::Reconcile)
            }
        }
    }

    /// Stop observing; the scheduler becomes idle and forgets all timers.
    pub fn teardown(&mut self) {
        self.phase = Phase::Idle;
        self.suppressed_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, MutationKind};
    use pretty_assertions::assert_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn child_list() -> Vec<MutationRecord> {
        let doc = Document::new();
        vec![MutationRecord {
            kind: MutationKind::ChildList,
            target: doc.root(),
        }]
    }

    fn attributes() -> Vec<MutationRecord> {
        let doc = Document::new();
        vec![MutationRecord {
            kind: MutationKind::Attributes,
            target: doc.root(),
        }]
    }

    fn watching(t0: Instant) -> ReconcileScheduler {
        watching_with(t0, &ReconcileConfig::default())
    }

    fn watching_with(t0: Instant, config: &ReconcileConfig) -> ReconcileScheduler {
        let mut scheduler = ReconcileScheduler::new(config);
        scheduler.start(t0);
        assert_eq!(scheduler.poll(t0 + ms(300)), Some(SchedulerAction::InitialPass));
        scheduler
    }

    #[test]
    fn test_initial_pass_after_calm() {
        let t0 = Instant::now();
        let mut scheduler = ReconcileScheduler::new(&ReconcileConfig::default());
        assert_eq!(scheduler.state(t0), SchedulerState::Idle);

        scheduler.start(t0);
        assert_eq!(scheduler.state(t0), SchedulerState::AwaitingCalm);
        scheduler.on_mutations(t0 + ms(200), &attributes());

        assert_eq!(scheduler.next_deadline(), Some(t0 + ms(500)));
        assert_eq!(scheduler.poll(t0 + ms(300)), None);
        assert_eq!(scheduler.poll(t0 + ms(500)), Some(SchedulerAction::InitialPass));
        assert_eq!(scheduler.state(t0 + ms(500)), SchedulerState::Watching);
    }

    #[test]
    fn test_initial_pass_forced_by_max_wait() {
        // Given a page that mutates every 100ms forever
        let t0 = Instant::now();
        let mut scheduler = ReconcileScheduler::new(&ReconcileConfig::default());
        scheduler.start(t0);

        // When the mutations keep coming past the ceiling
        let mut fired_at = None;
        for step in 1..=60 {
            let now = t0 + ms(step * 100);
            if let Some(action) = scheduler.poll(now) {
                fired_at = Some((now, action));
                break;
            }
            scheduler.on_mutations(now, &child_list());
        }

        // Then the initial pass still happens at the max wait
        assert_eq!(fired_at, Some((t0 + ms(5000), SchedulerAction::InitialPass)));
    }

    #[test]
    fn test_debounce_restarts_on_child_list_only() {
        let t0 = Instant::now();
        let mut scheduler = watching(t0);
        let t1 = t0 + ms(2000);

        scheduler.on_mutations(t1, &attributes());
        assert_eq!(scheduler.next_deadline(), None);

        scheduler.on_mutations(t1, &child_list());
        scheduler.on_mutations(t1 + ms(400), &child_list());
        assert_eq!(scheduler.poll(t1 + ms(500)), None);
        assert_eq!(scheduler.next_deadline(), Some(t1 + ms(900)));
        assert_eq!(scheduler.poll(t1 + ms(900)), Some(SchedulerAction::Reconcile));
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_throttle_defers_to_trailing_edge() {
        // Given a pass that just ran
        let t0 = Instant::now();
        let mut scheduler = watching(t0);
        let t1 = t0 + ms(1000);
        scheduler.on_mutations(t1, &child_list());
        assert_eq!(scheduler.poll(t1 + ms(500)), Some(SchedulerAction::Reconcile));

        // When another burst settles inside the throttle interval
        scheduler.on_mutations(t1 + ms(600), &child_list());
        assert_eq!(scheduler.poll(t1 + ms(1100)), None);

        // Then it runs once the interval has elapsed instead of being lost
        assert_eq!(scheduler.next_deadline(), Some(t1 + ms(1500)));
        assert_eq!(scheduler.poll(t1 + ms(1500)), Some(SchedulerAction::Reconcile));
    }

    #[test]
    fn test_suppression_swallows_pass() {
        let t0 = Instant::now();
        let mut scheduler = watching(t0);
        let t1 = t0 + ms(3000);

        scheduler.suppress(t1);
        scheduler.on_mutations(t1, &child_list());
        assert_eq!(scheduler.state(t1), SchedulerState::Suppressed);

        // Debounce (500ms) fires exactly as the window closes: not suppressed
        assert_eq!(scheduler.poll(t1 + ms(499)), None);
        assert_eq!(scheduler.state(t1 + ms(500)), SchedulerState::Watching);

        // A debounce that fires inside the window is dropped
        let config = ReconcileConfig {
            debounce_ms: 100,
            ..Default::default()
        };
        let mut scheduler = watching_with(t0, &config);
        scheduler.suppress(t1);
        scheduler.on_mutations(t1, &child_list());
        assert_eq!(scheduler.poll(t1 + ms(100)), None);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_suppression_during_calm_defers_initial_pass() {
        let t0 = Instant::now();
        let mut scheduler = ReconcileScheduler::new(&ReconcileConfig::default());
        scheduler.start(t0);
        scheduler.suppress(t0 + ms(100));

        assert_eq!(scheduler.poll(t0 + ms(300)), None);
        assert_eq!(scheduler.next_deadline(), Some(t0 + ms(600)));
        assert_eq!(scheduler.poll(t0 + ms(600)), Some(SchedulerAction::Reconcile));
    }

    #[test]
    fn test_teardown_returns_to_idle() {
        let t0 = Instant::now();
        let mut scheduler = watching(t0);
        scheduler.on_mutations(t0 + ms(400), &child_list());

        scheduler.teardown();

        assert_eq!(scheduler.state(t0), SchedulerState::Idle);
        assert_eq!(scheduler.next_deadline(), None);
        assert_eq!(scheduler.poll(t0 + ms(10_000)), None);
        scheduler.on_mutations(t0 + ms(10_000), &child_list());
        assert!(!scheduler.is_running());
    }
}
