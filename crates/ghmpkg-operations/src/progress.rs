use std::sync::atomic::{AtomicU64, Ordering};

use ghmpkg_events::{EventSinkHandle, MigrateEvent, OperationId, Outcome};

static NEXT_OP_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique id for correlating the events of one package.
pub fn next_op_id() -> OperationId {
    NEXT_OP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tracks how many packages of a run are done and emits `BatchProgress`.
pub(crate) struct BatchTracker {
    events: EventSinkHandle,
    total: u32,
    completed: u32,
    failed: u32,
}

impl BatchTracker {
    pub(crate) fn new(events: EventSinkHandle, total: u32) -> Self {
        Self {
            events,
            total,
            completed: 0,
            failed: 0,
        }
    }

    pub(crate) fn package_done(&mut self, outcome: Outcome) {
        self.completed += 1;
        if outcome == Outcome::Failed {
            self.failed += 1;
        }
        self.events.emit(MigrateEvent::BatchProgress {
            completed: self.completed,
            total: self.total,
            failed: self.failed,
        });
    }
}
