//! Join counter for one backfill round.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Finalize = Box<dyn FnOnce() + Send>;

/// Counts outstanding sub-requests and runs `finalize` exactly once when the
/// last one completes.
///
/// The group is sized at construction, before any worker exists, so no
/// completion can observe a zero count early. A group created with zero
/// requests finalizes immediately.
pub struct PendingRequestGroup {
    remaining: AtomicUsize,
    finalize: Mutex<Option<Finalize>>,
}

impl PendingRequestGroup {
    pub fn new(count: usize, finalize: Finalize) -> Arc<Self> {
        let group = Arc::new(Self {
            remaining: AtomicUsize::new(count),
            finalize: Mutex::new(Some(finalize)),
        });
        if count == 0 {
            group.run_finalize();
        }
        group
    }

    /// Record one completion, success or failure. Returns true for the call
    /// that brought the count to zero. Extra calls past zero are ignored.
    pub fn complete(&self) -> bool {
        let previous = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                self.run_finalize();
                true
            }
            _ => false,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    fn run_finalize(&self) {
        let finalize = match self.finalize.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(finalize) = finalize {
            finalize();
        }
    }
}
