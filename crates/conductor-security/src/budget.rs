use conductor_core::{BudgetScope, ConductorError, ConductorResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A monotonically increasing tool-call counter with a hard limit.
///
/// Safe to share between concurrently running workers; consumption is a
/// single compare-and-swap, so the limit is never overshot.
#[derive(Debug)]
pub struct Budget {
    limit: u32,
    used: AtomicU32,
}

impl Budget {
    /// A budget of `limit` units, none used.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            used: AtomicU32::new(0),
        }
    }

    /// The configured cap.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Units consumed so far.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Units left before exhaustion.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used())
    }

    /// Whether no units are left.
    pub fn is_exhausted(&self) -> bool {
        self.used() >= self.limit
    }

    fn try_consume(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.limit).then_some(used + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| used.checked_sub(1));
    }
}

/// The budget of one worker, charged in lockstep with the run-wide budget.
#[derive(Debug)]
pub struct WorkerBudget {
    worker_id: Uuid,
    local: Budget,
    global: Arc<Budget>,
}

impl WorkerBudget {
    /// A fresh worker budget of `limit` units charged against `global`.
    pub fn new(global: Arc<Budget>, limit: u32) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            local: Budget::new(limit),
            global,
        }
    }

    /// Identity stamped on this worker's execution records.
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// Units this worker has consumed.
    pub fn used(&self) -> u32 {
        self.local.used()
    }

    /// Per-worker cap.
    pub fn limit(&self) -> u32 {
        self.local.limit()
    }

    /// Units left for this worker.
    pub fn remaining(&self) -> u32 {
        self.local.remaining()
    }

    /// The run-wide budget this worker also charges.
    pub fn global(&self) -> &Arc<Budget> {
        &self.global
    }

    /// Charge one unit against both budgets, or neither.
    ///
    /// The global budget is reported first when both are exhausted.
    pub fn consume(&self) -> ConductorResult<()> {
        if self.global.is_exhausted() {
            return Err(self.exceeded(BudgetScope::Global));
        }
        if !self.local.try_consume() {
            return Err(self.exceeded(BudgetScope::Worker));
        }
        if !self.global.try_consume() {
            self.local.release();
            return Err(self.exceeded(BudgetScope::Global));
        }
        Ok(())
    }

    fn exceeded(&self, scope: BudgetScope) -> ConductorError {
        let limit = match scope {
            BudgetScope::Global => self.global.limit(),
            BudgetScope::Worker => self.local.limit(),
        };
        ConductorError::BudgetExceeded { scope, limit }
    }
}
