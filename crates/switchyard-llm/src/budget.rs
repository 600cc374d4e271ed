//! Process-lifetime spend tracking against a fixed ceiling.
//!
//! `spend` only ever grows. Reads and increments go through one mutex so that
//! concurrent successes never lose an update and a snapshot never observes a
//! half-applied one. The lock is never held across an `.await`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Fraction of the ceiling under which security tasks may prefer the metered backend
pub const SECURITY_HEADROOM: f64 = 0.8;

/// Consistent view of the budget at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub ceiling: f64,
    pub spend: f64,
    /// `ceiling - spend`; negative once an in-flight cost pushed spend over the ceiling
    pub remaining: f64,
}

#[derive(Debug)]
pub struct Budget {
    ceiling: f64,
    spend: Mutex<f64>,
}

impl Budget {
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling,
            spend: Mutex::new(0.0),
        }
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    pub fn spend(&self) -> f64 {
        *self.spend.lock()
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        let spend = *self.spend.lock();
        BudgetSnapshot {
            ceiling: self.ceiling,
            spend,
            remaining: self.ceiling - spend,
        }
    }

    /// True once spend has reached the ceiling
    pub fn is_exhausted(&self) -> bool {
        self.spend() >= self.ceiling
    }

    /// True while spend is below `fraction` of the ceiling
    pub fn is_below(&self, fraction: f64) -> bool {
        self.spend() < fraction * self.ceiling
    }

    /// Add a successful attempt's cost and return the new total.
    ///
    /// Negative or non-finite costs are ignored so spend stays monotonic.
    pub fn record(&self, cost: f64) -> f64 {
        let mut spend = self.spend.lock();
        if cost.is_finite() && cost > 0.0 {
            *spend += cost;
        }
        *spend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_and_snapshot() {
        let budget = Budget::new(1.0);
        assert_eq!(budget.record(0.25), 0.25);
        assert_eq!(budget.record(-5.0), 0.25);
        assert_eq!(budget.record(f64::NAN), 0.25);

        let snap = budget.snapshot();
        assert_eq!(snap.spend, 0.25);
        assert_eq!(snap.remaining, 0.75);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_overshoot_is_reported_as_negative_remaining() {
        let budget = Budget::new(0.01);
        budget.record(0.03);
        assert!(budget.is_exhausted());
        assert!(budget.snapshot().remaining < 0.0);
    }

    #[test]
    fn test_headroom_threshold() {
        let budget = Budget::new(10.0);
        budget.record(7.99);
        assert!(budget.is_below(SECURITY_HEADROOM));
        budget.record(0.01);
        assert!(!budget.is_below(SECURITY_HEADROOM));
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let budget = Arc::new(Budget::new(1000.0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        budget.record(0.5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(budget.spend(), 4000.0);
    }
}
