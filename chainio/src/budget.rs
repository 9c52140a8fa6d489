//! Per-cycle external call budget
//!
//! Every on-chain read and off-chain fetch is charged against a fixed
//! unit budget. Exceeding the budget is a logic error, so the meter only
//! exposes a check-then-charge operation and can never go negative.

use tracing::{debug, warn};

/// Cost of one adapter snapshot read (three contract calls)
pub const ADAPTER_READ_COST: u32 = 3;

/// Cost of one price-feed read
pub const PRICE_READ_COST: u32 = 1;

/// Cost of one off-chain HTTP fetch
pub const HTTP_FETCH_COST: u32 = 1;

/// Cost of one registry risk-record read
pub const REGISTRY_READ_COST: u32 = 1;

/// Strict per-cycle read meter
#[derive(Debug, Clone)]
pub struct CallBudget {
    limit: u32,
    spent: u32,
}

impl CallBudget {
    /// Create a meter with the configured unit limit
    pub fn new(limit: u32) -> Self {
        Self { limit, spent: 0 }
    }

    /// Charge `units` if the budget covers them. Returns false (and
    /// charges nothing) otherwise, so callers skip the read and continue
    /// with partial data.
    pub fn try_charge(&mut self, units: u32, label: &str) -> bool {
        if self.spent + units > self.limit {
            warn!(
                label,
                needed = units,
                remaining = self.remaining(),
                "read budget exhausted, skipping"
            );
            return false;
        }
        self.spent += units;
        debug!(label, units, spent = self.spent, limit = self.limit, "budget charged");
        true
    }

    /// Whether `units` could be charged without exceeding the limit
    pub fn can_afford(&self, units: u32) -> bool {
        self.spent + units <= self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit - self.spent
    }

    pub fn spent(&self) -> u32 {
        self.spent
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_until_exhausted() {
        let mut budget = CallBudget::new(7);
        assert!(budget.try_charge(ADAPTER_READ_COST, "adapter"));
        assert!(budget.try_charge(ADAPTER_READ_COST, "adapter"));
        assert_eq!(budget.remaining(), 1);

        // A 3-unit read no longer fits; nothing is charged
        assert!(!budget.try_charge(ADAPTER_READ_COST, "adapter"));
        assert_eq!(budget.spent(), 6);

        assert!(budget.try_charge(PRICE_READ_COST, "price"));
        assert_eq!(budget.remaining(), 0);
        assert!(!budget.try_charge(1, "http"));
    }

    #[test]
    fn can_afford_does_not_charge() {
        let budget = CallBudget::new(3);
        assert!(budget.can_afford(3));
        assert!(!budget.can_afford(4));
        assert_eq!(budget.spent(), 0);
    }
}
