//! # FIFO Allocation Planning
//!
//! Decides which stock lots a sale draws from, without touching storage.
//!
//! ## Plan First, Write Second
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate("Whey", ₹100, qty 4)                                          │
//! │                                                                         │
//! │  Lots (ascending id, quantity > 0):                                     │
//! │    #3 ─ 1    #7 ─ 1    #8 ─ 2    #9 ─ 1                                │
//! │     │         │         │                                               │
//! │     ▼         ▼         ▼                                               │
//! │  take 1    take 1    take 2   → needed reaches 0, stop                 │
//! │                                                                         │
//! │  AllocationPlan { draws: [(#3,1), (#7,1), (#8,2)], allocated: 4 }      │
//! │                                                                         │
//! │  Only a COMPLETE plan is handed to the stock ledger for UPDATEs.       │
//! │  A short plan is either rejected (nothing written) or, when the        │
//! │  caller explicitly accepts a shortfall, applied as far as it goes.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// A lot as seen by the planner: row id and units remaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lot {
    pub id: i64,
    pub remaining: i64,
}

/// Units taken from one lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotDraw {
    pub unit_id: i64,
    pub taken: i64,
    /// Units left on the row after the draw.
    pub remaining_after: i64,
}

/// What to do when the lots cannot cover the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Fail with `InsufficientStock`; nothing is written.
    #[default]
    Reject,
    /// The user confirmed selling past available stock: take what exists.
    Proceed,
}

/// The draws that satisfy (part of) a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub requested: i64,
    pub allocated: i64,
    pub draws: Vec<LotDraw>,
}

impl AllocationPlan {
    /// Walks `lots` in the given order, taking `min(remaining, needed)` from
    /// each until the request is met or the lots run out.
    ///
    /// `lots` must already be in FIFO order (ascending id). Lots with no
    /// remaining units are skipped.
    pub fn greedy(lots: &[Lot], requested: i64) -> Self {
        let mut needed = requested.max(0);
        let mut draws = Vec::new();

        for lot in lots {
            if needed == 0 {
                break;
            }
            if lot.remaining <= 0 {
                continue;
            }
            let taken = lot.remaining.min(needed);
            needed -= taken;
            draws.push(LotDraw {
                unit_id: lot.id,
                taken,
                remaining_after: lot.remaining - taken,
            });
        }

        AllocationPlan {
            requested,
            allocated: requested.max(0) - needed,
            draws,
        }
    }

    /// Builds a plan and applies `policy` to any shortfall.
    ///
    /// `product` and `price` only feed the error message.
    pub fn build(
        lots: &[Lot],
        requested: i64,
        policy: ShortfallPolicy,
        product: &str,
        price: Money,
    ) -> CoreResult<Self> {
        let plan = Self::greedy(lots, requested);

        if plan.is_complete() || policy == ShortfallPolicy::Proceed {
            return Ok(plan);
        }

        Err(CoreError::InsufficientStock {
            product: product.to_string(),
            price,
            available: plan.allocated,
            requested,
        })
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.allocated == self.requested
    }

    /// Units requested but not covered by any lot.
    #[inline]
    pub fn shortfall(&self) -> i64 {
        self.requested - self.allocated
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lots(spec: &[(i64, i64)]) -> Vec<Lot> {
        spec.iter()
            .map(|&(id, remaining)| Lot { id, remaining })
            .collect()
    }

    #[test]
    fn test_takes_oldest_lots_first() {
        let plan = AllocationPlan::greedy(&lots(&[(3, 1), (7, 1), (8, 2), (9, 1)]), 3);

        assert!(plan.is_complete());
        assert_eq!(
            plan.draws,
            vec![
                LotDraw { unit_id: 3, taken: 1, remaining_after: 0 },
                LotDraw { unit_id: 7, taken: 1, remaining_after: 0 },
                LotDraw { unit_id: 8, taken: 1, remaining_after: 1 },
            ]
        );
    }

    #[test]
    fn test_skips_exhausted_lots() {
        let plan = AllocationPlan::greedy(&lots(&[(1, 0), (2, 5)]), 2);
        assert_eq!(plan.draws.len(), 1);
        assert_eq!(plan.draws[0].unit_id, 2);
        assert_eq!(plan.draws[0].remaining_after, 3);
    }

    #[test]
    fn test_short_plan_rejected_by_default() {
        let err = AllocationPlan::build(
            &lots(&[(1, 1), (2, 1)]),
            3,
            ShortfallPolicy::Reject,
            "Whey",
            Money::from_rupees(100),
        )
        .unwrap_err();

        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_short_plan_accepted_when_proceeding() {
        let plan = AllocationPlan::build(
            &lots(&[(1, 1), (2, 1)]),
            3,
            ShortfallPolicy::Proceed,
            "Whey",
            Money::from_rupees(100),
        )
        .unwrap();

        assert!(!plan.is_complete());
        assert_eq!(plan.allocated, 2);
        assert_eq!(plan.shortfall(), 1);
    }

    #[test]
    fn test_exact_fit_across_all_lots() {
        // Scenario: 5 units at one tier, sell all 5, then nothing is left
        let five = lots(&[(1, 1), (2, 1), (3, 1), (4, 1), (5, 1)]);
        let plan = AllocationPlan::greedy(&five, 5);
        assert!(plan.is_complete());
        assert!(plan.draws.iter().all(|d| d.remaining_after == 0));

        let empty = lots(&[(1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);
        let plan = AllocationPlan::greedy(&empty, 1);
        assert_eq!(plan.allocated, 0);
        assert!(plan.draws.is_empty());
    }
}
