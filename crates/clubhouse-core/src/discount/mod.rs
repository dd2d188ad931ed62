//! # Discount Evaluation
//!
//! Pure evaluation of family discounts over one customer's enrollments.
//!
//! ## Evaluation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  history (finished orders) ──┐                                          │
//! │                              ├──► eligible entries (child set, price≥0) │
//! │  cart ───────────────────────┘            │                             │
//! │                                           ▼                             │
//! │        ┌──────────────┬────────────────┬─────────────┬──────────────┐   │
//! │        │ sibling tiers│ camp weeks     │ course days │ tournament   │   │
//! │        │ per family   │ child × season │ child×season│ child×series │   │
//! │        └──────┬───────┴───────┬────────┴──────┬──────┴──────┬───────┘   │
//! │               └───────────────┴───── offers ──┴─────────────┘           │
//! │                                           │                             │
//! │                      best offer per cart line (never stacked)           │
//! │                                           ▼                             │
//! │                                  DiscountSchedule                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! History entries take up positions in every ordering but never receive an
//! allocation: only what is in the cart can still change price.

mod evaluate;
pub mod rules;

pub use evaluate::evaluate;
pub use rules::{default_rules, AppliedRule, RejectedRule, RuleRejection, RuleSet};

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{DiscountAllocation, EntityId, Enrollment};

/// Allocations of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountSchedule {
    allocations: Vec<DiscountAllocation>,
    /// Cart enrollments left out of grouping (no child, negative price).
    skipped: Vec<EntityId>,
    /// History lookups answered from cache during the pass.
    pub history_hits: u32,
    /// History lookups that reached the order store.
    pub history_misses: u32,
}

impl DiscountSchedule {
    pub(crate) fn new(allocations: Vec<DiscountAllocation>, skipped: Vec<EntityId>) -> Self {
        DiscountSchedule {
            allocations,
            skipped,
            history_hits: 0,
            history_misses: 0,
        }
    }

    /// Records the history cache counters of the pass that built this schedule.
    pub fn with_history_stats(mut self, hits: u32, misses: u32) -> Self {
        self.history_hits = hits;
        self.history_misses = misses;
        self
    }

    pub fn allocations(&self) -> &[DiscountAllocation] {
        &self.allocations
    }

    pub fn into_allocations(self) -> Vec<DiscountAllocation> {
        self.allocations
    }

    pub fn skipped(&self) -> &[EntityId] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Total allocated to one enrollment (zero or negative).
    pub fn amount_for(&self, enrollment_id: &str) -> Money {
        self.allocations
            .iter()
            .filter(|a| a.enrollment_id == enrollment_id)
            .map(|a| a.amount)
            .sum()
    }

    /// Unit price after discounts, never below zero.
    pub fn net_price(&self, enrollment: &Enrollment) -> Money {
        (enrollment.unit_price + self.amount_for(&enrollment.id)).clamp_non_negative()
    }

    /// Sum of all allocations (zero or negative).
    pub fn total_discount(&self) -> Money {
        self.allocations.iter().map(|a| a.amount).sum()
    }
}
