//! # Proration Rules
//!
//! Decides what an enrollment in a recurring course costs, given how many
//! sessions are left.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  total sessions   remaining          price                 basis        │
//! │  ──────────────   ─────────────────  ────────────────────  ──────────── │
//! │  0                any                base price            NotSchedul.  │
//! │  n > 0            0                  base price            Outside      │
//! │  n > 0            > n                base price            Outside      │
//! │  n > 0            n                  base price            FullCourse   │
//! │  n > 0            0 < r < n          rate × r              Prorated     │
//! │  n > 0            0 < r < n, rate 0  base price            NoSessionRate│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Someone enrolling before the course starts always pays the catalog base
//! price, never `rate × total`. Proration only applies strictly inside the
//! course window.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Which row of the decision table produced a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// The course has no computable schedule.
    NotSchedulable,
    /// Course not started yet, or already over.
    OutsideCourseWindow,
    /// Every session is still ahead.
    FullCourse,
    /// Charged per remaining session.
    Prorated,
    /// Inside the window, but no per-session rate is configured.
    NoSessionRate,
}

/// A computed price with the reason it was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Money,
    pub basis: PriceBasis,
}

/// Applies the proration decision table.
pub fn prorated_price(
    base_price: Money,
    per_session_rate: Money,
    remaining: u32,
    total: u32,
) -> PriceQuote {
    let (price, basis) = if total == 0 {
        (base_price, PriceBasis::NotSchedulable)
    } else if remaining == 0 || remaining > total {
        (base_price, PriceBasis::OutsideCourseWindow)
    } else if remaining == total {
        (base_price, PriceBasis::FullCourse)
    } else if per_session_rate.is_positive() {
        (per_session_rate * remaining, PriceBasis::Prorated)
    } else {
        (base_price, PriceBasis::NoSessionRate)
    };

    PriceQuote {
        price: price.clamp_non_negative(),
        basis,
    }
}
