//! # clubhouse-core: Pure Booking Logic for Clubhouse
//!
//! Schedule math, proration and family discount rules for camp, course and
//! tournament bookings. Everything in this crate is a pure function over
//! in-memory values.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Clubhouse Booking Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │              Host shop (catalog hooks, cart, checkout)          │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │ library calls                          │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                    clubhouse-engine                             │    │
//! │  │   CourseCatalog ─► PricingEngine        DiscountEngine          │    │
//! │  │   attribute store, caches, order history, config, tracing       │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ clubhouse-core (THIS CRATE) ★                   │    │
//! │  │                                                                 │    │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐   │    │
//! │  │   │  money   │ │ schedule │ │ pricing  │ │    discount      │   │    │
//! │  │   │  Money   │ │ Weekly-  │ │ prorated │ │ RuleSet          │   │    │
//! │  │   │  Rate    │ │ Scheduler│ │ _price   │ │ evaluate         │   │    │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘   │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO LOGGING • NO CLOCK • PURE FUNCTIONS               │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CourseDefinition, Enrollment, DiscountRule, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`terms`] - Parsing of week terms, dates, weekdays and holiday lists
//! - [`schedule`] - Weekly session scheduler
//! - [`pricing`] - Proration decision table
//! - [`discount`] - Family discount evaluation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: "today" is always a parameter, never read from a clock
//! 2. **Sentinels over panics**: bad catalog data yields `NotComputable`, not a crash
//! 3. **Integer Money**: all amounts are in cents (i64)
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use clubhouse_core::schedule::schedule_course;
//! use clubhouse_core::types::CourseDefinition;
//!
//! let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(); // a Monday
//! let holiday = NaiveDate::from_ymd_opt(2025, 2, 17).unwrap();
//! let course = CourseDefinition::new("tennis-mon", start, 10).with_holidays([holiday]);
//!
//! let result = schedule_course(&course).unwrap();
//! assert_eq!(result.end_date, NaiveDate::from_ymd_opt(2025, 3, 17).unwrap());
//! assert_eq!(result.sessions_counted, 10);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod pricing;
pub mod schedule;
pub mod terms;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use discount::{evaluate, DiscountSchedule, RuleSet};
pub use error::{CoreError, CoreResult, NotComputable, ValidationError};
pub use money::Money;
pub use pricing::{prorated_price, PriceBasis, PriceQuote};
pub use schedule::{SessionScheduler, WeeklyScheduler};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Multiplier on the occurrences a course needs that bounds the scheduler's
/// day scan.
pub const SCAN_SAFETY_FACTOR: u32 = 10;

/// Lookback window for retroactive discounts when none is configured.
pub const DEFAULT_LOOKBACK_MONTHS: u32 = 6;

/// Smallest accepted lookback window.
pub const MIN_LOOKBACK_MONTHS: u32 = 1;

/// Largest accepted lookback window.
///
/// ## Business Reason
/// Older orders belong to seasons that can no longer share a discount.
pub const MAX_LOOKBACK_MONTHS: u32 = 24;
