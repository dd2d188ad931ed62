//! # clubhouse-engine: Booking Engine for Clubhouse
//!
//! Connects the pure rules of `clubhouse-core` to the outside world:
//! attribute storage, translated catalog entries, order history, and
//! configuration.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 ClubhouseEngine (engine.rs)                      │  │
//! │  │                                                                  │  │
//! │  │  Built once from EngineConfig                                    │  │
//! │  │  Shares one LocaleResolver between all components                │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ CourseCatalog  │  │ PricingEngine  │  │   DiscountEngine       │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Course attrs   │  │ Prorated price │  │ Cart + order history   │    │
//! │  │ Schedule memo  │  │ Per-day cache  │  │ History cache, TTL     │    │
//! │  │ Audit          │  │                │  │ One span per pass      │    │
//! │  └───────┬────────┘  └────────────────┘  └───────────┬────────────┘    │
//! │          │                                           │                  │
//! │          ▼                                           ▼                  │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ports.rs: AttributeStore, LocaleResolver, OrderHistoryQuery,   │   │
//! │  │            DiscountRuleTable (+ in-memory implementations)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`catalog`] - Course definitions from attributes, schedule memo, audit
//! - [`config`] - Engine configuration (TOML file + environment)
//! - [`discount`] - Discount passes with retroactive order history
//! - [`engine`] - `ClubhouseEngine` wiring
//! - [`error`] - Engine error types
//! - [`ports`] - Collaborator traits and in-memory implementations
//! - [`pricing`] - Prorated course prices with a per-day cache
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clubhouse_engine::{ClubhouseEngine, DiscountMode, EngineConfig};
//!
//! let config = EngineConfig::load_or_default(None);
//! let engine = ClubhouseEngine::from_config(config, store, Some(history))?;
//!
//! let end = engine.schedule_course("tennis-mon")?.end_date;
//! let price = engine.price_enrollment("tennis-mon", base, rate, today)?;
//! let schedule = engine.compute_discounts(&cart, &DiscountMode::retroactive(customer), today);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod config;
pub mod discount;
pub mod engine;
pub mod error;
pub mod ports;
pub mod pricing;

// =============================================================================
// Re-exports
// =============================================================================

pub use catalog::{ConsistencyIssue, CourseCatalog};
pub use config::{DiscountSettings, EngineConfig, PricingSettings, SchedulerSettings};
pub use discount::{DiscountEngine, DiscountMode, HistoryCache, HistoryKey};
pub use engine::ClubhouseEngine;
pub use error::{EngineError, EngineResult};
pub use ports::{
    AttributeLocaleResolver, AttributeStore, ConfiguredRuleTable, DiscountRuleTable,
    HistoryQuery, IdentityResolver, LocaleResolver, MapLocaleResolver, MemoryAttributeStore,
    MemoryOrderHistory, OrderHistoryQuery, CANONICAL_ID_KEY,
};
pub use pricing::{PriceCache, PricingEngine};
