//! # Clubhouse Engine
//!
//! Wires the catalog, pricing and discount components to one attribute
//! store and one configuration.
//!
//! ## Component Wiring
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ClubhouseEngine                                │
//! │                                                                         │
//! │   EngineConfig ──validate──┐                                            │
//! │                            ▼                                            │
//! │   AttributeStore ──► AttributeLocaleResolver (canonical_id attribute)   │
//! │        │                   │                                            │
//! │        │         ┌─────────┼──────────────────┐                         │
//! │        ▼         ▼         ▼                  ▼                         │
//! │   ┌──────────────────┐ ┌────────────────┐ ┌────────────────────────┐    │
//! │   │  CourseCatalog   │ │ PricingEngine  │ │   DiscountEngine       │    │
//! │   │                  │─►│                │ │                        │    │
//! │   │ schedules, audit │ │ price cache    │ │ rules, order history   │    │
//! │   └──────────────────┘ └────────────────┘ └────────────────────────┘    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use clubhouse_core::{DiscountSchedule, Enrollment, Money, ScheduleResult, WeeklyScheduler};
use tracing::info;

use crate::catalog::{ConsistencyIssue, CourseCatalog};
use crate::config::EngineConfig;
use crate::discount::{DiscountEngine, DiscountMode};
use crate::error::EngineResult;
use crate::ports::{AttributeLocaleResolver, AttributeStore, LocaleResolver, OrderHistoryQuery};
use crate::pricing::PricingEngine;

/// The booking engine over one attribute store.
pub struct ClubhouseEngine {
    config: EngineConfig,
    catalog: CourseCatalog,
    pricing: Arc<PricingEngine>,
    discounts: DiscountEngine,
}

impl ClubhouseEngine {
    /// Builds every component from a validated configuration.
    ///
    /// Without `history`, retroactive passes evaluate the cart alone.
    pub fn from_config(
        config: EngineConfig,
        store: Arc<dyn AttributeStore>,
        history: Option<Arc<dyn OrderHistoryQuery>>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let resolver: Arc<dyn LocaleResolver> =
            Arc::new(AttributeLocaleResolver::new(store.clone()));
        let pricing = Arc::new(PricingEngine::from_config(&config, resolver.clone()));
        let scheduler = Arc::new(WeeklyScheduler::new(config.scheduler.safety_factor));
        let catalog = CourseCatalog::new(store, scheduler)
            .with_resolver(resolver.clone())
            .with_pricing(pricing.clone());
        let discounts = DiscountEngine::from_config(&config, resolver, history.clone());

        info!(
            safety_factor = config.scheduler.safety_factor,
            price_cache = config.pricing.cache_enabled,
            lookback_months = config.lookback_months(),
            order_history = history.is_some(),
            "Clubhouse engine ready"
        );

        Ok(Self {
            config,
            catalog,
            pricing,
            discounts,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn schedule_course(&self, course_id: &str) -> EngineResult<ScheduleResult> {
        self.catalog.schedule_course(course_id)
    }

    pub fn remaining_sessions(&self, course_id: &str, today: NaiveDate) -> EngineResult<u32> {
        self.catalog.remaining_sessions(course_id, today)
    }

    /// Price of an enrollment in `course_id` booked on `today`.
    pub fn price_enrollment(
        &self,
        course_id: &str,
        base_price: Money,
        per_session_rate: Money,
        today: NaiveDate,
    ) -> EngineResult<Money> {
        self.catalog
            .price_enrollment(&self.pricing, course_id, base_price, per_session_rate, today)
    }

    pub fn set_attribute(&self, entity_id: &str, key: &str, value: &str) -> EngineResult<()> {
        self.catalog.set_attribute(entity_id, key, value)
    }

    pub fn compute_discounts(
        &self,
        cart: &[Enrollment],
        mode: &DiscountMode,
        today: NaiveDate,
    ) -> DiscountSchedule {
        self.discounts.compute_discounts(cart, mode, today)
    }

    pub fn audit_courses<'a, I>(&self, course_ids: I) -> Vec<ConsistencyIssue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.catalog.audit_courses(course_ids)
    }
}
