//! # Pricing Engine
//!
//! Prices course enrollments from their remaining sessions, with an explicit
//! cache keyed by canonical id and calendar day.
//!
//! ## Price Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  entity id ──► LocaleResolver ──► canonical id                          │
//! │                                        │                                │
//! │                          ┌─────────────▼─────────────┐                  │
//! │                          │ PriceCache                │── hit ──► price  │
//! │                          │ (canonical id, today)     │                  │
//! │                          └─────────────┬─────────────┘                  │
//! │                                        │ miss                           │
//! │                          ┌─────────────▼─────────────┐                  │
//! │                          │ SessionScheduler          │                  │
//! │                          │ total + remaining(today)  │                  │
//! │                          └─────────────┬─────────────┘                  │
//! │                                        ▼                                │
//! │                          prorated_price ──► cache ──► price             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The day is part of the key, so a cached price never outlives midnight.
//! Attribute edits invalidate explicitly through [`PricingEngine::invalidate`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use clubhouse_core::pricing::{prorated_price, PriceBasis, PriceQuote};
use clubhouse_core::{CourseDefinition, EntityId, Money, SessionScheduler, WeeklyScheduler};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::ports::{IdentityResolver, LocaleResolver};

// =============================================================================
// Price Cache
// =============================================================================

/// Computed prices per `(canonical id, day)`.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: Mutex<HashMap<(EntityId, NaiveDate), PriceQuote>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, canonical_id: &str, day: NaiveDate) -> Option<PriceQuote> {
        let entries = self.entries.lock().expect("Price cache mutex poisoned");
        entries.get(&(canonical_id.to_string(), day)).copied()
    }

    pub fn insert(&self, canonical_id: &str, day: NaiveDate, quote: PriceQuote) {
        let mut entries = self.entries.lock().expect("Price cache mutex poisoned");
        entries.insert((canonical_id.to_string(), day), quote);
    }

    /// Drops every day cached for `entity_id`. Returns the number removed.
    pub fn invalidate(&self, entity_id: &str) -> usize {
        let mut entries = self.entries.lock().expect("Price cache mutex poisoned");
        let before = entries.len();
        entries.retain(|(id, _), _| id != entity_id);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("Price cache mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("Price cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Pricing Engine
// =============================================================================

/// Prices enrollments in recurring courses.
pub struct PricingEngine {
    resolver: Arc<dyn LocaleResolver>,
    scheduler: Arc<dyn SessionScheduler>,
    /// `None` when caching is disabled.
    cache: Option<PriceCache>,
}

impl PricingEngine {
    pub fn new(
        resolver: Arc<dyn LocaleResolver>,
        scheduler: Arc<dyn SessionScheduler>,
        cache_enabled: bool,
    ) -> Self {
        Self {
            resolver,
            scheduler,
            cache: cache_enabled.then(PriceCache::new),
        }
    }

    /// Builds an engine with the configured scheduler and cache setting.
    pub fn from_config(config: &EngineConfig, resolver: Arc<dyn LocaleResolver>) -> Self {
        let scheduler = WeeklyScheduler::new(config.scheduler.safety_factor);
        Self::new(resolver, Arc::new(scheduler), config.pricing.cache_enabled)
    }

    /// Calculates the price of an enrollment in `course` on `today`.
    ///
    /// `stale_remaining_hint` is accepted for callers that computed remaining
    /// sessions earlier in the request, and ignored: remaining sessions are
    /// always recomputed here.
    pub fn calculate_price(
        &self,
        entity_id: &str,
        base_price: Money,
        per_session_rate: Money,
        course: &CourseDefinition,
        today: NaiveDate,
        stale_remaining_hint: Option<u32>,
    ) -> Money {
        self.quote(
            entity_id,
            base_price,
            per_session_rate,
            course,
            today,
            stale_remaining_hint,
        )
        .price
    }

    /// Like [`calculate_price`](Self::calculate_price), with the decision basis.
    pub fn quote(
        &self,
        entity_id: &str,
        base_price: Money,
        per_session_rate: Money,
        course: &CourseDefinition,
        today: NaiveDate,
        stale_remaining_hint: Option<u32>,
    ) -> PriceQuote {
        let canonical_id = self.resolver.canonical_id(entity_id);

        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&canonical_id, today)) {
            debug!(%canonical_id, %today, price = %cached.price, "Price cache hit");
            return cached;
        }

        let total = self.scheduler.total_sessions(course);
        let remaining = self.scheduler.remaining_sessions(course, today);

        if let Some(hint) = stale_remaining_hint.filter(|h| *h != remaining) {
            debug!(%canonical_id, hint, remaining, "Ignoring stale remaining-sessions hint");
        }

        let quote = prorated_price(base_price, per_session_rate, remaining, total);
        if quote.basis == PriceBasis::NotSchedulable {
            warn!(
                %canonical_id,
                course_id = %course.id,
                "Course cannot be scheduled, keeping base price"
            );
        }

        if let Some(cache) = &self.cache {
            cache.insert(&canonical_id, today, quote);
        }
        debug!(%canonical_id, %today, remaining, total, price = %quote.price, basis = ?quote.basis, "Price computed");

        quote
    }

    /// Drops cached prices of `entity_id` and of its canonical entity.
    pub fn invalidate(&self, entity_id: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        let canonical_id = self.resolver.canonical_id(entity_id);
        let mut removed = cache.invalidate(entity_id);
        if canonical_id != entity_id {
            removed += cache.invalidate(&canonical_id);
        }
        debug!(entity_id, %canonical_id, removed, "Price cache invalidated");
    }

    /// Number of cached prices (0 when caching is disabled).
    pub fn cached_prices(&self) -> usize {
        self.cache.as_ref().map_or(0, PriceCache::len)
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(
            Arc::new(IdentityResolver),
            Arc::new(WeeklyScheduler::default()),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MapLocaleResolver;
    use clubhouse_core::{NotComputable, ScheduleResult};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Weekly scheduler that counts how often it is asked.
    #[derive(Default)]
    struct CountingScheduler {
        inner: WeeklyScheduler,
        calls: AtomicUsize,
    }

    impl CountingScheduler {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SessionScheduler for CountingScheduler {
        fn schedule(&self, course: &CourseDefinition) -> Result<ScheduleResult, NotComputable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.schedule(course)
        }
    }

    const BASE: Money = Money::from_cents(45000);
    const RATE: Money = Money::from_cents(5000);

    fn monday_course() -> CourseDefinition {
        CourseDefinition::new("tennis-mon", ymd(2025, 1, 6), 10)
    }

    #[test]
    fn test_base_price_before_start_and_after_end() {
        let engine = PricingEngine::default();
        let course = monday_course();

        let before = engine.calculate_price("tennis-mon", BASE, RATE, &course, ymd(2024, 12, 1), None);
        assert_eq!(before, BASE);

        let on_end = engine.calculate_price("tennis-mon", BASE, RATE, &course, ymd(2025, 3, 11), None);
        assert_eq!(on_end, BASE);
    }

    #[test]
    fn test_prorated_inside_window() {
        let engine = PricingEngine::default();
        let course = monday_course();

        // 2025-02-11: sessions left on Feb 17, 24, Mar 3, 10.
        let quote = engine.quote("tennis-mon", BASE, RATE, &course, ymd(2025, 2, 11), None);
        assert_eq!(quote.basis, PriceBasis::Prorated);
        assert_eq!(quote.price.cents(), 20000);
    }

    #[test]
    fn test_stale_hint_is_ignored() {
        let engine = PricingEngine::default();
        let course = monday_course();
        let price = engine.calculate_price("tennis-mon", BASE, RATE, &course, ymd(2025, 2, 11), Some(9));
        assert_eq!(price.cents(), 20000);
    }

    #[test]
    fn test_not_schedulable_keeps_base() {
        let engine = PricingEngine::default();
        let mut course = monday_course();
        course.total_paid_sessions = 0;
        let quote = engine.quote("tennis-mon", BASE, RATE, &course, ymd(2025, 2, 11), None);
        assert_eq!(quote.price, BASE);
        assert_eq!(quote.basis, PriceBasis::NotSchedulable);
    }

    #[test]
    fn test_same_day_hits_cache_without_recomputing() {
        let scheduler = Arc::new(CountingScheduler::default());
        let engine = PricingEngine::new(Arc::new(IdentityResolver), scheduler.clone(), true);
        let course = monday_course();
        let today = ymd(2025, 2, 11);

        let first = engine.calculate_price("tennis-mon", BASE, RATE, &course, today, None);
        let calls_after_first = scheduler.calls();
        assert!(calls_after_first > 0);

        let second = engine.calculate_price("tennis-mon", BASE, RATE, &course, today, None);
        assert_eq!(first, second);
        assert_eq!(scheduler.calls(), calls_after_first);

        // A new day is a new key.
        engine.calculate_price("tennis-mon", BASE, RATE, &course, ymd(2025, 2, 12), None);
        assert!(scheduler.calls() > calls_after_first);
        assert_eq!(engine.cached_prices(), 2);
    }

    #[test]
    fn test_cache_disabled_always_recomputes() {
        let scheduler = Arc::new(CountingScheduler::default());
        let engine = PricingEngine::new(Arc::new(IdentityResolver), scheduler.clone(), false);
        let course = monday_course();
        let today = ymd(2025, 2, 11);

        engine.calculate_price("tennis-mon", BASE, RATE, &course, today, None);
        let once = scheduler.calls();
        engine.calculate_price("tennis-mon", BASE, RATE, &course, today, None);
        assert_eq!(scheduler.calls(), once * 2);
        assert_eq!(engine.cached_prices(), 0);
    }

    #[test]
    fn test_variants_share_canonical_entry() {
        let scheduler = Arc::new(CountingScheduler::default());
        let resolver = MapLocaleResolver::new().alias("tennis-mon-de", "tennis-mon");
        let engine = PricingEngine::new(Arc::new(resolver), scheduler.clone(), true);
        let course = monday_course();
        let today = ymd(2025, 2, 11);

        let canonical = engine.calculate_price("tennis-mon", BASE, RATE, &course, today, None);
        let calls = scheduler.calls();
        let variant = engine.calculate_price("tennis-mon-de", BASE, RATE, &course, today, None);
        assert_eq!(canonical, variant);
        assert_eq!(scheduler.calls(), calls);
        assert_eq!(engine.cached_prices(), 1);

        // Invalidating through the variant clears the canonical entry.
        engine.invalidate("tennis-mon-de");
        assert_eq!(engine.cached_prices(), 0);
    }

    #[test]
    fn test_price_cache_invalidate_counts() {
        let cache = PriceCache::new();
        let quote = PriceQuote {
            price: BASE,
            basis: PriceBasis::FullCourse,
        };
        cache.insert("a", ymd(2025, 1, 1), quote);
        cache.insert("a", ymd(2025, 1, 2), quote);
        cache.insert("b", ymd(2025, 1, 1), quote);

        assert_eq!(cache.invalidate("a"), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
