//! # Discount Engine
//!
//! Runs discount passes over a cart, optionally pulling the customer's
//! earlier orders into the evaluation.
//!
//! ## Pass Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  compute_discounts(cart, mode, today)          span: discount_pass{id}  │
//! │                                                                         │
//! │  1. canonical series ids (LocaleResolver)                               │
//! │  2. rule set from DiscountRuleTable (invalid rows logged, dropped)      │
//! │  3. Retroactive only:                                                   │
//! │       one HistoryKey per (customer, series | child, lookback)           │
//! │       HistoryCache ──hit──► rows                                        │
//! │            └──miss──► OrderHistoryQuery.find ──► cache ──► rows         │
//! │       failure ──► warn, continue without those rows                     │
//! │  4. clubhouse_core::discount::evaluate(cart, history, rules)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lookups are deduplicated within a pass. With a TTL configured, one cache
//! is shared by all passes of this engine; it is locked only around reads
//! and writes, so passes never wait on each other's order history queries.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{Months, NaiveDate};
use clubhouse_core::discount::{evaluate, DiscountSchedule, RuleSet};
use clubhouse_core::validation::clamp_lookback_months;
use clubhouse_core::{EntityId, Enrollment, ProductFamily, DEFAULT_LOOKBACK_MONTHS};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::ports::{DiscountRuleTable, HistoryQuery, LocaleResolver, OrderHistoryQuery};

// =============================================================================
// Discount Mode
// =============================================================================

/// What a discount pass compares the cart against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountMode {
    /// Only enrollments bought together in this cart.
    CartOnly,
    /// The cart plus the customer's orders inside the lookback window.
    Retroactive {
        customer_id: EntityId,
        /// Overrides the configured window; clamped to [1, 24].
        lookback_months: Option<i64>,
    },
}

impl DiscountMode {
    /// Retroactive mode with the configured lookback window.
    pub fn retroactive(customer_id: impl Into<EntityId>) -> Self {
        DiscountMode::Retroactive {
            customer_id: customer_id.into(),
            lookback_months: None,
        }
    }
}

// =============================================================================
// History Cache
// =============================================================================

/// Cache key of one history lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub customer_id: EntityId,
    pub series_id: Option<EntityId>,
    pub child_id: Option<EntityId>,
    pub lookback_months: u32,
}

#[derive(Debug)]
struct CachedHistory {
    fetched_at: Instant,
    enrollments: Vec<Enrollment>,
}

/// Results of order history lookups shared across passes.
///
/// Without a TTL entries never expire.
#[derive(Debug, Default)]
pub struct HistoryCache {
    entries: HashMap<HistoryKey, CachedHistory>,
    ttl: Option<Duration>,
}

impl HistoryCache {
    /// Cache shared across passes whose entries expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: Some(ttl),
        }
    }

    /// Returns a fresh entry; an expired one is dropped.
    pub fn get(&mut self, key: &HistoryKey, now: Instant) -> Option<Vec<Enrollment>> {
        let expired = match (self.entries.get(key), self.ttl) {
            (None, _) => return None,
            (Some(entry), Some(ttl)) => now.saturating_duration_since(entry.fetched_at) > ttl,
            (Some(_), None) => false,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.enrollments.clone())
    }

    pub fn insert(&mut self, key: HistoryKey, enrollments: Vec<Enrollment>, now: Instant) {
        self.entries.insert(
            key,
            CachedHistory {
                fetched_at: now,
                enrollments,
            },
        );
    }

    /// Drops expired entries. Returns the number removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.fetched_at) <= ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct LookupStats {
    hits: u32,
    misses: u32,
}

// =============================================================================
// Discount Engine
// =============================================================================

/// Computes discount schedules for carts.
pub struct DiscountEngine {
    rules: Arc<dyn DiscountRuleTable>,
    resolver: Arc<dyn LocaleResolver>,
    history: Option<Arc<dyn OrderHistoryQuery>>,
    retroactive_enabled: bool,
    lookback_months: u32,
    shared_history: Option<Mutex<HistoryCache>>,
}

impl DiscountEngine {
    /// Cart-only engine; add history with [`with_history`](Self::with_history).
    pub fn new(rules: Arc<dyn DiscountRuleTable>, resolver: Arc<dyn LocaleResolver>) -> Self {
        Self {
            rules,
            resolver,
            history: None,
            retroactive_enabled: true,
            lookback_months: DEFAULT_LOOKBACK_MONTHS,
            shared_history: None,
        }
    }

    /// Builds an engine with the configured rules, lookback window and cache.
    pub fn from_config(
        config: &EngineConfig,
        resolver: Arc<dyn LocaleResolver>,
        history: Option<Arc<dyn OrderHistoryQuery>>,
    ) -> Self {
        let mut engine = Self::new(Arc::new(config.rule_table()), resolver)
            .with_lookback_months(config.discounts.lookback_months);
        engine.retroactive_enabled = config.discounts.retroactive;
        engine.history = history;
        if let Some(ttl) = config.history_ttl() {
            engine = engine.with_history_ttl(ttl);
        }
        engine
    }

    pub fn with_history(mut self, history: Arc<dyn OrderHistoryQuery>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_lookback_months(mut self, months: i64) -> Self {
        self.lookback_months = clamp_lookback_months(months);
        self
    }

    /// Shares one history cache across passes, expiring entries after `ttl`.
    pub fn with_history_ttl(mut self, ttl: Duration) -> Self {
        self.shared_history = Some(Mutex::new(HistoryCache::with_ttl(ttl)));
        self
    }

    /// Runs one discount pass.
    ///
    /// Never fails: collaborator errors are logged and the pass continues
    /// with whatever history could be loaded.
    pub fn compute_discounts(
        &self,
        cart: &[Enrollment],
        mode: &DiscountMode,
        today: NaiveDate,
    ) -> DiscountSchedule {
        let pass_id = Uuid::new_v4();
        let span = info_span!("discount_pass", %pass_id, cart_len = cart.len());
        let _enter = span.enter();

        let cart = self.canonicalize(cart.to_vec());
        let rules = self.rule_set();

        let mut stats = LookupStats::default();
        let history = match mode {
            DiscountMode::CartOnly => Vec::new(),
            DiscountMode::Retroactive {
                customer_id,
                lookback_months,
            } => {
                let months = lookback_months.map_or(self.lookback_months, clamp_lookback_months);
                self.load_history(&cart, customer_id, months, today, &mut stats)
            }
        };

        let schedule = evaluate(&cart, &history, &rules).with_history_stats(stats.hits, stats.misses);

        for enrollment_id in schedule.skipped() {
            debug!(%enrollment_id, "Enrollment left out of discount grouping");
        }
        info!(
            allocations = schedule.allocations().len(),
            total_discount = %schedule.total_discount(),
            history_rows = history.len(),
            history_hits = stats.hits,
            history_misses = stats.misses,
            "Discount pass complete"
        );

        schedule
    }

    /// Active rules of every family, minus rows that can never apply.
    fn rule_set(&self) -> RuleSet {
        let rows = ProductFamily::ALL
            .into_iter()
            .flat_map(|family| self.rules.active_rules(family));
        let (rules, rejected) = RuleSet::from_rules(rows);
        for rejection in rejected {
            warn!(
                rule_id = %rejection.rule_id,
                reason = %rejection.reason,
                "Ignoring discount rule"
            );
        }
        rules
    }

    /// Rewrites series ids of translated variants to their canonical ids.
    fn canonicalize(&self, mut enrollments: Vec<Enrollment>) -> Vec<Enrollment> {
        for enrollment in &mut enrollments {
            if let Some(series) = enrollment.series_id.take() {
                enrollment.series_id = Some(self.resolver.canonical_id(&series));
            }
        }
        enrollments
    }

    // =========================================================================
    // History Lookups
    // =========================================================================

    fn load_history(
        &self,
        cart: &[Enrollment],
        customer_id: &str,
        lookback_months: u32,
        today: NaiveDate,
        stats: &mut LookupStats,
    ) -> Vec<Enrollment> {
        if !self.retroactive_enabled {
            debug!("Retroactive discounts disabled, evaluating cart only");
            return Vec::new();
        }
        let Some(history) = &self.history else {
            debug!("No order history configured, evaluating cart only");
            return Vec::new();
        };

        let since = today
            .checked_sub_months(Months::new(lookback_months))
            .unwrap_or(NaiveDate::MIN);
        let keys = history_keys(cart, customer_id, lookback_months);

        // The shared cache is only locked to read hits and to store results,
        // never while the collaborator runs.
        let mut rows = Vec::new();
        let missing = match &self.shared_history {
            Some(mutex) => {
                let mut cache = lock_cache(mutex);
                let now = Instant::now();
                cache.purge_expired(now);
                let mut missing = Vec::new();
                for key in keys {
                    match cache.get(&key, now) {
                        Some(cached) => {
                            stats.hits += 1;
                            rows.extend(cached);
                        }
                        None => missing.push(key),
                    }
                }
                missing
            }
            None => keys,
        };

        let mut fetched = Vec::with_capacity(missing.len());
        for key in missing {
            stats.misses += 1;
            let query = HistoryQuery {
                customer_id: key.customer_id.clone(),
                series_id: key.series_id.clone(),
                child_id: key.child_id.clone(),
                since,
            };
            match history.find(&query) {
                Ok(found) => {
                    debug!(
                        customer_id,
                        series_id = ?query.series_id,
                        child_id = ?query.child_id,
                        rows = found.len(),
                        "Order history loaded"
                    );
                    rows.extend(found.iter().cloned());
                    fetched.push((key, found));
                }
                Err(e) => {
                    warn!(
                        customer_id,
                        series_id = ?query.series_id,
                        child_id = ?query.child_id,
                        error = %e,
                        "Order history lookup failed, continuing without it"
                    );
                }
            }
        }

        if let Some(mutex) = &self.shared_history {
            if !fetched.is_empty() {
                let mut cache = lock_cache(mutex);
                let now = Instant::now();
                for (key, found) in fetched {
                    cache.insert(key, found, now);
                }
            }
        }

        merge_history(self.canonicalize(rows))
    }
}

/// Locks the shared history cache, recovering it after a panicked pass.
///
/// Cache entries are whole query results, so a recovered cache holds nothing
/// half-written.
fn lock_cache(mutex: &Mutex<HistoryCache>) -> MutexGuard<'_, HistoryCache> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("History cache lock poisoned by an earlier pass, recovering it");
        mutex.clear_poison();
        poisoned.into_inner()
    })
}

/// One lookup per distinct need of the cart.
///
/// Camp weeks and tournament days only compare within their series; course
/// weekdays compare across every course of the child. Series lookups also
/// cover siblings booked into the same offering.
fn history_keys(cart: &[Enrollment], customer_id: &str, lookback_months: u32) -> Vec<HistoryKey> {
    let key = |series_id: Option<&EntityId>, child_id: Option<&EntityId>| HistoryKey {
        customer_id: customer_id.to_string(),
        series_id: series_id.cloned(),
        child_id: child_id.cloned(),
        lookback_months,
    };

    let mut keys: Vec<HistoryKey> = Vec::new();
    let mut push = |k: HistoryKey| {
        if !keys.contains(&k) {
            keys.push(k);
        }
    };

    for enrollment in cart {
        let Some(child) = enrollment.assigned_child_id.as_ref() else {
            continue;
        };
        match enrollment.product_family {
            ProductFamily::Camp | ProductFamily::Tournament => {
                if let Some(series) = enrollment.series_id.as_ref() {
                    push(key(Some(series), None));
                }
            }
            ProductFamily::Course => {
                push(key(None, Some(child)));
                if let Some(series) = enrollment.series_id.as_ref() {
                    push(key(Some(series), None));
                }
            }
            ProductFamily::Birthday => {}
        }
    }

    keys
}

/// Deduplicates rows returned by overlapping lookups and restores
/// acquisition order.
fn merge_history(rows: Vec<Enrollment>) -> Vec<Enrollment> {
    let mut seen = HashSet::new();
    let mut merged: Vec<Enrollment> = rows
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect();
    // Stable: rows of one day keep the order the store returned them in.
    merged.sort_by_key(|e| (e.booking_date.is_none(), e.booking_date));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, EngineResult};
    use crate::ports::{ConfiguredRuleTable, IdentityResolver, MapLocaleResolver, MemoryOrderHistory};
    use clubhouse_core::{DiscountCondition, DiscountRule, Money};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Condvar;
    use std::thread;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn chf(amount: i64) -> Money {
        Money::from_cents(amount * 100)
    }

    fn tournament_day(id: &str, child: &str, series: &str) -> Enrollment {
        Enrollment::new(id, ProductFamily::Tournament, chf(30))
            .with_child(child)
            .with_series(series)
    }

    fn default_engine() -> DiscountEngine {
        DiscountEngine::new(
            Arc::new(ConfiguredRuleTable::defaults()),
            Arc::new(IdentityResolver),
        )
    }

    struct FailingHistory;

    impl OrderHistoryQuery for FailingHistory {
        fn find(&self, query: &HistoryQuery) -> EngineResult<Vec<Enrollment>> {
            Err(EngineError::OrderHistory {
                customer_id: query.customer_id.clone(),
                message: "connection refused".into(),
            })
        }
    }

    #[test]
    fn test_cart_only_sibling_scenario() {
        let camp = |id: &str, child: &str, price: i64| {
            Enrollment::new(id, ProductFamily::Camp, chf(price))
                .with_child(child)
                .with_series("summer-camp")
                .with_season("summer-2025")
        };
        let cart = vec![camp("a", "anna", 600), camp("b", "ben", 550), camp("c", "cleo", 500)];

        let schedule = default_engine().compute_discounts(&cart, &DiscountMode::CartOnly, ymd(2025, 6, 1));
        let amounts: Vec<i64> = cart.iter().map(|e| schedule.amount_for(&e.id).cents()).collect();
        assert_eq!(amounts, vec![0, -11000, -12500]);
        assert_eq!(schedule.history_misses, 0);
    }

    #[test]
    fn test_retroactive_second_tournament_day() {
        let history = Arc::new(MemoryOrderHistory::new().with_enrollment(
            "cust",
            tournament_day("d1", "anna", "cup").with_order("order-1", ymd(2025, 3, 1)),
        ));
        let engine = default_engine().with_history(history.clone());
        let cart = vec![tournament_day("d2", "anna", "cup")];
        let today = ymd(2025, 4, 1);

        let cart_only = engine.compute_discounts(&cart, &DiscountMode::CartOnly, today);
        assert!(cart_only.is_empty());
        assert_eq!(history.query_count(), 0);

        let schedule = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), today);
        assert_eq!(schedule.amount_for("d2").cents(), -1000);
        assert_eq!(schedule.net_price(&cart[0]).cents(), 2000);
        assert_eq!(history.query_count(), 1);
    }

    #[test]
    fn test_lookback_window_excludes_old_orders() {
        let history = Arc::new(MemoryOrderHistory::new().with_enrollment(
            "cust",
            tournament_day("d1", "anna", "cup").with_order("order-1", ymd(2024, 9, 1)),
        ));
        let engine = default_engine().with_history(history);
        let cart = vec![tournament_day("d2", "anna", "cup")];
        let today = ymd(2025, 4, 1);

        assert!(engine
            .compute_discounts(&cart, &DiscountMode::retroactive("cust"), today)
            .is_empty());

        let wide = DiscountMode::Retroactive {
            customer_id: "cust".into(),
            lookback_months: Some(12),
        };
        assert_eq!(
            engine.compute_discounts(&cart, &wide, today).amount_for("d2").cents(),
            -1000
        );
    }

    #[test]
    fn test_history_lookups_cached_within_pass() {
        let history = Arc::new(MemoryOrderHistory::new().with_enrollment(
            "cust",
            tournament_day("d1", "anna", "cup").with_order("order-1", ymd(2025, 3, 1)),
        ));
        let engine = default_engine().with_history(history.clone());
        let cart = vec![
            tournament_day("d2", "anna", "cup"),
            tournament_day("d3", "anna", "cup"),
            tournament_day("b1", "ben", "cup"),
        ];

        let schedule = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert_eq!(history.query_count(), 1);
        assert_eq!(schedule.history_misses, 1);
        assert_eq!(schedule.history_hits, 0);
        assert_eq!(schedule.amount_for("d2").cents(), -1000);
        assert_eq!(schedule.amount_for("d3").cents(), -1000);

        // A second pass without a TTL queries again.
        engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert_eq!(history.query_count(), 2);
    }

    #[test]
    fn test_ttl_cache_shared_across_passes() {
        let history = Arc::new(MemoryOrderHistory::new());
        let engine = default_engine()
            .with_history(history.clone())
            .with_history_ttl(Duration::from_secs(60));
        let cart = vec![tournament_day("d1", "anna", "cup")];

        let first = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        let second = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert_eq!(history.query_count(), 1);
        assert_eq!(first.history_misses, 1);
        assert_eq!(second.history_hits, 1);
    }

    /// Panics on its first lookup, then serves `inner`.
    struct PanicsOnceHistory {
        calls: AtomicUsize,
        inner: MemoryOrderHistory,
    }

    impl OrderHistoryQuery for PanicsOnceHistory {
        fn find(&self, query: &HistoryQuery) -> EngineResult<Vec<Enrollment>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("order store connection dropped");
            }
            self.inner.find(query)
        }
    }

    /// Completes a lookup only once two lookups are in flight together.
    #[derive(Default)]
    struct RendezvousHistory {
        in_flight: Mutex<usize>,
        arrived: Condvar,
        overlapped: AtomicBool,
    }

    impl OrderHistoryQuery for RendezvousHistory {
        fn find(&self, _query: &HistoryQuery) -> EngineResult<Vec<Enrollment>> {
            let mut in_flight = self.in_flight.lock().expect("In-flight mutex poisoned");
            *in_flight += 1;
            self.arrived.notify_all();
            let (mut in_flight, _) = self
                .arrived
                .wait_timeout_while(in_flight, Duration::from_secs(2), |n| *n < 2)
                .expect("In-flight mutex poisoned");
            if *in_flight >= 2 {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            *in_flight -= 1;
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_panicking_history_does_not_break_later_passes() {
        let history = Arc::new(PanicsOnceHistory {
            calls: AtomicUsize::new(0),
            inner: MemoryOrderHistory::new().with_enrollment(
                "cust-b",
                tournament_day("d1", "ben", "cup").with_order("order-1", ymd(2025, 3, 1)),
            ),
        });
        let engine = default_engine()
            .with_history(history)
            .with_history_ttl(Duration::from_secs(60));
        let today = ymd(2025, 4, 1);

        let first = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.compute_discounts(
                &[tournament_day("a1", "anna", "cup")],
                &DiscountMode::retroactive("cust-a"),
                today,
            )
        }));
        assert!(first.is_err());

        let cart = vec![tournament_day("d2", "ben", "cup")];
        let schedule = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust-b"), today);
        assert_eq!(schedule.amount_for("d2").cents(), -1000);
    }

    #[test]
    fn test_poisoned_history_cache_is_recovered() {
        let history = Arc::new(MemoryOrderHistory::new().with_enrollment(
            "cust",
            tournament_day("d1", "anna", "cup").with_order("order-1", ymd(2025, 3, 1)),
        ));
        let engine = default_engine()
            .with_history(history.clone())
            .with_history_ttl(Duration::from_secs(60));
        let cache = engine.shared_history.as_ref().unwrap();

        let poisoned = thread::scope(|s| {
            s.spawn(|| {
                let _guard = cache.lock().unwrap();
                panic!("pass aborted while holding the cache");
            })
            .join()
        });
        assert!(poisoned.is_err());
        assert!(cache.is_poisoned());

        let cart = vec![tournament_day("d2", "anna", "cup")];
        let first = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        let second = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert!(!cache.is_poisoned());
        assert_eq!(first.amount_for("d2").cents(), -1000);
        assert_eq!(second.history_hits, 1);
        assert_eq!(history.query_count(), 1);
    }

    #[test]
    fn test_concurrent_passes_query_history_in_parallel() {
        let history = Arc::new(RendezvousHistory::default());
        let engine = default_engine()
            .with_history(history.clone())
            .with_history_ttl(Duration::from_secs(60));
        let cart = vec![tournament_day("d1", "anna", "cup")];
        let today = ymd(2025, 4, 1);

        thread::scope(|s| {
            for customer in ["cust-a", "cust-b"] {
                let engine = &engine;
                let cart = &cart;
                s.spawn(move || {
                    engine.compute_discounts(cart, &DiscountMode::retroactive(customer), today)
                });
            }
        });

        assert!(history.overlapped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_history_failure_degrades_to_cart_only() {
        let engine = default_engine().with_history(Arc::new(FailingHistory));
        let cart = vec![
            tournament_day("d1", "anna", "cup"),
            tournament_day("d2", "anna", "cup"),
        ];
        let schedule = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert_eq!(schedule.amount_for("d2").cents(), -1000);
        assert_eq!(schedule.history_misses, 1);
    }

    #[test]
    fn test_translated_series_group_with_canonical() {
        let history = Arc::new(MemoryOrderHistory::new().with_enrollment(
            "cust",
            tournament_day("d1", "anna", "cup").with_order("order-1", ymd(2025, 3, 1)),
        ));
        let resolver = MapLocaleResolver::new().alias("cup-de", "cup");
        let engine = DiscountEngine::new(Arc::new(ConfiguredRuleTable::defaults()), Arc::new(resolver))
            .with_history(history);
        let cart = vec![tournament_day("d2", "anna", "cup-de")];

        let schedule = engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert_eq!(schedule.amount_for("d2").cents(), -1000);
    }

    #[test]
    fn test_configured_rates_are_authoritative() {
        let mut config = EngineConfig::default();
        config.rules = vec![
            DiscountRule::new("t-days", ProductFamily::Tournament, DiscountCondition::SameChildMultipleDays, 50.0),
            DiscountRule::new("t-2nd", ProductFamily::Tournament, DiscountCondition::SecondChild, 150.0),
        ];
        let engine = DiscountEngine::from_config(&config, Arc::new(IdentityResolver), None);
        let cart = vec![
            tournament_day("a1", "anna", "cup"),
            tournament_day("a2", "anna", "cup"),
            tournament_day("b1", "ben", "cup"),
        ];

        let schedule = engine.compute_discounts(&cart, &DiscountMode::CartOnly, ymd(2025, 4, 1));
        assert_eq!(schedule.amount_for("a2").cents(), -1500);
        // The 150% sibling rule was deactivated.
        assert_eq!(schedule.amount_for("b1"), Money::zero());
    }

    #[test]
    fn test_retroactive_disabled_in_config() {
        let mut config = EngineConfig::default();
        config.discounts.retroactive = false;
        let history = Arc::new(MemoryOrderHistory::new());
        let engine = DiscountEngine::from_config(
            &config,
            Arc::new(IdentityResolver),
            Some(history.clone() as Arc<dyn OrderHistoryQuery>),
        );
        let cart = vec![tournament_day("d1", "anna", "cup")];

        engine.compute_discounts(&cart, &DiscountMode::retroactive("cust"), ymd(2025, 4, 1));
        assert_eq!(history.query_count(), 0);
    }

    #[test]
    fn test_history_keys_per_family() {
        let cart = vec![
            tournament_day("t1", "anna", "cup"),
            tournament_day("t2", "anna", "cup"),
            Enrollment::new("c1", ProductFamily::Course, chf(300))
                .with_child("anna")
                .with_series("tennis-mon"),
            Enrollment::new("p1", ProductFamily::Birthday, chf(250)).with_child("anna"),
            Enrollment::new("x", ProductFamily::Camp, chf(400)).with_series("summer"),
        ];
        let keys = history_keys(&cart, "cust", 6);

        assert_eq!(keys.len(), 3);
        assert_eq!(keys[0].series_id.as_deref(), Some("cup"));
        assert_eq!(keys[1].child_id.as_deref(), Some("anna"));
        assert_eq!(keys[1].series_id, None);
        assert_eq!(keys[2].series_id.as_deref(), Some("tennis-mon"));
    }

    #[test]
    fn test_merge_history_orders_by_booking_date() {
        let rows = vec![
            tournament_day("late", "anna", "cup").with_order("o2", ymd(2025, 3, 5)),
            tournament_day("early", "anna", "cup").with_order("o1", ymd(2025, 3, 1)),
            tournament_day("late", "anna", "cup").with_order("o2", ymd(2025, 3, 5)),
            tournament_day("undated", "anna", "cup"),
        ];
        let ids: Vec<String> = merge_history(rows).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["early", "late", "undated"]);
    }

    #[test]
    fn test_history_cache_ttl_expiry() {
        let mut cache = HistoryCache::with_ttl(Duration::from_secs(30));
        let key = HistoryKey {
            customer_id: "cust".into(),
            series_id: Some("cup".into()),
            child_id: None,
            lookback_months: 6,
        };
        let start = Instant::now();
        cache.insert(key.clone(), Vec::new(), start);

        assert!(cache.get(&key, start + Duration::from_secs(10)).is_some());
        assert!(cache.get(&key, start + Duration::from_secs(31)).is_none());
        assert!(cache.is_empty());

        cache.insert(key, Vec::new(), start);
        assert_eq!(cache.purge_expired(start + Duration::from_secs(60)), 1);
    }
}
