//! # Host Collaborators
//!
//! Traits for everything the engine consumes from the host shop, plus the
//! implementations the engine ships with.
//!
//! ## Ports
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Trait               Used by                 Shipped implementations    │
//! │  ──────────────────  ──────────────────────  ────────────────────────── │
//! │  AttributeStore      CourseCatalog           MemoryAttributeStore       │
//! │  LocaleResolver      Pricing, Discounts      IdentityResolver           │
//! │                                              MapLocaleResolver          │
//! │                                              AttributeLocaleResolver    │
//! │  OrderHistoryQuery   DiscountEngine          MemoryOrderHistory         │
//! │  DiscountRuleTable   DiscountEngine          ConfiguredRuleTable        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All calls are synchronous. Timeouts are the collaborator's business.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use clubhouse_core::discount::{default_rules, RuleSet};
use clubhouse_core::{DiscountRule, EntityId, Enrollment, ProductFamily};
use tracing::warn;

use crate::error::EngineResult;

/// Attribute holding the canonical id of a translated variant.
pub const CANONICAL_ID_KEY: &str = "canonical_id";

// =============================================================================
// Attribute Store
// =============================================================================

/// Key-value attributes indexed by `(entity id, key)`.
pub trait AttributeStore: Send + Sync {
    fn get(&self, entity_id: &str, key: &str) -> EngineResult<Option<String>>;

    fn set(&self, entity_id: &str, key: &str, value: &str) -> EngineResult<()>;

    /// Deletes an attribute. Deleting a missing attribute is not an error.
    fn remove(&self, entity_id: &str, key: &str) -> EngineResult<()>;
}

/// In-process attribute store.
#[derive(Debug, Default)]
pub struct MemoryAttributeStore {
    values: Mutex<HashMap<(EntityId, String), String>>,
}

impl MemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used to seed a store.
    pub fn with(self, entity_id: &str, key: &str, value: &str) -> Self {
        self.values
            .lock()
            .expect("Attribute store mutex poisoned")
            .insert((entity_id.to_string(), key.to_string()), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.values.lock().expect("Attribute store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn get(&self, entity_id: &str, key: &str) -> EngineResult<Option<String>> {
        let values = self.values.lock().expect("Attribute store mutex poisoned");
        Ok(values.get(&(entity_id.to_string(), key.to_string())).cloned())
    }

    fn set(&self, entity_id: &str, key: &str, value: &str) -> EngineResult<()> {
        let mut values = self.values.lock().expect("Attribute store mutex poisoned");
        values.insert((entity_id.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, entity_id: &str, key: &str) -> EngineResult<()> {
        let mut values = self.values.lock().expect("Attribute store mutex poisoned");
        values.remove(&(entity_id.to_string(), key.to_string()));
        Ok(())
    }
}

// =============================================================================
// Locale Resolver
// =============================================================================

/// Maps a translated catalog variant to its language-neutral entity.
///
/// Must be a pure function of the id: variants of one offering price and
/// group identically.
pub trait LocaleResolver: Send + Sync {
    fn canonical_id(&self, entity_id: &str) -> EntityId;
}

/// Used when no translation layer is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl LocaleResolver for IdentityResolver {
    fn canonical_id(&self, entity_id: &str) -> EntityId {
        entity_id.to_string()
    }
}

/// Fixed variant → canonical table.
#[derive(Debug, Clone, Default)]
pub struct MapLocaleResolver {
    aliases: HashMap<EntityId, EntityId>,
}

impl MapLocaleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(mut self, variant_id: impl Into<EntityId>, canonical_id: impl Into<EntityId>) -> Self {
        self.aliases.insert(variant_id.into(), canonical_id.into());
        self
    }
}

impl LocaleResolver for MapLocaleResolver {
    fn canonical_id(&self, entity_id: &str) -> EntityId {
        self.aliases
            .get(entity_id)
            .cloned()
            .unwrap_or_else(|| entity_id.to_string())
    }
}

/// Reads the [`CANONICAL_ID_KEY`] attribute of the variant.
///
/// A missing attribute or a failing store resolves to the id itself.
pub struct AttributeLocaleResolver {
    store: Arc<dyn AttributeStore>,
}

impl AttributeLocaleResolver {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store }
    }
}

impl LocaleResolver for AttributeLocaleResolver {
    fn canonical_id(&self, entity_id: &str) -> EntityId {
        match self.store.get(entity_id, CANONICAL_ID_KEY) {
            Ok(Some(canonical)) if !canonical.trim().is_empty() => canonical.trim().to_string(),
            Ok(_) => entity_id.to_string(),
            Err(e) => {
                warn!(entity_id, error = %e, "Canonical id lookup failed, using variant id");
                entity_id.to_string()
            }
        }
    }
}

// =============================================================================
// Order History
// =============================================================================

/// One retroactive lookup.
///
/// `None` for series or child widens the query to every series or child of
/// the customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryQuery {
    pub customer_id: EntityId,
    pub series_id: Option<EntityId>,
    pub child_id: Option<EntityId>,
    /// Oldest booking date included.
    pub since: NaiveDate,
}

/// Enrollments from the customer's finished orders.
pub trait OrderHistoryQuery: Send + Sync {
    /// Returns matching enrollments in acquisition order.
    fn find(&self, query: &HistoryQuery) -> EngineResult<Vec<Enrollment>>;
}

/// In-process order history, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryOrderHistory {
    orders: Vec<(EntityId, Enrollment)>,
    queries: AtomicUsize,
}

impl MemoryOrderHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an enrollment of a finished order.
    pub fn with_enrollment(mut self, customer_id: impl Into<EntityId>, enrollment: Enrollment) -> Self {
        self.orders.push((customer_id.into(), enrollment));
        self
    }

    /// Number of `find` calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

impl OrderHistoryQuery for MemoryOrderHistory {
    fn find(&self, query: &HistoryQuery) -> EngineResult<Vec<Enrollment>> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .orders
            .iter()
            .filter(|(customer, _)| *customer == query.customer_id)
            .map(|(_, enrollment)| enrollment)
            .filter(|e| match &query.series_id {
                Some(series) => e.series_id.as_ref() == Some(series),
                None => true,
            })
            .filter(|e| match &query.child_id {
                Some(child) => e.assigned_child_id.as_ref() == Some(child),
                None => true,
            })
            .filter(|e| e.booking_date.map_or(false, |d| d >= query.since))
            .cloned()
            .collect())
    }
}

// =============================================================================
// Discount Rule Table
// =============================================================================

/// Externally configured discount rules.
pub trait DiscountRuleTable: Send + Sync {
    fn active_rules(&self, family: ProductFamily) -> Vec<DiscountRule>;
}

/// Rule table built from configuration.
///
/// Rules that could never be applied (bad rate, condition foreign to the
/// family, second active rule for the same key) are deactivated on
/// construction and logged once.
#[derive(Debug, Clone)]
pub struct ConfiguredRuleTable {
    rules: Vec<DiscountRule>,
}

impl ConfiguredRuleTable {
    pub fn new(mut rules: Vec<DiscountRule>) -> Self {
        let (_, rejected) = RuleSet::from_rules(rules.iter().cloned());
        for rejection in rejected {
            warn!(
                rule_id = %rejection.rule_id,
                reason = %rejection.reason,
                "Deactivating discount rule"
            );
            rules[rejection.index].active = false;
        }
        Self { rules }
    }

    /// The built-in table.
    pub fn defaults() -> Self {
        Self::new(default_rules())
    }

    /// All rows, including deactivated ones.
    pub fn rules(&self) -> &[DiscountRule] {
        &self.rules
    }
}

impl DiscountRuleTable for ConfiguredRuleTable {
    fn active_rules(&self, family: ProductFamily) -> Vec<DiscountRule> {
        self.rules
            .iter()
            .filter(|r| r.active && r.product_family == family)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubhouse_core::{DiscountCondition, Money};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryAttributeStore::new().with("c1", "course_weekday", "1");
        assert_eq!(store.get("c1", "course_weekday").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("c1", "missing").unwrap(), None);

        store.set("c1", "course_weekday", "3").unwrap();
        assert_eq!(store.get("c1", "course_weekday").unwrap().as_deref(), Some("3"));

        store.remove("c1", "course_weekday").unwrap();
        store.remove("c1", "course_weekday").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_locale_resolvers() {
        assert_eq!(IdentityResolver.canonical_id("kurs-de"), "kurs-de");

        let map = MapLocaleResolver::new().alias("kurs-de", "course");
        assert_eq!(map.canonical_id("kurs-de"), "course");
        assert_eq!(map.canonical_id("course"), "course");

        let store = Arc::new(
            MemoryAttributeStore::new()
                .with("kurs-de", CANONICAL_ID_KEY, " course ")
                .with("blank", CANONICAL_ID_KEY, ""),
        );
        let resolver = AttributeLocaleResolver::new(store);
        assert_eq!(resolver.canonical_id("kurs-de"), "course");
        assert_eq!(resolver.canonical_id("blank"), "blank");
        assert_eq!(resolver.canonical_id("course"), "course");
    }

    #[test]
    fn test_memory_history_filters() {
        let day = |id: &str, child: &str, series: &str, date: NaiveDate| {
            Enrollment::new(id, ProductFamily::Tournament, Money::from_cents(3000))
                .with_child(child)
                .with_series(series)
                .with_order("order-1", date)
        };
        let history = MemoryOrderHistory::new()
            .with_enrollment("cust", day("old", "anna", "cup", ymd(2024, 1, 10)))
            .with_enrollment("cust", day("a1", "anna", "cup", ymd(2025, 3, 1)))
            .with_enrollment("cust", day("b1", "ben", "cup", ymd(2025, 3, 2)))
            .with_enrollment("cust", day("a2", "anna", "league", ymd(2025, 3, 3)))
            .with_enrollment("other", day("x1", "anna", "cup", ymd(2025, 3, 4)));

        let query = HistoryQuery {
            customer_id: "cust".into(),
            series_id: Some("cup".into()),
            child_id: None,
            since: ymd(2025, 1, 1),
        };
        let ids: Vec<String> = history.find(&query).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a1", "b1"]);

        let query = HistoryQuery {
            series_id: None,
            child_id: Some("anna".into()),
            ..query
        };
        let ids: Vec<String> = history.find(&query).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        assert_eq!(history.query_count(), 2);
    }

    #[test]
    fn test_configured_table_deactivates_bad_rules() {
        let table = ConfiguredRuleTable::new(vec![
            DiscountRule::new("ok", ProductFamily::Course, DiscountCondition::ThirdPlusChild, 30.0),
            DiscountRule::new("free", ProductFamily::Course, DiscountCondition::SecondChild, 100.0),
            DiscountRule::new("dup", ProductFamily::Course, DiscountCondition::ThirdPlusChild, 25.0),
        ]);

        let active = table.active_rules(ProductFamily::Course);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "ok");
        assert_eq!(table.rules().len(), 3);
        assert!(table.active_rules(ProductFamily::Camp).is_empty());
    }

    #[test]
    fn test_default_table_course_third_child() {
        let table = ConfiguredRuleTable::defaults();
        let rule = table
            .active_rules(ProductFamily::Course)
            .into_iter()
            .find(|r| r.condition == DiscountCondition::ThirdPlusChild)
            .unwrap();
        assert!((rule.rate_percent - 25.0).abs() < f64::EPSILON);
    }
}
