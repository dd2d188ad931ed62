//! # Course Catalog
//!
//! Reads course definitions from the attribute store, keeps their computed
//! schedules, and writes derived attributes back.
//!
//! ## Write-Through Invalidation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  set_attribute(id, "course_holidays", ..)                               │
//! │        │                                                                │
//! │        ├──► AttributeStore.set                                          │
//! │        │                                                                │
//! │        └──► schedule input? ──yes──► drop memoized ScheduleResult       │
//! │                                      remove course_end_date             │
//! │                                      remove course_session_count        │
//! │                                      PricingEngine.invalidate(id)       │
//! │                                                                         │
//! │  schedule_course(id)                                                    │
//! │        │                                                                │
//! │        ├──► memo hit ──► ScheduleResult                                 │
//! │        └──► load_course ──► scheduler ──► store derived attrs ──► memo  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use clubhouse_core::terms::{parse_date, parse_holidays, parse_weekday};
use clubhouse_core::{
    CoreError, CourseDefinition, EntityId, Money, ScheduleResult, SessionScheduler,
    WeeklyScheduler,
};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::ports::{AttributeStore, IdentityResolver, LocaleResolver};
use crate::pricing::PricingEngine;

/// Attribute keys of a course entity.
pub mod keys {
    pub const START_DATE: &str = "course_start_date";
    pub const WEEKDAY: &str = "course_weekday";
    pub const TOTAL_SESSIONS: &str = "course_total_sessions";
    pub const HOLIDAYS: &str = "course_holidays";

    /// Derived: written by the catalog, never by editors.
    pub const END_DATE: &str = "course_end_date";
    /// Derived: written by the catalog, never by editors.
    pub const SESSION_COUNT: &str = "course_session_count";

    /// Keys whose change invalidates a computed schedule.
    pub const SCHEDULE_INPUTS: [&str; 4] = [START_DATE, WEEKDAY, TOTAL_SESSIONS, HOLIDAYS];
}

/// A finding of the consistency audit.
///
/// One of [`CoreError::SessionCountMismatch`], [`CoreError::EndDateMismatch`]
/// or [`CoreError::NotSchedulable`].
pub type ConsistencyIssue = CoreError;

/// Course definitions backed by an attribute store.
pub struct CourseCatalog {
    store: Arc<dyn AttributeStore>,
    scheduler: Arc<dyn SessionScheduler>,
    resolver: Arc<dyn LocaleResolver>,
    pricing: Option<Arc<PricingEngine>>,
    schedules: Mutex<HashMap<EntityId, ScheduleResult>>,
}

impl CourseCatalog {
    pub fn new(store: Arc<dyn AttributeStore>, scheduler: Arc<dyn SessionScheduler>) -> Self {
        Self {
            store,
            scheduler,
            resolver: Arc::new(IdentityResolver),
            pricing: None,
            schedules: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog with the default weekly scheduler.
    pub fn with_store(store: Arc<dyn AttributeStore>) -> Self {
        Self::new(store, Arc::new(WeeklyScheduler::default()))
    }

    /// Reads attributes of translated variants from their canonical entity.
    pub fn with_resolver(mut self, resolver: Arc<dyn LocaleResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Invalidates this engine's price cache on schedule input changes.
    pub fn with_pricing(mut self, pricing: Arc<PricingEngine>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Builds the definition of a course from its attributes.
    ///
    /// Malformed values never fail the load: they leave the field empty (or
    /// zero sessions) so scheduling reports the course as not computable.
    /// Only store failures are returned as errors.
    pub fn load_course(&self, entity_id: &str) -> EngineResult<CourseDefinition> {
        let course_id = self.resolver.canonical_id(entity_id);

        let start_date = match self.attribute(&course_id, keys::START_DATE)? {
            Some(raw) => {
                let parsed = parse_date(&raw);
                if parsed.is_none() {
                    warn!(%course_id, value = %raw, "Unreadable course start date");
                }
                parsed
            }
            None => None,
        };

        let weekday = match self.attribute(&course_id, keys::WEEKDAY)? {
            Some(raw) => {
                let parsed = parse_weekday(&raw);
                if parsed.is_none() {
                    warn!(%course_id, value = %raw, "Unreadable course weekday");
                }
                parsed
            }
            None => start_date.map(|d| d.weekday()),
        };

        let total_paid_sessions = match self.attribute(&course_id, keys::TOTAL_SESSIONS)? {
            Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
                warn!(%course_id, value = %raw, "Unreadable session count");
                0
            }),
            None => 0,
        };

        let holiday_dates = match self.attribute(&course_id, keys::HOLIDAYS)? {
            Some(raw) => {
                let list = parse_holidays(&raw);
                for entry in &list.rejected {
                    warn!(%course_id, value = %entry, "Skipping unreadable holiday");
                }
                list.dates
            }
            None => Default::default(),
        };

        Ok(CourseDefinition {
            id: course_id,
            start_date,
            weekday,
            total_paid_sessions,
            holiday_dates,
        })
    }

    fn attribute(&self, entity_id: &str, key: &str) -> EngineResult<Option<String>> {
        Ok(self
            .store
            .get(entity_id, key)?
            .filter(|value| !value.trim().is_empty()))
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Computes (or returns the memoized) schedule of a course and writes the
    /// derived attributes.
    pub fn schedule_course(&self, entity_id: &str) -> EngineResult<ScheduleResult> {
        let course_id = self.resolver.canonical_id(entity_id);
        if let Some(result) = self.memoized(&course_id) {
            return Ok(result);
        }

        let course = self.load_course(&course_id)?;
        let result = self.scheduler.schedule(&course).map_err(|reason| {
            warn!(%course_id, %reason, "Course cannot be scheduled, withholding from sale");
            EngineError::from(CoreError::NotSchedulable {
                course_id: course_id.clone(),
                reason,
            })
        })?;

        if result.sessions_counted as i64 != course.total_paid_sessions {
            warn!(
                %course_id,
                expected = course.total_paid_sessions,
                actual = result.sessions_counted,
                "Schedule session count disagrees with paid sessions"
            );
        }

        self.store.set(
            &course_id,
            keys::END_DATE,
            &result.end_date.format("%Y-%m-%d").to_string(),
        )?;
        self.store.set(
            &course_id,
            keys::SESSION_COUNT,
            &result.sessions_counted.to_string(),
        )?;

        self.schedules
            .lock()
            .expect("Schedule cache mutex poisoned")
            .insert(course_id.clone(), result);
        debug!(%course_id, end_date = %result.end_date, sessions = result.sessions_counted, "Course scheduled");

        Ok(result)
    }

    fn memoized(&self, course_id: &str) -> Option<ScheduleResult> {
        self.schedules
            .lock()
            .expect("Schedule cache mutex poisoned")
            .get(course_id)
            .copied()
    }

    /// Remaining sessions of a course as of `today`, 0 when not schedulable.
    pub fn remaining_sessions(&self, entity_id: &str, today: NaiveDate) -> EngineResult<u32> {
        let course = self.load_course(entity_id)?;
        Ok(self.scheduler.remaining_sessions(&course, today))
    }

    /// Prices an enrollment in the course `entity_id` through `pricing`.
    pub fn price_enrollment(
        &self,
        pricing: &PricingEngine,
        entity_id: &str,
        base_price: Money,
        per_session_rate: Money,
        today: NaiveDate,
    ) -> EngineResult<Money> {
        let course = self.load_course(entity_id)?;
        Ok(pricing.calculate_price(entity_id, base_price, per_session_rate, &course, today, None))
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Writes an attribute and invalidates everything derived from it.
    pub fn set_attribute(&self, entity_id: &str, key: &str, value: &str) -> EngineResult<()> {
        self.store.set(entity_id, key, value)?;
        if keys::SCHEDULE_INPUTS.contains(&key) {
            self.invalidate(entity_id)?;
        }
        Ok(())
    }

    /// Drops the memoized schedule, the derived attributes and cached prices
    /// of a course and of its canonical entity.
    pub fn invalidate(&self, entity_id: &str) -> EngineResult<()> {
        let canonical_id = self.resolver.canonical_id(entity_id);
        let mut ids = vec![entity_id.to_string()];
        if canonical_id != entity_id {
            ids.push(canonical_id);
        }

        {
            let mut schedules = self.schedules.lock().expect("Schedule cache mutex poisoned");
            for id in &ids {
                schedules.remove(id);
            }
        }

        for id in &ids {
            self.store.remove(id, keys::END_DATE)?;
            self.store.remove(id, keys::SESSION_COUNT)?;
        }

        if let Some(pricing) = &self.pricing {
            pricing.invalidate(entity_id);
        }

        debug!(entity_id, "Course schedule invalidated");
        Ok(())
    }

    // =========================================================================
    // Consistency Audit
    // =========================================================================

    /// Recomputes a course and compares it with what is configured and stored.
    ///
    /// Bypasses the memo. Returns `None` for a consistent course.
    pub fn audit_course(&self, entity_id: &str) -> EngineResult<Option<ConsistencyIssue>> {
        let course = self.load_course(entity_id)?;
        let course_id = course.id.clone();

        let result = match self.scheduler.schedule(&course) {
            Ok(result) => result,
            Err(reason) => {
                return Ok(Some(CoreError::NotSchedulable { course_id, reason }));
            }
        };

        let recounted = self.scheduler.total_sessions(&course);
        if recounted as i64 != course.total_paid_sessions {
            return Ok(Some(CoreError::SessionCountMismatch {
                course_id,
                expected: course.total_paid_sessions,
                actual: recounted,
            }));
        }

        if let Some(stored) = self.attribute(&course_id, keys::SESSION_COUNT)? {
            if stored.trim().parse::<u32>().ok() != Some(recounted) {
                let expected = stored.trim().parse::<i64>().unwrap_or(-1);
                return Ok(Some(CoreError::SessionCountMismatch {
                    course_id,
                    expected,
                    actual: recounted,
                }));
            }
        }

        if let Some(stored) = self.attribute(&course_id, keys::END_DATE)? {
            match parse_date(&stored) {
                Some(stored) if stored == result.end_date => {}
                Some(stored) => {
                    return Ok(Some(CoreError::EndDateMismatch {
                        course_id,
                        stored,
                        computed: result.end_date,
                    }));
                }
                None => warn!(%course_id, value = %stored, "Unreadable stored end date"),
            }
        }

        Ok(None)
    }

    /// Audits several courses and logs every finding.
    pub fn audit_courses<'a, I>(&self, entity_ids: I) -> Vec<ConsistencyIssue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut issues = Vec::new();
        for entity_id in entity_ids {
            match self.audit_course(entity_id) {
                Ok(Some(issue)) => {
                    warn!(entity_id, %issue, "Course data inconsistent");
                    issues.push(issue);
                }
                Ok(None) => {}
                Err(e) => warn!(entity_id, error = %e, "Course audit failed"),
            }
        }
        info!(issues = issues.len(), "Course audit finished");
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MapLocaleResolver, MemoryAttributeStore};
    use chrono::Weekday;
    use clubhouse_core::NotComputable;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded_store() -> Arc<MemoryAttributeStore> {
        Arc::new(
            MemoryAttributeStore::new()
                .with("tennis", keys::START_DATE, "2025-01-06")
                .with("tennis", keys::TOTAL_SESSIONS, "10"),
        )
    }

    #[test]
    fn test_load_course_formats() {
        let store = Arc::new(
            MemoryAttributeStore::new()
                .with("c", keys::START_DATE, "06.01.2025")
                .with("c", keys::WEEKDAY, "Mittwoch")
                .with("c", keys::TOTAL_SESSIONS, " 8 ")
                .with("c", keys::HOLIDAYS, "[\"2025-02-19\", \"someday\", \"20250226\"]"),
        );
        let catalog = CourseCatalog::with_store(store);
        let course = catalog.load_course("c").unwrap();

        assert_eq!(course.start_date, Some(ymd(2025, 1, 6)));
        assert_eq!(course.weekday, Some(Weekday::Wed));
        assert_eq!(course.total_paid_sessions, 8);
        assert_eq!(course.holiday_dates.len(), 2);
    }

    #[test]
    fn test_load_course_defaults_weekday_from_start() {
        let catalog = CourseCatalog::with_store(seeded_store());
        let course = catalog.load_course("tennis").unwrap();
        assert_eq!(course.weekday, Some(Weekday::Mon));
    }

    #[test]
    fn test_malformed_attributes_are_not_schedulable() {
        let store = Arc::new(
            MemoryAttributeStore::new()
                .with("bad", keys::START_DATE, "soon")
                .with("bad", keys::TOTAL_SESSIONS, "ten"),
        );
        let catalog = CourseCatalog::with_store(store.clone());
        let course = catalog.load_course("bad").unwrap();
        assert_eq!(course.start_date, None);
        assert_eq!(course.total_paid_sessions, 0);

        let err = catalog.schedule_course("bad").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::NotSchedulable {
                reason: NotComputable::MissingStartDate,
                ..
            })
        ));
        assert_eq!(store.get("bad", keys::END_DATE).unwrap(), None);
    }

    #[test]
    fn test_schedule_writes_derived_attributes() {
        let store = seeded_store();
        let catalog = CourseCatalog::with_store(store.clone());

        let result = catalog.schedule_course("tennis").unwrap();
        assert_eq!(result.end_date, ymd(2025, 3, 10));
        assert_eq!(store.get("tennis", keys::END_DATE).unwrap().as_deref(), Some("2025-03-10"));
        assert_eq!(store.get("tennis", keys::SESSION_COUNT).unwrap().as_deref(), Some("10"));
    }

    #[test]
    fn test_holiday_edit_invalidates_schedule() {
        let store = seeded_store();
        let catalog = CourseCatalog::with_store(store.clone());
        assert_eq!(catalog.schedule_course("tennis").unwrap().end_date, ymd(2025, 3, 10));

        catalog
            .set_attribute("tennis", keys::HOLIDAYS, "2025-02-17")
            .unwrap();
        assert_eq!(store.get("tennis", keys::END_DATE).unwrap(), None);

        let result = catalog.schedule_course("tennis").unwrap();
        assert_eq!(result.end_date, ymd(2025, 3, 17));
        assert_eq!(result.sessions_counted, 10);
    }

    #[test]
    fn test_unrelated_attribute_keeps_schedule() {
        let store = seeded_store();
        let catalog = CourseCatalog::with_store(store.clone());
        catalog.schedule_course("tennis").unwrap();

        catalog.set_attribute("tennis", "course_title", "Tennis Monday").unwrap();
        assert!(store.get("tennis", keys::END_DATE).unwrap().is_some());
    }

    #[test]
    fn test_edit_clears_price_cache() {
        let store = seeded_store();
        let pricing = Arc::new(PricingEngine::default());
        let catalog = CourseCatalog::with_store(store).with_pricing(pricing.clone());
        let today = ymd(2025, 2, 11);

        let before = catalog
            .price_enrollment(&pricing, "tennis", Money::from_cents(45000), Money::from_cents(5000), today)
            .unwrap();
        assert_eq!(before.cents(), 20000);
        assert_eq!(pricing.cached_prices(), 1);

        // The Feb 17 holiday moves the end date; four sessions remain either way.
        catalog.set_attribute("tennis", keys::HOLIDAYS, "2025-02-17").unwrap();
        assert_eq!(pricing.cached_prices(), 0);

        let after = catalog
            .price_enrollment(&pricing, "tennis", Money::from_cents(45000), Money::from_cents(5000), today)
            .unwrap();
        assert_eq!(after.cents(), 20000);
        assert_eq!(catalog.remaining_sessions("tennis", today).unwrap(), 4);
    }

    #[test]
    fn test_variant_reads_canonical_attributes() {
        let resolver = Arc::new(MapLocaleResolver::new().alias("tennis-de", "tennis"));
        let catalog = CourseCatalog::with_store(seeded_store()).with_resolver(resolver);

        let result = catalog.schedule_course("tennis-de").unwrap();
        assert_eq!(result.end_date, ymd(2025, 3, 10));
        assert_eq!(catalog.load_course("tennis-de").unwrap().id, "tennis");
    }

    #[test]
    fn test_audit_finds_stale_end_date() {
        let store = seeded_store();
        let catalog = CourseCatalog::with_store(store.clone());
        catalog.schedule_course("tennis").unwrap();
        assert!(catalog.audit_course("tennis").unwrap().is_none());

        // A holiday written behind the catalog's back.
        store.set("tennis", keys::HOLIDAYS, "2025-02-17").unwrap();
        let issue = catalog.audit_course("tennis").unwrap();
        assert!(matches!(
            issue,
            Some(CoreError::EndDateMismatch { computed, .. }) if computed == ymd(2025, 3, 17)
        ));
    }

    #[test]
    fn test_audit_finds_session_count_mismatch() {
        let store = seeded_store();
        store.set("tennis", keys::SESSION_COUNT, "12").unwrap();
        let catalog = CourseCatalog::with_store(store);
        let issue = catalog.audit_course("tennis").unwrap();
        assert!(matches!(
            issue,
            Some(CoreError::SessionCountMismatch { expected: 12, actual: 10, .. })
        ));
    }

    #[test]
    fn test_audit_courses_collects_findings() {
        let store = Arc::new(
            MemoryAttributeStore::new()
                .with("ok", keys::START_DATE, "2025-01-06")
                .with("ok", keys::TOTAL_SESSIONS, "4")
                .with("empty", keys::TOTAL_SESSIONS, "4"),
        );
        let catalog = CourseCatalog::with_store(store);
        let issues = catalog.audit_courses(["ok", "empty"]);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0], CoreError::NotSchedulable { .. }));
    }
}
