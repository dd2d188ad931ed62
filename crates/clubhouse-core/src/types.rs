//! # Domain Types
//!
//! Core domain types used throughout Clubhouse Booking.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │ CourseDefinition │   │    Enrollment    │   │   DiscountRule   │     │
//! │  │  ──────────────  │   │  ──────────────  │   │  ──────────────  │     │
//! │  │  start_date      │   │  product_family  │   │  product_family  │     │
//! │  │  weekday         │   │  series_id       │   │  condition       │     │
//! │  │  paid sessions   │   │  child id        │   │  rate_percent    │     │
//! │  │  holidays        │   │  unit_price      │   │  active          │     │
//! │  └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘     │
//! │           ▼                      └───────────┬──────────┘               │
//! │  ┌──────────────────┐               ┌────────▼───────────┐              │
//! │  │  ScheduleResult  │               │ DiscountAllocation │              │
//! │  │  end_date, counts│               │ amount (≤ 0)       │              │
//! │  └──────────────────┘               └────────────────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::terms::week_number_from_term;
use crate::validation::validate_discount_percent;

/// Identifier of a catalog entity (course, camp week, tournament day, order).
pub type EntityId = String;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount rate in basis points (1 bp = 0.01%).
///
/// 3333 bps = 33.33%, the tournament second-day rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a rate from a percentage, rounded to the nearest basis point.
    ///
    /// ## Example
    /// ```rust
    /// use clubhouse_core::types::DiscountRate;
    ///
    /// assert_eq!(DiscountRate::from_percentage(33.33).bps(), 3333);
    /// assert_eq!(DiscountRate::from_percentage(20.0).bps(), 2000);
    /// ```
    pub fn from_percentage(pct: f64) -> Self {
        DiscountRate((pct * 100.0).round().max(0.0) as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for notes only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for DiscountRate {
    fn default() -> Self {
        DiscountRate::zero()
    }
}

// =============================================================================
// Product Family
// =============================================================================

/// The kind of offering an enrollment books.
///
/// Rule selection matches on this exhaustively, so a new family cannot
/// silently fall through to another family's discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    /// Holiday camp, sold per week.
    Camp,
    /// Weekly recurring course, sold per season and weekday slot.
    Course,
    /// Tournament, sold per day.
    Tournament,
    /// Birthday party booking. No family discounts.
    Birthday,
}

impl ProductFamily {
    pub const ALL: [ProductFamily; 4] = [
        ProductFamily::Camp,
        ProductFamily::Course,
        ProductFamily::Tournament,
        ProductFamily::Birthday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductFamily::Camp => "camp",
            ProductFamily::Course => "course",
            ProductFamily::Tournament => "tournament",
            ProductFamily::Birthday => "birthday",
        }
    }
}

impl std::fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProductFamily {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "camp" | "camps" => Ok(ProductFamily::Camp),
            "course" | "courses" | "kurs" => Ok(ProductFamily::Course),
            "tournament" | "tournaments" | "turnier" => Ok(ProductFamily::Tournament),
            "birthday" | "birthdays" => Ok(ProductFamily::Birthday),
            _ => Err(crate::error::ValidationError::NotAllowed {
                field: "product_family".to_string(),
                allowed: ProductFamily::ALL.iter().map(|f| f.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Discount Condition
// =============================================================================

/// The condition under which a discount rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum DiscountCondition {
    /// Second child of the same family in the same product family.
    #[serde(rename = "2nd_child")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "2nd_child"))]
    SecondChild,
    /// Third and every further child.
    #[serde(rename = "3rd_plus_child")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "3rd_plus_child"))]
    ThirdPlusChild,
    /// Another course on a different weekday in the same season.
    #[serde(rename = "same_season_course")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "same_season_course"))]
    SameSeasonCourse,
    /// Second camp week of the same child.
    #[serde(rename = "progressive_week_2")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "progressive_week_2"))]
    ProgressiveWeek2,
    /// Third and every further camp week of the same child.
    #[serde(rename = "progressive_week_3_plus")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "progressive_week_3_plus"))]
    ProgressiveWeek3Plus,
    /// Further tournament day of the same child in the same series.
    #[serde(rename = "same_child_multiple_days")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "same_child_multiple_days"))]
    SameChildMultipleDays,
    /// Placeholder row in a rule table; never fires.
    #[serde(rename = "none")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "none"))]
    Unconditional,
}

impl DiscountCondition {
    /// Label used in allocation notes.
    pub fn label(&self) -> &'static str {
        match self {
            DiscountCondition::SecondChild => "2nd child discount",
            DiscountCondition::ThirdPlusChild => "3rd+ child discount",
            DiscountCondition::SameSeasonCourse => "additional course this season",
            DiscountCondition::ProgressiveWeek2 => "2nd camp week",
            DiscountCondition::ProgressiveWeek3Plus => "3rd+ camp week",
            DiscountCondition::SameChildMultipleDays => "additional tournament day",
            DiscountCondition::Unconditional => "no condition",
        }
    }
}

// =============================================================================
// Course Definition
// =============================================================================

/// A weekly recurring course as authored in the catalog.
///
/// `total_paid_sessions` counts only sessions the child attends. Holidays
/// never consume a paid session; they push the end date out instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDefinition {
    pub id: EntityId,

    /// First day the course may take place. `None` when missing or malformed.
    pub start_date: Option<NaiveDate>,

    /// Day of the week the course meets. `None` when it cannot be determined.
    pub weekday: Option<Weekday>,

    /// Sessions the enrollee pays for.
    pub total_paid_sessions: i64,

    /// Dates on which no session takes place.
    #[serde(default)]
    pub holiday_dates: BTreeSet<NaiveDate>,
}

impl CourseDefinition {
    /// Creates a course meeting on the weekday of its start date.
    pub fn new(id: impl Into<EntityId>, start_date: NaiveDate, total_paid_sessions: i64) -> Self {
        CourseDefinition {
            id: id.into(),
            start_date: Some(start_date),
            weekday: Some(chrono::Datelike::weekday(&start_date)),
            total_paid_sessions,
            holiday_dates: BTreeSet::new(),
        }
    }

    pub fn with_weekday(mut self, weekday: Weekday) -> Self {
        self.weekday = Some(weekday);
        self
    }

    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(mut self, holidays: I) -> Self {
        self.holiday_dates.extend(holidays);
        self
    }

    /// Checks whether `date` is a holiday of this course.
    #[inline]
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_dates.contains(&date)
    }
}

// =============================================================================
// Schedule Result
// =============================================================================

/// The computed calendar span of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScheduleResult {
    /// Date of the last session.
    #[ts(as = "String")]
    pub end_date: NaiveDate,

    /// Weekday occurrences walked from the start through the end date: paid
    /// sessions plus the holidays that fell on the weekday inside that span.
    ///
    /// Holidays after the end date are not counted. The walk stops at the
    /// last paid session, so a far-off holiday never adds an occurrence.
    pub total_occurrences_needed: u32,

    /// Sessions that actually take place between start and end.
    pub sessions_counted: u32,
}

// =============================================================================
// Enrollment
// =============================================================================

/// One child's booking of one offering instance.
///
/// Cart enrollments are mutable until checkout; enrollments loaded from
/// finished orders are treated as frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Enrollment {
    pub id: EntityId,

    pub product_family: ProductFamily,

    /// Recurring parent offering (camp, course series, tournament).
    pub series_id: Option<EntityId>,

    /// Commerce season of the series, e.g. "summer-2025".
    pub season: Option<String>,

    /// Child attending. Enrollments without a child get no family discounts.
    pub assigned_child_id: Option<EntityId>,

    /// Price before discounts.
    pub unit_price: Money,

    /// Order the enrollment was bought in; `None` while still in the cart.
    pub order_id: Option<EntityId>,

    #[ts(as = "Option<String>")]
    pub booking_date: Option<NaiveDate>,

    /// Camp week number or tournament day index.
    pub week_or_day_index: Option<u32>,

    /// Weekday of the booked course slot.
    #[ts(as = "Option<String>")]
    pub course_weekday: Option<Weekday>,
}

impl Enrollment {
    pub fn new(id: impl Into<EntityId>, product_family: ProductFamily, unit_price: Money) -> Self {
        Enrollment {
            id: id.into(),
            product_family,
            series_id: None,
            season: None,
            assigned_child_id: None,
            unit_price,
            order_id: None,
            booking_date: None,
            week_or_day_index: None,
            course_weekday: None,
        }
    }

    pub fn with_child(mut self, child_id: impl Into<EntityId>) -> Self {
        self.assigned_child_id = Some(child_id.into());
        self
    }

    pub fn with_series(mut self, series_id: impl Into<EntityId>) -> Self {
        self.series_id = Some(series_id.into());
        self
    }

    pub fn with_season(mut self, season: impl Into<String>) -> Self {
        self.season = Some(season.into());
        self
    }

    pub fn with_order(mut self, order_id: impl Into<EntityId>, booking_date: NaiveDate) -> Self {
        self.order_id = Some(order_id.into());
        self.booking_date = Some(booking_date);
        self
    }

    pub fn with_week(mut self, index: u32) -> Self {
        self.week_or_day_index = Some(index);
        self
    }

    /// Sets the week index from a series term such as `"Summer Week-3"`.
    ///
    /// An unparsable term leaves the index unset.
    pub fn with_week_term(mut self, term: &str) -> Self {
        self.week_or_day_index = week_number_from_term(term);
        self
    }

    pub fn with_course_weekday(mut self, weekday: Weekday) -> Self {
        self.course_weekday = Some(weekday);
        self
    }

    /// Checks whether the enrollment belongs to a finished order.
    #[inline]
    pub fn is_historical(&self) -> bool {
        self.order_id.is_some()
    }
}

// =============================================================================
// Discount Rule
// =============================================================================

/// One row of the externally configured discount table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRule {
    pub id: String,
    pub product_family: ProductFamily,
    pub condition: DiscountCondition,
    /// Percent off the unit price, `0 <= rate < 100`.
    pub rate_percent: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl DiscountRule {
    pub fn new(
        id: impl Into<String>,
        product_family: ProductFamily,
        condition: DiscountCondition,
        rate_percent: f64,
    ) -> Self {
        DiscountRule {
            id: id.into(),
            product_family,
            condition,
            rate_percent,
            active: true,
        }
    }

    /// Returns the usable rate, or `None` when the rule must not fire.
    ///
    /// A rule with a rate outside `[0, 100)` is a configuration error and is
    /// treated exactly like an inactive rule.
    pub fn effective_rate(&self) -> Option<DiscountRate> {
        if !self.active || self.condition == DiscountCondition::Unconditional {
            return None;
        }
        validate_discount_percent(self.rate_percent).ok()?;
        Some(DiscountRate::from_percentage(self.rate_percent))
    }
}

// =============================================================================
// Discount Allocation
// =============================================================================

/// Discount assigned to one enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountAllocation {
    pub enrollment_id: EntityId,
    /// Always negative; never larger in magnitude than the unit price.
    pub amount: Money,
    pub rule_id: String,
    pub note: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_rate_from_percentage() {
        assert_eq!(DiscountRate::from_percentage(33.33).bps(), 3333);
        assert_eq!(DiscountRate::from_percentage(25.0).bps(), 2500);
        assert!((DiscountRate::from_bps(1000).percentage() - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_product_family_parsing() {
        assert_eq!("Camp".parse::<ProductFamily>().unwrap(), ProductFamily::Camp);
        assert_eq!("turnier".parse::<ProductFamily>().unwrap(), ProductFamily::Tournament);
        assert!("voucher".parse::<ProductFamily>().is_err());
    }

    #[test]
    fn test_condition_wire_names() {
        let json = serde_json::to_string(&DiscountCondition::SecondChild).unwrap();
        assert_eq!(json, "\"2nd_child\"");
        let parsed: DiscountCondition = serde_json::from_str("\"progressive_week_3_plus\"").unwrap();
        assert_eq!(parsed, DiscountCondition::ProgressiveWeek3Plus);
        let none: DiscountCondition = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(none, DiscountCondition::Unconditional);
    }

    #[test]
    fn test_rule_effective_rate() {
        let rule = DiscountRule::new("c2", ProductFamily::Camp, DiscountCondition::SecondChild, 20.0);
        assert_eq!(rule.effective_rate(), Some(DiscountRate::from_bps(2000)));

        let mut inactive = rule.clone();
        inactive.active = false;
        assert_eq!(inactive.effective_rate(), None);

        let full = DiscountRule::new("bad", ProductFamily::Camp, DiscountCondition::SecondChild, 100.0);
        assert_eq!(full.effective_rate(), None);

        // Below 100 as written, but 10000 bps once rounded.
        let almost = DiscountRule::new("bad", ProductFamily::Camp, DiscountCondition::SecondChild, 99.996);
        assert_eq!(almost.effective_rate(), None);

        let negative = DiscountRule::new("neg", ProductFamily::Camp, DiscountCondition::SecondChild, -5.0);
        assert_eq!(negative.effective_rate(), None);

        let none = DiscountRule::new("n", ProductFamily::Camp, DiscountCondition::Unconditional, 10.0);
        assert_eq!(none.effective_rate(), None);
    }

    #[test]
    fn test_rule_defaults_to_active_when_deserialized() {
        let rule: DiscountRule = serde_json::from_str(
            r#"{"id":"t","product_family":"tournament","condition":"same_child_multiple_days","rate_percent":33.33}"#,
        )
        .unwrap();
        assert!(rule.active);
        assert_eq!(rule.effective_rate(), Some(DiscountRate::from_bps(3333)));
    }

    #[test]
    fn test_enrollment_week_term() {
        let e = Enrollment::new("e1", ProductFamily::Camp, Money::from_cents(100))
            .with_week_term("Sommer WEEK-3");
        assert_eq!(e.week_or_day_index, Some(3));

        let e = Enrollment::new("e2", ProductFamily::Camp, Money::from_cents(100))
            .with_week_term("Ferienwoche");
        assert_eq!(e.week_or_day_index, None);
    }

    #[test]
    fn test_course_definition_defaults_weekday_from_start() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        let course = CourseDefinition::new("c", start, 10);
        assert_eq!(course.weekday, Some(Weekday::Mon));
        assert!(!course.is_holiday(start));
    }
}
