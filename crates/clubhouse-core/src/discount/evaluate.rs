//! Rule evaluation over one customer's cart and history.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Weekday;

use super::rules::{conditions_for, AppliedRule, RuleSet};
use super::DiscountSchedule;
use crate::money::Money;
use crate::types::{DiscountAllocation, DiscountCondition, Enrollment, ProductFamily};
use crate::validation::{validate_entity_id, validate_unit_price};

/// An enrollment that takes part in grouping.
struct Entry<'a> {
    enrollment: &'a Enrollment,
    child: &'a str,
    in_cart: bool,
}

impl<'a> Entry<'a> {
    fn family(&self) -> ProductFamily {
        self.enrollment.product_family
    }

    fn price(&self) -> Money {
        self.enrollment.unit_price
    }

    /// Commerce season, falling back to the series for unlabeled series.
    fn season_key(&self) -> Option<&'a str> {
        self.enrollment
            .season
            .as_deref()
            .or(self.enrollment.series_id.as_deref())
    }
}

/// The best discount found so far for one cart line.
struct Offer<'r> {
    rule: &'r AppliedRule,
    amount: Money,
}

#[derive(Default)]
struct Offers<'r> {
    best: HashMap<String, Offer<'r>>,
}

impl<'r> Offers<'r> {
    /// Considers `condition` for `entry`; only the largest offer per line is kept.
    fn consider(
        &mut self,
        rules: &'r RuleSet,
        entry: &Entry<'_>,
        condition: DiscountCondition,
    ) {
        if !entry.in_cart {
            return;
        }
        let Some(rule) = rules.get(entry.family(), condition) else {
            return;
        };

        let price = entry.price();
        let amount = price.percentage(rule.rate).min(price);
        if amount.cents() < 1 {
            return;
        }

        // Ties go to the condition declared first.
        let better = match self.best.get(&entry.enrollment.id) {
            Some(current) => {
                amount > current.amount
                    || (amount == current.amount && condition < current.rule.condition)
            }
            None => true,
        };
        if better {
            self.best
                .insert(entry.enrollment.id.clone(), Offer { rule, amount });
        }
    }
}

/// Computes the discount allocations for `cart`.
///
/// `history` holds enrollments from the customer's finished orders in
/// acquisition order. They count toward every ordering (sibling tiers, camp
/// weeks, course weekdays, tournament days) but are never discounted
/// themselves. History rows whose id also appears in the cart are ignored.
///
/// Each cart line receives at most one allocation: the largest offer among
/// the rules it qualifies for. Lines without a child or with a negative price
/// are left out of grouping and reported in [`DiscountSchedule::skipped`].
///
/// ## Example
/// ```rust
/// use clubhouse_core::discount::{evaluate, RuleSet};
/// use clubhouse_core::money::Money;
/// use clubhouse_core::types::{Enrollment, ProductFamily};
///
/// let cart = vec![
///     Enrollment::new("a", ProductFamily::Camp, Money::from_cents(60000)).with_child("anna"),
///     Enrollment::new("b", ProductFamily::Camp, Money::from_cents(55000)).with_child("ben"),
/// ];
/// let schedule = evaluate(&cart, &[], &RuleSet::defaults());
///
/// assert_eq!(schedule.amount_for("a"), Money::zero());
/// assert_eq!(schedule.amount_for("b").cents(), -11000);
/// ```
pub fn evaluate(cart: &[Enrollment], history: &[Enrollment], rules: &RuleSet) -> DiscountSchedule {
    let cart_ids: HashSet<&str> = cart.iter().map(|e| e.id.as_str()).collect();
    let mut entries = Vec::with_capacity(history.len() + cart.len());
    let mut skipped = Vec::new();

    for enrollment in history.iter().filter(|e| !cart_ids.contains(e.id.as_str())) {
        if let Some(child) = eligible_child(enrollment) {
            entries.push(Entry {
                enrollment,
                child,
                in_cart: false,
            });
        }
    }
    for enrollment in cart {
        match eligible_child(enrollment) {
            Some(child) => entries.push(Entry {
                enrollment,
                child,
                in_cart: true,
            }),
            None => skipped.push(enrollment.id.clone()),
        }
    }

    let mut offers = Offers::default();
    for family in ProductFamily::ALL {
        let members: Vec<&Entry> = entries.iter().filter(|e| e.family() == family).collect();
        if members.is_empty() {
            continue;
        }
        for condition in conditions_for(family) {
            match condition {
                DiscountCondition::SecondChild => sibling_tiers(&members, rules, &mut offers),
                DiscountCondition::ProgressiveWeek2 => camp_weeks(&members, rules, &mut offers),
                DiscountCondition::SameSeasonCourse => {
                    course_weekdays(&members, rules, &mut offers)
                }
                DiscountCondition::SameChildMultipleDays => {
                    tournament_days(&members, rules, &mut offers)
                }
                // Assigned together with their lower tier.
                DiscountCondition::ThirdPlusChild
                | DiscountCondition::ProgressiveWeek3Plus
                | DiscountCondition::Unconditional => {}
            }
        }
    }

    let allocations = cart
        .iter()
        .filter_map(|enrollment| {
            let offer = offers.best.remove(&enrollment.id)?;
            Some(DiscountAllocation {
                enrollment_id: enrollment.id.clone(),
                amount: -offer.amount,
                rule_id: offer.rule.rule_id.clone(),
                note: format!(
                    "{} ({}%)",
                    offer.rule.condition.label(),
                    offer.rule.rate.percentage()
                ),
            })
        })
        .collect();

    DiscountSchedule::new(allocations, skipped)
}

fn eligible_child(enrollment: &Enrollment) -> Option<&str> {
    let child = enrollment.assigned_child_id.as_deref()?;
    validate_entity_id("assigned_child_id", child).ok()?;
    validate_unit_price(enrollment.unit_price).ok()?;
    Some(child)
}

fn tier(position: usize, second: DiscountCondition, further: DiscountCondition) -> DiscountCondition {
    if position == 1 {
        second
    } else {
        further
    }
}

// =============================================================================
// Sibling Tiers
// =============================================================================

struct ChildTier<'e, 'a> {
    child: &'a str,
    max_price: Money,
    /// Highest-priced cart line of the child.
    target: Option<&'e Entry<'a>>,
}

/// Ranks children of one family by their most expensive booking.
///
/// The top child pays full price; the others receive the 2nd or 3rd+ child
/// rate on their most expensive cart line. Ties keep first-seen order.
fn sibling_tiers<'e, 'a, 'r>(
    members: &[&'e Entry<'a>],
    rules: &'r RuleSet,
    offers: &mut Offers<'r>,
) {
    let mut children: Vec<ChildTier<'e, 'a>> = Vec::new();

    for &entry in members {
        let slot = match children.iter().position(|c| c.child == entry.child) {
            Some(idx) => &mut children[idx],
            None => {
                children.push(ChildTier {
                    child: entry.child,
                    max_price: entry.price(),
                    target: None,
                });
                let last = children.len() - 1;
                &mut children[last]
            }
        };
        slot.max_price = slot.max_price.max(entry.price());
        if entry.in_cart && slot.target.map_or(true, |t| entry.price() > t.price()) {
            slot.target = Some(entry);
        }
    }

    children.sort_by(|a, b| b.max_price.cmp(&a.max_price));

    for (position, ranked) in children.iter().enumerate().skip(1) {
        if let Some(target) = ranked.target {
            let condition = tier(
                position,
                DiscountCondition::SecondChild,
                DiscountCondition::ThirdPlusChild,
            );
            offers.consider(rules, target, condition);
        }
    }
}

// =============================================================================
// Camp Weeks
// =============================================================================

/// Orders each child's camp weeks within a season by week number.
///
/// Enrollments without a parsable week number take no position.
fn camp_weeks<'e, 'a, 'r>(
    members: &[&'e Entry<'a>],
    rules: &'r RuleSet,
    offers: &mut Offers<'r>,
) {
    let mut groups: BTreeMap<(&'a str, &'a str), Vec<(u32, &'e Entry<'a>)>> = BTreeMap::new();
    for &entry in members {
        let (Some(season), Some(week)) = (entry.season_key(), entry.enrollment.week_or_day_index)
        else {
            continue;
        };
        groups
            .entry((entry.child, season))
            .or_default()
            .push((week, entry));
    }

    for weeks in groups.values_mut() {
        weeks.sort_by_key(|(week, _)| *week);
        for (position, (_, entry)) in weeks.iter().enumerate().skip(1) {
            let condition = tier(
                position,
                DiscountCondition::ProgressiveWeek2,
                DiscountCondition::ProgressiveWeek3Plus,
            );
            offers.consider(rules, entry, condition);
        }
    }
}

// =============================================================================
// Course Weekdays
// =============================================================================

/// Grants the same-season rate to each course on a weekday not yet counted
/// for that child and season.
fn course_weekdays<'a, 'r>(members: &[&Entry<'a>], rules: &'r RuleSet, offers: &mut Offers<'r>) {
    let mut seen: HashMap<(&'a str, &'a str), HashSet<Weekday>> = HashMap::new();
    for &entry in members {
        let (Some(season), Some(weekday)) = (entry.season_key(), entry.enrollment.course_weekday)
        else {
            continue;
        };
        let weekdays = seen.entry((entry.child, season)).or_default();
        let first = weekdays.is_empty();
        if weekdays.insert(weekday) && !first {
            offers.consider(rules, entry, DiscountCondition::SameSeasonCourse);
        }
    }
}

// =============================================================================
// Tournament Days
// =============================================================================

/// Every further day of one tournament series for the same child qualifies,
/// in acquisition order.
fn tournament_days<'a, 'r>(members: &[&Entry<'a>], rules: &'r RuleSet, offers: &mut Offers<'r>) {
    let mut days: HashMap<(&'a str, &'a str), usize> = HashMap::new();
    for &entry in members {
        let Some(series) = entry.enrollment.series_id.as_deref() else {
            continue;
        };
        let position = days.entry((entry.child, series)).or_insert(0);
        if *position >= 1 {
            offers.consider(rules, entry, DiscountCondition::SameChildMultipleDays);
        }
        *position += 1;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
