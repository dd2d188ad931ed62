//! # Discount Rule Table
//!
//! Turns the configured rule rows into a lookup keyed by product family and
//! condition, dropping rows that must never fire.
//!
//! ## Default Table
//! ```text
//! ┌────────────┬──────────────────────────┬────────┐
//! │ family     │ condition                │ rate   │
//! ├────────────┼──────────────────────────┼────────┤
//! │ camp       │ 2nd_child                │ 20%    │
//! │ camp       │ 3rd_plus_child           │ 25%    │
//! │ camp       │ progressive_week_2       │ 10%    │
//! │ camp       │ progressive_week_3_plus  │ 20%    │
//! │ course     │ 2nd_child                │ 20%    │
//! │ course     │ 3rd_plus_child           │ 25%    │
//! │ course     │ same_season_course       │ 50%    │
//! │ tournament │ 2nd_child                │ 20%    │
//! │ tournament │ 3rd_plus_child           │ 30%    │
//! │ tournament │ same_child_multiple_days │ 33.33% │
//! └────────────┴──────────────────────────┴────────┘
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::error::ValidationError;
use crate::types::{DiscountCondition, DiscountRate, DiscountRule, ProductFamily};
use crate::validation::validate_discount_percent;

/// Conditions the evaluator checks for a product family.
///
/// A rule row for any other condition of that family can never fire.
pub fn conditions_for(family: ProductFamily) -> &'static [DiscountCondition] {
    match family {
        ProductFamily::Camp => &[
            DiscountCondition::SecondChild,
            DiscountCondition::ThirdPlusChild,
            DiscountCondition::ProgressiveWeek2,
            DiscountCondition::ProgressiveWeek3Plus,
        ],
        ProductFamily::Course => &[
            DiscountCondition::SecondChild,
            DiscountCondition::ThirdPlusChild,
            DiscountCondition::SameSeasonCourse,
        ],
        ProductFamily::Tournament => &[
            DiscountCondition::SecondChild,
            DiscountCondition::ThirdPlusChild,
            DiscountCondition::SameChildMultipleDays,
        ],
        ProductFamily::Birthday => &[],
    }
}

/// The built-in rule rows.
pub fn default_rules() -> Vec<DiscountRule> {
    use DiscountCondition as C;
    use ProductFamily as F;

    vec![
        DiscountRule::new("camp-2nd-child", F::Camp, C::SecondChild, 20.0),
        DiscountRule::new("camp-3rd-plus-child", F::Camp, C::ThirdPlusChild, 25.0),
        DiscountRule::new("camp-week-2", F::Camp, C::ProgressiveWeek2, 10.0),
        DiscountRule::new("camp-week-3-plus", F::Camp, C::ProgressiveWeek3Plus, 20.0),
        DiscountRule::new("course-2nd-child", F::Course, C::SecondChild, 20.0),
        DiscountRule::new("course-3rd-plus-child", F::Course, C::ThirdPlusChild, 25.0),
        DiscountRule::new("course-same-season", F::Course, C::SameSeasonCourse, 50.0),
        DiscountRule::new("tournament-2nd-child", F::Tournament, C::SecondChild, 20.0),
        DiscountRule::new("tournament-3rd-plus-child", F::Tournament, C::ThirdPlusChild, 30.0),
        DiscountRule::new("tournament-multiple-days", F::Tournament, C::SameChildMultipleDays, 33.33),
    ]
}

/// A rule that survived validation, ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRule {
    pub rule_id: String,
    pub condition: DiscountCondition,
    pub rate: DiscountRate,
}

/// Why a configured rule row was dropped.
#[derive(Debug, Error)]
pub enum RuleRejection {
    #[error("invalid rate: {0}")]
    InvalidRate(#[from] ValidationError),

    #[error("condition {condition:?} never applies to {family}")]
    NotApplicable {
        family: ProductFamily,
        condition: DiscountCondition,
    },

    #[error("{family} already has an active {condition:?} rule ({kept})")]
    Duplicate {
        family: ProductFamily,
        condition: DiscountCondition,
        kept: String,
    },
}

/// A dropped rule row and the reason.
#[derive(Debug)]
pub struct RejectedRule {
    /// Position of the row in the input.
    pub index: usize,
    pub rule_id: String,
    pub reason: RuleRejection,
}

/// Active rules keyed by `(family, condition)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: HashMap<(ProductFamily, DiscountCondition), AppliedRule>,
}

impl RuleSet {
    /// Builds a rule set, reporting every row that was dropped.
    ///
    /// Inactive rows and `none` rows are skipped quietly. Rows with a bad
    /// rate, a condition the family never evaluates, or a second active row
    /// for the same key are returned as [`RejectedRule`]s.
    pub fn from_rules<I>(rules: I) -> (Self, Vec<RejectedRule>)
    where
        I: IntoIterator<Item = DiscountRule>,
    {
        let mut set = RuleSet::default();
        let mut rejected = Vec::new();

        for (index, rule) in rules.into_iter().enumerate() {
            if !rule.active || rule.condition == DiscountCondition::Unconditional {
                continue;
            }

            if let Err(err) = validate_discount_percent(rule.rate_percent) {
                rejected.push(RejectedRule {
                    index,
                    rule_id: rule.id,
                    reason: err.into(),
                });
                continue;
            }

            if !conditions_for(rule.product_family).contains(&rule.condition) {
                rejected.push(RejectedRule {
                    index,
                    rule_id: rule.id,
                    reason: RuleRejection::NotApplicable {
                        family: rule.product_family,
                        condition: rule.condition,
                    },
                });
                continue;
            }

            let key = (rule.product_family, rule.condition);
            if let Some(existing) = set.rules.get(&key) {
                rejected.push(RejectedRule {
                    index,
                    rule_id: rule.id,
                    reason: RuleRejection::Duplicate {
                        family: rule.product_family,
                        condition: rule.condition,
                        kept: existing.rule_id.clone(),
                    },
                });
                continue;
            }

            let Some(rate) = rule.effective_rate() else {
                continue;
            };
            set.rules.insert(
                key,
                AppliedRule {
                    rule_id: rule.id,
                    condition: rule.condition,
                    rate,
                },
            );
        }

        (set, rejected)
    }

    /// The built-in table.
    pub fn defaults() -> Self {
        RuleSet::from_rules(default_rules()).0
    }

    pub fn get(&self, family: ProductFamily, condition: DiscountCondition) -> Option<&AppliedRule> {
        self.rules.get(&(family, condition))
    }

    /// Checks whether any rule of `family` can fire.
    pub fn has_family(&self, family: ProductFamily) -> bool {
        self.rules.keys().any(|(f, _)| *f == family)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
