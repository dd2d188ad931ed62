//! # Error Types
//!
//! Domain-specific error types for clubhouse-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  clubhouse-core errors (this file)                                      │
//! │  ├── NotComputable    - Course data cannot be scheduled (DataError)     │
//! │  ├── CoreError        - General domain errors                           │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  clubhouse-engine errors (separate crate)                               │
//! │  └── EngineError      - Config, collaborator failures                   │
//! │                                                                         │
//! │  None of these ever blocks a checkout: the engine degrades to full      │
//! │  price / no discount and logs the cause.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Not Computable
// =============================================================================

/// Why a course schedule could not be computed.
///
/// This is a data-entry problem in the catalog, not a programming error.
/// Callers withhold the course from sale until an editor fixes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotComputable {
    #[error("course has no valid start date")]
    MissingStartDate,

    #[error("course weekday cannot be determined")]
    MissingWeekday,

    #[error("course has {0} paid sessions, at least one is required")]
    NoPaidSessions(i64),

    /// The scan hit its day limit before finding every occurrence.
    #[error("schedule scan exceeded {limit_days} days")]
    ScanLimitExceeded { limit_days: i64 },

    /// The scan walked past the last representable date.
    #[error("schedule runs past the supported calendar range")]
    CalendarOverflow,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Course schedule cannot be computed.
    #[error("Course {course_id} is not schedulable: {reason}")]
    NotSchedulable {
        course_id: String,
        reason: NotComputable,
    },

    /// Recomputed session count disagrees with the configured count.
    ///
    /// ## When This Occurs
    /// - Holiday list edited after derived attributes were stored
    /// - Hand-edited end date in the catalog
    /// - Import scripts writing partial course data
    #[error("Course {course_id}: expected {expected} sessions, schedule yields {actual}")]
    SessionCountMismatch {
        course_id: String,
        expected: i64,
        actual: u32,
    },

    /// Stored end date disagrees with the recomputed one.
    #[error("Course {course_id}: stored end date {stored}, schedule yields {computed}")]
    EndDateMismatch {
        course_id: String,
        stored: NaiveDate,
        computed: NaiveDate,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Percentage outside its permitted half-open range.
    #[error("{field} must be at least {min}% and below {max}%, got {value}")]
    PercentOutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    /// Money amount below zero.
    #[error("{field} must not be negative, got {cents} cents")]
    NegativeAmount { field: String, cents: i64 },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::SessionCountMismatch {
            course_id: "course-42".to_string(),
            expected: 10,
            actual: 11,
        };
        assert_eq!(
            err.to_string(),
            "Course course-42: expected 10 sessions, schedule yields 11"
        );

        let err = CoreError::NotSchedulable {
            course_id: "course-7".to_string(),
            reason: NotComputable::NoPaidSessions(0),
        };
        assert_eq!(
            err.to_string(),
            "Course course-7 is not schedulable: course has 0 paid sessions, at least one is required"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::PercentOutOfRange {
            field: "rate_percent".to_string(),
            min: 0.0,
            max: 100.0,
            value: 120.0,
        };
        assert_eq!(
            err.to_string(),
            "rate_percent must be at least 0% and below 100%, got 120"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "course_start_date".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
