//! # Engine Error Types
//!
//! Error types for engine operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐  │
//! │  │  Configuration  │  │  Collaborators  │  │     Domain              │  │
//! │  │                 │  │                 │  │                         │  │
//! │  │  InvalidConfig  │  │  AttributeStore │  │  Core (NotSchedulable,  │  │
//! │  │  ConfigLoad     │  │  OrderHistory   │  │  mismatches, invalid    │  │
//! │  │  ConfigSave     │  │                 │  │  input)                 │  │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘  │
//! │                                                                         │
//! │  Only configuration errors surface at startup. Everything else is       │
//! │  logged and degraded to full price / no discount during a pass.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use clubhouse_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// The attribute store rejected a read or write.
    #[error("Attribute store error for {entity_id}/{key}: {message}")]
    AttributeStore {
        entity_id: String,
        key: String,
        message: String,
    },

    /// The order history query failed.
    #[error("Order history query failed for customer {customer_id}: {message}")]
    OrderHistory {
        customer_id: String,
        message: String,
    },

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Domain error from clubhouse-core.
    #[error(transparent)]
    Core(#[from] CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if a host collaborator failed rather than the engine.
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            EngineError::AttributeStore { .. } | EngineError::OrderHistory { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubhouse_core::NotComputable;

    #[test]
    fn test_error_categories() {
        assert!(EngineError::InvalidConfig("bad".into()).is_config_error());
        assert!(!EngineError::InvalidConfig("bad".into()).is_collaborator_error());

        let err = EngineError::OrderHistory {
            customer_id: "cust-1".into(),
            message: "timeout".into(),
        };
        assert!(err.is_collaborator_error());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::from(CoreError::NotSchedulable {
            course_id: "tennis-mon".into(),
            reason: NotComputable::MissingStartDate,
        });
        assert_eq!(
            err.to_string(),
            "Course tennis-mon is not schedulable: course has no valid start date"
        );
    }

    #[test]
    fn test_validation_error_becomes_config_error() {
        let err = EngineError::from(ValidationError::OutOfRange {
            field: "safety_factor".into(),
            min: 7,
            max: 100,
        });
        assert!(err.is_config_error());
        assert!(err.to_string().contains("safety_factor"));
    }
}
