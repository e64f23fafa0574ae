//! Domain error types.
//!
//! `ConfigurationNotFound`, `TypeConversion` and `DependencyUnresolved` are
//! scoped to a single indicator instance: batch operations record them and
//! carry on with the remaining keys.

/// Top-level error type for chartdesk.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("configuration not found for {key}{}", parameter_suffix(.name))]
    ConfigurationNotFound { key: String, name: Option<String> },

    #[error("parameter {name} of {key} is not a valid {type_tag}: {value:?} ({reason})")]
    TypeConversion {
        key: String,
        name: String,
        type_tag: String,
        value: String,
        reason: String,
    },

    #[error("{key} depends on {reference}, which is not active")]
    DependencyUnresolved { key: String, reference: String },

    #[error("persistence failure: {reason}")]
    PersistenceFailure { reason: String },

    #[error("computation failed for {key}: {reason}")]
    ComputationFailure { key: String, reason: String },

    #[error("{identifier} is not active")]
    NotActive { identifier: String },

    #[error("identifier {identifier} collides with an existing or store-backed indicator")]
    IdentifierCollision { identifier: String },

    #[error("invalid indicator key: {input:?}")]
    InvalidKey { input: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn parameter_suffix(name: &Option<String>) -> String {
    name.as_ref()
        .map(|n| format!(" (parameter {n})"))
        .unwrap_or_default()
}

impl ChartError {
    pub fn not_found(key: impl ToString) -> Self {
        ChartError::ConfigurationNotFound {
            key: key.to_string(),
            name: None,
        }
    }

    pub fn param_not_found(key: impl ToString, name: &str) -> Self {
        ChartError::ConfigurationNotFound {
            key: key.to_string(),
            name: Some(name.to_string()),
        }
    }

    pub fn persistence(reason: impl ToString) -> Self {
        ChartError::PersistenceFailure {
            reason: reason.to_string(),
        }
    }

    /// True for failures that block only the instance they belong to.
    pub fn is_isolated(&self) -> bool {
        matches!(
            self,
            ChartError::ConfigurationNotFound { .. }
                | ChartError::TypeConversion { .. }
                | ChartError::DependencyUnresolved { .. }
        )
    }
}

impl From<&ChartError> for std::process::ExitCode {
    fn from(err: &ChartError) -> Self {
        let code: u8 = match err {
            ChartError::Io(_) => 1,
            ChartError::ConfigParse { .. }
            | ChartError::ConfigMissing { .. }
            | ChartError::ConfigInvalid { .. } => 2,
            ChartError::PersistenceFailure { .. } => 3,
            ChartError::ConfigurationNotFound { .. }
            | ChartError::TypeConversion { .. }
            | ChartError::InvalidKey { .. } => 4,
            ChartError::DependencyUnresolved { .. }
            | ChartError::ComputationFailure { .. }
            | ChartError::NotActive { .. }
            | ChartError::IdentifierCollision { .. } => 5,
            ChartError::Data { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_kinds() {
        assert!(ChartError::not_found("EMA_1").is_isolated());
        assert!(
            ChartError::DependencyUnresolved {
                key: "EMA_2".into(),
                reference: "SMA_9".into(),
            }
            .is_isolated()
        );
        assert!(!ChartError::persistence("disk full").is_isolated());
        assert!(
            !ChartError::ComputationFailure {
                key: "RSI_1".into(),
                reason: "period 0".into(),
            }
            .is_isolated()
        );
    }

    #[test]
    fn not_found_message_names_parameter() {
        let err = ChartError::param_not_found("EMA_1", "TimeFrame");
        assert_eq!(
            err.to_string(),
            "configuration not found for EMA_1 (parameter TimeFrame)"
        );
        assert_eq!(
            ChartError::not_found("EMA_1").to_string(),
            "configuration not found for EMA_1"
        );
    }
}
