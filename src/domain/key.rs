//! Indicator instance identity.
//!
//! A key is `(type, id)` and renders as `TYPE_id`, e.g. `EMA_2`. Types may
//! themselves contain underscores, so parsing splits on the last one. A type
//! is never blank, never padded with whitespace and never contains `:`, the
//! separator of series references.

use crate::domain::error::ChartError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorKey {
    indicator_type: String,
    id: u32,
}

impl IndicatorKey {
    pub fn new(indicator_type: impl Into<String>, id: u32) -> Result<Self, ChartError> {
        let indicator_type = indicator_type.into();
        if indicator_type.trim().is_empty()
            || indicator_type.trim() != indicator_type
            || indicator_type.contains(':')
            || id == 0
        {
            return Err(ChartError::InvalidKey {
                input: format!("{}_{}", indicator_type, id),
            });
        }
        Ok(Self { indicator_type, id })
    }

    pub fn indicator_type(&self) -> &str {
        &self.indicator_type
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Same type, different id.
    pub fn with_id(&self, id: u32) -> Result<Self, ChartError> {
        Self::new(self.indicator_type.clone(), id)
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.indicator_type, self.id)
    }
}

impl FromStr for IndicatorKey {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChartError::InvalidKey {
            input: s.to_string(),
        };
        let (indicator_type, id) = s.trim().rsplit_once('_').ok_or_else(invalid)?;
        let id: u32 = id.parse().map_err(|_| invalid())?;
        Self::new(indicator_type, id).map_err(|_| invalid())
    }
}
