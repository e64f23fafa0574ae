//! Durable storage for the parameter document.
//!
//! Every write must be durable when the call returns. Failures are reported
//! as [`ChartError::PersistenceFailure`].

use crate::domain::document::{InstanceNode, ParameterDocument};
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;

pub trait ParameterStoragePort {
    fn load_document(&self) -> Result<ParameterDocument, ChartError>;

    fn write_definition(&self, indicator_type: &str, description: &str) -> Result<(), ChartError>;

    /// Insert the instance, or replace it with all of its parameters.
    fn write_instance(&self, indicator_type: &str, instance: &InstanceNode)
    -> Result<(), ChartError>;

    fn write_parameter(&self, key: &IndicatorKey, name: &str, value: &str)
    -> Result<(), ChartError>;

    fn write_category(&self, key: &IndicatorKey, category: &str) -> Result<(), ChartError>;
}
