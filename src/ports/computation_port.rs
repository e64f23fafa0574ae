//! Computation engine port.
//!
//! `compute` is a pure function of the base series and the resolved inputs.
//! Each returned series must have exactly one value per base bar.

use crate::domain::chart_indicator::{ComputationInputs, NamedSeries};
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::ohlcv::BaseSeries;

pub trait ComputationPort {
    fn compute(
        &self,
        key: &IndicatorKey,
        base: &BaseSeries,
        inputs: &ComputationInputs,
    ) -> Result<Vec<NamedSeries>, ChartError>;
}
