//! Builtin indicator definitions used to seed a fresh parameter store.

use crate::domain::category::Category;
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::parameter::{
    Color, IndicatorParameter, ParameterValue, Placement, PriceField, SeriesRef,
};
use crate::domain::store::ParameterStore;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorDefinition {
    pub indicator_type: &'static str,
    pub description: &'static str,
    pub category: Category,
    /// Parameters of the first instance created for this type.
    pub params: Vec<IndicatorParameter>,
}

fn integer(name: &str, v: i64) -> IndicatorParameter {
    IndicatorParameter::typed(name, &ParameterValue::Integer(v))
}

fn placement(p: Placement) -> IndicatorParameter {
    IndicatorParameter::typed("Placement", &ParameterValue::ChartPlacement(p))
}

fn color(name: &str, c: Color) -> IndicatorParameter {
    IndicatorParameter::typed(name, &ParameterValue::Color(c))
}

fn source(field: PriceField) -> IndicatorParameter {
    IndicatorParameter::typed("Source", &ParameterValue::SeriesRef(SeriesRef::Base(field)))
}

fn definition(
    indicator_type: &'static str,
    description: &'static str,
    category: Category,
    params: Vec<IndicatorParameter>,
) -> IndicatorDefinition {
    IndicatorDefinition {
        indicator_type,
        description,
        category,
        params,
    }
}

pub fn default_definitions() -> Vec<IndicatorDefinition> {
    use Category::*;
    use Placement::*;
    vec![
        definition(
            "SMA",
            "Simple moving average",
            MovingAverage,
            vec![integer("TimeFrame", 50), source(PriceField::Close), placement(Overlay), color("Color", Color::rgb(0xFF, 0x7F, 0x0E))],
        ),
        definition(
            "EMA",
            "Exponential moving average",
            MovingAverage,
            vec![integer("TimeFrame", 20), source(PriceField::Close), placement(Overlay), color("Color", Color::rgb(0x1F, 0x77, 0xB4))],
        ),
        definition(
            "WMA",
            "Weighted moving average",
            MovingAverage,
            vec![integer("TimeFrame", 20), source(PriceField::Close), placement(Overlay), color("Color", Color::rgb(0x94, 0x67, 0xBD))],
        ),
        definition(
            "BOLLINGER",
            "Bollinger bands",
            Volatility,
            vec![
                integer("TimeFrame", 20),
                IndicatorParameter::typed("Multiplier", &ParameterValue::Double(2.0)),
                source(PriceField::Close),
                placement(Overlay),
                color("Color", Color::rgb(0x7F, 0x7F, 0x7F)),
            ],
        ),
        definition(
            "RSI",
            "Relative strength index",
            Oscillator,
            vec![integer("TimeFrame", 14), source(PriceField::Close), placement(Subplot), color("Color", Color::rgb(0x8C, 0x56, 0x4B))],
        ),
        definition(
            "MACD",
            "Moving average convergence divergence",
            Momentum,
            vec![
                integer("ShortTimeFrame", 12),
                integer("LongTimeFrame", 26),
                integer("SignalTimeFrame", 9),
                source(PriceField::Close),
                placement(Subplot),
                color("macd", Color::rgb(0x1F, 0x77, 0xB4)),
                color("signal", Color::rgb(0xFF, 0x7F, 0x0E)),
                color("histogram", Color::rgb(0x7F, 0x7F, 0x7F)),
            ],
        ),
        definition(
            "ROC",
            "Rate of change",
            Momentum,
            vec![integer("TimeFrame", 12), source(PriceField::Close), placement(Subplot)],
        ),
        definition(
            "OBV",
            "On-balance volume",
            Volume,
            vec![placement(Subplot), color("Color", Color::rgb(0x17, 0xBE, 0xCF))],
        ),
        definition(
            "STDDEV",
            "Rolling standard deviation",
            Statistics,
            vec![integer("TimeFrame", 20), source(PriceField::Close), placement(Subplot)],
        ),
        definition(
            "ATR",
            "Average true range",
            Volatility,
            vec![integer("TimeFrame", 14), placement(Subplot)],
        ),
    ]
}

/// Define every builtin type and create a first instance for each type that
/// has none. Returns the keys created.
pub fn seed(store: &mut ParameterStore) -> Result<Vec<IndicatorKey>, ChartError> {
    let mut created = Vec::new();
    for def in default_definitions() {
        store.define_indicator(def.indicator_type, def.description)?;
        if store.document().max_id(def.indicator_type).is_none() {
            created.push(store.create_instance(def.indicator_type, def.category, &def.params)?);
        }
    }
    tracing::info!(created = created.len(), "catalog seeded");
    Ok(created)
}
