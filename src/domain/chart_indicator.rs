//! Runtime indicator: computed series plus how to draw them.

use crate::domain::category::Category;
use crate::domain::key::IndicatorKey;
use crate::domain::parameter::{Color, ParameterValue, Placement, Shape, Stroke};

/// One named output column, aligned 1:1 with the base series. Warm-up bars
/// hold `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSeries {
    pub name: String,
    pub values: Vec<f64>,
}

impl NamedSeries {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

pub const DEFAULT_COLOR: Color = Color::rgb(0x1F, 0x77, 0xB4);

/// Style derived from an instance's Color, Shape and Stroke parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStyle {
    /// Named colors in parameter order; the first one is the primary color.
    pub colors: Vec<(String, Color)>,
    pub shape: Shape,
    pub stroke: Stroke,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            colors: Vec::new(),
            shape: Shape::Line,
            stroke: Stroke::default(),
        }
    }
}

impl RenderStyle {
    pub fn primary_color(&self) -> Color {
        self.colors.first().map(|(_, c)| *c).unwrap_or(DEFAULT_COLOR)
    }

    /// Color for the `index`-th series: a color parameter named after the
    /// series wins, then positional order, then the primary color.
    pub fn color_for(&self, series: &str, index: usize) -> Color {
        self.colors
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(series))
            .or_else(|| self.colors.get(index))
            .map(|(_, c)| *c)
            .unwrap_or_else(|| self.primary_color())
    }

    /// Build from style parameters in stored order. Every Color is kept;
    /// for Shape and Stroke the first one wins.
    pub fn from_values<'a>(values: impl IntoIterator<Item = (&'a str, &'a ParameterValue)>) -> Self {
        let mut style = RenderStyle::default();
        let mut shape = None;
        let mut stroke = None;
        for (name, value) in values {
            match value {
                ParameterValue::Color(c) => style.colors.push((name.to_string(), *c)),
                ParameterValue::Shape(s) => {
                    shape.get_or_insert(*s);
                }
                ParameterValue::Stroke(s) => {
                    stroke.get_or_insert(*s);
                }
                _ => {}
            }
        }
        style.shape = shape.unwrap_or(style.shape);
        style.stroke = stroke.unwrap_or(style.stroke);
        style
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartIndicator {
    /// Registry identifier, `TYPE_id` for store-backed instances.
    pub identifier: String,
    /// `None` for indicators added directly rather than loaded from the store.
    pub key: Option<IndicatorKey>,
    pub category: Category,
    pub placement: Placement,
    pub series: Vec<NamedSeries>,
    pub style: RenderStyle,
}

impl ChartIndicator {
    pub fn series_named(&self, name: &str) -> Option<&NamedSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// First output, used when another indicator references this one whole.
    pub fn primary_series(&self) -> Option<&NamedSeries> {
        self.series.first()
    }
}

/// Inputs handed to the computation engine once references are resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputationInputs {
    /// Integer, Double, Boolean and String parameters, in stored order.
    pub scalars: Vec<(String, ParameterValue)>,
    /// Resolved SeriesRef and IndicatorRef parameters.
    pub series: Vec<(String, Vec<f64>)>,
}

impl ComputationInputs {
    fn scalar(&self, name: &str) -> Option<&ParameterValue> {
        self.scalars
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.scalar(name)? {
            ParameterValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Doubles, accepting an Integer parameter too.
    pub fn double(&self, name: &str) -> Option<f64> {
        match self.scalar(name)? {
            ParameterValue::Double(v) => Some(*v),
            ParameterValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.scalar(name)? {
            ParameterValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.scalar(name)? {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn input(&self, name: &str) -> Option<&[f64]> {
        self.series
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }
}
