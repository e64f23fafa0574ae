//! Typed indicator parameters and their canonical string encodings.
//!
//! Every persisted value is a string tagged with a [`ParameterType`]. Each
//! variant has exactly one canonical encoding, and `parse(encode(v)) == v`
//! holds for every value a [`ParameterValue`] can carry.

use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    Boolean,
    Integer,
    Double,
    String,
    Shape,
    Stroke,
    Color,
    SeriesRef,
    IndicatorRef,
    ChartPlacement,
}

impl ParameterType {
    pub const ALL: [ParameterType; 10] = [
        ParameterType::Boolean,
        ParameterType::Integer,
        ParameterType::Double,
        ParameterType::String,
        ParameterType::Shape,
        ParameterType::Stroke,
        ParameterType::Color,
        ParameterType::SeriesRef,
        ParameterType::IndicatorRef,
        ParameterType::ChartPlacement,
    ];

    /// Tag stored next to the raw value.
    pub fn tag(&self) -> &'static str {
        match self {
            ParameterType::Boolean => "Boolean",
            ParameterType::Integer => "Integer",
            ParameterType::Double => "Double",
            ParameterType::String => "String",
            ParameterType::Shape => "Shape",
            ParameterType::Stroke => "Stroke",
            ParameterType::Color => "Color",
            ParameterType::SeriesRef => "SeriesRef",
            ParameterType::IndicatorRef => "IndicatorRef",
            ParameterType::ChartPlacement => "ChartPlacement",
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterType::ALL
            .iter()
            .copied()
            .find(|t| t.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown parameter type {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Line,
    Dot,
    Bar,
    Area,
    Triangle,
    Square,
}

impl Shape {
    const ALL: [Shape; 6] = [
        Shape::Line,
        Shape::Dot,
        Shape::Bar,
        Shape::Area,
        Shape::Triangle,
        Shape::Square,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Line => "Line",
            Shape::Dot => "Dot",
            Shape::Bar => "Bar",
            Shape::Area => "Area",
            Shape::Triangle => "Triangle",
            Shape::Square => "Square",
        }
    }
}

impl FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shape::ALL
            .iter()
            .copied()
            .find(|shape| shape.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown shape {s:?}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashStyle {
    Solid,
    Dashed,
    Dotted,
}

impl DashStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashStyle::Solid => "solid",
            DashStyle::Dashed => "dashed",
            DashStyle::Dotted => "dotted",
        }
    }
}

impl FromStr for DashStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solid" => Ok(DashStyle::Solid),
            "dashed" => Ok(DashStyle::Dashed),
            "dotted" => Ok(DashStyle::Dotted),
            _ => Err(format!("unknown dash style {s:?}")),
        }
    }
}

/// Line stroke: width in pixels plus dash pattern, encoded `width:dash`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f64,
    pub dash: DashStyle,
}

impl Default for Stroke {
    fn default() -> Self {
        Stroke {
            width: 1.0,
            dash: DashStyle::Solid,
        }
    }
}

impl fmt::Display for Stroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.dash.as_str())
    }
}

impl FromStr for Stroke {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, dash) = s
            .split_once(':')
            .ok_or_else(|| format!("expected width:dash, got {s:?}"))?;
        let width: f64 = width
            .trim()
            .parse()
            .map_err(|e| format!("invalid stroke width: {e}"))?;
        if !width.is_finite() || width < 0.0 {
            return Err(format!("stroke width must be finite and non-negative, got {width}"));
        }
        Ok(Stroke {
            width,
            dash: dash.parse()?,
        })
    }
}

/// RGBA color, encoded `#RRGGBB` when opaque and `#RRGGBBAA` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("color must start with '#', got {s:?}"))?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!("expected #RRGGBB or #RRGGBBAA, got {s:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid color {s:?}: {e}"))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

/// A column of the base OHLCV series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
    Typical,
}

impl PriceField {
    const ALL: [PriceField; 6] = [
        PriceField::Open,
        PriceField::High,
        PriceField::Low,
        PriceField::Close,
        PriceField::Volume,
        PriceField::Typical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Volume => "Volume",
            PriceField::Typical => "Typical",
        }
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriceField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown price field {s:?}"))
    }
}

/// Input series for a computation: a base column or a named series of
/// another active indicator (`EMA_1:value`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesRef {
    Base(PriceField),
    Indicator { key: IndicatorKey, series: String },
}

impl fmt::Display for SeriesRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesRef::Base(field) => f.write_str(field.as_str()),
            SeriesRef::Indicator { key, series } => write!(f, "{key}:{series}"),
        }
    }
}

impl FromStr for SeriesRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((key, series)) => {
                if series.is_empty() {
                    return Err(format!("missing series name in {s:?}"));
                }
                let key: IndicatorKey = key.parse().map_err(|e: ChartError| e.to_string())?;
                Ok(SeriesRef::Indicator {
                    key,
                    series: series.to_string(),
                })
            }
            None => Ok(SeriesRef::Base(s.parse()?)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Overlay,
    Subplot,
}

impl Placement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Placement::Overlay => "Overlay",
            Placement::Subplot => "Subplot",
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Placement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overlay" => Ok(Placement::Overlay),
            "subplot" => Ok(Placement::Subplot),
            _ => Err(format!("unknown placement {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Shape(Shape),
    Stroke(Stroke),
    Color(Color),
    SeriesRef(SeriesRef),
    IndicatorRef(IndicatorKey),
    ChartPlacement(Placement),
}

impl ParameterValue {
    pub fn parameter_type(&self) -> ParameterType {
        match self {
            ParameterValue::Boolean(_) => ParameterType::Boolean,
            ParameterValue::Integer(_) => ParameterType::Integer,
            ParameterValue::Double(_) => ParameterType::Double,
            ParameterValue::String(_) => ParameterType::String,
            ParameterValue::Shape(_) => ParameterType::Shape,
            ParameterValue::Stroke(_) => ParameterType::Stroke,
            ParameterValue::Color(_) => ParameterType::Color,
            ParameterValue::SeriesRef(_) => ParameterType::SeriesRef,
            ParameterValue::IndicatorRef(_) => ParameterType::IndicatorRef,
            ParameterValue::ChartPlacement(_) => ParameterType::ChartPlacement,
        }
    }

    /// Canonical string form.
    pub fn encode(&self) -> String {
        match self {
            ParameterValue::Boolean(v) => v.to_string(),
            ParameterValue::Integer(v) => v.to_string(),
            ParameterValue::Double(v) => v.to_string(),
            ParameterValue::String(v) => v.clone(),
            ParameterValue::Shape(v) => v.as_str().to_string(),
            ParameterValue::Stroke(v) => v.to_string(),
            ParameterValue::Color(v) => v.to_string(),
            ParameterValue::SeriesRef(v) => v.to_string(),
            ParameterValue::IndicatorRef(v) => v.to_string(),
            ParameterValue::ChartPlacement(v) => v.as_str().to_string(),
        }
    }

    pub fn parse(parameter_type: ParameterType, raw: &str) -> Result<Self, ValueParseError> {
        let fail = |reason: String| ValueParseError {
            type_tag: parameter_type.tag().to_string(),
            value: raw.to_string(),
            reason,
        };
        let value = match parameter_type {
            ParameterType::Boolean => ParameterValue::Boolean(parse_bool(raw).ok_or_else(|| {
                fail("expected true or false".to_string())
            })?),
            ParameterType::Integer => ParameterValue::Integer(
                raw.trim().parse().map_err(|e| fail(format!("{e}")))?,
            ),
            ParameterType::Double => {
                let v: f64 = raw.trim().parse().map_err(|e| fail(format!("{e}")))?;
                if !v.is_finite() {
                    return Err(fail("value must be finite".to_string()));
                }
                ParameterValue::Double(v)
            }
            ParameterType::String => ParameterValue::String(raw.to_string()),
            ParameterType::Shape => ParameterValue::Shape(raw.parse().map_err(fail)?),
            ParameterType::Stroke => ParameterValue::Stroke(raw.parse().map_err(fail)?),
            ParameterType::Color => ParameterValue::Color(raw.parse().map_err(fail)?),
            ParameterType::SeriesRef => ParameterValue::SeriesRef(raw.parse().map_err(fail)?),
            ParameterType::IndicatorRef => ParameterValue::IndicatorRef(
                raw.parse()
                    .map_err(|e: ChartError| fail(e.to_string()))?,
            ),
            ParameterType::ChartPlacement => {
                ParameterValue::ChartPlacement(raw.parse().map_err(fail)?)
            }
        };
        Ok(value)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// A raw value that does not parse as its declared type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{value:?} is not a valid {type_tag}: {reason}")]
pub struct ValueParseError {
    pub type_tag: String,
    pub value: String,
    pub reason: String,
}

impl ValueParseError {
    pub fn for_parameter(self, key: &IndicatorKey, name: &str) -> ChartError {
        ChartError::TypeConversion {
            key: key.to_string(),
            name: name.to_string(),
            type_tag: self.type_tag,
            value: self.value,
            reason: self.reason,
        }
    }
}

/// One stored parameter: name, declared type, raw string value.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParameter {
    pub name: String,
    pub parameter_type: ParameterType,
    pub raw: String,
}

impl IndicatorParameter {
    pub fn new(name: impl Into<String>, parameter_type: ParameterType, raw: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            raw: raw.into(),
        }
    }

    pub fn typed(name: impl Into<String>, value: &ParameterValue) -> Self {
        Self::new(name, value.parameter_type(), value.encode())
    }

    pub fn value(&self) -> Result<ParameterValue, ValueParseError> {
        ParameterValue::parse(self.parameter_type, &self.raw)
    }

    /// Parse the raw value, attributing a failure to `key`.
    pub fn value_for(&self, key: &IndicatorKey) -> Result<ParameterValue, ChartError> {
        self.value().map_err(|e| e.for_parameter(key, &self.name))
    }
}


#[cfg(test)]
mod tests {
    use super::strategies::{arb_key, arb_value};
    use super::*;
    use proptest::prelude::*;

    fn round_trip(value: ParameterValue) {
        let encoded = value.encode();
        let parsed = ParameterValue::parse(value.parameter_type(), &encoded).unwrap();
        assert_eq!(parsed, value, "encoded as {encoded:?}");
    }

    #[test]
    fn type_tags_parse_back() {
        for t in ParameterType::ALL {
            assert_eq!(t.tag().parse::<ParameterType>().unwrap(), t);
        }
        assert!("Float".parse::<ParameterType>().is_err());
    }

    #[test]
    fn color_encodings() {
        assert_eq!(Color::rgb(255, 0, 16).to_string(), "#FF0010");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#01020304");
        assert_eq!("#ff0010".parse::<Color>().unwrap(), Color::rgb(255, 0, 16));
        assert!("FF0010".parse::<Color>().is_err());
        assert!("#FF00".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
    }

    #[test]
    fn stroke_encoding() {
        let stroke = Stroke {
            width: 1.5,
            dash: DashStyle::Dashed,
        };
        assert_eq!(stroke.to_string(), "1.5:dashed");
        assert_eq!("2:dotted".parse::<Stroke>().unwrap().width, 2.0);
        assert!("-1:solid".parse::<Stroke>().is_err());
        assert!("1.0".parse::<Stroke>().is_err());
    }

    #[test]
    fn series_ref_encodings() {
        assert_eq!(
            "Close".parse::<SeriesRef>().unwrap(),
            SeriesRef::Base(PriceField::Close)
        );
        let r: SeriesRef = "MACD_1:signal".parse().unwrap();
        assert_eq!(r.to_string(), "MACD_1:signal");
        assert!("MACD_1:".parse::<SeriesRef>().is_err());
        assert!("Median".parse::<SeriesRef>().is_err());
    }

    #[test]
    fn invalid_values_report_type() {
        let err = ParameterValue::parse(ParameterType::Integer, "twenty").unwrap_err();
        assert_eq!(err.type_tag, "Integer");
        assert_eq!(err.value, "twenty");

        let key = IndicatorKey::new("EMA", 1).unwrap();
        let param = IndicatorParameter::new("TimeFrame", ParameterType::Integer, "twenty");
        assert!(matches!(
            param.value_for(&key),
            Err(ChartError::TypeConversion { ref name, .. }) if name == "TimeFrame"
        ));
    }

    #[test]
    fn double_rejects_non_finite() {
        assert!(ParameterValue::parse(ParameterType::Double, "NaN").is_err());
        assert!(ParameterValue::parse(ParameterType::Double, "inf").is_err());
    }

    #[test]
    fn fixed_round_trips() {
        round_trip(ParameterValue::Boolean(false));
        round_trip(ParameterValue::Shape(Shape::Triangle));
        round_trip(ParameterValue::ChartPlacement(Placement::Subplot));
        round_trip(ParameterValue::IndicatorRef(IndicatorKey::new("EMA", 3).unwrap()));
        round_trip(ParameterValue::SeriesRef(SeriesRef::Indicator {
            key: IndicatorKey::new("BOLLINGER", 1).unwrap(),
            series: "upper".into(),
        }));
        round_trip(ParameterValue::Double(0.1 + 0.2));
        round_trip(ParameterValue::Double(-1.0e-300));
    }

    proptest! {
        #[test]
        fn encode_then_parse_is_identity(value in arb_value()) {
            let encoded = value.encode();
            let parsed = ParameterValue::parse(value.parameter_type(), &encoded).unwrap();
            prop_assert_eq!(parsed, value);
        }

        #[test]
        fn key_display_then_parse_is_identity(key in arb_key()) {
            let parsed: IndicatorKey = key.to_string().parse().unwrap();
            prop_assert_eq!(parsed, key);
        }
    }
}
