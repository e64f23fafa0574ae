//! SVG rendering of a chart layout.
//!
//! The primary panel draws the close line, visible overlays and trade
//! markers. Each sub-panel gets its own band below it with its own scale.

use crate::adapters::layout_renderer::ChartLayout;
use crate::domain::chart_indicator::ChartIndicator;
use crate::domain::ohlcv::BaseSeries;
use crate::domain::parameter::{Color, DashStyle, PriceField, Shape};
use crate::domain::trading::MarkerKind;
use std::fmt::Write;

const WIDTH: f64 = 800.0;
const PRIMARY_HEIGHT: f64 = 300.0;
const PANEL_HEIGHT: f64 = 120.0;
const PADDING: f64 = 40.0;
const PRICE_COLOR: Color = Color::rgb(0x33, 0x33, 0x33);

/// Vertical band of the chart with its own value range.
struct Band {
    top: f64,
    height: f64,
    min: f64,
    scale_y: f64,
    scale_x: f64,
}

impl Band {
    fn new<'a>(top: f64, height: f64, len: usize, values: impl Iterator<Item = &'a f64>) -> Self {
        let (min, max) = values
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 0.0) };
        let plot_height = height - 2.0 * PADDING;
        let range = max - min;
        let scale_y = if range > 0.0 { plot_height / range } else { 1.0 };
        let scale_x = if len > 1 {
            (WIDTH - 2.0 * PADDING) / (len - 1) as f64
        } else {
            0.0
        };
        Self {
            top,
            height,
            min,
            scale_y,
            scale_x,
        }
    }

    fn x(&self, index: usize) -> f64 {
        PADDING + index as f64 * self.scale_x
    }

    fn y(&self, value: f64) -> f64 {
        self.top + self.height - PADDING - (value - self.min) * self.scale_y
    }

    fn bottom(&self) -> f64 {
        self.top + self.height - PADDING
    }
}

pub fn render_svg(layout: &ChartLayout, base: &BaseSeries) -> String {
    let panels = layout.sub_panels();
    let total_height = PRIMARY_HEIGHT + PANEL_HEIGHT * panels.len() as f64;
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH:.0}" height="{total_height:.0}" viewBox="0 0 {WIDTH:.0} {total_height:.0}">"#
    );
    svg.push('\n');
    let _ = writeln!(
        svg,
        r#"<rect width="{WIDTH:.0}" height="{total_height:.0}" fill="white"/>"#
    );

    if base.is_empty() {
        let _ = writeln!(
            svg,
            r#"<text x="{PADDING:.0}" y="{PADDING:.0}">No price data available.</text>"#
        );
        svg.push_str("</svg>\n");
        return svg;
    }

    let close = base.column(PriceField::Close);
    let overlays = layout.visible_overlays();
    let bars = base.bars();
    let price_values = bars
        .iter()
        .flat_map(|b| [&b.low, &b.high])
        .chain(overlays.iter().flat_map(|(_, ind)| values_of(ind)));
    let primary = Band::new(0.0, PRIMARY_HEIGHT, base.len(), price_values);

    write_axes(&mut svg, &primary, base.symbol());

    for marker in layout.markers() {
        if let MarkerKind::Interval { start, end } = marker.kind {
            let (fill, opacity) = svg_color(marker.color);
            let _ = writeln!(
                svg,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{fill}" fill-opacity="{opacity:.2}"/>"#,
                primary.x(start),
                PADDING,
                primary.x(end) - primary.x(start),
                PRIMARY_HEIGHT - 2.0 * PADDING
            );
        }
    }

    write_line(&mut svg, &primary, &close, PRICE_COLOR, 1.0, DashStyle::Solid);
    for (_, indicator) in &overlays {
        write_indicator(&mut svg, &primary, indicator);
    }

    for marker in layout.markers() {
        let (index, price) = match marker.kind {
            MarkerKind::Entry { index, price } | MarkerKind::Exit { index, price } => {
                (index, price)
            }
            MarkerKind::Interval { .. } => continue,
        };
        let (fill, opacity) = svg_color(marker.color);
        let radius = if matches!(marker.kind, MarkerKind::Entry { .. }) {
            4.0
        } else {
            3.0
        };
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{radius:.1}" fill="{fill}" fill-opacity="{opacity:.2}"/>"#,
            primary.x(index),
            primary.y(price)
        );
    }

    for (i, panel) in panels.iter().enumerate() {
        let top = PRIMARY_HEIGHT + PANEL_HEIGHT * i as f64;
        let band = Band::new(top, PANEL_HEIGHT, base.len(), values_of(panel));
        write_axes(&mut svg, &band, &panel.identifier);
        write_indicator(&mut svg, &band, panel);
    }

    svg.push_str("</svg>\n");
    svg
}

fn values_of(indicator: &ChartIndicator) -> impl Iterator<Item = &f64> {
    indicator.series.iter().flat_map(|s| s.values.iter())
}

fn write_axes(svg: &mut String, band: &Band, label: &str) {
    let top = band.top + PADDING;
    let bottom = band.bottom();
    let _ = writeln!(
        svg,
        r##"<line x1="{PADDING:.1}" y1="{top:.1}" x2="{PADDING:.1}" y2="{bottom:.1}" stroke="#999999"/>"##
    );
    let _ = writeln!(
        svg,
        r##"<line x1="{PADDING:.1}" y1="{bottom:.1}" x2="{:.1}" y2="{bottom:.1}" stroke="#999999"/>"##,
        WIDTH - PADDING
    );
    let _ = writeln!(
        svg,
        r#"<text x="{PADDING:.1}" y="{:.1}" font-size="11">{}</text>"#,
        top - 6.0,
        escape(label)
    );
}

fn write_indicator(svg: &mut String, band: &Band, indicator: &ChartIndicator) {
    let style = &indicator.style;
    for (i, series) in indicator.series.iter().enumerate() {
        let color = style.color_for(&series.name, i);
        match style.shape {
            Shape::Line | Shape::Area | Shape::Bar => write_line(
                svg,
                band,
                &series.values,
                color,
                style.stroke.width,
                style.stroke.dash,
            ),
            Shape::Dot | Shape::Triangle | Shape::Square => {
                write_points(svg, band, &series.values, color, style.stroke.width)
            }
        }
    }
}

/// One polyline per run of finite values; warm-up and gaps break the line.
fn write_line(
    svg: &mut String,
    band: &Band,
    values: &[f64],
    color: Color,
    width: f64,
    dash: DashStyle,
) {
    let (stroke, opacity) = svg_color(color);
    let dasharray = match dash {
        DashStyle::Solid => "",
        DashStyle::Dashed => r#" stroke-dasharray="6,3""#,
        DashStyle::Dotted => r#" stroke-dasharray="1,3""#,
    };
    let mut points: Vec<String> = Vec::new();
    let flush = |points: &mut Vec<String>, svg: &mut String| {
        if points.len() > 1 {
            let _ = writeln!(
                svg,
                r#"<polyline points="{}" fill="none" stroke="{stroke}" stroke-opacity="{opacity:.2}" stroke-width="{width:.1}"{dasharray}/>"#,
                points.join(" ")
            );
        }
        points.clear();
    };
    for (i, value) in values.iter().enumerate() {
        if value.is_finite() {
            points.push(format!("{:.1},{:.1}", band.x(i), band.y(*value)));
        } else {
            flush(&mut points, svg);
        }
    }
    flush(&mut points, svg);
}

fn write_points(svg: &mut String, band: &Band, values: &[f64], color: Color, width: f64) {
    let (fill, opacity) = svg_color(color);
    for (i, value) in values.iter().enumerate().filter(|(_, v)| v.is_finite()) {
        let _ = writeln!(
            svg,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{fill}" fill-opacity="{opacity:.2}"/>"#,
            band.x(i),
            band.y(*value),
            width + 1.0
        );
    }
}

fn svg_color(color: Color) -> (String, f64) {
    (
        format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b),
        f64::from(color.a) / 255.0,
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
