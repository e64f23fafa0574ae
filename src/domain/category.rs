//! Menu grouping for indicator instances.
//!
//! Category is independent of placement: an oscillator can be drawn as an
//! overlay and a moving average in its own subplot.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Default,
    MovingAverage,
    Momentum,
    Oscillator,
    Trend,
    Volatility,
    Volume,
    Statistics,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Default,
        Category::MovingAverage,
        Category::Momentum,
        Category::Oscillator,
        Category::Trend,
        Category::Volatility,
        Category::Volume,
        Category::Statistics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Default => "DEFAULT",
            Category::MovingAverage => "MOVING_AVERAGE",
            Category::Momentum => "MOMENTUM",
            Category::Oscillator => "OSCILLATOR",
            Category::Trend => "TREND",
            Category::Volatility => "VOLATILITY",
            Category::Volume => "VOLUME",
            Category::Statistics => "STATISTICS",
        }
    }

    /// Resolve a stored attribute. `None` means the value is present but not
    /// a known category; absent or blank attributes resolve to `Default`.
    pub fn from_attribute(raw: Option<&str>) -> Option<Category> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Some(Category::Default),
            Some(raw) => raw,
        };
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw))
    }

    /// Title of the menu this category is listed under.
    pub fn menu_title(&self) -> &'static str {
        match self {
            Category::Default => "Other",
            Category::MovingAverage => "Moving Averages",
            Category::Momentum => "Momentum",
            Category::Oscillator => "Oscillators",
            Category::Trend => "Trend",
            Category::Volatility => "Volatility",
            Category::Volume => "Volume",
            Category::Statistics => "Statistics",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
