//! Trading records and the markers drawn for them.
//!
//! A record starts every trade with the same order type; the closing order
//! type is its complement. Markers are colored by the bias of the position,
//! which is the complement of the closing type.

use crate::domain::error::ChartError;
use crate::domain::parameter::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderType {
    Buy,
    Sell,
}

impl OrderType {
    pub fn complement(&self) -> OrderType {
        match self {
            OrderType::Buy => OrderType::Sell,
            OrderType::Sell => OrderType::Buy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "buy",
            OrderType::Sell => "sell",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(OrderType::Buy),
            "sell" | "short" => Ok(OrderType::Sell),
            _ => Err(format!("unknown order type {s:?}")),
        }
    }
}

/// One side of a trade at a bar index of the base series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Order {
    pub order_type: OrderType,
    pub index: usize,
    pub price: f64,
    pub amount: f64,
}

/// A closed entry/exit pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub entry: Order,
    pub exit: Order,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingRecord {
    starting_type: OrderType,
    trades: Vec<Trade>,
    open: Option<Order>,
}

impl TradingRecord {
    pub fn new(starting_type: OrderType) -> Self {
        Self {
            starting_type,
            trades: Vec::new(),
            open: None,
        }
    }

    pub fn starting_type(&self) -> OrderType {
        self.starting_type
    }

    pub fn closing_type(&self) -> OrderType {
        self.starting_type.complement()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn is_closed(&self) -> bool {
        self.open.is_none()
    }

    pub fn enter(&mut self, index: usize, price: f64, amount: f64) -> Result<(), ChartError> {
        if let Some(open) = &self.open {
            return Err(ChartError::Data {
                reason: format!("entry at bar {index} while a trade opened at bar {} is still open", open.index),
            });
        }
        if let Some(last) = self.trades.last() {
            if index < last.exit.index {
                return Err(ChartError::Data {
                    reason: format!("entry at bar {index} precedes previous exit at bar {}", last.exit.index),
                });
            }
        }
        self.open = Some(Order {
            order_type: self.starting_type,
            index,
            price,
            amount,
        });
        Ok(())
    }

    pub fn exit(&mut self, index: usize, price: f64, amount: f64) -> Result<(), ChartError> {
        let entry = self.open.take().ok_or_else(|| ChartError::Data {
            reason: format!("exit at bar {index} without an open trade"),
        })?;
        if index < entry.index {
            self.open = Some(entry);
            return Err(ChartError::Data {
                reason: format!("exit at bar {index} precedes entry at bar {}", entry.index),
            });
        }
        self.trades.push(Trade {
            entry,
            exit: Order {
                order_type: self.closing_type(),
                index,
                price,
                amount,
            },
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bias {
    Bullish,
    Bearish,
}

impl Bias {
    /// Bias of a record's positions: the complement of its closing order type.
    pub fn of(record: &TradingRecord) -> Bias {
        match record.closing_type().complement() {
            OrderType::Buy => Bias::Bullish,
            OrderType::Sell => Bias::Bearish,
        }
    }
}

/// Marker colors, read from the `[markers]` config section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPalette {
    pub bullish: Color,
    pub bearish: Color,
    /// Interval band color; `None` uses the bias color at [`INTERVAL_ALPHA`].
    pub interval: Option<Color>,
}

pub const INTERVAL_ALPHA: u8 = 0x40;

impl Default for MarkerPalette {
    fn default() -> Self {
        Self {
            bullish: Color::rgb(0x2C, 0xA0, 0x2C),
            bearish: Color::rgb(0xD6, 0x27, 0x28),
            interval: None,
        }
    }
}

impl MarkerPalette {
    pub fn color(&self, bias: Bias) -> Color {
        match bias {
            Bias::Bullish => self.bullish,
            Bias::Bearish => self.bearish,
        }
    }

    pub fn interval_color(&self, bias: Bias) -> Color {
        self.interval.unwrap_or_else(|| {
            let c = self.color(bias);
            Color::rgba(c.r, c.g, c.b, INTERVAL_ALPHA)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerKind {
    /// Shaded band from entry bar to exit bar.
    Interval { start: usize, end: usize },
    Entry { index: usize, price: f64 },
    Exit { index: usize, price: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeMarker {
    pub kind: MarkerKind,
    pub color: Color,
}

/// Interval, entry and exit marker per closed trade, in trade order.
pub fn build_markers(record: &TradingRecord, palette: &MarkerPalette) -> Vec<TradeMarker> {
    let bias = Bias::of(record);
    let color = palette.color(bias);
    let band = palette.interval_color(bias);
    record
        .trades()
        .iter()
        .flat_map(|trade| {
            [
                TradeMarker {
                    kind: MarkerKind::Interval {
                        start: trade.entry.index,
                        end: trade.exit.index,
                    },
                    color: band,
                },
                TradeMarker {
                    kind: MarkerKind::Entry {
                        index: trade.entry.index,
                        price: trade.entry.price,
                    },
                    color,
                },
                TradeMarker {
                    kind: MarkerKind::Exit {
                        index: trade.exit.index,
                        price: trade.exit.price,
                    },
                    color,
                },
            ]
        })
        .collect()
}
