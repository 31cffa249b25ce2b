//! Point-and-Figure series.

use meridian_core::{Bar, Price, Timestamp};
use meridian_ports::{ConfigError, ConfigResult, SeriesGenerator};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::quantize::{ceil_to_step, floor_to_step};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Rising column
    X,
    /// Falling column
    O,
}

/// One P&F column. `high` and `low` always sit on box multiples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnfColumn {
    pub start: Timestamp,
    pub end: Timestamp,
    pub kind: ColumnKind,
    pub high: Price,
    pub low: Price,
}

impl PnfColumn {
    /// Number of box marks in the column, both ends included
    pub fn boxes(&self, box_size: Price) -> u32 {
        ((self.high - self.low) / box_size)
            .trunc()
            .to_u32()
            .unwrap_or(0)
            + 1
    }
}

/// Builds X/O columns from bar highs and lows.
///
/// Extension needs a favourable move of one box; reversal needs an adverse
/// move of `reversal * box_size` on the raw price. Extension is checked first.
#[derive(Debug, Clone)]
pub struct PointFigureGenerator {
    box_size: Price,
    reversal: usize,
    /// First close, while the direction is still undetermined
    anchor: Option<(Timestamp, Price)>,
    columns: Vec<PnfColumn>,
}

impl PointFigureGenerator {
    pub fn new(box_size: Price, reversal: usize) -> ConfigResult<Self> {
        let box_size = ConfigError::require_positive("box size", box_size)?;
        let reversal = ConfigError::require_at_least("reversal", reversal, 1)?;
        Ok(Self {
            box_size,
            reversal,
            anchor: None,
            columns: Vec::new(),
        })
    }

    pub fn box_size(&self) -> Price {
        self.box_size
    }

    pub fn reversal(&self) -> usize {
        self.reversal
    }

    /// Direction of the current column; `None` while undetermined
    pub fn current_kind(&self) -> Option<ColumnKind> {
        self.columns.last().map(|c| c.kind)
    }

    fn reversal_distance(&self) -> Price {
        self.box_size * Decimal::from(self.reversal)
    }

    fn open_first_column(&mut self, bar: &Bar) {
        let Some((anchor_time, anchor)) = self.anchor else {
            self.anchor = Some((bar.time(), bar.close()));
            return;
        };

        let rises = bar.high() - anchor >= self.box_size;
        let falls = anchor - bar.low() >= self.box_size;
        let kind = match (rises, falls) {
            (true, true) if bar.is_up() => ColumnKind::X,
            (true, true) => ColumnKind::O,
            (true, false) => ColumnKind::X,
            (false, true) => ColumnKind::O,
            (false, false) => return,
        };

        let (high, low) = match kind {
            ColumnKind::X => (
                ceil_to_step(bar.high(), self.box_size),
                floor_to_step(anchor, self.box_size),
            ),
            ColumnKind::O => (
                ceil_to_step(anchor, self.box_size),
                floor_to_step(bar.low(), self.box_size),
            ),
        };

        tracing::debug!("P&F first column {:?} {}..{}", kind, low, high);
        self.columns.push(PnfColumn {
            start: anchor_time,
            end: bar.time(),
            kind,
            high,
            low,
        });
    }
}

impl SeriesGenerator for PointFigureGenerator {
    type Output = PnfColumn;

    fn reset(&mut self) {
        self.anchor = None;
        self.columns.clear();
    }

    fn update(&mut self, bar: &Bar) -> &[PnfColumn] {
        let box_size = self.box_size;
        let reversal_distance = self.reversal_distance();

        let Some(column) = self.columns.last_mut() else {
            self.open_first_column(bar);
            return &self.columns;
        };

        let reversed = match column.kind {
            ColumnKind::X => {
                if bar.high() >= column.high + box_size {
                    column.high = ceil_to_step(bar.high(), box_size);
                    column.end = bar.time();
                    None
                } else if column.high - bar.low() >= reversal_distance {
                    Some(PnfColumn {
                        start: bar.time(),
                        end: bar.time(),
                        kind: ColumnKind::O,
                        high: column.high - box_size,
                        low: floor_to_step(bar.low(), box_size),
                    })
                } else {
                    None
                }
            }
            ColumnKind::O => {
                if bar.low() <= column.low - box_size {
                    column.low = floor_to_step(bar.low(), box_size);
                    column.end = bar.time();
                    None
                } else if bar.high() - column.low >= reversal_distance {
                    Some(PnfColumn {
                        start: bar.time(),
                        end: bar.time(),
                        kind: ColumnKind::X,
                        high: ceil_to_step(bar.high(), box_size),
                        low: column.low + box_size,
                    })
                } else {
                    None
                }
            }
        };

        if let Some(next) = reversed {
            tracing::trace!("P&F reversal to {:?} at {}", next.kind, bar.time());
            self.columns.push(next);
        }

        &self.columns
    }

    fn series(&self) -> &[PnfColumn] {
        &self.columns
    }
}
