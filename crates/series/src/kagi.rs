//! Kagi series.
//!
//! Direction and thickness are tracked separately. A line reverses when the
//! close retraces the reversal amount from the line's extreme. Thickness only
//! changes when a line breaches the previous opposite swing: a rising line
//! that exceeds the last shoulder turns thick, a falling line that drops
//! under the last waist turns thin. The emitted line is split at the breach
//! price so every segment carries a single thickness.

use meridian_core::{Bar, Price, Timestamp};
use meridian_ports::{ConfigError, ConfigResult, SeriesGenerator};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::direction::Direction;

/// How far price must retrace from the extreme to reverse the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum KagiReversal {
    /// Fixed price distance
    Points(Price),
    /// Percentage of the extreme price
    Percent(Decimal),
}

impl KagiReversal {
    fn amount_at(&self, extreme: Price) -> Price {
        match *self {
            KagiReversal::Points(points) => points,
            KagiReversal::Percent(pct) => (extreme * pct / Decimal::ONE_HUNDRED).abs(),
        }
    }
}

/// Line weight: thick (yang) or thin (yin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Thickness {
    Thick,
    Thin,
}

/// One vertical Kagi segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KagiLine {
    pub start: Timestamp,
    pub end: Timestamp,
    /// Price the segment starts at
    pub from: Price,
    /// Price the segment currently reaches
    pub to: Price,
    pub high: Price,
    pub low: Price,
    pub direction: Direction,
    pub thickness: Thickness,
}

impl KagiLine {
    fn new(
        start: Timestamp,
        end: Timestamp,
        from: Price,
        to: Price,
        direction: Direction,
        thickness: Thickness,
    ) -> Self {
        Self {
            start,
            end,
            from,
            to,
            high: from.max(to),
            low: from.min(to),
            direction,
            thickness,
        }
    }

    fn set_to(&mut self, to: Price, end: Timestamp) {
        self.to = to;
        self.end = end;
        self.high = self.from.max(to);
        self.low = self.from.min(to);
    }
}

#[derive(Debug, Clone)]
pub struct KagiGenerator {
    reversal: KagiReversal,
    /// First close seen, before any trend is established
    anchor: Option<(Timestamp, Price)>,
    thickness: Thickness,
    /// Last swing high (top of the last up line that reversed)
    shoulder: Option<Price>,
    /// Last swing low (bottom of the last down line that reversed)
    waist: Option<Price>,
    lines: Vec<KagiLine>,
}

impl KagiGenerator {
    pub fn new(reversal: KagiReversal) -> ConfigResult<Self> {
        match reversal {
            KagiReversal::Points(points) => ConfigError::require_positive("kagi reversal", points)?,
            KagiReversal::Percent(pct) => ConfigError::require_positive("kagi reversal %", pct)?,
        };
        Ok(Self {
            reversal,
            anchor: None,
            thickness: Thickness::Thick,
            shoulder: None,
            waist: None,
            lines: Vec::new(),
        })
    }

    pub fn with_points(points: Price) -> ConfigResult<Self> {
        Self::new(KagiReversal::Points(points))
    }

    /// Current trend, once the first line exists
    pub fn direction(&self) -> Option<Direction> {
        self.lines.last().map(|line| line.direction)
    }

    pub fn thickness(&self) -> Thickness {
        self.thickness
    }

    pub fn shoulder(&self) -> Option<Price> {
        self.shoulder
    }

    pub fn waist(&self) -> Option<Price> {
        self.waist
    }

    /// Move the last line to `to`, splitting it where it breaches the
    /// opposite swing extreme and flipping thickness there.
    fn extend_last(&mut self, to: Price, time: Timestamp) {
        let Some(last) = self.lines.last_mut() else {
            return;
        };
        let direction = last.direction;

        let breach = match (direction, self.thickness) {
            (Direction::Up, Thickness::Thin) => self.shoulder.filter(|&s| to > s),
            (Direction::Down, Thickness::Thick) => self.waist.filter(|&w| to < w),
            _ => None,
        };

        match breach {
            Some(level) => {
                last.set_to(level, time);
                self.thickness = match direction {
                    Direction::Up => Thickness::Thick,
                    Direction::Down => Thickness::Thin,
                };
                tracing::trace!("Kagi thickness -> {:?} at {}", self.thickness, level);
                self.lines
                    .push(KagiLine::new(time, time, level, to, direction, self.thickness));
            }
            None => last.set_to(to, time),
        }
    }
}

impl SeriesGenerator for KagiGenerator {
    type Output = KagiLine;

    fn reset(&mut self) {
        self.anchor = None;
        self.thickness = Thickness::Thick;
        self.shoulder = None;
        self.waist = None;
        self.lines.clear();
    }

    fn update(&mut self, bar: &Bar) -> &[KagiLine] {
        let price = bar.close();
        let time = bar.time();

        let Some(last) = self.lines.last().copied() else {
            match self.anchor {
                None => self.anchor = Some((time, price)),
                Some((anchor_time, anchor)) => {
                    if (price - anchor).abs() >= self.reversal.amount_at(anchor) {
                        let direction = if price > anchor {
                            Direction::Up
                        } else {
                            Direction::Down
                        };
                        self.thickness = match direction {
                            Direction::Up => Thickness::Thick,
                            Direction::Down => Thickness::Thin,
                        };
                        self.lines.push(KagiLine::new(
                            anchor_time,
                            time,
                            anchor,
                            price,
                            direction,
                            self.thickness,
                        ));
                    }
                }
            }
            return &self.lines;
        };

        let extreme = last.to;
        let amount = self.reversal.amount_at(extreme);

        match last.direction {
            Direction::Up if price > extreme => self.extend_last(price, time),
            Direction::Down if price < extreme => self.extend_last(price, time),
            Direction::Up if extreme - price >= amount => {
                self.shoulder = Some(extreme);
                self.lines.push(KagiLine::new(
                    last.end,
                    time,
                    extreme,
                    extreme,
                    Direction::Down,
                    self.thickness,
                ));
                self.extend_last(price, time);
            }
            Direction::Down if price - extreme >= amount => {
                self.waist = Some(extreme);
                self.lines.push(KagiLine::new(
                    last.end,
                    time,
                    extreme,
                    extreme,
                    Direction::Up,
                    self.thickness,
                ));
                self.extend_last(price, time);
            }
            _ => {}
        }

        &self.lines
    }

    fn series(&self) -> &[KagiLine] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use rust_decimal_macros::dec;

    fn closes(prices: &[Price]) -> Vec<Bar> {
        let start = DateTime::from_timestamp_millis(0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Bar::new(start + TimeDelta::minutes(i as i64), p, p, p, p, dec!(1)).unwrap())
            .collect()
    }

    fn summary(lines: &[KagiLine]) -> Vec<(Price, Price, Direction, Thickness)> {
        lines
            .iter()
            .map(|l| (l.from, l.to, l.direction, l.thickness))
            .collect()
    }

    #[test]
    fn test_rejects_non_positive_reversal() {
        assert!(KagiGenerator::with_points(dec!(0)).is_err());
        assert!(KagiGenerator::new(KagiReversal::Percent(dec!(-1))).is_err());
    }

    #[test]
    fn test_no_line_until_reversal_amount() {
        let mut kagi = KagiGenerator::with_points(dec!(5)).unwrap();
        assert!(kagi.generate(&closes(&[dec!(100), dec!(104), dec!(96)])).is_empty());
    }

    #[test]
    fn test_extension_and_reversal() {
        use Direction::*;
        use Thickness::*;

        let mut kagi = KagiGenerator::with_points(dec!(5)).unwrap();
        let lines = kagi
            .generate(&closes(&[dec!(100), dec!(106), dec!(110), dec!(107), dec!(104)]))
            .to_vec();

        // 107 is within the reversal amount of 110, so the up line holds
        assert_eq!(
            summary(&lines),
            vec![
                (dec!(100), dec!(110), Up, Thick),
                (dec!(110), dec!(104), Down, Thick),
            ]
        );
        assert_eq!(kagi.shoulder(), Some(dec!(110)));
    }

    #[test]
    fn test_direction_change_does_not_flip_thickness() {
        use Direction::*;
        use Thickness::*;

        let mut kagi = KagiGenerator::with_points(dec!(5)).unwrap();
        let prices = [
            dec!(100),
            dec!(110),
            dec!(104),
            dec!(109),
            dec!(101),
            dec!(108),
            dec!(112),
        ];
        let lines = kagi.generate(&closes(&prices)).to_vec();

        assert_eq!(
            summary(&lines),
            vec![
                (dec!(100), dec!(110), Up, Thick),
                (dec!(110), dec!(104), Down, Thick),
                (dec!(104), dec!(109), Up, Thick),
                // Falling through the 104 waist turns the line thin
                (dec!(109), dec!(104), Down, Thick),
                (dec!(104), dec!(101), Down, Thin),
                // Reversing up keeps it thin until the 109 shoulder is cleared
                (dec!(101), dec!(109), Up, Thin),
                (dec!(109), dec!(112), Up, Thick),
            ]
        );
    }

    #[test]
    fn test_percent_reversal() {
        let mut kagi = KagiGenerator::new(KagiReversal::Percent(dec!(10))).unwrap();
        let lines = kagi
            .generate(&closes(&[dec!(100), dec!(111), dec!(101), dec!(99)]))
            .to_vec();
        // 10% of 111 is 11.1: 101 does not reverse, 99 does
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].to, dec!(99));
    }
}
