//! Loading bar history from delimited text.
//!
//! Rows are `time,open,high,low,close,volume`. `time` may be epoch
//! milliseconds, RFC 3339, or `YYYY-MM-DD HH:MM:SS` (UTC). A leading header
//! row is ignored. Rows that cannot be turned into a valid [`Bar`] are
//! skipped with a warning; loading never fails because of a bad row.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use crate::entities::Bar;
use crate::values::Timestamp;

/// Parse all rows from a reader, skipping malformed ones
pub fn parse_bars<R: BufRead>(reader: R) -> Vec<Bar> {
    let mut bars = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Stopping bar import at line {}: {}", line_no, e);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if line_no == 1 && is_header(trimmed) {
            continue;
        }

        match parse_row(trimmed) {
            Ok(bar) => bars.push(bar),
            Err(reason) => tracing::warn!("Skipping line {}: {}", line_no, reason),
        }
    }

    bars
}

/// Read a file of bars. Only I/O failures opening the file are errors.
pub fn load_bars<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<Bar>> {
    let file = std::fs::File::open(path)?;
    Ok(parse_bars(std::io::BufReader::new(file)))
}

/// Parse a time field in any of the accepted formats
pub fn parse_timestamp(field: &str) -> Option<Timestamp> {
    let field = field.trim();
    if let Ok(ms) = field.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(field) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_header(line: &str) -> bool {
    line.split(',')
        .next()
        .is_some_and(|first| parse_timestamp(first).is_none() && first.trim().parse::<f64>().is_err())
}

fn parse_row(line: &str) -> Result<Bar, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(format!("expected 6 fields, found {}", fields.len()));
    }

    let time = parse_timestamp(fields[0]).ok_or_else(|| format!("bad time '{}'", fields[0]))?;
    let number = |i: usize| {
        Decimal::from_str(fields[i])
            .or_else(|_| Decimal::from_scientific(fields[i]))
            .map_err(|_| format!("bad number '{}'", fields[i]))
    };

    Bar::new(time, number(1)?, number(2)?, number(3)?, number(4)?, number(5)?)
        .map_err(|e| e.to_string())
}
