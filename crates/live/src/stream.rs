//! Stream ids and inbound kline messages.

use chrono::DateTime;
use meridian_core::{Bar, Interval, Price, Quantity, Symbol, Timestamp};
use serde::Deserialize;
use url::Url;

use crate::error::{LiveError, LiveResult};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;
const MONTH_MS: i64 = 30 * DAY_MS;

/// Feed-side name of an interval: the largest unit that divides it evenly,
/// lowercase except `M` for months (`"60m"` becomes `"1h"`).
pub fn interval_name(interval: &Interval) -> String {
    let ms = interval.duration_ms();
    let units = [
        (MONTH_MS, "M"),
        (WEEK_MS, "w"),
        (DAY_MS, "d"),
        (HOUR_MS, "h"),
        (MINUTE_MS, "m"),
        (1_000, "s"),
    ];
    units
        .iter()
        .find(|(unit, _)| ms % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", ms / unit, suffix))
        .unwrap_or_else(|| format!("{ms}ms"))
}

/// `<symbol lowercase>@kline_<interval>`
pub fn stream_id(symbol: &str, interval: &Interval) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval_name(interval))
}

/// Combined-stream URL for `streams`, e.g. `.../stream?streams=a@kline_1m/b@kline_1h`
pub fn combined_stream_url(endpoint: &str, streams: &[String]) -> LiveResult<Url> {
    let mut url = Url::parse(endpoint)?;
    url.set_query(Some(&format!("streams={}", streams.join("/"))));
    Ok(url)
}

/// One kline from the feed, routed by stream id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineUpdate {
    pub stream: String,
    pub symbol: Symbol,
    pub bar: Bar,
    /// True once the exchange has closed this kline
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    stream: String,
    data: Event,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum Event {
    #[serde(rename = "kline")]
    Kline {
        #[serde(rename = "k")]
        kline: RawKline,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawKline {
    #[serde(rename = "t")]
    open_time: i64,
    #[serde(rename = "s", default)]
    symbol: Option<String>,
    #[serde(rename = "o")]
    open: Price,
    #[serde(rename = "h")]
    high: Price,
    #[serde(rename = "l")]
    low: Price,
    #[serde(rename = "c")]
    close: Price,
    #[serde(rename = "v")]
    volume: Quantity,
    #[serde(rename = "x", default)]
    closed: bool,
}

/// Parse one text frame. `Ok(None)` for well-formed non-kline events.
pub fn parse_message(text: &str) -> LiveResult<Option<KlineUpdate>> {
    let envelope: Envelope = serde_json::from_str(text)?;
    let Event::Kline { kline } = envelope.data else {
        return Ok(None);
    };

    let time: Timestamp = DateTime::from_timestamp_millis(kline.open_time)
        .ok_or(LiveError::InvalidTimestamp(kline.open_time))?;
    let bar = Bar::new(
        time,
        kline.open,
        kline.high,
        kline.low,
        kline.close,
        kline.volume,
    )?;
    let symbol = kline.symbol.unwrap_or_else(|| {
        envelope
            .stream
            .split('@')
            .next()
            .unwrap_or_default()
            .to_uppercase()
    });

    Ok(Some(KlineUpdate {
        stream: envelope.stream,
        symbol,
        bar,
        closed: kline.closed,
    }))
}
