//! Option flow event types.
//!
//! `FlowEvent` is the record produced by the flow driver, retained in the
//! event store, and pushed to WebSocket subscribers. Field names match the
//! wire payload exactly (snake_case JSON).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::FlowError;

/// Upper bound of the conviction score scale.
pub const MAX_CONVICTION_SCORE: u8 = 100;

/// Default score at or above which an event is pushed to subscribers.
pub const DEFAULT_BROADCAST_THRESHOLD: u8 = 60;

/// Kind of option contract traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Market sentiment conventionally implied by this side of the trade.
    pub fn sentiment(&self) -> &'static str {
        match self {
            OptionType::Call => "bullish",
            OptionType::Put => "bearish",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionType::Call => write!(f, "CALL"),
            OptionType::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CALL" => Ok(OptionType::Call),
            "PUT" => Ok(OptionType::Put),
            other => Err(format!("invalid option type: '{other}'")),
        }
    }
}

/// One detected unusual options-trading event.
///
/// Immutable once created. The store and the broadcast hub share events
/// behind `Arc`, so nothing downstream ever mutates a stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEvent {
    /// Unique token (a random UUID for generated events, free-form for
    /// inbound ones).
    pub id: String,
    /// Creation time, serialized as RFC 3339. Inbound timestamps without an
    /// offset are read as UTC.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Underlying instrument symbol (e.g. "NVDA").
    pub ticker: String,
    pub option_type: OptionType,
    pub strike: f64,
    /// Contract expiry, serialized as "YYYY-MM-DD".
    pub expiry: NaiveDate,
    /// Total premium paid for the print, in dollars.
    pub premium_spent: f64,
    /// Contracts traded.
    pub volume: u64,
    pub open_interest: u64,
    /// Order was swept across multiple venues.
    pub is_sweep: bool,
    /// Order was negotiated as a single block.
    #[serde(default)]
    pub is_block: bool,
    /// Confidence/significance measure on a 0-100 scale.
    pub conviction_score: u8,
    /// Ordered human-readable reasons the event was flagged.
    pub why_unusual: Vec<String>,
}

impl FlowEvent {
    /// Check the field constraints that serde alone cannot express.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.ticker.trim().is_empty() {
            return Err(FlowError::invalid("ticker", "must not be empty"));
        }
        if self.conviction_score > MAX_CONVICTION_SCORE {
            return Err(FlowError::invalid(
                "conviction_score",
                format!("must be between 0 and {MAX_CONVICTION_SCORE}"),
            ));
        }
        if !self.strike.is_finite() || self.strike <= 0.0 {
            return Err(FlowError::invalid("strike", "must be a positive number"));
        }
        if !self.premium_spent.is_finite() || self.premium_spent < 0.0 {
            return Err(FlowError::invalid(
                "premium_spent",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }

    /// Whether this event qualifies for push delivery at the given threshold.
    pub fn is_significant(&self, threshold: u8) -> bool {
        self.conviction_score >= threshold
    }

    /// Parse and validate an inbound JSON record.
    pub fn from_json(raw: &str) -> Result<Self, FlowError> {
        let event: FlowEvent = serde_json::from_str(raw)?;
        event.validate()?;
        Ok(event)
    }
}

/// Parse an ISO-8601 timestamp, treating a missing offset as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(err) => raw
            .parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(|_| err),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event() -> FlowEvent {
        FlowEvent {
            id: "evt-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap(),
            ticker: "NVDA".to_string(),
            option_type: OptionType::Call,
            strike: 512.5,
            expiry: NaiveDate::from_ymd_opt(2026, 3, 20).unwrap(),
            premium_spent: 1_842.25,
            volume: 4_200,
            open_interest: 12_000,
            is_sweep: true,
            is_block: false,
            conviction_score: 72,
            why_unusual: vec![
                "Unusual volume spike".to_string(),
                "High conviction CALL activity detected".to_string(),
            ],
        }
    }

    #[test]
    fn test_option_type_display_and_parse() {
        assert_eq!(OptionType::Call.to_string(), "CALL");
        assert_eq!(OptionType::Put.to_string(), "PUT");
        assert_eq!("put".parse::<OptionType>().unwrap(), OptionType::Put);
        assert!("straddle".parse::<OptionType>().is_err());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(sample_event()).unwrap();
        assert_eq!(json["option_type"], "CALL");
        assert_eq!(json["expiry"], "2026-03-20");
        assert_eq!(json["timestamp"], "2026-03-02T14:30:00Z");
        assert_eq!(json["conviction_score"], 72);
        assert_eq!(json["is_block"], false);
        assert_eq!(json["why_unusual"][1], "High conviction CALL activity detected");
    }

    #[test]
    fn test_is_block_defaults_to_false() {
        let mut json = serde_json::to_value(sample_event()).unwrap();
        json.as_object_mut().unwrap().remove("is_block");
        let parsed: FlowEvent = serde_json::from_value(json).unwrap();
        assert!(!parsed.is_block);
    }

    #[test]
    fn test_from_json_accepts_valid_record() {
        let raw = serde_json::to_string(&sample_event()).unwrap();
        let parsed = FlowEvent::from_json(&raw).unwrap();
        assert_eq!(parsed, sample_event());
    }

    #[test]
    fn test_from_json_accepts_timestamp_without_offset() {
        let mut json = serde_json::to_value(sample_event()).unwrap();
        json["timestamp"] = serde_json::json!("2026-02-10T15:04:05.123456");

        let parsed = FlowEvent::from_json(&json.to_string()).unwrap();

        let expected = NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_micro_opt(15, 4, 5, 123_456)
            .unwrap()
            .and_utc();
        assert_eq!(parsed.timestamp, expected);

        // Output stays RFC 3339.
        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(out["timestamp"], "2026-02-10T15:04:05.123456Z");
    }

    #[test]
    fn test_parse_timestamp_honours_offsets() {
        let ts = parse_timestamp("2026-02-10T10:04:05-05:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 2, 10, 15, 4, 5).unwrap());

        assert!(parse_timestamp("2026-02-10").is_err());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_from_json_rejects_unparseable_timestamp() {
        let mut json = serde_json::to_value(sample_event()).unwrap();
        json["timestamp"] = serde_json::json!("not a time");

        let err = FlowEvent::from_json(&json.to_string()).unwrap_err();
        assert!(matches!(err, FlowError::Malformed(_)));
        assert!(!err.is_syntax());
    }

    #[test]
    fn test_from_json_rejects_malformed_json() {
        let err = FlowEvent::from_json("{not json").unwrap_err();
        assert!(matches!(err, FlowError::Malformed(_)));
    }

    #[test]
    fn test_validate_rejects_out_of_range_score() {
        let mut event = sample_event();
        event.conviction_score = 101;
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("conviction_score"));
    }

    #[test]
    fn test_validate_rejects_blank_ticker_and_bad_strike() {
        let mut event = sample_event();
        event.ticker = "  ".to_string();
        assert!(event.validate().is_err());

        let mut event = sample_event();
        event.strike = 0.0;
        assert!(event.validate().is_err());

        let mut event = sample_event();
        event.premium_spent = f64::NAN;
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_is_significant_boundary() {
        let mut event = sample_event();
        event.conviction_score = 59;
        assert!(!event.is_significant(DEFAULT_BROADCAST_THRESHOLD));
        event.conviction_score = 60;
        assert!(event.is_significant(DEFAULT_BROADCAST_THRESHOLD));
    }

    #[test]
    fn test_sentiment() {
        assert_eq!(OptionType::Call.sentiment(), "bullish");
        assert_eq!(OptionType::Put.sentiment(), "bearish");
    }
}
