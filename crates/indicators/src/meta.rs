//! What an indicator declares about itself: name, placement and parameters,
//! plus the settings map validated against those parameters.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{IndicatorError, IndicatorResult};

/// Where the indicator is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// On top of the price chart
    Overlay,
    /// In its own pane below the chart
    Pane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Decimal,
    Choice,
    Boolean,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Integer(i64),
    Decimal(Decimal),
    Choice(String),
    Boolean(bool),
    /// `#RRGGBB` or `#RRGGBBAA`
    Color(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Integer(_) => ParamKind::Integer,
            ParamValue::Decimal(_) => ParamKind::Decimal,
            ParamValue::Choice(_) => ParamKind::Choice,
            ParamValue::Boolean(_) => ParamKind::Boolean,
            ParamValue::Color(_) => ParamKind::Color,
        }
    }
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub key: String,
    pub kind: ParamKind,
    pub default: ParamValue,
    /// Allowed values, only for [`ParamKind::Choice`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl ParamSpec {
    pub fn integer(key: &str, default: i64) -> Self {
        Self::new(key, ParamValue::Integer(default))
    }

    pub fn decimal(key: &str, default: Decimal) -> Self {
        Self::new(key, ParamValue::Decimal(default))
    }

    pub fn boolean(key: &str, default: bool) -> Self {
        Self::new(key, ParamValue::Boolean(default))
    }

    pub fn color(key: &str, default: &str) -> Self {
        Self::new(key, ParamValue::Color(default.to_string()))
    }

    pub fn choice(key: &str, default: &str, choices: &[&str]) -> Self {
        Self {
            choices: choices.iter().map(|c| c.to_string()).collect(),
            ..Self::new(key, ParamValue::Choice(default.to_string()))
        }
    }

    fn new(key: &str, default: ParamValue) -> Self {
        Self {
            key: key.to_string(),
            kind: default.kind(),
            default,
            choices: Vec::new(),
        }
    }

    /// Check that `value` fits this parameter
    pub fn check(&self, value: &ParamValue) -> IndicatorResult<()> {
        if value.kind() != self.kind {
            return Err(IndicatorError::WrongKind {
                key: self.key.clone(),
                expected: self.kind,
            });
        }
        let invalid = |reason: String| IndicatorError::InvalidParameter {
            key: self.key.clone(),
            reason,
        };
        match value {
            ParamValue::Choice(choice) if !self.choices.contains(choice) => {
                Err(invalid(format!("'{choice}' is not one of {:?}", self.choices)))
            }
            ParamValue::Color(color) if !is_hex_color(color) => {
                Err(invalid(format!("'{color}' is not a #RRGGBB color")))
            }
            _ => Ok(()),
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Static description of a calculation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorMeta {
    pub name: String,
    pub placement: Placement,
    pub params: Vec<ParamSpec>,
    /// Bars needed before the first visible bar
    #[serde(default)]
    pub lookback: usize,
}

impl IndicatorMeta {
    pub fn new(name: &str, placement: Placement) -> Self {
        Self {
            name: name.to_string(),
            placement,
            params: Vec::new(),
            lookback: 0,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn lookback(mut self, bars: usize) -> Self {
        self.lookback = bars;
        self
    }

    pub fn spec(&self, key: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.key == key)
    }

    pub fn default_settings(&self) -> Settings {
        self.params
            .iter()
            .map(|p| (p.key.clone(), p.default.clone()))
            .collect()
    }

    /// Validate every entry of `settings` against the declared parameters
    pub fn validate(&self, settings: &Settings) -> IndicatorResult<()> {
        for (key, value) in settings.iter() {
            let spec = self
                .spec(key)
                .ok_or_else(|| IndicatorError::UnknownParameter {
                    indicator: self.name.clone(),
                    key: key.to_string(),
                })?;
            spec.check(value)?;
        }
        Ok(())
    }

    /// Carry `previous` settings over to these parameters.
    ///
    /// Values for keys that still exist and still validate are kept, new
    /// keys get their defaults and removed keys are dropped.
    pub fn reconcile(&self, previous: &Settings) -> Settings {
        self.params
            .iter()
            .map(|spec| {
                let value = previous
                    .get(&spec.key)
                    .filter(|value| spec.check(value).is_ok())
                    .cloned()
                    .unwrap_or_else(|| spec.default.clone());
                (spec.key.clone(), value)
            })
            .collect()
    }
}

/// Current parameter values of one instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, ParamValue>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: ParamValue) -> Self {
        self.0.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overwrite entries with those of `changes`
    pub fn merge(&mut self, changes: &Settings) {
        for (key, value) in changes.iter() {
            self.0.insert(key.to_string(), value.clone());
        }
    }

    fn value(&self, key: &str) -> IndicatorResult<&ParamValue> {
        self.0
            .get(key)
            .ok_or_else(|| IndicatorError::MissingParameter(key.to_string()))
    }

    pub fn integer(&self, key: &str) -> IndicatorResult<i64> {
        match self.value(key)? {
            ParamValue::Integer(v) => Ok(*v),
            _ => Err(wrong_kind(key, ParamKind::Integer)),
        }
    }

    /// Integer parameter that must be at least one, as a count of bars
    pub fn period(&self, key: &str) -> IndicatorResult<usize> {
        let value = self.integer(key)?;
        usize::try_from(value)
            .ok()
            .filter(|&v| v >= 1)
            .ok_or_else(|| IndicatorError::InvalidParameter {
                key: key.to_string(),
                reason: format!("period must be at least 1, got {value}"),
            })
    }

    pub fn decimal(&self, key: &str) -> IndicatorResult<Decimal> {
        match self.value(key)? {
            ParamValue::Decimal(v) => Ok(*v),
            _ => Err(wrong_kind(key, ParamKind::Decimal)),
        }
    }

    pub fn choice(&self, key: &str) -> IndicatorResult<&str> {
        match self.value(key)? {
            ParamValue::Choice(v) => Ok(v),
            _ => Err(wrong_kind(key, ParamKind::Choice)),
        }
    }

    pub fn boolean(&self, key: &str) -> IndicatorResult<bool> {
        match self.value(key)? {
            ParamValue::Boolean(v) => Ok(*v),
            _ => Err(wrong_kind(key, ParamKind::Boolean)),
        }
    }

    pub fn color(&self, key: &str) -> IndicatorResult<&str> {
        match self.value(key)? {
            ParamValue::Color(v) => Ok(v),
            _ => Err(wrong_kind(key, ParamKind::Color)),
        }
    }
}

impl FromIterator<(String, ParamValue)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn wrong_kind(key: &str, expected: ParamKind) -> IndicatorError {
    IndicatorError::WrongKind {
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn meta() -> IndicatorMeta {
        IndicatorMeta::new("demo", Placement::Overlay)
            .param(ParamSpec::integer("period", 20))
            .param(ParamSpec::choice("kind", "sma", &["sma", "ema"]))
            .param(ParamSpec::color("color", "#2962FF"))
    }

    #[test]
    fn test_default_settings() {
        let settings = meta().default_settings();
        assert_eq!(settings.integer("period"), Ok(20));
        assert_eq!(settings.choice("kind"), Ok("sma"));
    }

    #[test]
    fn test_validate_rejects_unknown_and_mistyped() {
        let meta = meta();
        let unknown = Settings::new().with("length", ParamValue::Integer(3));
        assert!(matches!(
            meta.validate(&unknown),
            Err(IndicatorError::UnknownParameter { .. })
        ));

        let mistyped = Settings::new().with("period", ParamValue::Decimal(dec!(3)));
        assert!(matches!(
            meta.validate(&mistyped),
            Err(IndicatorError::WrongKind { .. })
        ));

        let bad_choice = Settings::new().with("kind", ParamValue::Choice("wma".into()));
        assert!(meta.validate(&bad_choice).is_err());

        let bad_color = Settings::new().with("color", ParamValue::Color("blue".into()));
        assert!(meta.validate(&bad_color).is_err());
    }

    #[test]
    fn test_reconcile_keeps_valid_values() {
        let previous = meta()
            .default_settings()
            .with("period", ParamValue::Integer(50))
            .with("kind", ParamValue::Choice("ema".into()));

        // New version drops "color", restricts "kind" and adds "offset"
        let next = IndicatorMeta::new("demo", Placement::Overlay)
            .param(ParamSpec::integer("period", 20))
            .param(ParamSpec::choice("kind", "sma", &["sma"]))
            .param(ParamSpec::integer("offset", 0));

        let settings = next.reconcile(&previous);
        assert_eq!(settings.integer("period"), Ok(50));
        assert_eq!(settings.choice("kind"), Ok("sma"));
        assert_eq!(settings.integer("offset"), Ok(0));
        assert!(settings.get("color").is_none());
    }

    #[test]
    fn test_period_must_be_positive() {
        let settings = Settings::new().with("period", ParamValue::Integer(0));
        assert!(settings.period("period").is_err());
    }

    #[test]
    fn test_settings_json_shape() {
        let settings = Settings::new().with("period", ParamValue::Integer(14));
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"period":{"kind":"integer","value":14}}"#);
    }
}
