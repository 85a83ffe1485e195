use std::fmt::{Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One entry in a select or tag option list.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A field's value as the form controller tracks it. Timestamps are epoch
/// milliseconds.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub enum FieldValue {
    #[default]
    Null,
    Text(String),
    Number(Decimal),
    Timestamp(i64),
    List(Vec<SelectOption>),
}

impl FieldValue {
    /// Mirrors the falsiness rules the validation layer applies: null, empty
    /// text, zero numbers and timestamps, and empty lists all count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(value) => value.is_empty(),
            FieldValue::Number(value) => value.is_zero(),
            FieldValue::Timestamp(value) => *value == 0,
            FieldValue::List(values) => values.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            FieldValue::Timestamp(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SelectOption]> {
        match self {
            FieldValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<Vec<SelectOption>> for FieldValue {
    fn from(values: Vec<SelectOption>) -> Self {
        FieldValue::List(values)
    }
}

/// What triggered a value update.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UpdateAction {
    Init,
    Change,
    Submit,
}

impl UpdateAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            UpdateAction::Init => "init",
            UpdateAction::Change => "change",
            UpdateAction::Submit => "submit",
        }
    }
}

impl Display for UpdateAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emptiness_follows_value_kind() {
        assert!(FieldValue::Null.is_empty());
        assert!(FieldValue::from("").is_empty());
        assert!(!FieldValue::from("a").is_empty());
        assert!(FieldValue::Number(Decimal::ZERO).is_empty());
        assert!(!FieldValue::Number(Decimal::ONE).is_empty());
        assert!(FieldValue::Timestamp(0).is_empty());
        assert!(!FieldValue::Timestamp(1_514_764_800_000).is_empty());
        assert!(FieldValue::List(Vec::new()).is_empty());
        assert!(!FieldValue::List(vec![SelectOption::new("A", "a")]).is_empty());
    }

    #[test]
    fn value_round_trips_through_serde() {
        let value = FieldValue::List(vec![SelectOption::new("Alpha", "alpha")]);
        let encoded = serde_json::to_string(&value).expect("value should encode");
        let decoded: FieldValue = serde_json::from_str(&encoded).expect("value should decode");
        assert_eq!(decoded, value);
    }
}
