use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{FieldValue, UpdateAction};

/// Symbolic rule tags a field declares at registration. Only `Required` has
/// evaluation semantics today; the rest are extension points that report no
/// error until a host supplies one through the validate hook.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationRule {
    Required,
    Email,
    Url,
    Text,
    DateTime,
    Numeric,
}

impl ValidationRule {
    pub const fn as_str(self) -> &'static str {
        match self {
            ValidationRule::Required => "required",
            ValidationRule::Email => "email",
            ValidationRule::Url => "url",
            ValidationRule::Text => "text",
            ValidationRule::DateTime => "dateTime",
            ValidationRule::Numeric => "numeric",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "required" => Some(ValidationRule::Required),
            "email" => Some(ValidationRule::Email),
            "url" => Some(ValidationRule::Url),
            "text" => Some(ValidationRule::Text),
            "dateTime" => Some(ValidationRule::DateTime),
            "numeric" => Some(ValidationRule::Numeric),
            _ => None,
        }
    }
}

/// A validation failure as data. Never raised as an error; collected in the
/// form's error map and surfaced next to the offending field.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ValidationError {
    pub rule: ValidationRule,
    pub message: String,
    pub action: UpdateAction,
}

impl ValidationError {
    pub fn new(rule: ValidationRule, message: impl Into<String>, action: UpdateAction) -> Self {
        Self {
            rule,
            message: message.into(),
            action,
        }
    }

    pub fn required(name: &str, action: UpdateAction) -> Self {
        Self::new(
            ValidationRule::Required,
            format!("{} is required.", capitalize(name)),
            action,
        )
    }
}

/// Read-only view of one registration handed to the external validate hook.
#[derive(Clone, Debug)]
pub struct FieldSnapshot {
    pub name: String,
    pub rules: Vec<ValidationRule>,
    pub value: FieldValue,
    pub is_updated: bool,
}

/// Host-supplied validation pass. Receives every registration and returns
/// extra errors per field name, concatenated after the rule-based ones.
pub type ValidateHook =
    dyn Fn(&BTreeMap<String, FieldSnapshot>) -> BTreeMap<String, Vec<ValidationError>>
        + Send
        + Sync;

/// Required-ness is enforced reactively once the user has edited the field;
/// submission forces full evaluation regardless of edit history.
pub(crate) fn evaluate(
    name: &str,
    rules: &[ValidationRule],
    value: &FieldValue,
    is_updated: bool,
    action: UpdateAction,
) -> Vec<ValidationError> {
    rules
        .iter()
        .filter_map(|rule| match rule {
            ValidationRule::Required => {
                let enforce = is_updated || action == UpdateAction::Submit;
                (value.is_empty() && enforce).then(|| ValidationError::required(name, action))
            }
            _ => None,
        })
        .collect()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_waits_for_user_edit_on_change() {
        let errors = evaluate(
            "email",
            &[ValidationRule::Required],
            &FieldValue::Null,
            false,
            UpdateAction::Change,
        );
        assert!(errors.is_empty());

        let errors = evaluate(
            "email",
            &[ValidationRule::Required],
            &FieldValue::Null,
            true,
            UpdateAction::Change,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Email is required.");
    }

    #[test]
    fn submit_forces_required_evaluation_for_untouched_fields() {
        let errors = evaluate(
            "email",
            &[ValidationRule::Required],
            &FieldValue::from(""),
            false,
            UpdateAction::Submit,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule, ValidationRule::Required);
    }

    #[test]
    fn declared_extension_rules_report_nothing() {
        let errors = evaluate(
            "homepage",
            &[
                ValidationRule::Email,
                ValidationRule::Url,
                ValidationRule::DateTime,
            ],
            &FieldValue::Null,
            true,
            UpdateAction::Change,
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn rule_names_round_trip() {
        for rule in [
            ValidationRule::Required,
            ValidationRule::Email,
            ValidationRule::Url,
            ValidationRule::Text,
            ValidationRule::DateTime,
            ValidationRule::Numeric,
        ] {
            assert_eq!(ValidationRule::from_name(rule.as_str()), Some(rule));
        }
        assert_eq!(ValidationRule::from_name("unknown"), None);
    }
}
