//! Declarative description of the fields an installer must fill in before
//! authorization can begin (a tenant subdomain, a region, ...).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuthEngineError, Result};

/// One option of a `select` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// A single form field. Serialized as a tagged union on `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormField {
    /// Single-line text.
    Text {
        label: String,
        key: String,
        #[serde(rename = "isRequired", default, skip_serializing_if = "Option::is_none")]
        is_required: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    /// Secret text, masked by the host.
    Password {
        label: String,
        key: String,
        #[serde(rename = "isRequired", default, skip_serializing_if = "Option::is_none")]
        is_required: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    /// Single choice from a fixed list.
    Select {
        label: String,
        key: String,
        #[serde(rename = "isRequired", default, skip_serializing_if = "Option::is_none")]
        is_required: Option<bool>,
        options: Vec<SelectOption>,
    },
}

impl FormField {
    /// A required single-line text field.
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Text {
            label: label.into(),
            key: key.into(),
            is_required: Some(true),
            placeholder: None,
        }
    }

    /// A required secret field.
    pub fn password(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Password {
            label: label.into(),
            key: key.into(),
            is_required: Some(true),
            placeholder: None,
        }
    }

    /// A required select field over `(label, value)` pairs.
    pub fn select<L, V>(
        key: impl Into<String>,
        label: impl Into<String>,
        options: impl IntoIterator<Item = (L, V)>,
    ) -> Self
    where
        L: Into<String>,
        V: Into<String>,
    {
        Self::Select {
            label: label.into(),
            key: key.into(),
            is_required: Some(true),
            options: options
                .into_iter()
                .map(|(label, value)| SelectOption {
                    label: label.into(),
                    value: value.into(),
                })
                .collect(),
        }
    }

    /// Mark the field optional.
    pub fn optional(mut self) -> Self {
        match &mut self {
            Self::Text { is_required, .. }
            | Self::Password { is_required, .. }
            | Self::Select { is_required, .. } => *is_required = Some(false),
        }
        self
    }

    /// Set the placeholder on a text or password field. No-op for selects.
    pub fn with_placeholder(mut self, text: impl Into<String>) -> Self {
        if let Self::Text { placeholder, .. } | Self::Password { placeholder, .. } = &mut self {
            *placeholder = Some(text.into());
        }
        self
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Text { key, .. } | Self::Password { key, .. } | Self::Select { key, .. } => key,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            Self::Text { is_required, .. }
            | Self::Password { is_required, .. }
            | Self::Select { is_required, .. } => is_required.unwrap_or(false),
        }
    }
}

/// The full set of fields an integration asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDescriptor {
    pub fields: Vec<FormField>,
}

impl FormDescriptor {
    pub fn new(fields: Vec<FormField>) -> Self {
        Self { fields }
    }

    /// Check submitted values against the descriptor.
    ///
    /// Required fields must be present and non-blank; select values must be
    /// one of the declared options.
    ///
    /// # Errors
    ///
    /// [`AuthEngineError::MissingField`] for an absent required field,
    /// [`AuthEngineError::InvalidConfig`] for an unknown select value.
    pub fn validate(&self, values: &HashMap<String, String>) -> Result<()> {
        for field in &self.fields {
            let value = values.get(field.key()).map(|v| v.trim()).unwrap_or("");
            if value.is_empty() {
                if field.is_required() {
                    return Err(AuthEngineError::MissingField {
                        key: field.key().to_string(),
                    });
                }
                continue;
            }

            if let FormField::Select { key, options, .. } = field
                && !options.iter().any(|o| o.value == value)
            {
                return Err(AuthEngineError::InvalidConfig {
                    reason: format!("`{value}` is not a valid choice for `{key}`"),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> FormDescriptor {
        FormDescriptor::new(vec![
            FormField::text("subdomain", "Subdomain").with_placeholder("acme"),
            FormField::password("api_secret", "Signing secret").optional(),
            FormField::select("region", "Region", [("United States", "us"), ("Europe", "eu")]),
        ])
    }

    #[test]
    fn serializes_as_tagged_union() {
        let json = serde_json::to_value(descriptor()).unwrap();
        assert_eq!(
            json,
            json!({
                "fields": [
                    {"type": "text", "label": "Subdomain", "key": "subdomain",
                     "isRequired": true, "placeholder": "acme"},
                    {"type": "password", "label": "Signing secret", "key": "api_secret",
                     "isRequired": false},
                    {"type": "select", "label": "Region", "key": "region", "isRequired": true,
                     "options": [
                        {"label": "United States", "value": "us"},
                        {"label": "Europe", "value": "eu"}
                     ]}
                ]
            })
        );
    }

    #[test]
    fn deserializes_host_supplied_descriptor() {
        let json = r#"{"fields":[{"type":"text","label":"Site","key":"site"}]}"#;
        let form: FormDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(form.fields[0].key(), "site");
        assert!(!form.fields[0].is_required());
    }

    #[test]
    fn validate_accepts_complete_values() {
        let values = HashMap::from([
            ("subdomain".to_string(), "acme".to_string()),
            ("region".to_string(), "eu".to_string()),
        ]);
        descriptor().validate(&values).unwrap();
    }

    #[test]
    fn validate_rejects_missing_required() {
        let values = HashMap::from([("region".to_string(), "eu".to_string())]);
        let err = descriptor().validate(&values).unwrap_err();
        assert!(matches!(err, AuthEngineError::MissingField { key } if key == "subdomain"));
    }

    #[test]
    fn validate_rejects_unknown_option() {
        let values = HashMap::from([
            ("subdomain".to_string(), "acme".to_string()),
            ("region".to_string(), "mars".to_string()),
        ]);
        let err = descriptor().validate(&values).unwrap_err();
        assert!(err.to_string().contains("mars"));
    }
}
