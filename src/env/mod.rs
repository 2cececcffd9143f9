//! Environment-variable sets: parsing, checks, export, comparison and
//! starter templates.

pub mod compare;
pub mod export;
pub mod templates;
pub mod validate;

pub use compare::{EnvComparison, FieldChange, compare_environments, substitute_variables};
pub use export::{EnvFormat, export_environment};
pub use templates::{EnvTemplate, find_template};
pub use validate::{EnvReport, SecurityIssue, validate_environment};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvDataType {
    #[default]
    String,
    Number,
    Boolean,
    Url,
    Email,
    Json,
    Base64,
}

impl EnvDataType {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvDataType::String => "string",
            EnvDataType::Number => "number",
            EnvDataType::Boolean => "boolean",
            EnvDataType::Url => "url",
            EnvDataType::Email => "email",
            EnvDataType::Json => "json",
            EnvDataType::Base64 => "base64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Regex,
    Length,
    Range,
    Enum,
    Url,
    Email,
    Json,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVariable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub data_type: EnvDataType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl EnvVariable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<EnvVariable>,
}

impl Environment {
    /// Build an environment from `.env` text. Display name defaults to the
    /// name.
    pub fn from_dotenv(name: &str, text: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            display_name: name.to_string(),
            description: None,
            variables: parse_env_file(text)
                .into_iter()
                .map(|(k, v)| EnvVariable::new(k, v))
                .collect(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

/// `KEY=value` lines in file order. Blank lines, `#` comments and lines
/// without `=` are skipped; one pair of matching surrounding quotes is
/// stripped. A repeated key keeps its last value at its first position.
pub fn parse_env_file(text: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = strip_quotes(value.trim()).to_string();
        match out.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => out.push((key.to_string(), value)),
        }
    }
    out
}

fn strip_quotes(v: &str) -> &str {
    for q in ['"', '\''] {
        if v.len() >= 2 && v.starts_with(q) && v.ends_with(q) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_dotenv() {
        let text = "# comment\n\nPORT=8080\nNAME = \"my app\"\nQUOTE='x'\nURL=a=b\nbogus\n=novalue\nPORT=9090\n";
        assert_eq!(
            parse_env_file(text),
            vec![
                ("PORT".to_string(), "9090".to_string()),
                ("NAME".to_string(), "my app".to_string()),
                ("QUOTE".to_string(), "x".to_string()),
                ("URL".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn lone_quote_is_kept() {
        assert_eq!(parse_env_file("A=\""), vec![("A".to_string(), "\"".to_string())]);
    }

    #[test]
    fn environment_from_dotenv() {
        let env = Environment::from_dotenv("dev", "A=1\nB=2");
        assert_eq!(env.display_name(), "dev");
        assert_eq!(env.variables.len(), 2);
        assert_eq!(env.variables[1], EnvVariable::new("B", "2"));
    }

    #[test]
    fn deserializes_camel_case() {
        let v: EnvVariable = serde_json::from_str(
            r#"{ "key": "PORT", "value": "80", "dataType": "number",
                 "validationRules": [ { "type": "range", "min": 1, "max": 65535 } ] }"#,
        )
        .unwrap();
        assert_eq!(v.data_type, EnvDataType::Number);
        assert_eq!(v.validation_rules[0].kind, RuleKind::Range);
        assert_eq!(v.validation_rules[0].max, Some(65535.0));
    }
}
