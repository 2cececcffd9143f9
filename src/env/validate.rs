use crate::env::{EnvDataType, EnvVariable, Environment, RuleKind, ValidationRule};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretCategory {
    ApiKey,
    Secret,
    Token,
    Certificate,
    DatabaseUrl,
}

struct SecurityPattern {
    id: &'static str,
    name: &'static str,
    regex: Regex,
    severity: Severity,
    message: &'static str,
    suggestion: &'static str,
    category: SecretCategory,
}

static SECURITY_PATTERNS: LazyLock<Vec<SecurityPattern>> = LazyLock::new(|| {
    let p = |id, name, re: &str, severity, message, suggestion, category| SecurityPattern {
        id,
        name,
        regex: Regex::new(re).expect("valid security pattern"),
        severity,
        message,
        suggestion,
        category,
    };
    vec![
        p(
            "aws-access-key",
            "AWS Access Key",
            r"AKIA[0-9A-Z]{16}",
            Severity::Critical,
            "Potential AWS Access Key detected",
            "Use AWS IAM roles or environment-specific secrets management",
            SecretCategory::ApiKey,
        ),
        p(
            "aws-secret-key",
            "AWS Secret Key",
            r"[0-9a-zA-Z/+]{40}",
            Severity::Critical,
            "Potential AWS Secret Key detected",
            "Use AWS Secrets Manager or environment-specific storage",
            SecretCategory::Secret,
        ),
        p(
            "github-token",
            "GitHub Token",
            r"gh[pousr]_[0-9a-zA-Z]{36}",
            Severity::High,
            "GitHub personal access token detected",
            "Use GitHub secrets or environment-specific token management",
            SecretCategory::Token,
        ),
        p(
            "private-key",
            "Private Key",
            r"-----BEGIN (RSA )?PRIVATE KEY-----",
            Severity::Critical,
            "Private key detected in environment variable",
            "Store private keys in secure key management systems",
            SecretCategory::Certificate,
        ),
        p(
            "jwt-secret",
            "JWT Secret",
            r"^[A-Za-z0-9+/]{32,}={0,2}$",
            Severity::High,
            "Potential JWT secret detected",
            "Use strong, randomly generated secrets stored securely",
            SecretCategory::Secret,
        ),
        p(
            "database-url",
            "Database URL with Credentials",
            r"(mongodb|mysql|postgresql|postgres)://[^:]+:[^@]+@",
            Severity::High,
            "Database connection string with embedded credentials",
            "Use connection strings without embedded passwords",
            SecretCategory::DatabaseUrl,
        ),
        p(
            "api-key-pattern",
            "Generic API Key",
            r"[a-zA-Z0-9]{32,}",
            Severity::Medium,
            "Potential API key pattern detected",
            "Verify if this is sensitive data and store appropriately",
            SecretCategory::ApiKey,
        ),
    ]
});

static KEY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid regex"));
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
static BASE64: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("valid regex"));

/// Substrings of a key name that suggest the value is a secret.
const SENSITIVE_KEY_PARTS: &[&str] = &[
    "password",
    "secret",
    "key",
    "token",
    "auth",
    "private",
    "credential",
    "api_key",
    "jwt",
    "session",
    "cookie",
    "oauth",
    "client_secret",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvError {
    pub field: String,
    pub message: String,
    pub rule: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvWarning {
    pub field: String,
    pub message: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityIssue {
    pub field: String,
    pub pattern_id: &'static str,
    pub pattern: &'static str,
    pub severity: Severity,
    pub message: &'static str,
    pub suggestion: &'static str,
    pub category: SecretCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvReport {
    pub valid: bool,
    pub errors: Vec<EnvError>,
    pub warnings: Vec<EnvWarning>,
    pub security_issues: Vec<SecurityIssue>,
    pub suggestions: Vec<String>,
}

pub fn validate_environment(env: &Environment) -> EnvReport {
    let mut r = EnvReport::default();
    let mut naming_warnings = false;

    for (i, var) in env.variables.iter().enumerate() {
        if var.required && var.value.trim().is_empty() {
            r.errors
                .push(error(&var.key, "Required variable cannot be empty", "required"));
        }

        if !KEY_NAME.is_match(&var.key) {
            naming_warnings = true;
            r.warnings.push(EnvWarning {
                field: var.key.clone(),
                message: "Variable name should follow UPPER_SNAKE_CASE convention".to_string(),
                suggestion: "Use only uppercase letters, numbers, and underscores".to_string(),
            });
        }

        let duplicate = env
            .variables
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && other.key.eq_ignore_ascii_case(&var.key));
        if duplicate {
            r.errors
                .push(error(&var.key, "Duplicate variable name detected", "unique"));
        }

        if let Some(message) = check_data_type(&var.value, var.data_type) {
            r.errors.push(error(&var.key, message, "dataType"));
        }

        for rule in &var.validation_rules {
            check_rule(var, rule, &mut r.errors);
        }

        for p in SECURITY_PATTERNS.iter() {
            if p.regex.is_match(&var.value) {
                r.security_issues.push(SecurityIssue {
                    field: var.key.clone(),
                    pattern_id: p.id,
                    pattern: p.name,
                    severity: p.severity,
                    message: p.message,
                    suggestion: p.suggestion,
                    category: p.category,
                });
            }
        }

        if !var.sensitive && is_sensitive_key(&var.key) {
            r.warnings.push(EnvWarning {
                field: var.key.clone(),
                message: "Variable appears to contain sensitive data but is not marked as sensitive"
                    .to_string(),
                suggestion: "Mark this variable as sensitive to enable proper masking".to_string(),
            });
        }
    }

    if env.variables.is_empty() {
        r.warnings.push(EnvWarning {
            field: "environment".to_string(),
            message: "Environment has no variables defined".to_string(),
            suggestion: "Add variables or consider removing this environment".to_string(),
        });
    }

    if !r.security_issues.is_empty() {
        r.suggestions
            .push("Consider using a secrets management service for sensitive data".to_string());
    }
    if naming_warnings {
        r.suggestions
            .push("Follow consistent naming conventions for better maintainability".to_string());
    }

    debug!(
        environment = %env.name,
        errors = r.errors.len(),
        warnings = r.warnings.len(),
        security = r.security_issues.len(),
        "validated environment"
    );
    r.valid = r.errors.is_empty();
    r
}

fn error(field: &str, message: impl Into<String>, rule: &'static str) -> EnvError {
    EnvError {
        field: field.to_string(),
        message: message.into(),
        rule,
    }
}

/// Error message for a value that is not of `ty`. Empty values pass.
fn check_data_type(value: &str, ty: EnvDataType) -> Option<&'static str> {
    if value.is_empty() {
        return None;
    }
    let ok = match ty {
        EnvDataType::String => true,
        EnvDataType::Number => parse_number(value).is_some(),
        EnvDataType::Boolean => ["true", "false", "1", "0", "yes", "no"]
            .contains(&value.to_ascii_lowercase().as_str()),
        EnvDataType::Url => url::Url::parse(value).is_ok(),
        EnvDataType::Email => EMAIL.is_match(value),
        EnvDataType::Json => serde_json::from_str::<serde_json::Value>(value).is_ok(),
        EnvDataType::Base64 => BASE64.is_match(value),
    };
    if ok {
        return None;
    }
    Some(match ty {
        EnvDataType::Number => "Value must be a valid number",
        EnvDataType::Boolean => "Value must be a valid boolean (true/false, 1/0, yes/no)",
        EnvDataType::Url => "Value must be a valid URL",
        EnvDataType::Email => "Value must be a valid email address",
        EnvDataType::Json => "Value must be valid JSON",
        EnvDataType::Base64 => "Value must be valid base64",
        EnvDataType::String => "Value must be a string",
    })
}

fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn check_rule(var: &EnvVariable, rule: &ValidationRule, errors: &mut Vec<EnvError>) {
    let value = var.value.as_str();
    match rule.kind {
        RuleKind::Regex => {
            let Some(pattern) = rule.pattern.as_deref().filter(|p| !p.is_empty()) else {
                return;
            };
            match Regex::new(pattern) {
                Ok(re) if re.is_match(value) => {}
                Ok(_) => errors.push(error(
                    &var.key,
                    rule.error_message
                        .clone()
                        .unwrap_or_else(|| "Value does not match required pattern".to_string()),
                    "regex",
                )),
                Err(e) => errors.push(error(
                    &var.key,
                    format!("Validation pattern is invalid: {}", e),
                    "regex",
                )),
            }
        }
        RuleKind::Length => {
            let len = value.chars().count();
            if let Some(min) = rule.min_length.filter(|m| *m > 0 && len < *m) {
                errors.push(error(
                    &var.key,
                    format!("Value must be at least {} characters long", min),
                    "minLength",
                ));
            }
            if let Some(max) = rule.max_length.filter(|m| *m > 0 && len > *m) {
                errors.push(error(
                    &var.key,
                    format!("Value must be no more than {} characters long", max),
                    "maxLength",
                ));
            }
        }
        RuleKind::Range => {
            let Some(n) = parse_number(value) else {
                return;
            };
            if let Some(min) = rule.min.filter(|m| n < *m) {
                errors.push(error(&var.key, format!("Value must be at least {}", min), "min"));
            }
            if let Some(max) = rule.max.filter(|m| n > *m) {
                errors.push(error(
                    &var.key,
                    format!("Value must be no more than {}", max),
                    "max",
                ));
            }
        }
        RuleKind::Enum => {
            if let Some(allowed) = &rule.allowed_values {
                if !allowed.iter().any(|a| a == value) {
                    errors.push(error(
                        &var.key,
                        format!("Value must be one of: {}", allowed.join(", ")),
                        "enum",
                    ));
                }
            }
        }
        RuleKind::Url | RuleKind::Email | RuleKind::Json => {
            let ty = match rule.kind {
                RuleKind::Url => EnvDataType::Url,
                RuleKind::Email => EnvDataType::Email,
                _ => EnvDataType::Json,
            };
            if let Some(message) = check_data_type(value, ty) {
                let message = rule.error_message.clone().unwrap_or_else(|| message.to_string());
                errors.push(error(&var.key, message, ty.as_str()));
            }
        }
        RuleKind::Custom => debug!(key = %var.key, "custom validation rules are not evaluated"),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|p| key.contains(p))
}
