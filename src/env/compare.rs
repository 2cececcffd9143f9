use crate::env::{EnvVariable, Environment};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

static BRACED_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid regex"));
static BARE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z_][A-Z0-9_]*)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub key: String,
    pub field: &'static str,
    pub old_value: String,
    pub new_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvComparison {
    pub environment1: String,
    pub environment2: String,
    pub added: Vec<EnvVariable>,
    pub removed: Vec<EnvVariable>,
    /// One entry per changed field.
    pub modified: Vec<FieldChange>,
    pub unchanged: Vec<EnvVariable>,
}

/// Diff `b` against `a` by key. Keys are visited in `a`'s order, then the
/// keys only `b` has.
pub fn compare_environments(a: &Environment, b: &Environment) -> EnvComparison {
    let left: HashMap<&str, &EnvVariable> = a.variables.iter().map(|v| (v.key.as_str(), v)).collect();
    let right: HashMap<&str, &EnvVariable> = b.variables.iter().map(|v| (v.key.as_str(), v)).collect();

    let mut keys: Vec<&str> = Vec::new();
    for v in a.variables.iter().chain(&b.variables) {
        if !keys.contains(&v.key.as_str()) {
            keys.push(v.key.as_str());
        }
    }

    let mut out = EnvComparison {
        environment1: a.name.clone(),
        environment2: b.name.clone(),
        added: Vec::new(),
        removed: Vec::new(),
        modified: Vec::new(),
        unchanged: Vec::new(),
    };

    for key in keys {
        match (left.get(key), right.get(key)) {
            (None, Some(new)) => out.added.push((*new).clone()),
            (Some(old), None) => out.removed.push((*old).clone()),
            (Some(old), Some(new)) => {
                let changes = field_changes(old, new);
                if changes.is_empty() {
                    out.unchanged.push((*new).clone());
                } else {
                    out.modified.extend(changes);
                }
            }
            (None, None) => {}
        }
    }
    out
}

fn field_changes(old: &EnvVariable, new: &EnvVariable) -> Vec<FieldChange> {
    let opt = |s: &Option<String>| s.clone().unwrap_or_default();
    let pairs = [
        ("value", old.value.clone(), new.value.clone()),
        ("description", opt(&old.description), opt(&new.description)),
        ("category", opt(&old.category), opt(&new.category)),
        (
            "dataType",
            old.data_type.as_str().to_string(),
            new.data_type.as_str().to_string(),
        ),
    ];
    pairs
        .into_iter()
        .filter(|(_, o, n)| o != n)
        .map(|(field, old_value, new_value)| FieldChange {
            key: new.key.clone(),
            field,
            old_value,
            new_value,
        })
        .collect()
}

/// `KEY=value` preview with `${VAR}` then `$VAR` references expanded from
/// the raw values. Unknown references stay as written; expansion is one
/// level deep.
pub fn substitute_variables(vars: &[EnvVariable]) -> String {
    let values: HashMap<&str, &str> = vars
        .iter()
        .map(|v| (v.key.as_str(), v.value.as_str()))
        .collect();
    let expand = |caps: &Captures| -> String {
        values
            .get(&caps[1])
            .map(|v| v.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    };

    let mut out = String::new();
    for v in vars {
        let value = BRACED_REF.replace_all(&v.value, &expand);
        let value = BARE_REF.replace_all(&value, &expand);
        out.push_str(&format!("{}={}\n", v.key, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvDataType;
    use pretty_assertions::assert_eq;

    fn env(name: &str, vars: Vec<EnvVariable>) -> Environment {
        Environment {
            name: name.to_string(),
            variables: vars,
            ..Default::default()
        }
    }

    #[test]
    fn compares_by_key() {
        let mut typed = EnvVariable::new("PORT", "80");
        typed.data_type = EnvDataType::Number;

        let a = env(
            "dev",
            vec![
                EnvVariable::new("HOST", "localhost"),
                EnvVariable::new("PORT", "8080"),
                EnvVariable::new("DEBUG", "1"),
            ],
        );
        let b = env(
            "prod",
            vec![
                EnvVariable::new("HOST", "localhost"),
                typed,
                EnvVariable::new("SENTRY_DSN", "x"),
            ],
        );
        let diff = compare_environments(&a, &b);

        assert_eq!(diff.environment1, "dev");
        assert_eq!(diff.unchanged.len(), 1);
        assert_eq!(diff.removed[0].key, "DEBUG");
        assert_eq!(diff.added[0].key, "SENTRY_DSN");
        assert_eq!(
            diff.modified,
            vec![
                FieldChange {
                    key: "PORT".into(),
                    field: "value",
                    old_value: "8080".into(),
                    new_value: "80".into(),
                },
                FieldChange {
                    key: "PORT".into(),
                    field: "dataType",
                    old_value: "string".into(),
                    new_value: "number".into(),
                },
            ]
        );
    }

    #[test]
    fn substitution() {
        let vars = vec![
            EnvVariable::new("HOST", "db.local"),
            EnvVariable::new("PORT", "5432"),
            EnvVariable::new("URL", "postgres://${HOST}:$PORT/app"),
            EnvVariable::new("MISSING", "${NOPE}-$ALSO_NOPE"),
        ];
        assert_eq!(
            substitute_variables(&vars),
            "HOST=db.local\nPORT=5432\nURL=postgres://db.local:5432/app\nMISSING=${NOPE}-$ALSO_NOPE\n"
        );
    }
}
