//! Built-in starter environments (Node.js, Django, Docker Compose, AWS...).

use crate::env::{EnvVariable, Environment};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvTemplate {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub variables: Vec<EnvVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup_instructions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EnvTemplate {
    /// A fresh environment holding a copy of the template's variables.
    pub fn instantiate(&self, name: &str) -> Environment {
        Environment {
            id: None,
            name: name.to_string(),
            display_name: name.to_string(),
            description: Some(format!("Created from template '{}'", self.name)),
            variables: self.variables.clone(),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        let has = |s: &str| s.to_lowercase().contains(needle);
        has(&self.name)
            || has(&self.description)
            || self.tags.iter().any(|t| has(t.as_str()))
            || self
                .variables
                .iter()
                .any(|v| has(&v.key) || v.description.as_deref().is_some_and(has))
    }
}

static TEMPLATES: LazyLock<Vec<EnvTemplate>> = LazyLock::new(|| {
    serde_json::from_str(include_str!("templates.json")).expect("valid template catalog")
});

pub fn templates() -> &'static [EnvTemplate] {
    &TEMPLATES
}

pub fn find_template(id: &str) -> Option<&'static EnvTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// All templates when `category` is `None`.
pub fn by_category(category: Option<&str>) -> Vec<&'static EnvTemplate> {
    TEMPLATES
        .iter()
        .filter(|t| category.is_none_or(|c| t.category == c))
        .collect()
}

pub fn by_framework(framework: Option<&str>) -> Vec<&'static EnvTemplate> {
    TEMPLATES
        .iter()
        .filter(|t| framework.is_none_or(|f| t.framework.as_deref() == Some(f)))
        .collect()
}

/// Case-insensitive match on name, description, tags, variable keys and
/// variable descriptions.
pub fn search(query: &str) -> Vec<&'static EnvTemplate> {
    let needle = query.to_lowercase();
    TEMPLATES.iter().filter(|t| t.matches(&needle)).collect()
}

pub fn categories() -> Vec<&'static str> {
    let set: BTreeSet<&str> = TEMPLATES.iter().map(|t| t.category.as_str()).collect();
    set.into_iter().collect()
}

pub fn frameworks() -> Vec<&'static str> {
    let set: BTreeSet<&str> = TEMPLATES
        .iter()
        .filter_map(|t| t.framework.as_deref())
        .collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::validate_environment;
    use pretty_assertions::assert_eq;

    fn ids(list: Vec<&EnvTemplate>) -> Vec<&str> {
        list.into_iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn catalog_loads() {
        assert_eq!(templates().len(), 9);
        let aws = find_template("aws-deployment").unwrap();
        assert_eq!(aws.framework, None);
        assert_eq!(aws.variables[1].key, "AWS_ACCESS_KEY_ID");
        assert!(aws.variables[1].sensitive);
        assert!(find_template("rails").is_none());
    }

    #[test]
    fn filters() {
        assert_eq!(
            ids(by_category(Some("Backend"))),
            vec!["nodejs-basic", "nodejs-database", "python-django"]
        );
        assert_eq!(by_category(None).len(), 9);
        assert_eq!(ids(by_framework(Some("react"))), vec!["react-app"]);
        assert_eq!(
            categories(),
            vec!["Backend", "Cloud", "DevOps", "Frontend", "Full Stack", "Observability", "Testing"]
        );
        assert_eq!(frameworks(), vec!["docker", "nextjs", "nodejs", "python", "react"]);
    }

    #[test]
    fn search_looks_at_variables_too() {
        assert_eq!(ids(search("Redis")), vec!["nodejs-database", "docker-compose"]);
        assert_eq!(ids(search("sentry")), vec!["react-app", "monitoring-logging"]);
        assert!(search("kubernetes").is_empty());
    }

    #[test]
    fn instantiated_templates_validate() {
        let basic = find_template("nodejs-basic").unwrap().instantiate("dev");
        assert_eq!(basic.name, "dev");
        assert!(validate_environment(&basic).valid);

        let next = find_template("nextjs-full").unwrap().instantiate("web");
        let report = validate_environment(&next);
        assert!(!report.valid);
        assert!(
            report
                .errors
                .iter()
                .any(|e| e.field == "NEXTAUTH_SECRET" && e.rule == "required")
        );
    }
}
