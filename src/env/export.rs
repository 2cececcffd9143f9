use crate::env::{EnvVariable, Environment};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// Placeholder for sensitive values outside secret stores.
pub const HIDDEN: &str = "***HIDDEN***";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvFormat {
    DotEnv,
    Json,
    Yaml,
    DockerEnv,
    K8sConfigMap,
    K8sSecret,
    Terraform,
    ShellExport,
}

impl EnvFormat {
    pub const ALL: [EnvFormat; 8] = [
        EnvFormat::DotEnv,
        EnvFormat::Json,
        EnvFormat::Yaml,
        EnvFormat::DockerEnv,
        EnvFormat::K8sConfigMap,
        EnvFormat::K8sSecret,
        EnvFormat::Terraform,
        EnvFormat::ShellExport,
    ];

    pub fn id(self) -> &'static str {
        match self {
            EnvFormat::DotEnv => ".env",
            EnvFormat::Json => "json",
            EnvFormat::Yaml => "yaml",
            EnvFormat::DockerEnv => "docker-env",
            EnvFormat::K8sConfigMap => "k8s-configmap",
            EnvFormat::K8sSecret => "k8s-secret",
            EnvFormat::Terraform => "terraform",
            EnvFormat::ShellExport => "shell-export",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            EnvFormat::DotEnv => "env",
            EnvFormat::Json => "json",
            EnvFormat::Yaml | EnvFormat::K8sConfigMap | EnvFormat::K8sSecret => "yaml",
            EnvFormat::DockerEnv => "dockerfile",
            EnvFormat::Terraform => "tf",
            EnvFormat::ShellExport => "sh",
        }
    }
}

impl fmt::Display for EnvFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EnvFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = if s == "env" || s == "dotenv" { ".env" } else { s };
        EnvFormat::ALL
            .into_iter()
            .find(|f| f.id() == s)
            .ok_or_else(|| {
                let ids: Vec<&str> = EnvFormat::ALL.iter().map(|f| f.id()).collect();
                format!("unknown format '{}' (expected one of: {})", s, ids.join(", "))
            })
    }
}

pub fn export_environment(env: &Environment, format: EnvFormat) -> String {
    match format {
        EnvFormat::DotEnv => dotenv(env),
        EnvFormat::Json => json_config(env),
        EnvFormat::Yaml => yaml(env),
        EnvFormat::DockerEnv => docker(env),
        EnvFormat::K8sConfigMap => k8s(env, false),
        EnvFormat::K8sSecret => k8s(env, true),
        EnvFormat::Terraform => terraform(env),
        EnvFormat::ShellExport => shell(env),
    }
}

fn masked(v: &EnvVariable) -> &str {
    if v.sensitive { HIDDEN } else { &v.value }
}

fn generated_at() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Variables grouped by category in first-seen order; no category is
/// `general`.
fn by_category(vars: &[EnvVariable]) -> Vec<(&str, Vec<&EnvVariable>)> {
    let mut groups: Vec<(&str, Vec<&EnvVariable>)> = Vec::new();
    for v in vars {
        let category = v.category.as_deref().filter(|c| !c.is_empty()).unwrap_or("general");
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, members)) => members.push(v),
            None => groups.push((category, vec![v])),
        }
    }
    groups
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Double-quoted string with `\` and `"` escaped.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn dotenv(env: &Environment) -> String {
    let mut out = format!("# Environment: {}\n", env.display_name());
    out.push_str(&format!("# Generated: {}\n", generated_at()));
    if let Some(d) = env.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("# Description: {}\n", d));
    }
    out.push('\n');

    for (category, vars) in by_category(&env.variables) {
        if category != "general" {
            out.push_str(&format!("# {} Variables\n", capitalize(category)));
        }
        for v in vars {
            if let Some(d) = v.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(&format!("# {}\n", d));
            }
            if let Some(example) = &v.example {
                if v.default_value.as_deref() == Some(v.value.as_str()) {
                    out.push_str(&format!("# Example: {}={}\n", v.key, example));
                }
            }
            out.push_str(&format!("{}={}\n", v.key, masked(v)));
        }
        out.push('\n');
    }
    out.trim().to_string()
}

fn json_config(env: &Environment) -> String {
    let mut vars = Map::new();
    for v in &env.variables {
        vars.insert(v.key.clone(), Value::String(masked(v).to_string()));
    }
    let config = json!({
        "environment": env.name,
        "displayName": env.display_name(),
        "description": env.description,
        "variables": vars,
    });
    serde_json::to_string_pretty(&config).unwrap_or_default()
}

fn yaml(env: &Environment) -> String {
    let mut out = format!("# Environment: {}\n", env.display_name());
    out.push_str(&format!("# Generated: {}\n\n", generated_at()));
    out.push_str(&format!("environment: {}\n", env.name));
    out.push_str(&format!("displayName: {}\n", quoted(env.display_name())));
    if let Some(d) = env.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("description: {}\n", quoted(d)));
    }
    out.push_str("\nvariables:\n");
    for (category, vars) in by_category(&env.variables) {
        out.push_str(&format!("  # {}\n", category));
        for v in vars {
            if let Some(d) = v.description.as_deref().filter(|d| !d.is_empty()) {
                out.push_str(&format!("  # {}\n", d));
            }
            out.push_str(&format!("  {}: {}\n", v.key, quoted(masked(v))));
        }
        out.push('\n');
    }
    out
}

fn docker(env: &Environment) -> String {
    let mut out = String::from("# Docker Environment Variables\n");
    out.push_str(&format!("# Environment: {}\n\n", env.display_name()));
    for v in &env.variables {
        out.push_str(&format!("ENV {}={}\n", v.key, quoted(masked(v))));
    }
    out
}

/// ConfigMaps get the non-sensitive variables, Secrets the sensitive ones,
/// unmasked.
fn k8s(env: &Environment, secret: bool) -> String {
    let mut out = String::from("apiVersion: v1\n");
    if secret {
        out.push_str("kind: Secret\n");
    } else {
        out.push_str("kind: ConfigMap\n");
    }
    out.push_str("metadata:\n");
    out.push_str(&format!(
        "  name: {}-{}\n",
        env.name,
        if secret { "secret" } else { "config" }
    ));
    out.push_str("  namespace: default\n");
    if secret {
        out.push_str("type: Opaque\nstringData:\n");
    } else {
        out.push_str("data:\n");
    }
    for v in env.variables.iter().filter(|v| v.sensitive == secret) {
        out.push_str(&format!("  {}: {}\n", v.key, quoted(&v.value)));
    }
    out
}

fn terraform(env: &Environment) -> String {
    let mut out = String::from("# Terraform Variables\n");
    out.push_str(&format!("# Environment: {}\n\n", env.display_name()));
    for v in &env.variables {
        out.push_str(&format!("variable \"{}\" {{\n", v.key.to_lowercase()));
        out.push_str("  type        = string\n");
        if let Some(d) = v.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("  description = {}\n", quoted(d)));
        }
        if let Some(d) = v.default_value.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("  default     = {}\n", quoted(d)));
        }
        if v.sensitive {
            out.push_str("  sensitive   = true\n");
        }
        out.push_str("}\n\n");
    }
    out
}

fn shell(env: &Environment) -> String {
    let mut out = String::from("#!/bin/bash\n# Environment Variables Export Script\n");
    out.push_str(&format!("# Environment: {}\n\n", env.display_name()));
    for v in &env.variables {
        out.push_str(&format!("export {}={}\n", v.key, quoted(masked(v))));
    }
    out.push_str(&format!(
        "\necho {}\n",
        quoted(&format!("Environment variables loaded for {}", env.display_name()))
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Environment {
        let mut port = EnvVariable::new("PORT", "8080");
        port.category = Some("server".to_string());
        port.description = Some("HTTP port".to_string());
        port.default_value = Some("8080".to_string());
        port.example = Some("3000".to_string());
        Environment {
            id: None,
            name: "staging".to_string(),
            display_name: "Staging".to_string(),
            description: None,
            variables: vec![
                EnvVariable::new("NODE_ENV", "production"),
                port,
                EnvVariable::new("API_KEY", "s3cr3t").sensitive(),
            ],
        }
    }

    /// Drop the `# Generated:` line, which carries the current time.
    fn stable(s: &str) -> String {
        s.lines()
            .filter(|l| !l.starts_with("# Generated:"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn dotenv_groups_and_masks() {
        assert_eq!(
            stable(&export_environment(&sample(), EnvFormat::DotEnv)),
            "# Environment: Staging\n\
             \n\
             NODE_ENV=production\n\
             API_KEY=***HIDDEN***\n\
             \n\
             # Server Variables\n\
             # HTTP port\n\
             # Example: PORT=3000\n\
             PORT=8080"
        );
    }

    #[test]
    fn json_masks() {
        let v: Value =
            serde_json::from_str(&export_environment(&sample(), EnvFormat::Json)).unwrap();
        assert_eq!(v["variables"]["API_KEY"], json!(HIDDEN));
        assert_eq!(v["variables"]["PORT"], json!("8080"));
        assert_eq!(v["displayName"], json!("Staging"));
    }

    #[test]
    fn kubernetes_split() {
        let cm = export_environment(&sample(), EnvFormat::K8sConfigMap);
        assert!(cm.contains("  name: staging-config\n"));
        assert!(cm.contains("  PORT: \"8080\"\n"));
        assert!(!cm.contains("API_KEY"));

        let secret = export_environment(&sample(), EnvFormat::K8sSecret);
        assert!(secret.contains("type: Opaque\nstringData:\n  API_KEY: \"s3cr3t\"\n"));
        assert!(!secret.contains("PORT"));
    }

    #[test]
    fn terraform_and_shell() {
        let tf = export_environment(&sample(), EnvFormat::Terraform);
        assert!(tf.contains(
            "variable \"port\" {\n  type        = string\n  description = \"HTTP port\"\n  default     = \"8080\"\n}\n"
        ));
        assert!(tf.contains("variable \"api_key\" {\n  type        = string\n  sensitive   = true\n}"));

        let sh = export_environment(&sample(), EnvFormat::ShellExport);
        assert!(sh.starts_with("#!/bin/bash\n"));
        assert!(sh.contains("export API_KEY=\"***HIDDEN***\"\n"));
        assert!(sh.ends_with("echo \"Environment variables loaded for Staging\"\n"));
    }

    #[test]
    fn docker_and_yaml() {
        let docker = export_environment(&sample(), EnvFormat::DockerEnv);
        assert!(docker.contains("ENV NODE_ENV=\"production\"\n"));

        let yaml = stable(&export_environment(&sample(), EnvFormat::Yaml));
        assert!(yaml.contains("environment: staging\ndisplayName: \"Staging\"\n\nvariables:\n  # general\n"));
        assert!(yaml.contains("  # server\n  # HTTP port\n  PORT: \"8080\""));
    }

    #[test]
    fn format_names() {
        assert_eq!("k8s-secret".parse::<EnvFormat>(), Ok(EnvFormat::K8sSecret));
        assert_eq!("env".parse::<EnvFormat>(), Ok(EnvFormat::DotEnv));
        assert!("toml".parse::<EnvFormat>().is_err());
        assert_eq!(EnvFormat::DockerEnv.extension(), "dockerfile");
    }
}
