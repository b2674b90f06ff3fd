//! Loader for the service configuration with YAML + environment overlays.
//!
//! The file names the listen address and exactly one publish target. Secrets
//! never live in the patcher or the remote client as ambient process state;
//! they are read here once and handed over as explicit struct fields.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct TickerConfig {
    pub version: Option<String>,
    /// Bind address for the webhook server, e.g. `0.0.0.0:8080`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub target: TargetSpec,
}

/// The tag is `kind`; the payload lives in `config`
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum TargetSpec {
    #[serde(rename = "remote")]
    Remote { config: RemoteTargetConfig },

    #[serde(rename = "repository")]
    Repository { config: RepositoryTargetConfig },
}

/// Variant A: forward the record to a fixed update endpoint.
#[derive(Debug, Deserialize)]
pub struct RemoteTargetConfig {
    /// Full URL of the update API, e.g. `https://site.example/api/update`.
    pub endpoint: String,
    /// Shared secret the endpoint checks before applying the update.
    pub secret: String,
}

/// Variant B: patch an HTML file in a hosted repository and commit it back.
#[derive(Debug, Deserialize)]
pub struct RepositoryTargetConfig {
    /// Bearer credential for the contents API.
    pub token: String,
    pub owner: String,
    pub repo: String,
    /// Path of the HTML file inside the repository.
    pub path: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    /// Overridable for tests; points at api.github.com in production.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".into()
}
fn default_branch() -> String {
    "main".into()
}
fn default_commit_message() -> String {
    "Update tweet display".into()
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct TickerConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for TickerConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TickerConfigLoader {
    /// Start with sensible defaults: YAML file + `TICKER_` env overrides.
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("TICKER").separator("__"));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use ticker_config::{TargetSpec, TickerConfigLoader};
    ///
    /// let cfg = TickerConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "test"
    /// target:
    ///   kind: "remote"
    ///   config:
    ///     endpoint: "https://site.example/api/update"
    ///     secret: "example"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.version.as_deref(), Some("test"));
    /// assert!(matches!(cfg.target, TargetSpec::Remote { .. }));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// Merges YAML snippets with `TICKER_`-prefixed environment variables and
    /// expands `${VAR}` placeholders before materialising the typed structs.
    pub fn load(self) -> Result<TickerConfig, ConfigError> {
        let cfg = self.builder.build()?;

        // Convert to serde_json::Value first
        let mut v: Value = cfg.try_deserialize()?;
        // Recursively expand environment variables
        expand_env_in_value(&mut v);

        let typed: TickerConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_nested_object() {
        temp_env::with_var("GITHUB_TOKEN", Some("ghp_secret"), || {
            let mut v = json!({
                "target": { "config": { "token": "${GITHUB_TOKEN}" } }
            });
            expand_env_in_value(&mut v);
            assert_eq!(v["target"]["config"]["token"], json!("ghp_secret"));
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            // Depth cap guarantees termination; the cycle stays unresolved.
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }
}
