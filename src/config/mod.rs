use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/augur.toml";
const DEFAULT_PID_FILE: &str = ".augur_pids.json";
const DEFAULT_QUERY_DEADLINE_SECS: u64 = 10;
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-2";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pid_file: PathBuf,
    pub query_deadline: Duration,
    pub providers: ProviderSettings,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub openai_model: String,
    pub anthropic_model: String,
}

/// Static per-tool configuration. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub port: u16,
    /// Health endpoint path; `None` selects the process-existence probe.
    pub health_path: Option<String>,
    pub query_path: String,
}

impl ToolDescriptor {
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn query_url(&self) -> String {
        format!("{}{}", self.base_url(), self.query_path)
    }

    pub fn health_url(&self) -> Option<String> {
        self.health_path
            .as_deref()
            .map(|path| format!("{}{}", self.base_url(), path))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("duplicate tool name '{name}' in configuration")]
    DuplicateTool { name: String },
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    pid_file: Option<String>,
    query_deadline_secs: Option<u64>,
    #[serde(default)]
    providers: RawProviders,
    #[serde(default)]
    tools: Vec<RawTool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawProviders {
    openai_model: Option<String>,
    anthropic_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTool {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    port: u16,
    health_path: Option<String>,
    query_path: Option<String>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        Self {
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            query_deadline: Duration::from_secs(DEFAULT_QUERY_DEADLINE_SECS),
            providers: ProviderSettings {
                openai_model: DEFAULT_OPENAI_MODEL.to_string(),
                anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            },
            tools: vec![
                ToolDescriptor {
                    name: "brave".to_string(),
                    command: PathBuf::from("augur-web-search"),
                    args: vec!["--port".to_string(), "5001".to_string()],
                    env: ambient_env([("BRAVE_API_KEY", "BRAVE_API_KEY")]),
                    port: 5001,
                    health_path: Some("/".to_string()),
                    query_path: "/search".to_string(),
                },
                ToolDescriptor {
                    name: "github".to_string(),
                    command: PathBuf::from("augur-code-search"),
                    args: vec!["--port".to_string(), "5002".to_string()],
                    env: ambient_env([("GITHUB_TOKEN", "GITHUB_TOKEN")]),
                    port: 5002,
                    health_path: Some("/".to_string()),
                    query_path: "/search/repositories".to_string(),
                },
            ],
        }
    }

    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

/// Build a descriptor env map from ambient variables; unset variables map to
/// an empty value so the tool server itself reports the missing credential.
fn ambient_env<const N: usize>(pairs: [(&str, &str); N]) -> HashMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, var)| (key.to_string(), env::var(var).unwrap_or_default()))
        .collect()
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let defaults = AppConfig::default();
    let tools = if parsed.tools.is_empty() {
        defaults.tools
    } else {
        let mut tools: Vec<ToolDescriptor> = Vec::with_capacity(parsed.tools.len());
        for raw in parsed.tools {
            let tool = ToolDescriptor::from(raw);
            if tools.iter().any(|existing| existing.name == tool.name) {
                return Err(ConfigError::DuplicateTool { name: tool.name });
            }
            tools.push(tool);
        }
        tools
    };

    Ok(AppConfig {
        pid_file: parsed
            .pid_file
            .map(|p| PathBuf::from(expand(&p)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_FILE)),
        query_deadline: Duration::from_secs(
            parsed
                .query_deadline_secs
                .unwrap_or(DEFAULT_QUERY_DEADLINE_SECS),
        ),
        providers: ProviderSettings {
            openai_model: parsed
                .providers
                .openai_model
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            anthropic_model: parsed
                .providers
                .anthropic_model
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
        },
        tools,
    })
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// Env values resolve `${VAR}` references against the ambient environment;
/// an unresolvable reference degrades to an empty value rather than a literal.
fn expand_env_value(value: &str) -> String {
    shellexpand::env_with_context(value, |var| {
        Ok::<_, std::env::VarError>(Some(env::var(var).unwrap_or_default()))
    })
    .map(|cow| cow.into_owned())
    .unwrap_or_default()
}

impl From<RawTool> for ToolDescriptor {
    fn from(raw: RawTool) -> Self {
        let health_path = match raw.health_path {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(path),
            None => Some("/".to_string()),
        };
        Self {
            name: raw.name,
            command: PathBuf::from(expand(&raw.command)),
            args: raw.args.iter().map(|arg| expand(arg)).collect(),
            env: raw
                .env
                .into_iter()
                .map(|(key, value)| (key, expand_env_value(&value)))
                .collect(),
            port: raw.port,
            health_path,
            query_path: raw.query_path.unwrap_or_else(|| "/search".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_declare_both_stock_tools_in_order() {
        let config = AppConfig::default();
        let names: Vec<_> = config.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["brave", "github"]);
        assert_eq!(config.tools[0].port, 5001);
        assert_eq!(config.tools[1].port, 5002);
        assert_eq!(
            config.tools[0].query_url(),
            "http://127.0.0.1:5001/search"
        );
        assert_eq!(
            config.tools[1].health_url().as_deref(),
            Some("http://127.0.0.1:5002/")
        );
    }

    #[test]
    fn reads_tools_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("augur.toml");
        fs::write(
            &path,
            r#"
pid_file = "pids.json"
query_deadline_secs = 3

[providers]
openai_model = "gpt-4o-mini"

[[tools]]
name = "alpha"
command = "alpha-server"
args = ["--port", "6001"]
port = 6001
query_path = "/search"
"#,
        )
        .expect("write config");

        let config = AppConfig::load(Some(&path)).expect("load config");
        assert_eq!(config.pid_file, PathBuf::from("pids.json"));
        assert_eq!(config.query_deadline, Duration::from_secs(3));
        assert_eq!(config.providers.openai_model, "gpt-4o-mini");
        assert_eq!(config.providers.anthropic_model, DEFAULT_ANTHROPIC_MODEL);
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].name, "alpha");
        assert_eq!(
            config.tools[0].health_url().as_deref(),
            Some("http://127.0.0.1:6001/")
        );
    }

    #[test]
    fn empty_health_path_disables_http_probe() {
        let raw = RawTool {
            name: "alpha".to_string(),
            command: "alpha-server".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            port: 6001,
            health_path: Some(String::new()),
            query_path: None,
        };
        let tool = ToolDescriptor::from(raw);
        assert!(tool.health_url().is_none());
    }

    #[test]
    fn rejects_duplicate_tool_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("augur.toml");
        fs::write(
            &path,
            r#"
[[tools]]
name = "alpha"
command = "alpha-server"
port = 6001

[[tools]]
name = "alpha"
command = "alpha-server"
port = 6002
"#,
        )
        .expect("write config");

        let result = AppConfig::load(Some(&path));
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateTool { name }) if name == "alpha"
        ));
    }

    #[test]
    fn unresolvable_env_reference_degrades_to_empty() {
        let expanded = expand_env_value("${AUGUR_TEST_SURELY_UNSET_VAR}");
        assert_eq!(expanded, "");
    }
}
