//! Settings type definitions.
//!
//! Every section implements [`Default`] with production values and is marked
//! `#[serde(default)]`, so partial JSON files work: missing fields fall back
//! to their defaults during deserialization. Field names are snake_case to
//! match the engine's wire format.

use serde::{Deserialize, Serialize};

use inquest_tools::Toolset;

/// Root settings type for the Inquest engine.
///
/// Loaded from `~/.inquest/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON format
///
/// ```json
/// {
///   "version": "0.1.0",
///   "server": { "port": 9090 },
///   "toolsets": [
///     {
///       "name": "kubernetes",
///       "tools": [
///         {
///           "name": "get_pod_logs",
///           "description": "Fetch recent logs for a pod",
///           "command_template": "kubectl logs {{ pod }} -n {{ namespace }}",
///           "parameters": {
///             "type": "object",
///             "properties": {
///               "pod": { "type": "string" },
///               "namespace": { "type": "string" }
///             },
///             "required": ["pod", "namespace"]
///           }
///         }
///       ]
///     }
///   ]
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InquestSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// LLM provider settings.
    pub provider: ProviderSettings,
    /// Retry configuration for provider calls.
    pub retry: RetrySettings,
    /// Context management settings (truncation, compaction).
    pub context: ContextSettings,
    /// Investigation loop settings.
    pub engine: EngineSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Declarative toolsets exposed to investigations.
    pub toolsets: Vec<Toolset>,
}

impl Default for InquestSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "inquest".to_string(),
            server: ServerSettings::default(),
            provider: ProviderSettings::default(),
            retry: RetrySettings::default(),
            context: ContextSettings::default(),
            engine: EngineSettings::default(),
            logging: LoggingSettings::default(),
            toolsets: Vec::new(),
        }
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Maximum number of investigations running at once.
    pub max_concurrent_sessions: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_concurrent_sessions: 8,
        }
    }
}

/// LLM provider settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Default model identifier for new investigations.
    pub default_model: String,
    /// Base URL override for OpenAI-compatible gateways.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            default_model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Retry configuration for provider calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter factor, 0.0 to 1.0.
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_factor: 0.2,
        }
    }
}

/// Context management settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// Per-result token budget applied before folding tool results.
    pub tool_result_max_tokens: u64,
    /// Fraction of the input budget preserved as recent history during
    /// compaction, 0.0 to 1.0.
    pub preserve_fraction: f64,
    /// Override for tokens reserved for model output; `None` uses the
    /// model's own limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u64>,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            tool_result_max_tokens: 2_000,
            preserve_fraction: 0.5,
            max_output_tokens: None,
        }
    }
}

/// Investigation loop settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum model/tool steps before the loop is forced to conclude.
    pub max_steps: u32,
    /// Maximum tool calls executed concurrently within one step.
    pub tool_concurrency: usize,
    /// Event channel capacity per session.
    pub event_backlog: usize,
    /// Working directory for command tools.
    pub working_directory: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_steps: 15,
            tool_concurrency: 4,
            event_backlog: 256,
            working_directory: "/tmp".to_string(),
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default tracing filter (overridden by `RUST_LOG`).
    pub level: String,
    /// Log output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
