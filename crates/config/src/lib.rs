//! Configuration loading, validation, and management for sidekick.
//!
//! Loads configuration from `~/.sidekick/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use sidekick_core::ChunkConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sidekick/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local model server settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Reason-act loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Vector memory and history settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context budgeting and scoring
    #[serde(default)]
    pub context: ContextConfig,

    /// Prompt registry selection
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Telemetry sink and redaction
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

// ── Model ──────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible local server (llama.cpp, Ollama)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name passed to the server
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model, when it differs from `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Optional bearer token for servers that require one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP request timeout for model calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/v1".into()
}
fn default_model() -> String {
    "local".into()
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            embedding_model: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("api_key", &redact(&self.api_key))
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// ── Agent loop ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Iteration ceiling for the reason-act loop
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Accumulated context length (chars) that triggers pruning
    #[serde(default = "default_prune_threshold")]
    pub prune_char_threshold: usize,

    /// History entries kept after pruning
    #[serde(default = "default_prune_keep_last")]
    pub prune_keep_last: usize,

    /// Observations longer than this are truncated
    #[serde(default = "default_observation_limit")]
    pub observation_char_limit: usize,

    /// Wall-clock bound on a single tool execution (unset = unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,

    /// Capability allowlist applied to every tool call (unset = allow all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_capabilities: Option<Vec<String>>,

    /// Reply returned when the iteration ceiling is hit
    #[serde(default = "default_fallback_response")]
    pub fallback_response: String,
}

fn default_max_iterations() -> usize {
    5
}
fn default_prune_threshold() -> usize {
    12_000
}
fn default_prune_keep_last() -> usize {
    6
}
fn default_observation_limit() -> usize {
    2_000
}
fn default_fallback_response() -> String {
    "I wasn't able to finish that within the allowed number of steps. Please try rephrasing or breaking the request into smaller parts.".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            prune_char_threshold: default_prune_threshold(),
            prune_keep_last: default_prune_keep_last(),
            observation_char_limit: default_observation_limit(),
            tool_timeout_secs: None,
            allowed_capabilities: None,
            fallback_response: default_fallback_response(),
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Entries kept in the short-term history buffer
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Candidates requested per result before re-ranking
    #[serde(default = "default_overfetch")]
    pub overfetch_factor: usize,

    /// Cosine similarity at which two candidates share a cluster
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold: f32,

    /// Conversation groups probed by sparse search
    #[serde(default = "default_probe_groups")]
    pub sparse_probe_groups: usize,

    /// Store capacity; oldest records are evicted beyond it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_vectors: Option<usize>,

    /// Chunking used for indexing and context assembly alike
    #[serde(default)]
    pub chunking: ChunkConfig,
}

fn default_history_capacity() -> usize {
    20
}
fn default_overfetch() -> usize {
    3
}
fn default_cluster_threshold() -> f32 {
    0.92
}
fn default_probe_groups() -> usize {
    4
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            chunking: ChunkConfig::default(),
            overfetch_factor: default_overfetch(),
            cluster_threshold: default_cluster_threshold(),
            sparse_probe_groups: default_probe_groups(),
            max_vectors: None,
        }
    }
}

// ── Context engineering ────────────────────────────────────────────────

/// Coarse device capability signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceTier {
    Low,
    #[default]
    Mid,
    High,
}

impl DeviceTier {
    /// Context window assumed for the tier.
    pub fn max_context_tokens(&self) -> usize {
        match self {
            DeviceTier::Low => 1024,
            DeviceTier::Mid => 2048,
            DeviceTier::High => 4096,
        }
    }
}

impl std::str::FromStr for DeviceTier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(DeviceTier::Low),
            "mid" | "medium" => Ok(DeviceTier::Mid),
            "high" => Ok(DeviceTier::High),
            other => Err(ConfigError::ValidationError(format!(
                "unknown device tier '{other}' (expected low, mid or high)"
            ))),
        }
    }
}

impl std::fmt::Display for DeviceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceTier::Low => "low",
            DeviceTier::Mid => "mid",
            DeviceTier::High => "high",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub device_tier: DeviceTier,

    /// Skip quality re-scoring to save work on constrained devices
    #[serde(default)]
    pub memory_constrained: bool,

    /// Minimum raw similarity for a candidate to be considered
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Minimum re-scored quality for a candidate to be kept
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: f32,

    /// Candidates kept on the standard path
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Age at which recency decay reaches its floor
    #[serde(default = "default_recency_window")]
    pub recency_window_days: u32,

    /// Lowest recency multiplier
    #[serde(default = "default_recency_floor")]
    pub recency_floor: f32,

    /// Query length (chars) that selects the hierarchical path
    #[serde(default = "default_hierarchical_query_chars")]
    pub hierarchical_query_chars: usize,

    /// History length that selects the hierarchical path
    #[serde(default = "default_hierarchical_history")]
    pub hierarchical_history_entries: usize,

    /// Complexity score that selects the hierarchical path
    #[serde(default = "default_hierarchical_complexity")]
    pub hierarchical_complexity: f32,

    /// Score multiplier by source tag; unknown sources use 1.0
    #[serde(default = "default_source_trust")]
    pub source_trust: BTreeMap<String, f32>,
}

fn default_similarity_threshold() -> f32 {
    0.3
}
fn default_quality_threshold() -> f32 {
    0.25
}
fn default_top_k() -> usize {
    3
}
fn default_recency_window() -> u32 {
    30
}
fn default_recency_floor() -> f32 {
    0.7
}
fn default_source_trust() -> BTreeMap<String, f32> {
    BTreeMap::from([
        ("knowledge_base".to_string(), 1.2),
        ("conversation".to_string(), 1.0),
        ("tool".to_string(), 0.9),
    ])
}
fn default_hierarchical_query_chars() -> usize {
    400
}
fn default_hierarchical_history() -> usize {
    12
}
fn default_hierarchical_complexity() -> f32 {
    0.6
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            device_tier: DeviceTier::default(),
            memory_constrained: false,
            similarity_threshold: default_similarity_threshold(),
            quality_threshold: default_quality_threshold(),
            top_k: default_top_k(),
            recency_window_days: default_recency_window(),
            recency_floor: default_recency_floor(),
            source_trust: default_source_trust(),
            hierarchical_query_chars: default_hierarchical_query_chars(),
            hierarchical_history_entries: default_hierarchical_history(),
            hierarchical_complexity: default_hierarchical_complexity(),
        }
    }
}

// ── Prompts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Extra registry file merged over the built-in prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,

    #[serde(default = "default_system_prompt_id")]
    pub system_prompt_id: String,

    #[serde(default = "default_prompt_version")]
    pub system_prompt_version: u32,

    #[serde(default = "default_summary_prompt_id")]
    pub summary_prompt_id: String,

    #[serde(default = "default_prompt_version")]
    pub summary_prompt_version: u32,
}

fn default_system_prompt_id() -> String {
    "agent.system".into()
}
fn default_summary_prompt_id() -> String {
    "history.summary".into()
}
fn default_prompt_version() -> u32 {
    1
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            registry_path: None,
            system_prompt_id: default_system_prompt_id(),
            system_prompt_version: default_prompt_version(),
            summary_prompt_id: default_summary_prompt_id(),
            summary_prompt_version: default_prompt_version(),
        }
    }
}

// ── Telemetry ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Append-only JSON lines file
    Jsonl,
    /// Structured log records
    #[default]
    Tracing,
    /// Discard
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub sink: SinkKind,

    /// JSONL output path (defaults to `~/.sidekick/telemetry.jsonl`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Scrub PII and secrets from payloads before they reach the sink
    #[serde(default = "default_true")]
    pub redact: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sink: SinkKind::default(),
            path: None,
            redact: true,
        }
    }
}

impl TelemetryConfig {
    /// Resolved JSONL path.
    pub fn jsonl_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("telemetry.jsonl"))
    }
}

// ── Loading ────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.sidekick/config.toml).
    ///
    /// Environment variables override file values:
    /// - `SIDEKICK_BASE_URL`
    /// - `SIDEKICK_MODEL`
    /// - `SIDEKICK_API_KEY`
    /// - `SIDEKICK_DEVICE_TIER`
    /// - `SIDEKICK_TELEMETRY_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process env).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SIDEKICK_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(model) = lookup("SIDEKICK_MODEL") {
            self.model.model = model;
        }
        if let Some(key) = lookup("SIDEKICK_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(tier) = lookup("SIDEKICK_DEVICE_TIER") {
            self.context.device_tier = tier.parse()?;
        }
        if let Some(path) = lookup("SIDEKICK_TELEMETRY_PATH") {
            self.telemetry.path = Some(PathBuf::from(path));
            self.telemetry.sink = SinkKind::Jsonl;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sidekick")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return invalid("model.temperature must be between 0.0 and 2.0");
        }
        if self.model.base_url.trim().is_empty() {
            return invalid("model.base_url must not be empty");
        }
        if self.agent.max_iterations == 0 {
            return invalid("agent.max_iterations must be at least 1");
        }
        if self.agent.observation_char_limit == 0 {
            return invalid("agent.observation_char_limit must be > 0");
        }
        if self.memory.history_capacity == 0 {
            return invalid("memory.history_capacity must be > 0");
        }
        if self.memory.overfetch_factor == 0 {
            return invalid("memory.overfetch_factor must be at least 1");
        }
        if !(-1.0..=1.0).contains(&self.memory.cluster_threshold) {
            return invalid("memory.cluster_threshold must be between -1.0 and 1.0");
        }
        self.memory
            .chunking
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("memory.chunking: {e}")))?;
        if !(0.0..=1.0).contains(&self.context.recency_floor) {
            return invalid("context.recency_floor must be between 0.0 and 1.0");
        }
        if self.context.top_k == 0 {
            return invalid("context.top_k must be at least 1");
        }
        if self.context.source_trust.values().any(|v| *v < 0.0) {
            return invalid("context.source_trust multipliers must be non-negative");
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for sidekick_core::Error {
    fn from(err: ConfigError) -> Self {
        sidekick_core::Error::Config {
            message: err.to_string(),
        }
    }
}
