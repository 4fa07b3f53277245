//! Configuration loaded from `${DATA_DIR}/config.json`.
//!
//! A missing or malformed file degrades to defaults with a warning rather
//! than a fatal error — configuration is data, not a required boot
//! dependency.

use crate::models::GraphNodeType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionConfig {
    /// Extra user-supplied patterns, applied in addition to the defaults.
    #[serde(default)]
    pub extra: Vec<ExtraPattern>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraPattern {
    pub kind: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionConfig {
    #[serde(default = "default_noise_categories")]
    pub noise_categories: Vec<String>,
    #[serde(default = "default_excluded_paths")]
    pub excluded_path_fragments: Vec<String>,
    #[serde(default = "default_large_content_bytes")]
    pub large_content_bytes: usize,
}

fn default_noise_categories() -> Vec<String> {
    vec![
        "build_output".into(),
        "package_install".into(),
        "repetitive_lint".into(),
        "empty_output".into(),
    ]
}

fn default_excluded_paths() -> Vec<String> {
    vec![
        ".env".into(),
        "credentials".into(),
        "secrets".into(),
        ".pem".into(),
        ".key".into(),
        "id_rsa".into(),
    ]
}

fn default_large_content_bytes() -> usize {
    5 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    #[serde(default = "default_max_degree")]
    pub max_degree: usize,
    #[serde(default = "default_min_edge_confidence")]
    pub min_edge_confidence: f32,
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f64,
    #[serde(default = "default_decay_floor")]
    pub decay_floor: f32,
    #[serde(default = "default_delete_threshold")]
    pub delete_threshold: f32,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    /// Per-type minimum confidence floor for the quality gate (§4.6). A
    /// type with no entry here falls back to [`DEFAULT_MIN_CONFIDENCE`].
    #[serde(default = "default_min_confidence_by_type")]
    pub min_confidence_by_type: HashMap<GraphNodeType, f32>,
}

/// Floor applied to any [`GraphNodeType`] not given its own entry in
/// `min_confidence_by_type`.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

impl GraphConfig {
    /// The confidence floor for `node_type`, falling back to
    /// [`DEFAULT_MIN_CONFIDENCE`] when it has no entry of its own.
    pub fn min_confidence_for(&self, node_type: GraphNodeType) -> f32 {
        self.min_confidence_by_type.get(&node_type).copied().unwrap_or(DEFAULT_MIN_CONFIDENCE)
    }
}

fn default_max_degree() -> usize {
    50
}
fn default_min_edge_confidence() -> f32 {
    0.45
}
fn default_half_life_days() -> f64 {
    30.0
}
fn default_decay_floor() -> f32 {
    0.05
}
fn default_delete_threshold() -> f32 {
    0.08
}
fn default_max_age_days() -> i64 {
    180
}
/// No type gets a stricter floor than [`DEFAULT_MIN_CONFIDENCE`] out of the
/// box — every [`GraphNodeType`]'s baseline confidence already clears it, so
/// an empty map reproduces the pre-per-type flat threshold exactly. A
/// deployment that wants, say, a stricter floor for `Reference` sets one in
/// `config.json`.
fn default_min_confidence_by_type() -> HashMap<GraphNodeType, f32> {
    HashMap::new()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicConfig {
    #[serde(default = "default_tau_min")]
    pub tau_min: f32,
    #[serde(default = "default_tau_max")]
    pub tau_max: f32,
    #[serde(default = "default_tau_initial")]
    pub tau_initial: f32,
    #[serde(default = "default_window_min")]
    pub window_min: usize,
    #[serde(default = "default_window_max")]
    pub window_max: usize,
}

fn default_tau_min() -> f32 {
    0.15
}
fn default_tau_max() -> f32 {
    0.55
}
fn default_tau_initial() -> f32 {
    0.35
}
fn default_window_min() -> usize {
    5
}
fn default_window_max() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    Local,
    Piggyback,
    Hybrid,
}

impl Default for EmbeddingMode {
    fn default() -> Self {
        EmbeddingMode::Local
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub redaction: RedactionConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub topic: TopicConfig,
    #[serde(default)]
    pub embedding_mode: EmbeddingMode,
    #[serde(default = "default_web_port")]
    pub web_port: u16,
}

fn default_web_port() -> u16 {
    37820
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self { extra: Vec::new() }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            noise_categories: default_noise_categories(),
            excluded_path_fragments: default_excluded_paths(),
            large_content_bytes: default_large_content_bytes(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_degree: default_max_degree(),
            min_edge_confidence: default_min_edge_confidence(),
            half_life_days: default_half_life_days(),
            decay_floor: default_decay_floor(),
            delete_threshold: default_delete_threshold(),
            max_age_days: default_max_age_days(),
            min_confidence_by_type: default_min_confidence_by_type(),
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            tau_min: default_tau_min(),
            tau_max: default_tau_max(),
            tau_initial: default_tau_initial(),
            window_min: default_window_min(),
            window_max: default_window_max(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redaction: RedactionConfig::default(),
            admission: AdmissionConfig::default(),
            graph: GraphConfig::default(),
            topic: TopicConfig::default(),
            embedding_mode: EmbeddingMode::default(),
            web_port: default_web_port(),
        }
    }
}

impl Config {
    /// Load from `${data_dir}/config.json`, writing back a self-documenting
    /// default file on first run. Never fails: a malformed file yields
    /// defaults and a warning.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("config.json");
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("config.json is malformed ({e}), using defaults");
                    Config::default()
                }
            },
            Err(_) => {
                let cfg = Config::default();
                if let Ok(serialized) = serde_json::to_string_pretty(&cfg) {
                    let _ = std::fs::write(&path, serialized);
                }
                cfg
            }
        }
    }
}
