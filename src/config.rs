use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{ArtifactKind, RunContext};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
}

/// Which generation backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            max_tokens: 8192,
            timeout_ms: 300000,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub kind: ArtifactKind,
    pub goal: Option<String>,
    /// Functionality (code) or topic (document); defaults to the goal
    pub subject: Option<String>,
    /// Programming language or document type
    pub domain: String,
    pub seed_path: Option<PathBuf>,
    pub iterations: u32,
    pub focus_area: Option<String>,
    pub next_steps: Option<String>,
    pub refine_attempts: u32,
    /// Stop the outer loop after this many runs even if steering isn't terminal
    pub max_runs: Option<u32>,
    pub run_delay_ms: u64,
    pub promote_best_to_seed: bool,
    /// Directory of `<stage>.md` template overrides
    pub templates_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kind: ArtifactKind::Code,
            goal: None,
            subject: None,
            domain: String::new(),
            seed_path: None,
            iterations: 5,
            focus_area: None,
            next_steps: None,
            refine_attempts: 3,
            max_runs: None,
            run_delay_ms: 5000,
            promote_best_to_seed: true,
            templates_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Ledger files and per-run artifact directories
    pub output_dir: PathBuf,
    /// Where the latest final aggregate is copied after each run
    pub latest_artifact_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("refinr"),
            latest_artifact_path: None,
        }
    }
}

impl StorageConfig {
    pub fn ledger_dir(&self) -> PathBuf {
        self.output_dir.join("ledger")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.output_dir.join("runs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = Self::local_path();
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// `./refinr.yml`
    pub fn local_path() -> PathBuf {
        PathBuf::from(format!("{}.yml", env!("CARGO_PKG_NAME")))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Presence checks only: a run needs a goal and a seed path.
    pub fn validate(&self) -> Result<()> {
        let goal = self.pipeline.goal.as_deref().unwrap_or("");
        if goal.trim().is_empty() {
            return Err(eyre!("pipeline.goal is required"));
        }
        if self.pipeline.seed_path.is_none() {
            return Err(eyre!("pipeline.seed_path is required"));
        }
        if self.pipeline.max_runs == Some(0) {
            return Err(eyre!("pipeline.max_runs must be at least 1"));
        }
        Ok(())
    }

    /// Build the first run's context from the pipeline section.
    pub fn to_run_context(&self) -> Result<RunContext> {
        self.validate()?;
        let p = &self.pipeline;
        let goal = p.goal.clone().unwrap_or_default();
        let seed_path = p.seed_path.clone().unwrap_or_default();

        let mut ctx = RunContext::new(goal, p.kind, seed_path, p.iterations).with_domain(p.domain.clone());
        if let Some(subject) = p.subject.as_ref().filter(|s| !s.trim().is_empty()) {
            ctx = ctx.with_subject(subject.clone());
        }
        if let Some(focus) = p.focus_area.as_ref().filter(|s| !s.trim().is_empty()) {
            ctx = ctx.with_focus_area(focus.clone());
        }
        if let Some(next) = p.next_steps.as_ref().filter(|s| !s.trim().is_empty()) {
            ctx = ctx.with_next_steps(next.clone());
        }
        Ok(ctx)
    }

    /// Starter config written by `refinr init`
    pub fn starter(kind: ArtifactKind, seed_path: PathBuf, output_dir: PathBuf) -> Self {
        let (goal, subject, domain) = match kind {
            ArtifactKind::Code => ("Create a sample function", "example functionality", "JavaScript"),
            ArtifactKind::Document => ("Write a short explainer", "example topic", "Blog post"),
        };
        Self {
            pipeline: PipelineConfig {
                kind,
                goal: Some(goal.to_string()),
                subject: Some(subject.to_string()),
                domain: domain.to_string(),
                seed_path: Some(seed_path),
                focus_area: Some(kind.default_focus_area().to_string()),
                next_steps: Some(kind.default_next_steps().to_string()),
                ..Default::default()
            },
            storage: StorageConfig {
                output_dir,
                latest_artifact_path: None,
            },
            ..Default::default()
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
