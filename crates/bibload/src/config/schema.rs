use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::transform::{CommandTransformer, CopyTransformer, TransformStrategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,
    #[serde(default = "default_archive_directory")]
    pub archive_directory: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub index_format: TransformConfig,
    pub cores: Vec<CoreConfig>,
    #[serde(default)]
    pub institutions: Vec<InstitutionConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bibload")
}

fn default_working_directory() -> PathBuf {
    data_dir().join("work")
}

fn default_archive_directory() -> PathBuf {
    data_dir().join("archive")
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// How one transformation stage is carried out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformConfig {
    /// External program; `{input}`, `{output}` and `{institution}` in the
    /// arguments are substituted per run.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
    #[default]
    Copy,
}

impl TransformConfig {
    pub fn build(&self) -> Arc<dyn TransformStrategy> {
        match self {
            TransformConfig::Command { program, args } => {
                Arc::new(CommandTransformer::new(program.clone(), args.clone()))
            }
            TransformConfig::Copy => Arc::new(CopyTransformer::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub name: String,
    /// Base URL of the core, e.g. `http://localhost:8983/solr/live`.
    pub url: String,
    #[serde(default = "default_institution_field")]
    pub institution_field: String,
}

fn default_institution_field() -> String {
    "institutionID".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionConfig {
    pub id: String,
    pub name: String,
    pub transform: TransformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
