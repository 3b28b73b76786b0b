use std::collections::HashSet;
use std::path::Path;

use crate::config::schema::{Config, TransformConfig};
use crate::error::ConfigError;
use crate::sanitize;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if config.cores.is_empty() {
        return Err(ConfigError::Validation {
            message: "At least one index core must be configured".to_string(),
        });
    }

    validate_transform(&config.index_format).map_err(|reason| ConfigError::Validation {
        message: format!("Invalid index_format: {}", reason),
    })?;

    let mut core_names = HashSet::new();
    for core in &config.cores {
        if !sanitize::is_safe_component(&core.name) {
            return Err(ConfigError::InvalidCore {
                name: core.name.clone(),
                reason: "Name must be a plain directory name".to_string(),
            });
        }
        if !core_names.insert(&core.name) {
            return Err(ConfigError::InvalidCore {
                name: core.name.clone(),
                reason: "Duplicate core name".to_string(),
            });
        }
        match reqwest::Url::parse(&core.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidCore {
                    name: core.name.clone(),
                    reason: format!("Unsupported URL scheme: {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidCore {
                    name: core.name.clone(),
                    reason: format!("Invalid URL '{}': {}", core.url, e),
                });
            }
        }
    }

    let mut institution_ids = HashSet::new();
    for institution in &config.institutions {
        if !sanitize::is_safe_component(&institution.id) {
            return Err(ConfigError::InvalidInstitution {
                id: institution.id.clone(),
                reason: "Id must be a plain directory name".to_string(),
            });
        }
        if !institution_ids.insert(&institution.id) {
            return Err(ConfigError::InvalidInstitution {
                id: institution.id.clone(),
                reason: "Duplicate institution ID".to_string(),
            });
        }
        validate_transform(&institution.transform).map_err(|reason| {
            ConfigError::InvalidInstitution {
                id: institution.id.clone(),
                reason,
            }
        })?;
    }

    Ok(())
}

fn validate_transform(transform: &TransformConfig) -> Result<(), String> {
    match transform {
        TransformConfig::Command { program, args } => {
            if program.trim().is_empty() {
                return Err("Transformation program must not be empty".to_string());
            }
            if !args.iter().any(|a| a.contains("{output}")) {
                return Err(format!(
                    "Arguments of '{}' must reference {{output}}",
                    program
                ));
            }
            Ok(())
        }
        TransformConfig::Copy => Ok(()),
    }
}
