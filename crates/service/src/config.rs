//! Service configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable prefix (`ABALONE_PORT`, `ABALONE_MODEL_PATH`, ...)
pub const ENV_PREFIX: &str = "ABALONE";

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Serialized model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Serialized preprocessor artifact, paired with the model
    #[serde(default = "default_preprocessor_path")]
    pub preprocessor_path: PathBuf,
}

fn default_port() -> u16 {
    8000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("local_objects/model.json")
}

fn default_preprocessor_path() -> PathBuf {
    PathBuf::from("local_objects/preprocessor.json")
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Load configuration from an explicit environment source
    pub fn load_from(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder().add_source(environment).build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_environment_empty() {
        let env = config::Environment::with_prefix(ENV_PREFIX).source(Some(config::Map::new()));
        let config = ServiceConfig::load_from(env).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.model_path, PathBuf::from("local_objects/model.json"));
        assert_eq!(
            config.preprocessor_path,
            PathBuf::from("local_objects/preprocessor.json")
        );
    }

    #[test]
    fn test_environment_overrides() {
        let mut vars = config::Map::new();
        vars.insert("ABALONE_PORT".to_string(), "9100".to_string());
        vars.insert(
            "ABALONE_MODEL_PATH".to_string(),
            "/srv/artifacts/model.json".to_string(),
        );
        let env = config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(Some(vars));

        let config = ServiceConfig::load_from(env).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.model_path, PathBuf::from("/srv/artifacts/model.json"));
        assert_eq!(
            config.preprocessor_path,
            PathBuf::from("local_objects/preprocessor.json")
        );
    }
}
