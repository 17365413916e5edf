// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        let content = Self::substitute_env_vars(&content)?;

        let config: RecorderConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${OUTPUT_DIR:-uploads} -> uploads (if OUTPUT_DIR not set)
    pub(crate) fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}")
            .context("Invalid substitution pattern")?;

        let replaced = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        });

        Ok(replaced.to_string())
    }

    /// Validate configuration
    pub fn validate(config: &RecorderConfig) -> Result<()> {
        if config.server.outbound_queue == 0 {
            bail!("server.outbound_queue must be > 0");
        }

        if config.recorder.output_dir.trim().is_empty() {
            bail!("recorder.output_dir cannot be empty");
        }

        if config.recorder.file_prefix.trim().is_empty() {
            bail!("recorder.file_prefix cannot be empty");
        }

        if config.encoder.ffmpeg_path.trim().is_empty() {
            bail!("encoder.ffmpeg_path cannot be empty");
        }

        if config.encoder.frame_rate == 0 {
            bail!("encoder.frame_rate must be > 0");
        }

        if config.trigger.default_duration_ms == 0 {
            bail!("trigger.default_duration_ms must be > 0");
        }

        match config.storage.backend.as_str() {
            "memory" => {}
            "filesystem" => {
                if config.storage.filesystem.is_none() {
                    bail!("filesystem backend selected but filesystem config missing");
                }
            }
            "http" => {
                if config.storage.http.is_none() {
                    bail!("http backend selected but http config missing");
                }
            }
            unknown => bail!(
                "Unknown backend: '{}'. Supported: memory, filesystem, http",
                unknown
            ),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("FR_TEST_VAR", "test_value");

        let input = "url: ${FR_TEST_VAR}";
        let output = ConfigLoader::substitute_env_vars(input).unwrap();
        assert_eq!(output, "url: test_value");

        std::env::remove_var("FR_TEST_VAR");
    }

    #[test]
    fn test_env_var_with_default() {
        std::env::remove_var("FR_TEST_VAR2");

        let input = "output_dir: ${FR_TEST_VAR2:-uploads}";
        let output = ConfigLoader::substitute_env_vars(input).unwrap();
        assert_eq!(output, "output_dir: uploads");
    }

    #[test]
    fn test_unset_var_without_default_is_kept() {
        std::env::remove_var("FR_TEST_VAR3");

        let output = ConfigLoader::substitute_env_vars("token: ${FR_TEST_VAR3}").unwrap();
        assert_eq!(output, "token: ${FR_TEST_VAR3}");
    }

    #[test]
    fn test_validation_zero_frame_rate() {
        let mut config = RecorderConfig::default();
        config.encoder.frame_rate = 0;

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("frame_rate"));
    }

    #[test]
    fn test_validation_missing_backend_section() {
        let mut config = RecorderConfig::default();
        config.storage.backend = "filesystem".to_string();

        let result = ConfigLoader::validate(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("filesystem config missing"));
    }

    #[test]
    fn test_validation_unknown_backend() {
        let mut config = RecorderConfig::default();
        config.storage.backend = "mongodb".to_string();

        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConfigLoader::validate(&RecorderConfig::default()).is_ok());
    }
}
