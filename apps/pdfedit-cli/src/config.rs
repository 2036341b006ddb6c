//! Engine configuration loading
//!
//! The TOML file mirrors `EngineConfig`; every key is optional:
//!
//! ```toml
//! recompress_streams = true
//!
//! [matcher]
//! index_weight = 10.0
//! normalization_penalty = 1.0
//! global_search = true
//! ```

use anyhow::Context;
use pdfedit_core::EngineConfig;
use std::fs;
use std::path::Path;

/// Load configuration from a TOML file
pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<EngineConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    from_str(&content)
}

pub fn from_str(s: &str) -> anyhow::Result<EngineConfig> {
    toml::from_str(s).context("Failed to parse TOML configuration")
}

/// Command-line flags that take precedence over the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub no_global_search: bool,
    pub uncompressed: bool,
}

pub fn resolve(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<EngineConfig> {
    let mut config = match path {
        Some(path) => from_file(path)?,
        None => EngineConfig::default(),
    };
    if overrides.no_global_search {
        config.matcher.global_search = false;
    }
    if overrides.uncompressed {
        config.recompress_streams = false;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_empty_config() {
        assert_eq!(from_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            recompress_streams = false

            [matcher]
            index_weight = 4.0
        "#;

        let config = from_str(toml).unwrap();
        assert!(!config.recompress_streams);
        assert_eq!(config.matcher.index_weight, 4.0);
        assert_eq!(config.matcher.normalization_penalty, 1.0);
        assert!(config.matcher.global_search);
    }

    #[test]
    fn test_invalid_toml_has_context() {
        let err = from_str("[matcher\nindex_weight = 1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = from_file("/nonexistent/pdfedit.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pdfedit.toml"));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = resolve(
            None,
            Overrides {
                no_global_search: true,
                uncompressed: true,
            },
        )
        .unwrap();
        assert!(!config.matcher.global_search);
        assert!(!config.recompress_streams);
    }
}
