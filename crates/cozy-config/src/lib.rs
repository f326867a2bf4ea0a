use cozy_engine::keymap::{History, Keymap, KeymapError, Platform, cozy_keymap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// Editor settings read from `config.toml`.
///
/// ```toml
/// platform = "mac"
/// log_level = "debug"
/// document_path = "~/notes/today.json"
/// unbind = ["ArrowRight"]
///
/// [bindings]
/// "Mod-u" = "lift_list_item"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Resolves `Mod` in chords. Defaults to the platform we run on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// `env_logger` filter used when `RUST_LOG` is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    /// Document opened when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_path: Option<PathBuf>,
    /// Chords to remove from the default bindings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unbind: Vec<String>,
    /// Chord to command name, applied over the default bindings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, String>,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content =
            std::fs::read_to_string(config_path).map_err(|source| ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        config.document_path = config
            .document_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/cozy-editor");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn platform(&self) -> Platform {
        self.platform.unwrap_or_else(Platform::current)
    }

    /// The editor key bindings with this config's removals and overrides
    /// applied, in that order.
    pub fn keymap(&self, history: Option<History>) -> Result<Keymap, KeymapError> {
        let mut keymap = cozy_keymap(self.platform(), history);
        for chord in &self.unbind {
            keymap.unbind(chord)?;
        }
        for (chord, name) in &self.bindings {
            keymap.rebind(chord, name)?;
        }
        Ok(keymap)
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;
    use tempfile::TempDir;

    // ==== paths ====

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/cozy-editor/config.toml"));
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let expanded = Config::expand_path(Path::new("~/docs/today.json")).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("docs/today.json"));
    }

    #[test]
    fn test_expand_path_with_env_var() {
        unsafe {
            env::set_var("COZY_TEST_DOCS", "/test/env/docs");
        }

        let expanded = Config::expand_path(Path::new("$COZY_TEST_DOCS/today.json"));
        assert_eq!(expanded, Some(PathBuf::from("/test/env/docs/today.json")));

        unsafe {
            env::remove_var("COZY_TEST_DOCS");
        }
    }

    #[test]
    fn test_expand_path_with_unset_var_fails() {
        assert_eq!(Config::expand_path(Path::new("$COZY_TEST_NEVER_SET/x")), None);
    }

    // ==== load and save ====

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nonexistent.toml");

        assert!(Config::load_from_path(&missing).unwrap().is_none());
    }

    #[test]
    fn test_load_empty_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "").unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "platform = \"amiga\"\n").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_load_expands_document_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "document_path = \"~/notes/today.json\"\n").unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();
        let document_path = config.document_path.unwrap();
        assert!(!document_path.to_string_lossy().starts_with('~'));
        assert!(document_path.ends_with("notes/today.json"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let config = Config {
            platform: Some(Platform::Mac),
            log_level: Some("debug".to_string()),
            document_path: Some(PathBuf::from("/tmp/today.json")),
            unbind: vec!["ArrowRight".to_string()],
            bindings: BTreeMap::from([("Mod-u".to_string(), "lift_list_item".to_string())]),
        };

        config.save_to_path(&config_file).unwrap();
        let loaded = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    // ==== key bindings ====

    #[test]
    fn test_keymap_applies_overrides() {
        let config: Config = toml::from_str(
            r#"
platform = "other"
unbind = ["ArrowRight"]

[bindings]
"Mod-u" = "lift_list_item"
"#,
        )
        .unwrap();

        let keymap = config.keymap(None).unwrap();
        assert_eq!(keymap.binding("Ctrl-u"), Some("lift_list_item"));
        assert_eq!(keymap.binding("ArrowRight"), None);
        assert_eq!(keymap.binding("Enter"), Some("enter"));
    }

    #[test]
    fn test_keymap_rejects_unknown_command() {
        let config = Config {
            platform: Some(Platform::Other),
            bindings: BTreeMap::from([("Mod-u".to_string(), "frobnicate".to_string())]),
            ..Config::default()
        };

        assert_eq!(
            config.keymap(None).unwrap_err(),
            KeymapError::UnknownCommand("frobnicate".to_string())
        );
    }

    #[test]
    fn test_platform_defaults_to_current() {
        assert_eq!(Config::default().platform(), Platform::current());
    }
}
