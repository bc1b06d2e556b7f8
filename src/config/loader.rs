//! Layered configuration: defaults, then the global file, then the project
//! file, then `DECKWEAVER_*` environment variables. Later layers win.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{DeckError, Result};

const ENV_PREFIX: &str = "DECKWEAVER_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, project file and env, in that order
    pub fn load() -> Result<Config> {
        let files = [Self::global_config_path(), Some(Self::project_config_path())];
        let figment = files
            .into_iter()
            .flatten()
            .filter(|path| path.exists())
            .fold(Self::defaults(), |figment, path| {
                debug!(path = %path.display(), "Merging config file");
                figment.merge(Toml::file(path))
            });

        Self::finish(figment)
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    /// Load defaults plus a specific file, still honouring env overrides
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(DeckError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::finish(Self::defaults().merge(Toml::file(path)))
    }

    fn finish(figment: Figment) -> Result<Config> {
        // Only the first underscore separates section from key:
        // DECKWEAVER_JUDGE_API_KEY -> judge.api_key
        let env = Env::prefixed(ENV_PREFIX)
            .lowercase(true)
            .map(|key| key.as_str().replacen('_', ".", 1).into());

        let config: Config = figment
            .merge(env)
            .extract()
            .map_err(|e| DeckError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// `$XDG_CONFIG_HOME/deckweaver`, else `~/.config/deckweaver`
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("deckweaver"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".deckweaver")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// (label, path) for each config file location, global first
    pub fn locations() -> Vec<(&'static str, Option<PathBuf>)> {
        vec![
            ("Global", Self::global_config_path()),
            ("Project", Some(Self::project_config_path())),
        ]
    }

    /// Render a configuration as TOML or JSON (secrets are never serialized)
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| DeckError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Write the default global config, returning its path
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let dir = Self::global_dir().ok_or_else(|| {
            DeckError::Config("Neither XDG_CONFIG_HOME nor HOME is set".to_string())
        })?;
        Self::write_default(&dir, force)
    }

    /// Write the default project config, returning its path
    pub fn init_project(force: bool) -> Result<PathBuf> {
        Self::write_default(&Self::project_dir(), force)
    }

    fn write_default(dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let path = dir.join("config.toml");
        if path.exists() && !force {
            info!(path = %path.display(), "Keeping existing config");
        } else {
            fs::write(&path, STARTER_CONFIG)?;
            info!(path = %path.display(), "Wrote starter config");
        }
        Ok(path)
    }
}

/// Secrets are left to env vars
const STARTER_CONFIG: &str = r#"# deckweaver configuration
# Project settings in .deckweaver/config.toml override the global file.
# Secrets: DECKWEAVER_JUDGE_API_KEY, DECKWEAVER_AGENT_API_KEY, DECKWEAVER_DECK_ACCESS_TOKEN

version = "1.0"

[agent]
kind = "mcp"
endpoint = "http://localhost:8000/mcp"
tool_name = "analyze"
max_steps = 30
timeout_secs = 600

[judge]
provider = "openai"
temperature = 0.0
timeout_secs = 120

[iteration]
max_iterations = 5
confidence_threshold = 0.8
allow_fallback_data = false

[extraction]
require_envelope = false

[chart]
dpi = 150
width_inches = 12.0
height_inches = 4.0

[deck]
enabled = true
export_pdf = true
pdf_dir = "decks"
# template_id = "..."
# folder_id = "..."
# credentials_path = "service-account.json"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[iteration]\nmax_iterations = 3\nconfidence_threshold = 0.6\n\n[deck]\nenabled = false\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.iteration.max_iterations, 3);
        assert!((config.iteration.confidence_threshold - 0.6).abs() < 1e-6);
        assert!(!config.deck.enabled);
        // untouched sections keep defaults
        assert_eq!(config.agent.max_steps, 30);
    }

    #[test]
    fn test_load_from_file_validates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[iteration]\nmax_iterations = 0\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(DeckError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = ConfigLoader::load_from_file(Path::new("/nonexistent/deckweaver.toml"));
        assert!(matches!(result, Err(DeckError::Config(_))));
    }

    #[test]
    fn test_default_toml_parses() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::write_default(temp_dir.path(), false).unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.agent.tool_name, "analyze");
        assert!(config.deck.export_pdf);
    }

    #[test]
    fn test_render_toml_and_json() {
        let config = Config::default();
        let toml_out = ConfigLoader::render(&config, false).unwrap();
        assert!(toml_out.contains("[iteration]"));

        let json_out = ConfigLoader::render(&config, true).unwrap();
        assert!(json_out.contains("\"max_iterations\": 5"));
    }
}
