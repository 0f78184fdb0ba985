use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatCtxConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: String,
    pub cleaned_dir: String,
    pub out_dir: String,
    pub logs_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: "raw_chats".to_string(),
            cleaned_dir: "cleaned_chats".to_string(),
            out_dir: "out".to_string(),
            logs_dir: "logs".to_string(),
        }
    }
}

impl PathsConfig {
    pub fn raw_dir(&self) -> PathBuf {
        expand(&self.raw_dir)
    }

    pub fn cleaned_dir(&self) -> PathBuf {
        expand(&self.cleaned_dir)
    }

    pub fn out_dir(&self) -> PathBuf {
        expand(&self.out_dir)
    }

    pub fn logs_dir(&self) -> PathBuf {
        expand(&self.logs_dir)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CleanerConfig {
    /// Sender name of the exporting user; every other sender is the peer.
    pub user_name: String,
    pub source: String,
    /// Only `.txt` files whose name contains this (case-insensitive) are read.
    pub input_name_filter: String,
    pub min_content_chars: usize,
    pub filler_words: Vec<String>,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            user_name: "Iomar".to_string(),
            source: "whatsapp".to_string(),
            input_name_filter: "chat".to_string(),
            min_content_chars: 3,
            filler_words: ["ok", "okay", "k", "lol", "yes", "no", "ya", "yep", "nope", "hmm"]
                .iter()
                .map(|w| w.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.x.ai/v1".to_string(),
            model: "grok-4-latest".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            api_key_env: "XAI_API_KEY".to_string(),
        }
    }
}

impl ChatCtxConfig {
    /// Load from an optional TOML file, then apply `CHATCTX__SECTION__KEY`
    /// environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("CHATCTX").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ChatCtxConfig::load("definitely-not-here.toml").unwrap();
        assert_eq!(config.paths.raw_dir, "raw_chats");
        assert_eq!(config.cleaner.min_content_chars, 3);
        assert_eq!(config.llm.model, "grok-4-latest");
        assert_eq!(config.llm.api_key_env, "XAI_API_KEY");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let dir = std::env::temp_dir().join(format!("chatctx-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("partial.toml");
        std::fs::write(
            &path,
            "[cleaner]\nuser_name = \"Maya\"\n\n[llm]\ntimeout_secs = 5\n",
        )
        .unwrap();

        let config = ChatCtxConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.cleaner.user_name, "Maya");
        assert_eq!(config.cleaner.source, "whatsapp");
        assert_eq!(config.llm.timeout_secs, 5);
        assert_eq!(config.llm.base_url, "https://api.x.ai/v1");
        assert_eq!(config.paths.out_dir, "out");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_tilde_is_expanded() {
        let paths = PathsConfig {
            raw_dir: "~/exports".to_string(),
            ..Default::default()
        };
        assert!(!paths.raw_dir().to_string_lossy().starts_with('~'));
    }
}
