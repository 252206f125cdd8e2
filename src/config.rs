use crate::{
    semantic::{
        BASE_DELAY_MS, DEFAULT_CONCURRENCY, DEFAULT_MODEL, EMBEDDING_DIMENSIONS,
        EMBEDDING_MAX_LENGTH, MAX_RETRIES, MAX_SEARCH_RESULTS, REQUEST_TIMEOUT_SECS,
        SIMILARITY_THRESHOLD,
    },
    storage::{self, StorageManager},
};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_NOTES_FILE: &str = "notes.json";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for semantic search functionality
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Length of vectors produced by `model`
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Embedding input cap in characters
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Default similarity threshold [0.0, 1.0]
    #[serde(default = "default_threshold")]
    pub default_threshold: f32,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Concurrent embedding requests per batch chunk
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,

    /// Attempts per embedding request, first one included
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            dimensions: EMBEDDING_DIMENSIONS,
            max_input_length: EMBEDDING_MAX_LENGTH,
            default_threshold: SIMILARITY_THRESHOLD,
            max_results: MAX_SEARCH_RESULTS,
            batch_concurrency: DEFAULT_CONCURRENCY,
            max_retries: MAX_RETRIES,
            retry_base_delay_ms: BASE_DELAY_MS,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_dimensions() -> usize {
    EMBEDDING_DIMENSIONS
}

fn default_max_input_length() -> usize {
    EMBEDDING_MAX_LENGTH
}

fn default_threshold() -> f32 {
    SIMILARITY_THRESHOLD
}

fn default_max_results() -> usize {
    MAX_SEARCH_RESULTS
}

fn default_batch_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_retries() -> u32 {
    MAX_RETRIES
}

fn default_retry_base_delay_ms() -> u64 {
    BASE_DELAY_MS
}

fn default_request_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

impl SemanticSearchConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.default_threshold) {
            bail!(
                "semantic_search.default_threshold must be between 0.0 and 1.0, got {}",
                self.default_threshold
            );
        }

        for (name, value) in [
            ("dimensions", self.dimensions),
            ("max_input_length", self.max_input_length),
            ("max_results", self.max_results),
            ("batch_concurrency", self.batch_concurrency),
            ("max_retries", self.max_retries as usize),
            ("request_timeout_secs", self.request_timeout_secs as usize),
        ] {
            if value == 0 {
                bail!("semantic_search.{name} must be greater than 0");
            }
        }

        if self.base_url.trim().is_empty() {
            bail!("semantic_search.base_url must not be empty");
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Notes file, relative to the base path
    #[serde(default = "default_notes_file")]
    pub notes_file: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notes_file: default_notes_file(),
            listen_addr: default_listen_addr(),
            semantic_search: SemanticSearchConfig::default(),
            base_path: String::new(),
        }
    }
}

fn default_notes_file() -> String {
    DEFAULT_NOTES_FILE.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.notes_file.trim().is_empty() {
            bail!("notes_file must not be empty");
        }

        self.semantic_search.validate()
    }

    /// Full path of the notes file.
    pub fn notes_path(&self) -> String {
        format!("{}/{}", self.base_path, self.notes_file)
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path)?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            log::info!("Creating default config at {base_path}/{CONFIG_FILE}");
            store.write(CONFIG_FILE, serde_yml::to_string(&Self::default())?.as_bytes())?;
        }

        let config_str =
            String::from_utf8(store.read(CONFIG_FILE)?).context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(&self.base_path)?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(tmp: &tempfile::TempDir) -> String {
        tmp.path().to_str().unwrap().to_string()
    }

    #[test]
    fn test_creates_default_config() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_with(&base(&tmp)).unwrap();

        assert!(tmp.path().join(CONFIG_FILE).exists());
        assert_eq!(config.notes_file, "notes.json");
        assert_eq!(config.semantic_search, SemanticSearchConfig::default());
        assert_eq!(config.notes_path(), format!("{}/notes.json", base(&tmp)));
    }

    #[test]
    fn test_defaults_filled_and_resaved() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic_search:\n  default_threshold: 0.5\n  max_results: 5\n",
        )
        .unwrap();

        let config = Config::load_with(&base(&tmp)).unwrap();
        assert!((config.semantic_search.default_threshold - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.semantic_search.max_results, 5);
        assert_eq!(config.semantic_search.dimensions, 1536);
        assert_eq!(config.semantic_search.batch_concurrency, 10);

        let saved = std::fs::read_to_string(tmp.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("max_input_length"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic_search:\n  default_threshold: 1.5\n",
        )
        .unwrap();

        let err = Config::load_with(&base(&tmp)).unwrap_err();
        assert!(err.to_string().contains("default_threshold"));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "semantic_search:\n  batch_concurrency: 0\n",
        )
        .unwrap();

        let err = Config::load_with(&base(&tmp)).unwrap_err();
        assert!(err.to_string().contains("batch_concurrency"));
    }

    #[test]
    fn test_malformed_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "semantic_search: [").unwrap();
        assert!(Config::load_with(&base(&tmp)).is_err());
    }

    #[test]
    fn test_api_key_from_env() {
        let config = SemanticSearchConfig {
            api_key_env: "NOTESEARCH_TEST_KEY_UNSET_4242".to_string(),
            ..Default::default()
        };
        assert_eq!(config.api_key(), None);
    }
}
