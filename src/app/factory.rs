use crate::{
    app::{errors::AppError, service::NotesApp},
    config::Config,
    notes::BackendJson,
    semantic::{OpenAiEmbeddings, SearchOptions, SemanticSearchService},
};
use anyhow::{anyhow, Context, Result};
use homedir::my_home;
use std::sync::Arc;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Create the notes app backed by the configured embedding API.
    ///
    /// Fails early when the API key variable is unset so no search starts
    /// without credentials.
    pub fn create_app(config: &Config) -> Result<NotesApp<OpenAiEmbeddings>, AppError> {
        let semantic_config = &config.semantic_search;
        let api_key = semantic_config
            .api_key()
            .ok_or_else(|| AppError::MissingApiKey(semantic_config.api_key_env.clone()))?;

        let provider = OpenAiEmbeddings::new(semantic_config, &api_key)?;
        log::info!(
            "Using embedding model '{}' at {}",
            provider.model(),
            semantic_config.base_url
        );

        let store = Self::create_store(config)?;
        let engine = SemanticSearchService::from_config(provider, semantic_config);

        Ok(NotesApp::new(
            store,
            engine,
            SearchOptions::from_config(semantic_config),
        ))
    }

    /// Open the JSON note store named in the config.
    pub fn create_store(config: &Config) -> Result<Arc<BackendJson>, AppError> {
        let store = BackendJson::load(&config.notes_path())?;
        Ok(Arc::new(store))
    }

    /// Load configuration from the application base path.
    pub fn create_config() -> Result<Config> {
        let base_path = Self::get_base_path()?;

        // Ensure base directory exists
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Config::load_with(&base_path)
    }

    /// Get the base path for the application
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("NOTESEARCH_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .ok_or_else(|| anyhow!("Home directory path is empty"))?;
        Ok(format!("{}/.local/share/notesearch", home.to_string_lossy()))
    }
}
