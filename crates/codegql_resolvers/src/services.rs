//! Backend services shared by every resolver of a schema.

use codegql_backend::{
    Db, GitserverClient, Highlighter, MemoryDb, MemoryGitserver, PlainHighlighter, Seed,
};
use codegql_core::DEFAULT_MAX_PAGE_SIZE;
use std::sync::Arc;

/// Site-level switches that change resolver behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSettings {
    pub teams_enabled: bool,
    /// Running as the public multi-tenant instance.
    pub dotcom_mode: bool,
    pub max_page_size: usize,
    /// Base URL used for absolute links such as webhook URLs.
    pub external_url: String,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            teams_enabled: true,
            dotcom_mode: false,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            external_url: "http://localhost:3080".to_string(),
        }
    }
}

impl SchemaSettings {
    #[must_use]
    pub fn teams_enabled(mut self, enabled: bool) -> Self {
        self.teams_enabled = enabled;
        self
    }

    #[must_use]
    pub fn dotcom_mode(mut self, dotcom: bool) -> Self {
        self.dotcom_mode = dotcom;
        self
    }

    #[must_use]
    pub fn max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max;
        self
    }

    #[must_use]
    pub fn external_url(mut self, url: impl Into<String>) -> Self {
        self.external_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

/// The backends a schema resolves against.
#[derive(Clone)]
pub struct Services {
    pub db: Arc<dyn Db>,
    pub gitserver: Arc<dyn GitserverClient>,
    pub highlighter: Arc<dyn Highlighter>,
    pub settings: SchemaSettings,
}

impl Services {
    pub fn new(
        db: Arc<dyn Db>,
        gitserver: Arc<dyn GitserverClient>,
        highlighter: Arc<dyn Highlighter>,
    ) -> Self {
        Self {
            db,
            gitserver,
            highlighter,
            settings: SchemaSettings::default(),
        }
    }

    /// In-memory backends populated from `seed`.
    pub fn memory(seed: &Seed) -> Self {
        Self::new(
            Arc::new(MemoryDb::from_seed(seed)),
            Arc::new(MemoryGitserver::from_seed(seed)),
            Arc::new(PlainHighlighter::new()),
        )
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SchemaSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
