use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::FetchError;

/// Where `page(url:)` gets its markup from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Retrieve the raw markup served at `url`.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// In-memory pages keyed by exact URL.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pages: HashMap<String, String>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, markup: impl Into<String>) -> Self {
        self.insert(url, markup);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, markup: impl Into<String>) {
        self.pages.insert(url.into(), markup.into());
    }
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages.get(url).cloned().ok_or(FetchError::NotFound)
    }
}
