//! Browser capability consumed by the orchestrator.
//!
//! The orchestrator never talks to a concrete browser; it launches a
//! profile-scoped context through a [`BrowserLauncher`] and drives a single
//! page from it.

use std::path::Path;

use async_trait::async_trait;

use crate::error::BrowserError;

/// Whether the browser window is shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    Headless,
    Interactive,
}

impl LaunchMode {
    pub fn is_interactive(&self) -> bool {
        matches!(self, LaunchMode::Interactive)
    }
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Open a persistent context backed by the profile directory.
    async fn launch(
        &self,
        profile: &Path,
        mode: LaunchMode,
    ) -> Result<Box<dyn BrowserContext>, BrowserError>;
}

#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the page to load.
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Fully rendered page content.
    async fn content(&self) -> Result<String, BrowserError>;

    /// URL after redirects.
    async fn url(&self) -> Result<String, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;
}
