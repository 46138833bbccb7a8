//! Browser capability backed by plain HTTP requests.
//!
//! Pages are fetched with `reqwest`; the session comes from a cookie file in
//! the profile directory. "Interactive" here means a human refreshes that
//! file (for example by exporting cookies after signing in elsewhere) while
//! the scrape waits. The cookie file is re-read on every navigation.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, info, warn};

use ordex_core::{BrowserContext, BrowserError, BrowserLauncher, BrowserPage, LaunchMode};

pub const COOKIE_FILE: &str = "cookies.txt";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Default)]
pub struct HttpLauncher;

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(
        &self,
        profile: &Path,
        mode: LaunchMode,
    ) -> Result<Box<dyn BrowserContext>, BrowserError> {
        fs::create_dir_all(profile).map_err(|e| BrowserError::Launch(e.to_string()))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(Policy::limited(10))
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let cookie_file = profile.join(COOKIE_FILE);
        if mode.is_interactive() {
            info!(
                "Interactive session: refresh {} when asked to sign in",
                cookie_file.display()
            );
        }
        Ok(Box::new(HttpContext {
            client,
            cookie_file,
        }))
    }
}

struct HttpContext {
    client: Client,
    cookie_file: PathBuf,
}

#[async_trait]
impl BrowserContext for HttpContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            cookie_file: self.cookie_file.clone(),
            loaded: None,
        }))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

struct HttpPage {
    client: Client,
    cookie_file: PathBuf,
    /// Final URL and body of the last navigation.
    loaded: Option<(String, String)>,
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let navigation = |reason: String| BrowserError::Navigation {
            url: url.to_string(),
            reason,
        };

        let mut request = self.client.get(url);
        if let Some(cookies) = cookie_header(&self.cookie_file) {
            request = request.header(COOKIE, cookies);
        }

        let response = request.send().await.map_err(|e| navigation(e.to_string()))?;
        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(navigation(format!("HTTP {}", status)));
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| navigation(e.to_string()))?;
        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        self.loaded = Some((final_url, body));
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.loaded
            .as_ref()
            .map(|(_, body)| body.clone())
            .ok_or_else(|| BrowserError::Content("no page loaded".to_string()))
    }

    async fn url(&self) -> Result<String, BrowserError> {
        self.loaded
            .as_ref()
            .map(|(url, _)| url.clone())
            .ok_or_else(|| BrowserError::Content("no page loaded".to_string()))
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        self.loaded = None;
        Ok(())
    }
}

/// Build a `Cookie` header from the cookie file.
///
/// Accepts `name=value` lines, a single `Cookie:` header line, or Netscape
/// `cookies.txt` rows. Blank lines and `#` comments are skipped.
pub fn cookie_header(path: &Path) -> Option<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };

    let mut pairs = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(header) = line.strip_prefix("Cookie:") {
            pairs.push(header.trim().to_string());
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() == 7 {
            pairs.push(format!("{}={}", fields[5], fields[6]));
        } else if line.contains('=') {
            pairs.push(line.to_string());
        }
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cookie_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cookie_header(&dir.path().join(COOKIE_FILE)), None);
    }

    #[test]
    fn test_cookie_formats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COOKIE_FILE);
        fs::write(
            &path,
            "# exported\n\
             session-id=123\n\
             .shop.test\tTRUE\t/\tTRUE\t0\tat-main\tabc\n\
             \n",
        )
        .unwrap();
        assert_eq!(
            cookie_header(&path).as_deref(),
            Some("session-id=123; at-main=abc")
        );

        fs::write(&path, "Cookie: a=1; b=2\n").unwrap();
        assert_eq!(cookie_header(&path).as_deref(), Some("a=1; b=2"));
    }

    #[tokio::test]
    async fn test_page_before_navigation() {
        let dir = tempfile::tempdir().unwrap();
        let context = HttpLauncher
            .launch(dir.path(), LaunchMode::Headless)
            .await
            .unwrap();
        let page = context.new_page().await.unwrap();
        assert!(page.content().await.is_err());
        assert!(page.url().await.is_err());
    }
}
