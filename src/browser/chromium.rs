//! Chromium-backed sessions using chromiumoxide.

use super::{BrowserLauncher, BrowserSession, ElementHandle, ElementRegistry, LaunchOptions, Locator};
use crate::config::BrowserSettings;
use crate::error::{OptionExt, Result, ScholarMailError};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Upper bound on a single page navigation
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval for `wait_until_clickable`
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Find the Chromium binary path.
pub fn find_chromium(settings: &BrowserSettings) -> Option<PathBuf> {
    if let Some(path) = &settings.chrome_executable {
        return Some(path.clone());
    }

    if let Ok(p) = std::env::var("SCHOLARMAIL_CHROME") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one Chromium process per session.
///
/// Every session of a launcher shares one profile directory, so cookies and
/// a verification solved in one session carry over to the next. Sessions
/// must not overlap in time.
pub struct ChromiumLauncher {
    settings: BrowserSettings,
    profile_dir: PathBuf,
    _temp_profile: Option<TempDir>,
}

impl ChromiumLauncher {
    /// Uses `settings.user_data_dir` when set, otherwise a temporary profile
    /// that lives as long as the launcher.
    pub fn new(settings: BrowserSettings) -> Result<Self> {
        let (profile_dir, temp_profile) = match &settings.user_data_dir {
            Some(dir) => (dir.clone(), None),
            None => {
                let temp = TempDir::new()?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };
        debug!(profile = ?profile_dir, "Browser profile selected");
        Ok(Self {
            settings,
            profile_dir,
            _temp_profile: temp_profile,
        })
    }

    pub fn profile_dir(&self) -> &Path {
        &self.profile_dir
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
        let chrome_path = find_chromium(&self.settings).ok_or_else(|| {
            ScholarMailError::Config("Chrome/Chromium not found; set browser.chrome_executable".to_string())
        })?;

        let profile_dir = &self.profile_dir;
        if let Some(dir) = &options.download_dir {
            write_download_preferences(profile_dir, dir)?;
        }

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile_dir)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if !self.settings.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| ScholarMailError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScholarMailError::Browser(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        if let Some(dir) = &options.download_dir {
            let params = SetDownloadBehaviorParams::builder()
                .behavior(SetDownloadBehaviorBehavior::Allow)
                .download_path(dir.to_string_lossy().to_string())
                .build()
                .map_err(ScholarMailError::Browser)?;
            browser
                .execute(params)
                .await
                .map_err(|e| ScholarMailError::Browser(format!("setDownloadBehavior failed: {e}")))?;
        }

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScholarMailError::Browser(format!("failed to open page: {e}")))?;

        debug!(profile = ?profile_dir, download_dir = ?options.download_dir, "Chromium launched");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            elements: ElementRegistry::default(),
        }))
    }
}

/// Merge download settings into `<profile>/Default/Preferences`: save
/// downloads silently and keep PDFs out of the built-in viewer. Every other
/// preference in an existing file is kept.
fn write_download_preferences(profile_dir: &Path, download_dir: &Path) -> Result<()> {
    let default_dir = profile_dir.join("Default");
    std::fs::create_dir_all(&default_dir)?;
    let path = default_dir.join("Preferences");

    let mut prefs = match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) if value.is_object() => value,
            Ok(_) | Err(_) => {
                warn!(path = ?path, "Unreadable Chrome preferences, starting from empty");
                serde_json::json!({})
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::json!({}),
        Err(e) => return Err(e.into()),
    };

    set_preference(
        &mut prefs,
        &["download", "default_directory"],
        serde_json::Value::from(download_dir.to_string_lossy().to_string()),
    );
    set_preference(&mut prefs, &["download", "prompt_for_download"], false.into());
    set_preference(&mut prefs, &["plugins", "always_open_pdf_externally"], true.into());

    std::fs::write(&path, serde_json::to_vec(&prefs)?)?;
    Ok(())
}

/// Set a nested key, replacing any non-object value on the way.
fn set_preference(prefs: &mut serde_json::Value, path: &[&str], value: serde_json::Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = prefs;
    for key in parents {
        if !node.is_object() {
            *node = serde_json::json!({});
        }
        node = &mut node[*key];
    }
    if !node.is_object() {
        *node = serde_json::json!({});
    }
    node[*last] = value;
}

fn browser_err(action: &str, e: impl std::fmt::Display) -> ScholarMailError {
    ScholarMailError::Browser(format!("{action}: {e}"))
}

/// A Chromium process with one tab.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    elements: ElementRegistry<Element>,
}

impl ChromiumSession {
    fn issue(&mut self, element: Element) -> ElementHandle {
        self.elements.issue(element)
    }

    fn element(&self, handle: ElementHandle) -> Result<&Element> {
        self.elements.get(handle).ok_or_not_found("element handle")
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        // Handles from the previous document are dead after navigation
        self.elements.clear();
        match tokio::time::timeout(NAVIGATION_TIMEOUT, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(browser_err("navigation failed", e)),
            Err(_) => Err(ScholarMailError::Timeout(NAVIGATION_TIMEOUT.as_millis() as u64)),
        }
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<ElementHandle> {
        let element = self
            .page
            .find_element(locator.to_css())
            .await
            .map_err(|_| ScholarMailError::ElementNotFound(locator.to_string()))?;
        Ok(self.issue(element))
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        let elements = self
            .page
            .find_elements(locator.to_css())
            .await
            .map_err(|e| browser_err("find_elements failed", e))?;
        Ok(elements.into_iter().map(|e| self.issue(e)).collect())
    }

    async fn click(&mut self, element: ElementHandle) -> Result<()> {
        self.element(element)?
            .click()
            .await
            .map_err(|e| browser_err("click failed", e))?;
        Ok(())
    }

    async fn send_keys(&mut self, element: ElementHandle, text: &str) -> Result<()> {
        let element = self.element(element)?;
        element.click().await.map_err(|e| browser_err("focus failed", e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| browser_err("typing failed", e))?;
        Ok(())
    }

    async fn submit(&mut self, element: ElementHandle) -> Result<()> {
        self.element(element)?
            .press_key("Enter")
            .await
            .map_err(|e| browser_err("submit failed", e))?;
        Ok(())
    }

    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        let css = locator.to_css();
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(css.clone()).await {
                if element.clickable_point().await.is_ok() {
                    return Ok(self.issue(element));
                }
            }
            if Instant::now() >= deadline {
                return Err(ScholarMailError::Timeout(timeout.as_millis() as u64));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        let element = self.element(element)?;
        // Properties give resolved values (absolute hrefs); fall back to the raw attribute
        if let Ok(Some(serde_json::Value::String(value))) = element.property(name).await {
            return Ok(Some(value));
        }
        element
            .attribute(name)
            .await
            .map_err(|e| browser_err("attribute lookup failed", e))
    }

    async fn page_source(&mut self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| browser_err("failed to read page source", e))
    }

    async fn go_back(&mut self) -> Result<()> {
        debug!(released = self.elements.len(), "Releasing element handles before history back");
        self.elements.clear();
        self.page
            .evaluate("window.history.back()")
            .await
            .map_err(|e| browser_err("history.back failed", e))?;
        Ok(())
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        let mut this = *self;
        this.elements.clear();
        let closed = this.browser.close().await;
        if let Err(e) = this.browser.wait().await {
            warn!(error = %e, "Chromium process did not exit cleanly");
        }
        this.handler_task.abort();
        closed.map_err(|e| browser_err("browser close failed", e))?;
        Ok(())
    }
}
