//! Browser automation boundary.
//!
//! Defines the [`BrowserLauncher`] and [`BrowserSession`] traits that abstract
//! over the browser engine (currently Chromium via chromiumoxide), plus the
//! [`SessionGuard`] that scopes a session's lifetime.

pub mod chromium;
#[cfg(test)]
pub(crate) mod fake;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// How to find an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// Element `id`
    Id(String),
    /// Element `name` attribute
    Name(String),
    /// Tag name
    Tag(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Self::Css(selector.to_string())
    }

    pub fn id(id: &str) -> Self {
        Self::Id(id.to_string())
    }

    pub fn name(name: &str) -> Self {
        Self::Name(name.to_string())
    }

    pub fn tag(tag: &str) -> Self {
        Self::Tag(tag.to_string())
    }

    /// Equivalent CSS selector
    pub fn to_css(&self) -> String {
        match self {
            Locator::Css(s) => s.clone(),
            Locator::Id(id) => format!("[id=\"{}\"]", id),
            Locator::Name(name) => format!("[name=\"{}\"]", name),
            Locator::Tag(tag) => tag.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::Id(s) => write!(f, "id={}", s),
            Locator::Name(s) => write!(f, "name={}", s),
            Locator::Tag(s) => write!(f, "tag={}", s),
        }
    }
}

/// Opaque reference to an element found in a session.
///
/// Handles are only meaningful to the session that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

/// Elements issued by a session, keyed by handle.
///
/// Cleared whenever the document changes (navigation, history back); handles
/// issued before that resolve to nothing.
#[derive(Debug)]
pub(crate) struct ElementRegistry<T> {
    elements: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Default for ElementRegistry<T> {
    fn default() -> Self {
        Self {
            elements: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<T> ElementRegistry<T> {
    pub(crate) fn issue(&mut self, element: T) -> ElementHandle {
        self.next_id += 1;
        self.elements.insert(self.next_id, element);
        ElementHandle(self.next_id)
    }

    pub(crate) fn get(&self, handle: ElementHandle) -> Option<&T> {
        self.elements.get(&handle.0)
    }

    pub(crate) fn clear(&mut self) {
        self.elements.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }
}

/// Per-session launch options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Save downloads here without prompting; PDFs download instead of opening.
    pub download_dir: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn browsing() -> Self {
        Self::default()
    }

    pub fn downloading_to(dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: Some(dir.into()),
        }
    }
}

/// A browser engine that can start fresh sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Start a new, independent browser session.
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>>;
}

/// One live browser session (a single visible tab).
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate the tab to `url`.
    async fn navigate(&mut self, url: &str) -> Result<()>;
    /// First element matching `locator`, or `ElementNotFound`.
    async fn find_element(&mut self, locator: &Locator) -> Result<ElementHandle>;
    /// All elements matching `locator`, in document order.
    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>>;
    async fn click(&mut self, element: ElementHandle) -> Result<()>;
    async fn send_keys(&mut self, element: ElementHandle, text: &str) -> Result<()>;
    /// Submit the form owning `element`.
    async fn submit(&mut self, element: ElementHandle) -> Result<()>;
    /// Poll for a visible, enabled element until `timeout` elapses.
    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle>;
    /// Resolved attribute value (for `href`, the absolute URL).
    async fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>>;
    /// Serialized DOM of the current page.
    async fn page_source(&mut self) -> Result<String>;
    async fn go_back(&mut self) -> Result<()>;
    /// Tear the session down.
    async fn quit(self: Box<Self>) -> Result<()>;
}

/// Scoped browser session.
///
/// Call [`SessionGuard::close`] on the normal path. If the guard is dropped
/// instead (early return, panic), teardown is spawned on the runtime that
/// opened the session.
pub struct SessionGuard {
    session: Box<dyn BrowserSession>,
    released: bool,
    runtime: Option<tokio::runtime::Handle>,
}

impl SessionGuard {
    /// Launch a session and take ownership of its lifetime.
    pub async fn open(launcher: &dyn BrowserLauncher, options: &LaunchOptions) -> Result<Self> {
        let session = launcher.launch(options).await?;
        debug!(download_dir = ?options.download_dir, "Browser session opened");
        Ok(Self {
            session,
            released: false,
            runtime: tokio::runtime::Handle::try_current().ok(),
        })
    }

    /// Quit the session, reporting teardown errors as warnings.
    pub async fn close(mut self) {
        self.released = true;
        let session = std::mem::replace(&mut self.session, Box::new(Released));
        if let Err(e) = session.quit().await {
            warn!(error = %e, "Browser session did not shut down cleanly");
        } else {
            debug!("Browser session closed");
        }
    }
}

impl Deref for SessionGuard {
    type Target = dyn BrowserSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let session = std::mem::replace(&mut self.session, Box::new(Released));
        match &self.runtime {
            Some(handle) => {
                debug!("Session guard dropped without close, spawning teardown");
                handle.spawn(async move {
                    if let Err(e) = session.quit().await {
                        warn!(error = %e, "Background session teardown failed");
                    }
                });
            }
            None => warn!("Session guard dropped outside a runtime, teardown skipped"),
        }
    }
}

/// Placeholder left behind once a guard has given up its session.
struct Released;

#[async_trait]
impl BrowserSession for Released {
    async fn navigate(&mut self, _url: &str) -> Result<()> {
        Err(released())
    }
    async fn find_element(&mut self, _locator: &Locator) -> Result<ElementHandle> {
        Err(released())
    }
    async fn find_elements(&mut self, _locator: &Locator) -> Result<Vec<ElementHandle>> {
        Err(released())
    }
    async fn click(&mut self, _element: ElementHandle) -> Result<()> {
        Err(released())
    }
    async fn send_keys(&mut self, _element: ElementHandle, _text: &str) -> Result<()> {
        Err(released())
    }
    async fn submit(&mut self, _element: ElementHandle) -> Result<()> {
        Err(released())
    }
    async fn wait_until_clickable(
        &mut self,
        _locator: &Locator,
        _timeout: Duration,
    ) -> Result<ElementHandle> {
        Err(released())
    }
    async fn attribute(&mut self, _element: ElementHandle, _name: &str) -> Result<Option<String>> {
        Err(released())
    }
    async fn page_source(&mut self) -> Result<String> {
        Err(released())
    }
    async fn go_back(&mut self) -> Result<()> {
        Err(released())
    }
    async fn quit(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn released() -> crate::error::ScholarMailError {
    crate::error::ScholarMailError::Browser("session already released".to_string())
}
