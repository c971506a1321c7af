//! Scripted in-memory browser used by the acquisition tests.
//!
//! Models just enough of Google Scholar (home page, result list, profile,
//! article detail pages, challenges, downloads) to drive the navigator,
//! enumerator and downloader without a real browser.

use super::{BrowserLauncher, BrowserSession, ElementHandle, ElementRegistry, LaunchOptions, Locator};
use crate::error::{Result, ScholarMailError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A file that appears in the download directory once its URL has been
/// visited `appears_on_visit` times.
#[derive(Debug, Clone)]
pub(crate) struct FakeDownload {
    pub file_name: String,
    pub appears_on_visit: u32,
}

/// The simulated site.
#[derive(Debug, Clone)]
pub(crate) struct FakeScholar {
    pub home_url: String,
    pub profile_exists: bool,
    /// Failed profile-link lookups before the link shows up
    pub profile_challenges: u32,
    pub verification_present: bool,
    /// Profile-link clicks intercepted (e.g. by an overlay) before one lands
    pub profile_click_failures: u32,
    /// Anchor hrefs on each article's detail page
    pub articles: Vec<Vec<Option<String>>>,
    pub downloads: HashMap<String, FakeDownload>,
    pub failing_navigation: HashSet<String>,
    pub fail_launch: bool,
}

impl Default for FakeScholar {
    fn default() -> Self {
        Self {
            home_url: crate::config::DEFAULT_SCHOLAR_URL.to_string(),
            profile_exists: true,
            profile_challenges: 0,
            verification_present: false,
            profile_click_failures: 0,
            articles: Vec::new(),
            downloads: HashMap::new(),
            failing_navigation: HashSet::new(),
            fail_launch: false,
        }
    }
}

impl FakeScholar {
    pub fn with_articles(articles: Vec<Vec<&str>>) -> Self {
        Self {
            articles: articles
                .into_iter()
                .map(|hrefs| hrefs.into_iter().map(|h| Some(h.to_string())).collect())
                .collect(),
            ..Self::default()
        }
    }

    pub fn download(mut self, url: &str, file_name: &str, appears_on_visit: u32) -> Self {
        self.downloads.insert(
            url.to_string(),
            FakeDownload {
                file_name: file_name.to_string(),
                appears_on_visit,
            },
        );
        self
    }
}

#[derive(Debug, Default)]
struct FakeState {
    launches: Vec<LaunchOptions>,
    quits: u32,
    interactions: u32,
    profile_lookups: u32,
    profile_clicks: u32,
    verification_clicks: u32,
    typed: Vec<String>,
    visits: HashMap<String, u32>,
    article_clicks: Vec<usize>,
}

/// Launcher over a shared [`FakeScholar`]; counters survive across sessions.
#[derive(Clone)]
pub(crate) struct FakeWeb {
    site: Arc<FakeScholar>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeWeb {
    pub fn new(site: FakeScholar) -> Self {
        Self {
            site: Arc::new(site),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake browser state poisoned")
    }

    pub fn launches(&self) -> usize {
        self.state().launches.len()
    }

    pub fn launch_options(&self) -> Vec<LaunchOptions> {
        self.state().launches.clone()
    }

    pub fn quits(&self) -> u32 {
        self.state().quits
    }

    pub fn interactions(&self) -> u32 {
        self.state().interactions
    }

    pub fn profile_lookups(&self) -> u32 {
        self.state().profile_lookups
    }

    pub fn profile_clicks(&self) -> u32 {
        self.state().profile_clicks
    }

    pub fn verification_clicks(&self) -> u32 {
        self.state().verification_clicks
    }

    pub fn typed(&self) -> Vec<String> {
        self.state().typed.clone()
    }

    pub fn visits(&self, url: &str) -> u32 {
        self.state().visits.get(url).copied().unwrap_or(0)
    }

    pub fn article_clicks(&self) -> Vec<usize> {
        self.state().article_clicks.clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeWeb {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>> {
        if self.site.fail_launch {
            return Err(ScholarMailError::Browser("fake launch failure".to_string()));
        }
        self.state().launches.push(options.clone());
        Ok(Box::new(FakeSession {
            web: self.clone(),
            download_dir: options.download_dir.clone(),
            page: FakePage::Blank,
            elements: ElementRegistry::default(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FakePage {
    Blank,
    Home,
    Results,
    Profile,
    Article(usize),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FakeElement {
    SearchBox,
    ProfileLink,
    Article(usize),
    Anchor(usize, usize),
    Verification,
}

struct FakeSession {
    web: FakeWeb,
    download_dir: Option<PathBuf>,
    page: FakePage,
    elements: ElementRegistry<FakeElement>,
}

impl FakeSession {
    fn touch(&self) {
        self.web.state().interactions += 1;
    }

    fn issue(&mut self, element: FakeElement) -> ElementHandle {
        self.elements.issue(element)
    }

    fn resolve(&self, handle: ElementHandle) -> Result<FakeElement> {
        self.elements
            .get(handle)
            .copied()
            .ok_or_else(|| ScholarMailError::Browser(format!("stale handle {:?}", handle)))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.touch();
        self.elements.clear();
        let visit = {
            let mut state = self.web.state();
            let count = state.visits.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let site = Arc::clone(&self.web.site);

        if site.failing_navigation.contains(url) {
            return Err(ScholarMailError::Browser(format!("net::ERR_FAILED at {}", url)));
        }

        if url == site.home_url {
            self.page = FakePage::Home;
            return Ok(());
        }

        if let Some(download) = site.downloads.get(url) {
            if visit >= download.appears_on_visit {
                if let Some(dir) = &self.download_dir {
                    std::fs::write(dir.join(&download.file_name), b"%PDF-1.4")?;
                }
            }
        }
        self.page = FakePage::Other;
        Ok(())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<ElementHandle> {
        self.touch();
        match (&self.page, locator) {
            (FakePage::Home, Locator::Name(n)) if n == "q" => Ok(self.issue(FakeElement::SearchBox)),
            (FakePage::Results, Locator::Css(s)) if s == "h4.gs_rt2 a" => {
                let lookups = {
                    let mut state = self.web.state();
                    state.profile_lookups += 1;
                    state.profile_lookups
                };
                let site = &self.web.site;
                if site.profile_exists && lookups > site.profile_challenges {
                    Ok(self.issue(FakeElement::ProfileLink))
                } else {
                    Err(ScholarMailError::ElementNotFound(locator.to_string()))
                }
            }
            _ => Err(ScholarMailError::ElementNotFound(locator.to_string())),
        }
    }

    async fn find_elements(&mut self, locator: &Locator) -> Result<Vec<ElementHandle>> {
        self.touch();
        let site = Arc::clone(&self.web.site);
        let found = match (&self.page, locator) {
            (FakePage::Profile, Locator::Css(s)) if s == ".gsc_a_at" => (0..site.articles.len())
                .map(FakeElement::Article)
                .collect(),
            (FakePage::Article(i), Locator::Tag(t)) if t == "a" => (0..site.articles[*i].len())
                .map(|j| FakeElement::Anchor(*i, j))
                .collect(),
            _ => Vec::new(),
        };
        Ok(found.into_iter().map(|e| self.issue(e)).collect())
    }

    async fn click(&mut self, element: ElementHandle) -> Result<()> {
        self.touch();
        match self.resolve(element)? {
            FakeElement::ProfileLink => {
                let clicks = {
                    let mut state = self.web.state();
                    state.profile_clicks += 1;
                    state.profile_clicks
                };
                if clicks <= self.web.site.profile_click_failures {
                    return Err(ScholarMailError::Browser(
                        "click intercepted by overlay".to_string(),
                    ));
                }
                self.page = FakePage::Profile;
            }
            FakeElement::Article(i) => {
                self.web.state().article_clicks.push(i);
                self.page = FakePage::Article(i);
            }
            FakeElement::Verification => self.web.state().verification_clicks += 1,
            FakeElement::SearchBox | FakeElement::Anchor(..) => {}
        }
        Ok(())
    }

    async fn send_keys(&mut self, element: ElementHandle, text: &str) -> Result<()> {
        self.touch();
        self.resolve(element)?;
        self.web.state().typed.push(text.to_string());
        Ok(())
    }

    async fn submit(&mut self, element: ElementHandle) -> Result<()> {
        self.touch();
        if self.resolve(element)? == FakeElement::SearchBox {
            self.page = FakePage::Results;
        }
        Ok(())
    }

    async fn wait_until_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle> {
        self.touch();
        match locator {
            Locator::Id(id) if id == "recaptcha-anchor" && self.web.site.verification_present => {
                Ok(self.issue(FakeElement::Verification))
            }
            _ => Err(ScholarMailError::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>> {
        self.touch();
        match (self.resolve(element)?, name) {
            (FakeElement::Anchor(i, j), "href") => Ok(self.web.site.articles[i][j].clone()),
            _ => Ok(None),
        }
    }

    async fn page_source(&mut self) -> Result<String> {
        self.touch();
        if self.web.site.verification_present {
            Ok(r#"<html><body><div id="recaptcha-anchor" role="checkbox"></div></body></html>"#
                .to_string())
        } else {
            Ok("<html><body><div id=\"gs_res_ccl\"></div></body></html>".to_string())
        }
    }

    async fn go_back(&mut self) -> Result<()> {
        self.touch();
        self.elements.clear();
        self.page = match self.page {
            FakePage::Article(_) => FakePage::Profile,
            FakePage::Profile => FakePage::Results,
            FakePage::Results => FakePage::Home,
            _ => FakePage::Blank,
        };
        Ok(())
    }

    async fn quit(self: Box<Self>) -> Result<()> {
        self.web.state().quits += 1;
        Ok(())
    }
}
