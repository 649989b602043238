//! In-memory stand-ins for the browser and the structuring service.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use url::Url;

use crate::{configuration::BrowserSettings, domain::source::Locator};

use super::{BrowserSession, SessionError, Structurer, StructuringError};

pub fn browser_settings() -> BrowserSettings {
    BrowserSettings {
        webdriver_url: "http://localhost:9515".to_string(),
        headless: true,
        user_agent: "test-agent".to_string(),
        window_maximized: false,
        min_delay_ms: 0,
        max_delay_ms: 0,
        heading_wait_secs: 10,
        overlay_id: "menu-overlay".to_string(),
    }
}

fn page_key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    selectors: HashMap<String, String>,
    headings: HashMap<String, String>,
}

impl FakePage {
    pub fn with_selector(mut self, locator: &Locator, text: &str) -> Self {
        self.selectors.insert(locator.to_string(), text.to_string());
        self
    }

    /// A heading with `id` whose parent container renders `parent_text`.
    pub fn with_heading(mut self, id: &str, parent_text: &str) -> Self {
        self.headings.insert(id.to_string(), parent_text.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    navigations: Vec<String>,
    scripts: Mutex<Vec<String>>,
    lookups: AtomicUsize,
    wait_timeouts: Mutex<Vec<Duration>>,
    fail_scripts: bool,
    closed: usize,
}

impl FakeSession {
    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(page_key(url), page);
        self
    }

    pub fn failing_scripts(mut self) -> Self {
        self.fail_scripts = true;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// Number of element lookups (selector or heading parent) performed.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Timeouts passed to `wait_until_present`, in call order.
    pub fn wait_timeouts(&self) -> Vec<Duration> {
        self.wait_timeouts.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        self.closed
    }

    fn page(&self) -> Option<&FakePage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.navigations.push(url.to_string());
        let key = page_key(url);
        if !self.pages.contains_key(&key) {
            self.current = None;
            return Err(SessionError::Closed);
        }
        self.current = Some(key);
        Ok(())
    }

    async fn find_text(&self, locator: &Locator) -> Result<Option<String>, SessionError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .page()
            .and_then(|page| page.selectors.get(&locator.to_string()).cloned()))
    }

    async fn element_ids(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .page()
            .map(|page| page.headings.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn page_source(&self) -> Result<String, SessionError> {
        Ok("<html><body></body></html>".to_string())
    }

    async fn execute_script(&self, script: &str) -> Result<(), SessionError> {
        self.scripts.lock().unwrap().push(script.to_string());
        if self.fail_scripts {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    async fn wait_until_present(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<bool, SessionError> {
        self.wait_timeouts.lock().unwrap().push(timeout);
        Ok(self.page().is_some_and(|page| page.headings.contains_key(id)))
    }

    async fn parent_text(&self, id: &str) -> Result<Option<String>, SessionError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.page().and_then(|page| page.headings.get(id).cloned()))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.closed += 1;
        self.current = None;
        Ok(())
    }
}

/// Answers every request with the same response and counts the calls.
#[derive(Debug, Clone)]
pub struct StubStructurer {
    response: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl StubStructurer {
    pub fn responding(response: &str) -> Self {
        StubStructurer {
            response: Some(response.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        StubStructurer {
            response: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Structurer for StubStructurer {
    async fn structure(&self, _text: &str) -> Result<String, StructuringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or(StructuringError::EmptyResponse)
    }
}
