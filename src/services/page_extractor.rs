use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use url::Url;

use crate::{
    configuration::{BrowserSettings, Pacing},
    domain::source::{ExtractionStrategy, Locator, SourceDescriptor},
};

use super::{BrowserSession, SessionError};

const PAGE_SOURCE_DEBUG_CHARS: usize = 5000;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no element matches {locator}")]
    ElementNotFound { locator: Locator },
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub fn random_delay(pacing: Pacing) -> Duration {
    if pacing.max <= pacing.min {
        return pacing.min;
    }
    rand::thread_rng().gen_range(pacing.min..=pacing.max)
}

/// Pulls the text of one page region out of a browser session.
///
/// Every navigation and every extraction is preceded by a random pause taken
/// from `pacing`.
pub struct PageExtractor<S> {
    session: S,
    pacing: Pacing,
    heading_wait: Duration,
    overlay_id: String,
    loaded: Option<Url>,
}

impl<S: BrowserSession> PageExtractor<S> {
    pub fn new(session: S, settings: &BrowserSettings) -> Self {
        PageExtractor {
            session,
            pacing: settings.pacing(),
            heading_wait: settings.heading_wait(),
            overlay_id: settings.overlay_id.clone(),
            loaded: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.loaded = None;
        self.session.close().await
    }

    async fn pause(&self) {
        let delay = random_delay(self.pacing);
        if delay.is_zero() {
            return;
        }
        log::debug!(
            "Sleeping for {:.2} seconds to mimic human behavior",
            delay.as_secs_f64()
        );
        tokio::time::sleep(delay).await;
    }

    /// Navigates to `url` unless it is already the loaded page.
    pub async fn load(&mut self, url: &Url) -> Result<(), ExtractError> {
        if self.loaded.as_ref() == Some(url) {
            return Ok(());
        }

        log::info!("Navigating to {}", url);
        self.loaded = None;
        self.session.navigate(url.as_str()).await?;
        self.loaded = Some(url.clone());
        self.pause().await;
        log::info!("Page loaded");
        Ok(())
    }

    /// Runs the extraction `source` is configured for.
    pub async fn extract(&mut self, source: &SourceDescriptor) -> Result<String, ExtractError> {
        self.load(&source.url).await?;

        match &source.strategy {
            ExtractionStrategy::Selector(locator) => {
                self.extract_by_selector(&source.url, locator).await
            }
            ExtractionStrategy::HeadingAnchor { heading_id } => {
                self.remove_overlay().await;
                self.extract_by_heading_anchor(&source.url, heading_id)
                    .await
            }
        }
    }

    /// Text of the first element matching `locator`.
    pub async fn extract_by_selector(
        &mut self,
        url: &Url,
        locator: &Locator,
    ) -> Result<String, ExtractError> {
        self.load(url).await?;
        self.pause().await;

        log::info!("Extracting text from element ({})", locator);
        let text = self
            .session
            .find_text(locator)
            .await?
            .ok_or_else(|| ExtractError::ElementNotFound {
                locator: locator.clone(),
            })?;

        log::info!("Extracted {} characters", text.chars().count());
        Ok(text)
    }

    /// Text of the container around the heading with `heading_id`.
    ///
    /// Pages may render the heading late, so this waits for it. A heading that
    /// never shows up yields an empty string instead of an error.
    pub async fn extract_by_heading_anchor(
        &mut self,
        url: &Url,
        heading_id: &str,
    ) -> Result<String, ExtractError> {
        self.load(url).await?;
        self.pause().await;

        log::info!("Finding #{} and its parent container", heading_id);
        self.log_page_ids(heading_id).await;

        if !self
            .session
            .wait_until_present(heading_id, self.heading_wait)
            .await?
        {
            log::error!(
                "#{} did not appear within {}s",
                heading_id,
                self.heading_wait.as_secs()
            );
            return Ok(String::new());
        }

        match self.session.parent_text(heading_id).await? {
            Some(text) => {
                log::info!(
                    "Extracted {} characters from parent of #{}",
                    text.chars().count(),
                    heading_id
                );
                Ok(text)
            }
            None => {
                log::error!("Could not find #{} on the page", heading_id);
                Ok(String::new())
            }
        }
    }

    /// Hides the overlay that covers heading-anchored pages. Best effort.
    pub async fn remove_overlay(&self) {
        let script = format!(
            "var overlay = document.getElementById({id:?});\n\
             if (overlay) {{ overlay.style.display = 'none'; overlay.remove(); }}",
            id = self.overlay_id
        );

        match self.session.execute_script(&script).await {
            Ok(()) => log::info!("Overlay #{} removed (if it existed)", self.overlay_id),
            Err(e) => log::warn!("Could not remove overlay #{}: {}", self.overlay_id, e),
        }
    }

    async fn log_page_ids(&self, target_id: &str) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }

        match self.session.page_source().await {
            Ok(source) => {
                let excerpt: String = source.chars().take(PAGE_SOURCE_DEBUG_CHARS).collect();
                log::debug!("Page source (truncated):\n{}", excerpt);
            }
            Err(e) => log::debug!("Could not read page source: {}", e),
        }

        match self.session.element_ids().await {
            Ok(ids) => log::debug!(
                "{} ids on page, #{} present: {}. Ids: {:?}",
                ids.len(),
                target_id,
                ids.iter().any(|id| id == target_id),
                ids
            ),
            Err(e) => log::debug!("Could not list page ids: {}", e),
        }
    }
}
