use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::{
    error::WebDriverError, prelude::*, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver,
};
use thiserror::Error;

use crate::{
    configuration::BrowserSettings,
    domain::source::{Locator, SelectorKind},
};

const STEALTH_ARGS: [&str; 3] = [
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
];
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("webdriver error: {0}")]
    WebDriver(#[from] WebDriverError),
    #[error("browser session already closed")]
    Closed,
}

/// The handful of browser operations page extraction needs.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Visible text of the first element matching `locator`, `None` if nothing matches.
    async fn find_text(&self, locator: &Locator) -> Result<Option<String>, SessionError>;

    /// Ids of every element on the page carrying one.
    async fn element_ids(&self) -> Result<Vec<String>, SessionError>;

    async fn page_source(&self) -> Result<String, SessionError>;

    async fn execute_script(&self, script: &str) -> Result<(), SessionError>;

    /// Polls until an element with `id` is in the DOM. `false` on timeout.
    async fn wait_until_present(&self, id: &str, timeout: Duration)
        -> Result<bool, SessionError>;

    /// Visible text of the direct parent of the element with `id`.
    async fn parent_text(&self, id: &str) -> Result<Option<String>, SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

/// A Chrome session driven over WebDriver.
pub struct Droid {
    driver: Option<WebDriver>,
}

impl Droid {
    pub async fn new(settings: &BrowserSettings) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        if settings.headless {
            caps.add_arg("--headless=new")?;
        }
        caps.add_arg(&format!("--user-agent={}", settings.user_agent))?;
        for arg in STEALTH_ARGS {
            caps.add_arg(arg)?;
        }

        log::info!("Starting browser session on {}", settings.webdriver_url);
        let driver = WebDriver::new(settings.webdriver_url.as_str(), caps).await?;
        if settings.window_maximized {
            driver.maximize_window().await?;
        }

        Ok(Droid {
            driver: Some(driver),
        })
    }

    fn driver(&self) -> Result<&WebDriver, SessionError> {
        self.driver.as_ref().ok_or(SessionError::Closed)
    }
}

fn by(locator: &Locator) -> By {
    match locator.kind {
        SelectorKind::Id => By::Id(locator.value.clone()),
        SelectorKind::Class => By::ClassName(locator.value.clone()),
        SelectorKind::Css => By::Css(locator.value.clone()),
    }
}

#[async_trait]
impl BrowserSession for Droid {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.driver()?.goto(url).await?;
        Ok(())
    }

    async fn find_text(&self, locator: &Locator) -> Result<Option<String>, SessionError> {
        let elements = self.driver()?.find_all(by(locator)).await?;
        match elements.first() {
            Some(element) => Ok(Some(element.text().await?)),
            None => Ok(None),
        }
    }

    async fn element_ids(&self) -> Result<Vec<String>, SessionError> {
        let elements = self.driver()?.find_all(By::XPath("//*[@id]")).await?;

        let mut ids = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(id) = element.id().await? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn page_source(&self) -> Result<String, SessionError> {
        Ok(self.driver()?.source().await?)
    }

    async fn execute_script(&self, script: &str) -> Result<(), SessionError> {
        self.driver()?.execute(script, Vec::new()).await?;
        Ok(())
    }

    async fn wait_until_present(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<bool, SessionError> {
        let found = self
            .driver()?
            .query(By::Id(id.to_string()))
            .wait(timeout, POLL_INTERVAL)
            .exists()
            .await?;
        Ok(found)
    }

    async fn parent_text(&self, id: &str) -> Result<Option<String>, SessionError> {
        let elements = self.driver()?.find_all(By::Id(id.to_string())).await?;
        let Some(heading) = elements.first() else {
            return Ok(None);
        };

        let parent = heading.find(By::XPath("./..")).await?;
        Ok(Some(parent.text().await?))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        match self.driver.take() {
            Some(driver) => {
                log::info!("Closing browser session");
                driver.quit().await?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
