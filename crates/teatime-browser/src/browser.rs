//! Browser lifecycle management using Chrome DevTools Protocol

use crate::page::{js_quote, Page};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use teatime_core::{Result, TeatimeError};
use tracing::{debug, info};

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// User agent string
    pub user_agent: Option<String>,
    /// Navigation/element timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 720,
            user_agent: None,
            timeout_seconds: 30,
        }
    }
}

/// Active browser session with Chrome DevTools Protocol
pub struct BrowserSession {
    /// Underlying browser instance (kept alive for tab lifetime)
    #[allow(dead_code)]
    browser: Browser,
    /// Current active tab
    tab: Arc<Tab>,
    /// Configuration
    config: BrowserConfig,
}

impl BrowserSession {
    /// Launch a new browser instance with default configuration.
    pub async fn launch() -> Result<Self> {
        Self::launch_with_config(BrowserConfig::default()).await
    }

    /// Launch browser with custom configuration
    pub async fn launch_with_config(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            config.headless, config.window_width, config.window_height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.window_width, config.window_height)))
            .build()
            .map_err(|e| TeatimeError::Browser(format!("Failed to launch browser: {}", e)))?;

        let user_agent_arg: Option<String> = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| TeatimeError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| TeatimeError::Browser(format!("Failed to create tab: {}", e)))?;

        info!("Browser launched successfully");

        Ok(Self {
            browser,
            tab,
            config,
        })
    }

    /// Connect to an existing browser instance
    ///
    /// # Arguments
    /// * `port` - Chrome DevTools Protocol port (typically 9222)
    pub async fn connect(port: u16) -> Result<Self> {
        info!("Connecting to existing browser on port {}", port);

        let browser = Browser::connect(format!("http://127.0.0.1:{}", port))
            .map_err(|e| TeatimeError::Browser(format!("Failed to connect to browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| TeatimeError::Browser(format!("Failed to create tab: {}", e)))?;

        Ok(Self {
            browser,
            tab,
            config: BrowserConfig::default(),
        })
    }

    /// Default element timeout from the session configuration.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    /// Execute JavaScript in the page context.
    pub async fn evaluate_script(&self, script: &str) -> Result<serde_json::Value> {
        debug!("Evaluating JavaScript ({} bytes)", script.len());

        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| TeatimeError::Script(format!("JavaScript evaluation failed: {}", e)))?;

        Ok(result.value.unwrap_or(serde_json::Value::Null))
    }

    /// Get the current page title
    pub async fn get_title(&self) -> Result<String> {
        let result = self.evaluate_script("document.title").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Full HTML of the current document, for diagnostic dumps.
    pub async fn page_html(&self) -> Result<String> {
        let result = self
            .evaluate_script("document.documentElement.outerHTML")
            .await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    /// Capture a PNG screenshot of the current viewport.
    pub async fn capture_png(&self) -> Result<Vec<u8>> {
        use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;

        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| TeatimeError::Browser(format!("Screenshot failed: {}", e)))
    }

    /// Get reference to the active tab
    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Close the browser session
    pub async fn close(self) -> Result<()> {
        info!("Closing browser session");
        // Browser is dropped and cleaned up with the session
        Ok(())
    }
}

#[async_trait]
impl Page for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);

        self.tab
            .navigate_to(url)
            .map_err(|e| TeatimeError::Navigation(format!("{}: {}", url, e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| TeatimeError::Navigation(format!("timeout for {}: {}", url, e)))?;

        info!("Navigated to {}", url);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        debug!("Reloading current page");

        self.tab
            .reload(false, None)
            .map_err(|e| TeatimeError::Navigation(format!("reload failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| TeatimeError::Navigation(format!("reload timeout: {}", e)))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let result = self.evaluate_script("window.location.href").await?;
        Ok(result.as_str().unwrap_or("").to_string())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.evaluate_script(script).await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        debug!("Clicking {}", selector);

        let element = self
            .tab
            .wait_for_element_with_custom_timeout(selector, self.default_timeout())
            .map_err(|_| TeatimeError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .map_err(|e| TeatimeError::Browser(format!("click on {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        debug!("Filling {}", selector);

        let element = self
            .tab
            .wait_for_element_with_custom_timeout(selector, self.default_timeout())
            .map_err(|_| TeatimeError::ElementNotFound(selector.to_string()))?;
        element
            .click()
            .map_err(|e| TeatimeError::Browser(format!("focus on {} failed: {}", selector, e)))?;
        element
            .type_into(value)
            .map_err(|e| TeatimeError::Browser(format!("typing into {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        debug!("Waiting for element: {} (timeout: {:?})", selector, timeout);

        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map_err(|_| TeatimeError::ElementNotFound(selector.to_string()))?;

        debug!("Element found: {}", selector);
        Ok(())
    }

    async fn count(&self, selector: &str) -> Result<u64> {
        let script = format!("document.querySelectorAll({}).length", js_quote(selector));
        let value = self.evaluate_script(&script).await?;
        value.as_u64().ok_or_else(|| {
            TeatimeError::Script(format!("count({}) returned non-numeric value", selector))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_custom_config() {
        let config = BrowserConfig {
            headless: false,
            window_width: 1920,
            window_height: 1080,
            user_agent: Some("TeatimeBot/1.0".to_string()),
            timeout_seconds: 60,
        };

        assert!(!config.headless);
        assert_eq!(config.window_width, 1920);
        assert!(config.user_agent.is_some());
    }
}
