//! The page seam between the booking engine and a live browser
//!
//! The engine never holds a browser handle; it works against `&dyn Page`.
//! Query helpers have default implementations in terms of [`Page::evaluate`],
//! so a scripted fake only needs to answer JavaScript with canned JSON.

use async_trait::async_trait;
use std::time::Duration;
use teatime_core::{Result, TeatimeError};

/// Escape a string for embedding in a single-quoted JavaScript literal.
pub fn js_quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('\'');
    for c in raw.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// One rendered page of the target site.
///
/// Implemented by [`crate::BrowserSession`] for a live Chrome tab, and by
/// scripted fakes in engine tests.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait until the document has loaded.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the current page (used when extraction finds a partial load).
    async fn reload(&self) -> Result<()>;

    /// Current URL as the browser sees it.
    async fn current_url(&self) -> Result<String>;

    /// Execute JavaScript in the page context, returning its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Click the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Type a value into the first element matching the selector.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Block until an element matching the selector is present.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Number of elements matching the selector.
    async fn count(&self, selector: &str) -> Result<u64> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_quote(selector)
        );
        let value = self.evaluate(&script).await?;
        value.as_u64().ok_or_else(|| {
            TeatimeError::Script(format!("count({}) returned non-numeric value", selector))
        })
    }

    /// Whether at least one element matches the selector.
    async fn element_exists(&self, selector: &str) -> bool {
        matches!(self.count(selector).await, Ok(n) if n > 0)
    }

    /// Text content of the first matching element, `None` when absent.
    async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.textContent : null; }})()",
            js_quote(selector)
        );
        let value = self.evaluate(&script).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_quote_escapes() {
        assert_eq!(js_quote("a"), "'a'");
        assert_eq!(js_quote("it's"), r"'it\'s'");
        assert_eq!(js_quote(r"back\slash"), r"'back\\slash'");
    }

    struct CountingPage;

    #[async_trait]
    impl Page for CountingPage {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok("about:blank".to_string())
        }
        async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
            if script.contains("querySelectorAll") {
                Ok(serde_json::json!(3))
            } else {
                Ok(serde_json::json!("7:30 AM"))
            }
        }
        async fn click(&self, _selector: &str) -> Result<()> {
            Ok(())
        }
        async fn fill(&self, _selector: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn default_helpers_go_through_evaluate() {
        let page = CountingPage;
        assert_eq!(page.count("tr").await.unwrap(), 3);
        assert!(page.element_exists("tr").await);
        assert_eq!(
            page.text_of(".slotTime b").await.unwrap().as_deref(),
            Some("7:30 AM")
        );
    }
}
