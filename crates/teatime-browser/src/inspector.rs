//! Page structure inspector
//!
//! One evaluate call summarizing what the current page is made of. This is
//! the diagnostic of last resort: when the classifier reports Unknown, the
//! summary tells a human which markers the site stopped rendering.

use crate::page::Page;
use serde::{Deserialize, Serialize};
use teatime_core::Result;

/// Structural summary of the current page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageStructure {
    pub url: String,
    pub title: String,
    pub forms: u32,
    pub buttons: u32,
    pub links: u32,
    pub tables: u32,
    pub rows: u32,
    /// Elements whose class mentions "time"
    pub time_markers: u32,
    /// Elements whose class mentions "slot"
    pub slot_markers: u32,
}

impl PageStructure {
    /// Compact one-line rendering for log output.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) forms={} buttons={} links={} tables={} rows={} time={} slot={}",
            self.url,
            self.title,
            self.forms,
            self.buttons,
            self.links,
            self.tables,
            self.rows,
            self.time_markers,
            self.slot_markers
        )
    }
}

const INSPECT_SCRIPT: &str = r#"
(() => {
    const count = (sel) => document.querySelectorAll(sel).length;
    return {
        url: window.location.href,
        title: document.title,
        forms: count('form'),
        buttons: count('button'),
        links: count('a'),
        tables: count('table'),
        rows: count('tr'),
        time_markers: count("[class*='time']"),
        slot_markers: count("[class*='slot']")
    };
})()
"#;

/// Inspect the current page in a single evaluate round-trip.
pub async fn inspect(page: &dyn Page) -> Result<PageStructure> {
    let value = page.evaluate(INSPECT_SCRIPT).await?;
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    struct StructuredPage;

    #[async_trait]
    impl Page for StructuredPage {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            Ok("https://club.example.com/TeeSheet/view/abc/sheet".to_string())
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::json!({
                "url": "https://club.example.com/TeeSheet/view/abc/sheet",
                "title": "Tee Sheet",
                "forms": 24,
                "buttons": 30,
                "links": 12,
                "tables": 1,
                "rows": 25,
                "time_markers": 24,
                "slot_markers": 96
            }))
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
    async fn parses_the_structure_payload() {
        let structure = inspect(&StructuredPage).await.unwrap();
        assert_eq!(structure.forms, 24);
        assert_eq!(structure.slot_markers, 96);
        assert!(structure.summary().contains("Tee Sheet"));
    }
}
