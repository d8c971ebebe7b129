//! Diagnostic artifact capture: screenshots and HTML dumps
//!
//! Files are numbered sequentially within a run so a directory listing reads
//! as a timeline. Capture is fail-open throughout: a failed screenshot is
//! logged and skipped, never allowed to take the booking attempt down.

use crate::browser::BrowserSession;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use teatime_core::fail_open::fail_open;
use teatime_core::{CaptureSettings, Result};
use tracing::debug;

/// Capture sink writing numbered artifacts under a base directory.
pub struct ArtifactCapture {
    base_dir: PathBuf,
    screenshots: bool,
    html_dumps: bool,
    counter: AtomicU32,
}

impl ArtifactCapture {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            screenshots: true,
            html_dumps: true,
            counter: AtomicU32::new(0),
        }
    }

    pub fn from_settings(settings: &CaptureSettings) -> Self {
        Self {
            base_dir: PathBuf::from(&settings.artifacts_dir),
            screenshots: settings.screenshots,
            html_dumps: settings.html_dumps,
            counter: AtomicU32::new(0),
        }
    }

    fn next_index(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Capture a screenshot of the session's viewport.
    ///
    /// Returns the stored path, or `None` when capture is disabled or failed.
    pub async fn screenshot(&self, session: &BrowserSession, label: &str) -> Option<String> {
        if !self.screenshots {
            return None;
        }
        let index = self.next_index();
        fail_open("capture::screenshot", || async {
            let png = session.capture_png().await?;
            self.store("screenshots", index, label, "png", &png).await
        })
        .await
    }

    /// Dump the current document HTML.
    pub async fn html_dump(&self, session: &BrowserSession, label: &str) -> Option<String> {
        if !self.html_dumps {
            return None;
        }
        let index = self.next_index();
        fail_open("capture::html_dump", || async {
            let html = session.page_html().await?;
            self.store("html", index, label, "html", html.as_bytes())
                .await
        })
        .await
    }

    async fn store(
        &self,
        subdir: &str,
        index: u32,
        label: &str,
        extension: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let dir = self.base_dir.join(subdir);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{:02}_{}.{}", index, sanitize_label(label), extension);
        let path = dir.join(filename);
        tokio::fs::write(&path, bytes).await?;

        let path = path.to_string_lossy().into_owned();
        debug!("Artifact stored: {} ({} bytes)", path, bytes.len());
        Ok(path)
    }
}

/// Keep labels filesystem-safe; the site's step names occasionally carry
/// spaces or slashes.
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
