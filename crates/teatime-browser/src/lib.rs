//! Browser session management and site collaborators for teatime
//!
//! This crate owns everything that touches a live Chrome instance via the
//! DevTools Protocol, and exposes it to the booking engine through two narrow
//! seams:
//!
//! - [`Page`]: an object-safe view of one rendered page (navigate, query,
//!   act, evaluate). The engine is written entirely against `&dyn Page`, so
//!   its tests run on scripted fakes.
//! - [`SessionAuthenticator`]: the single "ensure authenticated session"
//!   operation the engine consumes as a precondition.
//!
//! The rest is plumbing the engine never sees directly: screenshot/HTML-dump
//! capture and the page-structure inspector used when the site's markup has
//! drifted past what the classifier recognizes.
//!
//! # Requirements
//!
//! Chrome or Chromium installed; headless operation needs no further setup.

pub mod auth;
pub mod browser;
pub mod capture;
pub mod inspector;
pub mod page;

pub use auth::{Authenticator, SessionAuthenticator};
pub use browser::{BrowserConfig, BrowserSession};
pub use capture::ArtifactCapture;
pub use inspector::{inspect, PageStructure};
pub use page::Page;
