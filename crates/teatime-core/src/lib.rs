//! # teatime-core
//!
//! Core types for the teatime booking engine.
//!
//! Teatime automates booking a tee time on a club-management site the moment
//! its reservation window opens. This crate holds everything the other crates
//! share:
//!
//! - The unified [`TeatimeError`] and [`Result`] alias
//! - The data model: page variants, slots, booking targets, attempt outcomes
//! - Date and clock-time helpers (the target site renders "2:00 PM" one day
//!   and "2:00PM" the next)
//! - Configuration loaded from TOML, with credentials strictly from the
//!   environment

mod config;
mod dates;
mod error;
pub mod fail_open;
mod types;

pub use config::{
    BookingSettings, CaptureSettings, Credentials, RuntimeSettings, SiteSettings, TeatimeConfig,
    WindowSettings,
};
pub use dates::{
    candidate_dates, extract_time_token, parse_clock_time, parse_utc_offset, resolve_target_date,
    CandidateDate,
};
pub use error::{Result, TeatimeError};
pub use types::*;
