//! Telegram post reporter library.
//!
//! Scrapes the public t.me preview of a channel for posts in a date range,
//! screenshots each post and stores the result as a JSON report served over
//! a small HTTP API.

// Allow raw string hashes for safety - they're harmless and prevent issues if content changes
#![allow(clippy::needless_raw_string_hashes)]

pub mod browser;
pub mod capture;
pub mod channel;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod web;
