//! Utility functions and helpers
//!
//! This module contains timestamp helpers.

pub mod time;

pub use time::{add_days, now, to_fixed};
