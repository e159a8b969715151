//! Presence CLI library
//!
//! Command handlers return serializable summaries; the binary prints them as
//! JSON.

pub mod commands;
pub mod simulate;
