// src/lib.rs

//! docdrift Library
//!
//! Re-fetches external documentation referenced from source annotations,
//! fingerprints the filtered content and reconciles it with the stored value.

pub mod error;
pub mod filters;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
