//! services/api/src/lib.rs
//!
//! The delivery shell around `word_study_core`: configuration, the port
//! adapters for PostgreSQL and the OpenAI-compatible API, and the REST surface.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
