//! # repodoc core
//!
//! Pure logic shared by the `repodoc` pipeline: data models, the error
//! taxonomy, the sliding-window chunker, repository analysis, the
//! metadata / improvement / review heuristics, and the traits that sit
//! in front of every external service (embedding, generation, vector
//! index).
//!
//! This crate performs no filesystem or network I/O and carries no async
//! runtime. Everything here is deterministic given its inputs, which is
//! what lets the application crate test each stage with mock services.

pub mod analyze;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod improve;
pub mod metadata;
pub mod models;
pub mod profile;
pub mod review;
pub mod store;
