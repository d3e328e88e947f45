//! # repodoc
//!
//! Turns a source repository into documentation. A run loads the
//! repository, analyzes its structure, chunks and embeds the files into a
//! per-project vector index, retrieves the most relevant excerpts, asks an
//! LLM for an article, outline or answer, and finishes with a heuristic
//! review of the repository's documentation health.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │   Source    │──▶│  Loader  │──▶│   Analyze    │──▶│   Chunk    │
//! │ dir/zip/git │   │ filters  │   │ (core crate) │   │  + Embed   │
//! └─────────────┘   └──────────┘   └──────────────┘   └─────┬──────┘
//!                                                           │
//!                                  ┌────────────────────────┤
//!                                  ▼                        ▼
//!                           ┌────────────┐           ┌────────────┐
//!                           │  Generate  │◀──────────│   SQLite   │
//!                           │  (LLM)     │  top-k    │  vectors   │
//!                           └─────┬──────┘           └────────────┘
//!                                 ▼
//!                           ┌────────────┐
//!                           │   Review   │
//!                           └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! repodoc init                                   # create database
//! repodoc analyze ./my-repo                      # structure report, no network
//! repodoc run ./my-repo --instructions "Write an introduction"
//! repodoc query my-repo "how is config loaded?"
//! repodoc ask my-repo "what does the loader skip?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`source`] | Local path / git URL resolution |
//! | [`loader`] | Directory and zip loading with filters |
//! | [`pipeline`] | Orchestrator state machine |
//! | [`index`] | Chunk embedding and similarity queries |
//! | [`generate`] | Prompt assembly and generation |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | LLM providers |
//! | [`retry`] | Retry with backoff and per-call timeout |
//! | [`sqlite_store`] | SQLite vector index |
//! | [`projects`] | Project run registry |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generate;
pub mod http;
pub mod index;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod pipeline;
pub mod projects;
pub mod retry;
pub mod source;
pub mod sqlite_store;
