//! Pipeline orchestrator.
//!
//! One run drives a [`PipelineContext`] through a fixed sequence of
//! stages:
//!
//! ```text
//! START → ANALYZING → EMBEDDING → GENERATING → REVIEWING → COMPLETE
//!            │            │           │            │
//!            └────────────┴─────┬─────┴────────────┘
//!                               ▼
//!                            FAILED
//! ```
//!
//! Each stage is a method taking the context by `&mut`. A stage error is
//! classified by [`PipelineError::is_recoverable`]: recoverable errors are
//! appended to `context.errors` and mark the run `partial`, fatal ones set
//! `context.failure` and move the run to `FAILED`. The cancellation flag is
//! checked before every stage.
//!
//! At most one run per project at a time is the caller's job (see
//! [`crate::projects::begin_run`]).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use repodoc_core::analyze::{analyze_repository, RepositoryState};
use repodoc_core::chunk::Chunker;
use repodoc_core::embedding::Embedder;
use repodoc_core::error::{ErrorRecord, PipelineError};
use repodoc_core::generation::{GenerationParams, Generator};
use repodoc_core::improve::{improve, ContentImprovement};
use repodoc_core::metadata::{suggest, MetadataSuggestion};
use repodoc_core::models::{Chunk, RetrievedChunk, SourceFile};
use repodoc_core::review::{review, ReviewReport};
use repodoc_core::store::VectorIndex;

use crate::config::Config;
use crate::generate::{build_prompt, repo_context, GenerationKind, GenerationStage};
use crate::index::IndexStore;
use crate::loader::{load_repository, LoaderOptions};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Start,
    Analyzing,
    Embedding,
    Generating,
    Reviewing,
    Complete,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Analyzing => "ANALYZING",
            Self::Embedding => "EMBEDDING",
            Self::Generating => "GENERATING",
            Self::Reviewing => "REVIEWING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Successor on the happy path; `None` for terminal states.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Analyzing),
            Self::Analyzing => Some(Self::Embedding),
            Self::Embedding => Some(Self::Generating),
            Self::Generating => Some(Self::Reviewing),
            Self::Reviewing => Some(Self::Complete),
            Self::Complete | Self::Failed => None,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    /// No embedding provider configured.
    Skipped,
    Indexed { count: usize },
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    /// No LLM configured.
    Skipped,
    Generated,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub project_id: String,
    pub repo_path: PathBuf,
    pub instructions: String,
    pub kind: GenerationKind,
    pub description: Option<String>,
}

impl RunRequest {
    pub fn new(
        project_id: impl Into<String>,
        repo_path: impl Into<PathBuf>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            repo_path: repo_path.into(),
            instructions: instructions.into(),
            kind: GenerationKind::Article,
            description: None,
        }
    }

    pub fn kind(mut self, kind: GenerationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}

/// The record threaded through every stage of one run.
#[derive(Debug, Serialize)]
pub struct PipelineContext {
    pub run_id: String,
    pub project_id: String,
    pub repo_path: PathBuf,
    pub instructions: String,
    pub kind: GenerationKind,
    pub description: Option<String>,
    pub state: PipelineState,
    pub history: Vec<PipelineState>,
    pub analysis: Option<RepositoryState>,
    #[serde(skip)]
    pub sources: Vec<SourceFile>,
    #[serde(skip)]
    pub chunks: Vec<Chunk>,
    pub embedding: EmbeddingStatus,
    pub retrieved: Vec<RetrievedChunk>,
    pub metadata: Option<MetadataSuggestion>,
    pub improvement: Option<ContentImprovement>,
    pub generation: GenerationStatus,
    pub generated_text: String,
    pub review: Option<ReviewReport>,
    pub errors: Vec<ErrorRecord>,
    pub partial: bool,
    pub failure: Option<ErrorRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    fatal: Option<PipelineError>,
    #[serde(skip)]
    cancel: Arc<AtomicBool>,
}

impl PipelineContext {
    pub fn new(request: RunRequest) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            project_id: request.project_id,
            repo_path: request.repo_path,
            instructions: request.instructions,
            kind: request.kind,
            description: request.description,
            state: PipelineState::Start,
            history: vec![PipelineState::Start],
            analysis: None,
            sources: Vec::new(),
            chunks: Vec::new(),
            embedding: EmbeddingStatus::Pending,
            retrieved: Vec::new(),
            metadata: None,
            improvement: None,
            generation: GenerationStatus::Pending,
            generated_text: String::new(),
            review: None,
            errors: Vec::new(),
            partial: false,
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
            fatal: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag; storing `true` stops the run before its next stage.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// The fatal error that ended the run, if it failed.
    pub fn fatal_error(&self) -> Option<&PipelineError> {
        self.fatal.as_ref()
    }

    /// End the run before its next stage with a fatal `err`, e.g. when the
    /// source could not be resolved to a local path.
    pub fn abort(&mut self, err: PipelineError) {
        let stage = self.state.next().unwrap_or(self.state);
        self.fail(stage, err);
        self.finished_at = Some(Utc::now());
    }

    fn transition(&mut self, to: PipelineState) {
        tracing::info!(run_id = %self.run_id, from = %self.state, to = %to, "state transition");
        self.state = to;
        self.history.push(to);
    }

    fn record(&mut self, stage: PipelineState, err: &PipelineError) {
        tracing::warn!(run_id = %self.run_id, stage = %stage, error = %err, "recoverable error");
        self.errors.push(ErrorRecord::new(stage.as_str(), err));
        self.partial = true;
    }

    fn fail(&mut self, stage: PipelineState, err: PipelineError) {
        tracing::error!(run_id = %self.run_id, stage = %stage, error = %err, "run failed");
        self.failure = Some(ErrorRecord::new(stage.as_str(), &err));
        self.fatal = Some(err);
        self.transition(PipelineState::Failed);
    }
}

/// Tunables for one orchestrator, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub loader: LoaderOptions,
    pub chunk_size: usize,
    pub overlap: usize,
    pub batch_size: usize,
    pub top_k: usize,
    pub embedding_retry: RetryPolicy,
    pub generation_retry: RetryPolicy,
    pub generation: GenerationParams,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::minimal())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            loader: config.loader.options(),
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            batch_size: config.embedding.batch_size,
            top_k: config.retrieval.top_k,
            embedding_retry: config.retry.policy(config.embedding.timeout_secs),
            generation_retry: config.retry.policy(config.llm.timeout_secs),
            generation: config.llm.params(),
        }
    }
}

pub struct Orchestrator {
    embedder: Option<Arc<dyn Embedder>>,
    generator: Option<Arc<dyn Generator>>,
    index: Arc<dyn VectorIndex>,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(index: Arc<dyn VectorIndex>, settings: PipelineSettings) -> Self {
        Self {
            embedder: None,
            generator: None,
            index,
            settings,
        }
    }

    pub fn with_embedder(mut self, embedder: Option<Arc<dyn Embedder>>) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn with_generator(mut self, generator: Option<Arc<dyn Generator>>) -> Self {
        self.generator = generator;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Index store over `project_id`'s collection, if embedding is enabled.
    pub fn index_store(&self, project_id: &str) -> Option<IndexStore> {
        self.embedder.as_ref().map(|embedder| {
            IndexStore::new(
                Arc::clone(embedder),
                Arc::clone(&self.index),
                project_id,
                self.settings.batch_size,
                self.settings.embedding_retry.clone(),
            )
        })
    }

    /// Generation stage, if an LLM is configured.
    pub fn generation_stage(&self) -> Option<GenerationStage> {
        self.generator.as_ref().map(|generator| {
            GenerationStage::new(
                Arc::clone(generator),
                self.settings.generation_retry.clone(),
                self.settings.generation,
            )
        })
    }

    /// Run a fresh context to a terminal state.
    pub async fn run(&self, request: RunRequest) -> PipelineContext {
        self.drive(PipelineContext::new(request)).await
    }

    /// Run `ctx` to a terminal state. Build the context first with
    /// [`PipelineContext::new`] to hold on to its cancel handle.
    pub async fn drive(&self, mut ctx: PipelineContext) -> PipelineContext {
        tracing::info!(
            run_id = %ctx.run_id,
            project = %ctx.project_id,
            repo = %ctx.repo_path.display(),
            "pipeline started"
        );

        while let Some(next) = ctx.state.next() {
            if next == PipelineState::Complete {
                ctx.transition(next);
                break;
            }
            if ctx.is_cancelled() {
                ctx.fail(next, PipelineError::cancelled(next.as_str()));
                break;
            }

            ctx.transition(next);
            if let Err(err) = self.run_stage(next, &mut ctx).await {
                if err.is_recoverable() {
                    ctx.record(next, &err);
                } else {
                    ctx.fail(next, err);
                    break;
                }
            }
        }

        ctx.finished_at = Some(Utc::now());
        tracing::info!(
            run_id = %ctx.run_id,
            state = %ctx.state,
            partial = ctx.partial,
            errors = ctx.errors.len(),
            "pipeline finished"
        );
        ctx
    }

    /// Convenience wrapper: run with the default kind and a project id
    /// derived from the path, turning a `FAILED` run into its error.
    pub async fn run_pipeline(
        &self,
        repo_path: &Path,
        instructions: &str,
    ) -> Result<PipelineContext, PipelineError> {
        let request = RunRequest::new(project_id_from_path(repo_path), repo_path, instructions);
        let mut ctx = self.run(request).await;
        match ctx.fatal.take() {
            Some(err) => Err(err),
            None => Ok(ctx),
        }
    }

    async fn run_stage(
        &self,
        state: PipelineState,
        ctx: &mut PipelineContext,
    ) -> Result<(), PipelineError> {
        match state {
            PipelineState::Analyzing => self.analyze(ctx),
            PipelineState::Embedding => self.embed(ctx).await,
            PipelineState::Generating => self.generate(ctx).await,
            PipelineState::Reviewing => self.review(ctx),
            PipelineState::Start | PipelineState::Complete | PipelineState::Failed => {
                Err(PipelineError::consistency(format!("{} is not a stage", state)))
            }
        }
    }

    // ============ Stages ============

    fn analyze(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let outcome = load_repository(&ctx.repo_path, &self.settings.loader)?;
        for err in &outcome.skipped {
            ctx.record(PipelineState::Analyzing, err);
        }

        let state = analyze_repository(&ctx.repo_path.to_string_lossy(), &outcome.files);
        tracing::info!(
            project_type = %state.project_type,
            files = state.total_files,
            lines = state.total_lines,
            "repository analyzed"
        );
        ctx.analysis = Some(state);
        ctx.sources = outcome.files;
        Ok(())
    }

    async fn embed(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let chunker = Chunker::new(self.settings.chunk_size, self.settings.overlap)?;
        let chunks: Vec<Chunk> = ctx
            .sources
            .iter()
            .flat_map(|file| chunker.chunk_file(file))
            .collect();

        let analysis = ctx
            .analysis
            .as_ref()
            .ok_or_else(|| PipelineError::consistency("embedding started without analysis"))?;
        verify_chunks(&chunks, analysis, &chunker)?;
        tracing::info!(chunks = chunks.len(), "repository chunked");
        ctx.chunks = chunks;

        let Some(store) = self.index_store(&ctx.project_id) else {
            tracing::info!("no embedding provider configured, skipping index");
            ctx.embedding = EmbeddingStatus::Skipped;
            return Ok(());
        };

        match store.index(&ctx.chunks).await {
            Ok(count) => {
                ctx.embedding = EmbeddingStatus::Indexed { count };
                Ok(())
            }
            Err(err) => {
                ctx.embedding = EmbeddingStatus::Failed;
                Err(err)
            }
        }
    }

    async fn generate(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let analysis = ctx
            .analysis
            .as_ref()
            .ok_or_else(|| PipelineError::consistency("generation started without analysis"))?;
        ctx.metadata = Some(suggest(analysis));
        ctx.improvement = Some(improve(analysis));
        let context_text = repo_context(analysis);

        if matches!(ctx.embedding, EmbeddingStatus::Indexed { .. }) {
            if let Some(store) = self.index_store(&ctx.project_id) {
                match store.query(&retrieval_query(ctx), self.settings.top_k).await {
                    Ok(chunks) => ctx.retrieved = chunks,
                    Err(err) => ctx.record(PipelineState::Generating, &err),
                }
            }
        }

        let Some(stage) = self.generation_stage() else {
            tracing::info!("no LLM configured, skipping generation");
            ctx.generation = GenerationStatus::Skipped;
            return Ok(());
        };

        let prompt = build_prompt(
            ctx.kind,
            &ctx.instructions,
            ctx.description.as_deref(),
            &context_text,
            &ctx.retrieved,
        );
        match stage.generate(ctx.kind, &prompt).await {
            Ok(text) => {
                ctx.generated_text = text;
                ctx.generation = GenerationStatus::Generated;
                Ok(())
            }
            Err(err) => {
                ctx.generation = GenerationStatus::Failed;
                Err(err)
            }
        }
    }

    fn review(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let analysis = ctx
            .analysis
            .as_ref()
            .ok_or_else(|| PipelineError::consistency("review started without analysis"))?;
        ctx.review = Some(review(analysis, ctx.improvement.as_ref()));
        Ok(())
    }
}

fn retrieval_query(ctx: &PipelineContext) -> String {
    if !ctx.instructions.trim().is_empty() {
        ctx.instructions.clone()
    } else if let Some(description) = ctx.description.as_deref().filter(|d| !d.trim().is_empty()) {
        description.to_string()
    } else {
        "overview of the repository's purpose and structure".to_string()
    }
}

/// Every chunk must belong to an analyzed file, fit the window, and follow
/// its predecessor by exactly one step.
fn verify_chunks(
    chunks: &[Chunk],
    analysis: &RepositoryState,
    chunker: &Chunker,
) -> Result<(), PipelineError> {
    let mut prev: Option<&Chunk> = None;
    for chunk in chunks {
        if !analysis.has_file(&chunk.file_path) {
            return Err(PipelineError::consistency(format!(
                "chunk {}#{} has no matching analyzed file",
                chunk.file_path, chunk.seq
            )));
        }
        if chunk.char_len() == 0 || chunk.char_len() > chunker.chunk_size() {
            return Err(PipelineError::consistency(format!(
                "chunk {}#{} spans {} characters",
                chunk.file_path,
                chunk.seq,
                chunk.char_len()
            )));
        }

        let expected_start = match prev {
            Some(p) if p.file_path == chunk.file_path => {
                if chunk.seq != p.seq + 1 {
                    return Err(PipelineError::consistency(format!(
                        "chunk {}#{} follows #{}",
                        chunk.file_path, chunk.seq, p.seq
                    )));
                }
                p.start + chunker.step()
            }
            _ => 0,
        };
        if chunk.start != expected_start {
            return Err(PipelineError::consistency(format!(
                "chunk {}#{} starts at {}, expected {}",
                chunk.file_path, chunk.seq, chunk.start, expected_start
            )));
        }
        prev = Some(chunk);
    }
    Ok(())
}

/// Lower-cased last path component, minus a `.zip` suffix, with anything
/// outside `[a-z0-9_-]` replaced by `-`. Falls back to `"default"`.
pub fn project_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".zip").unwrap_or(&name);
    let id: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let id = id.trim_matches('-').to_string();
    if id.is_empty() {
        "default".to_string()
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodoc_core::models::SourceFile;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content: content.to_string(),
            size: content.len() as u64,
        }
    }

    #[test]
    fn test_state_sequence() {
        let mut state = PipelineState::Start;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            seen.push(next);
            state = next;
        }
        assert_eq!(
            seen,
            vec![
                PipelineState::Start,
                PipelineState::Analyzing,
                PipelineState::Embedding,
                PipelineState::Generating,
                PipelineState::Reviewing,
                PipelineState::Complete,
            ]
        );
        assert!(PipelineState::Failed.next().is_none());
        assert!(PipelineState::Failed.is_terminal());
    }

    #[test]
    fn test_verify_chunks_accepts_chunker_output() {
        let files = vec![file("a.py", &"x".repeat(120)), file("b.py", "short")];
        let analysis = analyze_repository("/r", &files);
        let chunker = Chunker::new(50, 10).unwrap();
        let chunks: Vec<Chunk> = files.iter().flat_map(|f| chunker.chunk_file(f)).collect();
        assert!(verify_chunks(&chunks, &analysis, &chunker).is_ok());
    }

    #[test]
    fn test_verify_chunks_rejects_orphan() {
        let analysis = analyze_repository("/r", &[file("a.py", "abc")]);
        let chunker = Chunker::new(50, 10).unwrap();
        let orphan = chunker.chunk_file(&file("ghost.py", "boo"));
        let err = verify_chunks(&orphan, &analysis, &chunker).unwrap_err();
        assert!(matches!(err, PipelineError::Consistency { .. }));
    }

    #[test]
    fn test_verify_chunks_rejects_gap() {
        let files = vec![file("a.py", &"x".repeat(120))];
        let analysis = analyze_repository("/r", &files);
        let chunker = Chunker::new(50, 10).unwrap();
        let mut chunks = chunker.chunk_file(&files[0]);
        chunks.remove(1);
        assert!(verify_chunks(&chunks, &analysis, &chunker).is_err());
    }

    #[test]
    fn test_project_id_from_path() {
        assert_eq!(project_id_from_path(Path::new("/src/My Repo")), "my-repo");
        assert_eq!(project_id_from_path(Path::new("./archive.zip")), "archive");
        assert_eq!(project_id_from_path(Path::new("/")), "default");
        assert_eq!(project_id_from_path(Path::new("/src/socket.io")), "socket-io");
        assert_ne!(
            project_id_from_path(Path::new("/src/socket.io")),
            project_id_from_path(Path::new("/src/socket.js"))
        );
    }

    #[test]
    fn test_abort_records_config_failure() {
        let mut ctx = PipelineContext::new(RunRequest::new("p", "https://x", "write"));
        ctx.abort(PipelineError::config("invalid repository URL: https://x"));

        assert_eq!(ctx.state, PipelineState::Failed);
        assert_eq!(ctx.history, vec![PipelineState::Start, PipelineState::Failed]);
        let failure = ctx.failure.as_ref().unwrap();
        assert_eq!(failure.stage, "ANALYZING");
        assert!(failure.message.contains("invalid repository URL"));
        assert!(matches!(ctx.fatal_error(), Some(PipelineError::Config { .. })));
        assert!(ctx.finished_at.is_some());
    }

    #[test]
    fn test_context_serializes_without_sources() {
        let ctx = PipelineContext::new(RunRequest::new("p", "/r", "write"));
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["state"], "START");
        assert_eq!(json["embedding"]["status"], "pending");
        assert!(json.get("sources").is_none());
        assert!(json.get("cancel").is_none());
    }
}
