//! CLI command implementations.
//!
//! Each `run_*` function backs one `repodoc` subcommand. Human-readable
//! output goes to stdout; `--json` variants print a single JSON document
//! there instead. Logs always go to stderr.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;

use repodoc_core::analyze::{analyze_repository, RepositoryState};
use repodoc_core::error::PipelineError;
use repodoc_core::improve::{improve, ContentImprovement};
use repodoc_core::metadata::{suggest, MetadataSuggestion};
use repodoc_core::models::Chunk;
use repodoc_core::review::{review, ReviewReport};
use repodoc_core::store::VectorIndex;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generate::GenerationKind;
use crate::llm::create_generator;
use crate::loader::load_repository;
use crate::pipeline::{
    EmbeddingStatus, GenerationStatus, Orchestrator, PipelineContext, PipelineSettings,
    PipelineState, RunRequest,
};
use crate::sqlite_store::SqliteIndex;
use crate::{db, migrate, projects, source};

async fn open_pool(config: &Config) -> Result<SqlitePool> {
    let pool = db::connect(config).await.with_context(|| {
        format!("Failed to open database at {}", config.db.path.display())
    })?;
    migrate::migrate_pool(&pool).await?;
    Ok(pool)
}

fn resolve_source(config: &Config, input: &str) -> Result<PathBuf> {
    source::resolve(input, &config.cache_dir())
        .with_context(|| format!("Failed to resolve source '{}'", input))
}

fn orchestrator(config: &Config, pool: &SqlitePool) -> Result<Orchestrator> {
    let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::new(pool.clone()));
    Ok(
        Orchestrator::new(index, PipelineSettings::from_config(config))
            .with_embedder(create_embedder(&config.embedding)?)
            .with_generator(create_generator(&config.llm)?),
    )
}

// ============ init ============

pub async fn run_init(config: &Config) -> Result<()> {
    migrate::run_migrations(config).await?;
    println!("Database initialized at {}", config.db.path.display());
    Ok(())
}

// ============ analyze ============

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub analysis: RepositoryState,
    pub metadata: MetadataSuggestion,
    pub improvement: ContentImprovement,
    pub review: ReviewReport,
    pub skipped: Vec<String>,
}

pub fn analyze_source(config: &Config, input: &str) -> Result<AnalysisReport> {
    let path = resolve_source(config, input)?;
    let outcome = load_repository(&path, &config.loader.options())?;
    let analysis = analyze_repository(&path.to_string_lossy(), &outcome.files);
    let improvement = improve(&analysis);

    Ok(AnalysisReport {
        metadata: suggest(&analysis),
        review: review(&analysis, Some(&improvement)),
        improvement,
        analysis,
        skipped: outcome.skipped.iter().map(|e| e.to_string()).collect(),
    })
}

pub async fn run_analyze(config: &Config, input: &str, json: bool) -> Result<()> {
    let report = analyze_source(config, input)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let a = &report.analysis;
    println!("Repository: {}", a.root);
    println!();
    println!("  Project type:  {}", a.project_type);
    println!("  Files:         {}", a.total_files);
    println!("  Lines:         {}", a.total_lines);
    println!("  Bytes:         {}", a.total_bytes);
    let languages: Vec<String> = a.top_languages(5).iter().map(|l| l.to_string()).collect();
    println!("  Languages:     {}", languages.join(", "));
    for (ecosystem, deps) in &a.dependencies {
        println!("  Deps ({}): {}", ecosystem, deps.join(", "));
    }
    if !report.skipped.is_empty() {
        println!("  Skipped:       {} unreadable file(s)", report.skipped.len());
    }

    println!();
    println!("Metadata:");
    for title in &report.metadata.title_alternatives {
        println!("  title: {}", title);
    }
    println!("  summary: {}", report.metadata.one_line_summary);
    println!("  tags: {}", report.metadata.tags.join(", "));

    println!();
    println!(
        "Quality: {}/100   Health: {}/100",
        report.improvement.quality_score, report.review.validation.overall_health
    );
    for item in &a.missing {
        println!("  {}", item);
    }
    if !report.review.action_items.is_empty() {
        println!();
        println!("Action items:");
        for item in &report.review.action_items {
            println!("  [{}] {}: {}", item.priority.label(), item.task, item.details);
        }
    }
    Ok(())
}

// ============ index ============

pub async fn run_index(config: &Config, input: &str, project: &str, force: bool) -> Result<()> {
    let pool = open_pool(config).await?;
    let Some(store) = orchestrator(config, &pool)?.index_store(project) else {
        bail!("Embedding provider is disabled. Configure [embedding] to build an index.");
    };

    let path = resolve_source(config, input)?;
    let outcome = load_repository(&path, &config.loader.options())?;
    let chunker = config.chunker()?;
    let chunks: Vec<Chunk> = outcome
        .files
        .iter()
        .flat_map(|f| chunker.chunk_file(f))
        .collect();

    // Re-indexing clears the collection, so it must not overlap a run.
    projects::claim_project(&pool, project, &path.to_string_lossy(), force).await?;
    let indexed = store.index(&chunks).await;
    projects::release_project(&pool, project, projects::ProjectStatus::Idle).await?;
    let count = indexed?;

    println!("Indexed project '{}'", project);
    println!("  files:   {}", outcome.files.len());
    println!("  chunks:  {}", chunks.len());
    println!("  vectors: {}", count);
    if !outcome.skipped.is_empty() {
        println!("  skipped: {}", outcome.skipped.len());
    }
    Ok(())
}

// ============ query / ask ============

pub async fn run_query(config: &Config, project: &str, text: &str, top_k: Option<usize>) -> Result<()> {
    let pool = open_pool(config).await?;
    let orchestrator = orchestrator(config, &pool)?;
    let Some(store) = orchestrator.index_store(project) else {
        bail!("Embedding provider is disabled. Configure [embedding] to query an index.");
    };

    let hits = store
        .query(text, top_k.unwrap_or(config.retrieval.top_k))
        .await?;
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} #{} ({}..{})",
            i + 1,
            hit.score,
            hit.chunk.file_path,
            hit.chunk.seq,
            hit.chunk.start,
            hit.chunk.end
        );
        let preview: String = hit.text.chars().take(200).collect();
        println!("    {}", preview.replace('\n', " "));
    }
    Ok(())
}

pub async fn run_ask(config: &Config, project: &str, question: &str, top_k: Option<usize>) -> Result<()> {
    let pool = open_pool(config).await?;
    let orchestrator = orchestrator(config, &pool)?;
    let Some(store) = orchestrator.index_store(project) else {
        bail!("Embedding provider is disabled. Configure [embedding] to ask questions.");
    };
    let Some(stage) = orchestrator.generation_stage() else {
        bail!("LLM provider is disabled. Configure [llm] to ask questions.");
    };

    let answer = stage
        .answer(&store, question, top_k.unwrap_or(config.retrieval.top_k))
        .await?;
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  {} #{} [{:.3}]", source.chunk.file_path, source.chunk.seq, source.score);
        }
    }
    Ok(())
}

// ============ run ============

pub struct RunArgs {
    pub source: String,
    pub project: String,
    pub instructions: String,
    pub kind: GenerationKind,
    pub description: Option<String>,
    pub json: bool,
    pub force: bool,
}

pub async fn run_pipeline(config: &Config, args: RunArgs) -> Result<()> {
    let pool = open_pool(config).await?;
    let orchestrator = orchestrator(config, &pool)?;

    // A source that cannot be resolved still produces a FAILED run record.
    let resolved = resolve_source(config, &args.source);
    let path = match &resolved {
        Ok(path) => path.clone(),
        Err(_) => PathBuf::from(&args.source),
    };

    let request = RunRequest::new(&args.project, &path, &args.instructions)
        .kind(args.kind)
        .description(args.description);
    let mut ctx = PipelineContext::new(request);

    projects::begin_run(&pool, &args.project, &path.to_string_lossy(), &ctx.run_id, args.force)
        .await?;

    let ctx = match resolved {
        Ok(_) => {
            let cancel = ctx.cancel_handle();
            let watcher = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling after the current stage");
                    cancel.store(true, Ordering::SeqCst);
                }
            });
            let ctx = orchestrator.drive(ctx).await;
            watcher.abort();
            ctx
        }
        Err(e) => {
            ctx.abort(PipelineError::config(format!("{:#}", e)));
            ctx
        }
    };
    projects::finish_run(&pool, &ctx).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ctx)?);
    } else {
        print_run_summary(&ctx);
    }

    if ctx.state == PipelineState::Failed {
        let message = ctx
            .fatal_error()
            .map(PipelineError::to_string)
            .unwrap_or_else(|| "unknown failure".to_string());
        bail!("Run {} failed: {}", ctx.run_id, message);
    }
    Ok(())
}

fn print_run_summary(ctx: &PipelineContext) {
    println!("Run {} ({})", ctx.run_id, ctx.project_id);
    println!();
    println!("  state:      {}", ctx.state);
    let history: Vec<&str> = ctx.history.iter().map(|s| s.as_str()).collect();
    println!("  history:    {}", history.join(" -> "));
    if let Some(analysis) = &ctx.analysis {
        println!("  type:       {}", analysis.project_type);
        println!("  files:      {}", analysis.total_files);
    }
    println!("  chunks:     {}", ctx.chunks.len());
    let embedding = match ctx.embedding {
        EmbeddingStatus::Pending => "pending".to_string(),
        EmbeddingStatus::Skipped => "skipped (no provider)".to_string(),
        EmbeddingStatus::Indexed { count } => format!("indexed {} vectors", count),
        EmbeddingStatus::Failed => "failed".to_string(),
    };
    println!("  embedding:  {}", embedding);
    let generation = match ctx.generation {
        GenerationStatus::Pending => "pending",
        GenerationStatus::Skipped => "skipped (no provider)",
        GenerationStatus::Generated => "generated",
        GenerationStatus::Failed => "failed",
    };
    println!("  generation: {}", generation);
    if let Some(review) = &ctx.review {
        println!("  health:     {}/100", review.validation.overall_health);
    }
    if ctx.partial {
        println!("  partial:    yes ({} error(s))", ctx.errors.len());
        for err in &ctx.errors {
            println!("    [{}] {}: {}", err.stage, err.kind, err.message);
        }
    }
    if let Some(failure) = &ctx.failure {
        println!("  failure:    [{}] {}: {}", failure.stage, failure.kind, failure.message);
    }

    if !ctx.generated_text.is_empty() {
        println!();
        println!("{}", ctx.generated_text);
    }
}

// ============ projects / delete ============

pub async fn run_projects(config: &Config) -> Result<()> {
    let pool = open_pool(config).await?;
    let index = SqliteIndex::new(pool.clone());
    let list = projects::list_projects(&pool).await?;
    if list.is_empty() {
        println!("No projects.");
        return Ok(());
    }

    println!(
        "  {:<24} {:<10} {:<20} {:>7} {:>8}",
        "PROJECT", "STATUS", "TYPE", "FILES", "VECTORS"
    );
    println!("  {}", "-".repeat(73));
    for p in list {
        let vectors = index.count(&p.id).await?;
        println!(
            "  {:<24} {:<10} {:<20} {:>7} {:>8}",
            p.id,
            p.status.as_str(),
            p.project_type.as_deref().unwrap_or("-"),
            p.total_files.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
            vectors
        );
    }
    Ok(())
}

pub async fn run_delete(config: &Config, project: &str, force: bool) -> Result<()> {
    let pool = open_pool(config).await?;
    let found = projects::delete_project(&pool, project, force).await?;
    SqliteIndex::new(pool.clone()).delete(project).await?;
    if found {
        println!("Deleted project '{}'", project);
    } else {
        println!("Project '{}' not found; removed any stray vectors", project);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> Config {
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("repodoc.sqlite");
        config.embedding.provider = "ollama".to_string();
        config.embedding.model = Some("nomic-embed-text".to_string());
        config.embedding.dims = Some(3);
        // Unroutable, so any accidental embedding call fails fast.
        config.embedding.url = Some("http://127.0.0.1:9".to_string());
        config
    }

    #[tokio::test]
    async fn test_index_and_delete_respect_running_project() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let repo = tmp.path().join("repo");
        std::fs::create_dir_all(&repo).unwrap();
        std::fs::write(repo.join("main.py"), "print('hi')\n").unwrap();

        let pool = open_pool(&config).await.unwrap();
        projects::begin_run(&pool, "demo", "/r", "run-1", false)
            .await
            .unwrap();

        let err = run_index(&config, repo.to_str().unwrap(), "demo", false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already has a run in progress"));

        let err = run_delete(&config, "demo", false).await.unwrap_err();
        assert!(err.to_string().contains("already has a run in progress"));

        run_delete(&config, "demo", true).await.unwrap();
        assert!(projects::get_project(&pool, "demo").await.unwrap().is_none());
    }
}
