//! End-to-end orchestrator runs against an in-memory index and mock
//! providers.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use repodoc::pipeline::{
    EmbeddingStatus, GenerationStatus, Orchestrator, PipelineContext, PipelineSettings,
    PipelineState, RunRequest,
};
use repodoc::retry::RetryPolicy;
use repodoc_core::analyze::analyze_repository;
use repodoc_core::embedding::Embedder;
use repodoc_core::error::{ErrorKind, PipelineError, ServiceError};
use repodoc_core::generation::{GenerationParams, Generator};
use repodoc_core::models::SourceFile;
use repodoc_core::profile::ProjectType;
use repodoc_core::store::memory::InMemoryIndex;
use repodoc_core::store::VectorIndex;

struct HashEmbedder {
    calls: AtomicUsize,
    fail: bool,
}

impl HashEmbedder {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ServiceError::transient("503 service unavailable"));
        }
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.1f32; 4];
                for (i, b) in t.bytes().enumerate() {
                    v[i % 4] += b as f32 / 255.0;
                }
                v
            })
            .collect())
    }
}

struct EchoGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ServiceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("# Demo\n\nAn article.".to_string())
    }
}

/// Generator whose service is always down.
struct DownGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for DownGenerator {
    fn model_name(&self) -> &str {
        "down"
    }
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ServiceError::transient("502 bad gateway"))
    }
}

/// Embedder that raises the run's cancel flag while it works, like an
/// interrupt arriving mid-stage.
struct InterruptingEmbedder {
    cancel: Arc<AtomicBool>,
}

#[async_trait]
impl Embedder for InterruptingEmbedder {
    fn model_name(&self) -> &str {
        "interrupting"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.cancel.store(true, Ordering::SeqCst);
        Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

fn settings() -> PipelineSettings {
    let retry = RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        jitter: 0.0,
        call_timeout: Duration::from_secs(5),
    };
    PipelineSettings {
        chunk_size: 40,
        overlap: 5,
        batch_size: 2,
        embedding_retry: retry.clone(),
        generation_retry: retry,
        ..PipelineSettings::default()
    }
}

fn write_repo(root: &Path) {
    fs::create_dir_all(root.join("pkg")).unwrap();
    fs::write(root.join("setup.py"), "from setuptools import setup\nsetup(name='demo')\n").unwrap();
    fs::write(root.join("requirements.txt"), "requests>=2\nclick\n").unwrap();
    fs::write(
        root.join("pkg/__init__.py"),
        "def greet(name):\n    return f'hello {name}'\n\nclass Greeter:\n    pass\n",
    )
    .unwrap();
    fs::write(root.join("README.md"), "# demo\n\nGreets people.\n").unwrap();
}

#[tokio::test]
async fn test_empty_repository_completes() {
    let tmp = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings());

    let ctx = orchestrator
        .run(RunRequest::new("empty", tmp.path(), "describe it"))
        .await;

    assert_eq!(ctx.state, PipelineState::Complete);
    let analysis = ctx.analysis.as_ref().unwrap();
    assert_eq!(analysis.project_type, ProjectType::Unknown);
    assert_eq!(analysis.total_files, 0);
    assert!(ctx.chunks.is_empty());
    assert_eq!(ctx.embedding, EmbeddingStatus::Skipped);
    assert_eq!(ctx.generation, GenerationStatus::Skipped);
    assert!(ctx.review.is_some());
    assert!(!ctx.partial);
}

#[tokio::test]
async fn test_full_run_generates_text() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());

    let index = Arc::new(InMemoryIndex::new());
    let generator = Arc::new(EchoGenerator {
        prompts: Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new(index.clone(), settings())
        .with_embedder(Some(HashEmbedder::new(false)))
        .with_generator(Some(generator.clone()));

    let ctx = orchestrator
        .run(RunRequest::new("demo", tmp.path(), "Introduce the greeter").description(Some(
            "A greeting library".to_string(),
        )))
        .await;

    assert_eq!(ctx.state, PipelineState::Complete);
    assert!(!ctx.partial, "unexpected errors: {:?}", ctx.errors);
    assert_eq!(
        ctx.analysis.as_ref().unwrap().project_type,
        ProjectType::PythonLibrary
    );

    let EmbeddingStatus::Indexed { count } = ctx.embedding else {
        panic!("expected indexed, got {:?}", ctx.embedding);
    };
    assert_eq!(count, ctx.chunks.len());
    assert_eq!(index.count("demo").await.unwrap(), count);
    assert!(!ctx.retrieved.is_empty());
    assert!(ctx.retrieved.len() <= orchestrator.settings().top_k);

    assert_eq!(ctx.generation, GenerationStatus::Generated);
    assert_eq!(ctx.generated_text, "# Demo\n\nAn article.");
    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Introduce the greeter"));
    assert!(prompts[0].contains("A greeting library"));
    assert!(prompts[0].contains("Project Type: Python Library"));
}

#[tokio::test]
async fn test_embedding_failure_is_recorded_once() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());

    let embedder = HashEmbedder::new(true);
    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings())
        .with_embedder(Some(embedder.clone()));

    let ctx = orchestrator
        .run(RunRequest::new("demo", tmp.path(), "write"))
        .await;

    assert_eq!(ctx.state, PipelineState::Complete);
    assert!(ctx.partial);
    assert_eq!(ctx.errors.len(), 1);
    assert_eq!(ctx.errors[0].kind, ErrorKind::EmbeddingServiceError);
    assert_eq!(ctx.errors[0].stage, "EMBEDDING");
    assert_eq!(ctx.embedding, EmbeddingStatus::Failed);
    assert!(ctx.retrieved.is_empty());
    assert!(ctx.review.is_some());
    // First batch only, with one retry.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancelled_before_first_stage() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());
    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings());

    let ctx = PipelineContext::new(RunRequest::new("demo", tmp.path(), "write"));
    ctx.cancel_handle().store(true, Ordering::SeqCst);
    let ctx = orchestrator.drive(ctx).await;

    assert_eq!(ctx.state, PipelineState::Failed);
    assert_eq!(ctx.history, vec![PipelineState::Start, PipelineState::Failed]);
    assert!(matches!(ctx.fatal_error(), Some(PipelineError::Cancelled { .. })));
    assert_eq!(ctx.failure.as_ref().unwrap().kind, ErrorKind::Cancelled);
    assert!(ctx.analysis.is_none());
    assert!(ctx.finished_at.is_some());
}

#[tokio::test]
async fn test_missing_path_fails_with_config_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");
    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings());

    let ctx = orchestrator
        .run(RunRequest::new("ghost", &missing, "write"))
        .await;
    assert_eq!(ctx.state, PipelineState::Failed);
    assert_eq!(
        ctx.history,
        vec![
            PipelineState::Start,
            PipelineState::Analyzing,
            PipelineState::Failed
        ]
    );
    let failure = ctx.failure.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::ConfigError);
    assert_eq!(failure.stage, "ANALYZING");

    let err = orchestrator.run_pipeline(&missing, "write").await.unwrap_err();
    assert!(matches!(err, PipelineError::Config { .. }));
}

#[tokio::test]
async fn test_rerun_leaves_same_index() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());

    let index = Arc::new(InMemoryIndex::new());
    let orchestrator = Orchestrator::new(index.clone(), settings())
        .with_embedder(Some(HashEmbedder::new(false)));

    let first = orchestrator
        .run(RunRequest::new("demo", tmp.path(), "greeting"))
        .await;
    let after_first = index.count("demo").await.unwrap();
    let second = orchestrator
        .run(RunRequest::new("demo", tmp.path(), "greeting"))
        .await;

    assert_eq!(index.count("demo").await.unwrap(), after_first);
    assert_eq!(first.retrieved, second.retrieved);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_unreadable_file_marks_partial() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());
    fs::write(tmp.path().join("pkg/latin1.py"), [b'#', b' ', 0xE9, b'\n']).unwrap();

    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings());
    let ctx = orchestrator
        .run(RunRequest::new("demo", tmp.path(), "write"))
        .await;

    assert_eq!(ctx.state, PipelineState::Complete);
    assert!(ctx.partial);
    assert_eq!(ctx.errors.len(), 1);
    assert_eq!(ctx.errors[0].kind, ErrorKind::ReadError);
    assert!(!ctx
        .analysis
        .as_ref()
        .unwrap()
        .has_file("pkg/latin1.py"));
}

#[tokio::test]
async fn test_generation_failure_completes_partial() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());

    let generator = Arc::new(DownGenerator {
        calls: AtomicUsize::new(0),
    });
    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings())
        .with_generator(Some(generator.clone()));

    let ctx = orchestrator
        .run(RunRequest::new("demo", tmp.path(), "write"))
        .await;

    assert_eq!(ctx.state, PipelineState::Complete);
    assert!(ctx.partial);
    assert_eq!(ctx.errors.len(), 1);
    assert_eq!(ctx.errors[0].kind, ErrorKind::GenerationError);
    assert_eq!(ctx.errors[0].stage, "GENERATING");
    assert_eq!(ctx.generation, GenerationStatus::Failed);
    assert!(ctx.generated_text.is_empty());
    assert!(ctx.review.is_some());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cancelled_between_stages() {
    let tmp = TempDir::new().unwrap();
    write_repo(tmp.path());

    let ctx = PipelineContext::new(RunRequest::new("demo", tmp.path(), "write"));
    let embedder = Arc::new(InterruptingEmbedder {
        cancel: ctx.cancel_handle(),
    });
    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings())
        .with_embedder(Some(embedder));

    let ctx = orchestrator.drive(ctx).await;

    assert_eq!(ctx.state, PipelineState::Failed);
    assert_eq!(
        ctx.history,
        vec![
            PipelineState::Start,
            PipelineState::Analyzing,
            PipelineState::Embedding,
            PipelineState::Failed
        ]
    );
    assert!(matches!(ctx.embedding, EmbeddingStatus::Indexed { .. }));
    let failure = ctx.failure.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::Cancelled);
    assert_eq!(failure.stage, "GENERATING");
    assert!(ctx.review.is_none());
}

#[tokio::test]
async fn test_chunks_without_analyzed_file_fail_the_run() {
    let analyzed = SourceFile {
        path: "a.py".to_string(),
        content: "print('a')\n".to_string(),
        size: 11,
    };
    let stray = SourceFile {
        path: "b.py".to_string(),
        content: "print('b')\n".to_string(),
        size: 11,
    };

    // Resume a run whose analysis disagrees with its loaded sources.
    let mut ctx = PipelineContext::new(RunRequest::new("demo", "/r", "write"));
    ctx.state = PipelineState::Analyzing;
    ctx.analysis = Some(analyze_repository("/r", std::slice::from_ref(&analyzed)));
    ctx.sources = vec![analyzed, stray];

    let orchestrator = Orchestrator::new(Arc::new(InMemoryIndex::new()), settings());
    let ctx = orchestrator.drive(ctx).await;

    assert_eq!(ctx.state, PipelineState::Failed);
    assert_eq!(ctx.history.last(), Some(&PipelineState::Failed));
    let failure = ctx.failure.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::ConsistencyError);
    assert_eq!(failure.stage, "EMBEDDING");
    assert!(failure.message.contains("b.py"));
    assert!(matches!(ctx.fatal_error(), Some(PipelineError::Consistency { .. })));
    assert!(ctx.errors.is_empty());
}
