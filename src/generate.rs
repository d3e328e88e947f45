//! Generation / QA stage.
//!
//! Builds prompts from the repository analysis, the caller's instructions
//! and retrieved excerpts, then calls the configured [`Generator`] through
//! the shared [`RetryPolicy`].
//!
//! | Kind | Max tokens | Prompt |
//! |------|-----------|--------|
//! | [`GenerationKind::Outline`] | 2048 | hierarchical markdown outline |
//! | [`GenerationKind::Article`] | 4096 | publication-ready markdown article |
//! | [`GenerationKind::Answer`] | 300 | concise answer from retrieved context |
//!
//! Per-kind limits are capped by `llm.max_tokens`.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use repodoc_core::analyze::RepositoryState;
use repodoc_core::error::PipelineError;
use repodoc_core::generation::{GenerationParams, Generator};
use repodoc_core::models::RetrievedChunk;

use crate::index::IndexStore;
use crate::retry::RetryPolicy;

const README_EXCERPT_CHARS: usize = 1500;
const MAX_LISTED_FILES: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Outline,
    Article,
    Answer,
}

impl GenerationKind {
    pub fn max_tokens(&self) -> u32 {
        match self {
            GenerationKind::Outline => 2048,
            GenerationKind::Article => 4096,
            GenerationKind::Answer => 300,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Outline => "outline",
            GenerationKind::Article => "article",
            GenerationKind::Answer => "answer",
        }
    }
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain-text summary of an analyzed repository for prompts.
pub fn repo_context(state: &RepositoryState) -> String {
    let mut out = String::new();
    let languages: Vec<String> = state
        .top_languages(5)
        .iter()
        .map(|l| l.to_string())
        .collect();

    let _ = writeln!(out, "Repository: {}", state.root);
    let _ = writeln!(out, "Project Type: {}", state.project_type);
    let _ = writeln!(out, "Total Files: {}", state.total_files);
    let _ = writeln!(out, "Total Lines: {}", state.total_lines);
    let _ = writeln!(
        out,
        "Languages: {}",
        if languages.is_empty() {
            "none detected".to_string()
        } else {
            languages.join(", ")
        }
    );
    for (ecosystem, deps) in &state.dependencies {
        let _ = writeln!(out, "Dependencies ({}): {}", ecosystem, deps.join(", "));
    }

    if !state.files.is_empty() {
        let _ = writeln!(out, "Files:");
        for file in state.files.iter().take(MAX_LISTED_FILES) {
            let _ = writeln!(out, "- {} ({} lines)", file.path, file.lines);
        }
        if state.files.len() > MAX_LISTED_FILES {
            let _ = writeln!(out, "- ... and {} more", state.files.len() - MAX_LISTED_FILES);
        }
    }

    let readme = state.readme_text();
    if !readme.is_empty() {
        let excerpt: String = readme.chars().take(README_EXCERPT_CHARS).collect();
        let _ = writeln!(out, "README excerpt:\n{}", excerpt);
    }

    out
}

fn excerpts_block(excerpts: &[RetrievedChunk]) -> String {
    excerpts
        .iter()
        .map(|c| {
            format!(
                "--- {} [{}..{}] (score {:.3})\n{}",
                c.chunk.file_path, c.chunk.start, c.chunk.end, c.score, c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the prompt for `kind`. `instructions` is the question for
/// [`GenerationKind::Answer`].
pub fn build_prompt(
    kind: GenerationKind,
    instructions: &str,
    description: Option<&str>,
    repo_context: &str,
    excerpts: &[RetrievedChunk],
) -> String {
    let excerpts_text = if excerpts.is_empty() {
        "No excerpts retrieved.".to_string()
    } else {
        excerpts_block(excerpts)
    };

    match kind {
        GenerationKind::Outline => format!(
            "You are an expert at creating article outlines. Generate a detailed outline \
             for an article about the repository below, following the instructions.\n\
             Format: markdown with numbered and bulleted lists.\n\n\
             REPOSITORY CONTEXT:\n{repo_context}\n\
             RELEVANT EXCERPTS:\n{excerpts_text}\n\n\
             INSTRUCTIONS:\n{instructions}\n\n\
             Provide a hierarchical outline with main sections and subsections."
        ),
        GenerationKind::Article => format!(
            "You are an expert technical writer. Write a well-structured, publication-ready \
             markdown article about the repository below.\n\n\
             Guidelines:\n\
             1. Use clear sections and subsections\n\
             2. Include code examples where relevant\n\
             3. Mark anything that needs manual completion with [TODO: ...]\n\
             4. Stay technical but accessible\n\n\
             REPOSITORY CONTEXT:\n{repo_context}\n\
             RELEVANT EXCERPTS:\n{excerpts_text}\n\n\
             PROJECT DESCRIPTION:\n{description}\n\n\
             INSTRUCTIONS:\n{instructions}",
            description = description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or("No additional description provided"),
        ),
        GenerationKind::Answer => format!(
            "Using the context below, answer the question concisely.\n\n\
             Context:\n{excerpts_text}\n\n\
             Question: {instructions}\n\n\
             Answer:"
        ),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}

pub struct GenerationStage {
    generator: Arc<dyn Generator>,
    retry: RetryPolicy,
    base: GenerationParams,
}

impl GenerationStage {
    pub fn new(generator: Arc<dyn Generator>, retry: RetryPolicy, base: GenerationParams) -> Self {
        Self {
            generator,
            retry,
            base,
        }
    }

    pub fn params_for(&self, kind: GenerationKind) -> GenerationParams {
        GenerationParams {
            max_tokens: kind.max_tokens().min(self.base.max_tokens),
            temperature: self.base.temperature,
        }
    }

    pub async fn generate(&self, kind: GenerationKind, prompt: &str) -> Result<String, PipelineError> {
        let params = self.params_for(kind);
        tracing::debug!(
            kind = kind.as_str(),
            model = self.generator.model_name(),
            max_tokens = params.max_tokens,
            prompt_chars = prompt.len(),
            "calling generator"
        );
        self.retry
            .run("generate", || self.generator.generate(prompt, &params))
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))
    }

    /// Question answering over an indexed project: retrieve, prompt, answer.
    pub async fn answer(
        &self,
        store: &IndexStore,
        question: &str,
        top_k: usize,
    ) -> Result<Answer, PipelineError> {
        let sources = store.query(question, top_k).await?;
        let prompt = build_prompt(GenerationKind::Answer, question, None, "", &sources);
        let text = self.generate(GenerationKind::Answer, &prompt).await?;
        Ok(Answer { text, sources })
    }
}
