//! # repodoc CLI
//!
//! ## Usage
//!
//! ```bash
//! repodoc --config ./config/repodoc.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repodoc init` | Create the SQLite database and run schema migrations |
//! | `repodoc analyze <source>` | Analyze a repository without calling any service |
//! | `repodoc index <source>` | Chunk and embed a repository into a project index |
//! | `repodoc query <project> "<text>"` | Similarity search over a project index |
//! | `repodoc ask <project> "<question>"` | Answer a question from retrieved excerpts |
//! | `repodoc run <source>` | Full pipeline: analyze, embed, generate, review |
//! | `repodoc projects` | List projects and their last run status |
//! | `repodoc delete <project>` | Drop a project's vectors and run history |
//!
//! `<source>` is a local directory, a `.zip` archive or a GitHub / `.git` URL.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use repodoc::commands::{self, RunArgs};
use repodoc::generate::GenerationKind;
use repodoc::pipeline::project_id_from_path;
use repodoc::{config, logging};

/// repodoc: repository analysis and documentation generation.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/repodoc.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "repodoc",
    about = "Analyze a repository and generate documentation for it",
    version,
    long_about = "repodoc loads a repository, analyzes its structure, indexes its files \
    into a vector store, and uses a configured LLM to write articles, outlines and \
    answers grounded in retrieved excerpts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/repodoc.toml`. When the file does not exist,
    /// built-in defaults are used and both providers are disabled.
    #[arg(long, global = true, default_value = "./config/repodoc.toml")]
    config: PathBuf,

    /// Verbose logging (debug level for repodoc). `RUST_LOG` overrides.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; safe to run repeatedly.
    Init,

    /// Analyze a repository and print a structure and health report.
    ///
    /// Runs entirely offline: no embedding or LLM calls are made.
    Analyze {
        /// Local directory, `.zip` archive, or repository URL.
        source: String,

        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Chunk and embed a repository into a project's vector index.
    ///
    /// Replaces whatever the project's index held before. Requires an
    /// embedding provider.
    Index {
        /// Local directory, `.zip` archive, or repository URL.
        source: String,

        /// Project id. Defaults to the source's directory name.
        #[arg(long)]
        project: Option<String>,

        /// Re-index even if the project is flagged as running.
        #[arg(long)]
        force: bool,
    },

    /// Similarity search over an indexed project.
    Query {
        /// Project id.
        project: String,

        /// Query text.
        text: String,

        /// Number of excerpts to return (default: `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question about an indexed project.
    ///
    /// Requires both an embedding provider and an LLM.
    Ask {
        /// Project id.
        project: String,

        /// The question.
        question: String,

        /// Number of excerpts to retrieve (default: `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Run the full pipeline on a repository.
    ///
    /// Stages with no configured provider are skipped. Ctrl-C cancels the
    /// run before its next stage. Exits non-zero when the run fails.
    Run {
        /// Local directory, `.zip` archive, or repository URL.
        source: String,

        /// Project id. Defaults to the source's directory name.
        #[arg(long)]
        project: Option<String>,

        /// What to write, e.g. "An introduction for new contributors".
        #[arg(long, default_value = "")]
        instructions: String,

        /// Output kind.
        #[arg(long, value_enum, default_value = "article")]
        kind: GenerationKind,

        /// Short project description passed to the writer.
        #[arg(long)]
        description: Option<String>,

        /// Print the final run context as JSON.
        #[arg(long)]
        json: bool,

        /// Start even if the project is flagged as running.
        #[arg(long)]
        force: bool,
    },

    /// List known projects.
    Projects,

    /// Delete a project's vectors and run history.
    Delete {
        /// Project id.
        project: String,

        /// Delete even if the project is flagged as running.
        #[arg(long)]
        force: bool,
    },
}

fn default_project(source: &str, project: Option<String>) -> String {
    project.unwrap_or_else(|| {
        let trimmed = source.trim_end_matches('/').trim_end_matches(".git");
        project_id_from_path(&PathBuf::from(trimmed))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Analyze { source, json } => commands::run_analyze(&cfg, &source, json).await?,
        Commands::Index {
            source,
            project,
            force,
        } => {
            let project = default_project(&source, project);
            commands::run_index(&cfg, &source, &project, force).await?;
        }
        Commands::Query {
            project,
            text,
            top_k,
        } => commands::run_query(&cfg, &project, &text, top_k).await?,
        Commands::Ask {
            project,
            question,
            top_k,
        } => commands::run_ask(&cfg, &project, &question, top_k).await?,
        Commands::Run {
            source,
            project,
            instructions,
            kind,
            description,
            json,
            force,
        } => {
            let project = default_project(&source, project);
            commands::run_pipeline(
                &cfg,
                RunArgs {
                    source,
                    project,
                    instructions,
                    kind,
                    description,
                    json,
                    force,
                },
            )
            .await?;
        }
        Commands::Projects => commands::run_projects(&cfg).await?,
        Commands::Delete { project, force } => {
            commands::run_delete(&cfg, &project, force).await?
        }
    }

    Ok(())
}
