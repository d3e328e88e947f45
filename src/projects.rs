//! Project run registry.
//!
//! The `projects` table carries one status flag per project; the `runs`
//! table keeps the outcome of every run. [`begin_run`] flips a project to
//! `running` in a single conditional `UPDATE`, so two callers racing for the
//! same project cannot both start a run.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::db::now_ts;
use crate::pipeline::{PipelineContext, PipelineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Idle,
    Running,
    Complete,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => bail!("unknown project status: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRecord {
    pub id: String,
    pub repo_path: String,
    pub status: ProjectStatus,
    pub project_type: Option<String>,
    pub total_files: Option<i64>,
    pub last_run_id: Option<String>,
    pub updated_at: i64,
}

const HELD_MESSAGE: &str = "already has a run in progress. Use --force to override a stale flag.";

/// Create the project row if needed and flip it to `running` inside `tx`.
/// The conditional `UPDATE` is the only writer of `running`, so two callers
/// racing for one project cannot both claim it.
async fn claim_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: &str,
    repo_path: &str,
    run_id: Option<&str>,
    force: bool,
) -> Result<()> {
    let now = now_ts();

    sqlx::query(
        r#"
        INSERT INTO projects (id, repo_path, status, created_at, updated_at)
        VALUES (?, ?, 'idle', ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(project_id)
    .bind(repo_path)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let claimed = sqlx::query(
        r#"
        UPDATE projects
        SET status = 'running',
            repo_path = ?,
            last_run_id = COALESCE(?, last_run_id),
            updated_at = ?
        WHERE id = ? AND (status != 'running' OR ?)
        "#,
    )
    .bind(repo_path)
    .bind(run_id)
    .bind(now)
    .bind(project_id)
    .bind(force)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if claimed == 0 {
        bail!("Project '{}' {}", project_id, HELD_MESSAGE);
    }
    Ok(())
}

/// Register `run_id` as the active run of `project_id`, creating the project
/// if needed. Fails if a run is already in progress unless `force` is set.
/// Nothing is written when any step fails.
pub async fn begin_run(
    pool: &SqlitePool,
    project_id: &str,
    repo_path: &str,
    run_id: &str,
    force: bool,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    claim_in_tx(&mut tx, project_id, repo_path, Some(run_id), force).await?;

    sqlx::query("INSERT INTO runs (id, project_id, state, started_at) VALUES (?, ?, ?, ?)")
        .bind(run_id)
        .bind(project_id)
        .bind(PipelineState::Start.as_str())
        .bind(now_ts())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Hold a project's flag for work outside a pipeline run, such as a
/// standalone re-index. Pair with [`release_project`].
pub async fn claim_project(
    pool: &SqlitePool,
    project_id: &str,
    repo_path: &str,
    force: bool,
) -> Result<()> {
    let mut tx = pool.begin().await?;
    claim_in_tx(&mut tx, project_id, repo_path, None, force).await?;
    tx.commit().await?;
    Ok(())
}

pub async fn release_project(pool: &SqlitePool, project_id: &str, status: ProjectStatus) -> Result<()> {
    sqlx::query("UPDATE projects SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_ts())
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Store a terminal run and release the project's flag.
pub async fn finish_run(pool: &SqlitePool, ctx: &PipelineContext) -> Result<()> {
    let now = now_ts();
    let status = if ctx.state == PipelineState::Failed {
        ProjectStatus::Failed
    } else {
        ProjectStatus::Complete
    };

    let mut errors = ctx.errors.clone();
    errors.extend(ctx.failure.clone());
    let errors_json = serde_json::to_string(&errors)?;

    sqlx::query(
        r#"
        UPDATE runs
        SET state = ?, partial = ?, errors_json = ?, generated_text = ?, finished_at = ?
        WHERE id = ?
        "#,
    )
    .bind(ctx.state.as_str())
    .bind(ctx.partial)
    .bind(&errors_json)
    .bind(&ctx.generated_text)
    .bind(now)
    .bind(&ctx.run_id)
    .execute(pool)
    .await?;

    let project_type = ctx.analysis.as_ref().map(|a| a.project_type.label());
    let total_files = ctx.analysis.as_ref().map(|a| a.total_files as i64);

    sqlx::query(
        r#"
        UPDATE projects
        SET status = ?,
            project_type = COALESCE(?, project_type),
            total_files = COALESCE(?, total_files),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(project_type)
    .bind(total_files)
    .bind(now)
    .bind(&ctx.project_id)
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<ProjectRecord> {
    let status: String = row.get("status");
    Ok(ProjectRecord {
        id: row.get("id"),
        repo_path: row.get("repo_path"),
        status: ProjectStatus::parse(&status)?,
        project_type: row.get("project_type"),
        total_files: row.get("total_files"),
        last_run_id: row.get("last_run_id"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<ProjectRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, repo_path, status, project_type, total_files, last_run_id, updated_at
        FROM projects
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(row_to_record).collect()
}

pub async fn get_project(pool: &SqlitePool, project_id: &str) -> Result<Option<ProjectRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, repo_path, status, project_type, total_files, last_run_id, updated_at
        FROM projects
        WHERE id = ?
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_record).transpose()
}

/// Remove a project's runs and registry row. Returns `false` when the
/// project was unknown. Refuses a project with a run in progress unless
/// `force` is set. Vectors are dropped separately through the index.
pub async fn delete_project(pool: &SqlitePool, project_id: &str, force: bool) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(&mut *tx)
        .await?;
    if status.as_deref() == Some(ProjectStatus::Running.as_str()) && !force {
        bail!("Project '{}' {}", project_id, HELD_MESSAGE);
    }

    sqlx::query("DELETE FROM runs WHERE project_id = ?")
        .bind(project_id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(deleted > 0)
}
