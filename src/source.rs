//! Source resolution: turn a user-supplied source string into a local path
//! the loader can read.
//!
//! A source is one of:
//! - a local directory, used in place
//! - a `.zip` archive, read in place by the loader
//! - a GitHub URL or any `https://` URL ending in `.git`, shallow-cloned
//!   with the system `git` into `<cache_dir>/<sha256-prefix>`. An existing clone is
//!   fetched and hard-reset instead of cloned again.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;

static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(www\.)?github\.com/[\w-]+/[\w.-]+/?$").expect("Invalid regex")
});
static GIT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://[^\s]+\.git/?$").expect("Invalid regex"));

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("failed to execute 'git {0}'. Is git installed?")]
    Spawn(&'static str, #[source] std::io::Error),

    #[error("git {op} failed: {stderr}")]
    Git { op: &'static str, stderr: String },

    #[error("failed to create cache directory {path}: {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    Remote(String),
}

impl Source {
    pub fn parse(input: &str) -> Result<Self, SourceError> {
        let looks_remote = input.starts_with("http://")
            || input.starts_with("https://")
            || input.starts_with("git@");
        if !looks_remote {
            return Ok(Source::Local(PathBuf::from(input)));
        }
        if is_valid_repo_url(input) {
            Ok(Source::Remote(input.trim_end_matches('/').to_string()))
        } else {
            Err(SourceError::InvalidUrl(input.to_string()))
        }
    }
}

pub fn is_valid_repo_url(url: &str) -> bool {
    GITHUB_URL.is_match(url) || GIT_URL.is_match(url)
}

/// Resolve `input` to a local directory or archive path, cloning remote
/// repositories under `cache_dir`.
///
/// Local paths are returned unchecked; the loader reports missing paths.
pub fn resolve(input: &str, cache_dir: &Path) -> Result<PathBuf, SourceError> {
    match Source::parse(input)? {
        Source::Local(path) => Ok(path),
        Source::Remote(url) => {
            let dest = cache_dir.join(short_hash(&url));
            if dest.join(".git").exists() {
                tracing::info!(url = %url, dest = %dest.display(), "updating cached clone");
                git_update(&dest)?;
            } else {
                tracing::info!(url = %url, dest = %dest.display(), "cloning repository");
                git_clone(&url, &dest)?;
            }
            Ok(dest)
        }
    }
}

fn git_clone(url: &str, dest: &Path) -> Result<(), SourceError> {
    std::fs::create_dir_all(dest).map_err(|source| SourceError::Cache {
        path: dest.display().to_string(),
        source,
    })?;

    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--single-branch"])
        .arg(url)
        .arg(dest)
        .output()
        .map_err(|e| SourceError::Spawn("clone", e))?;
    check("clone", &output)
}

fn git_update(repo_dir: &Path) -> Result<(), SourceError> {
    let output = Command::new("git")
        .args(["fetch", "--depth", "1", "origin"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| SourceError::Spawn("fetch", e))?;
    check("fetch", &output)?;

    let output = Command::new("git")
        .args(["reset", "--hard", "FETCH_HEAD"])
        .current_dir(repo_dir)
        .output()
        .map_err(|e| SourceError::Spawn("reset", e))?;
    check("reset", &output)
}

fn check(op: &'static str, output: &std::process::Output) -> Result<(), SourceError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(SourceError::Git {
            op,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// First 12 hex chars of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(is_valid_repo_url("https://github.com/rust-lang/cargo"));
        assert!(is_valid_repo_url("https://www.github.com/user/my.repo/"));
        assert!(is_valid_repo_url("https://gitlab.com/group/project.git"));
        assert!(!is_valid_repo_url("https://github.com/user"));
        assert!(!is_valid_repo_url("https://example.com/not-a-repo"));
        assert!(!is_valid_repo_url("http://gitlab.com/group/project.git"));
    }

    #[test]
    fn test_parse_local_and_remote() {
        assert_eq!(
            Source::parse("./my-repo").unwrap(),
            Source::Local(PathBuf::from("./my-repo"))
        );
        assert_eq!(
            Source::parse("https://github.com/a/b/").unwrap(),
            Source::Remote("https://github.com/a/b".to_string())
        );
        assert!(matches!(
            Source::parse("https://example.com/x"),
            Err(SourceError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_local_source_resolves_in_place() {
        let path = resolve("/srv/code/app", Path::new("/tmp/cache")).unwrap();
        assert_eq!(path, PathBuf::from("/srv/code/app"));
    }

    #[test]
    fn test_short_hash_stable() {
        let h = short_hash("https://github.com/a/b");
        assert_eq!(h.len(), 12);
        assert_eq!(h, short_hash("https://github.com/a/b"));
        assert_ne!(h, short_hash("https://github.com/a/c"));
    }
}
