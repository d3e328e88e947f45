//! Repository loader.
//!
//! Reads every text file of interest under a repository root, either a
//! directory walked with `walkdir` or a `.zip` archive read in place.
//! Output is sorted by `/`-separated relative path.
//!
//! Skipping rules, in order:
//! 1. Any path component in `exclude_dirs` (or ending in `.egg-info`).
//! 2. File names in [`DEFAULT_EXCLUDE_FILES`] and `exclude_globs` matches.
//! 3. Files that are neither a bare name from [`ALWAYS_INCLUDE`] nor have an
//!    extension in `include_extensions`, or whose extension is in
//!    `exclude_extensions`.
//! 4. Oversized files and binaries (NUL byte in the first 8 KiB), logged
//!    at `debug`.
//!
//! Files that cannot be read or are not valid UTF-8 become
//! [`PipelineError::Read`] entries in [`LoadOutcome::skipped`].

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};
use walkdir::WalkDir;

use repodoc_core::error::PipelineError;
use repodoc_core::models::SourceFile;

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".py", ".js", ".jsx", ".ts", ".tsx", ".mjs", ".java", ".kt", ".scala", ".go", ".rs", ".rb",
    ".php", ".c", ".h", ".cpp", ".hpp", ".cc", ".cs", ".csproj", ".swift", ".sh", ".md", ".rst",
    ".txt", ".toml", ".yaml", ".yml", ".json", ".cfg", ".ini", ".xml", ".gradle", ".mod",
    ".html", ".css", ".sql",
];

pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "venv",
    "env",
    ".venv",
    "node_modules",
    ".git",
    "__pycache__",
    ".pytest_cache",
    "build",
    "dist",
    ".egg-info",
    ".tox",
    "site-packages",
    ".next",
    "out",
    ".svelte-kit",
    "target",
    ".idea",
    ".vscode",
    ".gradle",
];

pub const DEFAULT_EXCLUDE_FILES: &[&str] = &[".DS_Store", "Thumbs.db", ".gitkeep"];

/// Extension-less names that are always loaded.
pub const ALWAYS_INCLUDE: &[&str] = &[
    "README",
    "LICENSE",
    "Dockerfile",
    "Makefile",
    "Gemfile",
    ".gitignore",
];

const BINARY_SNIFF_BYTES: usize = 8192;

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub max_file_size: u64,
    pub follow_symlinks: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            include_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_extensions: Vec::new(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
            exclude_globs: Vec::new(),
            max_file_size: 500_000,
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub files: Vec<SourceFile>,
    /// One `PipelineError::Read` per unreadable file.
    pub skipped: Vec<PipelineError>,
}

/// Load a repository from a directory or a `.zip` archive.
pub fn load_repository(root: &Path, opts: &LoaderOptions) -> Result<LoadOutcome, PipelineError> {
    if !root.exists() {
        return Err(PipelineError::config(format!(
            "repository path does not exist: {}",
            root.display()
        )));
    }

    let filter = PathFilter::new(opts)?;
    let mut outcome = if root.is_dir() {
        load_directory(root, opts, &filter)
    } else if is_zip(root) {
        load_zip(root, opts, &filter)?
    } else {
        return Err(PipelineError::config(format!(
            "repository path is neither a directory nor a .zip archive: {}",
            root.display()
        )));
    };

    outcome.files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(
        root = %root.display(),
        files = outcome.files.len(),
        skipped = outcome.skipped.len(),
        "repository loaded"
    );
    Ok(outcome)
}

fn is_zip(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false)
}

fn load_directory(root: &Path, opts: &LoaderOptions, filter: &PathFilter) -> LoadOutcome {
    let mut outcome = LoadOutcome::default();

    let walker = WalkDir::new(root)
        .follow_links(opts.follow_symlinks)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !filter.is_excluded_dir(&e.file_name().to_string_lossy())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                tracing::warn!(path = %path, error = %e, "unreadable directory entry");
                outcome.skipped.push(PipelineError::read(path, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = to_slash_path(relative);

        if !filter.accepts(&rel_str) {
            continue;
        }

        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                tracing::warn!(path = %rel_str, error = %e, "cannot stat file");
                outcome.skipped.push(PipelineError::read(&rel_str, e.to_string()));
                continue;
            }
        };
        if size > opts.max_file_size {
            tracing::debug!(path = %rel_str, size, "skipping oversized file");
            continue;
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %rel_str, error = %e, "cannot read file");
                outcome.skipped.push(PipelineError::read(&rel_str, e.to_string()));
                continue;
            }
        };
        push_text(&mut outcome, rel_str, bytes);
    }

    outcome
}

fn load_zip(
    archive_path: &Path,
    opts: &LoaderOptions,
    filter: &PathFilter,
) -> Result<LoadOutcome, PipelineError> {
    let file = File::open(archive_path).map_err(|e| {
        PipelineError::config(format!("cannot open archive {}: {}", archive_path.display(), e))
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        PipelineError::config(format!("invalid zip archive {}: {}", archive_path.display(), e))
    })?;

    let names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().and_then(|f| f.enclosed_name()))
        .map(|p| to_slash_path(&p))
        .collect();
    let prefix = common_top_dir(&names);

    let mut outcome = LoadOutcome::default();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(index = i, error = %e, "unreadable zip entry");
                outcome
                    .skipped
                    .push(PipelineError::read(format!("#{}", i), e.to_string()));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry.enclosed_name() else {
            tracing::debug!(name = entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let name = to_slash_path(&name);
        let rel_str = match &prefix {
            Some(p) => name.strip_prefix(p.as_str()).unwrap_or(&name).to_string(),
            None => name,
        };

        if !filter.accepts(&rel_str) {
            continue;
        }
        if entry.size() > opts.max_file_size {
            tracing::debug!(path = %rel_str, size = entry.size(), "skipping oversized file");
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut bytes) {
            tracing::warn!(path = %rel_str, error = %e, "cannot read zip entry");
            outcome.skipped.push(PipelineError::read(&rel_str, e.to_string()));
            continue;
        }
        push_text(&mut outcome, rel_str, bytes);
    }

    Ok(outcome)
}

fn push_text(outcome: &mut LoadOutcome, path: String, bytes: Vec<u8>) {
    if is_binary(&bytes) {
        tracing::debug!(path = %path, "skipping binary file");
        return;
    }
    let size = bytes.len() as u64;
    match String::from_utf8(bytes) {
        Ok(content) => outcome.files.push(SourceFile {
            path,
            content,
            size,
        }),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "file is not valid UTF-8");
            outcome.skipped.push(PipelineError::read(path, e.to_string()));
        }
    }
}

pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|&b| b == 0)
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `"repo-main/"` when every entry of an archive sits under that one
/// directory, as in GitHub source downloads.
fn common_top_dir(names: &[String]) -> Option<String> {
    let first = names.first()?;
    let (top, _) = first.split_once('/')?;
    let prefix = format!("{}/", top);
    names
        .iter()
        .all(|n| n.starts_with(&prefix) || *n == top)
        .then_some(prefix)
}

struct PathFilter {
    include_extensions: Vec<String>,
    exclude_extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_globs: GlobSet,
}

impl PathFilter {
    fn new(opts: &LoaderOptions) -> Result<Self, PipelineError> {
        let normalize = |exts: &[String]| -> Vec<String> {
            exts.iter()
                .map(|e| {
                    let e = e.to_lowercase();
                    if e.starts_with('.') {
                        e
                    } else {
                        format!(".{}", e)
                    }
                })
                .collect()
        };
        Ok(Self {
            include_extensions: normalize(&opts.include_extensions),
            exclude_extensions: normalize(&opts.exclude_extensions),
            exclude_dirs: opts.exclude_dirs.clone(),
            exclude_globs: build_globset(&opts.exclude_globs)
                .map_err(|e| PipelineError::config(format!("invalid exclude glob: {}", e)))?,
        })
    }

    fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
            || (name.ends_with(".egg-info") && self.exclude_dirs.iter().any(|d| d == ".egg-info"))
    }

    fn accepts(&self, rel_path: &str) -> bool {
        let mut parts: Vec<&str> = rel_path.split('/').collect();
        let Some(name) = parts.pop() else {
            return false;
        };
        if parts.iter().any(|dir| self.is_excluded_dir(dir)) {
            return false;
        }
        if DEFAULT_EXCLUDE_FILES.contains(&name) || self.exclude_globs.is_match(rel_path) {
            return false;
        }

        let ext = name
            .rfind('.')
            .filter(|&i| i > 0)
            .map(|i| name[i..].to_lowercase());
        match ext {
            Some(ext) if self.exclude_extensions.contains(&ext) => false,
            Some(ext) if self.include_extensions.contains(&ext) => true,
            _ => ALWAYS_INCLUDE.contains(&name),
        }
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, bytes: &[u8]) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn paths(outcome: &LoadOutcome) -> Vec<&str> {
        outcome.files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_loads_sorted_and_filters() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "src/main.py", b"print('hi')\n");
        write(root, "README.md", b"# demo\n");
        write(root, "LICENSE", b"MIT\n");
        write(root, "Dockerfile", b"FROM scratch\n");
        write(root, "node_modules/lib/index.js", b"module.exports = 1;\n");
        write(root, "pkg.egg-info/PKG-INFO.txt", b"x\n");
        write(root, "logo.png", b"\x89PNG");
        write(root, ".DS_Store", b"junk");
        write(root, "notes", b"no extension\n");

        let outcome = load_repository(root, &LoaderOptions::default()).unwrap();
        assert_eq!(
            paths(&outcome),
            vec!["Dockerfile", "LICENSE", "README.md", "src/main.py"]
        );
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.files[3].size, 12);
    }

    #[test]
    fn test_binary_and_oversized_are_not_errors() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "data.txt", b"abc\0def");
        write(root, "big.md", &vec![b'a'; 2048]);
        write(root, "ok.md", b"fine");

        let opts = LoaderOptions {
            max_file_size: 1024,
            ..LoaderOptions::default()
        };
        let outcome = load_repository(root, &opts).unwrap();
        assert_eq!(paths(&outcome), vec!["ok.md"]);
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_read_error() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "bad.py", &[0xff, 0xfe, b'a', b'b']);
        write(root, "good.py", b"x = 1\n");

        let outcome = load_repository(root, &LoaderOptions::default()).unwrap();
        assert_eq!(paths(&outcome), vec!["good.py"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(matches!(
            &outcome.skipped[0],
            PipelineError::Read { path, .. } if path == "bad.py"
        ));
    }

    #[test]
    fn test_exclude_extensions_and_globs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "a.py", b"a\n");
        write(root, "b.json", b"{}\n");
        write(root, "docs/gen/api.md", b"# api\n");
        write(root, "docs/guide.md", b"# guide\n");

        let opts = LoaderOptions {
            exclude_extensions: vec!["json".to_string()],
            exclude_globs: vec!["docs/gen/**".to_string()],
            ..LoaderOptions::default()
        };
        let outcome = load_repository(root, &opts).unwrap();
        assert_eq!(paths(&outcome), vec!["a.py", "docs/guide.md"]);
    }

    #[test]
    fn test_missing_root_is_config_error() {
        let err = load_repository(Path::new("/no/such/repo"), &LoaderOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_plain_file_root_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("notes.txt");
        std::fs::write(&file, "hello").unwrap();
        let err = load_repository(&file, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let outcome = load_repository(tmp.path(), &LoaderOptions::default()).unwrap();
        assert!(outcome.files.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_zip_archive_strips_top_directory() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("repo.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("demo-main/README.md", options).unwrap();
            zip.write_all(b"# demo\n").unwrap();
            zip.start_file("demo-main/src/lib.rs", options).unwrap();
            zip.write_all(b"pub fn f() {}\n").unwrap();
            zip.start_file("demo-main/target/debug/out.rs", options).unwrap();
            zip.write_all(b"// build output\n").unwrap();
            zip.start_file("demo-main/icon.bin.txt", options).unwrap();
            zip.write_all(b"\0\0\0").unwrap();
            zip.finish().unwrap();
        }

        let outcome = load_repository(&archive, &LoaderOptions::default()).unwrap();
        assert_eq!(paths(&outcome), vec!["README.md", "src/lib.rs"]);
    }

    #[test]
    fn test_common_top_dir() {
        let names = vec!["a/x.py".to_string(), "a/b/y.py".to_string()];
        assert_eq!(common_top_dir(&names), Some("a/".to_string()));
        let mixed = vec!["a/x.py".to_string(), "z.py".to_string()];
        assert_eq!(common_top_dir(&mixed), None);
        assert_eq!(common_top_dir(&[]), None);
    }
}
