//! Repository structure analysis.
//!
//! Turns the loader's file list into a [`RepositoryState`]: per-file
//! statistics, language and extension histograms, a [`ProjectType`]
//! classification, README detection, dependency extraction, structure
//! flags, missing community files, and best-practice flags.
//!
//! Everything here is pure and deterministic. The same file list always
//! produces the same state, which is what the orchestrator relies on when
//! it treats the analysis as read-only for the rest of a run.
//!
//! # Project type rules
//!
//! Evaluated in order, first match wins:
//!
//! | Rule | Type |
//! |------|------|
//! | `setup.py`, `pyproject.toml`, `requirements.txt` | Python Library |
//! | `package.json` | Node.js/JavaScript |
//! | `pom.xml`, `build.gradle` | Java/JVM |
//! | `go.mod` | Go |
//! | `Cargo.toml` | Rust |
//! | `*.cs`, `*.csproj` | C# / .NET |
//! | `Dockerfile` | Docker/Container |
//! | more `.py` than `.js` files | Python |
//! | any `.js` file | JavaScript |
//! | otherwise | Unknown |

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::SourceFile;
use crate::profile::ProjectType;

const MAX_NAMES_PER_FILE: usize = 10;
const MAX_DEPS_PER_ECOSYSTEM: usize = 5;
const LONG_LINE_CHARS: usize = 100;

// ============ Languages ============

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    CSharp,
    Ruby,
    Shell,
    Markdown,
    Text,
    Json,
    Yaml,
    Toml,
    Xml,
    Html,
    Css,
    Unknown,
}

impl Language {
    pub fn from_path(path: &str) -> Self {
        match extension(path).as_deref() {
            Some("py") => Self::Python,
            Some("js" | "mjs" | "cjs" | "jsx") => Self::JavaScript,
            Some("ts" | "tsx") => Self::TypeScript,
            Some("java") => Self::Java,
            Some("go") => Self::Go,
            Some("rs") => Self::Rust,
            Some("cs") => Self::CSharp,
            Some("rb") => Self::Ruby,
            Some("sh" | "bash") => Self::Shell,
            Some("md" | "markdown") => Self::Markdown,
            Some("txt" | "rst") => Self::Text,
            Some("json") => Self::Json,
            Some("yaml" | "yml") => Self::Yaml,
            Some("toml") => Self::Toml,
            Some("xml") => Self::Xml,
            Some("html" | "htm") => Self::Html,
            Some("css" | "scss") => Self::Css,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Shell => "shell",
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Css => "css",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct LanguagePatterns {
    imports: Regex,
    functions: Regex,
    classes: Regex,
    asynchronous: Regex,
}

impl LanguagePatterns {
    fn new(imports: &str, functions: &str, classes: &str, asynchronous: &str) -> Self {
        Self {
            imports: Regex::new(imports).expect("Invalid regex"),
            functions: Regex::new(functions).expect("Invalid regex"),
            classes: Regex::new(classes).expect("Invalid regex"),
            asynchronous: Regex::new(asynchronous).expect("Invalid regex"),
        }
    }
}

static PYTHON_PATTERNS: LazyLock<LanguagePatterns> = LazyLock::new(|| {
    LanguagePatterns::new(
        r"(?m)^\s*(?:from|import)\s+",
        r"(?m)^\s*(?:async\s+)?def\s+(\w+)",
        r"(?m)^\s*class\s+(\w+)",
        r"(?m)^\s*async\s+def\b",
    )
});

static JS_PATTERNS: LazyLock<LanguagePatterns> = LazyLock::new(|| {
    LanguagePatterns::new(
        r"(?m)^\s*import\s|\brequire\s*\(",
        r"\bfunction\s*\*?\s*(\w+)|\b(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s*)?(?:function\b|\([^)]*\)\s*=>|\w+\s*=>)",
        r"\bclass\s+(\w+)",
        r"\basync\s+|\bawait\s+",
    )
});

static RUST_PATTERNS: LazyLock<LanguagePatterns> = LazyLock::new(|| {
    LanguagePatterns::new(
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+",
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)",
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+(\w+)",
        r"\basync\s+(?:fn|move|\{)|\.await\b",
    )
});

static GO_PATTERNS: LazyLock<LanguagePatterns> = LazyLock::new(|| {
    LanguagePatterns::new(
        r#"(?m)^\s*import\s|^\s+"[\w./-]+"\s*$"#,
        r"(?m)^func\s+(?:\([^)]*\)\s*)?(\w+)",
        r"(?m)^type\s+(\w+)\s+(?:struct|interface)\b",
        r"(?m)\bgo\s+\w+|\bchan\b",
    )
});

static JAVA_PATTERNS: LazyLock<LanguagePatterns> = LazyLock::new(|| {
    LanguagePatterns::new(
        r"(?m)^import\s+",
        r"(?m)^\s*(?:(?:public|private|protected|static|final|synchronized|abstract)\s+)*[\w<>\[\],\s]+?\s+(\w+)\s*\([^)]*\)\s*(?:throws\s+[\w.,\s]+)?\{",
        r"\b(?:class|interface|enum|record)\s+(\w+)",
        r"\bCompletableFuture\b|@Async\b",
    )
});

fn patterns_for(language: Language) -> Option<&'static LanguagePatterns> {
    match language {
        Language::Python => Some(&PYTHON_PATTERNS),
        Language::JavaScript | Language::TypeScript => Some(&JS_PATTERNS),
        Language::Rust => Some(&RUST_PATTERNS),
        Language::Go => Some(&GO_PATTERNS),
        Language::Java => Some(&JAVA_PATTERNS),
        _ => None,
    }
}

// ============ Per-file statistics ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Complexity {
    /// Deepest indentation level seen, in units of four columns.
    pub nested_depth: usize,
    pub long_lines: usize,
    pub comment_lines: usize,
    pub empty_lines: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub language: Language,
    pub lines: usize,
    /// Up to ten distinct function names, sorted.
    pub functions: Vec<String>,
    /// Up to ten distinct class / type names, sorted.
    pub classes: Vec<String>,
    pub imports: usize,
    pub has_async: bool,
    pub complexity: Complexity,
}

/// Compute statistics for a single file.
pub fn analyze_file(file: &SourceFile) -> FileEntry {
    let language = Language::from_path(&file.path);
    let content = file.content.as_str();

    let (functions, classes, imports, has_async) = match patterns_for(language) {
        Some(p) => (
            capture_names(&p.functions, content),
            capture_names(&p.classes, content),
            p.imports.find_iter(content).count(),
            p.asynchronous.is_match(content),
        ),
        None => (Vec::new(), Vec::new(), 0, false),
    };

    FileEntry {
        path: file.path.clone(),
        size: file.size,
        language,
        lines: content.lines().count(),
        functions,
        classes,
        imports,
        has_async,
        complexity: complexity(content),
    }
}

/// Distinct names from the first matching capture group of each match.
fn capture_names(re: &Regex, content: &str) -> Vec<String> {
    let names: BTreeSet<String> = re
        .captures_iter(content)
        .filter_map(|caps| {
            caps.iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().to_string())
        })
        .collect();
    names.into_iter().take(MAX_NAMES_PER_FILE).collect()
}

fn complexity(content: &str) -> Complexity {
    let mut c = Complexity::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            c.empty_lines += 1;
            continue;
        }
        let indent: usize = line
            .chars()
            .take_while(|ch| ch.is_whitespace())
            .map(|ch| if ch == '\t' { 4 } else { 1 })
            .sum();
        c.nested_depth = c.nested_depth.max(indent / 4);
        if line.chars().count() > LONG_LINE_CHARS {
            c.long_lines += 1;
        }
        if trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with("/*") {
            c.comment_lines += 1;
        }
    }
    c
}

// ============ Repository state ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readme {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureFlags {
    pub has_src: bool,
    pub has_tests: bool,
    pub has_docs: bool,
    pub has_examples: bool,
    pub has_docker: bool,
    pub has_ci: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestPractices {
    pub has_changelog: bool,
    pub has_security_policy: bool,
    pub has_pull_request_template: bool,
    pub has_issue_templates: bool,
    pub has_code_of_conduct: bool,
    pub has_badges: bool,
}

/// Something a well-kept repository usually has and this one lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum MissingItem {
    /// A repository-level file or directory, e.g. `LICENSE`.
    Repository(String),
    /// A README section, e.g. `Installation`.
    ReadmeSection(String),
}

impl std::fmt::Display for MissingItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repository(name) => write!(f, "Missing: {}", name),
            Self::ReadmeSection(name) => write!(f, "README missing: {} section", name),
        }
    }
}

/// Result of analyzing one repository. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub root: String,
    /// Ordered by path.
    pub files: Vec<FileEntry>,
    pub languages: BTreeMap<Language, usize>,
    /// Files per extension, keyed with the leading dot (`".py"`).
    pub extensions: BTreeMap<String, usize>,
    pub total_files: usize,
    pub total_lines: usize,
    pub total_bytes: u64,
    pub project_type: ProjectType,
    pub readme: Option<Readme>,
    /// Ecosystem (`"python"`, `"node"`, ...) to at most five package names.
    pub dependencies: BTreeMap<String, Vec<String>>,
    pub structure: StructureFlags,
    pub missing: Vec<MissingItem>,
    pub best_practices: BestPractices,
}

impl RepositoryState {
    /// State for a repository with no readable files.
    pub fn empty(root: &str) -> Self {
        analyze_repository(root, &[])
    }

    pub fn readme_text(&self) -> &str {
        self.readme.as_ref().map(|r| r.content.as_str()).unwrap_or("")
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .is_ok()
    }

    /// Languages ordered by file count, most common first.
    pub fn top_languages(&self, n: usize) -> Vec<Language> {
        let mut langs: Vec<(Language, usize)> = self
            .languages
            .iter()
            .filter(|(l, _)| **l != Language::Unknown)
            .map(|(l, c)| (*l, *c))
            .collect();
        langs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        langs.into_iter().take(n).map(|(l, _)| l).collect()
    }
}

/// Analyze a loaded repository.
///
/// `root` is only recorded; no filesystem access happens here.
pub fn analyze_repository(root: &str, files: &[SourceFile]) -> RepositoryState {
    let mut entries: Vec<FileEntry> = files.iter().map(analyze_file).collect();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut languages = BTreeMap::new();
    let mut extensions = BTreeMap::new();
    for entry in &entries {
        *languages.entry(entry.language).or_insert(0) += 1;
        if let Some(ext) = extension(&entry.path) {
            *extensions.entry(format!(".{}", ext)).or_insert(0) += 1;
        }
    }

    let paths: Vec<String> = entries.iter().map(|e| e.path.to_lowercase()).collect();
    let readme = find_readme(files);
    let readme_text = readme.as_ref().map(|r| r.content.as_str()).unwrap_or("");
    let structure = analyze_structure(&paths);

    RepositoryState {
        root: root.to_string(),
        total_files: entries.len(),
        total_lines: entries.iter().map(|e| e.lines).sum(),
        total_bytes: entries.iter().map(|e| e.size).sum(),
        project_type: detect_project_type(&paths, &extensions),
        dependencies: extract_dependencies(files),
        missing: check_missing(&paths, &structure, readme_text, readme.is_some()),
        best_practices: check_best_practices(&paths, readme_text),
        structure,
        readme,
        languages,
        extensions,
        files: entries,
    }
}

fn find_readme(files: &[SourceFile]) -> Option<Readme> {
    files
        .iter()
        .filter(|f| !f.path.contains('/') && f.path.to_lowercase().starts_with("readme"))
        .min_by(|a, b| a.path.cmp(&b.path))
        .map(|f| Readme {
            path: f.path.clone(),
            content: f.content.clone(),
        })
}

/// Apply the ordered project-type rules. `paths` must be lower-cased.
pub fn detect_project_type(paths: &[String], extensions: &BTreeMap<String, usize>) -> ProjectType {
    const RULES: &[(&[&str], ProjectType)] = &[
        (
            &["setup.py", "pyproject.toml", "requirements.txt"],
            ProjectType::PythonLibrary,
        ),
        (&["package.json"], ProjectType::Node),
        (&["pom.xml", "build.gradle"], ProjectType::Jvm),
        (&["go.mod"], ProjectType::Go),
        (&["cargo.toml"], ProjectType::Rust),
    ];

    let names: Vec<&str> = paths.iter().map(|p| file_name(p)).collect();
    for (manifests, project_type) in RULES {
        if names.iter().any(|n| manifests.contains(n)) {
            return *project_type;
        }
    }

    let count = |ext: &str| extensions.get(ext).copied().unwrap_or(0);
    if count(".cs") > 0 || count(".csproj") > 0 {
        return ProjectType::DotNet;
    }
    if names.contains(&"dockerfile") {
        return ProjectType::Docker;
    }
    if count(".py") > count(".js") {
        ProjectType::Python
    } else if count(".js") > 0 {
        ProjectType::JavaScript
    } else {
        ProjectType::Unknown
    }
}

fn analyze_structure(paths: &[String]) -> StructureFlags {
    let starts = |prefixes: &[&str]| paths.iter().any(|p| prefixes.iter().any(|x| p.starts_with(x)));

    StructureFlags {
        has_src: starts(&["src/", "lib/"]),
        has_tests: paths.iter().any(|p| is_test_path(p)),
        has_docs: starts(&["docs/", "doc/", "documentation/"]),
        has_examples: starts(&["examples/", "example/", "samples/", "sample/"]),
        has_docker: paths.iter().any(|p| {
            let name = file_name(p);
            name == "dockerfile" || name.starts_with("docker-compose")
        }),
        has_ci: paths.iter().any(|p| {
            p.starts_with(".github/workflows/")
                || p.starts_with(".circleci/")
                || p.starts_with(".gitlab-ci")
                || p.starts_with(".travis")
                || file_name(p) == "jenkinsfile"
        }),
    }
}

fn is_test_path(path: &str) -> bool {
    path.split('/').any(|part| {
        matches!(part, "test" | "tests" | "__tests__" | "spec")
            || part.starts_with("test_")
            || part.contains("_test.")
            || part.contains(".test.")
            || part.contains(".spec.")
    })
}

fn check_missing(
    paths: &[String],
    structure: &StructureFlags,
    readme: &str,
    has_readme: bool,
) -> Vec<MissingItem> {
    let any_name = |pred: &dyn Fn(&str) -> bool| paths.iter().any(|p| pred(file_name(p)));

    let repository_checks: [(&str, bool); 8] = [
        (
            "LICENSE",
            any_name(&|n| n.starts_with("license") || n.starts_with("licence") || n == "copying"),
        ),
        ("CONTRIBUTING.md", any_name(&|n| n.starts_with("contributing"))),
        ("CODE_OF_CONDUCT.md", any_name(&|n| n.contains("conduct"))),
        ("Tests", structure.has_tests),
        ("Documentation", structure.has_docs),
        ("Examples", structure.has_examples),
        ("CI/CD", structure.has_ci),
        (".gitignore", any_name(&|n| n == ".gitignore")),
    ];

    let mut missing: Vec<MissingItem> = repository_checks
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| MissingItem::Repository(name.to_string()))
        .collect();

    if has_readme {
        let lower = readme.to_lowercase();
        let has = |keys: &[&str]| keys.iter().any(|k| lower.contains(k));
        let section_checks: [(&str, bool); 5] = [
            ("Installation", has(&["install"])),
            ("Usage", has(&["usage", "how to use"])),
            ("Features", has(&["feature", "capabilities"])),
            ("Contributing", has(&["contribut"])),
            ("License", has(&["license", "licence"])),
        ];
        missing.extend(
            section_checks
                .iter()
                .filter(|(_, present)| !present)
                .map(|(name, _)| MissingItem::ReadmeSection(name.to_string())),
        );
    }

    missing
}

fn check_best_practices(paths: &[String], readme: &str) -> BestPractices {
    let any = |pred: &dyn Fn(&str) -> bool| paths.iter().any(|p| pred(p));
    let readme_lower = readme.to_lowercase();

    BestPractices {
        has_changelog: any(&|p| {
            let n = file_name(p);
            n.starts_with("changelog") || n.starts_with("history") || n.starts_with("changes")
        }),
        has_security_policy: any(&|p| file_name(p).starts_with("security")),
        has_pull_request_template: any(&|p| p.contains("pull_request_template")),
        has_issue_templates: any(&|p| p.contains("issue_template")),
        has_code_of_conduct: any(&|p| file_name(p).contains("conduct")),
        has_badges: readme_lower.contains("![")
            && ["badge", "shields.io", "coverage", "build"]
                .iter()
                .any(|k| readme_lower.contains(k)),
    }
}

// ============ Dependencies ============

static SETUP_PY_REQUIRES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)install_requires\s*=\s*\[(.*?)\]").expect("Invalid regex"));

/// Extract dependency names from root-level manifests.
pub fn extract_dependencies(files: &[SourceFile]) -> BTreeMap<String, Vec<String>> {
    let mut deps: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for file in files {
        let (ecosystem, names) = match file.path.to_lowercase().as_str() {
            "requirements.txt" => ("python", requirements_deps(&file.content)),
            "setup.py" => ("python", setup_py_deps(&file.content)),
            "pyproject.toml" => ("python", pyproject_deps(&file.content)),
            "package.json" => ("node", package_json_deps(&file.content)),
            "gemfile" => ("ruby", gemfile_deps(&file.content)),
            "go.mod" => ("go", go_mod_deps(&file.content)),
            "cargo.toml" => ("rust", cargo_deps(&file.content)),
            _ => continue,
        };
        deps.entry(ecosystem.to_string()).or_default().extend(names);
    }

    deps.into_iter()
        .filter_map(|(ecosystem, names)| {
            let mut seen = BTreeSet::new();
            let unique: Vec<String> = names
                .into_iter()
                .filter(|n| !n.is_empty() && seen.insert(n.clone()))
                .take(MAX_DEPS_PER_ECOSYSTEM)
                .collect();
            (!unique.is_empty()).then_some((ecosystem, unique))
        })
        .collect()
}

/// Strip a PEP 508 requirement down to its distribution name.
fn python_requirement_name(spec: &str) -> String {
    spec.trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .split(|c: char| "=<>~!;[ (".contains(c))
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn requirements_deps(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
        .map(python_requirement_name)
        .collect()
}

fn setup_py_deps(content: &str) -> Vec<String> {
    SETUP_PY_REQUIRES
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split(',').map(python_requirement_name).collect())
        .unwrap_or_default()
}

fn pyproject_deps(content: &str) -> Vec<String> {
    let Ok(doc) = content.parse::<toml::Table>() else {
        return Vec::new();
    };
    let mut names = Vec::new();
    if let Some(list) = doc
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        names.extend(
            list.iter()
                .filter_map(|v| v.as_str())
                .map(python_requirement_name),
        );
    }
    if let Some(table) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(table.keys().filter(|k| *k != "python").cloned());
    }
    names
}

fn package_json_deps(content: &str) -> Vec<String> {
    serde_json::from_str::<serde_json::Value>(content)
        .ok()
        .and_then(|pkg| {
            pkg.get("dependencies")
                .and_then(|d| d.as_object())
                .map(|deps| deps.keys().cloned().collect())
        })
        .unwrap_or_default()
}

fn gemfile_deps(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("gem "))
        .filter_map(|l| l.split_whitespace().nth(1))
        .map(|name| {
            name.trim_matches(|c| c == '\'' || c == '"' || c == ',')
                .to_string()
        })
        .collect()
}

fn go_mod_deps(content: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut in_block = false;
    for line in content.lines().map(str::trim) {
        if line.starts_with("//") || line.is_empty() {
            continue;
        }
        if in_block {
            if line == ")" {
                in_block = false;
            } else if let Some(module) = line.split_whitespace().next() {
                names.push(module.to_string());
            }
        } else if line == "require (" || line == "require(" {
            in_block = true;
        } else if let Some(rest) = line.strip_prefix("require ") {
            if let Some(module) = rest.split_whitespace().next() {
                names.push(module.to_string());
            }
        }
    }
    names
}

fn cargo_deps(content: &str) -> Vec<String> {
    let Ok(doc) = content.parse::<toml::Table>() else {
        return Vec::new();
    };
    let mut names: Vec<String> = doc
        .get("dependencies")
        .and_then(|d| d.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default();
    if let Some(t) = doc
        .get("workspace")
        .and_then(|w| w.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(t.keys().cloned());
    }
    names
}

// ============ Path helpers ============

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lower-cased extension without the dot. Dotfiles such as `.gitignore`
/// have no extension.
fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(name[idx + 1..].to_ascii_lowercase()),
    }
}
