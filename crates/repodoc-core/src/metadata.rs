//! Metadata suggestions for a repository listing.
//!
//! Derives title alternatives, a one-line summary, and tags from the
//! README text, the project type, and extracted dependencies.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::analyze::{Language, RepositoryState};
use crate::profile::ProjectType;

const MAX_TITLES: usize = 4;
const MAX_TAGS: usize = 8;

/// README keywords that imply a topical tag.
const KEYWORD_TAGS: &[(&str, &[&str])] = &[
    (
        "machine-learning",
        &["machine learning", "deep learning", "neural", "tensorflow", "pytorch"],
    ),
    ("data", &["database", "sql", "analytics", "dataset"]),
    ("api", &["api", "rest", "graphql", "http"]),
    ("web", &["frontend", "react", "vue", "angular", "web app"]),
    ("devops", &["docker", "kubernetes", "ci/cd", "deploy"]),
    ("testing", &["pytest", "jest", "unittest", "test suite"]),
    ("async", &["async", "concurrent", "threading"]),
    ("cli", &["command line", "command-line", " cli", "terminal"]),
];

/// Well-known dependencies mapped to a broader tag.
const DEPENDENCY_TAGS: &[(&str, &str)] = &[
    ("django", "web-framework"),
    ("flask", "web-framework"),
    ("fastapi", "web-framework"),
    ("express", "web-framework"),
    ("axum", "web-framework"),
    ("numpy", "data-science"),
    ("pandas", "data-science"),
    ("scikit-learn", "data-science"),
    ("tensorflow", "ml"),
    ("torch", "ml"),
    ("keras", "ml"),
    ("tokio", "async"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReasoning {
    pub detected_type: String,
    pub languages: Vec<Language>,
    pub main_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSuggestion {
    pub title_alternatives: Vec<String>,
    pub one_line_summary: String,
    pub tags: Vec<String>,
    pub project_type: ProjectType,
    pub reasoning: MetadataReasoning,
}

pub fn suggest(state: &RepositoryState) -> MetadataSuggestion {
    let readme = state.readme_text();
    let main_dependencies = state
        .dependencies
        .values()
        .flat_map(|deps| deps.iter().take(3).cloned())
        .take(3)
        .collect();

    MetadataSuggestion {
        title_alternatives: titles(readme, state.project_type),
        one_line_summary: summary(readme, state.project_type),
        tags: tags(state),
        project_type: state.project_type,
        reasoning: MetadataReasoning {
            detected_type: state.project_type.label().to_string(),
            languages: state.top_languages(5),
            main_dependencies,
        },
    }
}

/// First word of the README's first heading, or `"Project"`.
pub fn project_name(readme: &str) -> String {
    readme
        .lines()
        .next()
        .map(|l| l.replace('#', ""))
        .and_then(|l| l.split_whitespace().next().map(str::to_string))
        .unwrap_or_else(|| "Project".to_string())
}

fn titles(readme: &str, project_type: ProjectType) -> Vec<String> {
    let name = project_name(readme);
    let mut titles: Vec<String> = Vec::new();
    let mut push = |t: String| {
        if !t.is_empty() && !titles.contains(&t) {
            titles.push(t);
        }
    };

    let mut lines = readme.lines().map(|l| l.replace('#', "").trim().to_string());
    if let Some(first) = lines.next() {
        if first.chars().count() < 100 {
            push(first);
        }
    }

    if let Some(prefix) = project_type.profile().title_prefix {
        push(format!("{}: {}", prefix, name));
    }

    for line in lines.take(9) {
        let len = line.chars().count();
        if len > 20 && len < 80 && !line.starts_with("- ") {
            push(line);
        }
    }

    let lower = readme.to_lowercase();
    for (keyword, adjective) in [
        ("fast", "Fast"),
        ("lightweight", "Lightweight"),
        ("simple", "Simple"),
        ("async", "Async"),
    ] {
        if lower.contains(keyword) {
            push(format!("{} {}", adjective, name));
        }
    }

    titles.truncate(MAX_TITLES);
    titles
}

fn summary(readme: &str, project_type: ProjectType) -> String {
    readme
        .lines()
        .map(|l| l.replace('#', "").trim().to_string())
        .find(|l| {
            let len = l.chars().count();
            len > 20 && len < 150 && !l.starts_with("- ")
        })
        .unwrap_or_else(|| match project_type {
            ProjectType::PythonLibrary => {
                format!("A {} for extending functionality", project_type.label())
            }
            _ => format!("{} project", project_type.label()),
        })
}

fn tags(state: &RepositoryState) -> Vec<String> {
    let mut tags: BTreeSet<String> = state
        .project_type
        .profile()
        .tags
        .iter()
        .map(|t| t.to_string())
        .collect();

    let readme = state.readme_text().to_lowercase();
    for (tag, keywords) in KEYWORD_TAGS {
        if keywords.iter().any(|k| readme.contains(k)) {
            tags.insert(tag.to_string());
        }
    }

    for deps in state.dependencies.values() {
        for dep in deps.iter().take(3) {
            let dep = dep.to_lowercase();
            match DEPENDENCY_TAGS.iter().find(|(name, _)| *name == dep) {
                Some((_, tag)) => tags.insert(tag.to_string()),
                None => tags.insert(dep.replace('-', "").chars().take(15).collect()),
            };
        }
    }

    tags.into_iter().take(MAX_TAGS).collect()
}
