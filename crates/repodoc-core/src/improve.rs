//! README and documentation improvement suggestions.
//!
//! Scores the current documentation, lists concrete improvements, and
//! when no README exists, drafts a skeleton tailored to the project type.

use serde::{Deserialize, Serialize};

use crate::analyze::{RepositoryState, StructureFlags};
use crate::metadata::project_name;
use crate::profile::ProjectType;

const MAX_README_CHARS: usize = 2000;
const MAX_SUGGESTIONS: usize = 5;
const MAX_BADGES: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentImprovement {
    /// The existing README, or a generated skeleton when there is none.
    /// At most 2000 characters.
    pub improved_readme: String,
    pub improvements: Vec<String>,
    pub suggested_images: Vec<String>,
    pub suggested_badges: Vec<String>,
    pub suggested_examples: Vec<String>,
    /// 0 to 100.
    pub quality_score: u8,
}

pub fn improve(state: &RepositoryState) -> ContentImprovement {
    let readme = state.readme_text();
    let badges = suggest_badges(state.project_type, &state.structure);

    let improved_readme = if readme.is_empty() {
        draft_readme(state, &badges)
    } else {
        readme.to_string()
    };

    ContentImprovement {
        improved_readme: improved_readme.chars().take(MAX_README_CHARS).collect(),
        improvements: readme_findings(readme),
        suggested_images: suggest_images(state),
        suggested_examples: suggest_examples(state),
        suggested_badges: badges,
        quality_score: quality_score(readme, &state.structure, state.missing.len()),
    }
}

fn readme_findings(readme: &str) -> Vec<String> {
    let lower = readme.to_lowercase();
    let mut findings = Vec::new();

    if readme.chars().count() < 100 {
        findings.push("README is too short - expand with more details".to_string());
    }

    let sections: [(&str, &[&str]); 5] = [
        ("Installation", &["install"]),
        ("Usage", &["usage", "how to"]),
        ("Features", &["feature"]),
        ("Contributing", &["contribut"]),
        ("License", &["license", "licence"]),
    ];
    for (section, keys) in sections {
        if !keys.iter().any(|k| lower.contains(k)) {
            findings.push(format!("Add {} section", section));
        }
    }

    if !readme.contains("```") {
        findings.push("Add code examples with syntax highlighting".to_string());
    }
    if !readme.contains("![") && !readme.contains('[') {
        findings.push("Add visual elements (images, badges, diagrams)".to_string());
    }

    findings
}

fn draft_readme(state: &RepositoryState, badges: &[String]) -> String {
    let profile = state.project_type.profile();
    let name = state
        .root
        .rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| project_name(""));

    let mut out = vec![
        format!("# {}", name),
        String::new(),
        format!("{} project.", state.project_type.label()),
        String::new(),
    ];
    if !badges.is_empty() {
        out.extend(badges.iter().map(|b| format!("![{}]()", b)));
        out.push(String::new());
    }

    out.extend(["## Features", "", "- Feature 1", "- Feature 2", "", "## Installation", ""].map(String::from));
    if let Some(cmd) = profile.install_command(&name) {
        out.push(format!("```bash\n{}\n```", cmd));
        out.push(String::new());
    }

    out.push("## Usage".to_string());
    out.push(String::new());
    out.push(format!("```{}\n\n```", profile.fence));
    for section in ["API Reference", "Configuration", "Testing", "Contributing", "License"] {
        out.push(String::new());
        out.push(format!("## {}", section));
    }

    out.join("\n")
}

fn suggest_images(state: &RepositoryState) -> Vec<String> {
    let mut images = vec![
        "Architecture diagram".to_string(),
        "Feature overview diagram".to_string(),
    ];
    let readme = state.readme_text().to_lowercase();
    if readme.contains("machine learning") || readme.contains("model") {
        images.push("Model architecture diagram".to_string());
        images.push("Performance comparison chart".to_string());
    }
    if readme.contains("web") || readme.contains("frontend") {
        images.push("UI screenshot".to_string());
    }
    images.push("Installation steps flowchart".to_string());
    images.truncate(MAX_SUGGESTIONS);
    images
}

fn suggest_examples(state: &RepositoryState) -> Vec<String> {
    let mut examples = vec![
        "Basic usage example".to_string(),
        "Advanced usage example".to_string(),
    ];
    let readme = state.readme_text().to_lowercase();
    if readme.contains("api") {
        examples.push("API endpoint examples".to_string());
    }
    if readme.contains("server") || readme.contains("web") {
        examples.push("Server setup example".to_string());
    }
    examples.push("Configuration examples".to_string());
    examples.truncate(MAX_SUGGESTIONS);
    examples
}

fn suggest_badges(project_type: ProjectType, structure: &StructureFlags) -> Vec<String> {
    let mut badges = vec![
        "GitHub Workflow Status".to_string(),
        "Test Coverage".to_string(),
        project_type.profile().package_badge.to_string(),
        "License".to_string(),
    ];
    if structure.has_docs {
        badges.push("Documentation".to_string());
    }
    if structure.has_ci {
        badges.push("Build Status".to_string());
    }
    badges.push("Contributors".to_string());
    badges.truncate(MAX_BADGES);
    badges
}

/// Base 50, rewarded for README length and repository hygiene, penalized
/// two points per missing item, clamped to `0..=100`.
pub fn quality_score(readme: &str, structure: &StructureFlags, missing: usize) -> u8 {
    let len = readme.chars().count();
    let mut score: i64 = 50;
    if len > 500 {
        score += 10;
    }
    if len > 1000 {
        score += 10;
    }
    for (present, points) in [
        (structure.has_tests, 10),
        (structure.has_docs, 10),
        (structure.has_ci, 10),
        (structure.has_examples, 5),
    ] {
        if present {
            score += points;
        }
    }
    score -= missing as i64 * 2;
    score.clamp(0, 100) as u8
}
