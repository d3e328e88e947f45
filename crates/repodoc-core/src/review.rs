//! Repository health review.
//!
//! Combines the analysis with the content improvement output into typed
//! issues, recommendations, a 0–100 health score, and a short prioritized
//! action list.

use serde::{Deserialize, Serialize};

use crate::analyze::{MissingItem, RepositoryState};
use crate::improve::ContentImprovement;

const MAX_ACTION_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    NoReadme,
    NoLicense,
    NoTests,
    NoContributing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Content,
    ContinuousIntegration,
    Changelog,
    PullRequestTemplate,
    Badges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completeness {
    pub has_license: bool,
    pub has_tests: bool,
    pub has_docs: bool,
    pub has_examples: bool,
    pub has_ci: bool,
    pub has_contributing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Self::P0 => "P0 - CRITICAL",
            Self::P1 => "P1 - HIGH",
            Self::P2 => "P2 - MEDIUM",
            Self::P3 => "P3 - LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub priority: Priority,
    pub task: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub critical_issues: usize,
    pub warnings: usize,
    pub recommendations: usize,
    pub missing_readme_sections: Vec<String>,
    pub completeness: Completeness,
    /// 0 to 100.
    pub overall_health: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub issues: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    pub validation: Validation,
    pub action_items: Vec<ActionItem>,
    pub priority_fixes: Vec<String>,
}

impl ReviewReport {
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

pub fn review(state: &RepositoryState, improvement: Option<&ContentImprovement>) -> ReviewReport {
    let completeness = Completeness {
        has_license: !state
            .missing
            .contains(&MissingItem::Repository("LICENSE".to_string())),
        has_tests: state.structure.has_tests,
        has_docs: state.structure.has_docs,
        has_examples: state.structure.has_examples,
        has_ci: state.structure.has_ci,
        has_contributing: !state
            .missing
            .contains(&MissingItem::Repository("CONTRIBUTING.md".to_string())),
    };

    let mut issues = Vec::new();
    if state.readme.is_none() {
        issues.push(issue(
            IssueKind::NoReadme,
            Severity::Critical,
            "No README found - this is critical for project visibility",
        ));
    }
    if !completeness.has_license {
        issues.push(issue(
            IssueKind::NoLicense,
            Severity::Warning,
            "No LICENSE file - add to clarify usage rights",
        ));
    }
    if !completeness.has_tests {
        issues.push(issue(
            IssueKind::NoTests,
            Severity::Warning,
            "No tests found - add test suite for credibility",
        ));
    }
    if !completeness.has_contributing {
        issues.push(issue(
            IssueKind::NoContributing,
            Severity::Warning,
            "No CONTRIBUTING.md - make it easy for contributors to help",
        ));
    }

    let mut recommendations: Vec<Recommendation> = improvement
        .map(|imp| {
            imp.improvements
                .iter()
                .take(3)
                .map(|m| recommendation(RecommendationKind::Content, m))
                .collect()
        })
        .unwrap_or_default();
    let bp = &state.best_practices;
    for (missing, kind, message) in [
        (
            !completeness.has_ci,
            RecommendationKind::ContinuousIntegration,
            "Add CI/CD pipeline (GitHub Actions, GitLab CI) to automate testing",
        ),
        (
            !bp.has_changelog,
            RecommendationKind::Changelog,
            "Add CHANGELOG to track version history",
        ),
        (
            !bp.has_pull_request_template,
            RecommendationKind::PullRequestTemplate,
            "Add PR template to maintain code quality standards",
        ),
        (
            !bp.has_badges,
            RecommendationKind::Badges,
            "Add badges (build status, coverage, downloads) for credibility",
        ),
    ] {
        if missing {
            recommendations.push(recommendation(kind, message));
        }
    }

    let missing_sections = missing_readme_sections(state.readme_text());
    let count = |severity: Severity| issues.iter().filter(|i| i.severity == severity).count();

    let validation = Validation {
        critical_issues: count(Severity::Critical),
        warnings: count(Severity::Warning),
        recommendations: recommendations.len(),
        overall_health: health_score(&issues, recommendations.len(), &completeness),
        missing_readme_sections: missing_sections.clone(),
        completeness,
    };

    ReviewReport {
        action_items: action_items(&issues, &recommendations),
        priority_fixes: priority_fixes(&issues, &missing_sections),
        issues,
        recommendations,
        validation,
    }
}

fn issue(kind: IssueKind, severity: Severity, message: &str) -> Issue {
    Issue {
        kind,
        severity,
        message: message.to_string(),
    }
}

fn recommendation(kind: RecommendationKind, message: &str) -> Recommendation {
    Recommendation {
        kind,
        message: message.to_string(),
    }
}

fn missing_readme_sections(readme: &str) -> Vec<String> {
    let lower = readme.to_lowercase();
    let checks: [(&str, &[&str]); 6] = [
        ("Installation", &["install", "setup", "getting started"]),
        ("Usage", &["usage", "quickstart", "example"]),
        ("Features", &["feature", "capabilities"]),
        ("Contributing", &["contribut", "guidelines"]),
        ("License", &["license", "licence"]),
        ("API Reference", &["api", "documentation"]),
    ];
    checks
        .iter()
        .filter(|(_, keys)| !keys.iter().any(|k| lower.contains(k)))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// 100, minus 20 per critical issue, 10 per warning, 5 per
/// recommendation, and extra deductions for missing license, tests, or
/// docs. Clamped to `0..=100`.
pub fn health_score(issues: &[Issue], recommendations: usize, completeness: &Completeness) -> u8 {
    let mut score: i64 = 100;
    for i in issues {
        score -= match i.severity {
            Severity::Critical => 20,
            Severity::Warning => 10,
        };
    }
    score -= recommendations as i64 * 5;
    if !completeness.has_license {
        score -= 15;
    }
    if !completeness.has_tests {
        score -= 10;
    }
    if !completeness.has_docs {
        score -= 5;
    }
    score.clamp(0, 100) as u8
}

fn action_items(issues: &[Issue], recommendations: &[Recommendation]) -> Vec<ActionItem> {
    let has = |kind: IssueKind| issues.iter().any(|i| i.kind == kind);
    let item = |priority, task: &str, details: &str| ActionItem {
        priority,
        task: task.to_string(),
        details: details.to_string(),
    };

    let mut actions = Vec::new();
    if has(IssueKind::NoReadme) {
        actions.push(item(
            Priority::P0,
            "Create comprehensive README.md",
            "Include features, installation, usage, and contribution guidelines",
        ));
    }
    if has(IssueKind::NoLicense) {
        actions.push(item(
            Priority::P1,
            "Add LICENSE file",
            "Choose appropriate license (MIT, Apache 2.0, GPL, etc.)",
        ));
    }
    if has(IssueKind::NoTests) {
        actions.push(item(
            Priority::P1,
            "Add test suite",
            "Create tests folder with unit and integration tests",
        ));
    }
    for rec in recommendations.iter().filter(|r| r.kind != RecommendationKind::Content) {
        match rec.kind {
            RecommendationKind::ContinuousIntegration => actions.push(item(
                Priority::P2,
                "Set up CI/CD pipeline",
                "Use GitHub Actions, GitLab CI, or similar",
            )),
            RecommendationKind::Badges => actions.push(item(
                Priority::P3,
                "Add status badges",
                "Build status, coverage, downloads badges",
            )),
            _ => {}
        }
    }

    actions.truncate(MAX_ACTION_ITEMS);
    actions
}

fn priority_fixes(issues: &[Issue], missing_sections: &[String]) -> Vec<String> {
    let has = |kind: IssueKind| issues.iter().any(|i| i.kind == kind);
    let fixes: [&str; 3] = if has(IssueKind::NoReadme) {
        ["Create README.md", "Add Installation section", "Add Usage examples"]
    } else if has(IssueKind::NoLicense) {
        ["Add LICENSE file", "Create CONTRIBUTING.md", "Add examples"]
    } else if missing_sections.iter().any(|s| s == "Installation") {
        ["Add Installation section", "Add Usage examples", "Add code samples"]
    } else {
        ["Add badges", "Improve documentation", "Add contributing guide"]
    };
    fixes.iter().map(|s| s.to_string()).collect()
}
