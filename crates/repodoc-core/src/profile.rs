//! Project-type classification and per-type presentation data.
//!
//! [`ProjectType`] is derived by the analyzer from manifest files. Every
//! place that varies output by project type (install snippets, title
//! prefixes, tags, badges) looks the values up in [`ProjectProfile`]
//! rather than matching on the type inline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    PythonLibrary,
    Node,
    Jvm,
    Go,
    Rust,
    DotNet,
    Docker,
    Python,
    JavaScript,
    Unknown,
}

impl ProjectType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PythonLibrary => "Python Library",
            Self::Node => "Node.js/JavaScript",
            Self::Jvm => "Java/JVM",
            Self::Go => "Go",
            Self::Rust => "Rust",
            Self::DotNet => "C# / .NET",
            Self::Docker => "Docker/Container",
            Self::Python => "Python",
            Self::JavaScript => "JavaScript",
            Self::Unknown => "Unknown",
        }
    }

    pub fn profile(&self) -> &'static ProjectProfile {
        match self {
            Self::PythonLibrary | Self::Python => &PYTHON,
            Self::Node | Self::JavaScript => &NODE,
            Self::Jvm => &JVM,
            Self::Go => &GO,
            Self::Rust => &RUST,
            Self::DotNet => &DOTNET,
            Self::Docker => &DOCKER,
            Self::Unknown => &UNKNOWN,
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Static presentation data for one family of project types.
#[derive(Debug, PartialEq, Eq)]
pub struct ProjectProfile {
    /// Shell command shown under "Installation"; `{name}` is replaced by
    /// the package name.
    pub install_snippet: Option<&'static str>,
    /// Prefix for a generated title alternative, e.g. `"Crate"`.
    pub title_prefix: Option<&'static str>,
    pub tags: &'static [&'static str],
    /// Package registry badge suggested for the README.
    pub package_badge: &'static str,
    /// Code fence language for generated usage examples.
    pub fence: &'static str,
}

impl ProjectProfile {
    pub fn install_command(&self, name: &str) -> Option<String> {
        self.install_snippet.map(|s| s.replace("{name}", name))
    }
}

static PYTHON: ProjectProfile = ProjectProfile {
    install_snippet: Some("pip install {name}"),
    title_prefix: Some("PyPackage"),
    tags: &["python", "library"],
    package_badge: "PyPI version",
    fence: "python",
};

static NODE: ProjectProfile = ProjectProfile {
    install_snippet: Some("npm install {name}"),
    title_prefix: Some("NPM"),
    tags: &["javascript", "nodejs", "web"],
    package_badge: "npm version",
    fence: "javascript",
};

static JVM: ProjectProfile = ProjectProfile {
    install_snippet: None,
    title_prefix: None,
    tags: &["java", "jvm"],
    package_badge: "Maven Central",
    fence: "java",
};

static GO: ProjectProfile = ProjectProfile {
    install_snippet: Some("go get {name}"),
    title_prefix: None,
    tags: &["golang", "systems"],
    package_badge: "Go Reference",
    fence: "go",
};

static RUST: ProjectProfile = ProjectProfile {
    install_snippet: Some("cargo add {name}"),
    title_prefix: Some("Crate"),
    tags: &["rust", "performance"],
    package_badge: "crates.io version",
    fence: "rust",
};

static DOTNET: ProjectProfile = ProjectProfile {
    install_snippet: Some("dotnet add package {name}"),
    title_prefix: None,
    tags: &["csharp", "dotnet"],
    package_badge: "NuGet version",
    fence: "csharp",
};

static DOCKER: ProjectProfile = ProjectProfile {
    install_snippet: Some("docker build -t {name} ."),
    title_prefix: None,
    tags: &["docker", "container"],
    package_badge: "Docker Pulls",
    fence: "bash",
};

static UNKNOWN: ProjectProfile = ProjectProfile {
    install_snippet: None,
    title_prefix: None,
    tags: &[],
    package_badge: "Version",
    fence: "bash",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(ProjectType::Unknown.to_string(), "Unknown");
        assert_eq!(ProjectType::PythonLibrary.label(), "Python Library");
        assert_eq!(ProjectType::DotNet.label(), "C# / .NET");
    }

    #[test]
    fn test_python_variants_share_profile() {
        assert_eq!(
            ProjectType::Python.profile(),
            ProjectType::PythonLibrary.profile()
        );
    }

    #[test]
    fn test_install_command() {
        let cmd = ProjectType::Rust.profile().install_command("repodoc");
        assert_eq!(cmd.as_deref(), Some("cargo add repodoc"));
        assert_eq!(ProjectType::Jvm.profile().install_command("x"), None);
    }
}
