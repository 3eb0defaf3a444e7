//! Path exclusion rules
//!
//! Decides whether a repository path may ever reach scoring. Build output,
//! dependency folders and credential-looking files are dropped here.

/// Directories that never contain anything worth sending to a model
const HARD_EXCLUDED_DIRS: &[&str] = &[
    "venv",
    ".venv",
    "node_modules",
    ".git",
    "__pycache__",
    "dist",
    "build",
];

/// Extra directory excluded when scanning a local checkout
const LOCAL_EXCLUDED_DIRS: &[&str] = &["target"];

/// Filenames and suffixes that usually hold credentials
const SECRET_PATTERNS: &[&str] = &[
    ".env",
    ".pem",
    ".key",
    ".cert",
    ".p12",
    "secrets.json",
    "credentials.json",
    "id_rsa",
];

/// Outcome of classifying one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Eligible,
    HardExcluded,
    SecretExcluded,
}

impl PathClass {
    pub fn is_eligible(self) -> bool {
        self == PathClass::Eligible
    }
}

/// Classifies paths against the directory denylist and secret patterns
#[derive(Debug, Clone)]
pub struct PathFilter {
    excluded_dirs: Vec<&'static str>,
}

impl PathFilter {
    /// Profile used for remote (GitHub) trees
    pub fn remote() -> Self {
        Self {
            excluded_dirs: HARD_EXCLUDED_DIRS.to_vec(),
        }
    }

    /// Profile used for local scans, which also drops `target/`
    pub fn local() -> Self {
        let mut excluded_dirs = HARD_EXCLUDED_DIRS.to_vec();
        excluded_dirs.extend_from_slice(LOCAL_EXCLUDED_DIRS);
        Self { excluded_dirs }
    }

    pub fn classify(&self, path: &str) -> PathClass {
        let path = normalize(path);
        if self.is_hard_excluded(&path) {
            PathClass::HardExcluded
        } else if is_secret(&path) {
            PathClass::SecretExcluded
        } else {
            PathClass::Eligible
        }
    }

    /// True when a single directory name is on the denylist
    pub fn is_excluded_dir_name(&self, name: &str) -> bool {
        self.excluded_dirs.contains(&name)
    }

    /// Keep only eligible paths, preserving order
    pub fn retain_eligible(&self, paths: Vec<String>) -> Vec<String> {
        paths
            .into_iter()
            .filter(|p| self.classify(p).is_eligible())
            .collect()
    }

    fn is_hard_excluded(&self, path: &str) -> bool {
        self.excluded_dirs.iter().any(|name| {
            path.split('/').any(|segment| segment == *name)
                || path.starts_with(&format!("{}/", name))
                || path.contains(&format!("/{}/", name))
        })
    }
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::remote()
    }
}

fn is_secret(path: &str) -> bool {
    SECRET_PATTERNS.iter().any(|pattern| {
        path.ends_with(pattern) || path.split('/').any(|segment| segment == *pattern)
    })
}

/// Windows separators are folded to `/` before matching
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
