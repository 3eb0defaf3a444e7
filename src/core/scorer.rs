//! Path relevance heuristic
//!
//! The score is derived from the path string alone. Only the relative
//! order between candidates matters, the absolute value means nothing.

const TEST_PENALTY: i32 = 50;
const AUX_PENALTY: i32 = 30;
const CORE_DIR_BONUS: i32 = 20;
const IMPORTANT_NAME_BONUS: i32 = 10;

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__"];

const AUX_KEYWORDS: &[&str] = &[
    "build",
    "setup",
    "config",
    "webpack",
    "vite",
    "rollup",
    "gulpfile",
    "backup",
    "manage.py",
    "scripts/",
    "tools/",
    "docs/",
    "example",
    "demo",
    "migrations/",
];

const CORE_DIRS: &[&str] = &["src", "lib", "app", "core", "pkg", "internal"];

const IMPORTANT_NAMES: &[&str] = &[
    "main",
    "index",
    "app",
    "server",
    "core",
    "manager",
    "parser",
    "api",
    "router",
    "handler",
    "controller",
    "service",
    "model",
    "database",
];

/// Score a repository path. Higher means more likely to matter.
pub fn score(path: &str) -> i32 {
    let lower = path.to_lowercase().replace('\\', "/");
    let segments: Vec<&str> = lower.split('/').collect();
    let file_name = segments.last().copied().unwrap_or("");
    let dirs = &segments[..segments.len().saturating_sub(1)];

    let mut score = 0;

    if is_test_path(&lower, dirs, file_name) {
        score -= TEST_PENALTY;
    }

    if AUX_KEYWORDS.iter().any(|k| lower.contains(k)) {
        score -= AUX_PENALTY;
    }

    if dirs.iter().any(|d| CORE_DIRS.contains(d)) {
        score += CORE_DIR_BONUS;
    }

    if IMPORTANT_NAMES.iter().any(|n| file_name.contains(n)) {
        score += IMPORTANT_NAME_BONUS;
    }

    score - segments.len() as i32
}

fn is_test_path(lower: &str, dirs: &[&str], file_name: &str) -> bool {
    dirs.iter().any(|d| TEST_DIRS.contains(d))
        || lower.contains("__tests__")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
        || file_name.starts_with("test_")
        || file_name.ends_with("_test.go")
}
