//! Top-N file selection

use super::scorer;

/// Root-level manifests fetched separately as dependency context
pub const DEPENDENCY_MANIFESTS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "go.mod",
    "Cargo.toml",
    "pom.xml",
    "build.gradle",
];

/// Extensions that count as source for selection
const SOURCE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".py", ".go", ".rs", ".java", ".cpp", ".c", ".h", ".cs", ".md",
];

pub const MIN_FILES: usize = 1;
pub const MAX_FILES: usize = 200;

/// Clamp a caller-provided file limit into the supported range
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(MIN_FILES, MAX_FILES)
}

/// True for the root README, which is fetched on its own
pub fn is_root_readme(path: &str) -> bool {
    path.eq_ignore_ascii_case("readme.md")
}

pub fn is_dependency_manifest(path: &str) -> bool {
    DEPENDENCY_MANIFESTS.contains(&path)
}

fn is_source_file(path: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Whether a path competes for one of the selection slots
pub fn is_candidate(path: &str) -> bool {
    is_source_file(path) && !is_dependency_manifest(path) && !is_root_readme(path)
}

/// Pick the `limit` highest-scoring candidate paths.
///
/// Equal scores keep their input order, so the same input always yields the
/// same selection.
pub fn select(paths: &[String], limit: usize) -> Vec<String> {
    let limit = clamp_limit(limit);

    let mut ranked: Vec<(i32, usize, &String)> = paths
        .iter()
        .filter(|p| is_candidate(p))
        .enumerate()
        .map(|(idx, p)| (scorer::score(p), idx, p))
        .collect();

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    ranked
        .into_iter()
        .take(limit)
        .map(|(_, _, p)| p.clone())
        .collect()
}
