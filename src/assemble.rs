//! Prompt document assembly
//!
//! Section order and truncation limits are fixed so the document size stays
//! bounded whatever the repository looks like.

use crate::core::snapshot::RepoSnapshot;
use crate::rag::RankedChunk;

/// Tree entries embedded in the document
pub const TREE_LINES: usize = 500;
/// Characters kept from README, manifests and each file
pub const BLOCK_CHARS: usize = 2000;

const ANALYZE_ISSUES_INSTRUCTION: &str = "Additionally, review the code above for \
potential bugs, security problems and maintainability issues. List each finding \
with the file it concerns, why it matters, and a suggested fix.";

/// Per-request text around the repository context
#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    pub task: String,
    pub additional_context: Option<String>,
    pub analyze_issues: bool,
}

/// Code context placed after the manifests
#[derive(Debug, Clone, Copy)]
pub enum CodeContext<'a> {
    /// Whole files in selector order
    Files,
    /// Retrieved chunks in similarity order
    Chunks(&'a [RankedChunk]),
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the document handed to the model
pub fn assemble(snapshot: &RepoSnapshot, request: &AssembleRequest, code: CodeContext<'_>) -> String {
    let mut doc = String::new();

    doc.push_str("# Task\n");
    doc.push_str(request.task.trim());
    doc.push_str("\n\n");

    let info = &snapshot.info;
    doc.push_str(&format!(
        "# Repository\n{}/{} (branch: {})\n{}\n\n",
        info.owner, info.repo, info.branch, info.description
    ));

    doc.push_str("# File Tree\n");
    for path in snapshot.tree.iter().take(TREE_LINES) {
        doc.push_str(path);
        doc.push('\n');
    }
    if snapshot.is_truncated || snapshot.tree.len() > TREE_LINES {
        doc.push_str("... (tree truncated)\n");
    }
    doc.push('\n');

    doc.push_str("# README\n");
    doc.push_str(truncate_chars(&snapshot.readme, BLOCK_CHARS));
    doc.push_str("\n\n");

    doc.push_str("# Dependencies\n");
    doc.push_str(truncate_chars(&snapshot.dependencies, BLOCK_CHARS));
    doc.push_str("\n\n");

    match code {
        CodeContext::Files => {
            doc.push_str("# Source Files\n");
            for file in &snapshot.source_files {
                doc.push_str(&format!(
                    "--- {} ---\n{}\n\n",
                    file.path,
                    truncate_chars(&file.content, BLOCK_CHARS)
                ));
            }
        }
        CodeContext::Chunks(chunks) => {
            doc.push_str("# Relevant Code\n");
            for chunk in chunks {
                doc.push_str(&format!(
                    "--- {} (part {}) ---\n{}\n\n",
                    chunk.source_path,
                    chunk.part_index + 1,
                    truncate_chars(&chunk.content, BLOCK_CHARS)
                ));
            }
        }
    }

    if let Some(extra) = request
        .additional_context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        doc.push_str("# Additional Context\n");
        doc.push_str(extra);
        doc.push_str("\n\n");
    }

    if request.analyze_issues {
        doc.push_str("# Issue Analysis\n");
        doc.push_str(ANALYZE_ISSUES_INSTRUCTION);
        doc.push('\n');
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::{RepoInfo, SourceFile};

    fn snapshot() -> RepoSnapshot {
        RepoSnapshot {
            info: RepoInfo {
                owner: "octo".to_string(),
                repo: "demo".to_string(),
                branch: "main".to_string(),
                description: "A demo".to_string(),
            },
            tree: vec!["src/main.rs".to_string(), "README.md".to_string()],
            is_truncated: false,
            readme: "# Demo".to_string(),
            dependencies: "\n--- Cargo.toml ---\n[package]\n".to_string(),
            source_files: vec![
                SourceFile::new("src/main.rs", "fn main() {}"),
                SourceFile::new("src/lib.rs", "pub fn lib() {}"),
            ],
            fetch_stats: Default::default(),
            fetched_at: chrono::Utc::now(),
        }
    }

    fn request() -> AssembleRequest {
        AssembleRequest {
            task: "Explain this repo".to_string(),
            additional_context: None,
            analyze_issues: false,
        }
    }

    fn position(doc: &str, needle: &str) -> usize {
        doc.find(needle).unwrap_or_else(|| panic!("missing {:?}", needle))
    }

    #[test]
    fn test_section_order() {
        let mut req = request();
        req.additional_context = Some("Focus on errors".to_string());
        req.analyze_issues = true;
        let doc = assemble(&snapshot(), &req, CodeContext::Files);

        let order = [
            "# Task",
            "octo/demo (branch: main)",
            "# File Tree",
            "# README",
            "# Dependencies",
            "--- src/main.rs ---",
            "--- src/lib.rs ---",
            "# Additional Context",
            "# Issue Analysis",
        ];
        for pair in order.windows(2) {
            assert!(position(&doc, pair[0]) < position(&doc, pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_optional_blocks_absent() {
        let doc = assemble(&snapshot(), &request(), CodeContext::Files);
        assert!(!doc.contains("# Additional Context"));
        assert!(!doc.contains("# Issue Analysis"));
    }

    #[test]
    fn test_blank_additional_context_skipped() {
        let mut req = request();
        req.additional_context = Some("   ".to_string());
        let doc = assemble(&snapshot(), &req, CodeContext::Files);
        assert!(!doc.contains("# Additional Context"));
    }

    #[test]
    fn test_blocks_truncated() {
        let mut snap = snapshot();
        snap.readme = "r".repeat(5000);
        snap.source_files = vec![SourceFile::new("big.rs", "b".repeat(5000))];
        snap.tree = (0..800).map(|i| format!("f{}.rs", i)).collect();
        let doc = assemble(&snap, &request(), CodeContext::Files);

        assert!(doc.contains(&"r".repeat(BLOCK_CHARS)));
        assert!(!doc.contains(&"r".repeat(BLOCK_CHARS + 1)));
        assert!(!doc.contains(&"b".repeat(BLOCK_CHARS + 1)));
        assert!(doc.contains("f499.rs\n"));
        assert!(!doc.contains("f500.rs\n"));
        assert!(doc.contains("(tree truncated)"));
    }

    #[test]
    fn test_chunk_context() {
        let chunks = vec![RankedChunk {
            source_path: "src/api.rs".to_string(),
            part_index: 1,
            content: "[Relevance: 91.0%]\nfn route() {}".to_string(),
            score: 0.91,
        }];
        let doc = assemble(&snapshot(), &request(), CodeContext::Chunks(&chunks));
        assert!(doc.contains("--- src/api.rs (part 2) ---\n[Relevance: 91.0%]"));
        assert!(!doc.contains("--- src/main.rs ---"));
    }

    #[test]
    fn test_empty_snapshot_is_well_formed() {
        let mut snap = snapshot();
        snap.tree.clear();
        snap.readme.clear();
        snap.dependencies.clear();
        snap.source_files.clear();
        let doc = assemble(&snap, &request(), CodeContext::Files);
        assert!(doc.starts_with("# Task\nExplain this repo"));
        assert!(doc.contains("# Source Files"));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 0), "");
    }
}
