//! Line-window chunking for retrieval
//!
//! Files are cut into overlapping windows of lines. Windows that are still
//! too long (minified bundles, inline base64) are sliced by characters so a
//! single chunk never exceeds what the embedding model accepts.

use super::snapshot::SourceFile;

pub const DEFAULT_LINES_PER_CHUNK: usize = 30;
pub const DEFAULT_OVERLAP_LINES: usize = 5;
/// Hard ceiling on characters per chunk
pub const MAX_CHUNK_CHARS: usize = 8000;

/// A fragment of one source file
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub source_path: String,
    pub part_index: usize,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub score: Option<f32>,
}

/// Chunking parameters
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    lines_per_chunk: usize,
    overlap_lines: usize,
    max_chars: usize,
}

impl Chunker {
    pub fn new(lines_per_chunk: usize, overlap_lines: usize) -> Self {
        let lines_per_chunk = lines_per_chunk.max(1);
        Self {
            lines_per_chunk,
            overlap_lines: overlap_lines.min(lines_per_chunk - 1),
            max_chars: MAX_CHUNK_CHARS,
        }
    }

    fn step(&self) -> usize {
        self.lines_per_chunk - self.overlap_lines
    }

    /// Chunk a text. Each call starts from scratch.
    pub fn chunks<'a>(&self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        let lines: Vec<&'a str> = text.lines().collect();
        let windows = LineWindows {
            lines,
            start: 0,
            size: self.lines_per_chunk,
            step: self.step(),
        };
        let max_chars = self.max_chars;
        windows.flat_map(move |window| split_chars(&window, max_chars))
    }

    /// Chunk one file, numbering the parts in order
    pub fn split_file(&self, file: &SourceFile) -> Vec<Chunk> {
        self.chunks(&file.content)
            .enumerate()
            .map(|(part_index, content)| Chunk {
                source_path: file.path.clone(),
                part_index,
                content,
                embedding: None,
                score: None,
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_LINES_PER_CHUNK, DEFAULT_OVERLAP_LINES)
    }
}

struct LineWindows<'a> {
    lines: Vec<&'a str>,
    start: usize,
    size: usize,
    step: usize,
}

impl Iterator for LineWindows<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.start >= self.lines.len() {
            return None;
        }
        let end = (self.start + self.size).min(self.lines.len());
        let window = self.lines[self.start..end].join("\n");
        self.start += self.step;
        Some(window)
    }
}

/// Slice into consecutive fragments of at most `max_chars` characters
fn split_chars(text: &str, max_chars: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            fragments.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        fragments.push(current);
    }

    fragments
}
