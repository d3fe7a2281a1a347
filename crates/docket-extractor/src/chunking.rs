//! Text chunking strategies for long minutes

use crate::config::ChunkStrategy;

/// Chunks text according to the specified strategy
///
/// Chunk sizes are measured in bytes and never split a UTF-8 character.
pub struct TextChunker {
    strategy: ChunkStrategy,
    max_chunk_size: usize,
}

impl TextChunker {
    /// Create a new text chunker
    pub fn new(strategy: ChunkStrategy, max_chunk_size: usize) -> Self {
        Self {
            strategy,
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    /// Chunk the given text
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.len() <= self.max_chunk_size {
            return vec![text.to_string()];
        }

        match self.strategy {
            ChunkStrategy::ByParagraph => self.chunk_by_paragraph(text),
            ChunkStrategy::BySection => self.chunk_by_section(text),
        }
    }

    /// The leading chunk only; what fits in one prompt
    pub fn first_chunk(&self, text: &str) -> String {
        self.chunk(text).into_iter().next().unwrap_or_default()
    }

    /// Chunk by paragraphs (double newlines)
    fn chunk_by_paragraph(&self, text: &str) -> Vec<String> {
        let paragraphs: Vec<&str> = text.split("\n\n").collect();
        self.combine_until_limit(paragraphs)
    }

    /// Chunk by sections (agenda headings such as "1. ADOPTION OF MINUTES")
    fn chunk_by_section(&self, text: &str) -> Vec<String> {
        let mut sections = Vec::new();
        let mut current_section = String::new();

        for line in text.lines() {
            if is_agenda_heading(line) && !current_section.trim().is_empty() {
                sections.push(current_section.trim().to_string());
                current_section = String::new();
            }

            current_section.push_str(line);
            current_section.push('\n');
        }

        if !current_section.trim().is_empty() {
            sections.push(current_section.trim().to_string());
        }

        if sections.len() <= 1 {
            self.chunk_by_paragraph(text)
        } else {
            self.combine_until_limit(sections)
        }
    }

    /// Combine elements until they reach the size limit
    fn combine_until_limit<S: AsRef<str>>(&self, elements: Vec<S>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current_chunk = String::new();

        for element in elements {
            let element_str = element.as_ref().trim();
            if element_str.is_empty() {
                continue;
            }

            if current_chunk.len() + element_str.len() + 2 > self.max_chunk_size {
                if !current_chunk.is_empty() {
                    chunks.push(current_chunk.trim().to_string());
                    current_chunk = String::new();
                }

                if element_str.len() > self.max_chunk_size {
                    chunks.extend(split_at_char_limit(element_str, self.max_chunk_size));
                    continue;
                }
            }
            current_chunk.push_str(element_str);
            current_chunk.push_str("\n\n");
        }

        if !current_chunk.trim().is_empty() {
            chunks.push(current_chunk.trim().to_string());
        }

        chunks
    }
}

/// Numbered agenda items ("3. ", "2.1 ") and all-caps headings ("ADJOURNMENT")
fn is_agenda_heading(line: &str) -> bool {
    let trimmed = line.trim();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        return rest.starts_with('.') || rest.starts_with(')');
    }

    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 4 && letters.iter().all(|c| c.is_uppercase())
}

/// Split text into pieces of at most `limit` bytes on character boundaries
fn split_at_char_limit(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + limit).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // limit is narrower than this character
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        chunks.push(text[start..end].to_string());
        start = end;
    }

    chunks
}
