//! `juliet ingest` — Add a text document to semantic memory.
//!
//! The file is split on blank lines and paragraphs are packed into chunks of
//! roughly `chunk_chars` characters. A single paragraph longer than that is
//! split on whitespace.

use std::path::PathBuf;

use super::runtime::Runtime;

pub const DEFAULT_CHUNK_CHARS: usize = 1536;

pub async fn run(
    file: PathBuf,
    author: Option<String>,
    collection: String,
    chunk_chars: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = std::fs::canonicalize(&file).map_err(|e| format!("File not found: {}: {e}", file.display()))?;
    let text = std::fs::read_to_string(&path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;

    let chunks = chunk_paragraphs(&text, chunk_chars);
    if chunks.is_empty() {
        println!("Nothing to ingest: {} is empty", path.display());
        return Ok(());
    }

    let runtime = Runtime::load()?;
    let audit = runtime.config.audit_path();
    let report = runtime
        .writer
        .ingest_chunks(&path, &chunks, author.as_deref(), &collection, audit.as_deref())
        .await;

    let written = report.documents_written;
    report.into_result()?;
    println!("Stored {written} chunks from {} in '{collection}'", path.display());
    Ok(())
}

/// Pack blank-line separated paragraphs into chunks of at most `max_chars`
/// characters (a lone oversized word may exceed it).
pub fn chunk_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let paragraphs = text
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        let pieces = if paragraph.chars().count() > max_chars {
            split_words(&paragraph, max_chars)
        } else {
            vec![paragraph]
        };

        for piece in pieces {
            let needed = piece.chars().count() + if current.is_empty() { 0 } else { 2 };
            if !current.is_empty() && current.chars().count() + needed > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_words(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_paragraphs("  \n\n \n", 100).is_empty());
    }

    #[test]
    fn small_paragraphs_are_packed() {
        let chunks = chunk_paragraphs("one\n\ntwo\n\nthree", 100);
        assert_eq!(chunks, vec!["one\n\ntwo\n\nthree"]);
    }

    #[test]
    fn paragraphs_split_at_limit() {
        let chunks = chunk_paragraphs("aaaa\n\nbbbb\n\ncccc", 10);
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn long_paragraph_split_on_words() {
        let chunks = chunk_paragraphs("alpha beta gamma delta", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 11));
    }

    #[test]
    fn internal_whitespace_is_normalized() {
        let chunks = chunk_paragraphs("line one\nline   two", 100);
        assert_eq!(chunks, vec!["line one line two"]);
    }
}
