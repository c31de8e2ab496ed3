//! Contextualized embedding text generation.
//!
//! Raw chunk text embeds poorly for conceptual queries. Prepending the file
//! path, language and symbol names anchors the vector to where the code lives.

use crate::chunk::{Chunk, Symbols};

/// Maximum number of member names listed for a class header.
const MAX_MEMBERS: usize = 12;

/// Text sent to the embedding provider for `chunk` (not the stored content).
#[must_use]
pub fn contextualize_for_embedding(chunk: &Chunk) -> String {
    let mut text = String::with_capacity(chunk.content.len() + 128);

    text.push_str("# ");
    text.push_str(&chunk.file_path);
    text.push('\n');

    text.push_str("# Language: ");
    text.push_str(chunk.language.id());
    text.push('\n');

    match &chunk.symbols {
        Symbols::Definition {
            identifier,
            class_name: Some(class_name),
            ..
        } => {
            text.push_str("# Symbol: ");
            text.push_str(class_name);
            text.push('.');
            text.push_str(identifier);
            text.push('\n');
        }
        Symbols::Definition { identifier, .. } => {
            text.push_str("# Symbol: ");
            text.push_str(identifier);
            text.push('\n');
        }
        Symbols::ClassHeader {
            class_name,
            member_functions,
            ..
        } => {
            text.push_str("# Class: ");
            text.push_str(class_name);
            text.push('\n');
            if !member_functions.is_empty() {
                let members: Vec<&str> = member_functions
                    .iter()
                    .take(MAX_MEMBERS)
                    .map(String::as_str)
                    .collect();
                text.push_str("# Members: ");
                text.push_str(&members.join(", "));
                text.push('\n');
            }
        }
        Symbols::None | Symbols::Assets { .. } => {}
    }

    text.push_str(&chunk.content);
    text
}

/// Short header for display in retrieved results.
#[must_use]
pub fn chunk_display_header(chunk: &Chunk) -> String {
    let name = chunk
        .symbols
        .identifier()
        .unwrap_or(chunk.concrete_type.as_str());
    match chunk.line_span() {
        Some((start, end)) => format!("{} :: {name} (lines {start}-{end})", chunk.file_path),
        None => format!("{} :: {name}", chunk.file_path),
    }
}
