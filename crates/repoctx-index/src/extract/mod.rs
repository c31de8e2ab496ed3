//! Per-language extractors: `file content -> ordered chunk drafts`.
//!
//! Each extractor is pure and never fails: content that cannot be parsed is
//! handed to [`BlindExtractor`] instead.

mod blind;
mod html;
mod javascript;
mod python;

use std::collections::BTreeSet;
use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::chunk::{ChunkDraft, Language};

pub use blind::{BlindExtractor, windows};
pub use html::HtmlExtractor;
pub use javascript::JavaScriptExtractor;
pub use python::PythonExtractor;

/// Chunk sizing shared by every extractor.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Blind window length in characters (default: 800).
    pub chunk_size: usize,
    /// Characters shared by consecutive blind windows (default: 200).
    pub chunk_overlap: usize,
    /// HTML blocks longer than `chunk_size * oversize_factor` bytes are subdivided (default: 2).
    pub oversize_factor: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            oversize_factor: 2,
        }
    }
}

/// Common interface of all extractors.
pub trait Extractor: Send + Sync {
    fn language(&self) -> Language;

    /// Split `source` into chunk drafts in emission order. Never returns an
    /// empty list for content that has non-blank text.
    fn extract(&self, source: &str) -> Vec<ChunkDraft>;
}

/// Fixed mapping from file extension sets to extractors, with a blind fallback.
pub struct ExtractorRegistry {
    entries: Vec<(&'static [&'static str], Box<dyn Extractor>)>,
    fallback: BlindExtractor,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            entries: vec![
                entry(&["py", "pyi"], PythonExtractor::new(config)),
                entry(
                    &["js", "mjs", "cjs", "jsx"],
                    JavaScriptExtractor::new(config),
                ),
                entry(&["html", "htm"], HtmlExtractor::new(config)),
            ],
            fallback: BlindExtractor::new(config),
        }
    }

    /// Extractor responsible for `path`, chosen by extension.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> &dyn Extractor {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        ext.and_then(|ext| {
            self.entries
                .iter()
                .find(|(exts, _)| exts.iter().any(|e| *e == ext))
                .map(|(_, extractor)| extractor.as_ref())
        })
        .unwrap_or(&self.fallback)
    }

    #[must_use]
    pub fn extract(&self, path: &Path, source: &str) -> Vec<ChunkDraft> {
        self.for_path(path).extract(source)
    }
}

fn entry(
    extensions: &'static [&'static str],
    extractor: impl Extractor + 'static,
) -> (&'static [&'static str], Box<dyn Extractor>) {
    let extractor: Box<dyn Extractor> = Box::new(extractor);
    (extensions, extractor)
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let languages: Vec<_> = self
            .entries
            .iter()
            .map(|(exts, e)| (e.language().id(), *exts))
            .collect();
        f.debug_struct("ExtractorRegistry")
            .field("entries", &languages)
            .finish_non_exhaustive()
    }
}

/// Parse `source`, returning `None` when the grammar cannot be loaded, parsing
/// fails, or (with `strict`) the tree contains syntax errors.
pub(crate) fn parse(source: &str, grammar: &tree_sitter::Language, strict: bool) -> Option<Tree> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(grammar) {
        tracing::warn!("set_language failed: {e}");
        return None;
    }
    let tree = parser.parse(source, None)?;
    if strict && tree.root_node().has_error() {
        return None;
    }
    Some(tree)
}

pub(crate) fn node_text<'a>(node: &Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

pub(crate) fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub(crate) fn field_text(node: &Node<'_>, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, source).to_owned())
}

/// Grammar node names describing a call expression.
pub(crate) struct CallShape {
    pub call: &'static str,
    pub callee: &'static str,
    pub member: &'static str,
    pub member_name: &'static str,
}

/// Names called inside `node`: bare identifier callees and the member name of
/// method calls.
pub(crate) fn collect_uses(node: Node<'_>, source: &str, shape: &CallShape) -> BTreeSet<String> {
    let mut uses = BTreeSet::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == shape.call
            && let Some(callee) = current.child_by_field_name(shape.callee)
        {
            if callee.kind() == "identifier" {
                uses.insert(node_text(&callee, source).to_owned());
            } else if callee.kind() == shape.member
                && let Some(name) = callee.child_by_field_name(shape.member_name)
            {
                uses.insert(node_text(&name, source).to_owned());
            }
        }
        let mut cursor = current.walk();
        stack.extend(current.named_children(&mut cursor));
    }
    uses
}

/// Drop whitespace-only lines, keeping the rest verbatim.
pub(crate) fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| !l.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ConcreteType;

    #[test]
    fn registry_dispatches_by_extension() {
        let registry = ExtractorRegistry::new(ChunkingConfig::default());
        assert_eq!(
            registry.for_path(Path::new("a/b.py")).language(),
            Language::Python
        );
        assert_eq!(
            registry.for_path(Path::new("app.JS")).language(),
            Language::JavaScript
        );
        assert_eq!(
            registry.for_path(Path::new("index.html")).language(),
            Language::Html
        );
        assert_eq!(
            registry.for_path(Path::new("README.md")).language(),
            Language::Blind
        );
        assert_eq!(
            registry.for_path(Path::new("Makefile")).language(),
            Language::Blind
        );
    }

    #[test]
    fn registry_extract_uses_selected_extractor() {
        let registry = ExtractorRegistry::new(ChunkingConfig::default());
        let drafts = registry.extract(Path::new("notes.txt"), "plain words");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].concrete_type, ConcreteType::BlindChunk);
    }

    #[test]
    fn registry_debug_lists_languages() {
        let registry = ExtractorRegistry::new(ChunkingConfig::default());
        let dbg = format!("{registry:?}");
        assert!(dbg.contains("python"));
        assert!(dbg.contains("html"));
    }

    #[test]
    fn non_blank_lines_skips_whitespace() {
        assert_eq!(non_blank_lines("a\n\n  \n b\n"), vec!["a", " b"]);
    }
}
