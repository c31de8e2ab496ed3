//! Python extractor with line-based claim bookkeeping.

use std::collections::BTreeSet;

use tree_sitter::Node;

use crate::chunk::{ChunkDraft, ConcreteType, Language, Symbols};

use super::{
    BlindExtractor, CallShape, ChunkingConfig, Extractor, collect_uses, field_text,
    named_children, parse,
};

const CALLS: CallShape = CallShape {
    call: "call",
    callee: "function",
    member: "attribute",
    member_name: "attribute",
};

const IMPORT_KINDS: &[&str] = &[
    "import_statement",
    "import_from_statement",
    "future_import_statement",
];

#[derive(Debug, Clone)]
pub struct PythonExtractor {
    fallback: BlindExtractor,
}

impl PythonExtractor {
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            fallback: BlindExtractor::new(config),
        }
    }
}

impl Extractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, source: &str) -> Vec<ChunkDraft> {
        let grammar: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let Some(tree) = parse(source, &grammar, true) else {
            tracing::debug!("python source did not parse, using blind windows");
            return self.fallback.extract(source);
        };
        extract_module(&tree.root_node(), source)
    }
}

/// Which source lines have already been emitted.
struct LineClaims<'s> {
    lines: Vec<&'s str>,
    claimed: Vec<bool>,
}

impl<'s> LineClaims<'s> {
    fn new(source: &'s str) -> Self {
        let lines: Vec<&str> = source.lines().collect();
        let claimed = vec![false; lines.len()];
        Self { lines, claimed }
    }

    /// Inclusive row range of `node`, clamped to existing lines.
    fn rows(&self, node: &Node<'_>) -> Option<(usize, usize)> {
        let last = self.lines.len().checked_sub(1)?;
        let start = node.start_position().row;
        let end_pos = node.end_position();
        let mut end = end_pos.row;
        if end_pos.column == 0 && end > start {
            end -= 1;
        }
        (start <= last).then_some((start, end.min(last)))
    }

    /// Unclaimed lines of `node` verbatim, interior blank lines included.
    fn span(&mut self, node: &Node<'_>) -> String {
        let Some((start, end)) = self.rows(node) else {
            return String::new();
        };
        let mut out: Vec<&str> = Vec::new();
        for row in start..=end {
            if !self.claimed[row] {
                self.claimed[row] = true;
                out.push(self.lines[row]);
            }
        }
        out.join("\n")
    }

    /// Unclaimed non-blank lines of `node`.
    fn take_unclaimed(&mut self, node: &Node<'_>) -> Vec<&'s str> {
        match self.rows(node) {
            Some((start, end)) => self.take_rows(start, end),
            None => Vec::new(),
        }
    }

    /// Every unclaimed non-blank line of the file.
    fn take_remaining(&mut self) -> Vec<&'s str> {
        match self.lines.len().checked_sub(1) {
            Some(last) => self.take_rows(0, last),
            None => Vec::new(),
        }
    }

    fn take_rows(&mut self, start: usize, end: usize) -> Vec<&'s str> {
        let mut out = Vec::new();
        for row in start..=end {
            let line = self.lines[row];
            if !self.claimed[row] && !line.trim().is_empty() {
                self.claimed[row] = true;
                out.push(line);
            }
        }
        out
    }
}

/// Unwrap `@decorator` wrappers to the underlying definition.
fn definition<'t>(node: &Node<'t>) -> Node<'t> {
    if node.kind() == "decorated_definition"
        && let Some(def) = node.child_by_field_name("definition")
    {
        return def;
    }
    *node
}

fn is_docstring(node: &Node<'_>) -> bool {
    node.kind() == "expression_statement"
        && node
            .named_child(0)
            .is_some_and(|c| matches!(c.kind(), "string" | "concatenated_string"))
}

fn push(drafts: &mut Vec<ChunkDraft>, ty: ConcreteType, content: String, symbols: Symbols) {
    if content.trim().is_empty() {
        return;
    }
    drafts.push(ChunkDraft::new(ty, content).with_symbols(symbols));
}

fn extract_module(root: &Node<'_>, source: &str) -> Vec<ChunkDraft> {
    let mut claims = LineClaims::new(source);
    let mut drafts = Vec::new();
    let top = named_children(root);

    if let Some(first) = top.iter().find(|n| n.kind() != "comment")
        && is_docstring(first)
    {
        let content = claims.span(first);
        push(
            &mut drafts,
            ConcreteType::PythonDocstring,
            content,
            Symbols::None,
        );
    }

    for node in &top {
        let def = definition(node);
        if def.kind() == "class_definition" {
            extract_class(node, &def, source, &mut claims, &mut drafts);
        }
    }

    for node in &top {
        let def = definition(node);
        if def.kind() != "function_definition" {
            continue;
        }
        let Some(identifier) = field_text(&def, "name", source) else {
            continue;
        };
        let uses = collect_uses(def, source, &CALLS);
        let content = claims.span(node);
        push(
            &mut drafts,
            ConcreteType::PythonFunction,
            content,
            Symbols::Definition {
                identifier,
                class_name: None,
                uses,
            },
        );
    }

    let mut imports: Vec<&str> = Vec::new();
    for node in top.iter().filter(|n| IMPORT_KINDS.contains(&n.kind())) {
        imports.extend(claims.take_unclaimed(node));
    }
    push(
        &mut drafts,
        ConcreteType::PythonImport,
        imports.join("\n"),
        Symbols::None,
    );

    let rest = claims.take_remaining();
    push(
        &mut drafts,
        ConcreteType::PythonTopLevelCode,
        rest.join("\n"),
        Symbols::None,
    );

    drafts
}

fn extract_class(
    outer: &Node<'_>,
    class: &Node<'_>,
    source: &str,
    claims: &mut LineClaims<'_>,
    drafts: &mut Vec<ChunkDraft>,
) {
    let Some(class_name) = field_text(class, "name", source) else {
        return;
    };

    let mut member_functions = Vec::new();
    let mut header_uses = BTreeSet::new();

    if let Some(body) = class.child_by_field_name("body") {
        for stmt in named_children(&body) {
            let def = definition(&stmt);
            let method_name = (def.kind() == "function_definition")
                .then(|| field_text(&def, "name", source))
                .flatten();
            match method_name {
                Some(identifier) => {
                    let uses = collect_uses(def, source, &CALLS);
                    let content = claims.span(&stmt);
                    member_functions.push(identifier.clone());
                    push(
                        drafts,
                        ConcreteType::PythonClassFunction,
                        content,
                        Symbols::Definition {
                            identifier,
                            class_name: Some(class_name.clone()),
                            uses,
                        },
                    );
                }
                None => header_uses.extend(collect_uses(stmt, source, &CALLS)),
            }
        }
    }

    let header = claims.take_unclaimed(outer);
    push(
        drafts,
        ConcreteType::PythonClassHeader,
        header.join("\n"),
        Symbols::ClassHeader {
            class_name,
            member_functions,
            uses: header_uses,
        },
    );
}
