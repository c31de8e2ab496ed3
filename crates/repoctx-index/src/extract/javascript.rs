//! JavaScript extractor with byte-span claim bookkeeping.

use std::collections::BTreeSet;
use std::ops::Range;

use tree_sitter::Node;

use crate::chunk::{ChunkDraft, ConcreteType, Language, Symbols};

use super::{
    BlindExtractor, CallShape, ChunkingConfig, Extractor, collect_uses, field_text,
    named_children, node_text, non_blank_lines, parse,
};

const CALLS: CallShape = CallShape {
    call: "call_expression",
    callee: "function",
    member: "member_expression",
    member_name: "property",
};

const FUNCTION_DECLARATIONS: &[&str] = &["function_declaration", "generator_function_declaration"];

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

#[derive(Debug, Clone)]
pub struct JavaScriptExtractor {
    fallback: BlindExtractor,
}

impl JavaScriptExtractor {
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            fallback: BlindExtractor::new(config),
        }
    }
}

impl Extractor for JavaScriptExtractor {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn extract(&self, source: &str) -> Vec<ChunkDraft> {
        let grammar: tree_sitter::Language = tree_sitter_javascript::LANGUAGE.into();
        let Some(tree) = parse(source, &grammar, true) else {
            tracing::debug!("javascript source did not parse, using blind windows");
            return self.fallback.extract(source);
        };
        extract_program(&tree.root_node(), source)
    }
}

#[derive(Default)]
struct SpanClaims(Vec<Range<usize>>);

impl SpanClaims {
    fn claim(&mut self, node: &Node<'_>) {
        self.0.push(node.byte_range());
    }

    fn is_claimed(&self, node: &Node<'_>) -> bool {
        let range = node.byte_range();
        self.0
            .iter()
            .any(|c| c.start <= range.start && range.end <= c.end)
    }
}

/// The declaration behind an `export` wrapper, or the node itself.
fn declaration<'t>(node: &Node<'t>) -> Node<'t> {
    if node.kind() == "export_statement"
        && let Some(decl) = node.child_by_field_name("declaration")
    {
        return decl;
    }
    *node
}

/// `const name = () => ...` style bindings with a single function-valued declarator.
fn bound_function<'t>(decl: &Node<'t>, source: &str) -> Option<(String, Node<'t>)> {
    if !matches!(decl.kind(), "lexical_declaration" | "variable_declaration") {
        return None;
    }
    let declarators = named_children(decl);
    let [declarator] = declarators.as_slice() else {
        return None;
    };
    let value = declarator.child_by_field_name("value")?;
    if !FUNCTION_VALUES.contains(&value.kind()) {
        return None;
    }
    let name = declarator.child_by_field_name("name")?;
    (name.kind() == "identifier").then(|| (node_text(&name, source).to_owned(), value))
}

fn push(drafts: &mut Vec<ChunkDraft>, ty: ConcreteType, content: String, symbols: Symbols) {
    if content.trim().is_empty() {
        return;
    }
    drafts.push(ChunkDraft::new(ty, content).with_symbols(symbols));
}

fn extract_program(root: &Node<'_>, source: &str) -> Vec<ChunkDraft> {
    let mut claims = SpanClaims::default();
    let mut drafts = Vec::new();
    let top = named_children(root);

    let mut imports: Vec<&str> = Vec::new();
    for node in top.iter().filter(|n| n.kind() == "import_statement") {
        imports.push(node_text(node, source));
        claims.claim(node);
    }
    push(
        &mut drafts,
        ConcreteType::JavascriptImport,
        imports.join("\n"),
        Symbols::None,
    );

    for node in &top {
        let decl = declaration(node);
        if matches!(decl.kind(), "class_declaration" | "class") {
            extract_class(node, &decl, source, &mut claims, &mut drafts);
        }
    }

    for node in &top {
        if claims.is_claimed(node) {
            continue;
        }
        let decl = declaration(node);
        let named = if FUNCTION_DECLARATIONS.contains(&decl.kind()) {
            field_text(&decl, "name", source).map(|name| (name, decl))
        } else {
            bound_function(&decl, source)
        };
        let Some((identifier, function)) = named else {
            continue;
        };
        let uses = collect_uses(function, source, &CALLS);
        claims.claim(node);
        push(
            &mut drafts,
            ConcreteType::JavascriptFunction,
            node_text(node, source).to_owned(),
            Symbols::Definition {
                identifier,
                class_name: None,
                uses,
            },
        );
    }

    let rest: Vec<&str> = top
        .iter()
        .filter(|n| !claims.is_claimed(n))
        .map(|n| node_text(n, source))
        .collect();
    push(
        &mut drafts,
        ConcreteType::JavascriptTopLevelCode,
        rest.join("\n"),
        Symbols::None,
    );

    drafts
}

fn extract_class(
    outer: &Node<'_>,
    class: &Node<'_>,
    source: &str,
    claims: &mut SpanClaims,
    drafts: &mut Vec<ChunkDraft>,
) {
    let Some(class_name) = field_text(class, "name", source) else {
        return;
    };

    let mut member_functions = Vec::new();
    let mut method_spans: Vec<Range<usize>> = Vec::new();
    let mut header_uses = BTreeSet::new();

    if let Some(body) = class.child_by_field_name("body") {
        for member in named_children(&body) {
            let name = (member.kind() == "method_definition")
                .then(|| field_text(&member, "name", source))
                .flatten();
            let Some(identifier) = name else {
                header_uses.extend(collect_uses(member, source, &CALLS));
                continue;
            };
            let uses = collect_uses(member, source, &CALLS);
            method_spans.push(member.byte_range());
            member_functions.push(identifier.clone());
            push(
                drafts,
                ConcreteType::JavascriptClassFunction,
                node_text(&member, source).to_owned(),
                Symbols::Definition {
                    identifier,
                    class_name: Some(class_name.clone()),
                    uses,
                },
            );
        }
    }

    let header = header_text(source, outer.byte_range(), &method_spans);
    claims.claim(outer);
    push(
        drafts,
        ConcreteType::JavascriptClassHeader,
        header,
        Symbols::ClassHeader {
            class_name,
            member_functions,
            uses: header_uses,
        },
    );
}

/// Class text with method spans cut out and blank lines dropped.
fn header_text(source: &str, class: Range<usize>, methods: &[Range<usize>]) -> String {
    let mut remainder = String::with_capacity(class.len());
    let mut pos = class.start;
    for method in methods {
        remainder.push_str(&source[pos..method.start]);
        pos = method.end;
    }
    remainder.push_str(&source[pos..class.end]);
    non_blank_lines(&remainder).join("\n")
}
