//! HTML extractor: structural blocks, asset blocks and leftover markup.

use std::ops::Range;

use tree_sitter::Node;

use crate::chunk::{ChunkDraft, ConcreteType, Language, Symbols};

use super::{
    BlindExtractor, ChunkingConfig, Extractor, named_children, node_text, non_blank_lines, parse,
    windows,
};

#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    config: ChunkingConfig,
    fallback: BlindExtractor,
}

impl HtmlExtractor {
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            fallback: BlindExtractor::new(config),
        }
    }

    fn oversize_limit(&self) -> usize {
        self.config
            .chunk_size
            .saturating_mul(self.config.oversize_factor.max(1))
    }

    /// Emit `content` as one draft, or as blind windows of the same type when too large.
    fn emit(&self, drafts: &mut Vec<ChunkDraft>, ty: ConcreteType, content: &str, symbols: Symbols) {
        if content.trim().is_empty() {
            return;
        }
        if content.len() <= self.oversize_limit() {
            drafts.push(ChunkDraft::new(ty, content.to_owned()).with_symbols(symbols));
            return;
        }
        for piece in windows(content, self.config.chunk_size, self.config.chunk_overlap) {
            if !piece.trim().is_empty() {
                drafts.push(ChunkDraft::new(ty, piece.to_owned()).with_symbols(symbols.clone()));
            }
        }
    }
}

impl Extractor for HtmlExtractor {
    fn language(&self) -> Language {
        Language::Html
    }

    fn extract(&self, source: &str) -> Vec<ChunkDraft> {
        let grammar: tree_sitter::Language = tree_sitter_html::LANGUAGE.into();
        // Real-world markup is rarely error-free; recovered trees are still usable.
        let Some(tree) = parse(source, &grammar, false) else {
            tracing::debug!("html source did not parse, using blind windows");
            return self.fallback.extract(source);
        };
        let root = tree.root_node();
        let mut drafts = Vec::new();

        if let Some(main) = find_element(&root, source, "main") {
            self.emit(
                &mut drafts,
                ConcreteType::HtmlMainSection,
                node_text(&main, source),
                Symbols::None,
            );
            return drafts;
        }

        let mut structural = Vec::new();
        let mut assets = Vec::new();
        collect_blocks(&root, source, &mut structural, &mut assets);

        let mut covered: Vec<Range<usize>> = Vec::new();
        for block in structural.into_iter().chain(assets) {
            covered.push(block.range.clone());
            self.emit(
                &mut drafts,
                block.ty,
                &source[block.range],
                block.symbols,
            );
        }

        let region = find_element(&root, source, "body")
            .map_or(0..source.len(), |body| inner_range(&body));
        let markup = leftover_markup(source, region, covered);
        self.emit(
            &mut drafts,
            ConcreteType::HtmlTopLevelMarkup,
            &markup,
            Symbols::None,
        );
        drafts
    }
}

struct Block {
    ty: ConcreteType,
    range: Range<usize>,
    symbols: Symbols,
}

fn structural_type(tag: &str) -> Option<ConcreteType> {
    match tag {
        "section" => Some(ConcreteType::HtmlSection),
        "article" => Some(ConcreteType::HtmlArticle),
        "nav" => Some(ConcreteType::HtmlNav),
        "form" => Some(ConcreteType::HtmlForm),
        "header" => Some(ConcreteType::HtmlHeader),
        "footer" => Some(ConcreteType::HtmlFooter),
        _ => None,
    }
}

fn start_tag<'t>(node: &Node<'t>) -> Option<Node<'t>> {
    named_children(node)
        .into_iter()
        .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"))
}

fn tag_name(node: &Node<'_>, source: &str) -> Option<String> {
    let tag = start_tag(node)?;
    named_children(&tag)
        .into_iter()
        .find(|c| c.kind() == "tag_name")
        .map(|n| node_text(&n, source).to_ascii_lowercase())
}

/// First element named `name` in document order.
fn find_element<'t>(node: &Node<'t>, source: &str, name: &str) -> Option<Node<'t>> {
    for child in named_children(node) {
        if child.kind() == "element" && tag_name(&child, source).as_deref() == Some(name) {
            return Some(child);
        }
        if let Some(found) = find_element(&child, source, name) {
            return Some(found);
        }
    }
    None
}

/// Structural tags are emitted whole, so nothing nested inside one is visited.
fn collect_blocks(
    node: &Node<'_>,
    source: &str,
    structural: &mut Vec<Block>,
    assets: &mut Vec<Block>,
) {
    for child in named_children(node) {
        match child.kind() {
            "element" => {
                match tag_name(&child, source).as_deref().and_then(structural_type) {
                    Some(ty) => structural.push(Block {
                        ty,
                        range: child.byte_range(),
                        symbols: Symbols::None,
                    }),
                    None => collect_blocks(&child, source, structural, assets),
                }
            }
            "script_element" => assets.push(Block {
                ty: ConcreteType::HtmlScriptBlock,
                range: child.byte_range(),
                symbols: Symbols::Assets {
                    external_sources: script_sources(&child, source),
                },
            }),
            "style_element" => assets.push(Block {
                ty: ConcreteType::HtmlStyleBlock,
                range: child.byte_range(),
                symbols: Symbols::None,
            }),
            _ => collect_blocks(&child, source, structural, assets),
        }
    }
}

fn script_sources(script: &Node<'_>, source: &str) -> Vec<String> {
    let Some(tag) = start_tag(script) else {
        return Vec::new();
    };
    named_children(&tag)
        .into_iter()
        .filter(|c| c.kind() == "attribute")
        .filter_map(|attr| {
            let parts = named_children(&attr);
            let name = parts.iter().find(|p| p.kind() == "attribute_name")?;
            if !node_text(name, source).eq_ignore_ascii_case("src") {
                return None;
            }
            let value = parts.iter().find_map(|p| match p.kind() {
                "attribute_value" => Some(node_text(p, source).to_owned()),
                "quoted_attribute_value" => Some(
                    node_text(p, source)
                        .trim_matches(|c| c == '"' || c == '\'')
                        .to_owned(),
                ),
                _ => None,
            })?;
            (!value.is_empty()).then_some(value)
        })
        .collect()
}

/// Byte range between an element's start and end tags.
fn inner_range(element: &Node<'_>) -> Range<usize> {
    let children = named_children(element);
    let start = children
        .iter()
        .find(|c| c.kind() == "start_tag")
        .map_or(element.start_byte(), Node::end_byte);
    let end = children
        .iter()
        .rev()
        .find(|c| c.kind() == "end_tag")
        .map_or(element.end_byte(), Node::start_byte);
    start..end.max(start)
}

/// Non-blank text of `region` outside every emitted block.
fn leftover_markup(source: &str, region: Range<usize>, mut covered: Vec<Range<usize>>) -> String {
    covered.sort_by_key(|r| r.start);
    let mut lines: Vec<&str> = Vec::new();
    let mut pos = region.start;
    for range in covered {
        let start = range.start.clamp(region.start, region.end);
        let end = range.end.clamp(region.start, region.end);
        if start > pos {
            lines.extend(non_blank_lines(&source[pos..start]).into_iter().map(str::trim_end));
        }
        pos = pos.max(end);
    }
    if pos < region.end {
        lines.extend(non_blank_lines(&source[pos..region.end]).into_iter().map(str::trim_end));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Shop</title>
  <script src="/static/app.js"></script>
  <style>body { margin: 0; }</style>
</head>
<body>
  <header><h1>Shop</h1></header>
  <div class="wrap">
    <section id="items">
      <article><p>Item</p></article>
    </section>
  </div>
  <nav><a href="/">Home</a></nav>
  <script>start();</script>
  <footer>(c) shop</footer>
</body>
</html>
"#;

    fn extractor() -> HtmlExtractor {
        HtmlExtractor::new(ChunkingConfig::default())
    }

    fn types(drafts: &[ChunkDraft]) -> Vec<ConcreteType> {
        drafts.iter().map(|d| d.concrete_type).collect()
    }

    #[test]
    fn structural_then_assets_then_markup() {
        let drafts = extractor().extract(PAGE);
        assert_eq!(
            types(&drafts),
            vec![
                ConcreteType::HtmlHeader,
                ConcreteType::HtmlSection,
                ConcreteType::HtmlNav,
                ConcreteType::HtmlFooter,
                ConcreteType::HtmlScriptBlock,
                ConcreteType::HtmlStyleBlock,
                ConcreteType::HtmlScriptBlock,
                ConcreteType::HtmlTopLevelMarkup,
            ]
        );
    }

    #[test]
    fn nested_structural_tag_is_not_emitted_twice() {
        let drafts = extractor().extract(PAGE);
        assert!(!types(&drafts).contains(&ConcreteType::HtmlArticle));
        let section = &drafts[1];
        assert!(section.content.contains("<article><p>Item</p></article>"));
    }

    #[test]
    fn script_records_external_sources() {
        let drafts = extractor().extract(PAGE);
        assert_eq!(
            drafts[4].symbols,
            Symbols::Assets {
                external_sources: vec!["/static/app.js".into()]
            }
        );
        assert_eq!(
            drafts[6].symbols,
            Symbols::Assets {
                external_sources: Vec::new()
            }
        );
    }

    #[test]
    fn leftover_markup_keeps_unclaimed_body_lines() {
        let drafts = extractor().extract(PAGE);
        let markup = &drafts[7].content;
        assert!(markup.contains("<div class=\"wrap\">"));
        assert!(markup.contains("</div>"));
        assert!(!markup.contains("<nav>"));
        assert!(!markup.contains("start();"));
    }

    #[test]
    fn leftover_markup_ignores_head_and_doctype() {
        let drafts = extractor().extract(PAGE);
        let markup = &drafts[7].content;
        assert!(!markup.contains("<title>"));
        assert!(!markup.contains("DOCTYPE"));
        assert!(!markup.contains("<head>"));
        assert!(!markup.contains("<body>"));
        assert!(!markup.contains("</html>"));
    }

    #[test]
    fn head_only_document_has_no_markup_chunk() {
        let page = "<!DOCTYPE html>\n<html>\n<head>\n  <title>t</title>\n</head>\n<body>\n</body>\n</html>\n";
        assert!(extractor().extract(page).is_empty());
    }

    #[test]
    fn main_dominates_document() {
        let page = "<html><body><nav>x</nav><main><section>a</section><article>b</article></main></body></html>";
        let drafts = extractor().extract(page);
        assert_eq!(types(&drafts), vec![ConcreteType::HtmlMainSection]);
        assert_eq!(
            drafts[0].content,
            "<main><section>a</section><article>b</article></main>"
        );
    }

    #[test]
    fn oversized_block_is_subdivided_keeping_type() {
        let config = ChunkingConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            oversize_factor: 2,
        };
        let body = "<p>lorem ipsum dolor sit amet</p>".repeat(10);
        let page = format!("<section>{body}</section>");
        let drafts = HtmlExtractor::new(config).extract(&page);
        assert!(drafts.len() > 1);
        assert!(
            drafts
                .iter()
                .all(|d| d.concrete_type == ConcreteType::HtmlSection)
        );
        assert!(drafts.iter().all(|d| d.content.chars().count() <= 40));
    }

    #[test]
    fn markup_without_blocks_is_one_chunk() {
        let drafts = extractor().extract("<div>\n  <p>hi</p>\n</div>\n");
        assert_eq!(types(&drafts), vec![ConcreteType::HtmlTopLevelMarkup]);
        assert_eq!(drafts[0].content, "<div>\n  <p>hi</p>\n</div>");
    }

    #[test]
    fn extraction_is_deterministic() {
        assert_eq!(extractor().extract(PAGE), extractor().extract(PAGE));
    }
}
