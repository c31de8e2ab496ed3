use proptest::prelude::*;
use repoctx_index::ConcreteType;
use repoctx_index::extract::{
    ChunkingConfig, Extractor, HtmlExtractor, JavaScriptExtractor, PythonExtractor,
};

#[derive(Debug, Clone)]
enum PyItem {
    Import(String),
    Function { name: String, callee: String },
    Class { name: String, methods: Vec<String> },
    Assign(String, u32),
}

impl PyItem {
    fn render(&self) -> String {
        match self {
            Self::Import(module) => format!("import m_{module}\n"),
            Self::Function { name, callee } => {
                format!("def f_{name}(x):\n    y = x + 1\n\n    return g_{callee}(y)\n")
            }
            Self::Class { name, methods } => {
                let mut out = format!("class C_{name}:\n    limit = 3\n");
                for method in methods {
                    out.push_str(&format!(
                        "\n    def m_{method}(self):\n        return self.m_{method}()\n"
                    ));
                }
                out
            }
            Self::Assign(name, value) => format!("v_{name} = {value}\n"),
        }
    }
}

#[derive(Debug, Clone)]
enum JsItem {
    Import(String),
    Function { name: String, callee: String },
    Arrow(String),
    Class { name: String, methods: Vec<String> },
    Statement(String, u32),
}

impl JsItem {
    fn render(&self) -> String {
        match self {
            Self::Import(module) => format!("import m_{module} from \"./m_{module}.js\";\n"),
            Self::Function { name, callee } => {
                format!("function f_{name}(x) {{\n  return g_{callee}(x);\n}}\n")
            }
            Self::Arrow(name) => format!("const a_{name} = (x) => x * 2;\n"),
            Self::Class { name, methods } => {
                let mut out = format!("class C_{name} {{\n");
                for method in methods {
                    out.push_str(&format!("  m_{method}() {{\n    return this.size;\n  }}\n"));
                }
                out.push_str("}\n");
                out
            }
            Self::Statement(name, value) => format!("let v_{name} = {value};\n"),
        }
    }
}

#[derive(Debug, Clone)]
enum HtmlItem {
    Section { id: String, article: bool },
    Nav(String),
    Header(String),
    Footer(String),
    Div(String, u32),
    Script(String),
    Style(String),
}

impl HtmlItem {
    fn render(&self) -> String {
        match self {
            Self::Section { id, article } => {
                let mut out = format!("  <section id=\"s_{id}\">\n    <h2>t_{id}</h2>\n");
                if *article {
                    out.push_str(&format!("    <article><p>a_{id}</p></article>\n"));
                }
                out.push_str("  </section>\n");
                out
            }
            Self::Nav(id) => format!("  <nav>\n    <a href=\"/{id}\">n_{id}</a>\n  </nav>\n"),
            Self::Header(id) => format!("  <header><h1>h_{id}</h1></header>\n"),
            Self::Footer(id) => format!("  <footer>f_{id}</footer>\n"),
            Self::Div(id, n) => format!("  <div class=\"d_{id}\">\n    <p>{n}</p>\n  </div>\n"),
            Self::Script(id) => format!("  <script>run_{id}();</script>\n"),
            Self::Style(id) => format!("  <style>.c_{id} {{ color: red; }}</style>\n"),
        }
    }
}

/// A page body; `big_form` inserts one form far above the oversize limit.
#[derive(Debug, Clone)]
struct HtmlPage {
    items: Vec<HtmlItem>,
    big_form: Option<(usize, usize)>,
    main: bool,
}

impl HtmlPage {
    fn form(fields: usize) -> String {
        let mut out = String::from("<form action=\"/save\">\n");
        for n in 0..fields {
            out.push_str(&format!("    <label>field {n:03}</label><input name=\"f{n:03}\">\n"));
        }
        out.push_str("  </form>");
        out
    }

    fn body(&self) -> String {
        let mut parts: Vec<String> = self.items.iter().map(HtmlItem::render).collect();
        if let Some((at, fields)) = self.big_form {
            parts.insert(at.min(parts.len()), format!("  {}\n", Self::form(fields)));
        }
        let body = parts.concat();
        if self.main {
            format!("  <main>\n{body}  </main>\n")
        } else {
            body
        }
    }

    fn render(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n  <title>page</title>\n</head>\n<body>\n{}</body>\n</html>\n",
            self.body()
        )
    }
}

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,6}"
}

fn py_item() -> impl Strategy<Value = PyItem> {
    prop_oneof![
        ident().prop_map(PyItem::Import),
        (ident(), ident()).prop_map(|(name, callee)| PyItem::Function { name, callee }),
        (ident(), prop::collection::vec(ident(), 0..4))
            .prop_map(|(name, methods)| PyItem::Class { name, methods }),
        (ident(), 0u32..1000).prop_map(|(n, v)| PyItem::Assign(n, v)),
    ]
}

fn js_item() -> impl Strategy<Value = JsItem> {
    prop_oneof![
        ident().prop_map(JsItem::Import),
        (ident(), ident()).prop_map(|(name, callee)| JsItem::Function { name, callee }),
        ident().prop_map(JsItem::Arrow),
        (ident(), prop::collection::vec(ident(), 0..4))
            .prop_map(|(name, methods)| JsItem::Class { name, methods }),
        (ident(), 0u32..1000).prop_map(|(n, v)| JsItem::Statement(n, v)),
    ]
}

fn html_item() -> impl Strategy<Value = HtmlItem> {
    prop_oneof![
        (ident(), any::<bool>()).prop_map(|(id, article)| HtmlItem::Section { id, article }),
        ident().prop_map(HtmlItem::Nav),
        ident().prop_map(HtmlItem::Header),
        ident().prop_map(HtmlItem::Footer),
        (ident(), 0u32..1000).prop_map(|(id, n)| HtmlItem::Div(id, n)),
        ident().prop_map(HtmlItem::Script),
        ident().prop_map(HtmlItem::Style),
    ]
}

fn html_page() -> impl Strategy<Value = HtmlPage> {
    (
        prop::collection::vec(html_item(), 0..6),
        prop::option::of((0usize..6, 24usize..48)),
        any::<bool>(),
    )
        .prop_map(|(items, big_form, main)| HtmlPage {
            items,
            big_form,
            // A windowed main would not be a single block.
            main: main && big_form.is_none(),
        })
}

/// Oversize limit 800 bytes; the generated form always exceeds it.
fn html_config() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 400,
        chunk_overlap: 100,
        oversize_factor: 2,
    }
}

/// Undo blind-window overlap for one block's consecutive windows.
fn join_windows(pieces: &[&str], overlap: usize) -> String {
    let mut out = String::new();
    for (i, piece) in pieces.iter().enumerate() {
        let skip = if i == 0 { 0 } else { overlap };
        out.extend(piece.chars().skip(skip));
    }
    out
}

fn sorted_trimmed_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines.sort_unstable();
    lines
}

fn py_module() -> impl Strategy<Value = String> {
    prop::collection::vec(py_item(), 0..8).prop_map(|items| {
        items
            .iter()
            .map(PyItem::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    })
}

fn js_program() -> impl Strategy<Value = String> {
    prop::collection::vec(js_item(), 0..8).prop_map(|items| {
        items
            .iter()
            .map(JsItem::render)
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn sorted_non_blank_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines.sort_unstable();
    lines
}

fn sorted_non_whitespace(text: &str) -> Vec<char> {
    let mut chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    chars.sort_unstable();
    chars
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn python_emits_every_non_blank_line_once(source in py_module()) {
        let drafts = PythonExtractor::new(ChunkingConfig::default()).extract(&source);
        let emitted: String = drafts.iter().map(|d| format!("{}\n", d.content)).collect();
        prop_assert_eq!(sorted_non_blank_lines(&emitted), sorted_non_blank_lines(&source));
    }

    #[test]
    fn python_extraction_is_deterministic(source in py_module()) {
        let extractor = PythonExtractor::new(ChunkingConfig::default());
        prop_assert_eq!(extractor.extract(&source), extractor.extract(&source));
    }

    #[test]
    fn python_chunks_are_python_typed(source in py_module()) {
        let drafts = PythonExtractor::new(ChunkingConfig::default()).extract(&source);
        for draft in drafts {
            prop_assert!(draft.concrete_type.as_str().starts_with("python_"));
            prop_assert!(draft.concrete_type.canonical().is_some());
        }
    }

    #[test]
    fn javascript_emits_all_code_once(source in js_program()) {
        let drafts = JavaScriptExtractor::new(ChunkingConfig::default()).extract(&source);
        let emitted: String = drafts.iter().map(|d| d.content.as_str()).collect();
        prop_assert_eq!(sorted_non_whitespace(&emitted), sorted_non_whitespace(&source));
    }

    #[test]
    fn javascript_extraction_is_deterministic(source in js_program()) {
        let extractor = JavaScriptExtractor::new(ChunkingConfig::default());
        prop_assert_eq!(extractor.extract(&source), extractor.extract(&source));
    }

    #[test]
    fn javascript_never_emits_blank_chunks(source in js_program()) {
        let drafts = JavaScriptExtractor::new(ChunkingConfig::default()).extract(&source);
        for draft in drafts {
            prop_assert!(!draft.content.trim().is_empty());
            prop_assert_ne!(draft.concrete_type, ConcreteType::BlindChunk);
        }
    }

    #[test]
    fn html_emits_every_body_line_once(page in html_page()) {
        prop_assume!(!page.main);
        let config = html_config();
        let drafts = HtmlExtractor::new(config).extract(&page.render());

        let (forms, rest): (Vec<_>, Vec<_>) = drafts
            .iter()
            .partition(|d| d.concrete_type == ConcreteType::HtmlForm);
        let emitted: String = rest.iter().map(|d| format!("{}\n", d.content)).collect();
        let expected: String = page.items.iter().map(HtmlItem::render).collect();
        prop_assert_eq!(sorted_trimmed_lines(&emitted), sorted_trimmed_lines(&expected));

        match page.big_form {
            Some((_, fields)) => {
                prop_assert!(forms.len() > 1);
                prop_assert!(forms.iter().all(|d| d.content.chars().count() <= config.chunk_size));
                let pieces: Vec<&str> = forms.iter().map(|d| d.content.as_str()).collect();
                prop_assert_eq!(join_windows(&pieces, config.chunk_overlap), HtmlPage::form(fields));
            }
            None => prop_assert!(forms.is_empty()),
        }
    }

    #[test]
    fn html_main_is_the_only_chunk(page in html_page()) {
        prop_assume!(page.main);
        let drafts = HtmlExtractor::new(html_config()).extract(&page.render());
        prop_assert_eq!(drafts.len(), 1);
        prop_assert_eq!(drafts[0].concrete_type, ConcreteType::HtmlMainSection);
        let body = page.body();
        prop_assert_eq!(drafts[0].content.trim(), body.trim());
    }

    #[test]
    fn html_never_emits_head_markup(page in html_page()) {
        let drafts = HtmlExtractor::new(html_config()).extract(&page.render());
        for draft in drafts {
            prop_assert!(!draft.content.contains("<title>"));
            prop_assert!(!draft.content.contains("DOCTYPE"));
            prop_assert!(!draft.content.trim().is_empty());
        }
    }

    #[test]
    fn html_extraction_is_deterministic(page in html_page()) {
        let source = page.render();
        let extractor = HtmlExtractor::new(html_config());
        prop_assert_eq!(extractor.extract(&source), extractor.extract(&source));
    }
}
