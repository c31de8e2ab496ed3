//! Chunk record, concrete/canonical type vocabulary and payload mapping.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use repoctx_store::Payload;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ExpansionError, IndexError, Result};

/// Producing extractor's tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "blind-text")]
    Blind,
}

impl Language {
    /// Identifier used in the stored payload.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Html => "html",
            Self::Blind => "blind-text",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "python" => Some(Self::Python),
            "javascript" => Some(Self::JavaScript),
            "html" => Some(Self::Html),
            "blind-text" => Some(Self::Blind),
            _ => None,
        }
    }
}

macro_rules! concrete_types {
    ($($variant:ident => $name:literal, $canonical:expr;)+) => {
        /// Fine-grained, extractor-specific chunk label.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum ConcreteType {
            $(#[serde(rename = $name)] $variant,)+
        }

        impl ConcreteType {
            /// Every concrete type an extractor can emit.
            pub const ALL: &'static [ConcreteType] = &[$(ConcreteType::$variant,)+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Fixed lookup into the canonical vocabulary. `None` means unmapped.
            #[must_use]
            pub fn canonical(self) -> Option<CanonicalType> {
                match self {
                    $(Self::$variant => $canonical,)+
                }
            }
        }

        impl FromStr for ConcreteType {
            type Err = IndexError;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(IndexError::Other(format!("unknown chunk type: {other}"))),
                }
            }
        }
    };
}

concrete_types! {
    PythonDocstring => "python_docstring", Some(CanonicalType::PyDocstring);
    PythonImport => "python_import", Some(CanonicalType::PyImports);
    PythonClassFunction => "python_class_function", Some(CanonicalType::PyFunction);
    PythonClassHeader => "python_class_header", Some(CanonicalType::PyClassHeader);
    PythonFunction => "python_function", Some(CanonicalType::PyFunction);
    PythonTopLevelCode => "python_top_level_code", Some(CanonicalType::PyTopLevel);
    JavascriptImport => "javascript_import", Some(CanonicalType::JsImports);
    JavascriptClassFunction => "javascript_class_function", Some(CanonicalType::JsFunction);
    JavascriptClassHeader => "javascript_class_header", Some(CanonicalType::JsClassHeader);
    JavascriptFunction => "javascript_function", Some(CanonicalType::JsFunction);
    JavascriptTopLevelCode => "javascript_top_level_code", Some(CanonicalType::JsTopLevel);
    HtmlMainSection => "html_main_section", Some(CanonicalType::HtmlMain);
    HtmlSection => "html_section", Some(CanonicalType::HtmlSection);
    HtmlArticle => "html_article", Some(CanonicalType::HtmlArticle);
    HtmlNav => "html_nav", Some(CanonicalType::HtmlNav);
    HtmlForm => "html_form", Some(CanonicalType::HtmlForm);
    HtmlHeader => "html_header", Some(CanonicalType::HtmlHeader);
    HtmlFooter => "html_footer", Some(CanonicalType::HtmlFooter);
    HtmlScriptBlock => "html_script_block", None;
    HtmlStyleBlock => "html_style_block", None;
    HtmlTopLevelMarkup => "html_top_level_markup", Some(CanonicalType::HtmlTopLevel);
    BlindChunk => "blind_chunk", Some(CanonicalType::TextChunk);
}

impl ConcreteType {
    /// Extractor that emits this type.
    #[must_use]
    pub fn language(self) -> Language {
        let name = self.as_str();
        if name.starts_with("python_") {
            Language::Python
        } else if name.starts_with("javascript_") {
            Language::JavaScript
        } else if name.starts_with("html_") {
            Language::Html
        } else {
            Language::Blind
        }
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-language code type: the stable vocabulary shared with rulebook and planners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalType {
    #[serde(rename = "py:imports")]
    PyImports,
    #[serde(rename = "py:class_header")]
    PyClassHeader,
    #[serde(rename = "py:function")]
    PyFunction,
    #[serde(rename = "py:docstring")]
    PyDocstring,
    #[serde(rename = "py:top_level")]
    PyTopLevel,
    #[serde(rename = "js:imports")]
    JsImports,
    #[serde(rename = "js:class_header")]
    JsClassHeader,
    #[serde(rename = "js:function")]
    JsFunction,
    #[serde(rename = "js:top_level")]
    JsTopLevel,
    #[serde(rename = "html:main")]
    HtmlMain,
    #[serde(rename = "html:section")]
    HtmlSection,
    #[serde(rename = "html:article")]
    HtmlArticle,
    #[serde(rename = "html:nav")]
    HtmlNav,
    #[serde(rename = "html:form")]
    HtmlForm,
    #[serde(rename = "html:header")]
    HtmlHeader,
    #[serde(rename = "html:footer")]
    HtmlFooter,
    #[serde(rename = "html:top_level")]
    HtmlTopLevel,
    #[serde(rename = "text:chunk")]
    TextChunk,
}

impl CanonicalType {
    pub const ALL: &'static [CanonicalType] = &[
        Self::PyImports,
        Self::PyClassHeader,
        Self::PyFunction,
        Self::PyDocstring,
        Self::PyTopLevel,
        Self::JsImports,
        Self::JsClassHeader,
        Self::JsFunction,
        Self::JsTopLevel,
        Self::HtmlMain,
        Self::HtmlSection,
        Self::HtmlArticle,
        Self::HtmlNav,
        Self::HtmlForm,
        Self::HtmlHeader,
        Self::HtmlFooter,
        Self::HtmlTopLevel,
        Self::TextChunk,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PyImports => "py:imports",
            Self::PyClassHeader => "py:class_header",
            Self::PyFunction => "py:function",
            Self::PyDocstring => "py:docstring",
            Self::PyTopLevel => "py:top_level",
            Self::JsImports => "js:imports",
            Self::JsClassHeader => "js:class_header",
            Self::JsFunction => "js:function",
            Self::JsTopLevel => "js:top_level",
            Self::HtmlMain => "html:main",
            Self::HtmlSection => "html:section",
            Self::HtmlArticle => "html:article",
            Self::HtmlNav => "html:nav",
            Self::HtmlForm => "html:form",
            Self::HtmlHeader => "html:header",
            Self::HtmlFooter => "html:footer",
            Self::HtmlTopLevel => "html:top_level",
            Self::TextChunk => "text:chunk",
        }
    }

    /// Reverse lookup, derived from [`ConcreteType::canonical`].
    pub fn concrete_types(self) -> impl Iterator<Item = ConcreteType> {
        ConcreteType::ALL
            .iter()
            .copied()
            .filter(move |c| c.canonical() == Some(self))
    }
}

impl FromStr for CanonicalType {
    type Err = ExpansionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ExpansionError::UnknownCodeType(s.to_owned()))
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of the concrete types behind `requested`. Empty input means "no filtering".
#[must_use]
pub fn concrete_allow_list(requested: &BTreeSet<CanonicalType>) -> BTreeSet<ConcreteType> {
    requested
        .iter()
        .flat_map(|canonical| canonical.concrete_types())
        .collect()
}

/// Symbol information attached to a chunk. Which fields exist depends on the chunk kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbols {
    #[default]
    None,
    /// A function or method definition.
    Definition {
        identifier: String,
        class_name: Option<String>,
        uses: BTreeSet<String>,
    },
    /// The non-method remainder of a class.
    ClassHeader {
        class_name: String,
        member_functions: Vec<String>,
        uses: BTreeSet<String>,
    },
    /// A script or style block and the external sources it loads.
    Assets { external_sources: Vec<String> },
}

impl Symbols {
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Definition { identifier, .. } => Some(identifier),
            Self::ClassHeader { class_name, .. } => Some(class_name),
            Self::None | Self::Assets { .. } => None,
        }
    }

    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Self::Definition { class_name, .. } => class_name.as_deref(),
            Self::ClassHeader { class_name, .. } => Some(class_name),
            Self::None | Self::Assets { .. } => None,
        }
    }

    #[must_use]
    pub fn uses(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Definition { uses, .. } | Self::ClassHeader { uses, .. } => Some(uses),
            Self::None | Self::Assets { .. } => None,
        }
    }
}

/// Extractor output: a chunk before it is numbered, identified and embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDraft {
    pub concrete_type: ConcreteType,
    pub content: String,
    pub symbols: Symbols,
}

impl ChunkDraft {
    #[must_use]
    pub fn new(concrete_type: ConcreteType, content: String) -> Self {
        Self {
            concrete_type,
            content,
            symbols: Symbols::None,
        }
    }

    #[must_use]
    pub fn with_symbols(mut self, symbols: Symbols) -> Self {
        self.symbols = symbols;
        self
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.concrete_type.language()
    }
}

/// The atomic retrievable unit as stored in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub id: String,
    pub repo_url: String,
    pub file_path: String,
    pub chunk_number: u32,
    pub language: Language,
    pub concrete_type: ConcreteType,
    pub content: String,
    pub symbols: Symbols,
    pub content_hash: String,
}

/// Payload keys projected for ranking.
pub const META_FIELDS: &[&str] = &[
    "repo_url",
    "file_path",
    "chunk_type",
    "identifier",
    "uses",
    "class_name",
    "chunk_number",
];

impl Chunk {
    #[must_use]
    pub fn from_draft(
        draft: ChunkDraft,
        id: String,
        repo_url: &str,
        file_path: &str,
        chunk_number: u32,
    ) -> Self {
        let content_hash = blake3::hash(draft.content.as_bytes()).to_hex().to_string();
        Self {
            id,
            repo_url: repo_url.to_owned(),
            file_path: file_path.to_owned(),
            chunk_number,
            language: draft.language(),
            concrete_type: draft.concrete_type,
            content: draft.content,
            symbols: draft.symbols,
            content_hash,
        }
    }

    #[must_use]
    pub fn canonical_type(&self) -> Option<CanonicalType> {
        self.concrete_type.canonical()
    }

    /// `(start_line, end_line)` relative to the chunk content; `None` for empty content.
    #[must_use]
    pub fn line_span(&self) -> Option<(usize, usize)> {
        if self.content.is_empty() {
            return None;
        }
        Some((1, self.content.lines().count().max(1)))
    }

    /// Symbol names this chunk is known by: identifier, then enclosing class.
    #[must_use]
    pub fn symbols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(2);
        for name in [self.symbols.identifier(), self.symbols.class_name()]
            .into_iter()
            .flatten()
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    #[must_use]
    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            id: self.id.clone(),
            repo_url: Some(self.repo_url.clone()),
            file_path: Some(self.file_path.clone()),
            concrete_type: Some(self.concrete_type),
            identifier: self.symbols.identifier().map(str::to_owned),
            uses: self.symbols.uses().cloned().unwrap_or_default(),
            class_name: self.symbols.class_name().map(str::to_owned),
            chunk_number: Some(i64::from(self.chunk_number)),
        }
    }

    #[must_use]
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("repo_url".into(), json!(self.repo_url));
        payload.insert("file_path".into(), json!(self.file_path));
        payload.insert("chunk_number".into(), json!(self.chunk_number));
        payload.insert("language".into(), json!(self.language.id()));
        payload.insert("chunk_type".into(), json!(self.concrete_type.as_str()));
        payload.insert("content".into(), json!(self.content));
        payload.insert("content_hash".into(), json!(self.content_hash));

        match &self.symbols {
            Symbols::None => {}
            Symbols::Definition {
                identifier,
                class_name,
                uses,
            } => {
                payload.insert("identifier".into(), json!(identifier));
                if let Some(class_name) = class_name {
                    payload.insert("class_name".into(), json!(class_name));
                }
                payload.insert("uses".into(), json!(uses));
            }
            Symbols::ClassHeader {
                class_name,
                member_functions,
                uses,
            } => {
                payload.insert("identifier".into(), json!(class_name));
                payload.insert("class_name".into(), json!(class_name));
                payload.insert("member_functions".into(), json!(member_functions));
                payload.insert("uses".into(), json!(uses));
            }
            Symbols::Assets { external_sources } => {
                payload.insert("external_sources".into(), json!(external_sources));
            }
        }
        payload
    }

    /// Rebuild a chunk from a full stored payload.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Payload`] if a required field is missing or malformed.
    pub fn from_payload(id: String, payload: &Payload) -> Result<Self> {
        let bad = |reason: &str| IndexError::Payload {
            id: id.clone(),
            reason: reason.to_owned(),
        };

        let concrete_type: ConcreteType = str_field(payload, "chunk_type")
            .ok_or_else(|| bad("missing chunk_type"))?
            .parse()
            .map_err(|_| bad("unknown chunk_type"))?;
        let language = str_field(payload, "language")
            .and_then(Language::from_id)
            .unwrap_or_else(|| concrete_type.language());
        let chunk_number = payload
            .get("chunk_number")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| bad("missing chunk_number"))?;

        let symbols = if payload.contains_key("member_functions") {
            Symbols::ClassHeader {
                class_name: str_field(payload, "class_name")
                    .ok_or_else(|| bad("class header without class_name"))?
                    .to_owned(),
                member_functions: string_list(payload, "member_functions"),
                uses: string_list(payload, "uses").into_iter().collect(),
            }
        } else if let Some(identifier) = str_field(payload, "identifier") {
            Symbols::Definition {
                identifier: identifier.to_owned(),
                class_name: str_field(payload, "class_name").map(str::to_owned),
                uses: string_list(payload, "uses").into_iter().collect(),
            }
        } else if payload.contains_key("external_sources") {
            Symbols::Assets {
                external_sources: string_list(payload, "external_sources"),
            }
        } else {
            Symbols::None
        };

        let file_path = str_field(payload, "file_path")
            .ok_or_else(|| bad("missing file_path"))?
            .to_owned();
        let content = str_field(payload, "content")
            .ok_or_else(|| bad("missing content"))?
            .to_owned();

        Ok(Self {
            repo_url: str_field(payload, "repo_url").unwrap_or_default().to_owned(),
            content_hash: str_field(payload, "content_hash")
                .unwrap_or_default()
                .to_owned(),
            id,
            file_path,
            content,
            chunk_number,
            language,
            concrete_type,
            symbols,
        })
    }
}

/// Lightweight projection of a chunk used while scoring expansion candidates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChunkMeta {
    pub id: String,
    pub repo_url: Option<String>,
    pub file_path: Option<String>,
    pub concrete_type: Option<ConcreteType>,
    pub identifier: Option<String>,
    pub uses: BTreeSet<String>,
    pub class_name: Option<String>,
    pub chunk_number: Option<i64>,
}

impl ChunkMeta {
    /// Read the [`META_FIELDS`] projection. Absent or malformed fields become `None`.
    #[must_use]
    pub fn from_payload(id: String, payload: &Payload) -> Self {
        Self {
            id,
            repo_url: str_field(payload, "repo_url").map(str::to_owned),
            file_path: str_field(payload, "file_path").map(str::to_owned),
            concrete_type: str_field(payload, "chunk_type").and_then(|s| s.parse().ok()),
            identifier: str_field(payload, "identifier").map(str::to_owned),
            uses: string_list(payload, "uses").into_iter().collect(),
            class_name: str_field(payload, "class_name").map(str::to_owned),
            chunk_number: payload.get("chunk_number").and_then(Value::as_i64),
        }
    }
}

fn str_field<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn string_list(payload: &Payload, key: &str) -> Vec<String> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
