use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("upsert error: {0}")]
    Upsert(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("scroll error: {0}")]
    Scroll(String),
    #[error("retrieve error: {0}")]
    Retrieve(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Payload = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A point returned without its vector (scan and fetch-by-id results).
#[derive(Debug, Clone)]
pub struct PayloadPoint {
    pub id: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

impl VectorFilter {
    #[must_use]
    pub fn must(conditions: Vec<FieldCondition>) -> Self {
        Self {
            must: conditions,
            must_not: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

impl FieldCondition {
    #[must_use]
    pub fn text(field: &str, value: impl Into<String>) -> Self {
        Self {
            field: field.to_owned(),
            value: FieldValue::Text(value.into()),
        }
    }

    #[must_use]
    pub fn any_text(field: &str, values: Vec<String>) -> Self {
        Self {
            field: field.to_owned(),
            value: FieldValue::AnyText(values),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    /// Matches when the payload field equals any of the listed keywords.
    AnyText(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    pub score: f32,
    pub payload: Payload,
}

/// One page request of a filtered scan.
#[derive(Debug, Clone)]
pub struct ScrollRequest {
    pub filter: VectorFilter,
    /// Payload keys to return; `None` returns the full payload.
    pub projection: Option<Vec<String>>,
    pub page_size: u32,
    /// Opaque cursor from the previous page's `next_offset`.
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    pub points: Vec<PayloadPoint>,
    pub next_offset: Option<String>,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorStore: Send + Sync {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Create a keyword payload index so filters on `field` stay index-bound.
    fn create_keyword_index(
        &self,
        collection: &str,
        field: &str,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>>;

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Idempotent by point id.
    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Nearest neighbours ordered by decreasing similarity.
    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
        filter: Option<VectorFilter>,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    /// One page of the points matching `request.filter`.
    fn scroll(
        &self,
        collection: &str,
        request: ScrollRequest,
    ) -> BoxFuture<'_, Result<ScrollPage, VectorStoreError>>;

    /// Fetch points by id. Unknown ids are omitted; order is not guaranteed.
    fn get_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
        projection: Option<Vec<String>>,
    ) -> BoxFuture<'_, Result<Vec<PayloadPoint>, VectorStoreError>>;

    fn delete_by_ids(
        &self,
        collection: &str,
        ids: Vec<String>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    fn delete_by_filter(
        &self,
        collection: &str,
        filter: VectorFilter,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>>;
}
