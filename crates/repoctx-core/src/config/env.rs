use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("REPOCTX_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid REPOCTX_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("REPOCTX_EMBEDDING_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOCTX_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Some(secs) = parsed("REPOCTX_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("REPOCTX_QDRANT_URL") {
            self.qdrant.url = v;
        }
        if let Ok(v) = std::env::var("REPOCTX_QDRANT_COLLECTION") {
            self.qdrant.collection = v;
        }
        if let Some(size) = parsed("REPOCTX_CHUNK_SIZE") {
            self.chunking.chunk_size = size;
        }
        if let Some(overlap) = parsed("REPOCTX_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = overlap;
        }
        if let Some(cap) = parsed("REPOCTX_SCAN_CAP") {
            self.expansion.scan_cap = cap;
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    match v.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("ignoring invalid {key} value: {v}");
            None
        }
    }
}
