mod env;
mod types;


pub use types::*;

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use repoctx_index::Rulebook;

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed. Rules
    /// naming an unknown intent, scope or code type fail to parse.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// An invalid rulebook rejects the whole configuration; no rule is loaded
    /// partially.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be positive");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.chunking.oversize_factor == 0 {
            bail!("chunking.oversize_factor must be positive");
        }
        if self.ingest.concurrency == 0 {
            bail!("ingest.concurrency must be positive");
        }
        if self.expansion.scan_cap == 0 {
            bail!("expansion.scan_cap must be positive");
        }
        if self.expansion.scan_page_size == 0 {
            bail!("expansion.scan_page_size must be positive");
        }
        if self.expansion.pool_multiplier == 0 {
            bail!("expansion.pool_multiplier must be positive");
        }

        let mut names = HashSet::new();
        for rule in &self.expansion_rules {
            if rule.name.trim().is_empty() {
                bail!("expansion rule with empty name");
            }
            if !names.insert(rule.name.as_str()) {
                bail!("duplicate expansion rule: {}", rule.name);
            }
            if rule.max_chunks == 0 {
                bail!("expansion rule {}: max_chunks must be positive", rule.name);
            }
            if rule.allowed_intents.is_empty() || rule.source_code_types.is_empty() {
                bail!(
                    "expansion rule {}: allowed_intents and source_code_types must not be empty",
                    rule.name
                );
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding.timeout_secs)
    }

    #[must_use]
    pub fn rulebook(&self) -> Rulebook {
        Rulebook::new(self.expansion_rules.clone())
    }

    #[must_use]
    pub fn indexer_config(&self) -> repoctx_index::IndexerConfig {
        repoctx_index::IndexerConfig {
            chunking: repoctx_index::extract::ChunkingConfig {
                chunk_size: self.chunking.chunk_size,
                chunk_overlap: self.chunking.chunk_overlap,
                oversize_factor: self.chunking.oversize_factor,
            },
            allowed_extensions: self.ingest.allowed_extensions.clone(),
            ignore_dirs: self.ingest.ignore_dirs.clone(),
            concurrency: self.ingest.concurrency,
            embed_timeout: self.embed_timeout(),
        }
    }

    #[must_use]
    pub fn expansion_config(&self) -> repoctx_index::ExpansionConfig {
        repoctx_index::ExpansionConfig {
            scan_cap: self.expansion.scan_cap,
            page_size: self.expansion.scan_page_size,
            pool_floor: self.expansion.pool_floor,
            pool_multiplier: self.expansion.pool_multiplier,
        }
    }

    #[must_use]
    pub fn retrieval_config(&self) -> repoctx_index::RetrievalConfig {
        repoctx_index::RetrievalConfig {
            top_k: self.retrieval.top_k,
            embed_timeout: self.embed_timeout(),
        }
    }
}
