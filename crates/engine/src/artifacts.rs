//! Contract artifact lookup.
//!
//! Artifacts come from an [`ArtifactProvider`]; the runner reads them through
//! an [`ArtifactCache`] so each contract is fetched from the provider at most
//! once per run.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow};
use deckhand_types::ContractArtifact;
use tracing::{debug, warn};

/// Source of compiled contract artifacts keyed by contract name.
pub trait ArtifactProvider: Send + Sync {
    /// Returns the artifact for `contract`, or an error when it is unknown.
    fn artifact(&self, contract: &str) -> Result<ContractArtifact>;
}

/// Artifacts held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts {
    artifacts: HashMap<String, ContractArtifact>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artifact(mut self, artifact: ContractArtifact) -> Self {
        self.insert(artifact);
        self
    }

    pub fn insert(&mut self, artifact: ContractArtifact) {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Loads every `*.json` artifact in `directory`.
    ///
    /// # Arguments
    /// - `directory`: A build output directory with one artifact per file.
    ///
    /// # Returns
    /// The artifacts keyed by their `contractName`. JSON files that are not
    /// artifacts are skipped with a warning; unreadable files are errors.
    pub fn load_dir(directory: &Path) -> Result<Self> {
        let entries = fs::read_dir(directory)
            .with_context(|| format!("failed to read artifact directory {}", directory.display()))?;
        let mut loaded = Self::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
                continue;
            }
            let content = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
            match serde_json::from_str::<ContractArtifact>(&content) {
                Ok(artifact) => {
                    debug!(contract = %artifact.contract_name, path = %path.display(), "loaded artifact");
                    loaded.insert(artifact);
                }
                Err(error) => warn!(path = %path.display(), error = %error, "skipping file that is not a contract artifact"),
            }
        }
        Ok(loaded)
    }
}

impl ArtifactProvider for InMemoryArtifacts {
    fn artifact(&self, contract: &str) -> Result<ContractArtifact> {
        self.artifacts
            .get(contract)
            .cloned()
            .ok_or_else(|| anyhow!("unknown contract '{contract}'"))
    }
}

/// Memoizing front for an [`ArtifactProvider`].
#[derive(Clone)]
pub struct ArtifactCache {
    provider: Arc<dyn ArtifactProvider>,
    entries: Arc<Mutex<HashMap<String, Arc<ContractArtifact>>>>,
}

impl ArtifactCache {
    pub fn new(provider: Arc<dyn ArtifactProvider>) -> Self {
        Self {
            provider,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns the cached artifact, asking the provider on first use.
    pub fn artifact(&self, contract: &str) -> Result<Arc<ContractArtifact>> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("artifact cache lock poisoned"))?;
        if let Some(artifact) = entries.get(contract) {
            return Ok(Arc::clone(artifact));
        }
        let artifact = Arc::new(self.provider.artifact(contract)?);
        entries.insert(contract.to_string(), Arc::clone(&artifact));
        Ok(artifact)
    }
}

impl fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self.entries.lock().map(|entries| entries.len()).unwrap_or_default();
        f.debug_struct("ArtifactCache").field("cached", &cached).finish()
    }
}
