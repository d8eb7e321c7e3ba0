//! Where document text comes from.

use std::path::PathBuf;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::trace;

use crate::base::ArtifactSetId;
use crate::error::{EngineError, MarkupError};

/// Text of one document to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    pub uri: SmolStr,
    pub text: String,
}

impl DocumentSource {
    pub fn new(uri: impl Into<SmolStr>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
        }
    }
}

/// Documents to load together into one artifact set.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub uris: Vec<SmolStr>,
    /// Existing set to join; a new set is created when `None`.
    pub set: Option<ArtifactSetId>,
}

impl LoadRequest {
    pub fn new(uri: impl Into<SmolStr>) -> Self {
        Self {
            uris: vec![uri.into()],
            set: None,
        }
    }

    /// Also load `uri`.
    pub fn with(mut self, uri: impl Into<SmolStr>) -> Self {
        self.uris.push(uri.into());
        self
    }

    /// Join an existing artifact set.
    pub fn into_set(mut self, set: ArtifactSetId) -> Self {
        self.set = Some(set);
        self
    }
}

/// Produces document text for a load request.
pub trait ArtifactFactory: Send {
    fn fetch(&self, uri: &str) -> Result<DocumentSource, EngineError>;

    fn create(&self, request: &LoadRequest) -> Result<Vec<DocumentSource>, EngineError> {
        request.uris.iter().map(|uri| self.fetch(uri)).collect()
    }
}

/// Serves documents registered in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFactory {
    documents: FxHashMap<SmolStr, String>,
}

impl InMemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, uri: impl Into<SmolStr>, text: impl Into<String>) {
        self.documents.insert(uri.into(), text.into());
    }

    pub fn with(mut self, uri: impl Into<SmolStr>, text: impl Into<String>) -> Self {
        self.insert(uri, text);
        self
    }
}

impl ArtifactFactory for InMemoryFactory {
    fn fetch(&self, uri: &str) -> Result<DocumentSource, EngineError> {
        self.documents
            .get(uri)
            .map(|text| DocumentSource::new(uri, text.clone()))
            .ok_or_else(|| MarkupError::UnknownDocument(SmolStr::new(uri)).into())
    }
}

/// Reads documents from the file system; locations are paths, optionally
/// relative to a base directory.
#[derive(Debug, Clone, Default)]
pub struct FileFactory {
    base: Option<PathBuf>,
}

impl FileFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    fn path_of(&self, uri: &str) -> PathBuf {
        match &self.base {
            Some(base) => base.join(uri),
            None => PathBuf::from(uri),
        }
    }
}

impl ArtifactFactory for FileFactory {
    fn fetch(&self, uri: &str) -> Result<DocumentSource, EngineError> {
        let path = self.path_of(uri);
        trace!("[FACTORY] reading {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(MarkupError::from)?;
        Ok(DocumentSource::new(uri, text))
    }
}
