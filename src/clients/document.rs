use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;

use crate::clients::errors::{Error, Result};

/// The page surface the widget renders into.
///
/// Each element is addressed by id and its inner markup is owned by a single
/// writer. Implementations must not create elements on write.
#[async_trait]
pub trait Document: Send + Sync {
    /// Whether an element with this id exists
    async fn contains(&self, id: &str) -> bool;

    /// Current inner markup of the element, `None` if it does not exist
    async fn inner_html(&self, id: &str) -> Option<String>;

    /// Replace the inner markup of an existing element
    async fn set_inner_html(&self, id: &str, html: &str) -> Result<()>;
}

/// Element ids are used as file names, so only `[A-Za-z0-9_-]` is accepted
pub fn validate_element_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::ConfigurationError(format!(
            "invalid element id {id:?}, expected ASCII letters, digits, '-' or '_'"
        )))
    }
}

/// In-memory page, mostly useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryDocument {
    elements: RwLock<HashMap<String, String>>,
}

impl MemoryDocument {
    /// Page with no elements
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Page with the given elements, all empty
    pub fn with_elements<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements = ids
            .into_iter()
            .map(|id| (id.into(), String::new()))
            .collect();
        MemoryDocument {
            elements: RwLock::new(elements),
        }
    }

    /// Add an empty element, keeping existing content
    pub async fn insert_element(&self, id: &str) {
        self.elements
            .write()
            .await
            .entry(id.to_string())
            .or_default();
    }

    /// Drop an element, returning its last content
    pub async fn remove_element(&self, id: &str) -> Option<String> {
        self.elements.write().await.remove(id)
    }
}

#[async_trait]
impl Document for MemoryDocument {
    async fn contains(&self, id: &str) -> bool {
        self.elements.read().await.contains_key(id)
    }

    async fn inner_html(&self, id: &str) -> Option<String> {
        self.elements.read().await.get(id).cloned()
    }

    async fn set_inner_html(&self, id: &str, html: &str) -> Result<()> {
        match self.elements.write().await.get_mut(id) {
            Some(content) => {
                html.clone_into(content);
                Ok(())
            }
            None => Err(Error::MissingTarget(id.to_string())),
        }
    }
}

/// Page made of fragment files: element `<id>` is `<root>/<id>.html`.
///
/// Meant for static sites that include the fragment at build or serve time.
/// An element exists iff its file exists.
#[derive(Debug, Clone)]
pub struct FragmentDirectory {
    root: PathBuf,
}

impl FragmentDirectory {
    /// Fragments live directly under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FragmentDirectory { root: root.into() }
    }

    /// `rnowplaying` under the user cache directory, created if missing
    pub async fn try_default() -> Result<Self> {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
            .join("rnowplaying");
        tokio::fs::create_dir_all(&root).await?;
        debug!("Using fragment directory {root:?}");
        Ok(FragmentDirectory { root })
    }

    /// Directory holding the fragments
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn element_path(&self, id: &str) -> Result<PathBuf> {
        validate_element_id(id)?;
        Ok(self.root.join(format!("{id}.html")))
    }

    /// Create the element's file (and the directory) if it is missing
    pub async fn ensure_element(&self, id: &str) -> Result<()> {
        let path = self.element_path(id)?;
        tokio::fs::create_dir_all(&self.root).await?;
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, "").await?;
            debug!("Created empty fragment {path:?}");
        }
        Ok(())
    }
}

#[async_trait]
impl Document for FragmentDirectory {
    async fn contains(&self, id: &str) -> bool {
        match self.element_path(id) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn inner_html(&self, id: &str) -> Option<String> {
        let path = self.element_path(id).ok()?;
        tokio::fs::read_to_string(path).await.ok()
    }

    // Written through a temporary file and renamed so readers never see a partial fragment
    async fn set_inner_html(&self, id: &str, html: &str) -> Result<()> {
        let path = self.element_path(id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(Error::MissingTarget(id.to_string()));
        }
        let tmp_path = self.root.join(format!(".{id}.html.tmp"));
        tokio::fs::write(&tmp_path, html).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        debug!("Wrote {} bytes to {path:?}", html.len());
        Ok(())
    }
}
