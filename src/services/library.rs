use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::services::storage::{KeyValueStore, StorageError, TEXTS_KEY};

/// A whole document kept for later reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedText {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("a saved text needs a title")]
    EmptyTitle,
    #[error("there is no text to save")]
    EmptyContent,
    #[error("no saved text with id {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Saved documents, stored as one JSON list
#[derive(Debug, Clone)]
pub struct TextLibrary {
    kv: Rc<KeyValueStore>,
}

impl TextLibrary {
    pub fn new(kv: Rc<KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Saved texts in the order they were saved
    pub fn list(&self) -> Vec<SavedText> {
        self.kv.load_list(TEXTS_KEY)
    }

    pub fn get(&self, id: &str) -> Result<SavedText, LibraryError> {
        self.list()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))
    }

    pub fn save(&self, title: &str, content: &str) -> Result<SavedText, LibraryError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LibraryError::EmptyTitle);
        }
        if content.trim().is_empty() {
            return Err(LibraryError::EmptyContent);
        }

        let record = SavedText {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        let mut texts: Vec<SavedText> = self.kv.read_list(TEXTS_KEY)?;
        texts.push(record.clone());
        self.kv.save_list(TEXTS_KEY, &texts)?;
        info!("saved text {:?} as {}", record.title, record.id);

        Ok(record)
    }

    /// Removing an unknown id is a no-op
    pub fn delete(&self, id: &str) -> Result<(), LibraryError> {
        let texts: Vec<SavedText> = self.kv.read_list(TEXTS_KEY)?;
        let remaining: Vec<SavedText> = texts.iter().filter(|t| t.id != id).cloned().collect();
        if remaining.len() != texts.len() {
            self.kv.save_list(TEXTS_KEY, &remaining)?;
            info!("deleted saved text {}", id);
        }
        Ok(())
    }
}
