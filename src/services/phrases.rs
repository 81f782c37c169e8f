use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::storage::{PhraseStorage, StorageError};
use crate::text_map::phrase_key;

/// A saved text span and its translation.
///
/// The phrase string keeps the casing it was first saved with; identity
/// comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub phrase: String,
    pub translation: String,
}

impl Phrase {
    pub fn new(phrase: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            phrase: phrase.into(),
            translation: translation.into(),
        }
    }

    pub fn key(&self) -> String {
        phrase_key(&self.phrase)
    }

    pub fn matches(&self, phrase: &str) -> bool {
        self.key() == phrase_key(phrase)
    }
}

#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("phrase must not be empty")]
    EmptyPhrase,
    #[error("translation must not be empty")]
    EmptyTranslation,
    #[error("no saved phrase named {0:?}")]
    NotFound(String),
    #[error("could not persist saved phrases: {0}")]
    Storage(#[from] StorageError),
}

/// Rejects blank phrases or translations before anything reaches the store
pub fn validate(phrase: &str, translation: &str) -> Result<(), PhraseError> {
    if phrase.trim().is_empty() {
        return Err(PhraseError::EmptyPhrase);
    }
    if translation.trim().is_empty() {
        return Err(PhraseError::EmptyTranslation);
    }
    Ok(())
}

/// Saved phrases in insertion order, written through to storage after
/// every mutation.
///
/// A failed write keeps the in-memory change, marks the store dirty and
/// reports the error; the next successful write (or [`PhraseStore::flush`])
/// persists the whole list again.
///
/// If the persisted list could not be read at startup, the store begins
/// empty and nothing is written until a later read succeeds; the changes
/// made meanwhile are then applied on top of the persisted entries.
#[derive(Debug)]
pub struct PhraseStore<S: PhraseStorage> {
    phrases: Vec<Phrase>,
    storage: S,
    dirty: bool,
    synced: bool,
}

/// Collapses entries that collide case-insensitively into the first one,
/// keeping the last translation
fn merge_entries(entries: impl IntoIterator<Item = Phrase>) -> Vec<Phrase> {
    let mut phrases: Vec<Phrase> = Vec::new();
    for entry in entries {
        match phrases.iter_mut().find(|p| p.matches(&entry.phrase)) {
            Some(existing) => {
                debug!("merging duplicate saved phrase {:?}", entry.phrase);
                existing.translation = entry.translation;
            }
            None => phrases.push(entry),
        }
    }
    phrases
}

impl<S: PhraseStorage> PhraseStore<S> {
    /// Loads the persisted list, merging case-insensitive duplicates
    pub fn load(storage: S) -> Self {
        let (phrases, synced) = match storage.load() {
            Ok(entries) => (merge_entries(entries), true),
            Err(e) => {
                warn!("could not read saved phrases: {}", e);
                (Vec::new(), false)
            }
        };
        debug!("loaded {} saved phrases", phrases.len());

        Self {
            phrases,
            storage,
            dirty: false,
            synced,
        }
    }

    /// Read-only snapshot in insertion order
    pub fn list(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Case-insensitive lookup
    pub fn get(&self, phrase: &str) -> Option<&Phrase> {
        let key = phrase_key(phrase);
        self.phrases.iter().find(|p| p.key() == key)
    }

    pub fn translation_of(&self, phrase: &str) -> Option<&str> {
        self.get(phrase).map(|p| p.translation.as_str())
    }

    /// True when the last write failed and memory is ahead of storage
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Saves a translation. An existing entry that matches case-insensitively
    /// gets the new translation but keeps its casing; otherwise the phrase is
    /// appended.
    pub fn upsert(&mut self, phrase: &str, translation: &str) -> Result<(), PhraseError> {
        let key = phrase_key(phrase);
        match self.phrases.iter_mut().find(|p| p.key() == key) {
            Some(existing) => {
                info!("updating translation of {:?}", existing.phrase);
                existing.translation = translation.to_string();
            }
            None => {
                info!("saving phrase {:?}", phrase);
                self.phrases.push(Phrase::new(phrase, translation));
            }
        }
        self.persist()
    }

    /// Replaces the phrase text and translation of the entry exactly named
    /// `old`.
    ///
    /// If `new` case-insensitively names a different entry, that entry is
    /// dropped and the renamed entry keeps its own position.
    pub fn rename(&mut self, old: &str, new: &str, translation: &str) -> Result<(), PhraseError> {
        let index = self
            .phrases
            .iter()
            .position(|p| p.phrase == old)
            .ok_or_else(|| PhraseError::NotFound(old.to_string()))?;

        let key = phrase_key(new);
        let mut target = index;
        if let Some(collision) = self
            .phrases
            .iter()
            .enumerate()
            .position(|(i, p)| i != index && p.key() == key)
        {
            info!(
                "rename of {:?} to {:?} replaces {:?}",
                old, new, self.phrases[collision].phrase
            );
            self.phrases.remove(collision);
            if collision < index {
                target -= 1;
            }
        }

        self.phrases[target] = Phrase::new(new, translation);
        self.persist()
    }

    /// Deletes the entry exactly named `phrase`. Returns false, without
    /// writing, when there is none.
    pub fn remove(&mut self, phrase: &str) -> Result<bool, PhraseError> {
        let before = self.phrases.len();
        self.phrases.retain(|p| p.phrase != phrase);
        if self.phrases.len() == before {
            debug!("remove of unknown phrase {:?} ignored", phrase);
            return Ok(false);
        }

        info!("removed phrase {:?}", phrase);
        self.persist()?;
        Ok(true)
    }

    /// Retries a failed write
    pub fn flush(&mut self) -> Result<(), PhraseError> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<(), PhraseError> {
        if !self.synced {
            self.sync()?;
        }

        match self.storage.save_all(&self.phrases) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                warn!("saved phrases kept in memory only: {}", e);
                self.dirty = true;
                Err(e.into())
            }
        }
    }

    /// Re-reads the persisted list and applies the in-memory entries to it
    fn sync(&mut self) -> Result<(), PhraseError> {
        match self.storage.load() {
            Ok(saved) => {
                let local = std::mem::take(&mut self.phrases);
                info!("recovered saved phrases, applying {} local changes", local.len());
                self.phrases = merge_entries(saved.into_iter().chain(local));
                self.synced = true;
                Ok(())
            }
            Err(e) => {
                warn!("saved phrases still unreadable, not writing: {}", e);
                self.dirty = true;
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::MemoryPhraseStorage;

    fn store(phrases: &[(&str, &str)]) -> PhraseStore<MemoryPhraseStorage> {
        PhraseStore::load(MemoryPhraseStorage::with_phrases(
            phrases.iter().map(|(p, t)| Phrase::new(*p, *t)).collect(),
        ))
    }

    fn entries(store: &PhraseStore<MemoryPhraseStorage>) -> Vec<(String, String)> {
        store
            .list()
            .iter()
            .map(|p| (p.phrase.clone(), p.translation.clone()))
            .collect()
    }

    #[test]
    fn test_upsert_appends_in_order() {
        let mut store = store(&[]);
        store.upsert("house", "casa").unwrap();
        store.upsert("dog", "perro").unwrap();

        assert_eq!(store.list()[0].phrase, "house");
        assert_eq!(store.list()[1].phrase, "dog");
        assert_eq!(store.storage().saved(), store.list());
    }

    #[test]
    fn test_upsert_is_case_insensitive_and_keeps_casing() {
        let mut store = store(&[]);
        store.upsert("Casa", "house").unwrap();
        store.upsert("casa", "home").unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0], Phrase::new("Casa", "home"));
        assert_eq!(store.translation_of("CASA"), Some("home"));
    }

    #[test]
    fn test_upsert_folds_greek_final_sigma() {
        let mut store = store(&[]);
        store.upsert("ΟΔΟΣ", "street").unwrap();
        store.upsert("οδοσ", "road").unwrap();
        store.upsert("οδος", "way").unwrap();

        assert_eq!(store.list(), &[Phrase::new("ΟΔΟΣ", "way")]);
    }

    #[test]
    fn test_rename_in_place() {
        let mut store = store(&[("house", "casa"), ("dog", "perro")]);
        store.rename("house", "big house", "casa grande").unwrap();

        assert_eq!(
            entries(&store),
            vec![
                ("big house".to_string(), "casa grande".to_string()),
                ("dog".to_string(), "perro".to_string()),
            ]
        );
    }

    #[test]
    fn test_rename_is_exact() {
        let mut store = store(&[("house", "casa")]);
        assert!(matches!(
            store.rename("House", "home", "hogar"),
            Err(PhraseError::NotFound(_))
        ));
        assert_eq!(store.list()[0].phrase, "house");
    }

    #[test]
    fn test_rename_collision_drops_other_entry() {
        let mut store = store(&[("Home", "hogar"), ("house", "casa")]);
        store.rename("house", "home", "casa").unwrap();

        assert_eq!(
            entries(&store),
            vec![("home".to_string(), "casa".to_string())]
        );
        assert_eq!(store.storage().saved(), store.list());
    }

    #[test]
    fn test_rename_can_change_casing_of_itself() {
        let mut store = store(&[("house", "casa"), ("dog", "perro")]);
        store.rename("house", "House", "casa").unwrap();
        assert_eq!(store.list()[0].phrase, "House");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_exact_and_missing() {
        let mut store = store(&[("house", "casa")]);
        assert!(!store.remove("House").unwrap());
        assert!(store.remove("house").unwrap());
        assert!(store.is_empty());
        assert!(store.storage().saved().is_empty());
    }

    #[test]
    fn test_load_merges_duplicates() {
        let store = store(&[("Casa", "house"), ("dog", "perro"), ("casa", "home")]);
        assert_eq!(
            entries(&store),
            vec![
                ("Casa".to_string(), "home".to_string()),
                ("dog".to_string(), "perro".to_string()),
            ]
        );
    }

    #[test]
    fn test_failed_write_keeps_memory_and_flush_retries() {
        let mut store = store(&[]);
        store.storage().set_fail_writes(true);

        let result = store.upsert("house", "casa");
        assert!(matches!(result, Err(PhraseError::Storage(_))));
        assert!(store.is_dirty());
        assert_eq!(store.len(), 1);
        assert!(store.storage().saved().is_empty());

        store.storage().set_fail_writes(false);
        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.storage().saved(), vec![Phrase::new("house", "casa")]);
    }

    #[test]
    fn test_unreadable_storage_is_never_overwritten() {
        let storage = MemoryPhraseStorage::with_phrases(vec![Phrase::new("house", "casa")]);
        storage.set_fail_reads(true);
        let mut store = PhraseStore::load(storage);
        assert!(store.is_empty());

        assert!(matches!(store.upsert("dog", "perro"), Err(PhraseError::Storage(_))));
        assert!(store.is_dirty());
        assert_eq!(store.storage().saved(), vec![Phrase::new("house", "casa")]);

        store.storage().set_fail_reads(false);
        store.flush().unwrap();
        let expected = vec![Phrase::new("house", "casa"), Phrase::new("dog", "perro")];
        assert_eq!(store.list(), expected.as_slice());
        assert_eq!(store.storage().saved(), expected);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_validate() {
        assert!(validate("house", "casa").is_ok());
        assert!(matches!(validate("  ", "casa"), Err(PhraseError::EmptyPhrase)));
        assert!(matches!(validate("house", ""), Err(PhraseError::EmptyTranslation)));
    }
}
