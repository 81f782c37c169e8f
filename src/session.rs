use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Language, MatchingConfig, ReaderConfig};
use crate::modes::{InteractionState, PointerEvent, RunId};
use crate::services::extraction::{ExtractionError, TextExtractor};
use crate::services::library::{LibraryError, SavedText, TextLibrary};
use crate::services::phrases::{self, Phrase, PhraseError, PhraseStore};
use crate::services::storage::{KeyValueStore, PhraseStorage, SqlitePhraseStorage, StorageError};
use crate::services::translation::{TranslationError, Translator};
use crate::text_map::{AnnotatedRun, annotate};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Phrase(#[from] PhraseError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl SessionError {
    /// Every failure leaves the document and the session usable
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Message for the UI layer to show inline
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Phrase(PhraseError::Storage(_)) => {
                "Saved phrases could not be written. Changes are kept for this session.".to_string()
            }
            SessionError::Phrase(PhraseError::EmptyPhrase) => "Enter a phrase.".to_string(),
            SessionError::Phrase(PhraseError::EmptyTranslation) => {
                "Enter a translation.".to_string()
            }
            SessionError::Phrase(e @ PhraseError::NotFound(_)) => e.to_string(),
            SessionError::Extraction(e) => e.user_message().to_string(),
            SessionError::Library(LibraryError::Storage(_)) => {
                "The library could not be written.".to_string()
            }
            SessionError::Library(e) => e.to_string(),
        }
    }
}

/// State of the translation panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TranslationView {
    #[default]
    Empty,
    Pending {
        text: String,
        request: u64,
    },
    Ready {
        text: String,
        translation: String,
    },
    Failed {
        text: String,
        message: String,
    },
}

/// An outstanding translation of the selection, handed to the caller that
/// performs the remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub target: Language,
    id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Applied(String),
    /// Carries the inline error message
    Failed(String),
    /// The request no longer matches what the reader is looking at
    Discarded,
}

/// Everything one reading session owns: the document, the saved phrases,
/// the selection and the highlight interaction state.
#[derive(Debug)]
pub struct ReaderSession<S: PhraseStorage> {
    document: String,
    store: PhraseStore<S>,
    interaction: InteractionState,
    selection: Option<String>,
    translation: TranslationView,
    next_request: u64,
    matching: MatchingConfig,
    target_language: Language,
}

impl ReaderSession<SqlitePhraseStorage> {
    /// Opens the configured database, returning the session and the
    /// saved-document library sharing it
    pub fn open(config: &ReaderConfig) -> Result<(Self, TextLibrary), StorageError> {
        let kv = Rc::new(KeyValueStore::from_config(&config.storage)?);
        let store = PhraseStore::load(SqlitePhraseStorage::new(kv.clone()));
        Ok((Self::new(store, config), TextLibrary::new(kv)))
    }
}

impl<S: PhraseStorage> ReaderSession<S> {
    pub fn new(store: PhraseStore<S>, config: &ReaderConfig) -> Self {
        Self {
            document: String::new(),
            store,
            interaction: InteractionState::new(),
            selection: None,
            translation: TranslationView::Empty,
            next_request: 0,
            matching: config.matching,
            target_language: config.translation.target_language,
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn phrases(&self) -> &[Phrase] {
        self.store.list()
    }

    pub fn store(&self) -> &PhraseStore<S> {
        &self.store
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn translation_view(&self) -> &TranslationView {
        &self.translation
    }

    /// Current partition of the document into plain and highlighted runs
    pub fn runs(&self) -> Vec<AnnotatedRun<'_>> {
        annotate(&self.document, self.store.list(), &self.matching)
    }

    // ---- document ----

    /// Replaces the document wholesale (file load, paste)
    pub fn load_document(&mut self, text: impl Into<String>) {
        self.document = text.into();
        self.selection = None;
        self.interaction.reset();
        self.translation = TranslationView::Empty;
        debug!("loaded document of {} bytes", self.document.len());
    }

    /// Loads an extracted document. On failure the current document stays.
    pub fn load_extracted(
        &mut self,
        extractor: &dyn TextExtractor,
        payload: &[u8],
    ) -> Result<(), SessionError> {
        match extractor.extract(payload) {
            Ok(text) => {
                self.load_document(text);
                Ok(())
            }
            Err(e) => {
                warn!("document rejected: {}", e);
                Err(e.into())
            }
        }
    }

    pub fn load_saved(&mut self, library: &TextLibrary, id: &str) -> Result<(), SessionError> {
        let saved = library.get(id)?;
        info!("opening saved text {:?}", saved.title);
        self.load_document(saved.content);
        Ok(())
    }

    pub fn save_document(
        &self,
        library: &TextLibrary,
        title: &str,
    ) -> Result<SavedText, SessionError> {
        Ok(library.save(title, &self.document)?)
    }

    // ---- selection and translation ----

    /// Records the reader's selection; blank selections clear it
    pub fn select(&mut self, text: &str) {
        let trimmed = text.trim();
        self.selection = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    /// Starts translating the selection, or returns None without one
    pub fn begin_translation(&mut self) -> Option<TranslationRequest> {
        let text = self.selection.clone()?;
        self.next_request += 1;
        let id = self.next_request;
        self.translation = TranslationView::Pending {
            text: text.clone(),
            request: id,
        };

        Some(TranslationRequest {
            text,
            target: self.target_language,
            id,
        })
    }

    /// Applies a resolved translation if its request is still the one the
    /// panel is waiting for
    pub fn complete_translation(
        &mut self,
        request: TranslationRequest,
        result: Result<String, TranslationError>,
    ) -> TranslationOutcome {
        let current = matches!(
            &self.translation,
            TranslationView::Pending { text, request: id }
                if *id == request.id && *text == request.text
        );
        if !current {
            debug!("discarding stale translation of {:?}", request.text);
            return TranslationOutcome::Discarded;
        }

        match result {
            Ok(translation) => {
                self.translation = TranslationView::Ready {
                    text: request.text,
                    translation: translation.clone(),
                };
                TranslationOutcome::Applied(translation)
            }
            Err(e) => {
                warn!("translation of {:?} failed: {}", request.text, e);
                let message = e.user_message().to_string();
                self.translation = TranslationView::Failed {
                    text: request.text,
                    message: message.clone(),
                };
                TranslationOutcome::Failed(message)
            }
        }
    }

    /// Translates the selection synchronously through `translator`
    pub fn translate_selection(
        &mut self,
        translator: &dyn Translator,
    ) -> Option<TranslationOutcome> {
        let request = self.begin_translation()?;
        let result = translator.translate(&request.text, request.target);
        Some(self.complete_translation(request, result))
    }

    /// Saves the translation shown in the panel as a phrase. Returns false
    /// when there is no finished translation.
    pub fn save_translation(&mut self) -> Result<bool, SessionError> {
        let TranslationView::Ready { text, translation } = &self.translation else {
            return Ok(false);
        };
        let (text, translation) = (text.clone(), translation.clone());
        self.save_phrase(&text, &translation)?;
        Ok(true)
    }

    // ---- phrases ----

    pub fn save_phrase(&mut self, phrase: &str, translation: &str) -> Result<(), SessionError> {
        let phrase = phrase.trim();
        phrases::validate(phrase, translation)?;
        let result = self.store.upsert(phrase, translation);
        self.phrases_changed();
        Ok(result?)
    }

    /// Edits a saved phrase; blank input is rejected before the store sees it
    pub fn rename_phrase(
        &mut self,
        old: &str,
        new: &str,
        translation: &str,
    ) -> Result<(), SessionError> {
        let new = new.trim();
        phrases::validate(new, translation)?;
        let result = self.store.rename(old, new, translation);
        if !matches!(result, Err(PhraseError::NotFound(_))) {
            self.phrases_changed();
        }
        Ok(result?)
    }

    pub fn remove_phrase(&mut self, phrase: &str) -> Result<bool, SessionError> {
        let result = self.store.remove(phrase);
        if !matches!(result, Ok(false)) {
            self.phrases_changed();
        }
        Ok(result?)
    }

    /// Retries writing saved phrases after a failure
    pub fn flush(&mut self) -> Result<(), SessionError> {
        Ok(self.store.flush()?)
    }

    fn phrases_changed(&mut self) {
        self.interaction.reset();
        if matches!(self.translation, TranslationView::Pending { .. }) {
            debug!("phrase set changed, cancelling pending translation");
            self.translation = TranslationView::Empty;
        }
    }

    // ---- highlight interaction ----

    fn highlighted_phrase(&self, run: RunId) -> Option<Phrase> {
        self.runs()
            .into_iter()
            .find(|r| r.id == run)
            .and_then(|r| r.phrase.cloned())
    }

    pub fn pointer_enter(&mut self, run: RunId) {
        if let Some(phrase) = self.highlighted_phrase(run) {
            self.interaction
                .pointer_enter(run, !phrase.translation.is_empty());
        }
    }

    pub fn pointer_leave(&mut self, run: RunId) {
        self.interaction.pointer_leave(run);
    }

    pub fn click(&mut self, run: RunId) {
        if self.highlighted_phrase(run).is_some() {
            self.interaction.click(run);
        }
    }

    /// Removes the phrase of the armed run and returns to idle.
    /// Returns the removed phrase, or None when nothing was armed.
    pub fn confirm_remove(&mut self) -> Result<Option<Phrase>, SessionError> {
        let Some(run) = self.interaction.armed() else {
            return Ok(None);
        };
        let phrase = self.highlighted_phrase(run);
        self.interaction.confirm_remove();

        let Some(phrase) = phrase else {
            return Ok(None);
        };
        let result = self.store.remove(&phrase.phrase);
        self.phrases_changed();
        result?;
        Ok(Some(phrase))
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Result<Option<Phrase>, SessionError> {
        match event {
            PointerEvent::Enter(run) => self.pointer_enter(run),
            PointerEvent::Leave(run) => self.pointer_leave(run),
            PointerEvent::Click(run) => self.click(run),
            PointerEvent::ConfirmRemove => return self.confirm_remove(),
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::InteractionPhase;
    use crate::services::extraction::{HtmlExtractor, PlainTextExtractor};
    use crate::services::storage::MemoryPhraseStorage;

    struct FixedTranslator(&'static str);

    impl Translator for FixedTranslator {
        fn translate(&self, _text: &str, _target: Language) -> Result<String, TranslationError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingTranslator;

    impl Translator for FailingTranslator {
        fn translate(&self, _text: &str, _target: Language) -> Result<String, TranslationError> {
            Err(TranslationError::Status(503))
        }
    }

    fn session(phrases: &[(&str, &str)]) -> ReaderSession<MemoryPhraseStorage> {
        let storage = MemoryPhraseStorage::with_phrases(
            phrases.iter().map(|(p, t)| Phrase::new(*p, *t)).collect(),
        );
        ReaderSession::new(PhraseStore::load(storage), &ReaderConfig::default())
    }

    fn highlighted(session: &ReaderSession<MemoryPhraseStorage>) -> Vec<String> {
        session
            .runs()
            .iter()
            .filter(|r| r.is_highlighted())
            .map(|r| r.text.to_string())
            .collect()
    }

    #[test]
    fn test_saved_phrase_is_highlighted() {
        let mut session = session(&[]);
        session.load_document("I see a house and a House");
        session.select("  house ");
        assert_eq!(session.selection(), Some("house"));

        session.save_phrase("house", "casa").unwrap();
        assert_eq!(highlighted(&session), vec!["house", "House"]);
    }

    #[test]
    fn test_translate_and_save_selection() {
        let mut session = session(&[]);
        session.load_document("The house is big");
        session.select("house");

        let outcome = session.translate_selection(&FixedTranslator("casa"));
        assert_eq!(outcome, Some(TranslationOutcome::Applied("casa".to_string())));
        assert!(session.save_translation().unwrap());
        assert_eq!(session.store().translation_of("house"), Some("casa"));
    }

    #[test]
    fn test_translation_failure_is_inline() {
        let mut session = session(&[]);
        session.select("house");

        let outcome = session.translate_selection(&FailingTranslator).unwrap();
        assert!(matches!(outcome, TranslationOutcome::Failed(_)));
        assert!(matches!(
            session.translation_view(),
            TranslationView::Failed { text, .. } if text == "house"
        ));
        assert!(!session.save_translation().unwrap());
    }

    #[test]
    fn test_no_selection_no_request() {
        let mut session = session(&[]);
        session.select("   ");
        assert!(session.begin_translation().is_none());
    }

    #[test]
    fn test_stale_translation_after_document_change() {
        let mut session = session(&[]);
        session.load_document("one text");
        session.select("one");
        let request = session.begin_translation().unwrap();

        session.load_document("another text");
        let outcome = session.complete_translation(request, Ok("uno".to_string()));
        assert_eq!(outcome, TranslationOutcome::Discarded);
        assert_eq!(session.translation_view(), &TranslationView::Empty);
    }

    #[test]
    fn test_superseded_request_is_discarded() {
        let mut session = session(&[]);
        session.select("first");
        let first = session.begin_translation().unwrap();
        session.select("second");
        let second = session.begin_translation().unwrap();

        assert_eq!(
            session.complete_translation(first, Ok("primero".to_string())),
            TranslationOutcome::Discarded
        );
        assert_eq!(
            session.complete_translation(second, Ok("segundo".to_string())),
            TranslationOutcome::Applied("segundo".to_string())
        );
    }

    #[test]
    fn test_phrase_change_cancels_pending_translation() {
        let mut session = session(&[("house", "casa")]);
        session.select("dog");
        let request = session.begin_translation().unwrap();

        session.remove_phrase("house").unwrap();
        assert_eq!(
            session.complete_translation(request, Ok("perro".to_string())),
            TranslationOutcome::Discarded
        );
    }

    #[test]
    fn test_blank_phrase_rejected_without_write() {
        let mut session = session(&[("house", "casa")]);
        let err = session.rename_phrase("house", " ", "casa").unwrap_err();
        assert!(matches!(err, SessionError::Phrase(PhraseError::EmptyPhrase)));
        let err = session.rename_phrase("house", "home", "").unwrap_err();
        assert!(matches!(err, SessionError::Phrase(PhraseError::EmptyTranslation)));
        assert_eq!(err.user_message(), "Enter a translation.");
        assert_eq!(session.phrases(), &[Phrase::new("house", "casa")]);
    }

    #[test]
    fn test_hover_click_confirm_removes_phrase() {
        let mut session = session(&[("house", "casa")]);
        session.load_document("a house, a House");
        let run = RunId(1);

        session.handle_pointer(PointerEvent::Enter(run)).unwrap();
        assert_eq!(session.interaction().phase(), InteractionPhase::TooltipShown(run));
        session.handle_pointer(PointerEvent::Click(run)).unwrap();

        let removed = session.handle_pointer(PointerEvent::ConfirmRemove).unwrap();
        assert_eq!(removed, Some(Phrase::new("house", "casa")));
        assert!(session.interaction().is_idle());
        assert!(highlighted(&session).is_empty());
        assert!(session.store().storage().saved().is_empty());
    }

    #[test]
    fn test_remove_via_differently_cased_occurrence() {
        let mut session = session(&[("house", "casa")]);
        session.load_document("a House");
        let run = RunId(1);
        session.click(run);
        assert_eq!(
            session.confirm_remove().unwrap(),
            Some(Phrase::new("house", "casa"))
        );
        assert!(session.phrases().is_empty());
    }

    #[test]
    fn test_plain_runs_ignore_pointer() {
        let mut session = session(&[("house", "casa")]);
        session.load_document("a house");
        session.pointer_enter(RunId(0));
        session.click(RunId(0));
        assert!(session.interaction().is_idle());
        assert_eq!(session.confirm_remove().unwrap(), None);
    }

    #[test]
    fn test_failed_removal_write_still_resets() {
        let mut session = session(&[("house", "casa")]);
        session.load_document("a house");
        session.click(RunId(1));
        session.store().storage().set_fail_writes(true);

        let err = session.confirm_remove().unwrap_err();
        assert!(err.is_recoverable());
        assert!(session.interaction().is_idle());
        assert!(session.phrases().is_empty());
        assert!(session.store().is_dirty());

        session.store().storage().set_fail_writes(false);
        session.flush().unwrap();
        assert!(session.store().storage().saved().is_empty());
    }

    #[test]
    fn test_failed_extraction_keeps_document() {
        let mut session = session(&[]);
        session.load_document("original");

        let err = session
            .load_extracted(&PlainTextExtractor, &[0xff, 0xfe])
            .unwrap_err();
        assert!(matches!(err, SessionError::Extraction(_)));
        assert_eq!(session.document(), "original");

        session
            .load_extracted(&HtmlExtractor, b"<p>New   text</p>")
            .unwrap();
        assert_eq!(session.document(), "New text");
    }

    #[test]
    fn test_library_round_trip() {
        let library = TextLibrary::new(Rc::new(KeyValueStore::open_in_memory().unwrap()));
        let mut session = session(&[]);
        session.load_document("stored content");
        let saved = session.save_document(&library, "Mine").unwrap();

        session.load_document("something else");
        session.load_saved(&library, &saved.id).unwrap();
        assert_eq!(session.document(), "stored content");

        assert!(matches!(
            session.load_saved(&library, "missing"),
            Err(SessionError::Library(LibraryError::NotFound(_)))
        ));
    }

    #[test]
    fn test_open_with_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ReaderConfig::default();
        config.storage.database_path = Some(dir.path().join("reader.db"));

        {
            let (mut session, _library) = ReaderSession::open(&config).unwrap();
            session.save_phrase("Casa", "house").unwrap();
        }

        let (session, _library) = ReaderSession::open(&config).unwrap();
        assert_eq!(session.phrases(), &[Phrase::new("Casa", "house")]);
    }
}
