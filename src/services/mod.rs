pub mod extraction;
pub mod library;
pub mod phrases;
pub mod storage;
pub mod translation;

pub use extraction::{
    ExtractionError, HtmlExtractor, PlainTextExtractor, TextExtractor, extract_chapters,
};
pub use library::{LibraryError, SavedText, TextLibrary};
pub use phrases::{Phrase, PhraseError, PhraseStore};
pub use storage::{
    KeyValueStore, MemoryPhraseStorage, PhraseStorage, SqlitePhraseStorage, StorageError,
};
pub use translation::{HttpTranslator, TranslationError, Translator};
