//! Reader annotation engine: saved phrases with translations, re-highlighted
//! wherever they recur in the current document.

pub mod config;
pub mod logging;
pub mod modes;
pub mod services;
pub mod session;
pub mod text_map;

pub use config::{Language, ReaderConfig};
pub use modes::{InteractionPhase, InteractionState, PointerEvent, RunId};
pub use services::phrases::{Phrase, PhraseError, PhraseStore};
pub use session::{ReaderSession, SessionError, TranslationOutcome, TranslationView};
pub use text_map::{AnnotatedRun, MatchEngine, MatchPolicy, Matcher, Run};
