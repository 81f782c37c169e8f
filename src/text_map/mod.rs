pub mod highlight;
pub mod ingestion;
pub mod matcher;

pub use highlight::{AnnotatedRun, annotate};
pub use ingestion::normalize;
pub use matcher::{
    AhoCorasickMatcher, MatchEngine, MatchPolicy, Matcher, PhraseMatch, PlainMatcher,
    RegexMatcher, Run, build_matcher, phrase_key,
};
