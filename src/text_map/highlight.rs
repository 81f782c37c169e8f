use crate::config::MatchingConfig;
use crate::modes::RunId;
use crate::services::phrases::Phrase;
use crate::text_map::matcher::build_matcher;

/// A run of document text with the saved phrase it matched, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotatedRun<'a> {
    pub id: RunId,
    pub text: &'a str,
    /// Byte offset in the document
    pub start: usize,
    pub phrase: Option<&'a Phrase>,
}

impl<'a> AnnotatedRun<'a> {
    pub fn is_highlighted(&self) -> bool {
        self.phrase.is_some()
    }

    /// Tooltip text for a highlighted run
    pub fn translation(&self) -> Option<&'a str> {
        self.phrase
            .map(|p| p.translation.as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Partitions `text` against the saved phrases, in store order.
///
/// Runs are recomputed on every call; ids are positions in the returned
/// sequence and only stay meaningful until the text or phrases change.
pub fn annotate<'a>(
    text: &'a str,
    phrases: &'a [Phrase],
    config: &MatchingConfig,
) -> Vec<AnnotatedRun<'a>> {
    if text.is_empty() || phrases.is_empty() {
        return vec![AnnotatedRun {
            id: RunId(0),
            text,
            start: 0,
            phrase: None,
        }];
    }

    let keys: Vec<&str> = phrases.iter().map(|p| p.phrase.as_str()).collect();
    let matcher = build_matcher(&keys, config.engine, config.policy);

    matcher
        .runs(text)
        .into_iter()
        .enumerate()
        .map(|(i, run)| AnnotatedRun {
            id: RunId(i),
            text: run.text,
            start: run.start,
            phrase: run.phrase.map(|idx| &phrases[idx]),
        })
        .collect()
}
