use aho_corasick::{AhoCorasick, MatchKind};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use tracing::warn;

/// Which phrase wins when several match at the same leftmost position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// The phrase listed first wins (alternation order = phrase list order)
    #[default]
    LeftmostFirst,
    /// The longest phrase wins; ties fall back to list order
    LeftmostLongest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchEngine {
    /// Full Unicode case folding
    #[default]
    Regex,
    /// ASCII-only case folding, scales to large phrase sets
    AhoCorasick,
}

/// A single phrase occurrence in a text block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseMatch {
    pub start: usize,
    pub end: usize,
    /// Index into the phrase list the matcher was built from
    pub phrase: usize,
}

/// A contiguous segment of the input text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run<'t> {
    pub text: &'t str,
    /// Byte offset of the run in the input text
    pub start: usize,
    /// Index into the matcher's phrase list when highlighted
    pub phrase: Option<usize>,
}

impl Run<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    pub fn is_highlighted(&self) -> bool {
        self.phrase.is_some()
    }
}

/// Finds phrase occurrences in text. Implementations are pure and never fail
/// once built.
pub trait Matcher {
    /// Non-overlapping matches in ascending position order
    fn find_matches(&self, text: &str) -> Vec<PhraseMatch>;

    /// Partitions `text` into alternating plain and highlighted runs whose
    /// concatenation is `text` verbatim.
    fn runs<'t>(&self, text: &'t str) -> Vec<Run<'t>> {
        if text.is_empty() {
            return vec![Run {
                text,
                start: 0,
                phrase: None,
            }];
        }
        partition(text, &self.find_matches(text))
    }
}

/// Case-folded identity used for case-insensitive phrase comparison.
///
/// Agrees with the regex engine's simple case folding, so two phrases share
/// a key exactly when either one matches the other.
pub fn phrase_key(phrase: &str) -> String {
    phrase
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_lowercase)
        .collect()
}

/// Maps lowercase variants that fold together onto one representative
fn fold_lowercase(c: char) -> char {
    match c {
        'ς' => 'σ',
        'ſ' => 's',
        'µ' => 'μ',
        'ϐ' => 'β',
        'ϑ' => 'θ',
        'ϕ' => 'φ',
        'ϖ' => 'π',
        'ϰ' => 'κ',
        'ϱ' => 'ρ',
        'ϵ' => 'ε',
        'ẛ' => 'ṡ',
        '\u{345}' | '\u{1fbe}' => 'ι',
        _ => c,
    }
}

/// Phrases in pattern order, deduplicated by key, empty phrases removed
fn pattern_entries<S: AsRef<str>>(phrases: &[S], policy: MatchPolicy) -> Vec<(usize, &str)> {
    let mut seen = HashSet::new();
    let mut entries: Vec<(usize, &str)> = phrases
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.as_ref()))
        .filter(|(_, p)| !p.is_empty() && seen.insert(phrase_key(p)))
        .collect();

    if policy == MatchPolicy::LeftmostLongest {
        // Stable, so equal lengths keep list order
        entries.sort_by(|a, b| b.1.chars().count().cmp(&a.1.chars().count()));
    }
    entries
}

fn partition<'t>(text: &'t str, matches: &[PhraseMatch]) -> Vec<Run<'t>> {
    let mut runs = Vec::with_capacity(matches.len() * 2 + 1);
    let mut cursor = 0;

    for m in matches {
        if m.start > cursor {
            runs.push(Run {
                text: &text[cursor..m.start],
                start: cursor,
                phrase: None,
            });
        }
        runs.push(Run {
            text: &text[m.start..m.end],
            start: m.start,
            phrase: Some(m.phrase),
        });
        cursor = m.end;
    }

    if cursor < text.len() || runs.is_empty() {
        runs.push(Run {
            text: &text[cursor..],
            start: cursor,
            phrase: None,
        });
    }
    runs
}

/// Case-insensitive alternation of literal-escaped phrases, one capture
/// group per phrase.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    /// None when there is nothing to match
    regex: Option<Regex>,
    /// Capture group `i + 1` belongs to phrase `groups[i]`
    groups: Vec<usize>,
}

impl RegexMatcher {
    pub fn new<S: AsRef<str>>(phrases: &[S], policy: MatchPolicy) -> Result<Self, regex::Error> {
        let entries = pattern_entries(phrases, policy);
        let alternation = entries
            .iter()
            .map(|(_, p)| format!("({})", regex::escape(p)))
            .collect::<Vec<_>>()
            .join("|");
        // An empty alternation would match the empty string everywhere
        let regex = if alternation.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&alternation)
                    .case_insensitive(true)
                    .size_limit(64 * (1 << 20))
                    .build()?,
            )
        };

        Ok(Self {
            regex,
            groups: entries.into_iter().map(|(i, _)| i).collect(),
        })
    }
}

impl Matcher for RegexMatcher {
    fn find_matches(&self, text: &str) -> Vec<PhraseMatch> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let group = (1..caps.len()).find(|&g| caps.get(g).is_some())?;
                Some(PhraseMatch {
                    start: whole.start(),
                    end: whole.end(),
                    phrase: self.groups[group - 1],
                })
            })
            .collect()
    }
}

/// Multi-pattern automaton matcher. Case folding is ASCII-only.
#[derive(Debug, Clone)]
pub struct AhoCorasickMatcher {
    automaton: AhoCorasick,
    patterns: Vec<usize>,
}

impl AhoCorasickMatcher {
    pub fn new<S: AsRef<str>>(
        phrases: &[S],
        policy: MatchPolicy,
    ) -> Result<Self, aho_corasick::BuildError> {
        let entries = pattern_entries(phrases, policy);
        let match_kind = match policy {
            MatchPolicy::LeftmostFirst => MatchKind::LeftmostFirst,
            MatchPolicy::LeftmostLongest => MatchKind::LeftmostLongest,
        };

        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(match_kind)
            .build(entries.iter().map(|(_, p)| *p))?;

        Ok(Self {
            automaton,
            patterns: entries.into_iter().map(|(i, _)| i).collect(),
        })
    }
}

impl Matcher for AhoCorasickMatcher {
    fn find_matches(&self, text: &str) -> Vec<PhraseMatch> {
        self.automaton
            .find_iter(text)
            .map(|m| PhraseMatch {
                start: m.start(),
                end: m.end(),
                phrase: self.patterns[m.pattern().as_usize()],
            })
            .collect()
    }
}

/// Used when no engine could be built: everything stays plain.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMatcher;

impl Matcher for PlainMatcher {
    fn find_matches(&self, _text: &str) -> Vec<PhraseMatch> {
        Vec::new()
    }
}

/// Builds the requested engine, falling back to the other engine and then
/// to [`PlainMatcher`] if a pattern cannot be compiled.
pub fn build_matcher<S: AsRef<str>>(
    phrases: &[S],
    engine: MatchEngine,
    policy: MatchPolicy,
) -> Box<dyn Matcher> {
    let with_regex = || match RegexMatcher::new(phrases, policy) {
        Ok(m) => Some(Box::new(m) as Box<dyn Matcher>),
        Err(e) => {
            warn!("regex phrase matcher unavailable: {}", e);
            None
        }
    };
    let with_automaton = || match AhoCorasickMatcher::new(phrases, policy) {
        Ok(m) => Some(Box::new(m) as Box<dyn Matcher>),
        Err(e) => {
            warn!("aho-corasick phrase matcher unavailable: {}", e);
            None
        }
    };

    let built = match engine {
        MatchEngine::Regex => with_regex().or_else(with_automaton),
        MatchEngine::AhoCorasick => with_automaton().or_else(with_regex),
    };
    built.unwrap_or_else(|| Box::new(PlainMatcher))
}
