//! Query segmentation into a search term and include/exclude filter tokens
//!
//! Ranges are byte ranges into the raw query so a renderer can highlight each
//! segment of the prompt.

use std::ops::Range;

/// Options controlling how a raw query is segmented
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Treat `word!` as a negated token in addition to `!word`
    pub negate_by_ending_exclamation: bool,

    /// Use the first whitespace-delimited token as the search term
    pub use_first_query_as_search_term: bool,
}

/// Whether a filter token narrows in or out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Include,
    Exclude,
}

/// One filter token of the query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterToken {
    pub kind: TokenKind,

    /// Token text with any negation marker stripped
    pub word: String,

    /// Range of the raw token (marker included)
    pub range: Range<usize>,
}

/// Result of parsing a raw query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub search_term: Option<String>,
    pub search_term_range: Option<Range<usize>>,
    pub tokens: Vec<FilterToken>,
    raw_tokens: Vec<String>,
}

impl ParsedQuery {
    pub fn include_ranges(&self) -> Vec<Range<usize>> {
        self.ranges_of(TokenKind::Include)
    }

    pub fn exclude_ranges(&self) -> Vec<Range<usize>> {
        self.ranges_of(TokenKind::Exclude)
    }

    fn ranges_of(&self, kind: TokenKind) -> Vec<Range<usize>> {
        self.tokens
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.range.clone())
            .collect()
    }

    /// The filter segment as a space-joined string of raw tokens
    pub fn filter_query(&self) -> String {
        self.raw_tokens.join(" ")
    }

    /// Search term and filter tokens joined back with single spaces
    pub fn rejoin(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(term) = &self.search_term {
            parts.push(term);
        }
        parts.extend(self.raw_tokens.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Classify a single whitespace-free token
///
/// A bare `!` is a literal include token, never a negation marker.
pub fn classify_token(token: &str, negate_by_ending_exclamation: bool) -> (TokenKind, &str) {
    if token.len() > 1 {
        if let Some(rest) = token.strip_prefix('!') {
            return (TokenKind::Exclude, rest);
        }
        if negate_by_ending_exclamation {
            if let Some(rest) = token.strip_suffix('!') {
                return (TokenKind::Exclude, rest);
            }
        }
    }
    (TokenKind::Include, token)
}

/// Split `text` on whitespace, keeping byte ranges
pub(crate) fn tokenize(text: &str) -> Vec<(Range<usize>, &str)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push((s..idx, &text[s..idx]));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        tokens.push((s..text.len(), &text[s..]));
    }

    tokens
}

/// Parse a raw query into its search term and filter tokens
pub fn parse_query(query: &str, options: ParseOptions) -> ParsedQuery {
    let mut tokens = tokenize(query).into_iter();
    let mut parsed = ParsedQuery::default();

    if options.use_first_query_as_search_term {
        if let Some((range, word)) = tokens.next() {
            parsed.search_term = Some(word.to_string());
            parsed.search_term_range = Some(range);
        }
    }

    for (range, raw) in tokens {
        let (kind, word) = classify_token(raw, options.negate_by_ending_exclamation);
        parsed.tokens.push(FilterToken {
            kind,
            word: word.to_string(),
            range,
        });
        parsed.raw_tokens.push(raw.to_string());
    }

    parsed
}
