//! Compiled include/exclude matchers for narrowing an item list

use super::parser::{classify_token, tokenize, TokenKind};
use super::sensitivity::Sensitivity;
use crate::item::Item;
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;

/// Options for compiling a filter query
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterOptions {
    pub negate_by_ending_exclamation: bool,
    pub sensitivity: Sensitivity,
}

/// One compiled filter token
#[derive(Debug, Clone)]
pub struct Matcher {
    pub regex: Regex,
    pub case_sensitive: bool,
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Compiled predicate set: exclude matchers run before include matchers
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    include: Vec<Matcher>,
    exclude: Vec<Matcher>,
}

impl FilterSpec {
    /// Compile a space-separated filter query
    pub fn new(query: &str, options: FilterOptions) -> Self {
        let mut spec = Self::default();

        for (_, raw) in tokenize(query) {
            let (kind, word) = classify_token(raw, options.negate_by_ending_exclamation);
            let case_sensitive = options.sensitivity.is_case_sensitive(word);
            let pattern = pattern_for_word(word);

            match RegexBuilder::new(&pattern)
                .case_insensitive(!case_sensitive)
                .build()
            {
                Ok(regex) => {
                    let matcher = Matcher {
                        regex,
                        case_sensitive,
                    };
                    match kind {
                        TokenKind::Include => spec.include.push(matcher),
                        TokenKind::Exclude => spec.exclude.push(matcher),
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping filter token {:?}: {}", word, e);
                }
            }
        }

        spec
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn include_matchers(&self) -> &[Matcher] {
        &self.include
    }

    pub fn exclude_matchers(&self) -> &[Matcher] {
        &self.exclude
    }

    /// True iff `text` matches no exclude matcher and every include matcher
    pub fn matches(&self, text: &str) -> bool {
        !self.exclude.iter().any(|m| m.is_match(text))
            && self.include.iter().all(|m| m.is_match(text))
    }

    /// Filter `items` by the field selected with `key`; skip rows always pass
    pub fn filter_items<F>(&self, items: &[Item], key: F) -> Vec<Item>
    where
        F: Fn(&Item) -> Cow<'_, str>,
    {
        if self.is_empty() {
            return items.to_vec();
        }

        items
            .iter()
            .filter(|item| item.skip || self.matches(&key(item)))
            .cloned()
            .collect()
    }
}

/// Regex source for one filter word
pub fn pattern_for_word(word: &str) -> String {
    let splits_into_alternation =
        word.contains('|') && !word.starts_with('|') && !word.ends_with('|');

    if splits_into_alternation {
        return word
            .split('|')
            .filter(|branch| !branch.is_empty())
            .map(pattern_for_branch)
            .collect::<Vec<_>>()
            .join("|");
    }

    pattern_for_branch(word)
}

fn pattern_for_branch(word: &str) -> String {
    // `**` alone must not turn into a match-everything pattern
    if word.chars().count() > 1 && word.chars().all(|c| c == '*') {
        return regex::escape(word);
    }

    let (word, leading_boundary) = match word.strip_prefix('>') {
        Some(rest) if !rest.is_empty() => (rest, true),
        _ => (word, false),
    };
    let (word, trailing_boundary) = match word.strip_suffix('<') {
        Some(rest) if !rest.is_empty() => (rest, true),
        _ => (word, false),
    };

    let mut pattern = String::new();
    if leading_boundary {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&expand_wildcard(word));
    if trailing_boundary {
        pattern.push_str(r"\b");
    }
    pattern
}

fn expand_wildcard(word: &str) -> String {
    let mut pattern = String::with_capacity(word.len() * 2);
    let mut chars = word.chars().peekable();
    let mut buf = [0u8; 4];

    while let Some(ch) = chars.next() {
        if ch == '*' {
            if chars.peek() == Some(&'*') {
                chars.next();
                pattern.push_str(r"\*");
            } else {
                pattern.push_str(".*");
            }
        } else {
            pattern.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
        }
    }

    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Point;

    fn spec(query: &str) -> FilterSpec {
        FilterSpec::new(query, FilterOptions::default())
    }

    fn items(texts: &[&str]) -> Vec<Item> {
        texts
            .iter()
            .enumerate()
            .map(|(row, text)| Item::new(*text, Point::new(row as u32, 0)))
            .collect()
    }

    fn texts(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.text.as_str()).collect()
    }

    fn by_text(item: &Item) -> Cow<'_, str> {
        Cow::Borrowed(item.text.as_str())
    }

    #[test]
    fn test_wildcard_expansion() {
        let s = spec("foo*bar");
        assert!(s.matches("foobazbar"));
        assert!(s.matches("foobar"));
        assert!(!s.matches("fobar"));
    }

    #[test]
    fn test_double_star_is_literal() {
        let s = spec("a**b");
        assert!(s.matches("a*b"));
        assert!(!s.matches("ab"));
        assert!(!s.matches("axb"));
    }

    #[test]
    fn test_star_only_token_is_not_expanded() {
        let s = spec("***");
        assert!(s.matches("x *** y"));
        assert!(!s.matches("plain"));
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        let s = spec("a.c");
        assert!(s.matches("a.c"));
        assert!(!s.matches("abc"));
        assert!(spec("(x)").matches("f(x)"));
    }

    #[test]
    fn test_partial_word_boundaries() {
        let leading = spec(">foo");
        assert!(leading.matches("foobar"));
        assert!(!leading.matches("barfoo"));

        let trailing = spec("foo<");
        assert!(trailing.matches("barfoo"));
        assert!(!trailing.matches("foobar"));

        assert!(spec(">").matches("a > b"));
    }

    #[test]
    fn test_alternation() {
        let s = spec("apple|lemon");
        assert!(s.matches("green apple"));
        assert!(s.matches("lemon tea"));
        assert!(!s.matches("grape"));

        let literal_pipe = spec("|x");
        assert!(literal_pipe.matches("a |x"));
        assert!(!literal_pipe.matches("x"));
    }

    #[test]
    fn test_smartcase_per_token() {
        let s = spec("Foo");
        assert!(s.matches("Foo"));
        assert!(!s.matches("foo"));

        let s = spec("foo");
        assert!(s.matches("FOO"));
    }

    #[test]
    fn test_fixed_sensitivity() {
        let options = FilterOptions {
            negate_by_ending_exclamation: false,
            sensitivity: Sensitivity::Sensitive,
        };
        assert!(!FilterSpec::new("foo", options).matches("FOO"));

        let options = FilterOptions {
            negate_by_ending_exclamation: false,
            sensitivity: Sensitivity::Insensitive,
        };
        assert!(FilterSpec::new("Foo", options).matches("fOO"));
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let s = spec("apple !apple");
        assert!(!s.matches("apple"));
        let filtered = s.filter_items(&items(&["apple", "grape"]), by_text);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_ending_exclamation_negation() {
        let options = FilterOptions {
            negate_by_ending_exclamation: true,
            sensitivity: Sensitivity::Smartcase,
        };
        let s = FilterSpec::new("grape!", options);
        let filtered = s.filter_items(&items(&["apple", "grape"]), by_text);
        assert_eq!(texts(&filtered), vec!["apple"]);
    }

    #[test]
    fn test_filter_items_keeps_headers() {
        let mut list = items(&["apple", "grape", "lemmon"]);
        list.insert(0, Item::file_header("## fruits", "fruits.txt".into()));
        let filtered = spec("l").filter_items(&list, by_text);
        assert_eq!(texts(&filtered), vec!["## fruits", "apple", "lemmon"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let list = items(&["alpha", "beta", "gamma", "delta", "epsilon"]);
        for query in ["a", "!a", "e*a", "ta|ma", ">al", "l !p"] {
            let s = spec(query);
            let once = s.filter_items(&list, by_text);
            let twice = s.filter_items(&once, by_text);
            assert_eq!(once, twice, "query: {}", query);
        }
    }

    #[test]
    fn test_filter_does_not_mutate_input() {
        let list = items(&["apple", "grape"]);
        let before = list.clone();
        let _ = spec("apple").filter_items(&list, by_text);
        assert_eq!(list, before);
    }
}
