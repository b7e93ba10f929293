//! Search toggles and the compiled search pattern derived from them

use super::sensitivity::Sensitivity;
use regex::{Regex, RegexBuilder};

/// The three user-toggleable search options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchToggle {
    UseRegex,
    WholeWord,
    IgnoreCase,
}

/// Toggle state plus the derived search regex
///
/// Toggling an option marks it as manually changed so later automatic
/// adjustments in [`SearchOptions::set_search_term`] leave it alone.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    search_term: String,
    use_regex: bool,
    whole_word: bool,
    ignore_case: bool,

    use_regex_changed_manually: bool,
    whole_word_changed_manually: bool,
    ignore_case_changed_manually: bool,

    /// Whole-word value to fall back to when the term allows it again
    initial_whole_word: bool,
    sensitivity: Sensitivity,

    search_regex: Option<Regex>,
}

impl SearchOptions {
    pub fn new(use_regex: bool, whole_word: bool, sensitivity: Sensitivity) -> Self {
        Self {
            search_term: String::new(),
            use_regex,
            whole_word,
            ignore_case: !sensitivity.is_case_sensitive(""),
            use_regex_changed_manually: false,
            whole_word_changed_manually: false,
            ignore_case_changed_manually: false,
            initial_whole_word: whole_word,
            sensitivity,
            search_regex: None,
        }
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn use_regex(&self) -> bool {
        self.use_regex
    }

    pub fn whole_word(&self) -> bool {
        self.whole_word
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn is_changed_manually(&self, toggle: SearchToggle) -> bool {
        match toggle {
            SearchToggle::UseRegex => self.use_regex_changed_manually,
            SearchToggle::WholeWord => self.whole_word_changed_manually,
            SearchToggle::IgnoreCase => self.ignore_case_changed_manually,
        }
    }

    /// Compiled pattern; `None` for an empty term or an invalid regex
    pub fn search_regex(&self) -> Option<&Regex> {
        self.search_regex.as_ref()
    }

    /// Flip one option and recompile; returns the new value
    pub fn toggle(&mut self, toggle: SearchToggle) -> bool {
        let value = match toggle {
            SearchToggle::UseRegex => {
                self.use_regex = !self.use_regex;
                self.use_regex_changed_manually = true;
                self.use_regex
            }
            SearchToggle::WholeWord => {
                self.whole_word = !self.whole_word;
                self.whole_word_changed_manually = true;
                self.whole_word
            }
            SearchToggle::IgnoreCase => {
                self.ignore_case = !self.ignore_case;
                self.ignore_case_changed_manually = true;
                self.ignore_case
            }
        };
        self.recompile();
        value
    }

    pub fn set_search_term<S: Into<String>>(&mut self, term: S) {
        self.search_term = term.into();

        if !self.whole_word_changed_manually {
            // `\b!!!\b` would never match anything
            self.whole_word = self.initial_whole_word
                && (self.search_term.is_empty() || has_word_char(&self.search_term));
        }

        if !self.ignore_case_changed_manually {
            self.ignore_case = !self.sensitivity.is_case_sensitive(&self.search_term);
        }

        self.recompile();
    }

    fn recompile(&mut self) {
        self.search_regex = build_search_regex(
            &self.search_term,
            self.whole_word,
            self.ignore_case,
            self.use_regex,
        );
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn has_word_char(text: &str) -> bool {
    text.chars().any(is_word_char)
}

/// Build the search regex; never fails, returns `None` instead
pub fn build_search_regex(
    term: &str,
    whole_word: bool,
    ignore_case: bool,
    use_regex: bool,
) -> Option<Regex> {
    if term.is_empty() {
        return None;
    }

    let mut source = if use_regex {
        term.to_string()
    } else {
        regex::escape(term)
    };

    if whole_word {
        let starts_with_word = term.chars().next().is_some_and(is_word_char);
        let ends_with_word = term.chars().last().is_some_and(is_word_char);

        if !starts_with_word && !ends_with_word {
            source = format!(r"\b{}\b", source);
        } else {
            if starts_with_word {
                source = format!(r"\b{}", source);
            }
            if ends_with_word {
                source = format!(r"{}\b", source);
            }
        }
    }

    match RegexBuilder::new(&source)
        .case_insensitive(ignore_case)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::debug!("Search pattern {:?} does not compile: {}", source, e);
            None
        }
    }
}
