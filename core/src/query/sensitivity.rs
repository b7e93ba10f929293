//! Case-sensitivity policy shared by filter tokens and the search term

use serde::{Deserialize, Serialize};

/// How letter case is treated when compiling a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// Case-insensitive unless the text contains an uppercase letter
    #[default]
    Smartcase,
    Sensitive,
    Insensitive,
}

impl Sensitivity {
    /// Whether a pattern built from `text` should match case-sensitively
    pub fn is_case_sensitive(self, text: &str) -> bool {
        match self {
            Sensitivity::Sensitive => true,
            Sensitivity::Insensitive => false,
            Sensitivity::Smartcase => text.chars().any(char::is_uppercase),
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smartcase" => Ok(Sensitivity::Smartcase),
            "sensitive" => Ok(Sensitivity::Sensitive),
            "insensitive" => Ok(Sensitivity::Insensitive),
            other => Err(format!("unknown case sensitivity: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smartcase() {
        assert!(Sensitivity::Smartcase.is_case_sensitive("Foo"));
        assert!(!Sensitivity::Smartcase.is_case_sensitive("foo"));
        assert!(!Sensitivity::Smartcase.is_case_sensitive("123!"));
    }

    #[test]
    fn test_fixed_policies() {
        assert!(Sensitivity::Sensitive.is_case_sensitive("foo"));
        assert!(!Sensitivity::Insensitive.is_case_sensitive("FOO"));
    }

    #[test]
    fn test_parse() {
        assert_eq!("SmartCase".parse::<Sensitivity>(), Ok(Sensitivity::Smartcase));
        assert!("loud".parse::<Sensitivity>().is_err());
    }
}
