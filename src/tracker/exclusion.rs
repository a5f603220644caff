//! URI exclusion rules.
//!
//! Entries without regex metacharacters are compared literally; anything
//! else is compiled into an anchored pattern. A `*` in an otherwise plain
//! entry is a wildcard. Path entries get one leading `/` and no trailing `/`,
//! and both kinds are checked against the normalized request path and the
//! full URL.

use regex::Regex;

use super::error::ConfigurationError;

const REGEX_META: &[char] = &[
    '.', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '^', '$', '\\',
];

#[derive(Debug, Clone)]
pub enum ExcludeRule {
    Literal(String),
    Pattern(Regex),
}

impl ExcludeRule {
    pub fn parse(entry: &str) -> Result<Self, ConfigurationError> {
        let entry = entry.trim();

        if !entry.contains(REGEX_META) {
            return Ok(ExcludeRule::Literal(normalize_path(entry)));
        }

        let body = entry.trim_start_matches('^').trim_end_matches('$');

        // `*` alone is a wildcard, not a repetition of the previous character
        let body = if body.chars().all(|c| c == '*' || !REGEX_META.contains(&c)) {
            body.split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*")
        } else {
            body.to_string()
        };

        // Path patterns are normalized like literals; full URL patterns are kept
        let body = if body.contains("://") {
            body
        } else {
            normalize_path(&body)
        };

        Regex::new(&format!("^(?:{body})$"))
            .map(ExcludeRule::Pattern)
            .map_err(|source| ConfigurationError::InvalidExcludePattern {
                pattern: entry.to_string(),
                source,
            })
    }

    pub fn matches(&self, path: &str, full_url: &str) -> bool {
        match self {
            ExcludeRule::Literal(literal) => literal == path || literal == full_url,
            ExcludeRule::Pattern(re) => re.is_match(path) || re.is_match(full_url),
        }
    }
}

/// Compiled set of exclusion rules
#[derive(Debug, Clone, Default)]
pub struct ExcludeRules {
    rules: Vec<ExcludeRule>,
}

impl ExcludeRules {
    pub fn compile<S: AsRef<str>>(entries: &[S]) -> Result<Self, ConfigurationError> {
        let rules = entries
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| !e.trim().is_empty())
            .map(ExcludeRule::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    pub fn is_excluded(&self, url: &url::Url) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let path = normalize_path(url.path());
        let full = url.as_str();
        self.rules.iter().any(|rule| rule.matches(&path, full))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Leading slash, no trailing slash (except for the root).
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}
