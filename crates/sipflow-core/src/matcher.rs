//! Compiled regular-expression matchers.
//!
//! The same wrapper backs the per-field view filters and the ingestion-time
//! match expression. Compilation is the only fallible step: a failed
//! `compile` returns a [`CompileError`] and never touches whatever matcher the
//! caller is currently holding.

use regex::{Regex, RegexBuilder};
use thiserror::Error;

/// A filter or match expression that failed to compile.
///
/// # Examples
/// ```
/// use sipflow_core::Matcher;
///
/// let err = Matcher::compile("(unclosed", true).unwrap_err();
/// assert_eq!(err.pattern, "(unclosed");
/// assert!(err.to_string().contains("invalid expression"));
/// ```
#[derive(Debug, Clone, Error)]
#[error("invalid expression '{pattern}': {message}")]
pub struct CompileError {
    /// Expression text as provided by the user.
    pub pattern: String,
    /// Compiler diagnostic.
    pub message: String,
}

/// A compiled expression together with its source text.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: String,
    regex: Regex,
}

impl Matcher {
    /// Compile `pattern`, optionally ignoring case.
    ///
    /// # Examples
    /// ```
    /// use sipflow_core::Matcher;
    ///
    /// let matcher = Matcher::compile("^invite", true)?;
    /// assert!(matcher.is_match("INVITE sip:bob@example.com SIP/2.0"));
    /// # Ok::<(), sipflow_core::CompileError>(())
    /// ```
    pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Self, CompileError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|err| CompileError {
                pattern: pattern.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Ingestion-time accept/reject expression.
///
/// Case sensitivity and inversion are independent flags: an inverted
/// expression accepts exactly the payloads the plain one rejects.
#[derive(Debug, Clone)]
pub struct MatchExpression {
    matcher: Matcher,
    invert: bool,
}

impl MatchExpression {
    pub fn new(pattern: &str, ignore_case: bool, invert: bool) -> Result<Self, CompileError> {
        Ok(Self {
            matcher: Matcher::compile(pattern, ignore_case)?,
            invert,
        })
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    /// Whether a payload passes the expression.
    pub fn accepts(&self, payload: &str) -> bool {
        self.matcher.is_match(payload) != self.invert
    }
}
