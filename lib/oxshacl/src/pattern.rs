//! Hardened regular expressions for `sh:pattern`.
//!
//! Patterns come from shapes graphs that may be attacker controlled. A [`Pattern`] is
//! compiled once, when the shape is built, under [`PatternLimits`]: sources longer than
//! [`PatternLimits::max_source_len`] bytes are rejected, compilation is capped in size and
//! in time, and each match is timed. A rejected pattern is logged and never matches
//! anything, so the owning constraint is skipped instead of aborting the validation.

use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::ShaclParseError;

/// Limits applied when compiling and running `sh:pattern` regular expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternLimits {
    /// Maximal length of the pattern source in bytes.
    pub max_source_len: usize,
    /// Maximal time spent compiling the pattern or running one match.
    pub timeout: Duration,
    /// Maximal size of the compiled program in bytes.
    pub max_compiled_size: usize,
}

impl Default for PatternLimits {
    fn default() -> Self {
        Self {
            max_source_len: 500,
            timeout: Duration::from_millis(100),
            max_compiled_size: 1 << 20,
        }
    }
}

/// Why a pattern has been rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternRejection {
    /// The source is longer than [`PatternLimits::max_source_len`].
    TooLong { len: usize, max: usize },
    /// Compilation took longer than [`PatternLimits::timeout`].
    CompilationTimeout,
    /// The regular expression engine refused the pattern (syntax or size limit).
    Invalid(String),
    /// A match took longer than [`PatternLimits::timeout`].
    MatchTimeout,
}

impl fmt::Display for PatternRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len, max } => {
                write!(f, "pattern is {len} bytes long, the limit is {max}")
            }
            Self::CompilationTimeout => f.write_str("pattern compilation timed out"),
            Self::Invalid(message) => write!(f, "invalid pattern: {message}"),
            Self::MatchTimeout => f.write_str("pattern matching timed out"),
        }
    }
}

/// A `sh:pattern` regular expression with its `sh:flags`.
#[derive(Debug)]
pub struct Pattern {
    source: String,
    flags: Option<String>,
    regex: Result<Regex, PatternRejection>,
    timeout: Duration,
    // Set once a match exceeded the timeout, so the pattern stops being evaluated.
    tripped: AtomicBool,
}

impl Pattern {
    /// Compiles a pattern with the default [`PatternLimits`].
    ///
    /// Unknown flags are a construction error. Patterns that are too long, invalid or too
    /// slow to compile are not: they are logged and the returned pattern never matches.
    pub fn new(source: impl Into<String>, flags: Option<String>) -> Result<Self, ShaclParseError> {
        Self::with_limits(source, flags, PatternLimits::default())
    }

    /// Compiles a pattern with explicit limits.
    pub fn with_limits(
        source: impl Into<String>,
        flags: Option<String>,
        limits: PatternLimits,
    ) -> Result<Self, ShaclParseError> {
        let source = source.into();
        let parsed_flags = match &flags {
            Some(flags) => Flags::parse(flags).ok_or_else(|| ShaclParseError::InvalidRegexFlags {
                pattern: source.clone(),
                flags: flags.clone(),
            })?,
            None => Flags::default(),
        };
        let regex = compile(&source, parsed_flags, limits);
        if let Err(rejection) = &regex {
            tracing::warn!(
                pattern = %source,
                %rejection,
                "sh:pattern rejected, the constraint will be skipped"
            );
        }
        Ok(Self {
            source,
            flags,
            regex,
            timeout: limits.timeout,
            tripped: AtomicBool::new(false),
        })
    }

    /// The pattern source, as written in the shape.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The `sh:flags` value, if any.
    pub fn flags(&self) -> Option<&str> {
        self.flags.as_deref()
    }

    /// Returns the rejection reason if the pattern is unusable.
    pub fn rejection(&self) -> Option<&PatternRejection> {
        self.regex.as_ref().err()
    }

    /// Matches the lexical form of a value.
    ///
    /// Returns `None` if the pattern has been rejected, at compilation or by a previous match
    /// running over the time budget.
    pub fn is_match(&self, text: &str) -> Option<bool> {
        let regex = self.regex.as_ref().ok()?;
        if self.tripped.load(Ordering::Relaxed) {
            return None;
        }
        let start = Instant::now();
        let matched = regex.is_match(text);
        if start.elapsed() > self.timeout {
            if !self.tripped.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    pattern = %self.source,
                    rejection = %PatternRejection::MatchTimeout,
                    "sh:pattern disabled"
                );
            }
            return None;
        }
        Some(matched)
    }
}

impl Clone for Pattern {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            flags: self.flags.clone(),
            regex: self.regex.clone(),
            timeout: self.timeout,
            tripped: AtomicBool::new(self.tripped.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.flags == other.flags
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.flags {
            Some(flags) => write!(f, "/{}/{flags}", self.source),
            None => write!(f, "/{}/", self.source),
        }
    }
}

/// XPath `fn:matches` flags.
#[derive(Debug, Default, Clone, Copy)]
#[expect(clippy::struct_excessive_bools)]
struct Flags {
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
    extended: bool,
    literal: bool,
}

impl Flags {
    fn parse(flags: &str) -> Option<Self> {
        let mut parsed = Self::default();
        for flag in flags.chars() {
            match flag {
                'i' => parsed.case_insensitive = true,
                'm' => parsed.multi_line = true,
                's' => parsed.dot_all = true,
                'x' => parsed.extended = true,
                'q' => parsed.literal = true,
                _ => return None,
            }
        }
        Some(parsed)
    }
}

fn compile(source: &str, flags: Flags, limits: PatternLimits) -> Result<Regex, PatternRejection> {
    if source.len() > limits.max_source_len {
        return Err(PatternRejection::TooLong {
            len: source.len(),
            max: limits.max_source_len,
        });
    }
    let escaped;
    let source = if flags.literal {
        escaped = regex::escape(source);
        escaped.as_str()
    } else {
        source
    };
    let start = Instant::now();
    let regex = RegexBuilder::new(source)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_all)
        .ignore_whitespace(flags.extended && !flags.literal)
        .size_limit(limits.max_compiled_size)
        .dfa_size_limit(limits.max_compiled_size)
        .build()
        .map_err(|e| PatternRejection::Invalid(e.to_string()))?;
    if start.elapsed() > limits.timeout {
        return Err(PatternRejection::CompilationTimeout);
    }
    Ok(regex)
}
