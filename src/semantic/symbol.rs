//! Structured names.

use std::fmt;

use smol_str::SmolStr;

use crate::base::constants::SYMBOL_SEPARATOR;

/// An ordered sequence of name parts.
///
/// Equality, hashing and ordering are structural over the full sequence and
/// case-sensitive. The display form joins the parts with `.`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Symbol {
    parts: Vec<SmolStr>,
}

impl Symbol {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Split dotted reference text into parts. Empty parts are kept so that
    /// malformed text stays detectable with [`is_well_formed`](Self::is_well_formed).
    pub fn from_dotted(text: &str) -> Self {
        Self::new(text.split(SYMBOL_SEPARATOR))
    }

    pub fn parts(&self) -> &[SmolStr] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.parts.first().map(SmolStr::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(SmolStr::as_str)
    }

    /// This symbol with one more part.
    pub fn child(&self, part: impl Into<SmolStr>) -> Symbol {
        let mut parts = self.parts.clone();
        parts.push(part.into());
        Symbol { parts }
    }

    /// This symbol followed by all parts of `tail`.
    pub fn join(&self, tail: &Symbol) -> Symbol {
        let mut parts = self.parts.clone();
        parts.extend(tail.parts.iter().cloned());
        Symbol { parts }
    }

    /// Replace the first part by all parts of `prefix`.
    pub fn with_first_replaced(&self, prefix: &Symbol) -> Symbol {
        let mut parts = prefix.parts.clone();
        parts.extend(self.parts.iter().skip(1).cloned());
        Symbol { parts }
    }

    pub fn starts_with(&self, prefix: &Symbol) -> bool {
        self.parts.starts_with(&prefix.parts)
    }

    /// Non-empty, and every part is an identifier.
    pub fn is_well_formed(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(|part| is_identifier(part))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{SYMBOL_SEPARATOR}")?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

/// Identifier check used for symbol parts.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first == '_' || unicode_ident::is_xid_start(first) => {
            chars.all(unicode_ident::is_xid_continue)
        }
        _ => false,
    }
}
