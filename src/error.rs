// src/error.rs
//! Error handling for the parameter buffer crate.
//!
//! - Enum discriminant, cheap to match; allocations only on error paths.
//! - Context chaining, custom messages, `is_*` helpers, `Result` alias.
//!
//! Out-of-bounds raw buffer access is not represented here: it is a broken
//! invariant and panics.

use thiserror::Error;

/// Main error type. Send + Sync + 'static.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A logically indexed call was made on a parameter object that was built
    /// without the matching logical → physical layout.
    #[error("this is not a low-level parameter object (no {buffer} logical index table)")]
    NotLowLevel { buffer: &'static str },

    /// A named-constant API was used on a parameter object with no registry.
    #[error("named constants have not been initialised for this parameter object")]
    NoNamedConstants,

    /// The registry has no entry with this exact name.
    #[error("parameter called {name} does not exist")]
    UnknownParameter { name: String },

    /// Simple custom message.
    #[error("{0}")]
    Custom(String),

    /// Context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    #[inline]
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        Self::Custom(msg.into())
    }

    #[inline]
    pub fn unknown_parameter<S: Into<String>>(name: S) -> Self {
        Self::UnknownParameter { name: name.into() }
    }

    /// Add context to any error (chainable).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// Strips any context layers and returns the innermost error.
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    #[inline]
    pub fn is_unknown_parameter(&self) -> bool {
        matches!(self.root(), Error::UnknownParameter { .. })
    }

    #[inline]
    pub fn is_not_low_level(&self) -> bool {
        matches!(self.root(), Error::NotLowLevel { .. })
    }

    #[inline]
    pub fn is_no_named_constants(&self) -> bool {
        matches!(self.root(), Error::NoNamedConstants)
    }

    #[inline]
    pub fn is_custom(&self) -> bool {
        matches!(self.root(), Error::Custom(_))
    }
}

/// Convenient `Result` alias, `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, Error>;
