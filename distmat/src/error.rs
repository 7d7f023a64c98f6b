/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! The common error type shared through the crate.

use std::fmt;
use std::panic::Location;

/// Convenience alias for a `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The runtime origin of an [`Error`].
///
/// Every failure is fatal at the run level; the kind only disambiguates
/// what went wrong for reporting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid run configuration: unknown metric name, inconsistent flags,
    /// missing or pre-existing files.
    Configuration,
    /// Malformed input data: ragged CSV rows, unparseable cells.
    Input,
    /// Query and dataset widths disagree.
    Dimension,
    /// Messaging failure at the distribution layer.
    Transport,
    /// Failed invariant inside a compute kernel.
    Internal,
}

impl ErrorKind {
    /// Return the string representation of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Input => "input",
            Self::Dimension => "dimension",
            Self::Transport => "transport",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fatal run-level error.
///
/// Each error records the `file:line` of its construction site so that
/// debug-mode reporting can point at the origin without carrying a full
/// backtrace.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    location: &'static Location<'static>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Construct a new error of the given kind.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    /// Construct a new error wrapping an underlying cause.
    #[track_caller]
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            location: Location::caller(),
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a [`ErrorKind::Configuration`] error.
    #[track_caller]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Shorthand for a [`ErrorKind::Input`] error.
    #[track_caller]
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Input, message)
    }

    /// Shorthand for a [`ErrorKind::Dimension`] error.
    #[track_caller]
    pub fn dimension(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dimension, message)
    }

    /// Shorthand for a [`ErrorKind::Transport`] error.
    #[track_caller]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Shorthand for an [`ErrorKind::Internal`] error.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The runtime origin of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The `file:line` where the error was constructed.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

// The cause is folded into the display output above, so it is not exposed
// again through `source()`; chain printers would repeat it otherwise.
impl std::error::Error for Error {}

///////////
// Tests //
///////////
