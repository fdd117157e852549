use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A message, tool definition or request option is malformed, or tool
    /// arguments violate the tool's schema.
    Validation,
    /// An unknown provider or tool name.
    NotFound,
    /// A malformed `provider/model` reference.
    BadRequest,
    /// The backend sent something that could not be framed or decoded
    /// after streaming began.
    Protocol,
    /// The network call failed before streaming began.
    Transport,
    /// The call was cancelled by the caller.
    Cancelled,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation error"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::BadRequest => write!(f, "bad request"),
            ErrorKind::Protocol => write!(f, "protocol error"),
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The error type shared by every provider and by the dispatch layer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    field: Option<String>,
}

impl Error {
    /// Creates a new error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error for the offending field.
    #[inline]
    pub fn validation(
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a `NotFound` error.
    #[inline]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Creates a `BadRequest` error.
    #[inline]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Creates a `Protocol` error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Creates a `Transport` error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Creates a `Cancelled` error carrying the cancellation cause.
    #[inline]
    pub fn cancelled(cause: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, cause)
    }

    /// Nests the offending field under `prefix`, e.g. `content` becomes
    /// `messages[2].content`.
    pub fn within(mut self, prefix: impl Display) -> Self {
        self.field = Some(match self.field.take() {
            Some(field) => format!("{prefix}.{field}"),
            None => prefix.to_string(),
        });
        self
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending field, for validation errors.
    #[inline]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {field}: {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl StdError for Error {}
