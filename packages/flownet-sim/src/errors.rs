//! Error types for flownet-sim
//!
//! One error type for the whole crate, tagged with a domain kind so the
//! RPC gateway can map it onto transport status codes. The cache keeps its
//! own local error type (`features::cache::CacheError`); cache failures are
//! never surfaced to API clients.

use std::fmt;
use thiserror::Error;

/// Domain error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimErrorKind {
    /// Nil/malformed graph, empty user id, bad scenario references
    InvalidArgument,
    /// Simulation id does not exist
    NotFound,
    /// Simulation belongs to another user
    AccessDenied,
    /// Solver collaborator failed
    Solver,
    /// Request-scoped cancellation fired
    Cancelled,
    /// Any unexpected condition
    Internal,
}

impl SimErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimErrorKind::InvalidArgument => "invalid_argument",
            SimErrorKind::NotFound => "not_found",
            SimErrorKind::AccessDenied => "access_denied",
            SimErrorKind::Solver => "solver",
            SimErrorKind::Cancelled => "cancelled",
            SimErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for SimErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Simulation error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct SimError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: SimErrorKind,
    pub message: String,
    /// Transient solver faults (Unavailable, Aborted, DeadlineExceeded)
    /// are retried by the adapter; everything else is surfaced as-is.
    pub transient: bool,
}

impl SimError {
    pub fn new(kind: SimErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            transient: false,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(SimErrorKind::InvalidArgument, message)
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::new(
            SimErrorKind::NotFound,
            format!("Simulation not found: {}", id.into()),
        )
    }

    pub fn access_denied(id: impl Into<String>) -> Self {
        Self::new(
            SimErrorKind::AccessDenied,
            format!("Simulation belongs to another user: {}", id.into()),
        )
    }

    pub fn solver(message: impl Into<String>) -> Self {
        Self::new(SimErrorKind::Solver, message)
    }

    /// Transient solver fault, eligible for linear back-off retry
    pub fn solver_transient(message: impl Into<String>) -> Self {
        let mut err = Self::new(SimErrorKind::Solver, message);
        err.transient = true;
        err
    }

    pub fn cancelled() -> Self {
        Self::new(SimErrorKind::Cancelled, "operation cancelled")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SimErrorKind::Internal, message)
    }

    /// Remap a solver fault to `Internal`, keeping message and source
    ///
    /// Baseline solve failures surface with this kind; only solves whose
    /// failure is dropped inside an aggregate keep `Solver`. Every other
    /// kind passes through unchanged.
    pub fn into_internal(mut self) -> Self {
        if self.kind == SimErrorKind::Solver {
            self.kind = SimErrorKind::Internal;
            self.transient = false;
        }
        self
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

impl From<flownet_storage::StorageError> for SimError {
    fn from(err: flownet_storage::StorageError) -> Self {
        use flownet_storage::ErrorKind as SK;
        let kind = match err.kind {
            SK::NotFound => SimErrorKind::NotFound,
            SK::AccessDenied => SimErrorKind::AccessDenied,
            _ => SimErrorKind::Internal,
        };
        SimError::new(kind, err.message.clone()).with_source(err)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::internal(format!("JSON error: {}", err)).with_source(err)
    }
}

/// Result type alias for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;
