//! Error types for the strata runtime
//!
//! Domain errors use thiserror. Every resolution-time error carries the
//! offending value plus the descriptor's human text and line count so the
//! bootstrap driver can report where a plan went wrong.

use thiserror::Error;

use super::hierarchy::ActId;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Binding a descriptor to its behavior failed
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Structural clone of an already bound definition
    #[error("Clone error: {0}")]
    Clone(#[from] CloneError),

    /// Malformed initializer supplied to a behavior
    #[error("Initializer error: {0}")]
    Init(#[from] InitError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type using RuntimeError
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Diagnostic context attached to resolution errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    /// Human-readable source text of the descriptor
    pub human: String,
    /// Source line count of the descriptor
    pub count: usize,
    /// Descriptor the error was raised for
    pub act: Option<ActId>,
}

impl Diagnostic {
    /// Create a diagnostic for a descriptor
    pub fn new(human: impl Into<String>, count: usize, act: Option<ActId>) -> Self {
        Self {
            human: human.into(),
            count,
            act,
        }
    }

    /// Build a resolve error at this location
    pub fn resolve(&self, kind: ResolveErrorKind, value: impl ToString) -> ResolveError {
        ResolveError {
            kind,
            value: value.to_string(),
            human: self.human.clone(),
            count: self.count,
            act: self.act,
        }
    }

    /// Build a clone error at this location
    pub fn clone_error(&self, kind: CloneErrorKind, value: impl ToString) -> CloneError {
        CloneError {
            kind,
            value: value.to_string(),
            human: self.human.clone(),
            count: self.count,
            act: self.act,
        }
    }

    /// Build an initializer error at this location
    pub fn init(&self, kind: InitErrorKind, value: impl ToString) -> InitError {
        InitError {
            kind,
            value: value.to_string(),
            human: self.human.clone(),
            count: self.count,
            act: self.act,
        }
    }
}

/// Reason a descriptor could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveErrorKind {
    /// Frame reference does not name a frame of the owning framer
    #[error("missing frame")]
    MissingFrame,

    /// Framer reference does not name a known framer
    #[error("missing framer")]
    MissingFramer,

    /// Relative path uses `.main` but the framer has no main frame
    #[error("missing main framer context")]
    MissingMain,

    /// Relative path uses `actor.me` before the actor is named
    #[error("unresolved actor context")]
    UnresolvedActor,

    /// Registrar has no behavior under this name
    #[error("unknown behavior")]
    UnknownBehavior,

    /// I/O-initializer key collides with a parameter or field
    #[error("name collision")]
    Collision,

    /// Transition target is invalid
    #[error("invalid transition target")]
    InvalidTarget,

    /// Clone schedule kind is not supported
    #[error("invalid clone schedule")]
    InvalidSchedule,

    /// Framer exists but has the wrong role for this use
    #[error("invalid framer role")]
    InvalidRole,

    /// Spawn target lies inside the spawning frame's outline
    #[error("self-recursive spawn target")]
    SelfRecursion,

    /// Source and destination field lists differ in length
    #[error("unequal field counts")]
    FieldCount,

    /// Path text could not be parsed
    #[error("invalid path")]
    InvalidPath,
}

/// Fatal error raised while resolving a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{value}' in '{human}' on line {count}")]
pub struct ResolveError {
    /// What went wrong
    pub kind: ResolveErrorKind,
    /// Offending value
    pub value: String,
    /// Descriptor source text
    pub human: String,
    /// Descriptor line count
    pub count: usize,
    /// Descriptor location
    pub act: Option<ActId>,
}

/// What a clone attempt tripped over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CloneErrorKind {
    /// Frame link already resolved
    #[error("frame link already resolved")]
    FrameLink,

    /// Sub-descriptor already resolved
    #[error("sub-descriptor already resolved")]
    SubAct,

    /// Behavior already instantiated
    #[error("behavior already instantiated")]
    Behavior,
}

/// Attempted clone of a definition that has already been bound
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot clone, {kind}: '{value}' in '{human}' on line {count}")]
pub struct CloneError {
    /// What was already bound
    pub kind: CloneErrorKind,
    /// Offending value
    pub value: String,
    /// Descriptor source text
    pub human: String,
    /// Descriptor line count
    pub count: usize,
    /// Descriptor location
    pub act: Option<ActId>,
}

/// Malformed initializer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InitErrorKind {
    /// I/O-initializer entry is neither a path string nor a mapping
    #[error("malformed io initializer")]
    MalformedIoInit,

    /// Initializer key the behavior does not handle
    #[error("unhandled initializer key")]
    UnhandledKey,

    /// Initializer value has the wrong type
    #[error("invalid initializer value")]
    InvalidValue,
}

/// Malformed initializer supplied to a behavior
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{value}' in '{human}' on line {count}")]
pub struct InitError {
    /// What was malformed
    pub kind: InitErrorKind,
    /// Offending value
    pub value: String,
    /// Descriptor source text
    pub human: String,
    /// Descriptor line count
    pub count: usize,
    /// Descriptor location
    pub act: Option<ActId>,
}
