//! Error types for the observer core
//!
//! Two families matter at runtime:
//! - Component-scoped failures ([`AccessError`], [`QuizBuildError`]) which
//!   collapse into [`MonitorError`] at the monitor boundary
//! - Core bugs ([`SessionError`]) which must surface loudly
//!
//! Configuration problems are reported separately through [`ConfigError`].

use crate::types::ComponentRef;
use std::path::PathBuf;

/// Kind of member an accessor expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
    Method,
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Field => "field",
            Self::Property => "property",
            Self::Method => "method",
        };
        f.write_str(name)
    }
}

/// Accessor construction, read, write, and invocation failures
///
/// Always scoped to one component and one member. Never process-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No member with that name
    #[error("{component}: no member `{member}`")]
    MissingMember { component: ComponentRef, member: String },

    /// Member exists but is a different kind
    #[error("{component}: `{member}` is a {found}, expected a {expected}")]
    KindMismatch {
        component: ComponentRef,
        member: String,
        expected: MemberKind,
        found: MemberKind,
    },

    /// Member exists with a different visibility
    #[error("{component}: `{member}` visibility mismatch")]
    VisibilityMismatch { component: ComponentRef, member: String },

    /// Member type does not match the requested type
    #[error("{component}: `{member}` has type {found}, expected {expected}")]
    TypeMismatch {
        component: ComponentRef,
        member: String,
        expected: &'static str,
        found: &'static str,
    },

    /// More than one member or overload matches
    #[error("{component}: `{member}` is ambiguous ({candidates} overloads match)")]
    AmbiguousOverload {
        component: ComponentRef,
        member: String,
        candidates: usize,
    },

    /// No overload has the requested arity
    #[error("{component}: `{member}` has no overload taking {arity} argument(s)")]
    NoMatchingOverload {
        component: ComponentRef,
        member: String,
        arity: usize,
    },

    /// The target refused a read, or returned a value of the wrong type
    #[error("{component}: `{member}` could not be read: {reason}")]
    Unreadable {
        component: ComponentRef,
        member: String,
        reason: String,
    },

    /// Write attempted on a read-only member
    #[error("{component}: `{member}` is read-only")]
    ReadOnly { component: ComponentRef, member: String },

    /// The target refused a write to a writable member
    #[error("{component}: `{member}` could not be written: {reason}")]
    WriteFailed {
        component: ComponentRef,
        member: String,
        reason: String,
    },

    /// Validator rejected the live value
    #[error("{component}: `{member}` out of domain: expected {expected}, observed {observed}")]
    OutOfDomain {
        component: ComponentRef,
        member: String,
        expected: String,
        observed: String,
    },

    /// The target's method reported a failure
    #[error("{component}: invoking `{member}` failed: {reason}")]
    InvocationFailed {
        component: ComponentRef,
        member: String,
        reason: String,
    },
}

impl AccessError {
    /// Component this error is scoped to
    #[must_use]
    pub fn component(&self) -> &ComponentRef {
        match self {
            Self::MissingMember { component, .. }
            | Self::KindMismatch { component, .. }
            | Self::VisibilityMismatch { component, .. }
            | Self::TypeMismatch { component, .. }
            | Self::AmbiguousOverload { component, .. }
            | Self::NoMatchingOverload { component, .. }
            | Self::Unreadable { component, .. }
            | Self::ReadOnly { component, .. }
            | Self::WriteFailed { component, .. }
            | Self::OutOfDomain { component, .. }
            | Self::InvocationFailed { component, .. } => component,
        }
    }
}

/// A fact that cannot be turned into a quiz item
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizBuildError {
    /// No template registered for the tag
    #[error("unknown question tag `{0}`")]
    UnknownTag(String),

    /// Prompt placeholders and fact arguments disagree
    #[error("tag `{tag}` expects {expected} argument(s), fact supplied {supplied}")]
    ArgumentMismatch {
        tag: String,
        expected: usize,
        supplied: usize,
    },

    /// Fact carries no correct answer
    #[error("tag `{0}`: fact has no correct answer")]
    NoCorrectAnswer(String),

    /// Not enough distinct answers to fill the item
    #[error("tag `{tag}`: only {available} distinct answer(s), need {required}")]
    NotEnoughAnswers {
        tag: String,
        available: usize,
        required: usize,
    },
}

/// Monitor termination reasons that are not success
///
/// Both kinds are handled identically at the monitor boundary: logged,
/// no batch submitted, only this monitor terminates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    /// Expected, component-scoped give-up
    #[error("{component} abandoned: {reason}")]
    Abandon {
        component: ComponentRef,
        reason: String,
    },

    /// Any other fault inside an adapter
    #[error("{component} failed unexpectedly: {message}")]
    Unexpected {
        component: ComponentRef,
        message: String,
    },
}

impl MonitorError {
    /// Create an abandon error
    #[inline]
    pub fn abandon(component: &ComponentRef, reason: impl Into<String>) -> Self {
        Self::Abandon {
            component: component.clone(),
            reason: reason.into(),
        }
    }

    /// Create an unexpected-fault error
    #[inline]
    pub fn unexpected(component: &ComponentRef, message: impl Into<String>) -> Self {
        Self::Unexpected {
            component: component.clone(),
            message: message.into(),
        }
    }

    /// A fact of `component` could not be rendered; treated as a give-up
    #[inline]
    pub fn unbuildable(component: &ComponentRef, err: &QuizBuildError) -> Self {
        Self::abandon(component, err.to_string())
    }

    /// Whether this is the expected give-up kind
    #[inline]
    #[must_use]
    pub fn is_abandon(&self) -> bool {
        matches!(self, Self::Abandon { .. })
    }
}

impl From<AccessError> for MonitorError {
    fn from(err: AccessError) -> Self {
        Self::Abandon {
            component: err.component().clone(),
            reason: err.to_string(),
        }
    }
}

/// Illegal quiz-session transition; always a core bug
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("illegal session transition {from} -> {to}")]
    IllegalTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed values violate a constraint
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComponentId;

    fn scope() -> ComponentRef {
        ComponentRef::new(ComponentId(7), "wires")
    }

    #[test]
    fn access_error_converts_to_abandon() {
        let err = AccessError::OutOfDomain {
            component: scope(),
            member: "cut".to_string(),
            expected: "0..6".to_string(),
            observed: "9".to_string(),
        };
        let monitor: MonitorError = err.into();
        assert!(monitor.is_abandon());
        let text = monitor.to_string();
        assert!(text.contains("wires#7"));
        assert!(text.contains("expected 0..6, observed 9"));
    }

    #[test]
    fn access_error_keeps_scope() {
        let err = AccessError::MissingMember {
            component: scope(),
            member: "serial".to_string(),
        };
        assert_eq!(err.component().id, ComponentId(7));
    }

    #[test]
    fn unexpected_is_not_abandon() {
        assert!(!MonitorError::unexpected(&scope(), "boom").is_abandon());
    }
}
