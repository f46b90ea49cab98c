//! # Error types used by the subvisor runtime.
//!
//! All fallible operations in the crate surface [`RuntimeError`]. The
//! taxonomy is intentionally small: most lifecycle faults are absorbed by
//! the state machine itself (a trigger on a destroyed subsystem is dropped
//! by its closed bus, a repeated destroy is a no-op) and never reach a
//! `Result`.
//!
//! [`RuntimeError::as_label`] returns a short stable label for logs and
//! metrics.

use thiserror::Error;

use crate::core::Tag;

/// Errors produced by the subvisor runtime.
///
/// These represent failures of registration and graph construction. Event
/// delivery never fails: pushes onto a terminated bus are silently dropped.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Registering a subsystem would exceed the registry capacity.
    #[error("registry is full: capacity of {max} subsystems reached")]
    RegistryFull {
        /// The configured maximum subsystem count.
        max: u32,
    },

    /// Registry lookup missed: the tag was never registered, or the last
    /// handle to the subsystem has been dropped.
    #[error("subsystem {tag} not found in registry")]
    NotFound {
        /// The tag that missed.
        tag: Tag,
    },

    /// Declaring the given parent list would close a dependency cycle.
    ///
    /// Defensive boundary guard: construction allocates a fresh tag before
    /// any linking happens and parents are never rewired afterwards, so the
    /// public constructors cannot produce this error today. The check keeps
    /// cycles rejected if a rewiring path is ever added.
    #[error("subsystem '{name}' would form a dependency cycle through {tag}")]
    CycleDetected {
        /// Name of the subsystem being constructed.
        name: String,
        /// The ancestor tag the cycle runs through.
        tag: Tag,
    },

    /// A declared parent is already destroyed or no longer registered.
    #[error("parent {tag} is destroyed or no longer registered")]
    ParentUnavailable {
        /// The unusable parent's tag.
        tag: Tag,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::RegistryFull { .. } => "registry_full",
            RuntimeError::NotFound { .. } => "not_found",
            RuntimeError::CycleDetected { .. } => "cycle_detected",
            RuntimeError::ParentUnavailable { .. } => "parent_unavailable",
        }
    }
}
