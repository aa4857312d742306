//! Physics Error Types
//!
//! Unified error type for the island solver. Fallible setup operations
//! (handle lookup, joint creation, configuration validation, worker pool
//! construction) return `Result<T, PhysicsError>`. The per-step path never
//! fails: structural faults are logged and skipped.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

/// Unified error type for physics operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PhysicsError {
    /// Body handle does not refer to a live body.
    #[error("body handle {index} does not refer to a live body")]
    InvalidBodyHandle {
        /// Raw slot index of the handle
        index: u32,
    },
    /// Contact handle does not refer to a live contact.
    #[error("contact handle {index} does not refer to a live contact")]
    InvalidContactHandle {
        /// Raw slot index of the handle
        index: u32,
    },
    /// Joint handle does not refer to a live joint.
    #[error("joint handle {index} does not refer to a live joint")]
    InvalidJointHandle {
        /// Raw slot index of the handle
        index: u32,
    },
    /// A constraint is malformed (e.g. both ends on the same body).
    #[error("invalid constraint: {reason}")]
    InvalidConstraint {
        /// Human-readable description of the problem
        reason: &'static str,
    },
    /// Invalid configuration parameter.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the invalid configuration
        reason: &'static str,
    },
    /// The fixed-size worker pool could not be created.
    #[error("worker pool construction failed: {message}")]
    WorkerPool {
        /// Message reported by the thread pool builder
        message: String,
    },
}

// ============================================================================
// Tests
// ============================================================================
