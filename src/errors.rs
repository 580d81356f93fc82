// Copyright 2025 Cowboy AI, LLC.

//! Error types for policy parsing, composition and installation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while compiling a policy expression
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The expression contained no tokens
    #[error("Policy expression is empty")]
    Empty,

    /// A character that is neither a digit, an operator nor a parenthesis
    #[error("Unknown token '{token}' at position {position}")]
    UnknownToken {
        /// The offending token
        token: String,
        /// Byte offset in the expression
        position: usize,
    },

    /// An opening or closing parenthesis has no partner
    #[error("Unbalanced parentheses at position {position}")]
    UnbalancedParentheses {
        /// Byte offset of the unmatched parenthesis
        position: usize,
    },

    /// An operator does not have two operands
    #[error("Operator '{operator}' at position {position} is missing an operand")]
    MissingOperand {
        /// The operator symbol
        operator: char,
        /// Byte offset of the operator
        position: usize,
    },

    /// Two operands are adjacent without an operator between them
    #[error("Missing operator between operands")]
    MissingOperator,

    /// A leaf does not fit an application id
    #[error("Invalid application id: {0}")]
    InvalidApplicationId(String),
}

/// Errors returned by the composition manager API
#[derive(Debug, Clone, Error)]
pub enum CompositionError {
    /// The policy expression could not be compiled
    #[error("Policy parse error: {0}")]
    Parse(#[from] ParseError),

    /// An objective was submitted before any policy was installed
    #[error("No composition policy has been initialized")]
    NoPolicy,

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration document could not be deserialized
    #[error("Configuration error: {0}")]
    ConfigFormat(String),
}

/// Result type for composition operations
pub type CompositionResult<T> = Result<T, CompositionError>;

impl From<serde_json::Error> for CompositionError {
    fn from(err: serde_json::Error) -> Self {
        CompositionError::ConfigFormat(err.to_string())
    }
}

impl CompositionError {
    /// Check if this error came from the policy parser
    pub fn is_parse_error(&self) -> bool {
        matches!(self, CompositionError::Parse(_))
    }

    /// Check if this error is a configuration problem
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CompositionError::InvalidConfig(_) | CompositionError::ConfigFormat(_)
        )
    }
}

/// Error codes delivered to an objective's completion callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum ObjectiveError {
    /// No pipeliner was bound to the device within the retry budget
    #[error("NOPIPELINER")]
    NoPipeliner,

    /// The referenced next group does not exist
    #[error("GROUPMISSING")]
    GroupMissing,

    /// The device rejected the flow rules
    #[error("FLOWINSTALLATIONFAILED")]
    FlowInstallationFailed,

    /// The device rejected the group
    #[error("GROUPINSTALLATIONFAILED")]
    GroupInstallationFailed,

    /// The objective parameters are not valid for the pipeline
    #[error("BADPARAMS")]
    BadParams,

    /// The pipeline cannot express the objective
    #[error("UNSUPPORTED")]
    Unsupported,

    /// The device is not known
    #[error("DEVICEMISSING")]
    DeviceMissing,

    /// The installation did not complete in time
    #[error("INSTALLATIONTIMEOUT")]
    InstallationTimeout,

    /// Anything else
    #[error("UNKNOWN")]
    Unknown,
}

/// Failures reported by a device pipeliner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelinerError {
    /// The driver failed to write to the device
    #[error("Driver error: {0}")]
    Driver(String),

    /// The driver does not support the request
    #[error("Unsupported by driver: {0}")]
    Unsupported(String),
}
