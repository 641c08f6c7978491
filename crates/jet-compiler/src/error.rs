// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for tree lowering.

use thiserror::Error;

/// Result type for compilation operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors that abort compilation of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// An expression without the storable capability was used as an assignment target
    #[error("line {line}: {node} expression cannot be assigned to")]
    NotStorable {
        /// Variant name of the offending node
        node: &'static str,
        /// Source line of the offending node
        line: u32,
    },

    /// `break` or `continue` compiled with no enclosing loop
    #[error("line {line}: '{statement}' outside of a loop")]
    OutsideLoop {
        /// The statement keyword
        statement: &'static str,
        /// Source line of the statement
        line: u32,
    },

    /// The same label was placed twice in one unit
    #[error("label '{label}' defined twice in '{unit}'")]
    DuplicateLabel {
        /// Label name
        label: String,
        /// Unit the label belongs to
        unit: String,
    },

    /// A jump names a label that was never placed
    #[error("jump to undefined label '{label}' in '{unit}'")]
    UndefinedLabel {
        /// Label name
        label: String,
        /// Unit containing the jump
        unit: String,
    },

    /// Scopes, loops or function units were not closed in stack order
    #[error("unbalanced {0}")]
    UnbalancedScope(&'static str),

    /// A unit outgrew what a 16-bit operand can address
    #[error("too many {what} in '{unit}'")]
    Limit {
        /// What overflowed
        what: &'static str,
        /// Unit being assembled
        unit: String,
    },

    /// Compiler configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl CompileError {
    /// Source line the error points at, when it has one.
    pub fn line(&self) -> Option<u32> {
        match self {
            CompileError::NotStorable { line, .. } | CompileError::OutsideLoop { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }
}
