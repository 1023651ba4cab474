// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compiler error types.

use thiserror::Error;
use weft_ast::{AstError, NodeId, SyntaxKind};

/// Result alias for compiler entry points.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Errors raised while compiling a function to a pipeline or a state machine.
///
/// All of them are fatal: compilation stops at the first one and no partial
/// artifact is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// Tree narrowing or constant folding failed.
    #[error(transparent)]
    Ast(#[from] AstError),

    /// A service call in a statement shape that cannot be split into stages.
    #[error("node {node}: service call in unsupported position: {reason}")]
    UnsupportedCallPosition { node: NodeId, reason: String },

    /// A construct reserved for one target used while compiling the other.
    #[error("node {node}: '{construct}' can only be used in a {expected}")]
    ContextMismatch {
        node: NodeId,
        construct: String,
        expected: &'static str,
    },

    /// Malformed `maxConcurrency` option of a map call.
    #[error("node {node}: invalid concurrency: {reason}")]
    InvalidConcurrency { node: NodeId, reason: String },

    /// A parallel call argument that is not an inline function.
    #[error("node {node}: invalid parallel branch: {reason}")]
    InvalidBranch { node: NodeId, reason: String },

    /// Valid syntax that the target language has no translation for.
    #[error("node {node}: unsupported {kind}: {reason}")]
    UnsupportedSyntax {
        node: NodeId,
        kind: SyntaxKind,
        reason: String,
    },

    /// A reference the resource resolver does not know.
    #[error("node {node}: unknown resource '{name}'")]
    UnknownResource { node: NodeId, name: String },

    /// A call on a known resource with the wrong method or arguments.
    #[error("node {node}: invalid service call: {reason}")]
    InvalidServiceCall { node: NodeId, reason: String },

    /// Configuration error (invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),
}

impl CompileError {
    /// The node the error was raised for, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            CompileError::Ast(err) => Some(err.node()),
            CompileError::UnsupportedCallPosition { node, .. }
            | CompileError::ContextMismatch { node, .. }
            | CompileError::InvalidConcurrency { node, .. }
            | CompileError::InvalidBranch { node, .. }
            | CompileError::UnsupportedSyntax { node, .. }
            | CompileError::UnknownResource { node, .. }
            | CompileError::InvalidServiceCall { node, .. } => Some(*node),
            CompileError::Config(_) => None,
        }
    }

    pub(crate) fn unsupported(ast: &weft_ast::Ast, node: NodeId, reason: impl Into<String>) -> Self {
        CompileError::UnsupportedSyntax {
            node,
            kind: ast.kind(node),
            reason: reason.into(),
        }
    }
}
