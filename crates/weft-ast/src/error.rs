// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Errors raised while building, narrowing, or folding syntax trees.

use thiserror::Error;

use crate::ast::NodeId;
use crate::syntax::SyntaxKind;

/// Result alias for syntax tree operations.
pub type Result<T> = std::result::Result<T, AstError>;

/// Errors raised by the AST model and the expression flattener.
///
/// Every variant names the node it was raised for so the caller can point at
/// the offending source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AstError {
    /// A narrowing assertion on node kind failed.
    #[error("node {node}: expected {expected}, found {actual}")]
    TypeMismatch {
        node: NodeId,
        expected: SyntaxKind,
        actual: SyntaxKind,
    },

    /// `set_parent` was called for a node that already has a parent.
    #[error("node {node} is already attached to {parent}")]
    AlreadyAttached { node: NodeId, parent: NodeId },

    /// A node id that was not allocated by this arena.
    #[error("node {node} does not belong to this tree")]
    UnknownNode { node: NodeId },

    /// Property access into a known object or array found no such member.
    #[error("node {node}: property '{property}' not found")]
    PropertyNotFound { node: NodeId, property: String },

    /// An access whose key type does not fit the value being accessed.
    #[error("node {node}: invalid access: {reason}")]
    InvalidAccess { node: NodeId, reason: String },

    /// Spread of a collection that does not fold to a literal.
    #[error("node {node}: cannot spread an expression that is not a constant {collection}")]
    UnsupportedSpread {
        node: NodeId,
        collection: &'static str,
    },

    /// A reference that cannot be resolved or is not allowed in this position.
    #[error("node {node}: invalid reference: {reason}")]
    InvalidReference { node: NodeId, reason: String },

    /// A statement sequence that must end in a `return` does not.
    #[error("node {node}: expected the final statement to be a return with a value")]
    MissingReturn { node: NodeId },

    /// A statement shape that a folding pass does not accept.
    #[error("node {node}: unsupported statement {kind} in this position")]
    UnsupportedStatement { node: NodeId, kind: SyntaxKind },
}

impl AstError {
    /// The node the error was raised for.
    pub fn node(&self) -> NodeId {
        match self {
            AstError::TypeMismatch { node, .. }
            | AstError::AlreadyAttached { node, .. }
            | AstError::UnknownNode { node }
            | AstError::PropertyNotFound { node, .. }
            | AstError::InvalidAccess { node, .. }
            | AstError::UnsupportedSpread { node, .. }
            | AstError::InvalidReference { node, .. }
            | AstError::MissingReturn { node }
            | AstError::UnsupportedStatement { node, .. } => *node,
        }
    }
}
