// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syntax tree model for the weft compilers.
//!
//! This crate holds everything the backends share:
//! - The closed set of node variants, deserializable from the upstream JSON tree
//! - The arena ([`Ast`]) with parent/child links and structural queries
//! - Control-flow queries ([`ControlFlow`]): step, exit, throw, scopes
//! - Constant folding and expression flattening ([`fold`])

pub mod ast;
pub mod control_flow;
pub mod error;
pub mod external;
pub mod fold;
pub mod syntax;

pub use ast::{Ast, NodeId, Traversal};
pub use control_flow::{Binding, BindingKind, ControlFlow};
pub use error::{AstError, Result};
pub use external::{ExternalValue, NoReferences, ReferenceEvaluator};
pub use fold::{
    Constant, FlattenScope, PathSegment, ReferencePath, assert_valid_event_reference,
    eval_to_constant, flatten_expression, flatten_return_event, flatten_statements_scope,
    get_reference_path, to_json,
};
pub use syntax::{BinaryOp, NodeKind, Syntax, SyntaxKind, SyntaxTree, SyntaxVariant, UnaryOp};

// ============================================================================
// Parsing Functions
// ============================================================================

/// Parse an upstream syntax tree from a JSON value and allocate it.
pub fn parse_tree(json: &serde_json::Value) -> std::result::Result<(Ast, NodeId), ParseError> {
    let tree: SyntaxTree = serde_json::from_value(json.clone())?;
    Ok(Ast::from_tree(&tree)?)
}

/// Failure to turn a JSON value into an [`Ast`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to parse syntax tree: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Ast(#[from] AstError),
}
