// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compilation orchestration.
//!
//! Each compiled function is described by a [`CompilationInput`]: the tree it
//! lives in, the resolvers for its external references, and the compiler
//! settings. [`compile_document`] runs a whole input document against one
//! [`Namespace`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use weft_ast::syntax::Block;
use weft_ast::{Ast, NodeId, ReferenceEvaluator, Syntax, SyntaxKind, SyntaxTree};

use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::namespace::{DataSource, Namespace};
use crate::resolver::{ResolverPipeline, compile_resolver};
use crate::resources::{ResourceResolver, ResourceTable};
use crate::workflow::{CompiledWorkflow, compile_workflow};

/// Input for compiling one function (all data pre-loaded).
#[derive(Clone, Copy)]
pub struct CompilationInput<'a> {
    /// Name of the resolver or workflow being compiled.
    pub name: &'a str,
    pub ast: &'a Ast,
    /// The `FunctionDecl` or `ArrowFunction` to compile.
    pub function: NodeId,
    pub resources: &'a dyn ResourceResolver,
    pub references: &'a dyn ReferenceEvaluator,
    pub config: &'a CompilerConfig,
}

impl<'a> CompilationInput<'a> {
    pub fn new(
        name: &'a str,
        ast: &'a Ast,
        function: NodeId,
        resources: &'a dyn ResourceResolver,
        references: &'a dyn ReferenceEvaluator,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            name,
            ast,
            function,
            resources,
            references,
            config,
        }
    }

    /// Parameters and body block of the compiled function.
    pub(crate) fn function_parts(&self) -> Result<(&'a [NodeId], NodeId)> {
        function_parts(self.ast, self.function)
    }
}

/// Parameters and block body of a function node.
pub(crate) fn function_parts(ast: &Ast, function: NodeId) -> Result<(&[NodeId], NodeId)> {
    let (parameters, body) = match ast.syntax(function) {
        Syntax::FunctionDecl(func) => (func.parameters.as_slice(), func.body),
        Syntax::ArrowFunction(func) => (func.parameters.as_slice(), func.body),
        _ => {
            return Err(weft_ast::AstError::TypeMismatch {
                node: function,
                expected: SyntaxKind::FunctionDecl,
                actual: ast.kind(function),
            }
            .into());
        }
    };
    if ast.try_cast::<Block>(body).is_none() {
        return Err(CompileError::unsupported(
            ast,
            body,
            "function bodies must be blocks",
        ));
    }
    Ok((parameters, body))
}

/// Name of a parameter node.
pub(crate) fn parameter_name(ast: &Ast, parameter: NodeId) -> Option<String> {
    match ast.syntax(parameter) {
        Syntax::ParameterDecl(param) => Some(param.name.clone()),
        Syntax::Identifier(ident) => Some(ident.name.clone()),
        _ => None,
    }
}

// ============================================================================
// Documents
// ============================================================================

/// The JSON document handed over by the build step: resources and values,
/// plus the syntax trees of every resolver and workflow of one API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationDocument {
    #[serde(flatten)]
    pub table: ResourceTable,
    #[serde(default)]
    pub resolvers: IndexMap<String, SyntaxTree>,
    #[serde(default)]
    pub workflows: IndexMap<String, SyntaxTree>,
}

/// Result of compiling a [`CompilationDocument`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactBundle {
    pub data_sources: Vec<DataSource>,
    pub resolvers: Vec<ResolverPipeline>,
    pub workflows: Vec<CompiledWorkflow>,
}

/// Compile every resolver and workflow of `document` against one namespace.
///
/// Resolvers are compiled first, in document order, then workflows.
pub fn compile_document(
    document: &CompilationDocument,
    config: &CompilerConfig,
) -> Result<ArtifactBundle> {
    let mut namespace = Namespace::new();
    let mut resolvers = Vec::with_capacity(document.resolvers.len());
    let mut workflows = Vec::with_capacity(document.workflows.len());

    for (name, tree) in &document.resolvers {
        let (ast, function) = Ast::from_tree(tree)?;
        let input = CompilationInput::new(
            name,
            &ast,
            function,
            &document.table,
            &document.table,
            config,
        );
        resolvers.push(compile_resolver(&input, &mut namespace)?);
    }

    for (name, tree) in &document.workflows {
        let (ast, function) = Ast::from_tree(tree)?;
        let input = CompilationInput::new(
            name,
            &ast,
            function,
            &document.table,
            &document.table,
            config,
        );
        workflows.push(compile_workflow(&input, &mut namespace)?);
    }

    let data_sources: Vec<DataSource> = namespace.data_sources().cloned().collect();
    info!(
        resolvers = resolvers.len(),
        workflows = workflows.len(),
        data_sources = data_sources.len(),
        "Compiled document"
    );
    Ok(ArtifactBundle {
        data_sources,
        resolvers,
        workflows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_ast::{AstError, parse_tree};

    #[test]
    fn test_function_parts_of_arrow_function() {
        let (ast, root) = parse_tree(&json!({
            "kind": "ArrowFunction",
            "parameters": [{ "kind": "ParameterDecl", "name": "ctx" }],
            "body": { "kind": "Block", "statements": [] }
        }))
        .unwrap();

        let (parameters, body) = function_parts(&ast, root).unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameter_name(&ast, parameters[0]).as_deref(), Some("ctx"));
        assert_eq!(ast.kind(body), SyntaxKind::Block);
    }

    #[test]
    fn test_function_parts_rejects_other_nodes() {
        let (ast, root) = parse_tree(&json!({ "kind": "NumberLiteral", "value": 1 })).unwrap();
        let err = function_parts(&ast, root).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Ast(AstError::TypeMismatch { expected: SyntaxKind::FunctionDecl, .. })
        ));
        assert_eq!(err.node(), Some(root));
    }

    #[test]
    fn test_empty_document_compiles_to_empty_bundle() {
        let bundle = compile_document(&CompilationDocument::default(), &CompilerConfig::default()).unwrap();
        assert!(bundle.data_sources.is_empty());
        assert!(bundle.resolvers.is_empty());
        assert!(bundle.workflows.is_empty());
    }
}
