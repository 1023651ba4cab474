// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Control-flow queries over an [`Ast`].
//!
//! Sibling links are computed once when a [`ControlFlow`] is built and kept in
//! side maps keyed by [`NodeId`]; the nodes themselves carry no control-flow
//! state. All queries are structural and never fail.
//!
//! The three core queries are:
//!
//! - [`ControlFlow::step`]: the statement that executes upon entering a node
//! - [`ControlFlow::exit`]: what runs after the node's enclosing scope is done
//! - [`ControlFlow::throw`]: where an error raised inside the node is handled
//!
//! Each returns `None` when control leaves the enclosing function.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::ast::{Ast, NodeId, Traversal};
use crate::syntax::{Syntax, SyntaxKind};

/// How a name was introduced into scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "camelCase")]
pub enum BindingKind {
    Variable,
    Parameter,
    LoopVariable,
    CatchVariable,
    Function,
}

/// A name visible at some point of the tree, with the node that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub node: NodeId,
    pub kind: BindingKind,
}

/// Control-flow resolver for one syntax tree.
pub struct ControlFlow<'a> {
    ast: &'a Ast,
    next: HashMap<NodeId, NodeId>,
    prev: HashMap<NodeId, NodeId>,
}

impl<'a> ControlFlow<'a> {
    /// Build the statement chains of every block and catch clause in `ast`.
    pub fn new(ast: &'a Ast) -> Self {
        let mut next = HashMap::new();
        let mut prev = HashMap::new();
        let mut link = |items: &[NodeId]| {
            for pair in items.windows(2) {
                next.insert(pair[0], pair[1]);
                prev.insert(pair[1], pair[0]);
            }
        };
        for id in ast.ids() {
            match ast.syntax(id) {
                Syntax::Block(block) => link(&block.statements),
                Syntax::CatchClause(clause) => {
                    if let Some(variable) = clause.variable {
                        link(&[variable, clause.block]);
                    }
                }
                _ => {}
            }
        }
        Self { ast, next, prev }
    }

    pub fn ast(&self) -> &'a Ast {
        self.ast
    }

    /// The statement chained after `node`, if any.
    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        self.next.get(&node).copied()
    }

    /// The statement chained before `node`, if any.
    pub fn prev(&self, node: NodeId) -> Option<NodeId> {
        self.prev.get(&node).copied()
    }

    /// The statement that executes upon entering `node`.
    pub fn step(&self, node: NodeId) -> Option<NodeId> {
        match self.ast.syntax(node) {
            Syntax::TryStmt(stmt) => self.step(stmt.try_block),
            Syntax::Block(block) => match block.first() {
                Some(first) => self.step(first),
                None => self.exit(node),
            },
            Syntax::CatchClause(clause) => match clause.variable {
                Some(variable) => self.step(variable),
                None => self.step(clause.block),
            },
            Syntax::VariableStmt(stmt) if stmt.initializer.is_none() => self.exit(node),
            Syntax::DoStmt(stmt) => self.step(stmt.body),
            _ if self.ast.is_statement(node) => Some(node),
            _ => self.exit(node),
        }
    }

    /// What runs once `node` is done.
    pub fn exit(&self, node: NodeId) -> Option<NodeId> {
        if let Some(next) = self.next(node) {
            return self.step(next);
        }
        let parent = self.ast.parent(node)?;
        match self.ast.syntax(parent) {
            Syntax::FunctionDecl(_) | Syntax::ArrowFunction(_) => None,
            Syntax::WhileStmt(stmt) if stmt.body == node => Some(parent),
            Syntax::DoStmt(stmt) if stmt.body == node => Some(parent),
            Syntax::ForOfStmt(stmt) if stmt.body == node => Some(parent),
            Syntax::ForInStmt(stmt) if stmt.body == node => Some(parent),
            Syntax::TryStmt(stmt) => match stmt.finally_block {
                Some(finally) if finally != node => self.step(finally),
                _ => self.exit(parent),
            },
            _ => self.exit(parent),
        }
    }

    /// The node that handles an error raised inside `node`: a catch clause, a
    /// finally block that must run first, or `None` when the error escapes.
    pub fn throw(&self, node: NodeId) -> Option<NodeId> {
        let handler = self.find_catch_clause(node);
        let finally = self.find_intercepting_finally(node);
        match (handler, finally) {
            (Some(handler), Some(finally)) => {
                let handler_try = self.try_block_of(handler);
                let finally_try = self.ast.parent(finally);
                match (handler_try, finally_try) {
                    (Some(try_block), Some(finally_try))
                        if self.ast.contains(try_block, finally_try, Traversal::DepthFirst) =>
                    {
                        Some(finally)
                    }
                    _ => Some(handler),
                }
            }
            (None, Some(finally)) => Some(finally),
            (handler, None) => handler,
        }
    }

    /// Nearest catch clause guarding `node`.
    ///
    /// Only a try block is guarded by its own catch clause; leaving the catch
    /// clause or the finally block continues the search outward.
    pub fn find_catch_clause(&self, node: NodeId) -> Option<NodeId> {
        let mut child = node;
        for ancestor in self.ast.ancestors(node) {
            match self.ast.syntax(ancestor) {
                Syntax::FunctionDecl(_) | Syntax::ArrowFunction(_) => return None,
                Syntax::TryStmt(stmt) if stmt.try_block == child => {
                    if let Some(clause) = stmt.catch_clause {
                        return Some(clause);
                    }
                }
                _ => {}
            }
            child = ancestor;
        }
        None
    }

    /// Nearest finally block that runs when an error leaves `node`.
    pub fn find_intercepting_finally(&self, node: NodeId) -> Option<NodeId> {
        let mut child = node;
        for ancestor in self.ast.ancestors(node) {
            match self.ast.syntax(ancestor) {
                Syntax::FunctionDecl(_) | Syntax::ArrowFunction(_) => return None,
                Syntax::TryStmt(stmt) => {
                    if let Some(finally) = stmt.finally_block
                        && finally != child
                    {
                        return Some(finally);
                    }
                }
                _ => {}
            }
            child = ancestor;
        }
        None
    }

    /// True when every execution path through `node` ends in a return or a
    /// throw.
    pub fn is_terminal(&self, node: NodeId) -> bool {
        match self.ast.syntax(node) {
            Syntax::ReturnStmt(_) | Syntax::ThrowStmt(_) => true,
            Syntax::Block(block) => block.last().is_some_and(|last| self.is_terminal(last)),
            Syntax::IfStmt(stmt) => {
                stmt.else_stmt.is_some_and(|else_stmt| self.is_terminal(else_stmt))
                    && self.is_terminal(stmt.then_stmt)
            }
            Syntax::TryStmt(stmt) => match stmt.finally_block {
                Some(finally) if self.is_terminal(finally) => true,
                _ => {
                    self.is_terminal(stmt.try_block)
                        && stmt
                            .catch_clause
                            .is_none_or(|clause| self.is_terminal(clause))
                }
            },
            Syntax::CatchClause(clause) => self.is_terminal(clause.block),
            _ => false,
        }
    }

    /// Names visible at `node`.
    ///
    /// Outer scopes come first, so a nearer binding of the same name
    /// overwrites an outer one.
    pub fn lexical_scope(&self, node: NodeId) -> IndexMap<String, Binding> {
        let mut scope = IndexMap::new();
        self.collect_scope(node, &mut scope);
        scope
    }

    fn collect_scope(&self, node: NodeId, scope: &mut IndexMap<String, Binding>) {
        let Some(parent) = self.ast.parent(node) else {
            return;
        };
        self.collect_scope(parent, scope);

        match self.ast.syntax(parent) {
            Syntax::FunctionDecl(func) if func.body == node => {
                self.bind_parameters(&func.parameters, scope)
            }
            Syntax::ArrowFunction(func) if func.body == node => {
                self.bind_parameters(&func.parameters, scope)
            }
            Syntax::ForOfStmt(stmt) if stmt.body == node => {
                self.bind(stmt.variable, BindingKind::LoopVariable, scope)
            }
            Syntax::ForInStmt(stmt) if stmt.body == node => {
                self.bind(stmt.variable, BindingKind::LoopVariable, scope)
            }
            _ => {}
        }

        let in_catch = self.ast.kind(parent) == SyntaxKind::CatchClause;
        let mut preceding = Vec::new();
        let mut cursor = self.prev(node);
        while let Some(sibling) = cursor {
            preceding.push(sibling);
            cursor = self.prev(sibling);
        }
        for sibling in preceding.into_iter().rev() {
            let kind = if in_catch {
                BindingKind::CatchVariable
            } else {
                BindingKind::Variable
            };
            self.bind(sibling, kind, scope);
        }
    }

    fn bind_parameters(&self, parameters: &[NodeId], scope: &mut IndexMap<String, Binding>) {
        for param in parameters {
            self.bind(*param, BindingKind::Parameter, scope);
        }
    }

    fn bind(&self, node: NodeId, kind: BindingKind, scope: &mut IndexMap<String, Binding>) {
        let (name, kind) = match self.ast.syntax(node) {
            Syntax::VariableStmt(stmt) => (stmt.name.clone(), kind),
            Syntax::ParameterDecl(param) => (param.name.clone(), kind),
            Syntax::FunctionDecl(func) => match &func.name {
                Some(name) => (name.clone(), BindingKind::Function),
                None => return,
            },
            _ => return,
        };
        scope.insert(name, Binding { node, kind });
    }

    /// Nearest loop whose body contains `node`, within the same function.
    pub fn enclosing_loop(&self, node: NodeId) -> Option<NodeId> {
        let mut child = node;
        for ancestor in self.ast.ancestors(node) {
            let kind = self.ast.kind(ancestor);
            if kind.is_function() {
                return None;
            }
            if kind.is_loop() && self.loop_body(ancestor) == Some(child) {
                return Some(ancestor);
            }
            child = ancestor;
        }
        None
    }

    /// Body statement of a loop node.
    pub fn loop_body(&self, node: NodeId) -> Option<NodeId> {
        match self.ast.syntax(node) {
            Syntax::WhileStmt(stmt) => Some(stmt.body),
            Syntax::DoStmt(stmt) => Some(stmt.body),
            Syntax::ForOfStmt(stmt) => Some(stmt.body),
            Syntax::ForInStmt(stmt) => Some(stmt.body),
            _ => None,
        }
    }

    fn try_block_of(&self, clause: NodeId) -> Option<NodeId> {
        let try_stmt = self.ast.parent(clause)?;
        match self.ast.syntax(try_stmt) {
            Syntax::TryStmt(stmt) => Some(stmt.try_block),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{ReturnStmt, SyntaxTree};
    use serde_json::{Value, json};

    fn build(tree: Value) -> (Ast, NodeId) {
        let tree: SyntaxTree = serde_json::from_value(tree).unwrap();
        Ast::from_tree(&tree).unwrap()
    }

    fn var(name: &str) -> Value {
        json!({ "kind": "VariableStmt", "name": name })
    }

    fn assign(name: &str, value: f64) -> Value {
        json!({
            "kind": "VariableStmt",
            "name": name,
            "initializer": { "kind": "NumberLiteral", "value": value }
        })
    }

    fn ret() -> Value {
        json!({ "kind": "ReturnStmt", "expression": { "kind": "NullLiteral" } })
    }

    fn block(statements: Vec<Value>) -> Value {
        json!({ "kind": "Block", "statements": statements })
    }

    fn func(body: Value) -> Value {
        json!({
            "kind": "FunctionDecl",
            "name": "handler",
            "parameters": [{ "kind": "ParameterDecl", "name": "input" }],
            "body": body
        })
    }

    fn body_of(ast: &Ast, root: NodeId) -> Vec<NodeId> {
        let body = *ast.children(root).last().unwrap();
        ast.children(body).to_vec()
    }

    #[test]
    fn test_step_skips_uninitialised_declaration() {
        let (ast, root) = build(func(block(vec![var("a"), assign("b", 1.0), ret()])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        assert_eq!(cf.step(stmts[0]), Some(stmts[1]));
        assert_eq!(cf.next(stmts[1]), Some(stmts[2]));
        assert_eq!(cf.prev(stmts[1]), Some(stmts[0]));
    }

    #[test]
    fn test_exit_of_function_body_is_none() {
        let (ast, root) = build(func(block(vec![ret()])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        assert_eq!(cf.exit(stmts[0]), None);
        let body = ast.parent(stmts[0]).unwrap();
        assert_eq!(cf.step(body), Some(stmts[0]));
    }

    #[test]
    fn test_empty_block_steps_to_exit() {
        let (ast, root) = build(func(block(vec![block(vec![]), ret()])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        assert_eq!(cf.step(stmts[0]), Some(stmts[1]));
    }

    #[test]
    fn test_loop_body_exits_to_loop() {
        let (ast, root) = build(func(block(vec![
            json!({
                "kind": "WhileStmt",
                "condition": { "kind": "BooleanLiteral", "value": true },
                "body": block(vec![assign("a", 1.0)])
            }),
            ret(),
        ])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        let loop_body = cf.loop_body(stmts[0]).unwrap();
        let inner = ast.children(loop_body)[0];
        assert_eq!(cf.exit(inner), Some(stmts[0]));
        assert_eq!(cf.enclosing_loop(inner), Some(stmts[0]));
        assert_eq!(cf.exit(stmts[0]), Some(stmts[1]));
        assert_eq!(cf.enclosing_loop(stmts[1]), None);
    }

    #[test]
    fn test_try_exits_through_finally() {
        let (ast, root) = build(func(block(vec![
            json!({
                "kind": "TryStmt",
                "tryBlock": block(vec![assign("a", 1.0)]),
                "catchClause": {
                    "kind": "CatchClause",
                    "variable": var("err"),
                    "block": block(vec![assign("b", 2.0)])
                },
                "finallyBlock": { "kind": "Block", "isFinally": true, "statements": [assign("c", 3.0)] }
            }),
            ret(),
        ])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        let try_children = ast.children(stmts[0]).to_vec();
        let (try_block, catch, finally) = (try_children[0], try_children[1], try_children[2]);
        let in_try = ast.children(try_block)[0];
        let in_finally = ast.children(finally)[0];
        let catch_block = *ast.children(catch).last().unwrap();
        let in_catch = ast.children(catch_block)[0];

        assert_eq!(cf.step(stmts[0]), Some(in_try));
        assert_eq!(cf.exit(in_try), Some(in_finally));
        assert_eq!(cf.exit(in_catch), Some(in_finally));
        assert_eq!(cf.exit(in_finally), Some(stmts[1]));

        assert_eq!(cf.throw(in_try), Some(catch));
        assert_eq!(cf.throw(in_catch), Some(finally));
        assert_eq!(cf.throw(in_finally), None);
        assert_eq!(cf.step(catch), Some(in_catch));
    }

    #[test]
    fn test_inner_finally_wins_over_outer_catch() {
        let inner = json!({
            "kind": "TryStmt",
            "tryBlock": block(vec![assign("a", 1.0)]),
            "finallyBlock": { "kind": "Block", "isFinally": true, "statements": [assign("b", 2.0)] }
        });
        let (ast, root) = build(func(block(vec![json!({
            "kind": "TryStmt",
            "tryBlock": block(vec![inner]),
            "catchClause": { "kind": "CatchClause", "block": block(vec![ret()]) }
        })])));
        let cf = ControlFlow::new(&ast);
        let outer = body_of(&ast, root)[0];
        let outer_catch = ast.children(outer)[1];
        let inner_try = ast.children(ast.children(outer)[0])[0];
        let inner_finally = ast.children(inner_try)[1];
        let in_inner_try = ast.children(ast.children(inner_try)[0])[0];
        let in_inner_finally = ast.children(inner_finally)[0];

        assert_eq!(cf.throw(in_inner_try), Some(inner_finally));
        assert_eq!(cf.throw(in_inner_finally), Some(outer_catch));
    }

    #[test]
    fn test_is_terminal_cases() {
        let (ast, root) = build(func(block(vec![
            block(vec![assign("a", 1.0), ret()]),
            block(vec![]),
            json!({
                "kind": "IfStmt",
                "condition": { "kind": "Identifier", "name": "input" },
                "thenStmt": block(vec![ret()]),
                "elseStmt": block(vec![ret()])
            }),
            json!({
                "kind": "IfStmt",
                "condition": { "kind": "Identifier", "name": "input" },
                "thenStmt": block(vec![ret()])
            }),
        ])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        assert!(cf.is_terminal(stmts[0]));
        assert!(!cf.is_terminal(stmts[1]));
        assert!(cf.is_terminal(stmts[2]));
        assert!(!cf.is_terminal(stmts[3]));
        assert!(ast.try_cast::<ReturnStmt>(ast.children(stmts[0])[1]).is_some());
    }

    #[test]
    fn test_lexical_scope_orders_outer_first() {
        let (ast, root) = build(func(block(vec![
            assign("a", 1.0),
            assign("input", 2.0),
            json!({
                "kind": "ForOfStmt",
                "variable": var("item"),
                "expression": { "kind": "Identifier", "name": "input" },
                "body": block(vec![assign("b", 3.0), ret()])
            }),
        ])));
        let cf = ControlFlow::new(&ast);
        let stmts = body_of(&ast, root);
        let loop_body = cf.loop_body(stmts[2]).unwrap();
        let inner_ret = ast.children(loop_body)[1];

        let scope = cf.lexical_scope(inner_ret);
        let names: Vec<&str> = scope.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["input", "a", "item", "b"]);
        assert_eq!(scope["input"].node, stmts[1]);
        assert_eq!(scope["input"].kind, BindingKind::Variable);
        assert_eq!(scope["item"].kind, BindingKind::LoopVariable);
    }

    #[test]
    fn test_catch_variable_is_in_scope_of_block() {
        let (ast, root) = build(func(block(vec![json!({
            "kind": "TryStmt",
            "tryBlock": block(vec![]),
            "catchClause": {
                "kind": "CatchClause",
                "variable": var("err"),
                "block": block(vec![ret()])
            }
        })])));
        let cf = ControlFlow::new(&ast);
        let catch = ast.children(body_of(&ast, root)[0])[1];
        let catch_block = ast.children(catch)[1];
        let scope = cf.lexical_scope(ast.children(catch_block)[0]);
        assert_eq!(scope["err"].kind, BindingKind::CatchVariable);
        assert_eq!(scope["input"].kind, BindingKind::Parameter);
    }
}
