// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for control-flow resolution over a complete function.

use serde_json::{Value, json};
use weft_ast::syntax::{Block, FunctionDecl, IfStmt, TryStmt};
use weft_ast::{Ast, ControlFlow, NodeId, SyntaxKind, parse_tree};

fn assign(name: &str) -> Value {
    json!({ "kind": "VariableStmt", "name": name, "initializer": { "kind": "NumberLiteral", "value": 1 } })
}

fn ret(expression: Value) -> Value {
    json!({ "kind": "ReturnStmt", "expression": expression })
}

/// ```text
/// function handler(input) {
///   let result;
///   try {
///     if (input) { return 1; } else { result = 2; }
///   } catch (err) {
///     throw err;
///   } finally {
///     const done = 1;
///   }
///   return result;
/// }
/// ```
fn handler() -> (Ast, NodeId) {
    let tree = json!({
        "kind": "FunctionDecl",
        "name": "handler",
        "parameters": [{ "kind": "ParameterDecl", "name": "input" }],
        "body": { "kind": "Block", "statements": [
            { "kind": "VariableStmt", "name": "result" },
            { "kind": "TryStmt",
              "tryBlock": { "kind": "Block", "statements": [{
                  "kind": "IfStmt",
                  "condition": { "kind": "Identifier", "name": "input" },
                  "thenStmt": { "kind": "Block", "statements": [ret(json!({ "kind": "NumberLiteral", "value": 1 }))] },
                  "elseStmt": { "kind": "Block", "statements": [assign("result")] }
              }]},
              "catchClause": {
                  "kind": "CatchClause",
                  "variable": { "kind": "VariableStmt", "name": "err" },
                  "block": { "kind": "Block", "statements": [
                      { "kind": "ThrowStmt", "expression": { "kind": "Identifier", "name": "err" } }
                  ]}
              },
              "finallyBlock": { "kind": "Block", "isFinally": true, "statements": [assign("done")] }
            },
            ret(json!({ "kind": "Identifier", "name": "result" }))
        ]}
    });
    parse_tree(&tree).unwrap()
}

#[test]
fn test_function_entry_skips_uninitialised_declaration() {
    let (ast, root) = handler();
    let cf = ControlFlow::new(&ast);
    let body = ast.cast::<FunctionDecl>(root).unwrap().body;
    let statements = ast.cast::<Block>(body).unwrap().statements.clone();
    let first = cf.step(body).unwrap();

    // step(body) -> step(let result) -> exit -> step(try) -> step(tryBlock) -> if
    assert_eq!(ast.kind(first), SyntaxKind::IfStmt);
    assert_eq!(ast.find_parent_kind(first, SyntaxKind::TryStmt), Some(statements[1]));
}

#[test]
fn test_branches_converge_on_finally() {
    let (ast, root) = handler();
    let cf = ControlFlow::new(&ast);
    let body = ast.cast::<FunctionDecl>(root).unwrap().body;
    let statements = ast.cast::<Block>(body).unwrap().statements.clone();
    let try_stmt = ast.cast::<TryStmt>(statements[1]).unwrap();
    let finally = try_stmt.finally_block.unwrap();
    let finally_first = ast.cast::<Block>(finally).unwrap().statements[0];

    let if_stmt = cf.step(body).unwrap();
    let else_block = ast.cast::<IfStmt>(if_stmt).unwrap().else_stmt.unwrap();
    let else_first = ast.cast::<Block>(else_block).unwrap().statements[0];

    assert_eq!(cf.exit(else_first), Some(finally_first));
    assert_eq!(cf.exit(finally_first), Some(statements[2]));
    assert_eq!(cf.exit(statements[2]), None);
}

#[test]
fn test_errors_route_through_catch_then_finally() {
    let (ast, root) = handler();
    let cf = ControlFlow::new(&ast);
    let body = ast.cast::<FunctionDecl>(root).unwrap().body;
    let statements = ast.cast::<Block>(body).unwrap().statements.clone();
    let try_stmt = ast.cast::<TryStmt>(statements[1]).unwrap();
    let catch = try_stmt.catch_clause.unwrap();
    let finally = try_stmt.finally_block.unwrap();

    let if_stmt = cf.step(body).unwrap();
    assert_eq!(cf.throw(if_stmt), Some(catch));

    let rethrow = ast.collect_children(catch, |ast, id| {
        (ast.kind(id) == SyntaxKind::ThrowStmt).then_some(id)
    });
    assert_eq!(cf.throw(rethrow[0]), Some(finally));
    assert_eq!(cf.throw(statements[2]), None);
}

#[test]
fn test_terminal_and_scope_queries() {
    let (ast, root) = handler();
    let cf = ControlFlow::new(&ast);
    let body = ast.cast::<FunctionDecl>(root).unwrap().body;
    let statements = ast.cast::<Block>(body).unwrap().statements.clone();

    assert!(cf.is_terminal(body));
    assert!(!cf.is_terminal(statements[1]));

    let scope = cf.lexical_scope(statements[2]);
    let names: Vec<&str> = scope.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["input", "result"]);
}
