// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Syntax tree builders and fixture loading shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use serde_json::{Value, json};
use weft_ast::parse_tree;
use weft_compiler::{
    BackendKind, CompilationInput, CompileError, CompiledWorkflow, CompilerConfig, Namespace,
    Resource, ResolverPipeline, ResourceTable, compile_resolver, compile_workflow,
};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn load_fixture(filename: &str) -> String {
    let path = fixtures_dir().join(filename);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

/// `orders` table, `notify` function, `fulfil` state machine.
pub fn table() -> ResourceTable {
    ResourceTable::new()
        .with_resource("orders", Resource::new(BackendKind::KeyValueStore, "Orders"))
        .with_resource(
            "notify",
            Resource::new(BackendKind::ComputeFunction, "arn:aws:lambda:eu-west-1:1:function:notify"),
        )
        .with_resource(
            "fulfil",
            Resource::new(BackendKind::WorkflowOrchestrator, "arn:aws:states:eu-west-1:1:stateMachine:fulfil"),
        )
}

pub fn function(param: &str, statements: Vec<Value>) -> Value {
    json!({
        "kind": "FunctionDecl",
        "name": "handler",
        "parameters": [{ "kind": "ParameterDecl", "name": param }],
        "body": block(statements)
    })
}

pub fn arrow(params: &[&str], statements: Vec<Value>) -> Value {
    let parameters: Vec<Value> = params
        .iter()
        .map(|name| json!({ "kind": "ParameterDecl", "name": name }))
        .collect();
    json!({ "kind": "ArrowFunction", "parameters": parameters, "body": block(statements) })
}

pub fn block(statements: Vec<Value>) -> Value {
    json!({ "kind": "Block", "statements": statements })
}

pub fn ident(name: &str) -> Value {
    json!({ "kind": "Identifier", "name": name })
}

pub fn num(value: f64) -> Value {
    json!({ "kind": "NumberLiteral", "value": value })
}

pub fn string(value: &str) -> Value {
    json!({ "kind": "StringLiteral", "value": value })
}

pub fn prop(expression: Value, name: &str) -> Value {
    json!({ "kind": "PropertyAccess", "expression": expression, "name": name })
}

pub fn binary(left: Value, operator: &str, right: Value) -> Value {
    json!({ "kind": "BinaryExpr", "left": left, "operator": operator, "right": right })
}

pub fn object(fields: &[(&str, Value)]) -> Value {
    let properties: Vec<Value> = fields
        .iter()
        .map(|(name, value)| json!({ "kind": "PropertyAssignment", "name": ident(name), "value": value }))
        .collect();
    json!({ "kind": "ObjectLiteral", "properties": properties })
}

/// `await <reference>.<method>(...arguments)`, or a direct call without a method.
pub fn service(reference: &str, method: Option<&str>, arguments: Vec<Value>) -> Value {
    let target = json!({ "kind": "ReferenceExpr", "name": reference });
    let callee = match method {
        Some(method) => prop(target, method),
        None => target,
    };
    json!({
        "kind": "AwaitExpr",
        "expression": { "kind": "CallExpr", "callee": callee, "arguments": arguments }
    })
}

/// `await $SFN.<method>(...arguments)`
pub fn sfn(method: &str, arguments: Vec<Value>) -> Value {
    json!({
        "kind": "AwaitExpr",
        "expression": { "kind": "CallExpr", "callee": prop(ident("$SFN"), method), "arguments": arguments }
    })
}

pub fn call(callee: Value, arguments: Vec<Value>) -> Value {
    json!({ "kind": "CallExpr", "callee": callee, "arguments": arguments })
}

pub fn var(name: &str, initializer: Value) -> Value {
    json!({ "kind": "VariableStmt", "name": name, "initializer": initializer })
}

pub fn declare(name: &str) -> Value {
    json!({ "kind": "VariableStmt", "name": name })
}

pub fn expr(expression: Value) -> Value {
    json!({ "kind": "ExprStmt", "expression": expression })
}

pub fn ret(expression: Value) -> Value {
    json!({ "kind": "ReturnStmt", "expression": expression })
}

pub fn throw_error(message: &str) -> Value {
    json!({
        "kind": "ThrowStmt",
        "expression": { "kind": "NewExpr", "callee": ident("Error"), "arguments": [string(message)] }
    })
}

pub fn compile_workflow_tree(tree: Value) -> Result<CompiledWorkflow, CompileError> {
    let (ast, root) = parse_tree(&tree).unwrap();
    let table = table();
    let config = CompilerConfig::default();
    let input = CompilationInput::new("flow", &ast, root, &table, &table, &config);
    compile_workflow(&input, &mut Namespace::new())
}

pub fn compile_resolver_tree(
    name: &str,
    tree: Value,
    namespace: &mut Namespace,
) -> Result<ResolverPipeline, CompileError> {
    let (ast, root) = parse_tree(&tree).unwrap();
    let table = table();
    let config = CompilerConfig::default();
    let input = CompilationInput::new(name, &ast, root, &table, &table, &config);
    compile_resolver(&input, namespace)
}

/// The serialized form of state `name` of `workflow`.
pub fn state_json(workflow: &CompiledWorkflow, name: &str) -> Value {
    let state = workflow
        .definition
        .state(name)
        .unwrap_or_else(|| panic!("no state named {name:?} in {:?}", workflow.definition.states.keys()));
    serde_json::to_value(state).unwrap()
}
