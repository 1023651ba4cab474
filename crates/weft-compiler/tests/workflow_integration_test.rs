// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the state machine backend.

mod common;

use common::*;
use serde_json::json;
use weft_compiler::CompileError;
use weft_compiler::workflow::{State, Transition};

fn boolean(value: bool) -> serde_json::Value {
    json!({ "kind": "BooleanLiteral", "value": value })
}

// ============================================================================
// Control Flow
// ============================================================================

#[test]
fn test_if_else_choice_defaults_to_else_branch() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![json!({
            "kind": "IfStmt",
            "condition": binary(prop(ident("input"), "ok"), "===", boolean(true)),
            "thenStmt": block(vec![ret(string("yes"))]),
            "elseStmt": block(vec![ret(string("no"))])
        })],
    ))
    .unwrap();

    let initialize = workflow.definition.start().unwrap();
    assert_eq!(initialize.next(), Some("if(input.ok === true)"));
    assert_eq!(
        state_json(&workflow, "if(input.ok === true)"),
        json!({
            "Type": "Choice",
            "Choices": [{ "Variable": "$.input.ok", "BooleanEquals": true, "Next": "return 'yes'" }],
            "Default": "return 'no'"
        })
    );
    assert_eq!(
        state_json(&workflow, "return 'no'"),
        json!({ "Type": "Pass", "Result": "no", "End": true })
    );
}

#[test]
fn test_constant_condition_skips_the_choice() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            json!({
                "kind": "IfStmt",
                "condition": boolean(false),
                "thenStmt": block(vec![ret(string("never"))])
            }),
            ret(string("always")),
        ],
    ))
    .unwrap();

    assert_eq!(
        state_json(&workflow, "if(false)"),
        json!({ "Type": "Pass", "Next": "return 'always'" })
    );
}

#[test]
fn test_while_body_loops_back_to_the_check() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            var("attempts", num(0.0)),
            json!({
                "kind": "WhileStmt",
                "condition": binary(ident("attempts"), "<", num(3.0)),
                "body": block(vec![expr(service("notify", None, vec![ident("input")]))])
            }),
            ret(ident("attempts")),
        ],
    ))
    .unwrap();

    assert_eq!(
        state_json(&workflow, "attempts = 0"),
        json!({ "Type": "Pass", "Result": 0, "ResultPath": "$.attempts", "Next": "while (attempts < 3)" })
    );
    assert_eq!(
        state_json(&workflow, "while (attempts < 3)"),
        json!({
            "Type": "Choice",
            "Choices": [{ "Variable": "$.attempts", "NumericLessThan": 3, "Next": "notify(...)" }],
            "Default": "return attempts"
        })
    );
    let Some(State::Task(task)) = workflow.definition.state("notify(...)") else {
        panic!("expected a task state");
    };
    assert_eq!(task.transition, Transition::next("while (attempts < 3)"));
    assert_eq!(task.input_path.as_deref(), Some("$.input"));
}

#[test]
fn test_for_of_walks_the_items() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            json!({
                "kind": "ForOfStmt",
                "variable": declare("order"),
                "expression": prop(ident("input"), "orders"),
                "body": block(vec![expr(service("notify", None, vec![ident("order")]))])
            }),
            ret(string("done")),
        ],
    ))
    .unwrap();

    let entry = "for (order of input.orders)";
    assert_eq!(
        state_json(&workflow, entry),
        json!({
            "Type": "Pass",
            "InputPath": "$.input.orders",
            "ResultPath": "$.__iter0",
            "Next": format!("{entry} check")
        })
    );
    assert_eq!(
        state_json(&workflow, &format!("{entry} check")),
        json!({
            "Type": "Choice",
            "Choices": [{ "Variable": "$.__iter0[0]", "IsPresent": true, "Next": format!("{entry} item") }],
            "Default": "return 'done'"
        })
    );
    assert_eq!(
        state_json(&workflow, &format!("{entry} item")),
        json!({ "Type": "Pass", "InputPath": "$.__iter0[0]", "ResultPath": "$.order", "Next": "notify(...)" })
    );
    assert_eq!(workflow.definition.state("notify(...)").unwrap().next(), Some(format!("{entry} rest").as_str()));
    assert_eq!(
        state_json(&workflow, &format!("{entry} rest")),
        json!({
            "Type": "Pass",
            "InputPath": "$.__iter0[1:]",
            "ResultPath": "$.__iter0",
            "Next": format!("{entry} check")
        })
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_throw_routes_to_catch_variable() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![json!({
            "kind": "TryStmt",
            "tryBlock": block(vec![throw_error("boom")]),
            "catchClause": {
                "kind": "CatchClause",
                "variable": declare("err"),
                "block": block(vec![ret(ident("err"))])
            }
        })],
    ))
    .unwrap();

    assert_eq!(
        state_json(&workflow, "throw new Error('boom')"),
        json!({
            "Type": "Pass",
            "Parameters": { "Error": "Error", "Cause": "boom" },
            "ResultPath": "$.err",
            "Next": "return err"
        })
    );
}

#[test]
fn test_throw_through_finally_is_rethrown() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            json!({
                "kind": "TryStmt",
                "tryBlock": block(vec![throw_error("boom")]),
                "finallyBlock": { "kind": "Block", "isFinally": true, "statements": [var("cleaned", boolean(true))] }
            }),
            ret(string("ok")),
        ],
    ))
    .unwrap();

    assert_eq!(workflow.definition.state("Initialize").unwrap().next(), Some("try"));
    assert_eq!(
        state_json(&workflow, "try"),
        json!({ "Type": "Pass", "Result": null, "ResultPath": "$.__fnl0", "Next": "throw new Error('boom')" })
    );
    assert_eq!(
        state_json(&workflow, "throw new Error('boom')"),
        json!({
            "Type": "Pass",
            "Parameters": { "Error": "Error", "Cause": "boom" },
            "ResultPath": "$.__fnl0",
            "Next": "cleaned = true"
        })
    );
    assert_eq!(workflow.definition.state("cleaned = true").unwrap().next(), Some("finally"));
    assert_eq!(
        state_json(&workflow, "finally"),
        json!({
            "Type": "Choice",
            "Choices": [{
                "And": [
                    { "Variable": "$.__fnl0", "IsPresent": true },
                    { "Variable": "$.__fnl0", "IsNull": false }
                ],
                "Next": "finally raise"
            }],
            "Default": "return 'ok'"
        })
    );
    assert_eq!(
        state_json(&workflow, "finally raise"),
        json!({ "Type": "Fail", "ErrorPath": "$.__fnl0.Error", "CausePath": "$.__fnl0.Cause" })
    );
}

fn finally_block(statements: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "kind": "Block", "isFinally": true, "statements": statements })
}

fn while_loop(condition: serde_json::Value, body: Vec<serde_json::Value>) -> serde_json::Value {
    json!({ "kind": "WhileStmt", "condition": condition, "body": block(body) })
}

fn choice_next(workflow: &weft_compiler::CompiledWorkflow, name: &str) -> String {
    match workflow.definition.state(name) {
        Some(State::Choice(choice)) => choice.choices[0].next.clone(),
        other => panic!("expected a choice state for {name:?}, got {other:?}"),
    }
}

#[test]
fn test_finally_in_loop_clears_the_pending_error() {
    // while (input.go) {
    //   try { try { if (input.fail) throw new Error('boom') } finally { cleaned = true } }
    //   catch (e) { caught = true }
    // }
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            while_loop(
                prop(ident("input"), "go"),
                vec![json!({
                    "kind": "TryStmt",
                    "tryBlock": block(vec![json!({
                        "kind": "TryStmt",
                        "tryBlock": block(vec![json!({
                            "kind": "IfStmt",
                            "condition": prop(ident("input"), "fail"),
                            "thenStmt": throw_error("boom")
                        })]),
                        "finallyBlock": finally_block(vec![var("cleaned", boolean(true))])
                    })]),
                    "catchClause": {
                        "kind": "CatchClause",
                        "variable": declare("e"),
                        "block": block(vec![var("caught", boolean(true))])
                    }
                })],
            ),
            ret(string("done")),
        ],
    ))
    .unwrap();

    // Every pass through the loop enters the try statement with an empty slot.
    assert_eq!(choice_next(&workflow, "while (input.go)"), "try");
    assert_eq!(
        state_json(&workflow, "try"),
        json!({ "Type": "Pass", "Result": null, "ResultPath": "$.__fnl0", "Next": "if(input.fail)" })
    );
    assert_eq!(
        state_json(&workflow, "throw new Error('boom')"),
        json!({
            "Type": "Pass",
            "Parameters": { "Error": "Error", "Cause": "boom" },
            "ResultPath": "$.__fnl0",
            "Next": "cleaned = true"
        })
    );
    assert_eq!(choice_next(&workflow, "finally"), "finally raise");
    assert_eq!(
        state_json(&workflow, "finally raise"),
        json!({ "Type": "Pass", "InputPath": "$.__fnl0", "ResultPath": "$.e", "Next": "finally raise reset" })
    );
    assert_eq!(
        state_json(&workflow, "finally raise reset"),
        json!({ "Type": "Pass", "Result": null, "ResultPath": "$.__fnl0", "Next": "caught = true" })
    );
    assert_eq!(
        workflow.definition.state("caught = true").unwrap().next(),
        Some("while (input.go)")
    );
}

#[test]
fn test_finally_after_handled_task_error_reenters_clean() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![json!({
            "kind": "ForOfStmt",
            "variable": declare("order"),
            "expression": prop(ident("input"), "orders"),
            "body": block(vec![json!({
                "kind": "TryStmt",
                "tryBlock": block(vec![expr(service("notify", None, vec![ident("order")]))]),
                "finallyBlock": finally_block(vec![var("done", boolean(true))])
            })])
        })],
    ))
    .unwrap();

    let item = "for (order of input.orders) item";
    assert_eq!(workflow.definition.state(item).unwrap().next(), Some("try"));
    assert_eq!(
        state_json(&workflow, "try"),
        json!({ "Type": "Pass", "Result": null, "ResultPath": "$.__fnl1", "Next": "notify(...)" })
    );
    let task = state_json(&workflow, "notify(...)");
    assert_eq!(
        task["Catch"],
        json!([{ "ErrorEquals": ["States.ALL"], "Next": "done = true", "ResultPath": "$.__fnl1" }])
    );
    assert_eq!(task["Next"], json!("done = true"));
    let Some(State::Choice(finally)) = workflow.definition.state("finally") else {
        panic!("expected the rethrow choice");
    };
    assert_eq!(finally.default.as_deref(), Some("for (order of input.orders) rest"));
}

#[test]
fn test_break_out_of_try_with_finally_is_rejected() {
    let err = compile_workflow_tree(function(
        "input",
        vec![while_loop(
            boolean(true),
            vec![json!({
                "kind": "TryStmt",
                "tryBlock": block(vec![json!({ "kind": "BreakStmt" })]),
                "finallyBlock": finally_block(vec![var("cleaned", boolean(true))])
            })],
        )],
    ))
    .unwrap_err();
    assert!(
        matches!(err, CompileError::UnsupportedSyntax { ref reason, .. } if reason.contains("finally")),
        "{err}"
    );
}

#[test]
fn test_continue_out_of_catch_with_finally_is_rejected() {
    let err = compile_workflow_tree(function(
        "input",
        vec![while_loop(
            prop(ident("input"), "go"),
            vec![json!({
                "kind": "TryStmt",
                "tryBlock": block(vec![throw_error("boom")]),
                "catchClause": {
                    "kind": "CatchClause",
                    "block": block(vec![json!({ "kind": "ContinueStmt" })])
                },
                "finallyBlock": finally_block(vec![var("cleaned", boolean(true))])
            })],
        )],
    ))
    .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedSyntax { .. }), "{err}");
}

#[test]
fn test_break_inside_finally_leaves_the_loop() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            while_loop(
                prop(ident("input"), "go"),
                vec![json!({
                    "kind": "TryStmt",
                    "tryBlock": block(vec![var("started", boolean(true))]),
                    "finallyBlock": finally_block(vec![json!({ "kind": "BreakStmt" })])
                })],
            ),
            ret(string("stopped")),
        ],
    ))
    .unwrap();

    assert_eq!(workflow.definition.state("started = true").unwrap().next(), Some("break"));
    assert_eq!(
        state_json(&workflow, "break"),
        json!({ "Type": "Pass", "Next": "return 'stopped'" })
    );
}

#[test]
fn test_unhandled_throw_fails_the_execution() {
    let workflow = compile_workflow_tree(function("input", vec![throw_error("boom")])).unwrap();
    assert_eq!(
        state_json(&workflow, "throw new Error('boom')"),
        json!({ "Type": "Fail", "Error": "Error", "Cause": "boom" })
    );
}

#[test]
fn test_task_in_try_catches_all_errors() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![json!({
            "kind": "TryStmt",
            "tryBlock": block(vec![expr(service("notify", None, vec![ident("input")]))]),
            "catchClause": {
                "kind": "CatchClause",
                "variable": declare("err"),
                "block": block(vec![ret(string("failed"))])
            }
        })],
    ))
    .unwrap();

    let task = state_json(&workflow, "notify(...)");
    assert_eq!(
        task["Catch"],
        json!([{ "ErrorEquals": ["States.ALL"], "Next": "return 'failed'", "ResultPath": "$.err" }])
    );
    assert_eq!(task["ResultPath"], json!(null));
    assert_eq!(task["End"], json!(true));
}

// ============================================================================
// Intrinsics
// ============================================================================

fn map_call(options: Option<serde_json::Value>) -> serde_json::Value {
    let mut arguments = vec![prop(ident("input"), "items")];
    arguments.extend(options);
    arguments.push(arrow(
        &["item"],
        vec![declare("unused"), ret(service("notify", None, vec![ident("item")]))],
    ));
    sfn("map", arguments)
}

#[test]
fn test_map_with_concurrency() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![
            var("results", map_call(Some(object(&[("maxConcurrency", num(2.0))])))),
            ret(ident("results")),
        ],
    ))
    .unwrap();

    assert_eq!(
        state_json(&workflow, "results = SFN.map(...)"),
        json!({
            "Type": "Map",
            "ItemsPath": "$.input.items",
            "Parameters": { "item.$": "$$.Map.Item.Value" },
            "Iterator": {
                "StartAt": "return notify(...)",
                "States": {
                    "return notify(...)": {
                        "Type": "Task",
                        "Resource": "arn:aws:lambda:eu-west-1:1:function:notify",
                        "InputPath": "$.item",
                        "End": true
                    }
                }
            },
            "MaxConcurrency": 2,
            "ResultPath": "$.results",
            "Next": "return results"
        })
    );
}

#[test]
fn test_map_rejects_zero_concurrency() {
    let err = compile_workflow_tree(function(
        "input",
        vec![expr(map_call(Some(object(&[("maxConcurrency", num(0.0))]))))],
    ))
    .unwrap_err();
    assert!(matches!(err, CompileError::InvalidConcurrency { .. }), "{err}");
}

#[test]
fn test_map_rejects_unknown_option() {
    let err = compile_workflow_tree(function(
        "input",
        vec![expr(map_call(Some(object(&[("parallelism", num(2.0))]))))],
    ))
    .unwrap_err();
    assert!(matches!(err, CompileError::InvalidConcurrency { .. }), "{err}");
}

#[test]
fn test_parallel_branches() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![ret(sfn(
            "parallel",
            vec![arrow(&[], vec![ret(num(1.0))]), arrow(&[], vec![ret(num(2.0))])],
        ))],
    ))
    .unwrap();

    let Some(State::Parallel(parallel)) = workflow.definition.state("return SFN.parallel(...)") else {
        panic!("expected a parallel state");
    };
    assert_eq!(parallel.branches.len(), 2);
    assert_eq!(parallel.branches[0].start_at, "return 1");
    assert_eq!(parallel.branches[1].start_at, "return 2");
    assert!(parallel.transition.is_end());
}

#[test]
fn test_parallel_rejects_non_function_branch() {
    let err = compile_workflow_tree(function(
        "input",
        vec![expr(sfn("parallel", vec![ident("input")]))],
    ))
    .unwrap_err();
    assert!(matches!(err, CompileError::InvalidBranch { .. }), "{err}");

    let err = compile_workflow_tree(function("input", vec![expr(sfn("parallel", vec![]))])).unwrap_err();
    assert!(matches!(err, CompileError::InvalidBranch { .. }), "{err}");
}

#[test]
fn test_wait_for_seconds() {
    let workflow = compile_workflow_tree(function(
        "input",
        vec![expr(sfn("waitFor", vec![num(30.0)])), ret(ident("input"))],
    ))
    .unwrap();
    assert_eq!(
        state_json(&workflow, "SFN.waitFor(...)"),
        json!({ "Type": "Wait", "Seconds": 30, "Next": "return input" })
    );
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_resolver_utility_is_a_context_mismatch() {
    let err = compile_workflow_tree(function(
        "input",
        vec![ret(call(prop(ident("$util"), "toJson"), vec![ident("input")]))],
    ))
    .unwrap_err();
    assert!(matches!(
        err,
        CompileError::ContextMismatch { ref construct, expected: "resolver", .. } if construct == "$util.toJson"
    ));
}

#[test]
fn test_service_call_inside_expression_is_rejected() {
    let err = compile_workflow_tree(function(
        "input",
        vec![ret(call(
            prop(ident("JSON"), "stringify"),
            vec![service("notify", None, vec![ident("input")])],
        ))],
    ))
    .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedCallPosition { .. }), "{err}");
}

#[test]
fn test_service_call_nested_in_arguments_is_rejected() {
    let lookup = service("orders", Some("getItem"), vec![object(&[("key", ident("input"))])]);
    let err = compile_workflow_tree(function(
        "input",
        vec![expr(service("notify", None, vec![object(&[("order", lookup)])]))],
    ))
    .unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedCallPosition { .. }), "{err}");
}
