// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resolver pipeline compiler.
//!
//! A function body becomes an ordered list of pipeline stages, one per
//! top-level service call. Statements before a call are translated into that
//! stage's request template; the call's result is written to the stash by the
//! stage's response template; statements after the last call form the
//! pipeline's final response template.
//!
//! A body with no service calls compiles to a single stage without a data
//! source whose response template evaluates the whole body.

pub(crate) mod backends;
pub(crate) mod template;

use serde::Serialize;
use tracing::{debug, info};
use weft_ast::syntax::Block;
use weft_ast::{Ast, ControlFlow, NodeId, Syntax};

use crate::calls::{CallSite, call_site, find_service_call};
use crate::compile::{CompilationInput, parameter_name};
use crate::error::{CompileError, Result};
use crate::namespace::Namespace;
use template::{Buffer, Mode, RETURN_FLAG, RETURN_VALUE, Translator, return_guard, stash_put};

/// One request/response template pair bound to a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStage {
    pub name: String,
    /// `None` for a stage that calls no backend.
    pub data_source: Option<String>,
    pub request_template: String,
    pub response_template: String,
}

/// A compiled resolver: its stages plus the pipeline's own entry and exit
/// templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverPipeline {
    pub name: String,
    pub request_template: String,
    pub response_template: String,
    pub stages: Vec<PipelineStage>,
}

/// What a top-level call statement does with the call's result.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    Discard,
    Local(String),
    Return,
}

#[derive(Debug)]
struct StageCall {
    site: CallSite,
    binding: Binding,
}

/// Compile a function to a resolver pipeline.
pub fn compile_resolver(
    input: &CompilationInput<'_>,
    namespace: &mut Namespace,
) -> Result<ResolverPipeline> {
    let ast = input.ast;
    let (parameters, body) = input.function_parts()?;
    let context = parameters.first().and_then(|p| parameter_name(ast, *p));
    let statements = &ast.cast::<Block>(body)?.statements;

    let mut calls = Vec::with_capacity(statements.len());
    for stmt in statements {
        calls.push(classify(input, *stmt)?);
    }

    let pipeline = match calls.iter().rposition(Option::is_some) {
        None => single_template(input, namespace, context, statements)?,
        Some(last_call) => staged(input, namespace, context, statements, calls, last_call)?,
    };
    info!(
        resolver = input.name,
        stages = pipeline.stages.len(),
        "Compiled resolver pipeline"
    );
    Ok(pipeline)
}

/// Recognize a top-level statement that is a service call, and reject calls
/// in any other position.
fn classify(input: &CompilationInput<'_>, stmt: NodeId) -> Result<Option<StageCall>> {
    let ast = input.ast;
    let (expr, binding) = match ast.syntax(stmt) {
        Syntax::ExprStmt(s) => (Some(s.expression), Binding::Discard),
        Syntax::VariableStmt(s) => (s.initializer, Binding::Local(s.name.clone())),
        Syntax::ReturnStmt(s) => (s.expression, Binding::Return),
        _ => (None, Binding::Discard),
    };

    if let Some(expr) = expr
        && let Some(site) = call_site(ast, expr, input.resources)?
    {
        for arg in &site.call.arguments {
            if let Some(nested) = find_service_call(ast, *arg, input.resources)? {
                return Err(CompileError::UnsupportedCallPosition {
                    node: nested,
                    reason: "service calls cannot be nested in the arguments of another service call"
                        .to_string(),
                });
            }
        }
        return Ok(Some(StageCall { site, binding }));
    }

    if let Some(nested) = find_service_call(ast, stmt, input.resources)? {
        return Err(CompileError::UnsupportedCallPosition {
            node: nested,
            reason: format!(
                "a service call inside a {} cannot be split into pipeline stages",
                ast.kind(stmt)
            ),
        });
    }
    Ok(None)
}

fn single_template(
    input: &CompilationInput<'_>,
    namespace: &mut Namespace,
    context: Option<String>,
    statements: &[NodeId],
) -> Result<ResolverPipeline> {
    let cf = ControlFlow::new(input.ast);
    let mut translator = Translator::new(input, context, Mode::Direct);
    let mut response = Buffer::new();
    finish(input.ast, &cf, &mut translator, &mut response, statements, "$null")?;

    let stage = PipelineStage {
        name: namespace.unique_name(input.name),
        data_source: None,
        request_template: format!(
            r#"{{"version":"{}","payload":null}}"#,
            input.config.template_version
        ),
        response_template: response.render(),
    };
    debug!(resolver = input.name, stage = %stage.name, "Emitted local stage");
    Ok(ResolverPipeline {
        name: input.name.to_string(),
        request_template: "{}".to_string(),
        response_template: "$util.toJson($context.result)".to_string(),
        stages: vec![stage],
    })
}

fn staged(
    input: &CompilationInput<'_>,
    namespace: &mut Namespace,
    context: Option<String>,
    statements: &[NodeId],
    calls: Vec<Option<StageCall>>,
    last_call: usize,
) -> Result<ResolverPipeline> {
    let cf = ControlFlow::new(input.ast);
    let mut translator = Translator::new(input, context, Mode::Stash);
    let mut pending = Buffer::new();
    let mut stages = Vec::new();
    let mut returned = false;

    for (stmt, call) in statements.iter().zip(calls).take(last_call + 1) {
        match call {
            None => translator.statement(&mut pending, *stmt)?,
            Some(call) => {
                returned = call.binding == Binding::Return;
                let prefix = pending.take();
                stages.push(stage(input, namespace, &mut translator, prefix, call)?);
            }
        }
    }

    let mut response = Buffer::new();
    return_guard(&mut response);
    translator.set_returns_directly(true);
    let fallback = if returned {
        format!("$context.stash.{RETURN_VALUE}")
    } else {
        "$null".to_string()
    };
    finish(
        input.ast,
        &cf,
        &mut translator,
        &mut response,
        &statements[last_call + 1..],
        &fallback,
    )?;

    Ok(ResolverPipeline {
        name: input.name.to_string(),
        request_template: "{}".to_string(),
        response_template: response.render(),
        stages,
    })
}

fn stage(
    input: &CompilationInput<'_>,
    namespace: &mut Namespace,
    translator: &mut Translator<'_>,
    prefix: Buffer,
    call: StageCall,
) -> Result<PipelineStage> {
    let service = &call.site.call;

    let mut request = Buffer::new();
    return_guard(&mut request);
    request.append(prefix);
    backends::request(
        input.ast,
        translator,
        &mut request,
        service,
        &input.config.template_version,
    )?;

    let mut response = Buffer::new();
    backends::response_preamble(&mut response, service);
    let mut result = backends::result_root(service).to_string();
    for accessor in &call.site.accessors {
        result.push_str(&translator.accessor(&mut response, *accessor)?);
    }
    match &call.binding {
        Binding::Discard => {}
        Binding::Local(name) => translator.assign(&mut response, name, &result),
        Binding::Return => {
            response.line(stash_put(RETURN_FLAG, "true"));
            response.line(stash_put(RETURN_VALUE, &result));
        }
    }
    response.line("{}");

    let source = namespace.data_source(&service.reference, &service.resource);
    let name = namespace.unique_name(&format!("{}_{}", input.name, service.reference));
    debug!(
        resolver = input.name,
        stage = %name,
        data_source = %source.name,
        "Emitted pipeline stage"
    );
    Ok(PipelineStage {
        name,
        data_source: Some(source.name),
        request_template: request.render(),
        response_template: response.render(),
    })
}

/// Translate the trailing statements of a body, ending in the template's
/// output.
fn finish(
    ast: &Ast,
    cf: &ControlFlow<'_>,
    translator: &mut Translator<'_>,
    buf: &mut Buffer,
    trailing: &[NodeId],
    fallback: &str,
) -> Result<()> {
    let Some((last, rest)) = trailing.split_last() else {
        buf.line(format!("$util.toJson({fallback})"));
        return Ok(());
    };
    for stmt in rest {
        translator.statement(buf, *stmt)?;
    }
    if let Syntax::ReturnStmt(ret) = ast.syntax(*last) {
        let value = match ret.expression {
            Some(expr) => translator.expression(buf, expr)?,
            None => "$null".to_string(),
        };
        buf.line(format!("$util.toJson({value})"));
        return Ok(());
    }
    translator.statement(buf, *last)?;
    if !cf.is_terminal(*last) {
        buf.line("$util.toJson($null)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::resources::{BackendKind, Resource, ResourceTable};
    use serde_json::{Value, json};
    use weft_ast::parse_tree;

    fn handler(statements: Vec<Value>) -> Value {
        json!({
            "kind": "FunctionDecl",
            "name": "handler",
            "parameters": [{ "kind": "ParameterDecl", "name": "ctx" }],
            "body": { "kind": "Block", "statements": statements }
        })
    }

    fn compile(tree: Value) -> Result<ResolverPipeline> {
        let (ast, root) = parse_tree(&tree).unwrap();
        let table = ResourceTable::new()
            .with_resource("users", Resource::new(BackendKind::KeyValueStore, "Users"));
        let config = CompilerConfig::default();
        let input = CompilationInput::new("getUser", &ast, root, &table, &table, &config);
        compile_resolver(&input, &mut Namespace::new())
    }

    fn get_user() -> Value {
        json!({
            "kind": "AwaitExpr",
            "expression": {
                "kind": "CallExpr",
                "callee": {
                    "kind": "PropertyAccess",
                    "name": "getItem",
                    "expression": { "kind": "ReferenceExpr", "name": "users" }
                },
                "arguments": [{
                    "kind": "ObjectLiteral",
                    "properties": [{
                        "kind": "PropertyAssignment",
                        "name": { "kind": "Identifier", "name": "key" },
                        "value": {
                            "kind": "PropertyAccess",
                            "name": "arguments",
                            "expression": { "kind": "Identifier", "name": "ctx" }
                        }
                    }]
                }]
            }
        })
    }

    #[test]
    fn test_zero_calls_use_fixed_request() {
        let pipeline = compile(handler(vec![json!({
            "kind": "ReturnStmt",
            "expression": { "kind": "StringLiteral", "value": "ok" }
        })]))
        .unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        let stage = &pipeline.stages[0];
        assert_eq!(stage.request_template, r#"{"version":"2018-05-29","payload":null}"#);
        assert_eq!(stage.response_template, "$util.toJson('ok')");
        assert_eq!(stage.data_source, None);
    }

    #[test]
    fn test_single_call_returns_through_stash() {
        let pipeline = compile(handler(vec![json!({
            "kind": "ReturnStmt",
            "expression": get_user()
        })]))
        .unwrap();
        assert_eq!(pipeline.stages.len(), 1);
        let stage = &pipeline.stages[0];
        assert_eq!(stage.name, "getUser_users");
        assert_eq!(stage.data_source.as_deref(), Some("users_keyValueStore"));
        assert!(stage.request_template.contains("\"operation\": \"GetItem\""));
        assert!(
            stage
                .request_template
                .contains("\"key\": $util.dynamodb.toMapValuesJson($context.arguments)")
        );
        assert!(
            stage
                .response_template
                .contains("$util.qr($context.stash.put('return__val', $context.result))")
        );
        assert!(pipeline.response_template.ends_with("$util.toJson($context.stash.return__val)"));
    }

    #[test]
    fn test_call_in_condition_is_rejected() {
        let err = compile(handler(vec![json!({
            "kind": "IfStmt",
            "condition": get_user(),
            "thenStmt": { "kind": "Block", "statements": [] }
        })]))
        .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedCallPosition { .. }));
    }
}
