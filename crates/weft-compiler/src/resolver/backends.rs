// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request and response templates per backend kind.

use weft_ast::fold::static_key;
use weft_ast::syntax::ObjectLiteral;
use weft_ast::{Ast, Syntax};

use super::template::{Buffer, Translator};
use crate::calls::{KeyValueOp, ServiceCall, ServiceOp};
use crate::error::{CompileError, Result};

/// Key-value properties whose values are marshalled into typed attributes.
const ATTRIBUTE_MAPS: &[&str] = &["key", "attributeValues"];

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.0";

/// Write the request document of `call`, preceded by whatever its argument
/// translation needs.
pub(crate) fn request(
    ast: &Ast,
    translator: &mut Translator<'_>,
    buf: &mut Buffer,
    call: &ServiceCall,
    version: &str,
) -> Result<()> {
    match call.op {
        ServiceOp::KeyValue(op) => key_value_request(ast, translator, buf, call, op, version),
        ServiceOp::Invoke => {
            let payload = match call.arguments.first() {
                Some(arg) => translator.expression(buf, *arg)?,
                None => "$null".to_string(),
            };
            buf.line("{");
            buf.indent();
            buf.line(format!("\"version\": {},", json_string(version)));
            buf.line("\"operation\": \"Invoke\",");
            buf.line(format!("\"payload\": $util.toJson({payload})"));
            buf.dedent();
            buf.line("}");
            Ok(())
        }
        ServiceOp::StartExecution { sync } => {
            let input = match call.arguments.first() {
                Some(arg) => translator.expression(buf, *arg)?,
                None => "{}".to_string(),
            };
            let target = if sync {
                "AWSStepFunctions.StartSyncExecution"
            } else {
                "AWSStepFunctions.StartExecution"
            };
            buf.line("{");
            buf.indent();
            buf.line(format!("\"version\": {},", json_string(version)));
            buf.line("\"method\": \"POST\",");
            buf.line("\"resourcePath\": \"/\",");
            buf.line("\"params\": {");
            buf.indent();
            buf.line("\"headers\": {");
            buf.indent();
            buf.line(format!("\"content-type\": \"{JSON_CONTENT_TYPE}\","));
            buf.line(format!("\"x-amz-target\": \"{target}\""));
            buf.dedent();
            buf.line("},");
            buf.line("\"body\": {");
            buf.indent();
            buf.line(format!(
                "\"stateMachineArn\": {},",
                json_string(&call.resource.identifier)
            ));
            buf.line(format!("\"input\": $util.toJson($util.toJson({input}))"));
            buf.dedent();
            buf.line("}");
            buf.dedent();
            buf.line("}");
            buf.dedent();
            buf.line("}");
            Ok(())
        }
    }
}

fn key_value_request(
    ast: &Ast,
    translator: &mut Translator<'_>,
    buf: &mut Buffer,
    call: &ServiceCall,
    op: KeyValueOp,
    version: &str,
) -> Result<()> {
    let mut fields = Vec::new();
    if let Some(argument) = call.arguments.first() {
        let Some(object) = ast.try_cast::<ObjectLiteral>(*argument) else {
            return Err(CompileError::InvalidServiceCall {
                node: *argument,
                reason: format!("{op} expects an object literal argument"),
            });
        };
        for prop in &object.properties {
            let Syntax::PropertyAssignment(assignment) = ast.syntax(*prop) else {
                return Err(CompileError::InvalidServiceCall {
                    node: *prop,
                    reason: format!("{op} arguments cannot be spread"),
                });
            };
            let Some(key) = static_key(ast, assignment.name) else {
                return Err(CompileError::InvalidServiceCall {
                    node: assignment.name,
                    reason: format!("{op} argument keys must be static"),
                });
            };
            let value = translator.expression(buf, assignment.value)?;
            let rendered = if ATTRIBUTE_MAPS.contains(&key.as_str()) {
                format!("$util.dynamodb.toMapValuesJson({value})")
            } else {
                format!("$util.toJson({value})")
            };
            fields.push(format!("{}: {rendered}", json_string(&key)));
        }
    }

    buf.line("{");
    buf.indent();
    buf.line(format!("\"version\": {},", json_string(version)));
    let operation = format!("\"operation\": \"{}\"", op.operation());
    if fields.is_empty() {
        buf.line(operation);
    } else {
        buf.line(format!("{operation},"));
        let last = fields.len() - 1;
        for (index, field) in fields.into_iter().enumerate() {
            if index == last {
                buf.line(field);
            } else {
                buf.line(format!("{field},"));
            }
        }
    }
    buf.dedent();
    buf.line("}");
    Ok(())
}

/// Error checks that open the response template of `call`.
pub(crate) fn response_preamble(buf: &mut Buffer, call: &ServiceCall) {
    match call.op {
        ServiceOp::StartExecution { .. } => {
            buf.line("#if($context.result.statusCode == 200)");
            buf.indent();
            buf.line("#set($__result = $util.parseJson($context.result.body))");
            buf.dedent();
            buf.line("#else");
            buf.indent();
            buf.line("$util.error($context.result.body, \"StepFunctionsError\")");
            buf.dedent();
            buf.line("#end");
        }
        ServiceOp::KeyValue(_) | ServiceOp::Invoke => {
            buf.line("#if($context.error)");
            buf.indent();
            buf.line("$util.error($context.error.message, $context.error.type)");
            buf.dedent();
            buf.line("#end");
        }
    }
}

/// Template expression for the call's result once the preamble ran.
pub(crate) fn result_root(call: &ServiceCall) -> &'static str {
    match call.op {
        ServiceOp::StartExecution { sync: true } => "$util.parseJson($__result.output)",
        ServiceOp::StartExecution { sync: false } => "$__result",
        ServiceOp::KeyValue(_) | ServiceOp::Invoke => "$context.result",
    }
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
