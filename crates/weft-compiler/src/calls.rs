// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recognition of service calls and workflow intrinsics.

use weft_ast::syntax::{CallExpr, Identifier, PropertyAccess};
use weft_ast::{Ast, NodeId, Syntax};

use crate::error::{CompileError, Result};
use crate::resources::{BackendKind, Resource, ResourceResolver};

/// Identifier carrying mapping template utilities.
pub const UTIL: &str = "$util";
/// Identifier carrying workflow intrinsics.
pub const SFN: &str = "$SFN";

/// Item operations of a key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum KeyValueOp {
    GetItem,
    PutItem,
    UpdateItem,
    DeleteItem,
    Query,
    Scan,
}

impl KeyValueOp {
    /// Operation name in a resolver request template.
    pub fn operation(self) -> &'static str {
        match self {
            KeyValueOp::GetItem => "GetItem",
            KeyValueOp::PutItem => "PutItem",
            KeyValueOp::UpdateItem => "UpdateItem",
            KeyValueOp::DeleteItem => "DeleteItem",
            KeyValueOp::Query => "Query",
            KeyValueOp::Scan => "Scan",
        }
    }
}

/// What a service call does, once its backend is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOp {
    KeyValue(KeyValueOp),
    Invoke,
    StartExecution { sync: bool },
}

/// A call on a resolved backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    /// The call expression.
    pub node: NodeId,
    pub reference: String,
    pub resource: Resource,
    pub op: ServiceOp,
    pub arguments: Vec<NodeId>,
}

/// A service call plus the member accesses applied to its result, innermost
/// first: `(await t.getItem(k)).Item.name` has accessors `.Item`, `.name`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    pub call: ServiceCall,
    pub accessors: Vec<NodeId>,
}

/// Workflow intrinsics on `$SFN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum Intrinsic {
    WaitFor,
    WaitUntil,
    Map,
    ForEach,
    Parallel,
}

/// Skip any number of `await` wrappers.
pub fn strip_await(ast: &Ast, mut expr: NodeId) -> NodeId {
    while let Syntax::AwaitExpr(inner) = ast.syntax(expr) {
        expr = inner.expression;
    }
    expr
}

/// Recognize `expr` as a call on a referenced resource.
pub fn service_call(
    ast: &Ast,
    expr: NodeId,
    resolver: &dyn ResourceResolver,
) -> Result<Option<ServiceCall>> {
    let expr = strip_await(ast, expr);
    let Some(call) = ast.try_cast::<CallExpr>(expr) else {
        return Ok(None);
    };
    let (reference, method) = match ast.syntax(call.callee) {
        Syntax::ReferenceExpr(reference) => (reference.name.clone(), None),
        Syntax::PropertyAccess(PropertyAccess {
            expression, name, ..
        }) => match ast.syntax(*expression) {
            Syntax::ReferenceExpr(reference) => (reference.name.clone(), Some(name.clone())),
            _ => return Ok(None),
        },
        _ => return Ok(None),
    };
    let resource = resolver
        .resolve(&reference)
        .ok_or_else(|| CompileError::UnknownResource {
            node: call.callee,
            name: reference.clone(),
        })?;
    let op = service_op(expr, &resource, method.as_deref())?;
    Ok(Some(ServiceCall {
        node: expr,
        reference,
        resource,
        op,
        arguments: call.arguments.clone(),
    }))
}

fn service_op(node: NodeId, resource: &Resource, method: Option<&str>) -> Result<ServiceOp> {
    let invalid = |reason: String| CompileError::InvalidServiceCall { node, reason };
    match (resource.kind, method) {
        (BackendKind::KeyValueStore, Some(method)) => method
            .parse::<KeyValueOp>()
            .map(ServiceOp::KeyValue)
            .map_err(|_| invalid(format!("'{method}' is not a key-value store operation"))),
        (BackendKind::KeyValueStore, None) => Err(invalid(
            "a key-value store is not callable; call one of its operations".to_string(),
        )),
        (BackendKind::ComputeFunction, None | Some("invoke")) => Ok(ServiceOp::Invoke),
        (BackendKind::WorkflowOrchestrator, None) => Ok(ServiceOp::StartExecution {
            sync: resource.express,
        }),
        (BackendKind::WorkflowOrchestrator, Some("startExecution")) => {
            Ok(ServiceOp::StartExecution { sync: false })
        }
        (BackendKind::WorkflowOrchestrator, Some("startSyncExecution")) => {
            if !resource.express {
                return Err(invalid(format!(
                    "'{}' is a standard state machine and cannot be started synchronously",
                    resource.identifier
                )));
            }
            Ok(ServiceOp::StartExecution { sync: true })
        }
        (kind, Some(method)) => Err(invalid(format!("'{method}' is not an operation of a {kind}"))),
    }
}

/// Recognize `expr` as a service call, optionally followed by member
/// accesses on its result.
pub fn call_site(ast: &Ast, expr: NodeId, resolver: &dyn ResourceResolver) -> Result<Option<CallSite>> {
    let mut accessors = Vec::new();
    let mut current = strip_await(ast, expr);
    loop {
        match ast.syntax(current) {
            Syntax::PropertyAccess(access) => {
                accessors.push(current);
                current = strip_await(ast, access.expression);
            }
            Syntax::ElementAccess(access) => {
                accessors.push(current);
                current = strip_await(ast, access.expression);
            }
            _ => break,
        }
    }
    let Some(call) = service_call(ast, current, resolver)? else {
        return Ok(None);
    };
    accessors.reverse();
    Ok(Some(CallSite { call, accessors }))
}

/// First service call at or under `node`, in source order.
pub fn find_service_call(
    ast: &Ast,
    node: NodeId,
    resolver: &dyn ResourceResolver,
) -> Result<Option<NodeId>> {
    if service_call(ast, node, resolver)?.is_some() {
        return Ok(Some(strip_await(ast, node)));
    }
    let candidates = ast.collect_children(node, |ast, id| ast.try_cast::<CallExpr>(id).map(|_| id));
    for candidate in candidates {
        if service_call(ast, candidate, resolver)?.is_some() {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Recognize `$SFN.<method>(...)`, returning the intrinsic and the call.
pub fn intrinsic(ast: &Ast, expr: NodeId) -> Result<Option<(Intrinsic, NodeId)>> {
    let expr = strip_await(ast, expr);
    let Some(call) = ast.try_cast::<CallExpr>(expr) else {
        return Ok(None);
    };
    let Some(access) = ast.try_cast::<PropertyAccess>(call.callee) else {
        return Ok(None);
    };
    match ast.try_cast::<Identifier>(access.expression) {
        Some(ident) if ident.name == SFN => access
            .name
            .parse::<Intrinsic>()
            .map(|intrinsic| Some((intrinsic, expr)))
            .map_err(|_| CompileError::InvalidServiceCall {
                node: expr,
                reason: format!("'{SFN}.{}' is not a workflow intrinsic", access.name),
            }),
        _ => Ok(None),
    }
}

/// First identifier named `name` at or under `node`.
pub fn find_identifier(ast: &Ast, node: NodeId, name: &str) -> Option<NodeId> {
    let matches = |ast: &Ast, id: NodeId| ast.try_cast::<Identifier>(id).is_some_and(|i| i.name == name);
    if matches(ast, node) {
        return Some(node);
    }
    ast.collect_children(node, |ast, id| matches(ast, id).then_some(id))
        .into_iter()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceTable;
    use serde_json::json;
    use weft_ast::parse_tree;

    fn table() -> ResourceTable {
        ResourceTable::new()
            .with_resource("orders", Resource::new(BackendKind::KeyValueStore, "Orders"))
            .with_resource("notify", Resource::new(BackendKind::ComputeFunction, "arn:fn"))
            .with_resource(
                "checkout",
                Resource::new(BackendKind::WorkflowOrchestrator, "arn:sm").express(),
            )
    }

    fn method_call(reference: &str, method: &str) -> serde_json::Value {
        json!({
            "kind": "CallExpr",
            "callee": {
                "kind": "PropertyAccess",
                "name": method,
                "expression": { "kind": "ReferenceExpr", "name": reference }
            },
            "arguments": []
        })
    }

    #[test]
    fn test_recognizes_key_value_operation_through_await() {
        let (ast, root) = parse_tree(&json!({
            "kind": "AwaitExpr",
            "expression": method_call("orders", "getItem")
        }))
        .unwrap();
        let call = service_call(&ast, root, &table()).unwrap().unwrap();
        assert_eq!(call.op, ServiceOp::KeyValue(KeyValueOp::GetItem));
        assert_eq!(call.reference, "orders");
    }

    #[test]
    fn test_call_site_collects_accessors() {
        let (ast, root) = parse_tree(&json!({
            "kind": "PropertyAccess",
            "name": "Item",
            "expression": { "kind": "AwaitExpr", "expression": method_call("orders", "getItem") }
        }))
        .unwrap();
        let site = call_site(&ast, root, &table()).unwrap().unwrap();
        assert_eq!(site.accessors, vec![root]);
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let (ast, root) = parse_tree(&method_call("orders", "truncate")).unwrap();
        assert!(matches!(
            service_call(&ast, root, &table()),
            Err(CompileError::InvalidServiceCall { .. })
        ));

        let (ast, root) = parse_tree(&method_call("missing", "getItem")).unwrap();
        assert!(matches!(
            service_call(&ast, root, &table()),
            Err(CompileError::UnknownResource { name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn test_express_machine_starts_synchronously() {
        let (ast, root) = parse_tree(&json!({
            "kind": "CallExpr",
            "callee": { "kind": "ReferenceExpr", "name": "checkout" },
            "arguments": []
        }))
        .unwrap();
        let call = service_call(&ast, root, &table()).unwrap().unwrap();
        assert_eq!(call.op, ServiceOp::StartExecution { sync: true });
    }

    #[test]
    fn test_intrinsic_recognition() {
        let (ast, root) = parse_tree(&json!({
            "kind": "CallExpr",
            "callee": {
                "kind": "PropertyAccess",
                "name": "waitFor",
                "expression": { "kind": "Identifier", "name": "$SFN" }
            },
            "arguments": [{ "kind": "NumberLiteral", "value": 5 }]
        }))
        .unwrap();
        assert_eq!(intrinsic(&ast, root).unwrap(), Some((Intrinsic::WaitFor, root)));
        assert!(find_identifier(&ast, root, SFN).is_some());
        assert!(find_identifier(&ast, root, UTIL).is_none());
    }
}
