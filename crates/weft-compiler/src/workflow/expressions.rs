// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Expressions as state data and choice conditions.
//!
//! Every workflow variable lives at `$.<name>` of the state document, so an
//! expression lowers to a literal, a path into the state, a payload template
//! with `.$` keys, or an intrinsic function call.

use serde_json::{Map, Number, Value};
use weft_ast::fold::{PathSegment, ReferencePath, get_reference_path, static_key};
use weft_ast::syntax::{ArrayLiteral, BinaryExpr, CallExpr, ObjectLiteral, TemplateExpr};
use weft_ast::{BinaryOp, NodeId, Syntax, UnaryOp, eval_to_constant, to_json};

use super::compiler::WorkflowCompiler;
use super::states::{Condition, Test};
use crate::calls::{SFN, UTIL, intrinsic, service_call};
use crate::error::{CompileError, Result};

/// A value computed by a state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Data {
    Literal(Value),
    /// Path into the state document.
    Path(String),
    /// Payload template; keys ending in `.$` hold paths.
    Object(Map<String, Value>),
    /// Intrinsic function call such as `States.Format(...)`.
    Intrinsic(String),
}

impl Data {
    /// Add this value as field `key` of a payload template.
    pub(crate) fn insert_into(self, template: &mut Map<String, Value>, key: &str) {
        match self {
            Data::Literal(value) => {
                template.insert(key.to_string(), value);
            }
            Data::Object(fields) => {
                template.insert(key.to_string(), Value::Object(fields));
            }
            Data::Path(path) | Data::Intrinsic(path) => {
                template.insert(format!("{key}.$"), Value::String(path));
            }
        }
    }
}

/// A choice condition, or its value when known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cond {
    Constant(bool),
    Rule(Condition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl Relation {
    /// Relation for `op` and whether the result must be negated.
    fn of(op: BinaryOp) -> Option<(Relation, bool)> {
        match op {
            BinaryOp::Eq | BinaryOp::StrictEq => Some((Relation::Eq, false)),
            BinaryOp::NotEq | BinaryOp::StrictNotEq => Some((Relation::Eq, true)),
            BinaryOp::Lt => Some((Relation::Lt, false)),
            BinaryOp::LtEq => Some((Relation::LtEq, false)),
            BinaryOp::Gt => Some((Relation::Gt, false)),
            BinaryOp::GtEq => Some((Relation::GtEq, false)),
            _ => None,
        }
    }

    /// The relation with its operands swapped.
    fn flip(self) -> Self {
        match self {
            Relation::Eq => Relation::Eq,
            Relation::Lt => Relation::Gt,
            Relation::LtEq => Relation::GtEq,
            Relation::Gt => Relation::Lt,
            Relation::GtEq => Relation::LtEq,
        }
    }

    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Relation::Eq => ordering == Equal,
            Relation::Lt => ordering == Less,
            Relation::LtEq => ordering != Greater,
            Relation::Gt => ordering == Greater,
            Relation::GtEq => ordering != Less,
        }
    }

    fn string(self, value: String) -> Test {
        match self {
            Relation::Eq => Test::StringEquals(value),
            Relation::Lt => Test::StringLessThan(value),
            Relation::LtEq => Test::StringLessThanEquals(value),
            Relation::Gt => Test::StringGreaterThan(value),
            Relation::GtEq => Test::StringGreaterThanEquals(value),
        }
    }

    fn string_path(self, path: String) -> Test {
        match self {
            Relation::Eq => Test::StringEqualsPath(path),
            Relation::Lt => Test::StringLessThanPath(path),
            Relation::LtEq => Test::StringLessThanEqualsPath(path),
            Relation::Gt => Test::StringGreaterThanPath(path),
            Relation::GtEq => Test::StringGreaterThanEqualsPath(path),
        }
    }

    fn numeric(self, value: Number) -> Test {
        match self {
            Relation::Eq => Test::NumericEquals(value),
            Relation::Lt => Test::NumericLessThan(value),
            Relation::LtEq => Test::NumericLessThanEquals(value),
            Relation::Gt => Test::NumericGreaterThan(value),
            Relation::GtEq => Test::NumericGreaterThanEquals(value),
        }
    }

    fn numeric_path(self, path: String) -> Test {
        match self {
            Relation::Eq => Test::NumericEqualsPath(path),
            Relation::Lt => Test::NumericLessThanPath(path),
            Relation::LtEq => Test::NumericLessThanEqualsPath(path),
            Relation::Gt => Test::NumericGreaterThanPath(path),
            Relation::GtEq => Test::NumericGreaterThanEqualsPath(path),
        }
    }
}

/// Path of a workflow variable.
pub(crate) fn variable_path(name: &str) -> String {
    format!("$.{name}")
}

/// `base` followed by `segments`, e.g. `$.item` + `Item.id` gives `$.item.Item.id`.
pub(crate) fn join_path(base: &str, root: NodeId, segments: &[PathSegment]) -> String {
    ReferencePath {
        identity: String::new(),
        root,
        path: segments.to_vec(),
    }
    .append_to(base)
}

/// Quote `text` as an intrinsic function string argument.
fn intrinsic_string(text: &str) -> String {
    format!("'{}'", escape_intrinsic(text))
}

fn escape_intrinsic(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\'' | '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl WorkflowCompiler<'_> {
    /// Lower `expr` to a value of the state document.
    pub(crate) fn data(&self, expr: NodeId) -> Result<Data> {
        let ast = self.ast;
        if let Some(constant) = eval_to_constant(ast, expr, self.input.references) {
            return Ok(Data::Literal(to_json(&constant)));
        }
        match ast.syntax(expr) {
            Syntax::AwaitExpr(inner) => self.data(inner.expression),
            Syntax::Identifier(ident) => self.identifier(expr, &ident.name),
            Syntax::ReferenceExpr(reference) => match self.input.resources.resolve(&reference.name) {
                Some(_) => Err(CompileError::unsupported(
                    ast,
                    expr,
                    format!("'{}' can only be called", reference.name),
                )),
                None => Err(CompileError::UnknownResource {
                    node: expr,
                    name: reference.name.clone(),
                }),
            },
            Syntax::PropertyAccess(_) | Syntax::ElementAccess(_) => self.member(expr),
            Syntax::TemplateExpr(template) => self.format(template),
            Syntax::BinaryExpr(binary) => self.arithmetic(expr, binary),
            Syntax::ObjectLiteral(object) => self.object(object).map(Data::Object),
            Syntax::ArrayLiteral(array) => self.array(array),
            Syntax::CallExpr(call) => self.call(expr, call),
            _ => Err(CompileError::unsupported(
                ast,
                expr,
                "expression has no state machine translation",
            )),
        }
    }

    fn identifier(&self, node: NodeId, name: &str) -> Result<Data> {
        match name {
            UTIL => Err(CompileError::ContextMismatch {
                node,
                construct: UTIL.to_string(),
                expected: "resolver",
            }),
            SFN => Err(CompileError::unsupported(
                self.ast,
                node,
                format!("'{SFN}' intrinsics must be called"),
            )),
            "undefined" => Ok(Data::Literal(Value::Null)),
            _ => Ok(Data::Path(variable_path(name))),
        }
    }

    fn member(&self, expr: NodeId) -> Result<Data> {
        let ast = self.ast;
        if let Some(mut reference) = get_reference_path(ast, expr) {
            let Data::Path(root) = self.identifier(reference.root, &reference.identity)? else {
                return Err(CompileError::unsupported(ast, expr, "member of a constant"));
            };
            if reference.path.last() == Some(&PathSegment::Key("length".to_string())) {
                reference.path.pop();
                return Ok(Data::Intrinsic(format!(
                    "States.ArrayLength({})",
                    reference.append_to(&root)
                )));
            }
            return Ok(Data::Path(reference.append_to(&root)));
        }
        match ast.syntax(expr) {
            Syntax::ElementAccess(access) => {
                let base = self.intrinsic_argument(access.expression, self.data(access.expression)?)?;
                let index = self.intrinsic_argument(access.element, self.data(access.element)?)?;
                Ok(Data::Intrinsic(format!("States.ArrayGetItem({base}, {index})")))
            }
            Syntax::PropertyAccess(access) => {
                self.data(access.expression)?;
                Err(CompileError::unsupported(
                    ast,
                    expr,
                    "properties can only be read from variables",
                ))
            }
            _ => Err(CompileError::unsupported(ast, expr, "not a member access")),
        }
    }

    fn format(&self, template: &TemplateExpr) -> Result<Data> {
        let mut text = escape_intrinsic(&template.head);
        let mut arguments = Vec::new();
        for span in &template.spans {
            match self.data(span.expression)? {
                Data::Literal(Value::String(s)) => text.push_str(&escape_intrinsic(&s)),
                Data::Literal(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => {
                    text.push_str(&value.to_string())
                }
                data => {
                    text.push_str("{}");
                    arguments.push(self.intrinsic_argument(span.expression, data)?);
                }
            }
            text.push_str(&escape_intrinsic(&span.literal));
        }
        if arguments.is_empty() {
            return Ok(Data::Literal(Value::String(text)));
        }
        Ok(Data::Intrinsic(format!(
            "States.Format('{text}', {})",
            arguments.join(", ")
        )))
    }

    fn arithmetic(&self, expr: NodeId, binary: &BinaryExpr) -> Result<Data> {
        let ast = self.ast;
        let left = self.data(binary.left)?;
        let right = self.data(binary.right)?;
        let is_text = |data: &Data| match data {
            Data::Literal(Value::String(_)) => true,
            Data::Intrinsic(call) => call.starts_with("States.Format("),
            _ => false,
        };
        match binary.operator {
            BinaryOp::Add if is_text(&left) || is_text(&right) => {
                let left = self.intrinsic_argument(binary.left, left)?;
                let right = self.intrinsic_argument(binary.right, right)?;
                Ok(Data::Intrinsic(format!("States.Format('{{}}{{}}', {left}, {right})")))
            }
            BinaryOp::Add => {
                let left = self.intrinsic_argument(binary.left, left)?;
                let right = self.intrinsic_argument(binary.right, right)?;
                Ok(Data::Intrinsic(format!("States.MathAdd({left}, {right})")))
            }
            BinaryOp::Sub => match right {
                Data::Literal(Value::Number(n)) => {
                    let negated = n
                        .as_f64()
                        .map(|n| weft_ast::fold::number_to_json(-n))
                        .unwrap_or(Value::Null);
                    let left = self.intrinsic_argument(binary.left, left)?;
                    Ok(Data::Intrinsic(format!("States.MathAdd({left}, {negated})")))
                }
                _ => Err(CompileError::unsupported(
                    ast,
                    expr,
                    "only constants can be subtracted",
                )),
            },
            BinaryOp::Coalesce | BinaryOp::And | BinaryOp::Or => Err(CompileError::unsupported(
                ast,
                expr,
                "logical operators are only supported in conditions",
            )),
            op if op.is_comparison() => Err(CompileError::unsupported(
                ast,
                expr,
                "comparisons are only supported in conditions",
            )),
            op => Err(CompileError::unsupported(
                ast,
                expr,
                format!("operator '{op}' has no state machine translation"),
            )),
        }
    }

    /// Payload template for an object literal.
    pub(crate) fn object(&self, object: &ObjectLiteral) -> Result<Map<String, Value>> {
        let ast = self.ast;
        let mut fields = Map::new();
        for prop in &object.properties {
            let Syntax::PropertyAssignment(assignment) = ast.syntax(*prop) else {
                return Err(CompileError::unsupported(
                    ast,
                    *prop,
                    "object spread has no state machine translation",
                ));
            };
            let Some(key) = static_key(ast, assignment.name) else {
                return Err(CompileError::unsupported(
                    ast,
                    assignment.name,
                    "computed keys must be constant",
                ));
            };
            self.data(assignment.value)?.insert_into(&mut fields, &key);
        }
        Ok(fields)
    }

    fn array(&self, array: &ArrayLiteral) -> Result<Data> {
        let arguments = array
            .elements
            .iter()
            .map(|element| self.intrinsic_argument(*element, self.data(*element)?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Data::Intrinsic(format!("States.Array({})", arguments.join(", "))))
    }

    fn call(&self, expr: NodeId, call: &CallExpr) -> Result<Data> {
        let ast = self.ast;
        if let Some(service) = service_call(ast, expr, self.input.resources)? {
            return Err(CompileError::UnsupportedCallPosition {
                node: service.node,
                reason: "a service call must be the whole initializer, expression or return value of a statement".to_string(),
            });
        }
        if intrinsic(ast, expr)?.is_some() {
            return Err(CompileError::UnsupportedCallPosition {
                node: expr,
                reason: format!("'{SFN}' intrinsics must be the whole initializer, expression or return value of a statement"),
            });
        }
        let (base, method) = match ast.syntax(call.callee) {
            Syntax::PropertyAccess(access) => match ast.syntax(access.expression) {
                Syntax::Identifier(ident) => (ident.name.as_str(), access.name.as_str()),
                _ => ("", access.name.as_str()),
            },
            _ => ("", ""),
        };
        let function = match (base, method) {
            (UTIL, method) => {
                return Err(CompileError::ContextMismatch {
                    node: expr,
                    construct: format!("{UTIL}.{method}"),
                    expected: "resolver",
                });
            }
            ("JSON", "stringify") => "States.JsonToString",
            ("JSON", "parse") => "States.StringToJson",
            _ => {
                return Err(CompileError::unsupported(
                    ast,
                    expr,
                    "only service calls, JSON.stringify and JSON.parse can be called",
                ));
            }
        };
        let [argument] = call.arguments.as_slice() else {
            return Err(CompileError::unsupported(ast, expr, "expected a single argument"));
        };
        let argument = self.intrinsic_argument(*argument, self.data(*argument)?)?;
        Ok(Data::Intrinsic(format!("{function}({argument})")))
    }

    fn intrinsic_argument(&self, node: NodeId, data: Data) -> Result<String> {
        match data {
            Data::Literal(Value::String(s)) => Ok(intrinsic_string(&s)),
            Data::Literal(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => {
                Ok(value.to_string())
            }
            Data::Path(path) | Data::Intrinsic(path) => Ok(path),
            Data::Literal(_) | Data::Object(_) => Err(CompileError::unsupported(
                self.ast,
                node,
                "objects and arrays cannot be passed to intrinsic functions",
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------------

    /// Lower `expr` to a choice condition.
    pub(crate) fn condition(&self, expr: NodeId) -> Result<Cond> {
        let ast = self.ast;
        if let Some(constant) = eval_to_constant(ast, expr, self.input.references) {
            return Ok(Cond::Constant(constant.is_truthy()));
        }
        match ast.syntax(expr) {
            Syntax::AwaitExpr(inner) => self.condition(inner.expression),
            Syntax::UnaryExpr(unary) if unary.operator == UnaryOp::Not => {
                Ok(match self.condition(unary.operand)? {
                    Cond::Constant(value) => Cond::Constant(!value),
                    Cond::Rule(rule) => Cond::Rule(rule.negate()),
                })
            }
            Syntax::BinaryExpr(binary) if binary.operator == BinaryOp::And => {
                let left = self.condition(binary.left)?;
                let right = self.condition(binary.right)?;
                Ok(match (left, right) {
                    (Cond::Constant(false), _) | (_, Cond::Constant(false)) => Cond::Constant(false),
                    (Cond::Constant(true), other) | (other, Cond::Constant(true)) => other,
                    (Cond::Rule(l), Cond::Rule(r)) => Cond::Rule(Condition::and(vec![l, r])),
                })
            }
            Syntax::BinaryExpr(binary) if binary.operator == BinaryOp::Or => {
                let left = self.condition(binary.left)?;
                let right = self.condition(binary.right)?;
                Ok(match (left, right) {
                    (Cond::Constant(true), _) | (_, Cond::Constant(true)) => Cond::Constant(true),
                    (Cond::Constant(false), other) | (other, Cond::Constant(false)) => other,
                    (Cond::Rule(l), Cond::Rule(r)) => Cond::Rule(Condition::or(vec![l, r])),
                })
            }
            Syntax::BinaryExpr(binary) if binary.operator.is_comparison() => {
                self.comparison(expr, binary)
            }
            _ => match self.data(expr)? {
                Data::Path(path) => Ok(Cond::Rule(truthy(&path))),
                _ => Err(CompileError::unsupported(
                    ast,
                    expr,
                    "conditions must test variables",
                )),
            },
        }
    }

    fn comparison(&self, expr: NodeId, binary: &BinaryExpr) -> Result<Cond> {
        let ast = self.ast;
        let Some((relation, negated)) = Relation::of(binary.operator) else {
            return Err(CompileError::unsupported(ast, expr, "not a comparison"));
        };
        let left = self.data(binary.left)?;
        let right = self.data(binary.right)?;
        let cond = match (left, right) {
            (Data::Literal(l), Data::Literal(r)) => Cond::Constant(compare_literals(relation, &l, &r)),
            (Data::Path(path), Data::Literal(value)) => {
                Cond::Rule(self.literal_test(expr, relation, path, value)?)
            }
            (Data::Literal(value), Data::Path(path)) => {
                Cond::Rule(self.literal_test(expr, relation.flip(), path, value)?)
            }
            (Data::Path(left), Data::Path(right)) => Cond::Rule(path_test(relation, left, right)),
            _ => {
                return Err(CompileError::unsupported(
                    ast,
                    expr,
                    "comparisons must be between variables and constants",
                ));
            }
        };
        Ok(match (cond, negated) {
            (cond, false) => cond,
            (Cond::Constant(value), true) => Cond::Constant(!value),
            (Cond::Rule(rule), true) => Cond::Rule(rule.negate()),
        })
    }

    fn literal_test(&self, expr: NodeId, relation: Relation, path: String, value: Value) -> Result<Condition> {
        let unsupported = |reason: &str| CompileError::unsupported(self.ast, expr, reason);
        match value {
            Value::Null if relation == Relation::Eq => Ok(Condition::or(vec![
                Condition::test(path.clone(), Test::IsPresent(false)),
                Condition::test(path, Test::IsNull(true)),
            ])),
            Value::Bool(b) if relation == Relation::Eq => {
                Ok(Condition::test(path, Test::BooleanEquals(b)))
            }
            Value::String(s) => Ok(Condition::test(path, relation.string(s))),
            Value::Number(n) => Ok(Condition::test(path, relation.numeric(n))),
            Value::Null | Value::Bool(_) => Err(unsupported("null and booleans can only be compared for equality")),
            Value::Array(_) | Value::Object(_) => Err(unsupported("objects and arrays cannot be compared")),
        }
    }
}

fn path_test(relation: Relation, left: String, right: String) -> Condition {
    let typed = |guard: Test, test: Test| {
        Condition::and(vec![
            Condition::test(left.clone(), guard),
            Condition::test(left.clone(), test),
        ])
    };
    let mut alternatives = vec![
        typed(Test::IsString(true), relation.string_path(right.clone())),
        typed(Test::IsNumeric(true), relation.numeric_path(right.clone())),
    ];
    if relation == Relation::Eq {
        alternatives.push(typed(Test::IsBoolean(true), Test::BooleanEqualsPath(right)));
    }
    Condition::or(alternatives)
}

/// Present, not null, and not `false`, `""` or `0`.
fn truthy(path: &str) -> Condition {
    let falsy = |guard: Test, test: Test| {
        Condition::and(vec![
            Condition::test(path, guard),
            Condition::test(path, test),
        ])
    };
    Condition::and(vec![
        Condition::test(path, Test::IsPresent(true)),
        Condition::test(path, Test::IsNull(false)),
        Condition::or(vec![
            falsy(Test::IsBoolean(true), Test::BooleanEquals(false)),
            falsy(Test::IsString(true), Test::StringEquals(String::new())),
            falsy(Test::IsNumeric(true), Test::NumericEquals(Number::from(0))),
        ])
        .negate(),
    ])
}

fn compare_literals(relation: Relation, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ if relation == Relation::Eq => return left == right,
        _ => None,
    };
    ordering.is_some_and(|ordering| relation.holds(ordering))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::CompilationInput;
    use crate::config::CompilerConfig;
    use crate::resources::{BackendKind, Resource, ResourceTable};
    use serde_json::json;
    use weft_ast::{Ast, ExternalValue, parse_tree};

    fn with_compiler<T>(expr: Value, check: impl FnOnce(&WorkflowCompiler<'_>, &Ast, NodeId) -> T) -> T {
        let (ast, root) = parse_tree(&expr).unwrap();
        let table = ResourceTable::new()
            .with_resource("orders", Resource::new(BackendKind::KeyValueStore, "Orders"))
            .with_value("limit", ExternalValue::Number(10.0));
        let config = CompilerConfig::default();
        let input = CompilationInput::new("test", &ast, root, &table, &table, &config);
        let compiler = WorkflowCompiler::new(&input);
        check(&compiler, &ast, root)
    }

    fn ident(name: &str) -> Value {
        json!({ "kind": "Identifier", "name": name })
    }

    fn access(expr: Value, name: &str) -> Value {
        json!({ "kind": "PropertyAccess", "expression": expr, "name": name })
    }

    fn binary(left: Value, op: &str, right: Value) -> Value {
        json!({ "kind": "BinaryExpr", "left": left, "operator": op, "right": right })
    }

    #[test]
    fn test_member_paths() {
        let data = with_compiler(access(access(ident("order"), "items"), "length"), |c, _, root| {
            c.data(root).unwrap()
        });
        assert_eq!(data, Data::Intrinsic("States.ArrayLength($.order.items)".to_string()));

        let data = with_compiler(access(ident("order"), "id"), |c, _, root| c.data(root).unwrap());
        assert_eq!(data, Data::Path("$.order.id".to_string()));
    }

    #[test]
    fn test_template_becomes_format() {
        let data = with_compiler(
            json!({
                "kind": "TemplateExpr",
                "head": "order {",
                "spans": [
                    { "expression": ident("id"), "literal": "} of " },
                    { "expression": { "kind": "ReferenceExpr", "name": "limit" }, "literal": "" }
                ]
            }),
            |c, _, root| c.data(root).unwrap(),
        );
        assert_eq!(
            data,
            Data::Intrinsic("States.Format('order \\{{}\\} of 10', $.id)".to_string())
        );
    }

    #[test]
    fn test_object_payload_template() {
        let data = with_compiler(
            json!({
                "kind": "ObjectLiteral",
                "properties": [
                    { "kind": "PropertyAssignment", "name": ident("id"), "value": ident("orderId") },
                    { "kind": "PropertyAssignment", "name": ident("status"), "value": { "kind": "StringLiteral", "value": "new" } }
                ]
            }),
            |c, _, root| c.data(root).unwrap(),
        );
        let Data::Object(fields) = data else { panic!("expected a payload template") };
        assert_eq!(Value::Object(fields), json!({ "id.$": "$.orderId", "status": "new" }));
    }

    #[test]
    fn test_util_is_rejected() {
        let err = with_compiler(access(ident("$util"), "time"), |c, _, root| c.data(root).unwrap_err());
        assert!(matches!(
            err,
            CompileError::ContextMismatch { ref construct, expected: "resolver", .. } if construct == "$util"
        ));
    }

    #[test]
    fn test_comparison_with_literal_on_the_left() {
        let cond = with_compiler(
            binary(json!({ "kind": "NumberLiteral", "value": 3 }), "<", ident("count")),
            |c, _, root| c.condition(root).unwrap(),
        );
        assert_eq!(
            cond,
            Cond::Rule(Condition::test("$.count", Test::NumericGreaterThan(Number::from(3))))
        );
    }

    #[test]
    fn test_not_equal_negates() {
        let cond = with_compiler(
            binary(ident("status"), "!==", json!({ "kind": "StringLiteral", "value": "done" })),
            |c, _, root| c.condition(root).unwrap(),
        );
        assert_eq!(
            serde_json::to_value(match cond {
                Cond::Rule(rule) => rule,
                Cond::Constant(_) => panic!("expected a rule"),
            })
            .unwrap(),
            json!({ "Not": { "Variable": "$.status", "StringEquals": "done" } })
        );
    }

    #[test]
    fn test_constant_conditions_fold() {
        let cond = with_compiler(
            binary(
                binary(json!({ "kind": "ReferenceExpr", "name": "limit" }), ">", json!({ "kind": "NumberLiteral", "value": 5 })),
                "&&",
                ident("ready"),
            ),
            |c, _, root| c.condition(root).unwrap(),
        );
        assert_eq!(cond, Cond::Rule(truthy("$.ready")));
    }

    #[test]
    fn test_nested_service_call_is_rejected() {
        let err = with_compiler(
            access(
                json!({
                    "kind": "CallExpr",
                    "callee": access(json!({ "kind": "ReferenceExpr", "name": "orders" }), "getItem"),
                    "arguments": []
                }),
                "Item",
            ),
            |c, _, root| c.data(root).unwrap_err(),
        );
        assert!(matches!(err, CompileError::UnsupportedCallPosition { .. }));
    }
}
