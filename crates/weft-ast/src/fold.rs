// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Constant evaluation and expression flattening.
//!
//! [`flatten_expression`] never rewrites a node in place: every node it
//! returns is freshly allocated, and nodes reused from the input are copied
//! with [`Ast::clone_subtree`].

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::ast::{Ast, NodeId};
use crate::error::{AstError, Result};
use crate::external::{ExternalValue, NoReferences, ReferenceEvaluator};
use crate::syntax::{
    ArrayLiteral, Block, BooleanLiteral, ComputedPropertyName, ElementAccess, Identifier, NumberLiteral, ObjectLiteral,
    PropertyAccess, PropertyAssignment, ReturnStmt, StringLiteral, Syntax, TemplateExpr,
    TemplateSpan, UnaryExpr, UnaryOp,
};

// ============================================================================
// Constants
// ============================================================================

/// A value known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Constant>),
    Object(IndexMap<String, Constant>),
    /// A constant handle with no literal form, identified by name.
    Opaque(String),
}

impl Constant {
    /// String conversion as performed by template interpolation.
    pub fn to_js_string(&self) -> String {
        match self {
            Constant::Undefined => "undefined".to_string(),
            Constant::Null => "null".to_string(),
            Constant::Bool(b) => b.to_string(),
            Constant::Number(n) => format_number(*n),
            Constant::String(s) => s.clone(),
            Constant::Array(items) => items
                .iter()
                .map(|item| match item {
                    Constant::Undefined | Constant::Null => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Constant::Object(_) => "[object Object]".to_string(),
            Constant::Opaque(handle) => handle.clone(),
        }
    }

    /// Truthiness of the value.
    pub fn is_truthy(&self) -> bool {
        match self {
            Constant::Undefined | Constant::Null => false,
            Constant::Bool(b) => *b,
            Constant::Number(n) => *n != 0.0 && !n.is_nan(),
            Constant::String(s) => !s.is_empty(),
            Constant::Array(_) | Constant::Object(_) | Constant::Opaque(_) => true,
        }
    }

    /// Allocate literal nodes for this value.
    ///
    /// Opaque handles have no literal form and are written as their name.
    pub fn to_syntax(&self, ast: &mut Ast) -> Result<NodeId> {
        let syntax = match self {
            Constant::Undefined => Syntax::UndefinedLiteral,
            Constant::Null => Syntax::NullLiteral,
            Constant::Bool(value) => Syntax::BooleanLiteral(BooleanLiteral { value: *value }),
            Constant::Number(value) => Syntax::NumberLiteral(NumberLiteral { value: *value }),
            Constant::String(value) | Constant::Opaque(value) => {
                Syntax::StringLiteral(StringLiteral {
                    value: value.clone(),
                })
            }
            Constant::Array(items) => {
                let elements = items
                    .iter()
                    .map(|item| item.to_syntax(ast))
                    .collect::<Result<Vec<_>>>()?;
                Syntax::ArrayLiteral(ArrayLiteral { elements })
            }
            Constant::Object(entries) => {
                let mut properties = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = value.to_syntax(ast)?;
                    properties.push(property(ast, key, value)?);
                }
                Syntax::ObjectLiteral(ObjectLiteral { properties })
            }
        };
        ast.add(syntax)
    }
}

impl From<ExternalValue> for Constant {
    fn from(value: ExternalValue) -> Self {
        match value {
            ExternalValue::Null => Constant::Null,
            ExternalValue::Bool(b) => Constant::Bool(b),
            ExternalValue::Number(n) => Constant::Number(n),
            ExternalValue::String(s) => Constant::String(s),
            ExternalValue::Opaque { handle } => Constant::Opaque(handle),
        }
    }
}

/// Format a number the way template interpolation prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n < 0.0 {
        format!("-{}", format_number(-n))
    } else {
        // Shortest round-trip digits, laid out by the exponent rules of
        // `Number.prototype.toString`.
        let scientific = format!("{n:e}");
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
        let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
        let k = digits.len() as i32;
        let point = exponent.parse::<i32>().unwrap_or(0) + 1;
        if k <= point && point <= 21 {
            format!("{digits}{}", "0".repeat((point - k) as usize))
        } else if 0 < point && point <= 21 {
            let (int, frac) = digits.split_at(point as usize);
            format!("{int}.{frac}")
        } else if -6 < point && point <= 0 {
            format!("0.{}{digits}", "0".repeat((-point) as usize))
        } else {
            let sign = if point - 1 < 0 { '-' } else { '+' };
            let (head, rest) = digits.split_at(1);
            let rest = if rest.is_empty() { String::new() } else { format!(".{rest}") };
            format!("{head}{rest}e{sign}{}", (point - 1).abs())
        }
    }
}

/// Convert a constant to JSON. `undefined` becomes `null`.
pub fn to_json(constant: &Constant) -> Value {
    match constant {
        Constant::Undefined | Constant::Null => Value::Null,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Number(n) => number_to_json(*n),
        Constant::String(s) | Constant::Opaque(s) => Value::String(s.clone()),
        Constant::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        Constant::Object(entries) => Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
    }
}

/// JSON number for `n`, written as an integer when it has no fraction.
pub fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Evaluate `expr` at compile time.
///
/// Returns `None` when the expression is not a constant; a present
/// [`Constant::Undefined`] means the expression is constantly `undefined`.
pub fn eval_to_constant(ast: &Ast, expr: NodeId, refs: &dyn ReferenceEvaluator) -> Option<Constant> {
    match ast.syntax(expr) {
        Syntax::StringLiteral(lit) => Some(Constant::String(lit.value.clone())),
        Syntax::NumberLiteral(lit) => Some(Constant::Number(lit.value)),
        Syntax::BooleanLiteral(lit) => Some(Constant::Bool(lit.value)),
        Syntax::NullLiteral => Some(Constant::Null),
        Syntax::UndefinedLiteral => Some(Constant::Undefined),
        Syntax::UnaryExpr(unary) => match (unary.operator, eval_to_constant(ast, unary.operand, refs)?) {
            (UnaryOp::Neg, Constant::Number(n)) => Some(Constant::Number(-n)),
            (UnaryOp::Plus, Constant::Number(n)) => Some(Constant::Number(n)),
            _ => None,
        },
        Syntax::ReferenceExpr(reference) => refs.evaluate(&reference.name).map(Constant::from),
        Syntax::ArrayLiteral(array) => {
            let mut items = Vec::with_capacity(array.elements.len());
            for element in &array.elements {
                match ast.syntax(*element) {
                    Syntax::SpreadElement(spread) => match eval_to_constant(ast, spread.expression, refs)? {
                        Constant::Array(spread_items) => items.extend(spread_items),
                        _ => return None,
                    },
                    _ => items.push(eval_to_constant(ast, *element, refs)?),
                }
            }
            Some(Constant::Array(items))
        }
        Syntax::ObjectLiteral(object) => {
            let mut entries = IndexMap::new();
            for prop in &object.properties {
                match ast.syntax(*prop) {
                    Syntax::PropertyAssignment(assignment) => {
                        let key = constant_key(ast, assignment.name, refs)?;
                        entries.insert(key, eval_to_constant(ast, assignment.value, refs)?);
                    }
                    Syntax::SpreadAssignment(spread) => match eval_to_constant(ast, spread.expression, refs)? {
                        Constant::Object(spread_entries) => entries.extend(spread_entries),
                        _ => return None,
                    },
                    _ => return None,
                }
            }
            Some(Constant::Object(entries))
        }
        Syntax::TemplateExpr(template) => {
            let mut text = template.head.clone();
            for span in &template.spans {
                text.push_str(&eval_to_constant(ast, span.expression, refs)?.to_js_string());
                text.push_str(&span.literal);
            }
            Some(Constant::String(text))
        }
        Syntax::PropertyAccess(access) => {
            member(eval_to_constant(ast, access.expression, refs)?, &Constant::String(access.name.clone()))
        }
        Syntax::ElementAccess(access) => member(
            eval_to_constant(ast, access.expression, refs)?,
            &eval_to_constant(ast, access.element, refs)?,
        ),
        _ => None,
    }
}

fn member(base: Constant, key: &Constant) -> Option<Constant> {
    match (base, key) {
        (Constant::Object(mut entries), key) => entries.swap_remove(&key.to_js_string()),
        (Constant::Array(items), Constant::String(name)) if name == "length" => {
            Some(Constant::Number(items.len() as f64))
        }
        (Constant::Array(mut items), Constant::Number(n)) => {
            let index = array_index(*n)?;
            (index < items.len()).then(|| items.swap_remove(index))
        }
        (Constant::String(s), Constant::String(name)) if name == "length" => {
            Some(Constant::Number(s.encode_utf16().count() as f64))
        }
        _ => None,
    }
}

fn constant_key(ast: &Ast, name: NodeId, refs: &dyn ReferenceEvaluator) -> Option<String> {
    match ast.syntax(name) {
        Syntax::Identifier(ident) => Some(ident.name.clone()),
        Syntax::ComputedPropertyName(computed) => match eval_to_constant(ast, computed.expression, refs)? {
            key @ (Constant::String(_) | Constant::Number(_)) => Some(key.to_js_string()),
            _ => None,
        },
        _ => match eval_to_constant(ast, name, refs)? {
            key @ (Constant::String(_) | Constant::Number(_)) => Some(key.to_js_string()),
            _ => None,
        },
    }
}

fn array_index(n: f64) -> Option<usize> {
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

// ============================================================================
// Flattening
// ============================================================================

/// Names bound to already-flattened expressions.
pub type FlattenScope = IndexMap<String, NodeId>;

/// Substitute scope bindings into `expr` and fold what becomes constant.
///
/// Property and element access into object and array literals resolves to
/// the member, spreads of literal collections are spliced, and templates
/// whose every part is constant collapse to a string literal.
pub fn flatten_expression(ast: &mut Ast, expr: NodeId, scope: &FlattenScope) -> Result<NodeId> {
    let syntax = ast.syntax(expr).clone();
    match syntax {
        Syntax::Identifier(ident) => match scope.get(&ident.name) {
            Some(bound) => ast.clone_subtree(*bound),
            None => ast.clone_subtree(expr),
        },
        Syntax::PropertyAccess(access) => {
            let base = flatten_expression(ast, access.expression, scope)?;
            match resolve_member(ast, expr, base, &MemberKey::Name(access.name.clone()))? {
                Some(member) => Ok(member),
                None => ast.add(Syntax::PropertyAccess(PropertyAccess {
                    expression: base,
                    name: access.name,
                    optional: access.optional,
                })),
            }
        }
        Syntax::ElementAccess(access) => {
            let base = flatten_expression(ast, access.expression, scope)?;
            let element = flatten_expression(ast, access.element, scope)?;
            let key = match ast.syntax(element) {
                Syntax::StringLiteral(lit) => Some(MemberKey::Name(lit.value.clone())),
                Syntax::NumberLiteral(lit) => Some(MemberKey::Index(lit.value)),
                _ => None,
            };
            if let Some(key) = key
                && let Some(member) = resolve_member(ast, expr, base, &key)?
            {
                return Ok(member);
            }
            ast.add(Syntax::ElementAccess(ElementAccess {
                expression: base,
                element,
                optional: access.optional,
            }))
        }
        Syntax::ArrayLiteral(array) => flatten_array(ast, &array.elements, scope),
        Syntax::ObjectLiteral(object) => flatten_object(ast, &object.properties, scope),
        Syntax::TemplateExpr(template) => flatten_template(ast, &template, scope),
        Syntax::UnaryExpr(unary) => {
            let operand = flatten_expression(ast, unary.operand, scope)?;
            if unary.operator == UnaryOp::Neg
                && let Syntax::NumberLiteral(lit) = ast.syntax(operand)
            {
                let value = -lit.value;
                return ast.add(Syntax::NumberLiteral(NumberLiteral { value }));
            }
            ast.add(Syntax::UnaryExpr(UnaryExpr {
                operator: unary.operator,
                operand,
            }))
        }
        Syntax::CallExpr(mut call) => {
            // A method callee keeps its member name; only the receiver folds.
            call.callee = match ast.syntax(call.callee).clone() {
                Syntax::PropertyAccess(access) => {
                    let receiver = flatten_expression(ast, access.expression, scope)?;
                    ast.add(Syntax::PropertyAccess(PropertyAccess {
                        expression: receiver,
                        ..access
                    }))?
                }
                _ => flatten_expression(ast, call.callee, scope)?,
            };
            call.arguments = call
                .arguments
                .iter()
                .map(|arg| flatten_expression(ast, *arg, scope))
                .collect::<Result<_>>()?;
            ast.add(Syntax::CallExpr(call))
        }
        Syntax::ArrowFunction(_) | Syntax::FunctionDecl(_) => ast.clone_subtree(expr),
        other => {
            let rebuilt = other.try_map(&mut |child: &NodeId| flatten_expression(ast, *child, scope))?;
            ast.add(rebuilt)
        }
    }
}

enum MemberKey {
    Name(String),
    Index(f64),
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberKey::Name(name) => f.write_str(name),
            MemberKey::Index(n) => f.write_str(&format_number(*n)),
        }
    }
}

/// Resolve `base[key]` when `base` is a literal collection. `Ok(None)` leaves
/// the access in place.
fn resolve_member(ast: &mut Ast, access: NodeId, base: NodeId, key: &MemberKey) -> Result<Option<NodeId>> {
    match (ast.syntax(base).clone(), key) {
        (Syntax::ObjectLiteral(object), MemberKey::Name(name)) => {
            let mut found = None;
            for prop in &object.properties {
                let Syntax::PropertyAssignment(assignment) = ast.syntax(*prop) else {
                    return Ok(None);
                };
                match static_key(ast, assignment.name) {
                    Some(k) if &k == name => found = Some(assignment.value),
                    Some(_) => {}
                    None => return Ok(None),
                }
            }
            match found {
                Some(value) => ast.clone_subtree(value).map(Some),
                None => Err(AstError::PropertyNotFound {
                    node: access,
                    property: name.clone(),
                }),
            }
        }
        (Syntax::ObjectLiteral(_), MemberKey::Index(n)) => Err(AstError::InvalidAccess {
            node: access,
            reason: format!("numeric index {} into an object", format_number(*n)),
        }),
        (Syntax::ArrayLiteral(array), MemberKey::Index(n)) => {
            match array_index(*n).and_then(|i| array.elements.get(i)) {
                Some(element) => ast.clone_subtree(*element).map(Some),
                None => Err(AstError::PropertyNotFound {
                    node: access,
                    property: key.to_string(),
                }),
            }
        }
        (Syntax::ArrayLiteral(array), MemberKey::Name(name)) if name == "length" => {
            let value = array.elements.len() as f64;
            ast.add(Syntax::NumberLiteral(NumberLiteral { value })).map(Some)
        }
        (Syntax::ArrayLiteral(_), MemberKey::Name(name)) => Err(AstError::InvalidAccess {
            node: access,
            reason: format!("property '{name}' of an array"),
        }),
        (Syntax::StringLiteral(lit), MemberKey::Name(name)) if name == "length" => {
            let value = lit.value.encode_utf16().count() as f64;
            ast.add(Syntax::NumberLiteral(NumberLiteral { value })).map(Some)
        }
        (Syntax::StringLiteral(_), MemberKey::Index(_)) => Err(AstError::InvalidAccess {
            node: access,
            reason: "numeric index into a string".to_string(),
        }),
        _ => Ok(None),
    }
}

fn flatten_array(ast: &mut Ast, elements: &[NodeId], scope: &FlattenScope) -> Result<NodeId> {
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        if let Syntax::SpreadElement(spread) = ast.syntax(*element).clone() {
            let target = flatten_expression(ast, spread.expression, scope)?;
            let Syntax::ArrayLiteral(spread_array) = ast.syntax(target).clone() else {
                return Err(AstError::UnsupportedSpread {
                    node: *element,
                    collection: "array",
                });
            };
            for item in spread_array.elements {
                out.push(ast.clone_subtree(item)?);
            }
        } else {
            out.push(flatten_expression(ast, *element, scope)?);
        }
    }
    ast.add(Syntax::ArrayLiteral(ArrayLiteral { elements: out }))
}

enum Entry {
    Static(String, NodeId),
    Computed(NodeId, NodeId),
    Verbatim(NodeId),
}

/// Object entries keyed by their literal name: the first occurrence fixes the
/// position, the last one supplies the value.
#[derive(Default)]
struct Entries {
    entries: Vec<Entry>,
    positions: HashMap<String, usize>,
}

impl Entries {
    fn put(&mut self, key: String, value: NodeId) {
        match self.positions.get(&key) {
            Some(at) => self.entries[*at] = Entry::Static(key, value),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push(Entry::Static(key, value));
            }
        }
    }

    fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }
}

fn flatten_object(ast: &mut Ast, properties: &[NodeId], scope: &FlattenScope) -> Result<NodeId> {
    let mut entries = Entries::default();
    for prop in properties {
        match ast.syntax(*prop).clone() {
            Syntax::PropertyAssignment(assignment) => {
                let value = flatten_expression(ast, assignment.value, scope)?;
                let name = match ast.syntax(assignment.name).clone() {
                    Syntax::ComputedPropertyName(computed) => {
                        flatten_expression(ast, computed.expression, scope)?
                    }
                    _ => assignment.name,
                };
                match static_key(ast, name) {
                    Some(key) => entries.put(key, value),
                    None => {
                        let name = ast.add(Syntax::ComputedPropertyName(ComputedPropertyName {
                            expression: name,
                        }))?;
                        entries.push(Entry::Computed(name, value));
                    }
                }
            }
            Syntax::SpreadAssignment(spread) => {
                let target = flatten_expression(ast, spread.expression, scope)?;
                let Syntax::ObjectLiteral(object) = ast.syntax(target).clone() else {
                    return Err(AstError::UnsupportedSpread {
                        node: *prop,
                        collection: "object",
                    });
                };
                for inner in object.properties {
                    let Syntax::PropertyAssignment(assignment) = ast.syntax(inner).clone() else {
                        entries.push(Entry::Verbatim(ast.clone_subtree(inner)?));
                        continue;
                    };
                    let value = ast.clone_subtree(assignment.value)?;
                    match static_key(ast, assignment.name) {
                        Some(key) => entries.put(key, value),
                        None => {
                            let name = ast.clone_subtree(assignment.name)?;
                            entries.push(Entry::Computed(name, value));
                        }
                    }
                }
            }
            _ => entries.push(Entry::Verbatim(ast.clone_subtree(*prop)?)),
        }
    }

    let mut out = Vec::with_capacity(entries.entries.len());
    for entry in entries.entries {
        let node = match entry {
            Entry::Static(key, value) => property(ast, &key, value)?,
            Entry::Computed(name, value) => {
                ast.add(Syntax::PropertyAssignment(PropertyAssignment { name, value }))?
            }
            Entry::Verbatim(node) => node,
        };
        out.push(node);
    }
    ast.add(Syntax::ObjectLiteral(ObjectLiteral { properties: out }))
}

fn flatten_template(ast: &mut Ast, template: &TemplateExpr, scope: &FlattenScope) -> Result<NodeId> {
    let mut head = template.head.clone();
    let mut spans: Vec<TemplateSpan> = Vec::new();
    for span in &template.spans {
        let part = flatten_expression(ast, span.expression, scope)?;
        let text = match eval_to_constant(ast, part, &NoReferences) {
            Some(constant) => constant.to_js_string(),
            None => {
                spans.push(TemplateSpan {
                    expression: part,
                    literal: span.literal.clone(),
                });
                continue;
            }
        };
        match spans.last_mut() {
            Some(last) => {
                last.literal.push_str(&text);
                last.literal.push_str(&span.literal);
            }
            None => {
                head.push_str(&text);
                head.push_str(&span.literal);
            }
        }
    }
    if spans.is_empty() {
        return ast.add(Syntax::StringLiteral(StringLiteral { value: head }));
    }
    ast.add(Syntax::TemplateExpr(TemplateExpr { head, spans }))
}

/// Literal key of a property name node, if it has one.
pub fn static_key(ast: &Ast, name: NodeId) -> Option<String> {
    match ast.syntax(name) {
        Syntax::Identifier(ident) => Some(ident.name.clone()),
        Syntax::StringLiteral(lit) => Some(lit.value.clone()),
        Syntax::NumberLiteral(lit) => Some(format_number(lit.value)),
        Syntax::ComputedPropertyName(computed) => match ast.syntax(computed.expression) {
            Syntax::StringLiteral(lit) => Some(lit.value.clone()),
            Syntax::NumberLiteral(lit) => Some(format_number(lit.value)),
            _ => None,
        },
        _ => None,
    }
}

fn property(ast: &mut Ast, key: &str, value: NodeId) -> Result<NodeId> {
    let name = if is_identifier_name(key) {
        ast.add(Syntax::Identifier(Identifier {
            name: key.to_string(),
        }))?
    } else {
        ast.add(Syntax::StringLiteral(StringLiteral {
            value: key.to_string(),
        }))?
    };
    ast.add(Syntax::PropertyAssignment(PropertyAssignment { name, value }))
}

/// True for names usable as a bare identifier.
pub fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Fold a run of variable statements into a scope, in declaration order.
///
/// Each initializer is flattened against the bindings before it; a later
/// declaration of the same name replaces the earlier one.
pub fn flatten_statements_scope(ast: &mut Ast, statements: &[NodeId]) -> Result<FlattenScope> {
    let mut scope = FlattenScope::new();
    for stmt in statements {
        let Syntax::VariableStmt(var) = ast.syntax(*stmt).clone() else {
            return Err(AstError::UnsupportedStatement {
                node: *stmt,
                kind: ast.kind(*stmt),
            });
        };
        let value = match var.initializer {
            Some(init) => flatten_expression(ast, init, &scope)?,
            None => ast.add(Syntax::UndefinedLiteral)?,
        };
        scope.insert(var.name, value);
    }
    Ok(scope)
}

/// Flatten the returned expression of `block` against the declarations
/// before it.
pub fn flatten_return_event(ast: &mut Ast, block: NodeId) -> Result<NodeId> {
    let statements = ast.cast::<Block>(block)?.statements.clone();
    let Some((last, init)) = statements.split_last() else {
        return Err(AstError::MissingReturn { node: block });
    };
    let expression = match ast.try_cast::<ReturnStmt>(*last) {
        Some(ReturnStmt {
            expression: Some(expression),
        }) => *expression,
        _ => return Err(AstError::MissingReturn { node: *last }),
    };
    let scope = flatten_statements_scope(ast, init)?;
    trace!(block = %block, bindings = scope.len(), "flattening return of event block");
    flatten_expression(ast, expression, &scope)
}

// ============================================================================
// Reference paths
// ============================================================================

/// One key of a reference path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A chain of constant-key accesses off a root identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    /// Name of the root identifier.
    pub identity: String,
    /// The root identifier node.
    pub root: NodeId,
    pub path: Vec<PathSegment>,
}

impl ReferencePath {
    /// Append the path to a JSON path prefix, e.g. `$.a` + `["b", 0]` gives
    /// `$.a.b[0]`.
    pub fn append_to(&self, base: &str) -> String {
        let mut out = base.to_string();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) if is_identifier_name(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                PathSegment::Key(key) => {
                    out.push_str("['");
                    out.push_str(&key.replace('\'', "\\'"));
                    out.push_str("']");
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

/// Recover `a.b[0].c` as identity `a` with path `["b", 0, "c"]`.
///
/// Returns `None` unless the root is an identifier and every key is constant.
pub fn get_reference_path(ast: &Ast, expr: NodeId) -> Option<ReferencePath> {
    match ast.syntax(expr) {
        Syntax::Identifier(ident) => Some(ReferencePath {
            identity: ident.name.clone(),
            root: expr,
            path: Vec::new(),
        }),
        Syntax::PropertyAccess(access) => {
            let mut reference = get_reference_path(ast, access.expression)?;
            reference.path.push(PathSegment::Key(access.name.clone()));
            Some(reference)
        }
        Syntax::ElementAccess(access) => {
            let segment = match ast.syntax(access.element) {
                Syntax::StringLiteral(lit) => PathSegment::Key(lit.value.clone()),
                Syntax::NumberLiteral(lit) => PathSegment::Index(array_index(lit.value)?),
                _ => return None,
            };
            let mut reference = get_reference_path(ast, access.expression)?;
            reference.path.push(segment);
            Some(reference)
        }
        _ => None,
    }
}

/// Check that `reference` is rooted at the event or utility identifier, and
/// that a nested event path goes through `detail`.
pub fn assert_valid_event_reference(
    reference: &ReferencePath,
    event_name: &str,
    utils_name: Option<&str>,
) -> Result<()> {
    if reference.identity == event_name {
        if reference.path.len() > 1 && reference.path[0] != PathSegment::Key("detail".to_string()) {
            return Err(AstError::InvalidReference {
                node: reference.root,
                reason: format!(
                    "nested references to '{event_name}' must go through '{event_name}.detail', found '{}'",
                    reference.path[0]
                ),
            });
        }
        return Ok(());
    }
    if utils_name == Some(reference.identity.as_str()) {
        return Ok(());
    }
    Err(AstError::InvalidReference {
        node: reference.root,
        reason: match utils_name {
            Some(utils) => format!(
                "'{}' is neither the event '{event_name}' nor the utility '{utils}'",
                reference.identity
            ),
            None => format!("'{}' is not the event '{event_name}'", reference.identity),
        },
    })
}
