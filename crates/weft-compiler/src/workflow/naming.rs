// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State names derived from the statements they were compiled from.

use std::collections::HashSet;

use weft_ast::fold::format_number;
use weft_ast::{Ast, NodeId, Syntax};

/// Nesting depth after which sub-expressions are elided.
const MAX_DEPTH: usize = 3;

/// Allocator of state names, unique across one state machine.
#[derive(Debug)]
pub(crate) struct StateNames {
    taken: HashSet<String>,
    max_len: usize,
}

impl StateNames {
    pub(crate) fn new(max_len: usize) -> Self {
        Self {
            taken: HashSet::new(),
            max_len: max_len.max(8),
        }
    }

    /// Reserve a name based on `base`, truncating and numbering as needed.
    pub(crate) fn allocate(&mut self, base: &str) -> String {
        let base = sanitize(base);
        let base = if base.is_empty() { "State".to_string() } else { base };
        let candidate = truncate(&base, self.max_len);
        if self.taken.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 1usize;
        loop {
            let suffix = format!(" ({n})");
            let budget = self.max_len.saturating_sub(suffix.chars().count());
            let candidate = format!("{}{suffix}", truncate(&base, budget));
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect::<String>().trim_end().to_string()
}

/// Drop characters that are not allowed in state names.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '$' | '{' | '}' | '\\' | '`' => {}
            '[' => out.push('('),
            ']' => out.push(')'),
            '"' => out.push('\''),
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Source-like summary of a statement.
pub(crate) fn describe(ast: &Ast, stmt: NodeId) -> String {
    match ast.syntax(stmt) {
        Syntax::VariableStmt(var) => match var.initializer {
            Some(init) => format!("{} = {}", var.name, render(ast, init, 0)),
            None => var.name.clone(),
        },
        Syntax::ExprStmt(expr) => render(ast, expr.expression, 0),
        Syntax::ReturnStmt(ret) => match ret.expression {
            Some(expr) => format!("return {}", render(ast, expr, 0)),
            None => "return".to_string(),
        },
        Syntax::ThrowStmt(throw) => format!("throw {}", render(ast, throw.expression, 0)),
        Syntax::IfStmt(stmt) => format!("if({})", render(ast, stmt.condition, 0)),
        Syntax::WhileStmt(stmt) => format!("while ({})", render(ast, stmt.condition, 0)),
        Syntax::DoStmt(stmt) => format!("do while ({})", render(ast, stmt.condition, 0)),
        Syntax::ForOfStmt(stmt) => format!(
            "for ({} of {})",
            variable_name(ast, stmt.variable),
            render(ast, stmt.expression, 0)
        ),
        Syntax::ForInStmt(stmt) => format!(
            "for ({} in {})",
            variable_name(ast, stmt.variable),
            render(ast, stmt.expression, 0)
        ),
        Syntax::BreakStmt => "break".to_string(),
        Syntax::ContinueStmt => "continue".to_string(),
        Syntax::EmptyStmt => "empty".to_string(),
        Syntax::TryStmt(_) => "try".to_string(),
        other => other.kind().to_string(),
    }
}

fn variable_name(ast: &Ast, variable: NodeId) -> String {
    match ast.syntax(variable) {
        Syntax::VariableStmt(var) => var.name.clone(),
        Syntax::Identifier(ident) => ident.name.clone(),
        other => other.kind().to_string(),
    }
}

fn render(ast: &Ast, expr: NodeId, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return "...".to_string();
    }
    let inner = |id: NodeId| render(ast, id, depth + 1);
    match ast.syntax(expr) {
        Syntax::Identifier(ident) => ident.name.clone(),
        Syntax::ReferenceExpr(reference) => reference.name.clone(),
        Syntax::StringLiteral(lit) => format!("'{}'", lit.value),
        Syntax::NumberLiteral(lit) => format_number(lit.value),
        Syntax::BooleanLiteral(lit) => lit.value.to_string(),
        Syntax::NullLiteral => "null".to_string(),
        Syntax::UndefinedLiteral => "undefined".to_string(),
        Syntax::AwaitExpr(wait) => render(ast, wait.expression, depth),
        Syntax::PropertyAccess(access) => format!("{}.{}", inner(access.expression), access.name),
        Syntax::ElementAccess(access) => {
            format!("{}[{}]", inner(access.expression), inner(access.element))
        }
        Syntax::CallExpr(call) => {
            let args = if call.arguments.is_empty() { "" } else { "..." };
            format!("{}({args})", inner(call.callee))
        }
        Syntax::NewExpr(call) => {
            let args = match call.arguments.as_slice() {
                [] => String::new(),
                [only] => inner(*only),
                _ => "...".to_string(),
            };
            format!("new {}({args})", inner(call.callee))
        }
        Syntax::UnaryExpr(unary) => format!("{}{}", unary.operator, inner(unary.operand)),
        Syntax::BinaryExpr(binary) => format!(
            "{} {} {}",
            inner(binary.left),
            binary.operator,
            inner(binary.right)
        ),
        Syntax::ConditionalExpr(cond) => format!(
            "{} ? {} : {}",
            inner(cond.condition),
            inner(cond.when_true),
            inner(cond.when_false)
        ),
        Syntax::TemplateExpr(_) => "template".to_string(),
        Syntax::ArrayLiteral(_) => "(...)".to_string(),
        Syntax::ObjectLiteral(_) => "object".to_string(),
        Syntax::ArrowFunction(_) => "() => ...".to_string(),
        other => other.kind().to_string(),
    }
}
