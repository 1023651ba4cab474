// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Translation of statements and expressions into mapping template text.
//!
//! Expressions translate to a template expression string. Anything that
//! needs intermediate values (spreads, interpolation, conditionals) first
//! writes `#set` lines for temporaries into the [`Buffer`] it is given.

use std::collections::HashSet;

use weft_ast::fold::{format_number, is_identifier_name, static_key};
use weft_ast::syntax::{
    ArrayLiteral, BinaryExpr, CallExpr, ConditionalExpr, IfStmt, ObjectLiteral, PropertyAccess,
    TemplateExpr,
};
use weft_ast::{Ast, BinaryOp, Constant, NodeId, ReferenceEvaluator, Syntax, UnaryOp, eval_to_constant};

use crate::calls::{SFN, UTIL, service_call};
use crate::compile::CompilationInput;
use crate::config::CompilerConfig;
use crate::error::{CompileError, Result};
use crate::resources::ResourceResolver;

/// Stash slot set once the function has returned.
pub(crate) const RETURN_FLAG: &str = "return__flag";
/// Stash slot holding the returned value.
pub(crate) const RETURN_VALUE: &str = "return__val";

// ============================================================================
// Buffer
// ============================================================================

/// Indented template lines.
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    lines: Vec<(usize, String)>,
    depth: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl Into<String>) {
        self.lines.push((self.depth, text.into()));
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Move the lines of `other` to the end of this buffer, nested at the
    /// current depth.
    pub fn append(&mut self, other: Buffer) {
        let depth = self.depth;
        self.lines
            .extend(other.lines.into_iter().map(|(d, text)| (d + depth, text)));
    }

    /// Take every line written so far, leaving the buffer empty.
    pub fn take(&mut self) -> Buffer {
        Buffer {
            lines: std::mem::take(&mut self.lines),
            depth: 0,
        }
    }

    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(|(depth, text)| format!("{}{text}", "  ".repeat(*depth)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Write the guard that replays an earlier return.
pub(crate) fn return_guard(buf: &mut Buffer) {
    buf.line(format!("#if($context.stash.{RETURN_FLAG})"));
    buf.indent();
    buf.line(format!("#return($context.stash.{RETURN_VALUE})"));
    buf.dedent();
    buf.line("#end");
}

// ============================================================================
// Translator
// ============================================================================

/// Where local variables live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Template-local `$name` variables; the whole function is one template.
    Direct,
    /// `$context.stash.name`, readable by later pipeline stages.
    Stash,
}

enum Part {
    Literal(String),
    Expr(NodeId),
}

pub(crate) struct Translator<'a> {
    ast: &'a Ast,
    resources: &'a dyn ResourceResolver,
    references: &'a dyn ReferenceEvaluator,
    config: &'a CompilerConfig,
    /// Name of the parameter bound to the resolver context.
    context: Option<String>,
    mode: Mode,
    /// Set while translating the pipeline's final response, where a return
    /// no longer has to be recorded for later stages.
    returns_directly: bool,
    loop_vars: HashSet<String>,
    temps: usize,
    loops: usize,
}

impl<'a> Translator<'a> {
    pub fn new(input: &CompilationInput<'a>, context: Option<String>, mode: Mode) -> Self {
        Self {
            ast: input.ast,
            resources: input.resources,
            references: input.references,
            config: input.config,
            context,
            mode,
            returns_directly: mode == Mode::Direct,
            loop_vars: HashSet::new(),
            temps: 0,
            loops: 0,
        }
    }

    pub fn set_returns_directly(&mut self, direct: bool) {
        self.returns_directly = direct;
    }

    fn temp(&mut self) -> String {
        let name = format!("$v{}", self.temps);
        self.temps += 1;
        name
    }

    /// Reference to the local `name`.
    pub fn local(&self, name: &str) -> String {
        if self.mode == Mode::Direct || self.loop_vars.contains(name) {
            format!("${}", vtl_name(name))
        } else {
            format!("$context.stash.{}", vtl_name(name))
        }
    }

    /// Write `value` into the local `name`.
    pub fn assign(&self, buf: &mut Buffer, name: &str, value: &str) {
        if self.mode == Mode::Direct || self.loop_vars.contains(name) {
            buf.line(format!("#set(${} = {value})", vtl_name(name)));
        } else {
            buf.line(stash_put(&vtl_name(name), value));
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    pub fn statement(&mut self, buf: &mut Buffer, id: NodeId) -> Result<()> {
        let ast = self.ast;
        match ast.syntax(id) {
            Syntax::Block(block) => {
                for stmt in &block.statements {
                    self.statement(buf, *stmt)?;
                }
            }
            Syntax::VariableStmt(stmt) => {
                let value = match stmt.initializer {
                    Some(init) => self.expression(buf, init)?,
                    None => "$null".to_string(),
                };
                self.assign(buf, &stmt.name, &value);
            }
            Syntax::ExprStmt(stmt) => {
                let value = self.expression(buf, stmt.expression)?;
                buf.line(format!("$util.qr({value})"));
            }
            Syntax::ReturnStmt(stmt) => self.return_value(buf, stmt.expression)?,
            Syntax::ThrowStmt(stmt) => self.throw(buf, stmt.expression)?,
            Syntax::IfStmt(stmt) => self.if_stmt(buf, stmt)?,
            Syntax::WhileStmt(stmt) => self.bounded_loop(buf, stmt.condition, stmt.body, false)?,
            Syntax::DoStmt(stmt) => self.bounded_loop(buf, stmt.condition, stmt.body, true)?,
            Syntax::ForOfStmt(stmt) => self.for_each(buf, stmt.variable, stmt.expression, stmt.body, false)?,
            Syntax::ForInStmt(stmt) => self.for_each(buf, stmt.variable, stmt.expression, stmt.body, true)?,
            Syntax::BreakStmt => buf.line("#break"),
            Syntax::EmptyStmt => {}
            Syntax::ContinueStmt => {
                return Err(CompileError::unsupported(
                    ast,
                    id,
                    "'continue' has no mapping template equivalent",
                ));
            }
            Syntax::TryStmt(_) => {
                return Err(CompileError::unsupported(
                    ast,
                    id,
                    "try statements are only supported in workflows",
                ));
            }
            Syntax::FunctionDecl(_) => {
                return Err(CompileError::unsupported(
                    ast,
                    id,
                    "nested function declarations are not supported",
                ));
            }
            Syntax::SyntaxError(err) => {
                return Err(CompileError::unsupported(ast, id, err.message.clone()));
            }
            _ => return Err(CompileError::unsupported(ast, id, "expected a statement")),
        }
        Ok(())
    }

    fn return_value(&mut self, buf: &mut Buffer, expr: Option<NodeId>) -> Result<()> {
        let value = match expr {
            Some(expr) => self.expression(buf, expr)?,
            None => "$null".to_string(),
        };
        if self.returns_directly {
            buf.line(format!("#return({value})"));
        } else {
            buf.line(stash_put(RETURN_FLAG, "true"));
            buf.line(stash_put(RETURN_VALUE, &value));
            buf.line(format!("#return($context.stash.{RETURN_VALUE})"));
        }
        Ok(())
    }

    fn throw(&mut self, buf: &mut Buffer, expr: NodeId) -> Result<()> {
        let ast = self.ast;
        let (message, error_type) = match ast.syntax(expr) {
            Syntax::NewExpr(new) => {
                let message = match new.arguments.first() {
                    Some(arg) => self.expression(buf, *arg)?,
                    None => vtl_string(""),
                };
                let error_type = match ast.syntax(new.callee) {
                    Syntax::Identifier(ident) if ident.name != "Error" => Some(ident.name.clone()),
                    _ => None,
                };
                (message, error_type)
            }
            _ => (self.expression(buf, expr)?, None),
        };
        match error_type {
            Some(error_type) => buf.line(format!("$util.error({message}, {})", vtl_string(&error_type))),
            None => buf.line(format!("$util.error({message})")),
        }
        Ok(())
    }

    fn if_stmt(&mut self, buf: &mut Buffer, stmt: &IfStmt) -> Result<()> {
        let condition = self.condition(buf, stmt.condition)?;
        buf.line(format!("#if({condition})"));
        self.branch(buf, stmt.then_stmt)?;

        let ast = self.ast;
        let mut else_stmt = stmt.else_stmt;
        while let Some(id) = else_stmt {
            if let Some(nested) = ast.try_cast::<IfStmt>(id) {
                let mark = self.temps;
                let mut prep = Buffer::new();
                let condition = self.condition(&mut prep, nested.condition)?;
                if prep.is_empty() {
                    buf.line(format!("#elseif({condition})"));
                    self.branch(buf, nested.then_stmt)?;
                    else_stmt = nested.else_stmt;
                    continue;
                }
                self.temps = mark;
            }
            buf.line("#else");
            self.branch(buf, id)?;
            break;
        }
        buf.line("#end");
        Ok(())
    }

    fn branch(&mut self, buf: &mut Buffer, id: NodeId) -> Result<()> {
        buf.indent();
        let result = self.statement(buf, id);
        buf.dedent();
        result
    }

    /// `while` and `do` loops run inside a bounded `#foreach`.
    fn bounded_loop(
        &mut self,
        buf: &mut Buffer,
        condition: NodeId,
        body: NodeId,
        check_after: bool,
    ) -> Result<()> {
        let counter = self.loops;
        self.loops += 1;
        let last = self.config.max_loop_iterations.saturating_sub(1);
        buf.line(format!("#foreach($__loop{counter} in [0..{last}])"));
        buf.indent();
        if !check_after {
            self.loop_check(buf, condition)?;
        }
        self.statement(buf, body)?;
        if check_after {
            self.loop_check(buf, condition)?;
        }
        buf.dedent();
        buf.line("#end");
        Ok(())
    }

    fn loop_check(&mut self, buf: &mut Buffer, condition: NodeId) -> Result<()> {
        if eval_to_constant(self.ast, condition, self.references).is_some_and(|c| c.is_truthy()) {
            return Ok(());
        }
        let condition = self.condition(buf, condition)?;
        buf.line(format!("#if(!({condition}))"));
        buf.indent();
        buf.line("#break");
        buf.dedent();
        buf.line("#end");
        Ok(())
    }

    fn for_each(
        &mut self,
        buf: &mut Buffer,
        variable: NodeId,
        iterable: NodeId,
        body: NodeId,
        keys: bool,
    ) -> Result<()> {
        let ast = self.ast;
        let name = match ast.syntax(variable) {
            Syntax::VariableStmt(stmt) => stmt.name.clone(),
            Syntax::Identifier(ident) => ident.name.clone(),
            Syntax::ParameterDecl(param) => param.name.clone(),
            _ => {
                return Err(CompileError::unsupported(
                    ast,
                    variable,
                    "loop variable must be a plain name",
                ));
            }
        };
        let mut source = self.expression(buf, iterable)?;
        if keys {
            source.push_str(".keySet()");
        }
        let added = self.loop_vars.insert(name.clone());
        buf.line(format!("#foreach(${} in {source})", vtl_name(&name)));
        let result = self.branch(buf, body);
        buf.line("#end");
        if added {
            self.loop_vars.remove(&name);
        }
        result
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    pub fn expression(&mut self, buf: &mut Buffer, id: NodeId) -> Result<String> {
        if let Some(constant) = eval_to_constant(self.ast, id, self.references) {
            return Ok(constant_literal(&constant));
        }
        let ast = self.ast;
        match ast.syntax(id) {
            Syntax::Identifier(ident) => self.identifier(id, &ident.name),
            Syntax::ReferenceExpr(reference) => Err(CompileError::UnknownResource {
                node: id,
                name: reference.name.clone(),
            }),
            Syntax::AwaitExpr(inner) => self.expression(buf, inner.expression),
            Syntax::PropertyAccess(access) => {
                let base = self.expression(buf, access.expression)?;
                Ok(format!("{base}{}", member(&access.name)))
            }
            Syntax::ElementAccess(access) => {
                let base = self.expression(buf, access.expression)?;
                let element = self.expression(buf, access.element)?;
                Ok(format!("{base}.get({element})"))
            }
            Syntax::CallExpr(call) => self.call(buf, id, call),
            Syntax::UnaryExpr(unary) => {
                let operand = self.expression(buf, unary.operand)?;
                Ok(match unary.operator {
                    UnaryOp::Not => format!("!{}", parenthesize(&operand)),
                    UnaryOp::Neg => format!("(0 - {operand})"),
                    UnaryOp::Plus => operand,
                })
            }
            Syntax::BinaryExpr(binary) => self.binary(buf, binary),
            Syntax::ConditionalExpr(conditional) => self.conditional(buf, conditional),
            Syntax::TemplateExpr(template) => self.template(buf, template),
            Syntax::ArrayLiteral(array) => self.array(buf, array),
            Syntax::ObjectLiteral(object) => self.object(buf, object),
            Syntax::ArrowFunction(_) | Syntax::FunctionDecl(_) => Err(CompileError::unsupported(
                ast,
                id,
                "functions cannot be used as values in a mapping template",
            )),
            Syntax::SyntaxError(err) => Err(CompileError::unsupported(ast, id, err.message.clone())),
            _ => Err(CompileError::unsupported(
                ast,
                id,
                "no mapping template equivalent",
            )),
        }
    }

    fn identifier(&self, id: NodeId, name: &str) -> Result<String> {
        if name == SFN {
            return Err(CompileError::ContextMismatch {
                node: id,
                construct: SFN.to_string(),
                expected: "workflow",
            });
        }
        if name == UTIL {
            return Ok(UTIL.to_string());
        }
        if self.context.as_deref() == Some(name) {
            return Ok("$context".to_string());
        }
        if name == "undefined" {
            return Ok("$null".to_string());
        }
        Ok(self.local(name))
    }

    /// Member suffix appended to a translated value, e.g. `.get(0)`.
    pub fn accessor(&mut self, buf: &mut Buffer, id: NodeId) -> Result<String> {
        let ast = self.ast;
        match ast.syntax(id) {
            Syntax::PropertyAccess(access) => Ok(member(&access.name)),
            Syntax::ElementAccess(access) => {
                let element = self.expression(buf, access.element)?;
                Ok(format!(".get({element})"))
            }
            _ => Err(CompileError::unsupported(ast, id, "expected a member access")),
        }
    }

    pub fn arguments(&mut self, buf: &mut Buffer, arguments: &[NodeId]) -> Result<String> {
        let mut values = Vec::with_capacity(arguments.len());
        for arg in arguments {
            values.push(self.expression(buf, *arg)?);
        }
        Ok(values.join(", "))
    }

    fn call(&mut self, buf: &mut Buffer, id: NodeId, call: &CallExpr) -> Result<String> {
        let ast = self.ast;
        if service_call(ast, id, self.resources)?.is_some() {
            return Err(CompileError::UnsupportedCallPosition {
                node: id,
                reason: "a service call must be the whole initializer, expression, or return \
                         value of a top-level statement"
                    .to_string(),
            });
        }
        let Some(access) = ast.try_cast::<PropertyAccess>(call.callee) else {
            return Err(CompileError::unsupported(
                ast,
                id,
                "only method calls can be translated",
            ));
        };
        if let Syntax::Identifier(object) = ast.syntax(access.expression) {
            if object.name == SFN {
                return Err(CompileError::ContextMismatch {
                    node: id,
                    construct: format!("{SFN}.{}", access.name),
                    expected: "workflow",
                });
            }
            if object.name == "JSON" {
                let function = match access.name.as_str() {
                    "stringify" => "$util.toJson",
                    "parse" => "$util.parseJson",
                    other => {
                        return Err(CompileError::unsupported(
                            ast,
                            id,
                            format!("JSON.{other} is not supported"),
                        ));
                    }
                };
                let argument = match call.arguments.first() {
                    Some(arg) => self.expression(buf, *arg)?,
                    None => "$null".to_string(),
                };
                return Ok(format!("{function}({argument})"));
            }
        }
        let base = self.expression(buf, access.expression)?;
        let arguments = self.arguments(buf, &call.arguments)?;
        let method = match access.name.as_str() {
            "push" => "add",
            "includes" => "contains",
            other => other,
        };
        Ok(format!("{base}.{method}({arguments})"))
    }

    fn binary(&mut self, buf: &mut Buffer, binary: &BinaryExpr) -> Result<String> {
        let op = match binary.operator {
            BinaryOp::Coalesce => return self.coalesce(buf, binary.left, binary.right),
            BinaryOp::And | BinaryOp::Or => {
                return self.logical(buf, binary.operator, binary.left, binary.right);
            }
            BinaryOp::Add if self.is_stringy(binary.left) || self.is_stringy(binary.right) => {
                let mut parts = Vec::new();
                self.concat_parts(binary.left, &mut parts);
                self.concat_parts(binary.right, &mut parts);
                return self.interpolate(buf, parts);
            }
            BinaryOp::Eq | BinaryOp::StrictEq => "==",
            BinaryOp::NotEq | BinaryOp::StrictNotEq => "!=",
            ref other => other.as_ref(),
        };
        let left = self.expression(buf, binary.left)?;
        let right = self.expression(buf, binary.right)?;
        Ok(format!("({left} {op} {right})"))
    }

    fn is_stringy(&self, id: NodeId) -> bool {
        match self.ast.syntax(id) {
            Syntax::StringLiteral(_) | Syntax::TemplateExpr(_) => true,
            Syntax::BinaryExpr(binary) if binary.operator == BinaryOp::Add => {
                self.is_stringy(binary.left) || self.is_stringy(binary.right)
            }
            _ => matches!(
                eval_to_constant(self.ast, id, self.references),
                Some(Constant::String(_))
            ),
        }
    }

    fn concat_parts(&self, id: NodeId, parts: &mut Vec<Part>) {
        match self.ast.syntax(id) {
            Syntax::BinaryExpr(binary) if binary.operator == BinaryOp::Add => {
                self.concat_parts(binary.left, parts);
                self.concat_parts(binary.right, parts);
            }
            _ => parts.push(Part::Expr(id)),
        }
    }

    fn template(&mut self, buf: &mut Buffer, template: &TemplateExpr) -> Result<String> {
        let mut parts = vec![Part::Literal(template.head.clone())];
        for span in &template.spans {
            parts.push(Part::Expr(span.expression));
            parts.push(Part::Literal(span.literal.clone()));
        }
        self.interpolate(buf, parts)
    }

    /// Build a double-quoted string interpolating every part.
    fn interpolate(&mut self, buf: &mut Buffer, parts: Vec<Part>) -> Result<String> {
        let mut out = String::from("\"");
        for part in parts {
            let text = match part {
                Part::Literal(text) => text,
                Part::Expr(expr) => match eval_to_constant(self.ast, expr, self.references) {
                    Some(constant) => constant.to_js_string(),
                    None => {
                        let value = self.expression(buf, expr)?;
                        let reference = if is_reference_chain(&value) {
                            value
                        } else {
                            let temp = self.temp();
                            buf.line(format!("#set({temp} = {value})"));
                            temp
                        };
                        out.push_str(&formal(&reference));
                        continue;
                    }
                },
            };
            if text.is_empty() {
                continue;
            }
            if is_safe_fragment(&text) {
                out.push_str(&text);
            } else {
                let temp = self.temp();
                buf.line(format!("#set({temp} = {})", vtl_string(&text)));
                out.push_str(&formal(&temp));
            }
        }
        out.push('"');
        Ok(out)
    }

    /// `&&` and `||` in value position yield one of their operands; the right
    /// operand is only evaluated when the left one does not decide.
    fn logical(&mut self, buf: &mut Buffer, op: BinaryOp, left: NodeId, right: NodeId) -> Result<String> {
        let left = self.expression(buf, left)?;
        let temp = self.temp();
        buf.line(format!("#set({temp} = {left})"));
        match op {
            BinaryOp::And => buf.line(format!("#if({temp})")),
            _ => buf.line(format!("#if(!{temp})")),
        }
        buf.indent();
        let right = self.expression(buf, right)?;
        buf.line(format!("#set({temp} = {right})"));
        buf.dedent();
        buf.line("#end");
        Ok(temp)
    }

    /// An expression tested for truthiness. `&&` and `||` keep the template
    /// operators unless the right operand needs statements of its own.
    pub fn condition(&mut self, buf: &mut Buffer, id: NodeId) -> Result<String> {
        let ast = self.ast;
        if eval_to_constant(ast, id, self.references).is_none()
            && let Syntax::BinaryExpr(binary) = ast.syntax(id)
            && matches!(binary.operator, BinaryOp::And | BinaryOp::Or)
        {
            let mark = self.temps;
            let mut left_prep = Buffer::new();
            let mut right_prep = Buffer::new();
            let left = self.condition(&mut left_prep, binary.left)?;
            let right = self.condition(&mut right_prep, binary.right)?;
            if right_prep.is_empty() {
                buf.append(left_prep);
                return Ok(format!("({left} {} {right})", binary.operator.as_ref()));
            }
            self.temps = mark;
        }
        self.expression(buf, id)
    }

    fn coalesce(&mut self, buf: &mut Buffer, left: NodeId, right: NodeId) -> Result<String> {
        let left = self.expression(buf, left)?;
        let temp = self.temp();
        buf.line(format!("#set({temp} = {left})"));
        buf.line(format!("#if($util.isNull({temp}))"));
        buf.indent();
        let right = self.expression(buf, right)?;
        buf.line(format!("#set({temp} = {right})"));
        buf.dedent();
        buf.line("#end");
        Ok(temp)
    }

    fn conditional(&mut self, buf: &mut Buffer, conditional: &ConditionalExpr) -> Result<String> {
        let condition = self.condition(buf, conditional.condition)?;
        let temp = self.temp();
        buf.line(format!("#if({condition})"));
        buf.indent();
        let when_true = self.expression(buf, conditional.when_true)?;
        buf.line(format!("#set({temp} = {when_true})"));
        buf.dedent();
        buf.line("#else");
        buf.indent();
        let when_false = self.expression(buf, conditional.when_false)?;
        buf.line(format!("#set({temp} = {when_false})"));
        buf.dedent();
        buf.line("#end");
        Ok(temp)
    }

    fn array(&mut self, buf: &mut Buffer, array: &ArrayLiteral) -> Result<String> {
        let ast = self.ast;
        let has_spread = array
            .elements
            .iter()
            .any(|e| matches!(ast.syntax(*e), Syntax::SpreadElement(_)));
        if !has_spread {
            return Ok(format!("[{}]", self.arguments(buf, &array.elements)?));
        }
        let temp = self.temp();
        buf.line(format!("#set({temp} = [])"));
        for element in &array.elements {
            match ast.syntax(*element) {
                Syntax::SpreadElement(spread) => {
                    let value = self.expression(buf, spread.expression)?;
                    buf.line(format!("$util.qr({temp}.addAll({value}))"));
                }
                _ => {
                    let value = self.expression(buf, *element)?;
                    buf.line(format!("$util.qr({temp}.add({value}))"));
                }
            }
        }
        Ok(temp)
    }

    fn object(&mut self, buf: &mut Buffer, object: &ObjectLiteral) -> Result<String> {
        let ast = self.ast;
        let keys: Option<Vec<(String, NodeId)>> = object
            .properties
            .iter()
            .map(|prop| match ast.syntax(*prop) {
                Syntax::PropertyAssignment(assignment) => {
                    static_key(ast, assignment.name).map(|key| (key, assignment.value))
                }
                _ => None,
            })
            .collect();

        if let Some(entries) = keys {
            let mut rendered = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let value = self.expression(buf, value)?;
                rendered.push(format!("{}: {value}", vtl_string(&key)));
            }
            return Ok(format!("{{{}}}", rendered.join(", ")));
        }

        let temp = self.temp();
        buf.line(format!("#set({temp} = {{}})"));
        for prop in &object.properties {
            match ast.syntax(*prop) {
                Syntax::PropertyAssignment(assignment) => {
                    let key = match static_key(ast, assignment.name) {
                        Some(key) => vtl_string(&key),
                        None => match ast.syntax(assignment.name) {
                            Syntax::ComputedPropertyName(computed) => {
                                self.expression(buf, computed.expression)?
                            }
                            _ => self.expression(buf, assignment.name)?,
                        },
                    };
                    let value = self.expression(buf, assignment.value)?;
                    buf.line(format!("$util.qr({temp}.put({key}, {value}))"));
                }
                Syntax::SpreadAssignment(spread) => {
                    let value = self.expression(buf, spread.expression)?;
                    buf.line(format!("$util.qr({temp}.putAll({value}))"));
                }
                _ => {
                    return Err(CompileError::unsupported(
                        ast,
                        *prop,
                        "expected a property or a spread",
                    ));
                }
            }
        }
        Ok(temp)
    }
}

// ============================================================================
// Text helpers
// ============================================================================

/// Single-quoted template string; quotes are escaped by doubling.
pub(crate) fn vtl_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn stash_put(name: &str, value: &str) -> String {
    format!("$util.qr($context.stash.put('{name}', {value}))")
}

fn vtl_name(name: &str) -> String {
    name.replace('$', "_")
}

fn member(name: &str) -> String {
    if name == "length" {
        ".size()".to_string()
    } else if is_identifier_name(name) && !name.contains('$') {
        format!(".{name}")
    } else {
        format!(".get({})", vtl_string(name))
    }
}

fn parenthesize(expr: &str) -> String {
    if is_reference_chain(expr) || expr.starts_with('(') {
        expr.to_string()
    } else {
        format!("({expr})")
    }
}

/// `$a.b.c` with no calls or indexing.
fn is_reference_chain(expr: &str) -> bool {
    expr.len() > 1
        && expr.starts_with('$')
        && expr[1..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// `$a.b` as `${a.b}`, for use inside a double-quoted string.
fn formal(reference: &str) -> String {
    format!("${{{}}}", &reference[1..])
}

/// Text that can appear verbatim inside a double-quoted template string.
fn is_safe_fragment(text: &str) -> bool {
    !text.contains(['"', '$', '#', '\\'])
}

/// Template literal for a compile-time constant.
pub(crate) fn constant_literal(constant: &Constant) -> String {
    match constant {
        Constant::Undefined | Constant::Null => "$null".to_string(),
        Constant::Bool(value) => value.to_string(),
        Constant::Number(value) => format_number(*value),
        Constant::String(value) | Constant::Opaque(value) => vtl_string(value),
        Constant::Array(items) => format!(
            "[{}]",
            items.iter().map(constant_literal).collect::<Vec<_>>().join(", ")
        ),
        Constant::Object(entries) => format!(
            "{{{}}}",
            entries
                .iter()
                .map(|(key, value)| format!("{}: {}", vtl_string(key), constant_literal(value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}
