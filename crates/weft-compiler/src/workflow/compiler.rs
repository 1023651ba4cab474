// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lowering of a function body to a graph of states.
//!
//! Every statement that does work gets a state named after it before any
//! state is emitted, so transitions can point forward and backward freely.
//! Successors come from [`ControlFlow`]:
//!
//! - `exit` of a statement is its `Next`; `None` ends the graph
//! - `throw` of a statement decides its `Catch` (or where a `throw` goes)
//! - a loop body falls back into the loop's re-entry state
//!
//! A finally block that intercepts errors stores the error in a slot and ends
//! in a choice that rethrows it once the block is done. Entering the try
//! statement clears the slot, as does handing the error on.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;
use weft_ast::fold::PathSegment;
use weft_ast::syntax::{ForOfStmt, IfStmt, NewExpr, ObjectLiteral, VariableStmt};
use weft_ast::{Ast, Constant, ControlFlow, NodeId, Syntax, Traversal, eval_to_constant};

use super::expressions::{Cond, Data, join_path, variable_path};
use super::naming::{StateNames, describe};
use super::states::{
    Catcher, ChoiceRule, ChoiceState, Condition, FailState, PassState, ResultPath, State,
    StateMachine, TaskState, Test, Transition,
};
use crate::calls::{CallSite, ServiceCall, ServiceOp, call_site, find_service_call, intrinsic, strip_await};
use crate::compile::{CompilationInput, parameter_name};
use crate::error::{CompileError, Result};

const SYNC_EXECUTION: &str = "arn:aws:states:::states:startExecution.sync:2";
const ASYNC_EXECUTION: &str = "arn:aws:states:::states:startExecution";

/// Where the value of a statement goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placement {
    Discard,
    Variable(String),
    Return,
}

/// The states a `for-of` loop expands to, besides its entry.
#[derive(Debug, Clone)]
struct LoopStates {
    check: String,
    assign: String,
    tail: String,
    /// Remaining items.
    slot: String,
}

/// Rethrow choice of a finally block and the slot holding the pending error.
#[derive(Debug, Clone)]
struct FinallyStates {
    rethrow: String,
    slot: String,
}

/// States of one graph under construction.
#[derive(Debug, Default)]
pub(crate) struct Graph {
    states: IndexMap<String, State>,
    done: Option<String>,
}

impl Graph {
    pub(crate) fn insert(&mut self, name: String, state: State) {
        self.states.insert(name, state);
    }
}

/// Thrown value, as separate parts or as an `{Error, Cause}` document.
#[derive(Debug, Clone)]
enum ErrorValue {
    Parts { error: Data, cause: Data },
    Path(String),
}

pub(crate) struct WorkflowCompiler<'a> {
    pub(crate) input: CompilationInput<'a>,
    pub(crate) ast: &'a Ast,
    pub(crate) cf: ControlFlow<'a>,
    pub(crate) names: StateNames,
    entries: HashMap<NodeId, String>,
    loops: HashMap<NodeId, LoopStates>,
    finallies: HashMap<NodeId, FinallyStates>,
    /// Slot-clearing entry state of each try statement with a finally block.
    resets: HashMap<NodeId, String>,
    slots: usize,
}

impl<'a> WorkflowCompiler<'a> {
    pub(crate) fn new(input: &CompilationInput<'a>) -> Self {
        Self {
            input: *input,
            ast: input.ast,
            cf: ControlFlow::new(input.ast),
            names: StateNames::new(input.config.state_name_max_len),
            entries: HashMap::new(),
            loops: HashMap::new(),
            finallies: HashMap::new(),
            resets: HashMap::new(),
            slots: 0,
        }
    }

    /// Compile the input function to a state machine.
    ///
    /// The start state moves the execution input to the first parameter's
    /// variable.
    pub(crate) fn compile(mut self) -> Result<StateMachine> {
        let ast = self.ast;
        let (parameters, body) = self.input.function_parts()?;
        let initialize = self.names.allocate("Initialize");
        let mut bound = Map::new();
        if let Some(param) = parameters.first() {
            let name = parameter_name(ast, *param)
                .ok_or_else(|| CompileError::unsupported(ast, *param, "parameters must be plain names"))?;
            bound.insert(format!("{name}.$"), Value::String("$".to_string()));
        }

        let statements = self.prepare(body)?;
        let mut graph = Graph::default();
        let mut start = PassState::new(self.target(body, self.cf.step(body)).into());
        start.parameters = Some(Value::Object(bound));
        graph.insert(initialize.clone(), State::Pass(start));
        self.emit_all(&mut graph, &statements)?;

        Ok(StateMachine {
            start_at: initialize,
            states: graph.states,
        })
    }

    /// Compile the body of an inline function to a nested graph.
    pub(crate) fn subgraph(&mut self, body: NodeId) -> Result<StateMachine> {
        let statements = self.prepare(body)?;
        let mut graph = Graph::default();
        let start_at = match self.target(body, self.cf.step(body)) {
            Some(start) => start,
            None => {
                let name = self.names.allocate("Empty");
                graph.insert(name.clone(), State::Pass(PassState::new(Transition::end())));
                name
            }
        };
        self.emit_all(&mut graph, &statements)?;
        Ok(StateMachine {
            start_at,
            states: graph.states,
        })
    }

    // ------------------------------------------------------------------------
    // Naming
    // ------------------------------------------------------------------------

    /// Statements of `body` in source order, not descending into nested
    /// functions.
    fn statements(&self, body: NodeId) -> Result<Vec<NodeId>> {
        let ast = self.ast;
        let mut out = Vec::new();
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            match ast.syntax(node) {
                Syntax::SyntaxError(err) => {
                    return Err(CompileError::unsupported(ast, node, err.message.clone()));
                }
                Syntax::FunctionDecl(_) => {
                    return Err(CompileError::unsupported(
                        ast,
                        node,
                        "nested function declarations are not supported in workflows",
                    ));
                }
                Syntax::ArrowFunction(_) => continue,
                _ => {}
            }
            if ast.is_statement(node) {
                out.push(node);
            }
            stack.extend(ast.children(node).iter().rev().copied());
        }
        Ok(out)
    }

    /// Reserve the names of every state `body` compiles to.
    fn prepare(&mut self, body: NodeId) -> Result<Vec<NodeId>> {
        let ast = self.ast;
        let statements = self.statements(body)?;
        for node in &statements {
            let node = *node;
            match ast.syntax(node) {
                Syntax::Block(_) => {
                    if self.finally_owner(node).is_some() {
                        let rethrow = self.names.allocate("finally");
                        let slot = self.slot("fnl");
                        self.finallies.insert(node, FinallyStates { rethrow, slot });
                    }
                }
                Syntax::TryStmt(stmt) => {
                    if stmt.finally_block.is_some() {
                        let reset = self.names.allocate(&describe(ast, node));
                        self.resets.insert(node, reset);
                    }
                }
                Syntax::CatchClause(_) => {}
                Syntax::VariableStmt(var) if var.initializer.is_none() => {}
                Syntax::ForOfStmt(_) => {
                    let entry = self.names.allocate(&describe(ast, node));
                    let parts = LoopStates {
                        check: self.names.allocate(&format!("{entry} check")),
                        assign: self.names.allocate(&format!("{entry} item")),
                        tail: self.names.allocate(&format!("{entry} rest")),
                        slot: self.slot("iter"),
                    };
                    self.entries.insert(node, entry);
                    self.loops.insert(node, parts);
                }
                _ => {
                    let name = self.names.allocate(&describe(ast, node));
                    self.entries.insert(node, name);
                }
            }
        }
        Ok(statements)
    }

    fn slot(&mut self, prefix: &str) -> String {
        let slot = format!("$.__{prefix}{}", self.slots);
        self.slots += 1;
        slot
    }

    /// The try statement whose finally block `block` is.
    fn finally_owner(&self, block: NodeId) -> Option<NodeId> {
        let parent = self.ast.parent(block)?;
        match self.ast.syntax(parent) {
            Syntax::TryStmt(stmt) if stmt.finally_block == Some(block) => Some(parent),
            _ => None,
        }
    }

    pub(crate) fn entry(&self, node: NodeId) -> Result<String> {
        self.entries.get(&node).cloned().ok_or_else(|| {
            CompileError::unsupported(self.ast, node, "statement is outside the compiled function")
        })
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// State that runs when control moves from `from` to the statement `to`.
    fn target(&self, from: NodeId, to: Option<NodeId>) -> Option<String> {
        if let Some(finally) = self.leaving_finally(from, to) {
            return self.finallies.get(&finally).map(|parts| parts.rethrow.clone());
        }
        let to = to?;
        if let Some(try_stmt) = self.entered_try(from, to) {
            return self.resets.get(&try_stmt).cloned();
        }
        if let Some(parts) = self.loops.get(&to)
            && (to == from || self.ast.contains(to, from, Traversal::DepthFirst))
        {
            return Some(parts.tail.clone());
        }
        self.entries.get(&to).cloned()
    }

    /// The finally block that `from` completes by moving to `to`.
    fn leaving_finally(&self, from: NodeId, to: Option<NodeId>) -> Option<NodeId> {
        for ancestor in self.ast.ancestors(from) {
            if self.ast.kind(ancestor).is_function() {
                return None;
            }
            if self.finallies.contains_key(&ancestor)
                && let Some(try_stmt) = self.finally_owner(ancestor)
                && self.cf.exit(try_stmt) == to
            {
                return Some(ancestor);
            }
        }
        None
    }

    /// The outermost try statement with a finally block whose try block
    /// control enters when moving from `from` to `to`.
    fn entered_try(&self, from: NodeId, to: NodeId) -> Option<NodeId> {
        let mut entered = None;
        for ancestor in self.ast.ancestors(to) {
            if self.ast.kind(ancestor).is_function() {
                break;
            }
            if self.resets.contains_key(&ancestor)
                && let Syntax::TryStmt(stmt) = self.ast.syntax(ancestor)
                && from != ancestor
                && from != stmt.try_block
                && !self.ast.contains(stmt.try_block, from, Traversal::DepthFirst)
                && self.ast.contains(stmt.try_block, to, Traversal::DepthFirst)
            {
                entered = Some(ancestor);
            }
        }
        entered
    }

    /// The try statement whose finally block a jump from `node` out to the
    /// loop `enclosing` would skip.
    fn skipped_finally(&self, node: NodeId, enclosing: NodeId) -> Option<NodeId> {
        let mut child = node;
        for ancestor in self.ast.ancestors(node) {
            if ancestor == enclosing {
                return None;
            }
            if let Syntax::TryStmt(stmt) = self.ast.syntax(ancestor)
                && stmt.finally_block.is_some_and(|finally| finally != child)
            {
                return Some(ancestor);
            }
            child = ancestor;
        }
        None
    }

    fn loop_jump(&self, node: NodeId, what: &str) -> Result<NodeId> {
        let ast = self.ast;
        let enclosing = self
            .cf
            .enclosing_loop(node)
            .ok_or_else(|| CompileError::unsupported(ast, node, format!("{what} outside of a loop")))?;
        if self.skipped_finally(node, enclosing).is_some() {
            return Err(CompileError::unsupported(
                ast,
                node,
                format!("{what} cannot leave a try statement that has a finally block"),
            ));
        }
        Ok(enclosing)
    }

    /// Transition of a statement that continues normally.
    pub(crate) fn transition(&self, node: NodeId) -> Transition {
        self.target(node, self.cf.exit(node)).into()
    }

    /// Like [`Self::target`], but ending the graph goes through a succeed
    /// state, for fields that must name a state.
    fn require(&mut self, graph: &mut Graph, from: NodeId, to: Option<NodeId>) -> String {
        match self.target(from, to) {
            Some(name) => name,
            None => self.done(graph),
        }
    }

    fn done(&mut self, graph: &mut Graph) -> String {
        if let Some(done) = &graph.done {
            return done.clone();
        }
        let name = self.names.allocate("Done");
        graph.insert(name.clone(), State::Succeed);
        graph.done = Some(name.clone());
        name
    }

    /// Catchers routing errors raised by `node` to its handler.
    pub(crate) fn catchers(&mut self, graph: &mut Graph, node: NodeId) -> Result<Vec<Catcher>> {
        let Some(handler) = self.cf.throw(node) else {
            return Ok(Vec::new());
        };
        let result_path = match self.ast.syntax(handler) {
            Syntax::CatchClause(clause) => match clause
                .variable
                .and_then(|variable| self.ast.try_cast::<VariableStmt>(variable))
            {
                Some(var) => ResultPath::Path(variable_path(&var.name)),
                None => ResultPath::Discard,
            },
            _ => ResultPath::Path(self.finally_slot(handler)?),
        };
        let next = self.require(graph, node, self.cf.step(handler));
        Ok(vec![Catcher::all(next, result_path)])
    }

    fn finally_slot(&self, finally: NodeId) -> Result<String> {
        self.finallies
            .get(&finally)
            .map(|parts| parts.slot.clone())
            .ok_or_else(|| CompileError::unsupported(self.ast, finally, "finally block outside the compiled function"))
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn emit_all(&mut self, graph: &mut Graph, statements: &[NodeId]) -> Result<()> {
        for node in statements {
            self.emit(graph, *node)?;
        }
        Ok(())
    }

    fn emit(&mut self, graph: &mut Graph, node: NodeId) -> Result<()> {
        let ast = self.ast;
        match ast.syntax(node) {
            Syntax::Block(_) => {
                if self.finallies.contains_key(&node) {
                    self.rethrow(graph, node)?;
                }
                Ok(())
            }
            Syntax::TryStmt(stmt) => {
                let Some(reset) = self.resets.get(&node).cloned() else {
                    return Ok(());
                };
                let slot = match stmt.finally_block {
                    Some(finally) => self.finally_slot(finally)?,
                    None => return Ok(()),
                };
                let mut pass = PassState::new(self.target(node, self.cf.step(node)).into());
                pass.result = Some(Value::Null);
                pass.result_path = Some(ResultPath::Path(slot));
                graph.insert(reset, State::Pass(pass));
                Ok(())
            }
            Syntax::CatchClause(_) => Ok(()),
            Syntax::VariableStmt(var) => match var.initializer {
                Some(init) => self.value(graph, node, init, Placement::Variable(var.name.clone())),
                None => Ok(()),
            },
            Syntax::ExprStmt(stmt) => self.value(graph, node, stmt.expression, Placement::Discard),
            Syntax::ReturnStmt(ret) => match ret.expression {
                Some(expr) => self.value(graph, node, expr, Placement::Return),
                None => {
                    let mut pass = PassState::new(Transition::end());
                    pass.result = Some(Value::Null);
                    graph.insert(self.entry(node)?, State::Pass(pass));
                    Ok(())
                }
            },
            Syntax::ThrowStmt(throw) => {
                let error = self.thrown(throw.expression)?;
                let handler = self.cf.throw(node);
                let name = self.entry(node)?;
                self.deliver(graph, name, node, handler, error)
            }
            Syntax::IfStmt(stmt) => self.if_stmt(graph, node, stmt),
            Syntax::WhileStmt(stmt) => self.loop_check(graph, node, stmt.condition, stmt.body),
            Syntax::DoStmt(stmt) => self.loop_check(graph, node, stmt.condition, stmt.body),
            Syntax::ForOfStmt(stmt) => self.for_of(graph, node, stmt),
            Syntax::ForInStmt(_) => Err(CompileError::unsupported(
                ast,
                node,
                "for-in loops are not supported in workflows",
            )),
            Syntax::BreakStmt => {
                let enclosing = self.loop_jump(node, "break")?;
                let pass = PassState::new(self.target(node, self.cf.exit(enclosing)).into());
                graph.insert(self.entry(node)?, State::Pass(pass));
                Ok(())
            }
            Syntax::ContinueStmt => {
                let enclosing = self.loop_jump(node, "continue")?;
                let pass = PassState::new(self.target(node, Some(enclosing)).into());
                graph.insert(self.entry(node)?, State::Pass(pass));
                Ok(())
            }
            Syntax::EmptyStmt => {
                let pass = PassState::new(self.transition(node));
                graph.insert(self.entry(node)?, State::Pass(pass));
                Ok(())
            }
            _ => Err(CompileError::unsupported(
                ast,
                node,
                "statement has no state machine translation",
            )),
        }
    }

    /// A statement that evaluates `expr` and places its value.
    fn value(&mut self, graph: &mut Graph, node: NodeId, expr: NodeId, placement: Placement) -> Result<()> {
        let ast = self.ast;
        if let Some((kind, call)) = intrinsic(ast, expr)? {
            return self.intrinsic(graph, node, kind, call, placement);
        }
        if let Some(site) = call_site(ast, expr, self.input.resources)? {
            for argument in &site.call.arguments {
                if let Some(nested) = find_service_call(ast, *argument, self.input.resources)? {
                    return Err(CompileError::UnsupportedCallPosition {
                        node: nested,
                        reason: "service calls cannot be nested in arguments".to_string(),
                    });
                }
            }
            return self.task(graph, node, &site, placement);
        }
        let data = self.data(expr)?;
        self.assign(graph, node, data, placement)
    }

    fn assign(&mut self, graph: &mut Graph, node: NodeId, data: Data, placement: Placement) -> Result<()> {
        let name = self.entry(node)?;
        let returns = placement == Placement::Return;
        let (mut pass, unwrap) = match placement {
            Placement::Discard => {
                let mut pass = PassState::new(self.transition(node));
                pass.result_path = Some(ResultPath::Discard);
                (pass, None)
            }
            Placement::Variable(var) => {
                let target = variable_path(&var);
                let mut pass = PassState::new(self.transition(node));
                pass.result_path = Some(ResultPath::Path(target.clone()));
                let unwrap = matches!(data, Data::Intrinsic(_)).then(|| {
                    let mut unwrap = PassState::new(pass.transition.clone());
                    unwrap.input_path = Some(format!("{target}.value"));
                    unwrap.result_path = Some(ResultPath::Path(target));
                    unwrap
                });
                (pass, unwrap)
            }
            Placement::Return => (PassState::new(Transition::end()), None),
        };
        match data {
            Data::Literal(value) => pass.result = Some(value),
            Data::Path(path) => pass.input_path = Some(path),
            Data::Object(fields) => pass.parameters = Some(Value::Object(fields)),
            Data::Intrinsic(call) => {
                pass.parameters = Some(json!({ "value.$": call }));
                if returns {
                    pass.output_path = Some("$.value".to_string());
                }
            }
        }
        if matches!(pass.result_path, Some(ResultPath::Discard)) {
            pass.result = None;
            pass.input_path = None;
            pass.parameters = None;
        }
        match unwrap {
            Some(unwrap) => {
                let unwrap_name = self.names.allocate(&format!("{name} value"));
                pass.transition = Transition::next(unwrap_name.clone());
                graph.insert(name, State::Pass(pass));
                graph.insert(unwrap_name, State::Pass(unwrap));
            }
            None => graph.insert(name, State::Pass(pass)),
        }
        Ok(())
    }

    /// A task state for a service call.
    fn task(&mut self, graph: &mut Graph, node: NodeId, site: &CallSite, placement: Placement) -> Result<()> {
        let name = self.entry(node)?;
        let mut task = self.service_task(&site.call)?;
        task.catch = self.catchers(graph, node)?;
        task.transition = self.transition(node);
        let selection = self.accessor_path(&site.accessors)?;

        let mut select = None;
        match placement {
            Placement::Discard => task.result_path = Some(ResultPath::Discard),
            Placement::Return => {
                task.transition = Transition::end();
                if !selection.is_empty() {
                    task.output_path = Some(join_path("$", node, &selection));
                }
            }
            Placement::Variable(var) => {
                let target = variable_path(&var);
                task.result_path = Some(ResultPath::Path(target.clone()));
                if !selection.is_empty() {
                    let mut pass = PassState::new(task.transition.clone());
                    pass.input_path = Some(join_path(&target, node, &selection));
                    pass.result_path = Some(ResultPath::Path(target));
                    let select_name = self.names.allocate(&format!("{name} result"));
                    task.transition = Transition::next(select_name.clone());
                    select = Some((select_name, pass));
                }
            }
        }
        debug!(state = %name, resource = %task.resource, "Compiled task state");
        graph.insert(name, State::Task(task));
        if let Some((select_name, pass)) = select {
            graph.insert(select_name, State::Pass(pass));
        }
        Ok(())
    }

    fn service_task(&self, call: &ServiceCall) -> Result<TaskState> {
        let mut task = TaskState {
            resource: String::new(),
            parameters: None,
            input_path: None,
            result_path: None,
            output_path: None,
            catch: Vec::new(),
            transition: Transition::end(),
        };
        let invalid = |reason: &str| CompileError::InvalidServiceCall {
            node: call.node,
            reason: reason.to_string(),
        };
        match call.op {
            ServiceOp::Invoke => {
                task.resource = call.resource.identifier.clone();
                match call.arguments.first() {
                    None => task.parameters = Some(json!({})),
                    Some(argument) => match self.data(*argument)? {
                        Data::Object(fields) => task.parameters = Some(Value::Object(fields)),
                        Data::Literal(value @ Value::Object(_)) => task.parameters = Some(value),
                        Data::Path(path) => task.input_path = Some(path),
                        _ => return Err(invalid("the payload must be an object or a variable")),
                    },
                }
            }
            ServiceOp::KeyValue(op) => {
                task.resource = format!("arn:aws:states:::aws-sdk:dynamodb:{op}");
                let mut parameters = Map::new();
                parameters.insert(
                    "TableName".to_string(),
                    Value::String(call.resource.identifier.clone()),
                );
                if let Some(argument) = call.arguments.first() {
                    let Some(object) = self.ast.try_cast::<ObjectLiteral>(*argument) else {
                        return Err(invalid(&format!("{op} expects an object literal argument")));
                    };
                    for (key, value) in self.object(object)? {
                        parameters.insert(pascal_case(&key), value);
                    }
                }
                task.parameters = Some(Value::Object(parameters));
            }
            ServiceOp::StartExecution { sync } => {
                task.resource = if sync { SYNC_EXECUTION } else { ASYNC_EXECUTION }.to_string();
                let mut parameters = Map::new();
                parameters.insert(
                    "StateMachineArn".to_string(),
                    Value::String(call.resource.identifier.clone()),
                );
                if let Some(argument) = call.arguments.first() {
                    self.data(*argument)?.insert_into(&mut parameters, "Input");
                }
                task.parameters = Some(Value::Object(parameters));
            }
        }
        Ok(task)
    }

    /// Constant path of the member accesses applied to a call result.
    fn accessor_path(&self, accessors: &[NodeId]) -> Result<Vec<PathSegment>> {
        let ast = self.ast;
        accessors
            .iter()
            .map(|accessor| match ast.syntax(*accessor) {
                Syntax::PropertyAccess(access) => Ok(PathSegment::Key(access.name.clone())),
                Syntax::ElementAccess(access) => {
                    match eval_to_constant(ast, access.element, self.input.references) {
                        Some(Constant::String(key)) => Ok(PathSegment::Key(key)),
                        Some(Constant::Number(n)) if n >= 0.0 && n.fract() == 0.0 => {
                            Ok(PathSegment::Index(n as usize))
                        }
                        _ => Err(CompileError::unsupported(
                            ast,
                            *accessor,
                            "results can only be indexed by constants",
                        )),
                    }
                }
                _ => Err(CompileError::unsupported(ast, *accessor, "not a member access")),
            })
            .collect()
    }

    fn if_stmt(&mut self, graph: &mut Graph, node: NodeId, stmt: &IfStmt) -> Result<()> {
        let name = self.entry(node)?;
        let then_to = self.cf.step(stmt.then_stmt);
        let else_to = match stmt.else_stmt {
            Some(else_stmt) => self.cf.step(else_stmt),
            None => self.cf.exit(node),
        };
        let state = match self.condition(stmt.condition)? {
            Cond::Constant(taken) => {
                let to = if taken { then_to } else { else_to };
                State::Pass(PassState::new(self.target(node, to).into()))
            }
            Cond::Rule(condition) => {
                let next = self.require(graph, node, then_to);
                let default = self.require(graph, node, else_to);
                State::Choice(ChoiceState {
                    choices: vec![ChoiceRule { condition, next }],
                    default: Some(default),
                })
            }
        };
        graph.insert(name, state);
        Ok(())
    }

    /// The condition check of a `while` or `do` loop.
    fn loop_check(&mut self, graph: &mut Graph, node: NodeId, condition: NodeId, body: NodeId) -> Result<()> {
        let name = self.entry(node)?;
        let body_to = self.cf.step(body);
        let exit_to = self.cf.exit(node);
        let state = match self.condition(condition)? {
            Cond::Constant(true) => State::Pass(PassState::new(self.target(node, body_to).into())),
            Cond::Constant(false) => State::Pass(PassState::new(self.target(node, exit_to).into())),
            Cond::Rule(condition) => {
                let next = self.require(graph, node, body_to);
                let default = self.require(graph, node, exit_to);
                State::Choice(ChoiceState {
                    choices: vec![ChoiceRule { condition, next }],
                    default: Some(default),
                })
            }
        };
        graph.insert(name, state);
        Ok(())
    }

    /// `for-of` walks a copy of the items, taking the head on each round.
    fn for_of(&mut self, graph: &mut Graph, node: NodeId, stmt: &ForOfStmt) -> Result<()> {
        let ast = self.ast;
        let name = self.entry(node)?;
        let parts = self
            .loops
            .get(&node)
            .cloned()
            .ok_or_else(|| CompileError::unsupported(ast, node, "loop outside the compiled function"))?;
        let Some(variable) = ast.try_cast::<VariableStmt>(stmt.variable) else {
            return Err(CompileError::unsupported(ast, stmt.variable, "loop variables must be declarations"));
        };

        let mut init = PassState::new(Transition::next(parts.check.clone()));
        match self.data(stmt.expression)? {
            Data::Literal(items @ Value::Array(_)) => init.result = Some(items),
            Data::Path(path) => init.input_path = Some(path),
            Data::Intrinsic(call) if call.starts_with("States.Array(") => {
                init.parameters = Some(json!({ "value.$": call }));
            }
            _ => {
                return Err(CompileError::unsupported(
                    ast,
                    stmt.expression,
                    "for-of loops iterate over arrays",
                ));
            }
        }
        init.result_path = Some(ResultPath::Path(parts.slot.clone()));
        let items = if init.parameters.is_some() {
            format!("{}.value", parts.slot)
        } else {
            parts.slot.clone()
        };

        let head = format!("{items}[0]");
        let exit = self.require(graph, node, self.cf.exit(node));
        let check = ChoiceState {
            choices: vec![ChoiceRule {
                condition: Condition::test(head.clone(), Test::IsPresent(true)),
                next: parts.assign.clone(),
            }],
            default: Some(exit),
        };

        let mut assign = PassState::new(self.target(node, self.cf.step(stmt.body)).into());
        assign.input_path = Some(head);
        assign.result_path = Some(ResultPath::Path(variable_path(&variable.name)));

        let mut tail = PassState::new(Transition::next(parts.check.clone()));
        tail.input_path = Some(format!("{items}[1:]"));
        tail.result_path = Some(ResultPath::Path(parts.slot.clone()));
        if init.parameters.is_some() {
            tail.result_path = Some(ResultPath::Path(format!("{}.value", parts.slot)));
        }

        graph.insert(name, State::Pass(init));
        graph.insert(parts.check, State::Choice(check));
        graph.insert(parts.assign, State::Pass(assign));
        graph.insert(parts.tail, State::Pass(tail));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------------

    fn thrown(&self, expr: NodeId) -> Result<ErrorValue> {
        let ast = self.ast;
        let expr = strip_await(ast, expr);
        if let Some(new) = ast.try_cast::<NewExpr>(expr) {
            let error = match ast.syntax(new.callee) {
                Syntax::Identifier(ident) => ident.name.clone(),
                _ => "Error".to_string(),
            };
            let cause = match new.arguments.first() {
                Some(message) => self.data(*message)?,
                None => Data::Literal(Value::String(String::new())),
            };
            return Ok(ErrorValue::Parts {
                error: Data::Literal(Value::String(error)),
                cause,
            });
        }
        Ok(ErrorValue::Parts {
            error: Data::Literal(Value::String("Error".to_string())),
            cause: self.data(expr)?,
        })
    }

    /// Emit state `name` handing `error` to `handler`, or failing the
    /// execution when nothing handles it.
    fn deliver(
        &mut self,
        graph: &mut Graph,
        name: String,
        from: NodeId,
        handler: Option<NodeId>,
        error: ErrorValue,
    ) -> Result<()> {
        let ast = self.ast;
        let Some(handler) = handler else {
            let mut fail = FailState::default();
            match error {
                ErrorValue::Path(path) => {
                    fail.error_path = Some(format!("{path}.Error"));
                    fail.cause_path = Some(format!("{path}.Cause"));
                }
                ErrorValue::Parts { error, cause } => {
                    (fail.error, fail.error_path) = self.fail_field(from, error)?;
                    (fail.cause, fail.cause_path) = self.fail_field(from, cause)?;
                }
            }
            graph.insert(name, State::Fail(fail));
            return Ok(());
        };

        let result_path = match ast.syntax(handler) {
            Syntax::CatchClause(clause) => clause
                .variable
                .and_then(|variable| ast.try_cast::<VariableStmt>(variable))
                .map(|var| variable_path(&var.name)),
            _ => Some(self.finally_slot(handler)?),
        };
        let mut next = self.require(graph, from, self.cf.step(handler));
        if let ErrorValue::Path(slot) = &error {
            let reset = self.names.allocate(&format!("{name} reset"));
            let mut clear = PassState::new(Transition::next(next));
            clear.result = Some(Value::Null);
            clear.result_path = Some(ResultPath::Path(slot.clone()));
            graph.insert(reset.clone(), State::Pass(clear));
            next = reset;
        }
        let mut pass = PassState::new(Transition::next(next));
        if let Some(result_path) = result_path {
            match error {
                ErrorValue::Path(path) => pass.input_path = Some(path),
                ErrorValue::Parts { error, cause } => {
                    let mut document = Map::new();
                    error.insert_into(&mut document, "Error");
                    cause.insert_into(&mut document, "Cause");
                    pass.parameters = Some(Value::Object(document));
                }
            }
            pass.result_path = Some(ResultPath::Path(result_path));
        }
        graph.insert(name, State::Pass(pass));
        Ok(())
    }

    fn fail_field(&self, from: NodeId, data: Data) -> Result<(Option<String>, Option<String>)> {
        match data {
            Data::Literal(Value::String(text)) => Ok((Some(text), None)),
            Data::Literal(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => {
                Ok((Some(value.to_string()), None))
            }
            Data::Path(path) | Data::Intrinsic(path) => Ok((None, Some(path))),
            Data::Literal(_) | Data::Object(_) => Err(CompileError::unsupported(
                self.ast,
                from,
                "thrown values must be strings or variables",
            )),
        }
    }

    /// The choice ending an intercepting finally block.
    fn rethrow(&mut self, graph: &mut Graph, finally: NodeId) -> Result<()> {
        let ast = self.ast;
        let parts = self
            .finallies
            .get(&finally)
            .cloned()
            .ok_or_else(|| CompileError::unsupported(ast, finally, "finally block outside the compiled function"))?;
        let try_stmt = self
            .finally_owner(finally)
            .ok_or_else(|| CompileError::unsupported(ast, finally, "finally block without try statement"))?;

        let default = self.require(graph, finally, self.cf.exit(try_stmt));
        let raise = self.names.allocate(&format!("{} raise", parts.rethrow));
        let pending = Condition::and(vec![
            Condition::test(parts.slot.clone(), Test::IsPresent(true)),
            Condition::test(parts.slot.clone(), Test::IsNull(false)),
        ]);
        graph.insert(
            parts.rethrow,
            State::Choice(ChoiceState {
                choices: vec![ChoiceRule {
                    condition: pending,
                    next: raise.clone(),
                }],
                default: Some(default),
            }),
        );
        let handler = self.cf.throw(finally);
        self.deliver(graph, raise, finally, handler, ErrorValue::Path(parts.slot))
    }
}

fn pascal_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
