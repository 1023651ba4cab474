// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `$SFN` intrinsics: waits, map iterations and parallel branches.

use serde_json::{Map, Value};
use weft_ast::fold::static_key;
use weft_ast::NodeId;
use weft_ast::syntax::{ArrowFunction, CallExpr, NumberLiteral, ObjectLiteral, PropertyAssignment};

use super::compiler::{Graph, Placement, WorkflowCompiler};
use super::expressions::{Data, variable_path};
use super::states::{MapState, ParallelState, ResultPath, State, Transition, WaitState};
use crate::calls::{Intrinsic, find_identifier};
use crate::compile::parameter_name;
use crate::error::{CompileError, Result};

/// Context fields bound to the parameters of a map iteration, in order.
const ITEM_VALUE: &str = "$$.Map.Item.Value";
const ITEM_INDEX: &str = "$$.Map.Item.Index";

impl WorkflowCompiler<'_> {
    pub(crate) fn intrinsic(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        kind: Intrinsic,
        call: NodeId,
        placement: Placement,
    ) -> Result<()> {
        let ast = self.ast;
        let call_expr = ast.cast::<CallExpr>(call)?;
        match kind {
            Intrinsic::WaitFor | Intrinsic::WaitUntil => {
                self.wait(graph, node, kind, call, call_expr, placement)
            }
            Intrinsic::Map | Intrinsic::ForEach => {
                self.map(graph, node, kind, call, call_expr, placement)
            }
            Intrinsic::Parallel => self.parallel(graph, node, call, call_expr, placement),
        }
    }

    fn wait(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        kind: Intrinsic,
        call: NodeId,
        call_expr: &CallExpr,
        placement: Placement,
    ) -> Result<()> {
        let invalid = |reason: String| CompileError::InvalidServiceCall { node: call, reason };
        let [argument] = call_expr.arguments.as_slice() else {
            return Err(invalid(format!("{kind} expects exactly one argument")));
        };
        let transition = match placement {
            Placement::Return => Transition::end(),
            Placement::Discard | Placement::Variable(_) => self.transition(node),
        };
        let mut wait = WaitState {
            seconds: None,
            seconds_path: None,
            timestamp: None,
            timestamp_path: None,
            transition,
        };
        match (kind, self.data(*argument)?) {
            (Intrinsic::WaitFor, Data::Literal(Value::Number(seconds))) if seconds.is_u64() => {
                wait.seconds = Some(seconds)
            }
            (Intrinsic::WaitFor, Data::Path(path)) => wait.seconds_path = Some(path),
            (Intrinsic::WaitUntil, Data::Literal(Value::String(timestamp))) => {
                wait.timestamp = Some(timestamp)
            }
            (Intrinsic::WaitUntil, Data::Path(path)) => wait.timestamp_path = Some(path),
            (Intrinsic::WaitFor, _) => {
                return Err(invalid(format!(
                    "{kind} expects a whole number of seconds or a variable"
                )));
            }
            _ => return Err(invalid(format!("{kind} expects a timestamp string or a variable"))),
        }
        graph.insert(self.entry(node)?, State::Wait(wait));
        Ok(())
    }

    fn map(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        kind: Intrinsic,
        call: NodeId,
        call_expr: &CallExpr,
        placement: Placement,
    ) -> Result<()> {
        let ast = self.ast;
        let invalid = |reason: String| CompileError::InvalidServiceCall { node: call, reason };
        let (items, options, function) = match call_expr.arguments.as_slice() {
            [items, function] => (*items, None, *function),
            [items, options, function] => (*items, Some(*options), *function),
            _ => return Err(invalid(format!("{kind} expects (items, [options], function)"))),
        };
        let Some(arrow) = ast.try_cast::<ArrowFunction>(function) else {
            return Err(invalid(format!("the {kind} iteration must be an inline function")));
        };
        let items_path = match self.data(items)? {
            Data::Path(path) => path,
            _ => return Err(invalid(format!("{kind} items must be a variable"))),
        };
        let max_concurrency = options.map(|options| self.max_concurrency(options)).transpose()?;

        let mut names = Vec::with_capacity(arrow.parameters.len());
        for param in &arrow.parameters {
            let name = parameter_name(ast, *param).ok_or_else(|| {
                CompileError::unsupported(ast, *param, "parameters must be plain names")
            })?;
            names.push(name);
        }
        if names.len() > 3 {
            return Err(invalid(format!(
                "the {kind} iteration takes at most (item, index, items)"
            )));
        }

        // Captured variables first so the iteration parameters win.
        let mut parameters = Map::new();
        for captured in self.cf.lexical_scope(node).into_keys() {
            if !names.contains(&captured) && find_identifier(ast, arrow.body, &captured).is_some() {
                parameters.insert(format!("{captured}.$"), Value::String(variable_path(&captured)));
            }
        }
        let sources = [ITEM_VALUE, ITEM_INDEX, items_path.as_str()];
        for (name, source) in names.iter().zip(sources) {
            parameters.insert(format!("{name}.$"), Value::String(source.to_string()));
        }

        let iterator = self.subgraph(arrow.body)?;
        let catch = self.catchers(graph, node)?;
        let (result_path, transition) = self.placement(node, kind == Intrinsic::ForEach, placement);
        graph.insert(
            self.entry(node)?,
            State::Map(MapState {
                items_path,
                parameters: Some(Value::Object(parameters)),
                iterator,
                max_concurrency,
                result_path,
                catch,
                transition,
            }),
        );
        Ok(())
    }

    /// `{ maxConcurrency: <positive integer literal> }`
    fn max_concurrency(&self, options: NodeId) -> Result<u64> {
        let ast = self.ast;
        let invalid = |reason: &str| CompileError::InvalidConcurrency {
            node: options,
            reason: reason.to_string(),
        };
        let Some(object) = ast.try_cast::<ObjectLiteral>(options) else {
            return Err(invalid("options must be an object literal"));
        };
        let [property] = object.properties.as_slice() else {
            return Err(invalid("options must contain exactly one property, maxConcurrency"));
        };
        let Some(assignment) = ast.try_cast::<PropertyAssignment>(*property) else {
            return Err(invalid("options must contain exactly one property, maxConcurrency"));
        };
        if static_key(ast, assignment.name).as_deref() != Some("maxConcurrency") {
            return Err(invalid("the only supported option is maxConcurrency"));
        }
        let Some(NumberLiteral { value }) = ast.try_cast::<NumberLiteral>(assignment.value) else {
            return Err(invalid("maxConcurrency must be a number literal"));
        };
        if *value < 1.0 || value.fract() != 0.0 {
            return Err(invalid("maxConcurrency must be a positive integer"));
        }
        Ok(*value as u64)
    }

    fn parallel(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        call: NodeId,
        call_expr: &CallExpr,
        placement: Placement,
    ) -> Result<()> {
        let ast = self.ast;
        if call_expr.arguments.is_empty() {
            return Err(CompileError::InvalidBranch {
                node: call,
                reason: "parallel needs at least one branch".to_string(),
            });
        }
        let mut branches = Vec::with_capacity(call_expr.arguments.len());
        for argument in &call_expr.arguments {
            let Some(arrow) = ast.try_cast::<ArrowFunction>(*argument) else {
                return Err(CompileError::InvalidBranch {
                    node: *argument,
                    reason: format!("branches must be inline functions, found {}", ast.kind(*argument)),
                });
            };
            branches.push(self.subgraph(arrow.body)?);
        }
        let catch = self.catchers(graph, node)?;
        let (result_path, transition) = self.placement(node, false, placement);
        graph.insert(
            self.entry(node)?,
            State::Parallel(ParallelState {
                branches,
                result_path,
                catch,
                transition,
            }),
        );
        Ok(())
    }

    /// Result path and transition of a state producing a value.
    fn placement(
        &self,
        node: NodeId,
        discard: bool,
        placement: Placement,
    ) -> (Option<ResultPath>, Transition) {
        match placement {
            Placement::Return if discard => (Some(ResultPath::Discard), Transition::end()),
            Placement::Return => (None, Transition::end()),
            Placement::Variable(var) if !discard => (
                Some(ResultPath::Path(variable_path(&var))),
                self.transition(node),
            ),
            Placement::Variable(_) | Placement::Discard => {
                (Some(ResultPath::Discard), self.transition(node))
            }
        }
    }
}
