// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! State machine backend.
//!
//! A workflow function compiles to one state machine. Variables live in the
//! state document at `$.<name>`; the first parameter receives the execution
//! input.
//!
//! - `states`: the serialized state machine model
//! - `compiler`: statements to states, wired through control flow
//! - `expressions`: paths, payload templates and choice conditions
//! - `intrinsics`: `$SFN.waitFor`, `waitUntil`, `map`, `forEach`, `parallel`

mod compiler;
mod expressions;
mod intrinsics;
mod naming;
pub mod states;

use serde::Serialize;
use tracing::info;

pub use states::{
    Catcher, ChoiceRule, ChoiceState, Condition, FailState, MapState, ParallelState, PassState,
    ResultPath, State, StateMachine, TaskState, Test, Transition, WaitState,
};

use crate::compile::CompilationInput;
use crate::error::Result;
use crate::namespace::Namespace;
use compiler::WorkflowCompiler;

/// A compiled workflow, named uniquely within its namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledWorkflow {
    pub name: String,
    pub definition: StateMachine,
}

/// Compile a workflow function to a state machine.
pub fn compile_workflow(
    input: &CompilationInput<'_>,
    namespace: &mut Namespace,
) -> Result<CompiledWorkflow> {
    let definition = WorkflowCompiler::new(input).compile()?;
    let name = namespace.unique_name(input.name);
    info!(
        workflow = %name,
        states = definition.states.len(),
        "Compiled workflow"
    );
    Ok(CompiledWorkflow { name, definition })
}
