// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Weft Compiler - Functions to Resolver Pipelines and State Machines
//!
//! This crate compiles the syntax tree of a function into one of two targets:
//!
//! - A **resolver pipeline**: ordered request/response mapping templates, one
//!   stage per service call, bound to data sources
//! - A **workflow**: a state machine definition whose states mirror the
//!   function's statements
//!
//! # Compilation Pipeline
//!
//! ```text
//!     ┌─────────────┐      ┌─────────────┐      ┌──────────────────┐
//!     │ Syntax tree │      │  Arena AST  │      │ Pipeline stages  │
//!     │   (JSON)    │─────▶│ + control   │─────▶│        or        │
//!     │             │      │   flow      │      │  State machine   │
//!     └─────────────┘      └─────────────┘      └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use weft_compiler::{CompilationDocument, CompilerConfig, compile_document};
//!
//! let document: CompilationDocument = serde_json::from_str(&json)?;
//! let bundle = compile_document(&document, &CompilerConfig::from_env()?)?;
//! println!("{}", serde_json::to_string_pretty(&bundle)?);
//! ```
//!
//! # Modules
//!
//! - [`calls`]: Recognition of service calls and `$SFN` intrinsics
//! - [`compile`]: Compilation inputs and whole-document orchestration
//! - [`config`]: Compiler settings
//! - [`namespace`]: Unique names and data sources shared across one API
//! - [`resolver`]: Mapping template pipelines
//! - [`resources`]: Backends that references resolve to
//! - [`workflow`]: State machine definitions

pub mod calls;
pub mod compile;
pub mod config;
pub mod error;
pub mod namespace;
pub mod resolver;
pub mod resources;
pub mod workflow;

pub use compile::{ArtifactBundle, CompilationDocument, CompilationInput, compile_document};
pub use config::CompilerConfig;
pub use error::{CompileError, Result};
pub use namespace::{DataSource, Namespace};
pub use resolver::{PipelineStage, ResolverPipeline, compile_resolver};
pub use resources::{BackendKind, Resource, ResourceResolver, ResourceTable};
pub use workflow::{CompiledWorkflow, StateMachine, compile_workflow};
