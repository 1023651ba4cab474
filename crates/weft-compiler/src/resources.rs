// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Backends that service calls resolve to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use weft_ast::{ExternalValue, ReferenceEvaluator};

/// The kind of backend a referenced resource is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BackendKind {
    /// A table with item operations.
    KeyValueStore,
    /// A function invoked with a payload.
    ComputeFunction,
    /// A state machine started with an input.
    WorkflowOrchestrator,
}

/// A concrete backend behind a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub kind: BackendKind,
    /// Table name, function ARN, or state machine ARN.
    pub identifier: String,
    /// Express state machines are started synchronously.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub express: bool,
}

impl Resource {
    pub fn new(kind: BackendKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            express: false,
        }
    }

    /// Mark a workflow orchestrator as express.
    pub fn express(mut self) -> Self {
        self.express = true;
        self
    }
}

/// Maps a reference name to the backend it is bound to.
pub trait ResourceResolver {
    fn resolve(&self, name: &str) -> Option<Resource>;
}

/// Resources and plain values known for one compilation, as read from the
/// input document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceTable {
    #[serde(default)]
    pub resources: IndexMap<String, Resource>,
    #[serde(default)]
    pub values: IndexMap<String, ExternalValue>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, name: impl Into<String>, resource: Resource) -> Self {
        self.resources.insert(name.into(), resource);
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: ExternalValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

impl ResourceResolver for ResourceTable {
    fn resolve(&self, name: &str) -> Option<Resource> {
        self.resources.get(name).cloned()
    }
}

impl ReferenceEvaluator for ResourceTable {
    /// Plain values evaluate to themselves; resources to an opaque handle
    /// carrying their identifier.
    fn evaluate(&self, name: &str) -> Option<ExternalValue> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }
        self.resources.get(name).map(|resource| ExternalValue::Opaque {
            handle: resource.identifier.clone(),
        })
    }
}
