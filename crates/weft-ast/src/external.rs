// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Values of external references resolved at infrastructure-wiring time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Runtime value a [`ReferenceExpr`](crate::syntax::ReferenceExpr) resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A handle that is constant but has no literal form, such as a table.
    Opaque { handle: String },
}

/// Evaluates external references by name.
pub trait ReferenceEvaluator {
    fn evaluate(&self, name: &str) -> Option<ExternalValue>;
}

/// An evaluator that knows no references.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceEvaluator for NoReferences {
    fn evaluate(&self, _name: &str) -> Option<ExternalValue> {
        None
    }
}

impl ReferenceEvaluator for HashMap<String, ExternalValue> {
    fn evaluate(&self, name: &str) -> Option<ExternalValue> {
        self.get(name).cloned()
    }
}
