// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Names and data sources shared by every compilation against one API.
//!
//! A [`Namespace`] lives as long as the set of resolvers and workflows that
//! target the same API; every compilation takes it by `&mut` so later
//! compilations see the names earlier ones allocated.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::resources::{BackendKind, Resource};

/// A backend binding used by one or more pipeline stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub name: String,
    pub kind: BackendKind,
    pub resource: Resource,
}

/// Unique-name counters and the data source cache of one API.
#[derive(Debug, Default)]
pub struct Namespace {
    allocated: HashSet<String>,
    counters: HashMap<String, usize>,
    /// Data sources keyed by the reference name they were created for.
    data_sources: IndexMap<String, DataSource>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `name`, or `name_0`, `name_1`, ... once it is taken.
    pub fn unique_name(&mut self, name: &str) -> String {
        let base = sanitize(name);
        if self.allocated.insert(base.clone()) {
            return base;
        }
        let counter = self.counters.entry(base.clone()).or_insert(0);
        loop {
            let candidate = format!("{base}_{counter}");
            *counter += 1;
            if self.allocated.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// The data source for `reference`, created on first use.
    pub fn data_source(&mut self, reference: &str, resource: &Resource) -> DataSource {
        if let Some(existing) = self.data_sources.get(reference) {
            return existing.clone();
        }
        let name = self.unique_name(&format!("{reference}_{}", resource.kind));
        debug!(reference, data_source = %name, kind = %resource.kind, "Allocated data source");
        let source = DataSource {
            name,
            kind: resource.kind,
            resource: resource.clone(),
        };
        self.data_sources.insert(reference.to_string(), source.clone());
        source
    }

    /// Every data source allocated so far, in allocation order.
    pub fn data_sources(&self) -> impl Iterator<Item = &DataSource> {
        self.data_sources.values()
    }
}

/// Replace characters that are not valid in a function or data source name.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
