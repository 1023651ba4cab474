// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compiler configuration.

use std::env;

use crate::error::{CompileError, Result};

const DEFAULT_TEMPLATE_VERSION: &str = "2018-05-29";

/// Settings shared by both backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Mapping template version written into request templates (default: "2018-05-29")
    pub template_version: String,
    /// Iteration bound of a `while` loop in a mapping template (default: 1000)
    pub max_loop_iterations: usize,
    /// Longest state name emitted in a state machine (default: 75)
    pub state_name_max_len: usize,
    /// Pretty-print JSON artifacts (CLI only, default: false)
    pub pretty_output: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            template_version: DEFAULT_TEMPLATE_VERSION.to_string(),
            max_loop_iterations: 1000,
            state_name_max_len: 75,
            pretty_output: false,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Optional Environment Variables
    /// - `WEFT_TEMPLATE_VERSION` - Mapping template version (default: "2018-05-29")
    /// - `WEFT_MAX_LOOP_ITERATIONS` - Bound for `while` loops in templates (default: 1000)
    /// - `WEFT_STATE_NAME_MAX_LEN` - Longest state name (default: 75)
    /// - `WEFT_PRETTY_OUTPUT` - Pretty-print artifacts (default: false)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let template_version =
            env::var("WEFT_TEMPLATE_VERSION").unwrap_or(defaults.template_version);

        let max_loop_iterations =
            positive_from_env("WEFT_MAX_LOOP_ITERATIONS", defaults.max_loop_iterations)?;

        let state_name_max_len =
            positive_from_env("WEFT_STATE_NAME_MAX_LEN", defaults.state_name_max_len)?;
        if state_name_max_len > 80 {
            return Err(CompileError::Config(format!(
                "WEFT_STATE_NAME_MAX_LEN must be at most 80, got {state_name_max_len}"
            )));
        }

        let pretty_output = env::var("WEFT_PRETTY_OUTPUT")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            template_version,
            max_loop_iterations,
            state_name_max_len,
            pretty_output,
        })
    }

    /// Set the `while` loop bound.
    pub fn with_max_loop_iterations(mut self, iterations: usize) -> Self {
        self.max_loop_iterations = iterations;
        self
    }

    /// Set the longest state name.
    pub fn with_state_name_max_len(mut self, len: usize) -> Self {
        self.state_name_max_len = len;
        self
    }
}

fn positive_from_env(key: &str, default: usize) -> Result<usize> {
    match env::var(key) {
        Ok(raw) => match raw.parse::<usize>() {
            Ok(0) | Err(_) => Err(CompileError::Config(format!(
                "invalid {key}: expected a positive integer, got '{raw}'"
            ))),
            Ok(value) => Ok(value),
        },
        Err(_) => Ok(default),
    }
}
