// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for compiling a whole document against one namespace.
//!
//! The document fixture lives in tests/fixtures.

mod common;

use common::load_fixture;
use serde_json::json;
use weft_compiler::workflow::State;
use weft_compiler::{ArtifactBundle, BackendKind, CompilationDocument, CompilerConfig, compile_document};

fn compile_fixture(filename: &str) -> ArtifactBundle {
    let document: CompilationDocument = serde_json::from_str(&load_fixture(filename))
        .unwrap_or_else(|e| panic!("Failed to parse {filename}: {e}"));
    compile_document(&document, &CompilerConfig::default()).unwrap()
}

#[test]
fn test_document_reads_resources_and_values() {
    let document: CompilationDocument = serde_json::from_str(&load_fixture("orders_api.json")).unwrap();
    assert_eq!(document.table.resources.len(), 2);
    assert!(document.table.resources["fulfil"].express);
    assert_eq!(document.resolvers.keys().collect::<Vec<_>>(), ["getOrder", "deleteOrder", "region"]);
    assert_eq!(document.workflows.len(), 1);
}

#[test]
fn test_data_sources_are_shared_across_resolvers() {
    let bundle = compile_fixture("orders_api.json");

    assert_eq!(bundle.data_sources.len(), 1);
    let source = &bundle.data_sources[0];
    assert_eq!(source.name, "orders_keyValueStore");
    assert_eq!(source.kind, BackendKind::KeyValueStore);
    assert_eq!(source.resource.identifier, "Orders");

    let stages: Vec<(&str, &str, Option<&str>)> = bundle
        .resolvers
        .iter()
        .flat_map(|pipeline| {
            pipeline
                .stages
                .iter()
                .map(|stage| (pipeline.name.as_str(), stage.name.as_str(), stage.data_source.as_deref()))
        })
        .collect();
    assert_eq!(
        stages,
        [
            ("getOrder", "getOrder_orders", Some("orders_keyValueStore")),
            ("deleteOrder", "deleteOrder_orders", Some("orders_keyValueStore")),
            ("region", "region", None),
        ]
    );
}

#[test]
fn test_reference_values_fold_into_templates() {
    let bundle = compile_fixture("orders_api.json");
    let region = bundle.resolvers.iter().find(|p| p.name == "region").unwrap();
    assert!(region.stages[0].response_template.contains("eu-west-1"));
}

#[test]
fn test_express_workflow_starts_synchronously() {
    let bundle = compile_fixture("orders_api.json");

    assert_eq!(bundle.workflows.len(), 1);
    let workflow = &bundle.workflows[0];
    assert_eq!(workflow.name, "processOrder");
    let Some(State::Task(task)) = workflow.definition.state("result = fulfil(...)") else {
        panic!("expected a task state, got {:?}", workflow.definition.states.keys());
    };
    assert_eq!(task.resource, "arn:aws:states:::states:startExecution.sync:2");
    assert_eq!(
        task.parameters,
        Some(json!({
            "StateMachineArn": "arn:aws:states:eu-west-1:1:stateMachine:fulfil",
            "Input.$": "$.order"
        }))
    );
}

#[test]
fn test_bundle_serializes_camel_case() {
    let bundle = compile_fixture("orders_api.json");
    let value = serde_json::to_value(&bundle).unwrap();
    assert!(value["dataSources"].is_array());
    assert_eq!(value["resolvers"][0]["stages"][0]["dataSource"], json!("orders_keyValueStore"));
    assert_eq!(value["workflows"][0]["definition"]["StartAt"], json!("Initialize"));
}
