// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Weft compiler CLI
//!
//! Compiles a document of resolver and workflow syntax trees to JSON artifacts.
//!
//! Usage:
//!
//! ```text
//! weft-compile --input <path> [--output <path>] [--pretty]
//! ```
//!
//! Example:
//!
//! ```text
//! weft-compile --input api.json --output artifacts.json --pretty
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use weft_compiler::{CompilationDocument, CompilerConfig, compile_document};

fn print_usage() {
    eprintln!(
        r#"Usage: weft-compile [OPTIONS]

Compile resolver and workflow syntax trees to pipelines and state machines.

OPTIONS:
    --input <path>       Path to the compilation document (required)
    --output <path>      Output file (default: stdout)
    --pretty             Pretty-print the artifacts
    --help               Show this help message

ENVIRONMENT:
    WEFT_TEMPLATE_VERSION       Mapping template version (default: 2018-05-29)
    WEFT_MAX_LOOP_ITERATIONS    Bound for while loops in templates (default: 1000)
    WEFT_STATE_NAME_MAX_LEN     Longest state name (default: 75)
    WEFT_PRETTY_OUTPUT          Pretty-print artifacts (default: false)
    RUST_LOG                    Log filter (default: warn)
"#
    );
}

struct Args {
    input_path: PathBuf,
    output_path: Option<PathBuf>,
    pretty: bool,
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();

    let mut input_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut pretty = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--input" => {
                i += 1;
                if i >= args.len() {
                    return Err("--input requires a path".to_string());
                }
                input_path = Some(PathBuf::from(&args[i]));
            }
            "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("--output requires a path".to_string());
                }
                output_path = Some(PathBuf::from(&args[i]));
            }
            "--pretty" => {
                pretty = true;
            }
            arg => {
                return Err(format!("Unknown argument: {}", arg));
            }
        }
        i += 1;
    }

    let input_path = input_path.ok_or("--input is required")?;

    Ok(Args {
        input_path,
        output_path,
        pretty,
    })
}

fn main() -> ExitCode {
    // Initialize minimal logging (default to warn if RUST_LOG not set)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let config = match CompilerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let document_json = match fs::read_to_string(&args.input_path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error reading input file {:?}: {}", args.input_path, e);
            return ExitCode::FAILURE;
        }
    };

    let document: CompilationDocument = match serde_json::from_str(&document_json) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error parsing compilation document: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let bundle = match compile_document(&document, &config) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Compilation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rendered = if args.pretty || config.pretty_output {
        serde_json::to_string_pretty(&bundle)
    } else {
        serde_json::to_string(&bundle)
    };
    let rendered = match rendered {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Error serializing artifacts: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.output_path {
        Some(output_path) => {
            if let Err(e) = fs::write(&output_path, rendered) {
                eprintln!("Error writing artifacts to {:?}: {}", output_path, e);
                return ExitCode::FAILURE;
            }
            println!("{}", output_path.display());
        }
        None => println!("{}", rendered),
    }

    ExitCode::SUCCESS
}
