// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the pricewatch binary.

pub mod components;
pub mod dead_letters_cmd;
pub mod doctor;
pub mod navigate_cmd;
pub mod products_cmd;
pub mod stage_cmd;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `pricewatch=info` (or `debug` with
/// `verbose`). Logs go to stderr so JSON command output stays clean.
pub fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "pricewatch=debug,pricewatch_runtime=debug"
    } else {
        "pricewatch=info,pricewatch_runtime=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
