// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan — live card scanner.
//
// Entry point. Initialises logging and the scan services, runs one scanning
// session, and prints its report as JSON.
//
//     cardscan [INPUT_DIR] [OUTPUT_DIR]
//
// With INPUT_DIR the image files in it are replayed as camera frames;
// without, the platform camera is used and Ctrl-C triggers the capture.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use services::scan_services::ScanServices;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("cardscan starting");

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let input = args.next();
    let output = args.next();

    let svc = match ScanServices::init() {
        Ok(s) => {
            tracing::info!("scan services initialised");
            s
        }
        Err(e) => {
            tracing::error!(error = %e, "config storage failed; using defaults");
            ScanServices::fallback()
        }
    };

    let output = output.unwrap_or_else(|| svc.captures_dir());
    let result = match input {
        Some(input) => svc.scan_folder(&input, &output).await,
        None => svc.scan_live().await,
    };

    match result.and_then(|report| Ok(serde_json::to_string_pretty(&report)?)) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "scan failed");
            ExitCode::FAILURE
        }
    }
}
