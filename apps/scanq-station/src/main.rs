//! # scanq-station Entry Point
//!
//! The actual setup is in lib.rs for testability.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match scanq_station_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("scanq-station: {}", e);
            ExitCode::FAILURE
        }
    }
}
