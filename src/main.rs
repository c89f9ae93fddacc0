//! Over-the-air firmware update tool for RfmUsb-attached radio bootloaders.
//!
//! Usage:
//!   rfm-ota --file app.hex --serial /dev/ttyUSB0
//!   rfm-ota -f app.hex -s COM3 -p 17 -r 3 -t 2000 -v

mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let args = cli::Cli::parse();

    let default_filter = if args.verbose {
        "rfm_ota=debug"
    } else {
        "rfm_ota=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli::run(&args) {
        Ok(crc) => {
            println!("Firmware update succeeded. CRC: [0x{:X}]", crc);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Firmware update failed [{}]: {}", e.error_code(), e);
            ExitCode::FAILURE
        }
    }
}
