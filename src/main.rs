use clap::Parser;
use log::{LevelFilter, error, info};
use std::panic::{self, PanicHookInfo};
use tpms_mqtt_bridge::app::{MqttBroker, Options, RealScanner, run_with};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Log at info (debug with `--verbose`); `RUST_LOG` takes precedence.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Clean exit codes for process managers (e.g. systemd) watching the bridge
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(options.verbose);

    tokio::select! {
        result = run_with(options, &RealScanner, &MqttBroker) => match result {
            Ok(()) => {
                info!("Scanner stopped, exiting");
                std::process::exit(EXIT_SUCCESS);
            }
            Err(why) => {
                error!("{why}");
                std::process::exit(EXIT_ERROR);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, exiting");
            std::process::exit(EXIT_SUCCESS);
        }
    }
}
