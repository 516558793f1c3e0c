use std::time::Duration;

use cinema_core::{available_actions, presets};
use cinema_server::{config, console, processor, Cli, VERSION};
use clap::Parser;
use log::LevelFilter;
use miette::{IntoDiagnostic, Result};
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

fn init_logging(args: &Cli, verbose_config: bool) {
    let mut level = args.verbose.log_level_filter();
    // Traffic lines of a verbose processor are logged at info, but the
    // connection details around them are debug
    if verbose_config && level < LevelFilter::Debug && level > LevelFilter::Off {
        level = LevelFilter::Debug;
    }

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn list_actions(device: &cinema_core::DeviceConfig) -> Result<()> {
    let listing = serde_json::json!({
        "model": device.model.as_str(),
        "actions": available_actions(device.model),
        "presets": presets(),
    });
    let text = serde_json::to_string_pretty(&listing).into_diagnostic()?;
    println!("{}", text);
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let device = config::load(&args).into_diagnostic()?;
    init_logging(&args, device.verbose);

    if args.list_actions {
        return list_actions(&device);
    }

    log::info!("cinema-server {} controlling {}", VERSION, device.model);

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = runtime.block_on(async move {
        let (service, handle) = processor::ProcessorService::new(device, !args.no_reconnect);

        Toplevel::new(move |s| async move {
            if args.output {
                let handle = handle.clone();
                s.start(SubsystemBuilder::new("stdout", move |s| {
                    processor::forward_output(handle, s)
                }));
            }
            s.start(SubsystemBuilder::new("console", move |s| {
                console::run(handle, s)
            }));
            s.start(SubsystemBuilder::new("processor", move |s| service.run(s)));
        })
        .catch_signals()
        .handle_shutdown_requests(Duration::from_secs(5))
        .await
    });

    // Do not wait for the blocking stdin reader
    runtime.shutdown_timeout(Duration::from_millis(100));
    result.into_diagnostic()
}
