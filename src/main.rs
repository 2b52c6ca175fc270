use anyhow::{Context, Result};
use clap::Parser;
use flexi_logger::{Logger, LoggerHandle};
use log::*;
use mgev_bms_lib::{capture, config::BmsConfig, metrics::InMemoryMetrics, soc};
use std::{ops::Deref, panic};

mod commandline;
mod mqtt;
mod replay;

use commandline::{CliArgs, CliCommands};

fn logging_init(loglevel: LevelFilter) -> LoggerHandle {
    let log_handle = Logger::try_with_env_or_str(loglevel.as_str())
        .expect("Cannot init logging")
        .start()
        .expect("Cannot start logging");

    panic::set_hook(Box::new(|panic_info| {
        let (filename, line, column) = panic_info
            .location()
            .map(|loc| (loc.file(), loc.line(), loc.column()))
            .unwrap_or(("<unknown>", 0, 0));
        let cause = panic_info
            .payload()
            .downcast_ref::<String>()
            .map(String::deref);
        let cause = cause.unwrap_or_else(|| {
            panic_info
                .payload()
                .downcast_ref::<&str>()
                .copied()
                .unwrap_or("<cause unknown>")
        });

        error!(
            "Thread '{}' panicked at {}:{}:{}: {}",
            std::thread::current().name().unwrap_or("<unknown>"),
            filename,
            line,
            column,
            cause
        );
    }));
    log_handle
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    let _log_handle = logging_init(args.verbose.log_level_filter());

    let config = match &args.config {
        Some(path) => BmsConfig::load(path)
            .with_context(|| format!("Cannot load config file {path:?}"))?,
        None => BmsConfig::default(),
    };
    debug!("Using {config:?}");

    match args.command {
        CliCommands::Replay {
            file,
            interval,
            output,
        } => {
            let frames = capture::read_capture(&file)
                .with_context(|| format!("Cannot read capture file {file:?}"))?;
            let mut decoder = replay::Decoder::new(InMemoryMetrics::new(), config);
            replay::run(&mut decoder, &frames, interval, &output)?;
        }
        CliCommands::Frame { pid, remain, data } => {
            let data = capture::parse_hex(&data)
                .with_context(|| format!("Invalid hex payload {data:?}"))?;
            let mut decoder = replay::Decoder::new(InMemoryMetrics::new(), config);
            decoder.dispatch(pid, &data, remain);
            replay::print_console(&decoder);
        }
        CliCommands::Soc { raw } => {
            println!("SOC: {:.1}%", soc::scale_soc(&config, raw));
        }
    }

    Ok(())
}
