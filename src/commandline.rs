use crate::mqtt;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;
use std::time::Duration;

fn parse_pid(text: &str) -> Result<u16, String> {
    u16::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|e| format!("invalid PID {text:?}: {e}"))
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Decode a capture file of BMS responses and output the resulting metrics
    Replay {
        /// Capture file with one `PID REMAIN DATA` frame per line
        file: PathBuf,
        /// Delay between frames to replay at bus pace (e.g., "100ms")
        #[clap(long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
        /// Output destination for the decoded metrics
        #[command(subcommand)]
        output: ReplayOutput,
    },
    /// Decode a single response frame and show the metrics it sets
    Frame {
        /// PID in hex (e.g., b0e1)
        #[arg(value_parser = parse_pid)]
        pid: u16,
        /// Bytes remaining in the response after this frame
        remain: u16,
        /// Payload in hex (e.g., 13881400)
        data: String,
    },
    /// Show the displayed SOC for a raw BMS reading in tenths of a percent
    Soc { raw: u16 },
}

#[derive(clap::ValueEnum, Debug, Clone, PartialEq)]
pub enum MqttFormat {
    Simple,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ReplayOutput {
    /// Print the metrics to the standard output (console).
    Console,
    /// Print the metrics as one JSON document.
    Json,
    /// Publish the metrics to an MQTT broker.
    Mqtt {
        /// The configuration file for the MQTT broker
        #[arg(long, default_value_t = mqtt::MqttConfig::DEFAULT_CONFIG_FILE.to_string())]
        config_file: String,
        /// Output format for MQTT messages
        #[arg(long, value_enum, default_value_t = MqttFormat::Simple)]
        format: MqttFormat,
    },
}

const fn about_text() -> &'static str {
    "MG EV BMS response decoder"
}

#[derive(Parser, Debug)]
#[command(version, about=about_text(), long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Vehicle configuration file (YAML), defaults to the updated BMU firmware
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommands,
}
