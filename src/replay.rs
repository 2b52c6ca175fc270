use anyhow::{Context, Result};
use log::{error, info};
use mgev_bms_lib::config::BmsConfig;
use mgev_bms_lib::decoder::BmsDecoder;
use mgev_bms_lib::metrics::{CellMetric, InMemoryMetrics};
use mgev_bms_lib::protocol::Frame;
use serde_json::json;

use crate::{commandline, mqtt};

pub type Decoder = BmsDecoder<InMemoryMetrics, BmsConfig>;

/// All written metrics as one JSON object, vector metrics as arrays with `null`
/// for blocks that were never reported.
fn snapshot_json(metrics: &InMemoryMetrics) -> Result<serde_json::Map<String, serde_json::Value>> {
    let mut snapshot = serde_json::Map::new();
    for (metric, value) in metrics.scalars() {
        snapshot.insert(metric.name().to_string(), serde_json::to_value(value)?);
    }
    for cell in CellMetric::ALL {
        let slots = metrics.slots(cell);
        if !slots.is_empty() {
            snapshot.insert(cell.name().to_string(), serde_json::to_value(slots)?);
        }
    }
    Ok(snapshot)
}

pub fn print_console(decoder: &Decoder) {
    let metrics = decoder.metrics();
    for (metric, value) in metrics.scalars() {
        println!("{:<20} {} {}", metric.name(), value, metric.unit());
    }
    for cell in CellMetric::ALL {
        let slots = metrics.slots(cell);
        if slots.is_empty() {
            continue;
        }
        let values: Vec<String> = slots
            .iter()
            .map(|slot| slot.map_or_else(|| "-".to_string(), |v| format!("{v:.3}")))
            .collect();
        println!("{:<20} [{}] {}", cell.name(), values.join(", "), cell.unit());
    }
}

fn publish_simple_format(
    publisher: &mut mqtt::MqttPublisher,
    base_topic: &str,
    metric_name: &str,
    value: &serde_json::Value,
) {
    fn publish_recursive(
        publisher: &mut mqtt::MqttPublisher,
        topic: &str,
        val: &serde_json::Value,
    ) {
        let payload = match val {
            serde_json::Value::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    publish_recursive(publisher, &format!("{topic}/{i}"), v);
                }
                return;
            }
            serde_json::Value::Object(map) => {
                for (k, v) in map {
                    publish_recursive(publisher, &format!("{topic}/{k}"), v);
                }
                return;
            }
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            // Blocks without data are not published
            serde_json::Value::Null => return,
        };
        if let Err(e) = publisher.publish(topic, &payload) {
            error!("Failed to publish message to topic {topic}: {e}");
        }
    }
    let root_topic = format!("{base_topic}/{metric_name}");
    publish_recursive(publisher, &root_topic, value);
}

fn publish_mqtt(
    decoder: &Decoder,
    config_file: &str,
    format: &commandline::MqttFormat,
) -> Result<()> {
    let config = mqtt::MqttConfig::load(config_file)
        .with_context(|| format!("Failed to open MQTT config file at '{config_file}'"))?;
    info!("Successfully loaded MQTT config from {config_file}: {config:?}");
    let mut publisher =
        mqtt::MqttPublisher::new(config).with_context(|| "Failed to create MQTT publisher")?;

    let snapshot = snapshot_json(decoder.metrics())?;
    match format {
        commandline::MqttFormat::Json => {
            let mut document = serde_json::Map::new();
            document.insert(
                "timestamp".to_string(),
                json!(chrono::Utc::now().to_rfc3339()),
            );
            document.extend(snapshot);
            let payload = serde_json::to_string(&document)?;
            let topic = publisher.topic().to_string();
            publisher.publish(&topic, &payload)?;
        }
        commandline::MqttFormat::Simple => {
            let base_topic = publisher.topic().to_string();
            for (name, value) in &snapshot {
                publish_simple_format(&mut publisher, &base_topic, name, value);
            }
        }
    }
    publisher.finish()
}

pub fn run(
    decoder: &mut Decoder,
    frames: &[Frame],
    interval: Option<std::time::Duration>,
    output: &commandline::ReplayOutput,
) -> Result<()> {
    info!("Replaying {} frames: output={output:?}, interval={interval:?}", frames.len());
    for frame in frames {
        decoder.dispatch_frame(frame);
        if let Some(interval) = interval {
            std::thread::sleep(interval);
        }
    }

    match output {
        commandline::ReplayOutput::Console => {
            println!("--- Data at {} ---", chrono::Local::now().to_rfc3339());
            print_console(decoder);
            println!("--------------------------");
        }
        commandline::ReplayOutput::Json => {
            let mut document = snapshot_json(decoder.metrics())?;
            document.insert("pack".to_string(), serde_json::to_value(decoder.pack())?);
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        commandline::ReplayOutput::Mqtt {
            config_file,
            format,
        } => publish_mqtt(decoder, config_file, format)?,
    }
    Ok(())
}
