#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mgev_bms_lib
//!
//! Decoder for the battery management system PIDs of the MG ZS EV.
//!
//! The transport hands every poll response frame to [`decoder::BmsDecoder::dispatch`],
//! which converts the raw fields into physical units, reassembles the block statistics
//! that are split over two frames, keeps the pack extremes and the charge state up to
//! date and writes everything into a [`metrics::MetricsStore`].
//!
//! ```
//! use mgev_bms_lib::config::BmsConfig;
//! use mgev_bms_lib::decoder::BmsDecoder;
//! use mgev_bms_lib::metrics::{InMemoryMetrics, Metric, MetricsStore};
//!
//! let mut decoder = BmsDecoder::new(InMemoryMetrics::new(), BmsConfig::default());
//! decoder.dispatch(0xb042, &[0x06, 0x40], 0);
//! assert_eq!(decoder.metrics().get_float(Metric::BatPackVoltage), 400.0);
//! ```
//!
//! ## Features
//!
//! - `default`: Enables `bin-dependencies`, needed for the `mgev-bms` command-line tool.
//! - `serde`: `Serialize` for the decoded types and YAML loading of [`config::BmsConfig`].

/// Contains error types for the library.
mod error;

pub mod capture;
pub mod charge;
pub mod config;
pub mod decoder;
pub mod metrics;
/// PIDs, status codes and raw value conversions of the BMS.
pub mod protocol;
pub mod soc;

pub use error::{Error, Result};
