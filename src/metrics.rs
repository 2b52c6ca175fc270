//! Metric catalogue and the store the decoder publishes into.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Scalar metrics written by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    BatVoltage,
    BatCurrent,
    BatPower,
    BatPackVoltage,
    SocRaw,
    BatSoc,
    RangeIdeal,
    RangeEstimate,
    BatTemp,
    BatSoh,
    PackVmin,
    PackVmax,
    PackTmin,
    PackTmax,
    ChargeInProgress,
    ChargeState,
    ChargeType,
    ChargeCurrent,
    ChargePower,
    ChargeVoltage,
    ChargeCurrentLimit,
}

impl Metric {
    pub const ALL: [Metric; 21] = [
        Metric::BatVoltage,
        Metric::BatCurrent,
        Metric::BatPower,
        Metric::BatPackVoltage,
        Metric::SocRaw,
        Metric::BatSoc,
        Metric::RangeIdeal,
        Metric::RangeEstimate,
        Metric::BatTemp,
        Metric::BatSoh,
        Metric::PackVmin,
        Metric::PackVmax,
        Metric::PackTmin,
        Metric::PackTmax,
        Metric::ChargeInProgress,
        Metric::ChargeState,
        Metric::ChargeType,
        Metric::ChargeCurrent,
        Metric::ChargePower,
        Metric::ChargeVoltage,
        Metric::ChargeCurrentLimit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::BatVoltage => "bat_voltage",
            Metric::BatCurrent => "bat_current",
            Metric::BatPower => "bat_power",
            Metric::BatPackVoltage => "bat_pack_voltage",
            Metric::SocRaw => "soc_raw",
            Metric::BatSoc => "bat_soc",
            Metric::RangeIdeal => "range_ideal",
            Metric::RangeEstimate => "range_est",
            Metric::BatTemp => "bat_temp",
            Metric::BatSoh => "bat_soh",
            Metric::PackVmin => "bat_pack_vmin",
            Metric::PackVmax => "bat_pack_vmax",
            Metric::PackTmin => "bat_pack_tmin",
            Metric::PackTmax => "bat_pack_tmax",
            Metric::ChargeInProgress => "charge_inprogress",
            Metric::ChargeState => "charge_state",
            Metric::ChargeType => "charge_type",
            Metric::ChargeCurrent => "charge_current",
            Metric::ChargePower => "charge_power",
            Metric::ChargeVoltage => "charge_voltage",
            Metric::ChargeCurrentLimit => "charge_climit",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::BatVoltage
            | Metric::BatPackVoltage
            | Metric::PackVmin
            | Metric::PackVmax
            | Metric::ChargeVoltage => "V",
            Metric::BatCurrent | Metric::ChargeCurrent | Metric::ChargeCurrentLimit => "A",
            Metric::BatPower | Metric::ChargePower => "kW",
            Metric::SocRaw | Metric::BatSoc | Metric::BatSoh => "%",
            Metric::RangeIdeal | Metric::RangeEstimate => "km",
            Metric::BatTemp | Metric::PackTmin | Metric::PackTmax => "°C",
            Metric::ChargeInProgress | Metric::ChargeState | Metric::ChargeType => "",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per block vector metrics, indexed by block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CellMetric {
    Vmin,
    Vmax,
    Tmin,
    Tmax,
    Tpcb,
}

impl CellMetric {
    pub const ALL: [CellMetric; 5] = [
        CellMetric::Vmin,
        CellMetric::Vmax,
        CellMetric::Tmin,
        CellMetric::Tmax,
        CellMetric::Tpcb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CellMetric::Vmin => "bat_cell_vmin",
            CellMetric::Vmax => "bat_cell_vmax",
            CellMetric::Tmin => "bat_cell_tmin",
            CellMetric::Tmax => "bat_cell_tmax",
            CellMetric::Tpcb => "bat_cell_tpcb",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            CellMetric::Vmin | CellMetric::Vmax => "V",
            CellMetric::Tmin | CellMetric::Tmax | CellMetric::Tpcb => "°C",
        }
    }
}

impl fmt::Display for CellMetric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(untagged))]
pub enum MetricValue {
    Float(f32),
    Bool(bool),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Bool(v) => write!(f, "{}", v),
            MetricValue::Text(v) => f.write_str(v),
        }
    }
}

/// The metrics store the decoder writes into.
///
/// Scalars are read back by the decoder too: the bus-off substitution uses the pack
/// voltage and the charge state machine reads current, power, SOC and the
/// in-progress flag. Vector metrics are sparse; [`MetricsStore::cells`] only returns
/// the indices that have been written.
pub trait MetricsStore {
    fn get(&self, metric: Metric) -> Option<&MetricValue>;
    fn set(&mut self, metric: Metric, value: MetricValue);
    fn cell(&self, metric: CellMetric, index: usize) -> Option<f32>;
    fn set_cell(&mut self, metric: CellMetric, index: usize, value: f32);
    fn cells(&self, metric: CellMetric) -> Vec<f32>;

    fn get_float(&self, metric: Metric) -> f32 {
        match self.get(metric) {
            Some(MetricValue::Float(v)) => *v,
            _ => 0.0,
        }
    }

    fn get_bool(&self, metric: Metric) -> bool {
        matches!(self.get(metric), Some(MetricValue::Bool(true)))
    }

    fn get_text(&self, metric: Metric) -> Option<&str> {
        match self.get(metric) {
            Some(MetricValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    fn set_float(&mut self, metric: Metric, value: f32) {
        self.set(metric, MetricValue::Float(value));
    }

    fn set_bool(&mut self, metric: Metric, value: bool) {
        self.set(metric, MetricValue::Bool(value));
    }

    fn set_text(&mut self, metric: Metric, value: &str) {
        self.set(metric, MetricValue::Text(value.to_string()));
    }
}

/// A plain in-process metrics store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetrics {
    scalars: BTreeMap<Metric, MetricValue>,
    vectors: BTreeMap<CellMetric, Vec<Option<f32>>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// All scalar metrics that have been written, in catalogue order.
    pub fn scalars(&self) -> impl Iterator<Item = (Metric, &MetricValue)> {
        self.scalars.iter().map(|(metric, value)| (*metric, value))
    }

    /// The raw slots of a vector metric, `None` for blocks never written.
    pub fn slots(&self, metric: CellMetric) -> &[Option<f32>] {
        self.vectors
            .get(&metric)
            .map(|slots| slots.as_slice())
            .unwrap_or(&[])
    }
}

impl MetricsStore for InMemoryMetrics {
    fn get(&self, metric: Metric) -> Option<&MetricValue> {
        self.scalars.get(&metric)
    }

    fn set(&mut self, metric: Metric, value: MetricValue) {
        log::trace!("{} = {}", metric, value);
        self.scalars.insert(metric, value);
    }

    fn cell(&self, metric: CellMetric, index: usize) -> Option<f32> {
        self.slots(metric).get(index).copied().flatten()
    }

    fn set_cell(&mut self, metric: CellMetric, index: usize, value: f32) {
        log::trace!("{}[{}] = {}", metric, index, value);
        let slots = self.vectors.entry(metric).or_default();
        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        slots[index] = Some(value);
    }

    fn cells(&self, metric: CellMetric) -> Vec<f32> {
        self.slots(metric).iter().flatten().copied().collect()
    }
}
