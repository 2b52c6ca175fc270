//! PID dispatch and decoding of BMS poll responses.

use crate::charge::{self, ChargeState};
use crate::config::ConfigStore;
use crate::error::Result;
use crate::metrics::{CellMetric, Metric, MetricValue, MetricsStore};
use crate::protocol::{self, BlockIndex, BmsStatus, Frame, Pid, BLOCK_COUNT, BUS_OFF};
use crate::soc::SocWindow;

#[cfg(feature = "serde")]
use serde::Serialize;

/// WLTP range of the vehicle in km, scaled by the SOC for the ideal range.
pub const WLTP_RANGE: f32 = 262.0;

/// Statistics of one battery block as currently held in the metrics store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CellBlockStat {
    pub index: usize,
    pub vmin: Option<f32>,
    pub vmax: Option<f32>,
    pub tmin: Option<f32>,
    pub tmax: Option<f32>,
}

/// Pack level extremes over all known blocks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PackAggregate {
    pub vmin: Option<f32>,
    pub vmax: Option<f32>,
    pub tmin: Option<f32>,
    pub tmax: Option<f32>,
}

impl PackAggregate {
    pub fn read<M: MetricsStore + ?Sized>(metrics: &M) -> Self {
        let float = |metric| match metrics.get(metric) {
            Some(MetricValue::Float(v)) => Some(*v),
            _ => None,
        };
        Self {
            vmin: float(Metric::PackVmin),
            vmax: float(Metric::PackVmax),
            tmin: float(Metric::PackTmin),
            tmax: float(Metric::PackTmax),
        }
    }
}

/// Decodes BMS poll responses into the metrics store.
///
/// A block's statistics arrive in two frames. The first one carries the high byte
/// of the maximum voltage which is kept per block until the second frame arrives.
///
/// The kept byte is only replaced by the next first frame of the same block. A max
/// frame is rejected when no first frame was ever seen for its block, but if a later
/// first frame is lost the max frame is rebuilt from the previous cycle's high byte.
#[derive(Debug)]
pub struct BmsDecoder<M, C> {
    metrics: M,
    config: C,
    vmax_high: [Option<u8>; BLOCK_COUNT],
}

impl<M: MetricsStore, C: ConfigStore> BmsDecoder<M, C> {
    pub fn new(metrics: M, config: C) -> Self {
        Self {
            metrics,
            config,
            vmax_high: [None; BLOCK_COUNT],
        }
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut M {
        &mut self.metrics
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn into_inner(self) -> (M, C) {
        (self.metrics, self.config)
    }

    /// Handles one response frame. Unknown PIDs and frames too short for their PID
    /// are ignored.
    pub fn dispatch(&mut self, pid: u16, data: &[u8], remain: u16) {
        let pid = match Pid::try_from(pid) {
            Ok(pid) => pid,
            Err(_) => {
                log::trace!("Ignoring PID {:#06x}", pid);
                return;
            }
        };
        log::trace!("{} remain={} data={:02X?}", pid, remain, data);
        if let Err(e) = self.decode(pid, data, remain) {
            log::debug!("Dropped {} frame: {}", pid, e);
        }
    }

    pub fn dispatch_frame(&mut self, frame: &Frame) {
        self.dispatch(frame.pid, &frame.data, frame.remain);
    }

    fn decode(&mut self, pid: Pid, data: &[u8], remain: u16) -> Result<()> {
        match pid {
            Pid::CellStat(index) => self.process_block_stats(index, data, remain)?,
            Pid::BusVoltage => {
                let value = protocol::read_u16(data)?;
                // The bus reads 0xfffe while it is switched off
                let voltage = if value != BUS_OFF {
                    protocol::quarter_volts(value)
                } else {
                    self.metrics.get_float(Metric::BatPackVoltage)
                };
                self.metrics.set_float(Metric::BatVoltage, voltage);
            }
            Pid::Current => {
                let current = protocol::battery_current(protocol::read_u16(data)?);
                self.metrics.set_float(Metric::BatCurrent, current);
                let voltage = self.metrics.get_float(Metric::BatVoltage);
                self.metrics
                    .set_float(Metric::BatPower, protocol::battery_power(voltage, current));
            }
            Pid::PackVoltage => {
                let voltage = protocol::quarter_volts(protocol::read_u16(data)?);
                self.metrics.set_float(Metric::BatPackVoltage, voltage);
            }
            Pid::Soc => self.process_soc(protocol::read_u16(data)?),
            Pid::BmsStatus => {
                protocol::validate_len(data, 1)?;
                charge::transition(&mut self.metrics, BmsStatus::from(data[0]));
            }
            Pid::CoolantTemp => {
                protocol::validate_len(data, 1)?;
                self.metrics
                    .set_float(Metric::BatTemp, protocol::half_degree_temperature(data[0]));
            }
            Pid::Soh => {
                let value = protocol::read_u16(data)?;
                self.metrics.set_float(Metric::BatSoh, value as f32 / 100.0);
            }
            Pid::RangeEstimate => {
                let value = protocol::read_u16(data)?;
                self.metrics
                    .set_float(Metric::RangeEstimate, value as f32 / 10.0);
            }
        }
        Ok(())
    }

    fn process_soc(&mut self, value: u16) {
        // Raw value for the charging metrics page
        self.metrics.set_float(Metric::SocRaw, value as f32 / 10.0);
        let scaled = SocWindow::from_config(&self.config).scale(value);
        if self.metrics.get_bool(Metric::ChargeInProgress) {
            self.metrics.set_text(
                Metric::ChargeState,
                ChargeState::while_charging(scaled).as_str(),
            );
        }
        self.metrics.set_float(Metric::BatSoc, scaled);
        self.metrics
            .set_float(Metric::RangeIdeal, WLTP_RANGE * (scaled / 100.0));
    }

    /// Block stats are recorded in the cell vectors, one element per block.
    fn process_block_stats(&mut self, index: BlockIndex, data: &[u8], remain: u16) -> Result<()> {
        let index = index.get();
        protocol::validate_len(data, 3)?;
        if remain != 0 {
            let vmin = u16::from_be_bytes([data[0], data[1]]);
            self.vmax_high[index] = Some(data[2]);

            self.metrics
                .set_cell(CellMetric::Vmin, index, protocol::cell_voltage(vmin));
            update_extreme(&mut self.metrics, CellMetric::Vmin, Metric::PackVmin, f32::min);
        } else {
            match self.vmax_high[index] {
                Some(high) => {
                    let vmax = u16::from_be_bytes([high, data[0]]);
                    self.metrics
                        .set_cell(CellMetric::Vmax, index, protocol::cell_voltage(vmax));
                    update_extreme(&mut self.metrics, CellMetric::Vmax, Metric::PackVmax, f32::max);
                }
                None => log::warn!(
                    "Block {} max frame without a preceding min frame, skipping vmax",
                    index
                ),
            }
            self.metrics.set_cell(
                CellMetric::Tmin,
                index,
                protocol::half_degree_temperature(data[1]),
            );
            self.metrics.set_cell(
                CellMetric::Tmax,
                index,
                protocol::half_degree_temperature(data[2]),
            );
            if let Some(&tpcb) = data.get(3) {
                self.metrics.set_cell(
                    CellMetric::Tpcb,
                    index,
                    protocol::half_degree_temperature(tpcb),
                );
            }
            update_extreme(&mut self.metrics, CellMetric::Tmin, Metric::PackTmin, f32::min);
            update_extreme(&mut self.metrics, CellMetric::Tmax, Metric::PackTmax, f32::max);
        }
        Ok(())
    }

    pub fn block_stats(&self) -> Vec<CellBlockStat> {
        (0..BLOCK_COUNT)
            .map(|index| CellBlockStat {
                index,
                vmin: self.metrics.cell(CellMetric::Vmin, index),
                vmax: self.metrics.cell(CellMetric::Vmax, index),
                tmin: self.metrics.cell(CellMetric::Tmin, index),
                tmax: self.metrics.cell(CellMetric::Tmax, index),
            })
            .collect()
    }

    pub fn pack(&self) -> PackAggregate {
        PackAggregate::read(&self.metrics)
    }
}

impl<M: MetricsStore + Default, C: ConfigStore + Default> Default for BmsDecoder<M, C> {
    fn default() -> Self {
        Self::new(M::default(), C::default())
    }
}

fn update_extreme<M: MetricsStore + ?Sized>(
    metrics: &mut M,
    cell: CellMetric,
    pack: Metric,
    pick: fn(f32, f32) -> f32,
) {
    if let Some(value) = metrics.cells(cell).into_iter().reduce(pick) {
        metrics.set_float(pack, value);
    }
}
