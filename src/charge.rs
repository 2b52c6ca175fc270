//! Charge state derived from the BMS status code and the state of charge.

use crate::metrics::{Metric, MetricsStore};
use crate::protocol::BmsStatus;
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Current limit reported while on a CCS charger, the BMS does not publish one.
pub const CCS_CURRENT_LIMIT: f32 = 82.0;
/// Scaled SOC at or above which a finished charge is reported as done.
pub const DONE_SOC: f32 = 97.0;
/// Scaled SOC from which an ongoing charge is in its top-off phase.
pub const TOPOFF_SOC: f32 = 99.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "lowercase"))]
pub enum ChargeState {
    Charging,
    TopOff,
    Stopped,
    Done,
}

impl ChargeState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChargeState::Charging => "charging",
            ChargeState::TopOff => "topoff",
            ChargeState::Stopped => "stopped",
            ChargeState::Done => "done",
        }
    }

    /// State of a charge that is in progress.
    pub fn while_charging(soc: f32) -> Self {
        if soc < TOPOFF_SOC {
            ChargeState::Charging
        } else {
            ChargeState::TopOff
        }
    }

    /// State of a charge that has just ended.
    pub fn after_charge(soc: f32) -> Self {
        if soc >= DONE_SOC {
            ChargeState::Done
        } else {
            ChargeState::Stopped
        }
    }
}

impl fmt::Display for ChargeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(rename_all = "lowercase"))]
pub enum ChargeType {
    Type2,
    Ccs,
    NotCharging,
}

impl ChargeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChargeType::Type2 => "type2",
            ChargeType::Ccs => "ccs",
            ChargeType::NotCharging => "not charging",
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applies a BMS status report to the charge metrics.
///
/// The machine keeps no state of its own: the in-progress flag and the SOC are read
/// from the store, so the result only depends on `status` and those two metrics.
/// Charging versus top-off is decided by the SOC handler, not here.
pub fn transition<M: MetricsStore + ?Sized>(metrics: &mut M, status: BmsStatus) {
    match status {
        BmsStatus::StartingCharge | BmsStatus::Charging => {
            metrics.set_bool(Metric::ChargeInProgress, true);
            metrics.set_text(Metric::ChargeType, ChargeType::Type2.as_str());
        }
        BmsStatus::CcsCharging => {
            metrics.set_bool(Metric::ChargeInProgress, true);
            metrics.set_text(Metric::ChargeType, ChargeType::Ccs.as_str());
            let current = metrics.get_float(Metric::BatCurrent);
            let power = metrics.get_float(Metric::BatPower);
            let voltage = metrics.get_float(Metric::BatVoltage);
            metrics.set_float(Metric::ChargeCurrent, -current);
            metrics.set_float(Metric::ChargePower, power);
            metrics.set_float(Metric::ChargeCurrentLimit, CCS_CURRENT_LIMIT);
            metrics.set_float(Metric::ChargeVoltage, voltage);
        }
        _ => {
            if metrics.get_bool(Metric::ChargeInProgress) {
                let state = ChargeState::after_charge(metrics.get_float(Metric::BatSoc));
                log::debug!("Charge ended on {:?}: {}", status, state);
                metrics.set_text(Metric::ChargeType, ChargeType::NotCharging.as_str());
                metrics.set_text(Metric::ChargeState, state.as_str());
                metrics.set_bool(Metric::ChargeInProgress, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMetrics;

    fn charging_at(soc: f32) -> InMemoryMetrics {
        let mut metrics = InMemoryMetrics::new();
        metrics.set_bool(Metric::ChargeInProgress, true);
        metrics.set_text(Metric::ChargeState, "charging");
        metrics.set_float(Metric::BatSoc, soc);
        metrics
    }

    #[test]
    fn type2_charge_starts() {
        for status in [BmsStatus::StartingCharge, BmsStatus::Charging] {
            let mut metrics = InMemoryMetrics::new();
            transition(&mut metrics, status);
            assert!(metrics.get_bool(Metric::ChargeInProgress));
            assert_eq!(metrics.get_text(Metric::ChargeType), Some("type2"));
            assert_eq!(metrics.get_text(Metric::ChargeState), None);
        }
    }

    #[test]
    fn ccs_copies_battery_electrics() {
        let mut metrics = InMemoryMetrics::new();
        metrics.set_float(Metric::BatCurrent, -120.0);
        metrics.set_float(Metric::BatPower, 48.0);
        metrics.set_float(Metric::BatVoltage, 400.0);

        transition(&mut metrics, BmsStatus::CcsCharging);

        assert!(metrics.get_bool(Metric::ChargeInProgress));
        assert_eq!(metrics.get_text(Metric::ChargeType), Some("ccs"));
        assert_eq!(metrics.get_float(Metric::ChargeCurrent), 120.0);
        assert_eq!(metrics.get_float(Metric::ChargePower), 48.0);
        assert_eq!(metrics.get_float(Metric::ChargeVoltage), 400.0);
        assert_eq!(metrics.get_float(Metric::ChargeCurrentLimit), 82.0);
    }

    #[test]
    fn ccs_overrides_type2() {
        let mut metrics = charging_at(50.0);
        transition(&mut metrics, BmsStatus::Charging);
        metrics.set_float(Metric::BatCurrent, -30.0);
        transition(&mut metrics, BmsStatus::CcsCharging);
        assert_eq!(metrics.get_text(Metric::ChargeType), Some("ccs"));
        assert_eq!(metrics.get_float(Metric::ChargeCurrent), 30.0);
    }

    #[test]
    fn idle_after_full_charge_is_done() {
        let mut metrics = charging_at(98.0);
        transition(&mut metrics, BmsStatus::Idle);
        assert!(!metrics.get_bool(Metric::ChargeInProgress));
        assert_eq!(metrics.get_text(Metric::ChargeState), Some("done"));
        assert_eq!(metrics.get_text(Metric::ChargeType), Some("not charging"));
    }

    #[test]
    fn idle_after_partial_charge_is_stopped() {
        let mut metrics = charging_at(50.0);
        transition(&mut metrics, BmsStatus::Idle);
        assert!(!metrics.get_bool(Metric::ChargeInProgress));
        assert_eq!(metrics.get_text(Metric::ChargeState), Some("stopped"));
    }

    #[test]
    fn done_threshold_is_inclusive() {
        let mut metrics = charging_at(DONE_SOC);
        transition(&mut metrics, BmsStatus::Unknown(0x42));
        assert_eq!(metrics.get_text(Metric::ChargeState), Some("done"));
    }

    #[test]
    fn other_status_without_charge_is_noop() {
        for code in [0x0, 0x1, 0x3, 0x8, 0xa, 0xff] {
            let mut metrics = InMemoryMetrics::new();
            metrics.set_float(Metric::BatSoc, 99.0);
            transition(&mut metrics, BmsStatus::from(code));
            assert_eq!(metrics.get(Metric::ChargeInProgress), None);
            assert_eq!(metrics.get_text(Metric::ChargeState), None);
            assert_eq!(metrics.get_text(Metric::ChargeType), None);
        }
    }

    #[test]
    fn state_labels() {
        assert_eq!(ChargeState::while_charging(99.4), ChargeState::Charging);
        assert_eq!(ChargeState::while_charging(99.5), ChargeState::TopOff);
        assert_eq!(ChargeState::after_charge(96.9), ChargeState::Stopped);
        assert_eq!(ChargeState::TopOff.to_string(), "topoff");
        assert_eq!(ChargeState::Done.to_string(), "done");
        assert_eq!(ChargeType::NotCharging.to_string(), "not charging");
    }
}
