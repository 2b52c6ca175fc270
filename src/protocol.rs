use crate::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Number of cell blocks reported by the BMS.
pub const BLOCK_COUNT: usize = 9;

const BATTERY_BUS_VOLTAGE_PID: u16 = 0xb041;
const BATTERY_VOLTAGE_PID: u16 = 0xb042;
const BATTERY_CURRENT_PID: u16 = 0xb043;
const BATTERY_SOC_PID: u16 = 0xb046;
const BMS_STATUS_PID: u16 = 0xb048;
const BATTERY_COOLANT_TEMP_PID: u16 = 0xb05c;
const BATTERY_SOH_PID: u16 = 0xb061;
const BMS_RANGE_PID: u16 = 0xb0b5;
const CELL_STAT_PIDS: [u16; BLOCK_COUNT] = [
    0xb0e1, 0xb0e2, 0xb0e3, 0xb0e4, 0xb0e5, 0xb0e6, 0xb0e7, 0xb0e8, 0xb0e9,
];

/// Raw value reported on the bus voltage PID while the HV bus is switched off.
pub const BUS_OFF: u16 = 0xfffe;

/// Zero based index of a cell block, always below [`BLOCK_COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockIndex(usize);

impl BlockIndex {
    pub fn new(index: usize) -> Option<Self> {
        (index < BLOCK_COUNT).then_some(Self(index))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// The PIDs answered by the BMS that the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pid {
    /// Block statistics.
    CellStat(BlockIndex),
    BusVoltage,
    Current,
    PackVoltage,
    Soc,
    BmsStatus,
    CoolantTemp,
    Soh,
    RangeEstimate,
}

impl Pid {
    pub fn code(self) -> u16 {
        match self {
            Pid::CellStat(index) => CELL_STAT_PIDS[index.get()],
            Pid::BusVoltage => BATTERY_BUS_VOLTAGE_PID,
            Pid::Current => BATTERY_CURRENT_PID,
            Pid::PackVoltage => BATTERY_VOLTAGE_PID,
            Pid::Soc => BATTERY_SOC_PID,
            Pid::BmsStatus => BMS_STATUS_PID,
            Pid::CoolantTemp => BATTERY_COOLANT_TEMP_PID,
            Pid::Soh => BATTERY_SOH_PID,
            Pid::RangeEstimate => BMS_RANGE_PID,
        }
    }
}

impl TryFrom<u16> for Pid {
    type Error = Error;

    fn try_from(code: u16) -> std::result::Result<Self, Self::Error> {
        if let Some(index) = CELL_STAT_PIDS.iter().position(|&pid| pid == code) {
            return Ok(Pid::CellStat(BlockIndex(index)));
        }
        match code {
            BATTERY_BUS_VOLTAGE_PID => Ok(Pid::BusVoltage),
            BATTERY_CURRENT_PID => Ok(Pid::Current),
            BATTERY_VOLTAGE_PID => Ok(Pid::PackVoltage),
            BATTERY_SOC_PID => Ok(Pid::Soc),
            BMS_STATUS_PID => Ok(Pid::BmsStatus),
            BATTERY_COOLANT_TEMP_PID => Ok(Pid::CoolantTemp),
            BATTERY_SOH_PID => Ok(Pid::Soh),
            BMS_RANGE_PID => Ok(Pid::RangeEstimate),
            _ => Err(Error::UnknownPid(code)),
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pid::CellStat(index) => write!(f, "cell block {} stats", index.get() + 1),
            Pid::BusVoltage => write!(f, "battery bus voltage"),
            Pid::Current => write!(f, "battery current"),
            Pid::PackVoltage => write!(f, "battery pack voltage"),
            Pid::Soc => write!(f, "state of charge"),
            Pid::BmsStatus => write!(f, "BMS status"),
            Pid::CoolantTemp => write!(f, "battery coolant temperature"),
            Pid::Soh => write!(f, "state of health"),
            Pid::RangeEstimate => write!(f, "BMS range estimate"),
        }
    }
}

/// Responses to the BMS status PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum BmsStatus {
    /// Seen when connected but not locked
    ConnectedNotCharging,
    /// Ignition off
    Idle,
    /// Ignition on aux or running
    Running,
    Charging,
    /// Charging on a rapid CCS charger
    CcsCharging,
    AboutToSleep,
    /// Connected but not charging
    Connected,
    StartingCharge,
    Unknown(u8),
}

impl From<u8> for BmsStatus {
    fn from(code: u8) -> Self {
        match code {
            0x0 => BmsStatus::ConnectedNotCharging,
            0x1 => BmsStatus::Idle,
            0x3 => BmsStatus::Running,
            0x6 => BmsStatus::Charging,
            0x7 => BmsStatus::CcsCharging,
            0x8 => BmsStatus::AboutToSleep,
            0xa => BmsStatus::Connected,
            0xc => BmsStatus::StartingCharge,
            other => BmsStatus::Unknown(other),
        }
    }
}

/// One response frame as handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pid: u16,
    /// Bytes still outstanding in the response after this frame.
    pub remain: u16,
    pub data: Vec<u8>,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04x} {} ", self.pid, self.remain)?;
        for b in &self.data {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_len(data: &[u8], required: usize) -> std::result::Result<(), Error> {
    if data.len() < required {
        log::warn!(
            "Invalid frame size - required={} received={}",
            required,
            data.len()
        );
        return Err(Error::FrameTooShort {
            required,
            received: data.len(),
        });
    }
    Ok(())
}

pub(crate) fn read_u16(data: &[u8]) -> std::result::Result<u16, Error> {
    validate_len(data, 2)?;
    Ok(u16::from_be_bytes([data[0], data[1]]))
}

/// Block cell voltages are 0.5 mV steps above 1 V.
pub fn cell_voltage(raw: u16) -> f32 {
    (raw as f32 / 2000.0) + 1.0
}

/// Temperatures are reported in half degrees from -40 °C.
pub fn half_degree_temperature(raw: u8) -> f32 {
    raw as f32 * 0.5 - 40.0
}

pub fn quarter_volts(raw: u16) -> f32 {
    raw as f32 * 0.25
}

/// The current has an offset of 40000 and a resolution of 0.025 A.
pub fn battery_current(raw: u16) -> f32 {
    ((raw as i32 - 40000) as f32 * 0.25) / 10.0
}

/// Power in kW, positive while discharging.
pub fn battery_power(voltage: f32, current: f32) -> f32 {
    -(voltage * current) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_codes_round_trip() {
        for index in 0..BLOCK_COUNT {
            let pid = Pid::CellStat(BlockIndex::new(index).unwrap());
            assert_eq!(Pid::try_from(pid.code()).unwrap(), pid);
        }
        assert_eq!(Pid::try_from(0xb0e9).unwrap().to_string(), "cell block 9 stats");
        assert_eq!(Pid::try_from(0xb043).unwrap(), Pid::Current);
        assert!(matches!(Pid::try_from(0x1234), Err(Error::UnknownPid(0x1234))));
    }

    #[test]
    fn block_index_is_bounded() {
        assert_eq!(BlockIndex::new(0).map(BlockIndex::get), Some(0));
        assert_eq!(BlockIndex::new(BLOCK_COUNT - 1).map(BlockIndex::get), Some(8));
        assert_eq!(BlockIndex::new(BLOCK_COUNT), None);
        assert_eq!(BlockIndex::new(usize::MAX), None);
    }

    #[test]
    fn bms_status_keeps_unknown_codes() {
        assert_eq!(BmsStatus::from(0x7), BmsStatus::CcsCharging);
        assert_eq!(BmsStatus::from(0xc), BmsStatus::StartingCharge);
        assert_eq!(BmsStatus::from(0x42), BmsStatus::Unknown(0x42));
    }

    #[test]
    fn conversions() {
        assert_eq!(cell_voltage(0), 1.0);
        assert_eq!(cell_voltage(5000), 3.5);
        assert_eq!(half_degree_temperature(80), 0.0);
        assert_eq!(half_degree_temperature(130), 25.0);
        assert_eq!(quarter_volts(1600), 400.0);
        assert_eq!(battery_current(40000), 0.0);
        assert_eq!(battery_current(40400), 10.0);
        assert_eq!(battery_current(39600), -10.0);
        assert_eq!(battery_power(400.0, -10.0), 4.0);
    }

    #[test]
    fn short_frames_are_rejected() {
        assert!(matches!(
            read_u16(&[0x01]),
            Err(Error::FrameTooShort {
                required: 2,
                received: 1
            })
        ));
        assert_eq!(read_u16(&[0x01, 0x02]).unwrap(), 0x0102);
    }

    #[test]
    fn frame_display() {
        let frame = Frame {
            pid: 0xb0e1,
            remain: 4,
            data: vec![0x13, 0x88, 0x14],
        };
        assert_eq!(frame.to_string(), "b0e1 4 138814");
    }
}
