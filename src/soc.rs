use crate::config::{ConfigStore, UPDATED_BMU_PARAM};

/// Depth-of-discharge window of the BMU, in tenths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocWindow {
    pub lower: u16,
    pub upper: u16,
}

impl SocWindow {
    pub const UPDATED_BMU: SocWindow = SocWindow {
        lower: 25,
        upper: 940,
    };
    pub const ORIGINAL_BMU: SocWindow = SocWindow {
        lower: 60,
        upper: 970,
    };

    pub fn from_config<C: ConfigStore + ?Sized>(config: &C) -> Self {
        if config.get_bool_param(UPDATED_BMU_PARAM, true) {
            Self::UPDATED_BMU
        } else {
            Self::ORIGINAL_BMU
        }
    }

    /// Remaps a raw reading into the displayed percentage. Readings outside the
    /// window produce values outside 0..=100.
    pub fn scale(self, raw: u16) -> f32 {
        (raw as f32 - self.lower as f32) * 100.0 / (self.upper as f32 - self.lower as f32)
    }
}

pub fn scale_soc<C: ConfigStore + ?Sized>(config: &C, raw: u16) -> f32 {
    SocWindow::from_config(config).scale(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BmsConfig;

    #[test]
    fn window_edges() {
        let updated = BmsConfig { updated_bmu: true };
        let original = BmsConfig { updated_bmu: false };
        assert_eq!(scale_soc(&updated, 25), 0.0);
        assert_eq!(scale_soc(&updated, 940), 100.0);
        assert_eq!(scale_soc(&original, 60), 0.0);
        assert_eq!(scale_soc(&original, 970), 100.0);
    }

    #[test]
    fn out_of_window_is_not_clamped() {
        assert!(SocWindow::UPDATED_BMU.scale(0) < 0.0);
        assert!(SocWindow::UPDATED_BMU.scale(1000) > 100.0);
        assert!(SocWindow::ORIGINAL_BMU.scale(30) < 0.0);
    }

    #[test]
    fn midpoint() {
        let mid = SocWindow::ORIGINAL_BMU.scale(515);
        assert!((mid - 50.0).abs() < 1e-4);
    }
}
