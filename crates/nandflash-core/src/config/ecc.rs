//! ECC strength selection
//!
//! The controller computes ECC over 1 KiB steps and stores the parity in
//! the spare area. Stronger modes need more spare bytes per step.

use core::fmt;
use core::str::FromStr;

use crate::chip::BusType;
use crate::error::{Error, Result};

/// Data bytes covered by one ECC step
pub const ECC_STEP_SIZE: u32 = 1024;

/// ECC strength supported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EccMode {
    /// 16-bit correction per step
    Ecc16,
    /// 24-bit correction per step
    Ecc24,
    /// 30-bit correction per step
    Ecc30,
}

impl EccMode {
    /// All modes, strongest first
    pub const STRONGEST_FIRST: [EccMode; 3] = [EccMode::Ecc30, EccMode::Ecc24, EccMode::Ecc16];

    /// Minimum spare bytes per step this mode needs
    pub const fn min_spare_per_step(self) -> u32 {
        match self {
            Self::Ecc30 => 56,
            Self::Ecc24 => 46,
            Self::Ecc16 => 32,
        }
    }

    /// Value of the configuration register's ECC mode field
    pub const fn register_value(self) -> u32 {
        match self {
            Self::Ecc16 => 0,
            Self::Ecc24 => 1,
            Self::Ecc30 => 2,
        }
    }

    /// Correctable bits per step
    pub const fn strength(self) -> u32 {
        match self {
            Self::Ecc16 => 16,
            Self::Ecc24 => 24,
            Self::Ecc30 => 30,
        }
    }
}

impl fmt::Display for EccMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.strength())
    }
}

impl FromStr for EccMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim_end_matches("-bit") {
            "16" => Ok(Self::Ecc16),
            "24" => Ok(Self::Ecc24),
            "30" => Ok(Self::Ecc30),
            _ => Err(Error::UnsupportedEccGeometry),
        }
    }
}

/// Restrictions applied when picking an ECC mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EccPolicy {
    /// Never select a mode stronger than this
    pub max_mode: Option<EccMode>,
}

impl EccPolicy {
    /// Policy that caps the strength at `mode`
    pub const fn capped(mode: EccMode) -> Self {
        Self {
            max_mode: Some(mode),
        }
    }

    fn allows(&self, mode: EccMode) -> bool {
        self.max_mode.is_none_or(|max| mode <= max)
    }
}

/// Selected ECC configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EccSelection {
    /// Chosen mode
    pub mode: EccMode,
    /// ECC steps per page across all channels
    pub steps: u32,
}

/// Pick the strongest ECC mode the spare area can hold
///
/// The step count is doubled for a double-channel bus after the mode has
/// been chosen; the per-step spare budget is computed per chip.
pub fn select_ecc(
    page_size: u32,
    spare_size: u32,
    bus: BusType,
    policy: &EccPolicy,
) -> Result<EccSelection> {
    let steps = page_size / ECC_STEP_SIZE;
    if steps == 0 {
        log::error!("Page size {} is smaller than one ECC step", page_size);
        return Err(Error::UnsupportedEccGeometry);
    }
    let per_step = spare_size / steps;

    let mode = EccMode::STRONGEST_FIRST
        .into_iter()
        .filter(|m| policy.allows(*m))
        .find(|m| m.min_spare_per_step() <= per_step)
        .ok_or_else(|| {
            log::error!(
                "No ECC mode fits {} spare bytes per step (page {}, spare {})",
                per_step,
                page_size,
                spare_size
            );
            Error::UnsupportedEccGeometry
        })?;

    let steps = steps * bus.channels();
    log::debug!("ECC {} with {} steps ({} spare bytes/step)", mode, steps, per_step);

    Ok(EccSelection { mode, steps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hynix_selects_strongest() {
        let sel = select_ecc(8192, 448, BusType::SingleChannel8Bit, &EccPolicy::default()).unwrap();
        assert_eq!(sel.mode, EccMode::Ecc30);
        assert_eq!(sel.steps, 8);
    }

    #[test]
    fn test_capped_policy() {
        let sel = select_ecc(
            8192,
            448,
            BusType::SingleChannel8Bit,
            &EccPolicy::capped(EccMode::Ecc24),
        )
        .unwrap();
        assert_eq!(sel.mode, EccMode::Ecc24);
    }

    #[test]
    fn test_double_channel_doubles_steps() {
        let sel = select_ecc(8192, 448, BusType::DoubleChannel16Bit, &EccPolicy::default()).unwrap();
        assert_eq!(sel.mode, EccMode::Ecc30);
        assert_eq!(sel.steps, 16);
    }

    #[test]
    fn test_thresholds() {
        let bus = BusType::SingleChannel8Bit;
        let policy = EccPolicy::default();
        assert_eq!(select_ecc(2048, 64, bus, &policy).unwrap().mode, EccMode::Ecc16);
        assert_eq!(select_ecc(2048, 92, bus, &policy).unwrap().mode, EccMode::Ecc24);
        assert_eq!(select_ecc(4096, 224, bus, &policy).unwrap().mode, EccMode::Ecc30);
        assert_eq!(
            select_ecc(2048, 63, bus, &policy),
            Err(Error::UnsupportedEccGeometry)
        );
        assert_eq!(
            select_ecc(512, 16, bus, &policy),
            Err(Error::UnsupportedEccGeometry)
        );
    }

    #[test]
    fn test_never_exceeds_budget() {
        let bus = BusType::SingleChannel8Bit;
        for spare in 0..600u32 {
            let per_step = spare / 8;
            match select_ecc(8192, spare, bus, &EccPolicy::default()) {
                Ok(sel) => {
                    assert!(sel.mode.min_spare_per_step() <= per_step);
                    // No stronger mode would have fit
                    for stronger in EccMode::STRONGEST_FIRST.iter().filter(|m| **m > sel.mode) {
                        assert!(stronger.min_spare_per_step() > per_step);
                    }
                }
                Err(e) => {
                    assert_eq!(e, Error::UnsupportedEccGeometry);
                    assert!(per_step < 32);
                }
            }
        }
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("24".parse::<EccMode>().unwrap(), EccMode::Ecc24);
        assert_eq!("30-bit".parse::<EccMode>().unwrap(), EccMode::Ecc30);
        assert!("8".parse::<EccMode>().is_err());
    }
}
