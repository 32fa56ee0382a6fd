//! Named needle profiles.
//!
//! Each preset pairs a needle geometry and material with tissue spring
//! settings typical for the setup it is named after.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{SpringConfig, StiffnessMode};
use crate::needle::NeedleProperties;

/// Needle profile presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeedlePreset {
    /// 18G stainless steel biopsy needle in soft tissue.
    BiopsyNeedle,
    /// Thin-walled stainless steel cannula.
    BiopsyCannula,
    /// Solid nitinol wire in soft gel (Abayazid et al., RRM 2013).
    AbayazidRrm13,
    /// Solid nitinol wire in gelatin (Roesthuis et al., AM 2012).
    RoesthuisAm12,
    /// Nitinol wire in plastisol phantom A (Misra et al., RSRO 2012).
    MisraRsro12PlastisolA,
}

impl NeedlePreset {
    /// All presets.
    pub const ALL: [Self; 5] = [
        Self::BiopsyNeedle,
        Self::BiopsyCannula,
        Self::AbayazidRrm13,
        Self::RoesthuisAm12,
        Self::MisraRsro12PlastisolA,
    ];

    /// Short identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BiopsyNeedle => "biopsy-needle",
            Self::BiopsyCannula => "biopsy-cannula",
            Self::AbayazidRrm13 => "abayazid-rrm13",
            Self::RoesthuisAm12 => "roesthuis-am12",
            Self::MisraRsro12PlastisolA => "misra-rsro12-plastisol-a",
        }
    }

    /// Needle geometry and material.
    #[must_use]
    pub const fn properties(self) -> NeedleProperties {
        match self {
            Self::BiopsyNeedle => NeedleProperties {
                outer_diameter: 0.00127, // 18G
                inside_diameter: 0.0008,
                youngs_modulus: 200e9, // stainless steel
                length: 0.1,
            },
            Self::BiopsyCannula => NeedleProperties {
                outer_diameter: 0.00127,
                inside_diameter: 0.00105,
                youngs_modulus: 200e9,
                length: 0.1,
            },
            Self::AbayazidRrm13 => NeedleProperties {
                outer_diameter: 0.0005,
                inside_diameter: 0.0,
                youngs_modulus: 75e9, // nitinol
                length: 0.15,
            },
            Self::RoesthuisAm12 => NeedleProperties {
                outer_diameter: 0.0005,
                inside_diameter: 0.0,
                youngs_modulus: 75e9,
                length: 0.12,
            },
            Self::MisraRsro12PlastisolA => NeedleProperties {
                outer_diameter: 0.0004,
                inside_diameter: 0.0,
                youngs_modulus: 50e9,
                length: 0.12,
            },
        }
    }

    /// Tissue spring settings matching the preset's medium.
    #[must_use]
    pub const fn spring_config(self) -> SpringConfig {
        let stiffness_per_unit_length = match self {
            Self::BiopsyNeedle | Self::BiopsyCannula => 10_000.0, // soft tissue
            Self::AbayazidRrm13 => 3_500.0,
            Self::RoesthuisAm12 => 2_500.0, // gelatin
            Self::MisraRsro12PlastisolA => 6_000.0,
        };
        SpringConfig {
            inter_spring_distance: 0.005,
            inter_tip_spring_distance: 0.001,
            min_tip_springs: 5,
            max_tip_springs: 10,
            automatic_addition: true,
            stiffness_per_unit_length,
            stiffness_mode: StiffnessMode::PerUnitLength,
        }
    }
}

impl fmt::Display for NeedlePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
