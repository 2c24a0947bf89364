//! Where to stop the wheel so the pointer lands on a given section.
//!
//! Sections are laid out clockwise with section 0 centred on 0°, so section 0
//! straddles the 0°/360° seam. Boundaries are expressed in half-section units
//! through [`ODDS_TABLE`], which also fixes the maximum number of sections.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SpinError, SpinErrorKind};

/// Largest wheel the odds table can describe.
pub const MAX_SECTIONS: usize = 8;

/// Section boundaries in half-section units, indexed by section.
pub const ODDS_TABLE: [u32; MAX_SECTIONS + 1] = [0, 1, 3, 5, 7, 9, 11, 13, 15];

/// Upper bound of the right half of section 0, slightly past a full turn.
pub const WRAP_UPPER_DEGREES: f64 = 360.01;

/// Revolution offsets must exceed any single angle for spins to only ever move forward.
pub const MIN_BASE_REVOLUTION_DEGREES: f64 = WRAP_UPPER_DEGREES;

/// Half-open range `[min, max)` of degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl AngleRange {
    pub fn contains(&self, angle: f64) -> bool {
        angle >= self.min && angle < self.max
    }

    /// `floor(random * (max - min)) + min`: whole-degree steps from `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        (rng.gen::<f64>() * (self.max - self.min)).floor() + self.min
    }
}

/// Valid stopping angles for one section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SectionRange {
    Single(AngleRange),
    /// Section 0: the slice just before 360° and the slice just after 0°.
    Wrapped { right: AngleRange, left: AngleRange },
}

impl SectionRange {
    pub fn contains(&self, angle: f64) -> bool {
        match self {
            Self::Single(range) => range.contains(angle),
            Self::Wrapped { right, left } => right.contains(angle) || left.contains(angle),
        }
    }
}

/// Arc covered by a section, for renderers. Section 0 starts below zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionArc {
    pub index: usize,
    pub start_degrees: f64,
    pub end_degrees: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionGeometry {
    section_count: usize,
}

impl SectionGeometry {
    pub fn new(section_count: usize) -> Result<Self, SpinError> {
        if section_count == 0 || section_count > MAX_SECTIONS {
            return Err(SpinError::new(
                SpinErrorKind::InvalidSectionCount,
                format!("A wheel needs between 1 and {} sections, got {}", MAX_SECTIONS, section_count),
            ));
        }
        Ok(Self { section_count })
    }

    pub fn section_count(&self) -> usize {
        self.section_count
    }

    pub fn section_angle(&self) -> f64 {
        360.0 / self.section_count as f64
    }

    pub fn half_section_angle(&self) -> f64 {
        self.section_angle() / 2.0
    }

    fn check_index(&self, index: usize) -> Result<(), SpinError> {
        if index >= self.section_count {
            return Err(SpinError::new(
                SpinErrorKind::InvalidSectionIndex,
                format!("Section {} does not exist on a {} section wheel", index, self.section_count),
            ));
        }
        Ok(())
    }

    pub fn range_for(&self, index: usize) -> Result<SectionRange, SpinError> {
        self.check_index(index)?;
        let half = self.half_section_angle();
        if index == 0 {
            return Ok(SectionRange::Wrapped {
                right: AngleRange {
                    min: ODDS_TABLE[self.section_count] as f64 * half,
                    max: WRAP_UPPER_DEGREES,
                },
                left: AngleRange { min: 0.0, max: half },
            });
        }
        Ok(SectionRange::Single(AngleRange {
            min: ODDS_TABLE[index] as f64 * half,
            max: ODDS_TABLE[index + 1] as f64 * half,
        }))
    }

    /// Random angle inside the section. Section 0 picks either half with equal odds.
    pub fn angle_for<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<f64, SpinError> {
        let range = match self.range_for(index)? {
            SectionRange::Single(range) => range,
            SectionRange::Wrapped { right, left } => {
                if rng.gen_bool(0.5) {
                    right
                } else {
                    left
                }
            }
        };
        Ok(range.sample(rng))
    }

    pub fn section_arc(&self, index: usize) -> Result<SectionArc, SpinError> {
        self.check_index(index)?;
        let center = index as f64 * self.section_angle();
        let half = self.half_section_angle();
        Ok(SectionArc {
            index,
            start_degrees: center - half,
            end_degrees: center + half,
        })
    }

    pub fn arcs(&self) -> Vec<SectionArc> {
        (0..self.section_count)
            .filter_map(|index| self.section_arc(index).ok())
            .collect()
    }
}

pub fn angle_for_section<R: Rng + ?Sized>(index: usize, section_count: usize, rng: &mut R) -> Result<f64, SpinError> {
    SectionGeometry::new(section_count)?.angle_for(index, rng)
}

/// Absolute rotation for the next spin. Each spin adds one more base
/// revolution, so the wheel never turns back.
pub fn target_rotation(base_revolution_degrees: f64, successful_spins: u32, angle: f64) -> f64 {
    base_revolution_degrees * (successful_spins as f64 + 1.0) + angle
}
