//! Boundary condition for the follow-up flexure run

use std::fmt::Write as _;

use crate::closure::FlexureGeometry;
use crate::error::{FlexureError, Result};

/// Prescribed x-displacements of the two loaded sides
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosureBoundary {
    /// Applied to node set `LEFT`
    pub left: f64,
    /// Applied to node set `RIGHT`
    pub right: f64,
}

impl ClosureBoundary {
    /// Split a closure symmetrically: `+d/2` on the left, `-d/2` on the right.
    pub fn from_displacement(displacement: f64) -> Self {
        Self {
            left: displacement / 2.0,
            right: -displacement / 2.0,
        }
    }

    /// Total closure, `left - right`
    pub fn displacement(&self) -> f64 {
        self.left - self.right
    }

    /// `*BOUNDARY` card for the deck. The sides are free in y, and the
    /// `MIDPLANE_XY` set is held in z.
    pub fn to_inp_block(&self) -> String {
        let mut out = String::from("*BOUNDARY\n");
        let _ = writeln!(out, "LEFT, 1,1,{:.6}", self.left);
        let _ = writeln!(out, "LEFT, 2,2,");
        let _ = writeln!(out, "RIGHT, 1,1,{:.6}", self.right);
        let _ = writeln!(out, "RIGHT, 2,2,");
        let _ = writeln!(out, "MIDPLANE_XY, 3,3,");
        out
    }
}

/// Dial-gauge (DTI) reading equivalent to a closure displacement
pub fn dti_reading(displacement: f64, geometry: &FlexureGeometry) -> f64 {
    displacement * geometry.dti_factor
}

/// Closure displacement from a dial-gauge reading
pub fn displacement_from_dti(reading: f64, geometry: &FlexureGeometry) -> Result<f64> {
    if geometry.dti_factor == 0.0 || !geometry.dti_factor.is_finite() {
        return Err(FlexureError::Degenerate(format!(
            "dial-gauge factor {} cannot be inverted",
            geometry.dti_factor
        )));
    }
    Ok(reading / geometry.dti_factor)
}
