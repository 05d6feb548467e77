//! Rigid-body-corrected closure displacement for OpenRS U-bend specimens.
//!
//! This crate provides:
//! - **Closure calculation** from four deformed fiducial points
//! - **Boundary conditions** (`*BOUNDARY` card) for the follow-up flexure run
//! - **Dial-gauge conversion** between closure and DTI reading
//! - **Diagnostic SVG plot** of the construction

pub mod boundary;
pub mod closure;
pub mod error;
pub mod plot;

pub use boundary::{ClosureBoundary, displacement_from_dti, dti_reading};
pub use closure::{Closure, FiducialPoints, FlexureGeometry, closure_displacement};
pub use error::{FlexureError, Result};
pub use plot::{render_svg, write_svg};
