//! Closure displacement from four measured fiducials
//!
//! The fiducials are ordered left-lower, left-upper, right-upper,
//! right-lower. After removing the centroid, a local frame is built from the
//! points themselves:
//!
//! - `e1` along right-lower minus left-lower
//! - `e2` along the mean of the upper pair minus the mean of the lower pair
//! - `e3 = e1 × e2`
//!
//! and every point is mapped through the inverse of that frame, which removes
//! any rotation of the specimen. A virtual notch is then projected from each
//! side: `stand_off` along the side's edge and `notch_offset` perpendicular
//! to it in the XY plane. The closure is the nominal notch distance minus the
//! corrected one.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{FlexureError, Result};

/// Lengths below this are treated as zero when normalising.
const MIN_LENGTH: f64 = 1e-12;

/// Specimen constants, in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexureGeometry {
    /// Undeformed left notch root
    pub nominal_left_notch: [f64; 3],
    /// Undeformed right notch root
    pub nominal_right_notch: [f64; 3],
    /// Distance from the upper fiducial to the notch centre, along the edge
    pub stand_off: f64,
    /// Perpendicular distance from the edge to the notch root
    pub notch_offset: f64,
    /// Dial-gauge reading per millimetre of closure
    pub dti_factor: f64,
}

impl Default for FlexureGeometry {
    fn default() -> Self {
        Self {
            nominal_left_notch: [-28.0, 15.0, 0.0],
            nominal_right_notch: [28.0, 15.0, 0.0],
            stand_off: 30.0,
            notch_offset: 12.0,
            dti_factor: -0.58865412,
        }
    }
}

impl FlexureGeometry {
    /// Notch-to-notch distance before bending
    pub fn nominal_distance(&self) -> f64 {
        (Vector3::from(self.nominal_left_notch) - Vector3::from(self.nominal_right_notch)).norm()
    }
}

/// Exactly four finite fiducial points in calculator order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiducialPoints([[f64; 3]; 4]);

impl FiducialPoints {
    pub fn new(points: [[f64; 3]; 4]) -> Result<Self> {
        for (index, p) in points.iter().enumerate() {
            if p.iter().any(|v| !v.is_finite()) {
                return Err(FlexureError::NonFinite { index });
            }
        }
        Ok(Self(points))
    }

    pub fn from_slice(points: &[[f64; 3]]) -> Result<Self> {
        let array: [[f64; 3]; 4] = points
            .try_into()
            .map_err(|_| FlexureError::PointCount(points.len()))?;
        Self::new(array)
    }

    pub fn as_array(&self) -> &[[f64; 3]; 4] {
        &self.0
    }

    /// Apply `p -> rotation * p + translation` to every point.
    pub fn transformed(&self, rotation: &Matrix3<f64>, translation: [f64; 3]) -> Self {
        let t = Vector3::from(translation);
        Self(self.0.map(|p| (rotation * Vector3::from(p) + t).into()))
    }
}

/// Result of [`closure_displacement`], with the construction kept for plotting
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    /// Nominal minus corrected notch distance
    pub displacement: f64,
    pub nominal_distance: f64,
    pub corrected_distance: f64,
    /// Measured points about their centroid
    pub centred: [[f64; 3]; 4],
    /// Centred points with the specimen rotation removed
    pub corrected: [[f64; 3]; 4],
    /// Left stand-off point, between the upper-left fiducial and the notch
    pub left_stand_off: [f64; 3],
    pub left_notch: [f64; 3],
    pub right_notch: [f64; 3],
}

fn unit(v: Vector3<f64>, what: &str) -> Result<Vector3<f64>> {
    let length = v.norm();
    if !(length > MIN_LENGTH) {
        return Err(FlexureError::Degenerate(format!("{what} has zero length")));
    }
    Ok(v / length)
}

/// Rigid-body-corrected closure displacement of four fiducials.
pub fn closure_displacement(
    points: &FiducialPoints,
    geometry: &FlexureGeometry,
) -> Result<Closure> {
    let measured = points.as_array().map(Vector3::from);
    let centroid = measured.iter().sum::<Vector3<f64>>() / 4.0;
    let p = measured.map(|v| v - centroid);

    let e1 = unit(p[3] - p[0], "lower edge (right-lower minus left-lower)")?;
    let e2 = unit(
        (p[1] + p[2]) / 2.0 - (p[0] + p[3]) / 2.0,
        "upper-to-lower offset",
    )?;
    let e3 = unit(e1.cross(&e2), "frame normal")?;

    // Rows are the measured axes; the inverse takes them back onto x, y, z.
    let frame = Matrix3::from_rows(&[e1.transpose(), e2.transpose(), e3.transpose()]);
    let rotation = frame
        .try_inverse()
        .ok_or_else(|| FlexureError::Degenerate("local frame is singular".to_string()))?;
    let q = p.map(|v| rotation.transpose() * v);

    let z = Vector3::z();

    let left_dir = unit(q[0] - q[1], "left edge")?;
    let left_stand_off = q[1] + left_dir * geometry.stand_off;
    let left_in = unit(left_dir.cross(&z), "left in-plane normal")?;
    let left_notch = left_stand_off - left_in * geometry.notch_offset;

    let right_dir = unit(q[3] - q[2], "right edge")?;
    let right_stand_off = q[2] + right_dir * geometry.stand_off;
    let right_in = unit(right_dir.cross(&z), "right in-plane normal")?;
    let right_notch = right_stand_off + right_in * geometry.notch_offset;

    let nominal_distance = geometry.nominal_distance();
    let corrected_distance = (left_notch - right_notch).norm();
    let displacement = nominal_distance - corrected_distance;
    if !displacement.is_finite() {
        return Err(FlexureError::Degenerate(
            "closure displacement is not finite".to_string(),
        ));
    }

    tracing::debug!(
        nominal_distance,
        corrected_distance,
        displacement,
        "computed closure displacement"
    );

    Ok(Closure {
        displacement,
        nominal_distance,
        corrected_distance,
        centred: p.map(Into::into),
        corrected: q.map(Into::into),
        left_stand_off: left_stand_off.into(),
        left_notch: left_notch.into(),
        right_notch: right_notch.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Rotation3;

    fn nominal() -> FiducialPoints {
        FiducialPoints::new([
            [-40.0, 25.0, 0.0],
            [-40.0, 45.0, 0.0],
            [40.0, 45.0, 0.0],
            [40.0, 25.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn nominal_fiducials_give_zero_closure() {
        let closure = closure_displacement(&nominal(), &FlexureGeometry::default()).unwrap();
        assert_abs_diff_eq!(closure.displacement, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(closure.nominal_distance, 56.0);
        assert_abs_diff_eq!(closure.left_notch[0], -28.0, epsilon = 1e-12);
        assert_abs_diff_eq!(closure.right_notch[0], 28.0, epsilon = 1e-12);
    }

    #[test]
    fn notch_positions_as_fiducials_close_by_24() {
        let points = FiducialPoints::new([
            [-28.0, 15.0, 0.0],
            [-28.0, 45.0, 0.0],
            [28.0, 45.0, 0.0],
            [28.0, 15.0, 0.0],
        ])
        .unwrap();
        let closure = closure_displacement(&points, &FlexureGeometry::default()).unwrap();
        assert_abs_diff_eq!(closure.displacement, 24.0, epsilon = 1e-12);
    }

    #[test]
    fn in_plane_rotation_is_removed() {
        let rotation = *Rotation3::from_axis_angle(&Vector3::z_axis(), 0.7).matrix();
        let moved = nominal().transformed(&rotation, [5.0, -3.0, 12.0]);
        let closure = closure_displacement(&moved, &FlexureGeometry::default()).unwrap();
        assert_abs_diff_eq!(closure.displacement, 0.0, epsilon = 1e-10);
        for (c, expected) in closure.corrected.iter().zip([
            [-40.0, -10.0, 0.0],
            [-40.0, 10.0, 0.0],
            [40.0, 10.0, 0.0],
            [40.0, -10.0, 0.0],
        ]) {
            for k in 0..3 {
                assert_abs_diff_eq!(c[k], expected[k], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn coincident_lower_fiducials_are_degenerate() {
        let points = FiducialPoints::new([
            [0.0, 0.0, 0.0],
            [0.0, 10.0, 0.0],
            [10.0, 10.0, 0.0],
            [0.0, 0.0, 0.0],
        ])
        .unwrap();
        let err = closure_displacement(&points, &FlexureGeometry::default()).unwrap_err();
        assert!(matches!(err, FlexureError::Degenerate(_)), "{err}");
    }

    #[test]
    fn collinear_fiducials_are_degenerate() {
        let points = FiducialPoints::new([
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [3.0, 0.0, 0.0],
        ])
        .unwrap();
        assert!(closure_displacement(&points, &FlexureGeometry::default()).is_err());
    }

    #[test]
    fn non_finite_and_wrong_count_are_rejected() {
        let mut raw = *nominal().as_array();
        raw[2][1] = f64::NAN;
        assert!(matches!(
            FiducialPoints::new(raw),
            Err(FlexureError::NonFinite { index: 2 })
        ));
        assert!(matches!(
            FiducialPoints::from_slice(&raw[..3]),
            Err(FlexureError::PointCount(3))
        ));
    }

    #[test]
    fn geometry_is_configurable() {
        let geometry = FlexureGeometry {
            nominal_left_notch: [-30.0, 15.0, 0.0],
            nominal_right_notch: [30.0, 15.0, 0.0],
            notch_offset: 10.0,
            ..FlexureGeometry::default()
        };
        assert_abs_diff_eq!(geometry.nominal_distance(), 60.0);
        let closure = closure_displacement(&nominal(), &geometry).unwrap();
        assert_abs_diff_eq!(closure.displacement, 0.0, epsilon = 1e-12);
    }
}
