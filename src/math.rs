//! Affine matrix helpers on top of glam's double precision types.

use glam::{DMat3, DMat4, DQuat, DVec3};

use crate::error::{Error, Result};

const EPSILON: f64 = 1e-12;

/// The components of an affine matrix, applied as `translation * rotation * shear * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    pub translation: DVec3,
    /// A proper rotation (determinant +1). Reflections are folded into `scale`.
    pub rotation: DMat3,
    pub scale: DVec3,
    /// The xy, xz and yz shear factors.
    pub shear: DVec3,
}

/// Splits an affine matrix into translation, rotation, scale and shear.
///
/// The basis vectors are orthonormalized with Gram-Schmidt, in x, y, z order. Any perspective
/// part of the matrix is ignored.
pub fn decompose(matrix: &DMat4) -> Result<Decomposition> {
    let w = matrix.w_axis.w;
    if w.abs() < EPSILON {
        return Err(Error::Decomposition("homogeneous coordinate is zero"));
    }
    let matrix = *matrix * (1. / w);

    let translation = matrix.w_axis.truncate();
    let mut x = matrix.x_axis.truncate();
    let mut y = matrix.y_axis.truncate();
    let mut z = matrix.z_axis.truncate();

    let mut scale = DVec3::ZERO;
    let mut shear = DVec3::ZERO;

    scale.x = x.length();
    if scale.x < EPSILON {
        return Err(Error::Decomposition("x axis has zero scale"));
    }
    x /= scale.x;

    shear.x = x.dot(y);
    y -= x * shear.x;
    scale.y = y.length();
    if scale.y < EPSILON {
        return Err(Error::Decomposition("y axis has zero scale"));
    }
    y /= scale.y;
    shear.x /= scale.y;

    shear.y = x.dot(z);
    z -= x * shear.y;
    shear.z = y.dot(z);
    z -= y * shear.z;
    scale.z = z.length();
    if scale.z < EPSILON {
        return Err(Error::Decomposition("z axis has zero scale"));
    }
    z /= scale.z;
    shear.y /= scale.z;
    shear.z /= scale.z;

    if x.dot(y.cross(z)) < 0. {
        scale = -scale;
        x = -x;
        y = -y;
        z = -z;
    }

    Ok(Decomposition {
        translation,
        rotation: DMat3::from_cols(x, y, z),
        scale,
        shear,
    })
}

/// Returns the translation of an affine matrix. Unlike [`decompose`], this never fails on a
/// degenerate basis.
pub fn translation(matrix: &DMat4) -> DVec3 {
    let w = matrix.w_axis.w;
    if w.abs() < EPSILON {
        matrix.w_axis.truncate()
    } else {
        matrix.w_axis.truncate() / w
    }
}

/// Converts a rotation matrix to a unit axis and an angle in degrees.
///
/// The angle is in `[0, 180]`. The identity gives the X axis and a zero angle.
pub fn to_axis_angle(rotation: &DMat3) -> (DVec3, f64) {
    let mut quat = DQuat::from_mat3(rotation).normalize();
    if quat.w < 0. {
        quat = -quat;
    }

    let vector = DVec3::new(quat.x, quat.y, quat.z);
    let sine = vector.length();
    if sine < EPSILON {
        return (DVec3::X, 0.);
    }

    (vector / sine, (2. * sine.atan2(quat.w)).to_degrees())
}

/// Builds a rotation matrix from an axis and an angle in degrees. A zero axis gives the
/// identity.
pub fn from_axis_angle(axis: DVec3, degrees: f64) -> DMat3 {
    let axis = axis.normalize_or_zero();
    if axis == DVec3::ZERO {
        DMat3::IDENTITY
    } else {
        DMat3::from_axis_angle(axis, degrees.to_radians())
    }
}

/// Applies a 3x3 matrix to every vector in place.
pub fn rotate_vectors(rotation: &DMat3, vectors: &mut [DVec3]) {
    for vector in vectors {
        *vector = *rotation * *vector;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn decompose_trs() {
        let rotation = DQuat::from_axis_angle(DVec3::new(1., 2., 3.).normalize(), 0.7);
        let matrix = DMat4::from_scale_rotation_translation(
            DVec3::new(2., 3., 4.),
            rotation,
            DVec3::new(-1., 5., 0.5),
        );

        let decomposed = decompose(&matrix).unwrap();

        assert!(decomposed
            .translation
            .abs_diff_eq(DVec3::new(-1., 5., 0.5), TOLERANCE));
        assert!(decomposed
            .rotation
            .abs_diff_eq(DMat3::from_quat(rotation), TOLERANCE));
        assert!(decomposed
            .scale
            .abs_diff_eq(DVec3::new(2., 3., 4.), TOLERANCE));
        assert!(decomposed.shear.abs_diff_eq(DVec3::ZERO, TOLERANCE));
    }

    #[test]
    fn decompose_reflection_keeps_a_proper_rotation() {
        let matrix = DMat4::from_scale(DVec3::new(1., 1., -1.));

        let decomposed = decompose(&matrix).unwrap();

        assert!((decomposed.rotation.determinant() - 1.).abs() < TOLERANCE);
        assert!(decomposed
            .scale
            .abs_diff_eq(DVec3::new(-1., -1., -1.), TOLERANCE));
        assert!(decomposed
            .rotation
            .abs_diff_eq(DMat3::from_diagonal(DVec3::new(-1., -1., 1.)), TOLERANCE));
        assert!(DMat4::from_mat3(decomposed.rotation * DMat3::from_diagonal(decomposed.scale))
            .abs_diff_eq(matrix, TOLERANCE));
    }

    #[test]
    fn decompose_shear() {
        let mut matrix = DMat4::IDENTITY;
        matrix.y_axis.x = 0.5;

        let decomposed = decompose(&matrix).unwrap();

        assert!(decomposed.rotation.abs_diff_eq(DMat3::IDENTITY, TOLERANCE));
        assert!(decomposed
            .shear
            .abs_diff_eq(DVec3::new(0.5, 0., 0.), TOLERANCE));
    }

    #[test]
    fn decompose_rejects_degenerate_matrices() {
        assert!(decompose(&DMat4::from_scale(DVec3::new(1., 0., 1.))).is_err());
        assert!(decompose(&DMat4::ZERO).is_err());
    }

    #[test]
    fn axis_angle_of_inverse_rotation() {
        let rotation = from_axis_angle(DVec3::X, 90.);

        let (axis, angle) = to_axis_angle(&rotation.inverse());

        assert!((axis * angle).abs_diff_eq(DVec3::new(-90., 0., 0.), TOLERANCE));
        assert!(from_axis_angle(axis, angle)
            .mul_mat3(&rotation)
            .abs_diff_eq(DMat3::IDENTITY, TOLERANCE));
    }

    #[test]
    fn axis_angle_of_identity() {
        assert_eq!((DVec3::X, 0.), to_axis_angle(&DMat3::IDENTITY));
        assert_eq!(DMat3::IDENTITY, from_axis_angle(DVec3::ZERO, 45.));
    }

    #[test]
    fn rotate_vector_array() {
        let mut vectors = [DVec3::Y, DVec3::Z];

        rotate_vectors(&from_axis_angle(DVec3::X, 90.), &mut vectors);

        assert!(vectors[0].abs_diff_eq(DVec3::Z, TOLERANCE));
        assert!(vectors[1].abs_diff_eq(-DVec3::Y, TOLERANCE));
    }
}
