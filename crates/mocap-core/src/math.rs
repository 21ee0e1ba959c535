use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

pub type Real = f64;

pub type Vec3 = Vector3<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;
pub type Mat4 = Matrix4<Real>;

/// Exponent argument above which [`stable_exp`] continues linearly.
pub const EXP_CLAMP: Real = 30.0;

fn rot_x(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c)
}

fn rot_y(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c)
}

fn rot_z(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0)
}

fn d_rot_x(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(0.0, 0.0, 0.0, 0.0, -s, -c, 0.0, c, -s)
}

fn d_rot_y(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(-s, 0.0, c, 0.0, 0.0, 0.0, -c, 0.0, -s)
}

fn d_rot_z(a: Real) -> Mat3 {
    let (s, c) = a.sin_cos();
    Mat3::new(-s, -c, 0.0, c, -s, 0.0, 0.0, 0.0, 0.0)
}

/// Rotation matrix for Euler angles applied in Y, X, Z order.
///
/// `angles` is stored in application order: `[y, x, z]`, so the result is
/// `Ry(angles[0]) * Rx(angles[1]) * Rz(angles[2])`.
pub fn euler_yxz_to_rotation(angles: &Vec3) -> Mat3 {
    rot_y(angles[0]) * rot_x(angles[1]) * rot_z(angles[2])
}

/// Partial derivatives of [`euler_yxz_to_rotation`] with respect to each angle.
pub fn euler_yxz_partials(angles: &Vec3) -> [Mat3; 3] {
    let (ry, rx, rz) = (rot_y(angles[0]), rot_x(angles[1]), rot_z(angles[2]));
    [
        d_rot_y(angles[0]) * rx * rz,
        ry * d_rot_x(angles[1]) * rz,
        ry * rx * d_rot_z(angles[2]),
    ]
}

/// Embed a rotation into a homogeneous 4x4 transform with zero translation.
pub fn homogeneous_rotation(r: &Mat3) -> Mat4 {
    let mut m = Mat4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(r);
    m
}

/// Translation column of a homogeneous transform.
pub fn translation(m: &Mat4) -> Vec3 {
    Vec3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Build a pure translation transform.
pub fn translation_matrix(t: &Vec3) -> Mat4 {
    Mat4::new_translation(t)
}

/// Convert a row-major nested array into a matrix.
pub fn mat4_from_rows(rows: &[[Real; 4]; 4]) -> Mat4 {
    Mat4::from_fn(|r, c| rows[r][c])
}

/// Exponential that grows linearly past [`EXP_CLAMP`] instead of overflowing.
///
/// The function stays continuous and strictly increasing, with a continuous
/// first derivative, so barrier penalties built on it keep pushing back.
#[inline]
pub fn stable_exp(x: Real) -> Real {
    if x <= EXP_CLAMP {
        x.exp()
    } else {
        EXP_CLAMP.exp() * (1.0 + (x - EXP_CLAMP))
    }
}

/// Derivative of [`stable_exp`].
#[inline]
pub fn stable_exp_derivative(x: Real) -> Real {
    if x <= EXP_CLAMP {
        x.exp()
    } else {
        EXP_CLAMP.exp()
    }
}
