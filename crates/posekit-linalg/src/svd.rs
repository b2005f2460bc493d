//! Double precision 3×3 Singular Value Decomposition (SVD).
//!
//! Rigid registration needs the SVD of the 3×3 cross-covariance matrix of two
//! point sets. The matrices are tiny, so a cyclic Jacobi eigenanalysis of
//! `AᵀA` is both fast and accurate enough in `f64`.
//!
//! # Mathematical Background
//!
//! For any matrix A ∈ ℝ³ˣ³, the SVD decomposes it into three matrices:
//!
//! ```text
//! A = U Σ Vᵀ
//! ```
//!
//! where:
//! * U ∈ ℝ³ˣ³ is an orthogonal matrix (left singular vectors)
//! * Σ ∈ ℝ³ˣ³ is a diagonal matrix of singular values (σ₁ ≥ σ₂ ≥ σ₃ ≥ 0)
//! * V ∈ ℝ³ˣ³ is an orthogonal matrix (right singular vectors)
//!
//! # Implementation Details
//!
//! 1. V holds the eigenvectors of the symmetric matrix `AᵀA`, found with exact
//!    Jacobi rotations swept until the off-diagonal mass vanishes.
//! 2. `B = A V` has orthogonal columns whose norms are the singular values.
//!    Columns are sorted by norm, descending.
//! 3. U is obtained by normalizing the columns of B. Columns belonging to
//!    vanishing singular values are completed to a right-handed orthonormal
//!    basis, so U is always a proper rotation in the rank deficient case.
//!
//! # Example
//!
//! ```
//! use glam::{DMat3, DVec3};
//! use posekit_linalg::svd::svd3;
//!
//! let matrix = DMat3::from_diagonal(DVec3::new(1.0, 2.0, 3.0));
//!
//! let svd_result = svd3(&matrix);
//! assert!((svd_result.s().x - 3.0).abs() < 1e-12);
//! ```

use glam::{DMat3, DVec3};

/// Relative tolerance under which a singular value is treated as zero.
const SVD3_EPSILON: f64 = 1e-12;

/// Upper bound on Jacobi sweeps; convergence is quadratic so a handful suffice.
const MAX_SWEEPS: usize = 32;

/// Result of [`svd3`].
#[derive(Debug, Clone, Copy)]
pub struct SVD3Set {
    /// The matrix of left singular vectors.
    u: DMat3,

    /// The singular values, sorted in descending order.
    s: DVec3,

    /// The matrix of right singular vectors.
    v: DMat3,
}

impl SVD3Set {
    /// Get the left singular vectors matrix.
    #[inline]
    pub fn u(&self) -> &DMat3 {
        &self.u
    }

    /// Get the singular values in descending order.
    #[inline]
    pub fn s(&self) -> &DVec3 {
        &self.s
    }

    /// Get the singular values as a diagonal matrix.
    #[inline]
    pub fn s_mat(&self) -> DMat3 {
        DMat3::from_diagonal(self.s)
    }

    /// Get the right singular vectors matrix.
    #[inline]
    pub fn v(&self) -> &DMat3 {
        &self.v
    }
}

/// Read the element at `(row, col)` of a column-major matrix.
#[inline(always)]
fn at(m: &DMat3, row: usize, col: usize) -> f64 {
    m.col(col)[row]
}

/// Apply one Jacobi rotation annihilating the `(p, q)` entry of the symmetric `s`.
///
/// The rotation is accumulated into `v`. See Numerical Recipes §11.1 for the
/// choice of the smaller rotation angle.
fn jacobi_rotate(s: &mut DMat3, v: &mut DMat3, p: usize, q: usize) {
    let s_pq = at(s, p, q);
    if s_pq.abs() <= f64::MIN_POSITIVE {
        return;
    }

    let theta = (at(s, q, q) - at(s, p, p)) / (2.0 * s_pq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let cos_theta = 1.0 / (t * t + 1.0).sqrt();
    let sin_theta = t * cos_theta;

    // columns of the rotation, indexed [col][row]
    let mut cols = DMat3::IDENTITY.to_cols_array_2d();
    cols[p][p] = cos_theta;
    cols[q][q] = cos_theta;
    cols[q][p] = sin_theta;
    cols[p][q] = -sin_theta;
    let rot = DMat3::from_cols_array_2d(&cols);

    *s = rot.transpose() * *s * rot;
    *v = *v * rot;
}

/// Eigenvectors of a symmetric matrix, as the columns of the returned matrix.
fn jacobi_eigenanalysis(mut s: DMat3) -> DMat3 {
    let mut v = DMat3::IDENTITY;
    for _ in 0..MAX_SWEEPS {
        let off_diag = at(&s, 0, 1).powi(2) + at(&s, 0, 2).powi(2) + at(&s, 1, 2).powi(2);
        let diag = at(&s, 0, 0).powi(2) + at(&s, 1, 1).powi(2) + at(&s, 2, 2).powi(2);
        if off_diag <= f64::EPSILON * f64::EPSILON * diag || off_diag == 0.0 {
            break;
        }
        jacobi_rotate(&mut s, &mut v, 0, 1);
        jacobi_rotate(&mut s, &mut v, 0, 2);
        jacobi_rotate(&mut s, &mut v, 1, 2);
    }
    v
}

/// Sorts the columns of `b` by decreasing norm and permutes `v` accordingly.
pub fn sort_singular_values(b: &mut DMat3, v: &mut DMat3) {
    let mut rho = [
        b.x_axis.length_squared(),
        b.y_axis.length_squared(),
        b.z_axis.length_squared(),
    ];
    let mut b_cols = [b.x_axis, b.y_axis, b.z_axis];
    let mut v_cols = [v.x_axis, v.y_axis, v.z_axis];

    for (i, j) in [(0, 1), (0, 2), (1, 2)] {
        if rho[i] < rho[j] {
            rho.swap(i, j);
            b_cols.swap(i, j);
            v_cols.swap(i, j);
        }
    }

    *b = DMat3::from_cols(b_cols[0], b_cols[1], b_cols[2]);
    *v = DMat3::from_cols(v_cols[0], v_cols[1], v_cols[2]);
}

/// Normalize the columns of `b` into an orthonormal basis of left singular vectors.
fn left_singular_vectors(b: &DMat3, s: &DVec3) -> DMat3 {
    if s.x <= f64::MIN_POSITIVE {
        return DMat3::IDENTITY;
    }
    let tol = SVD3_EPSILON * s.x;

    let u1 = b.x_axis / s.x;
    let u2 = if s.y > tol {
        (b.y_axis - u1 * u1.dot(b.y_axis)).normalize()
    } else {
        u1.any_orthonormal_vector()
    };
    let u3 = if s.z > tol {
        (b.z_axis - u1 * u1.dot(b.z_axis) - u2 * u2.dot(b.z_axis)).normalize()
    } else {
        u1.cross(u2)
    };

    DMat3::from_cols(u1, u2, u3)
}

/// Compute the singular value decomposition `a = U diag(s) Vᵀ`.
pub fn svd3(a: &DMat3) -> SVD3Set {
    // right singular vectors are the eigenvectors of AᵀA
    let mut v = jacobi_eigenanalysis(a.transpose() * *a);

    // B = A * V has orthogonal columns scaled by the singular values
    let mut b = *a * v;
    sort_singular_values(&mut b, &mut v);

    let s = DVec3::new(b.x_axis.length(), b.y_axis.length(), b.z_axis.length());
    let u = left_singular_vectors(&b, &s);

    SVD3Set { u, s, v }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper function to validate all critical SVD properties
    fn verify_svd_properties(a: &DMat3, svd: &SVD3Set, epsilon: f64) {
        let u = svd.u;
        let v = svd.v;

        let reconstruction = u * svd.s_mat() * v.transpose();
        assert!(
            a.abs_diff_eq(reconstruction, epsilon),
            "Reconstruction failed: A != U*S*V.T\nA:\n{}\nReconstruction:\n{}",
            a,
            reconstruction
        );

        let u_t_u = u.transpose() * u;
        assert!(
            DMat3::IDENTITY.abs_diff_eq(u_t_u, epsilon),
            "U is not orthogonal: U.T*U != I\nU.T*U:\n{}",
            u_t_u
        );

        let v_t_v = v.transpose() * v;
        assert!(
            DMat3::IDENTITY.abs_diff_eq(v_t_v, epsilon),
            "V is not orthogonal: V.T*V != I\nV.T*V:\n{}",
            v_t_v
        );

        let s = svd.s;
        assert!(
            s.x >= 0.0 && s.y >= 0.0 && s.z >= 0.0,
            "Singular values are not non-negative: {:?}",
            s
        );
        assert!(
            s.x >= s.y - epsilon && s.y >= s.z - epsilon,
            "Singular values are not sorted: {:?}",
            s
        );
    }

    #[test]
    fn test_svd3_diagonal_sorted() {
        let a = DMat3::from_diagonal(DVec3::new(3.0, 2.0, 1.0));
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-12);
        assert!(svd_result.s.abs_diff_eq(DVec3::new(3.0, 2.0, 1.0), 1e-12));
    }

    #[test]
    fn test_svd3_diagonal_unsorted() {
        let a = DMat3::from_diagonal(DVec3::new(2.0, 3.0, 1.0));
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-12);
        assert!(svd_result.s.abs_diff_eq(DVec3::new(3.0, 2.0, 1.0), 1e-12));
    }

    #[test]
    fn test_svd3_zero() {
        let a = DMat3::ZERO;
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-12);
        assert!(svd_result.s.abs_diff_eq(DVec3::ZERO, 1e-12));
    }

    #[test]
    fn test_svd3_rotation_matrix() {
        let a = DMat3::from_rotation_y(std::f64::consts::FRAC_PI_4);
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-10);
        assert!(svd_result.s.abs_diff_eq(DVec3::ONE, 1e-10));
    }

    #[test]
    fn test_svd3_reflection_matrix() {
        let a = DMat3::from_diagonal(DVec3::new(1.0, -1.0, 1.0));
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-12);
        assert!(svd_result.s.abs_diff_eq(DVec3::ONE, 1e-12));
    }

    #[test]
    fn test_svd3_singular_rank1() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(2.0, 4.0, 6.0),
            DVec3::new(3.0, 6.0, 9.0),
        );
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-9);
        assert!(svd_result.s.x > 1.0);
        assert!(svd_result.s.y.abs() < 1e-9);
        assert!(svd_result.s.z.abs() < 1e-9);
        // completed basis is still a proper rotation
        assert!((svd_result.u.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_svd3_singular_rank2() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(4.0, 5.0, 6.0),
            DVec3::new(5.0, 7.0, 9.0), // c0 + c1
        );
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-9);
        assert!(svd_result.s.x > 1e-6);
        assert!(svd_result.s.y > 1e-6);
        assert!(svd_result.s.z.abs() < 1e-9);
    }

    #[test]
    fn test_svd3_general_full_rank() {
        let a = DMat3::from_cols(
            DVec3::new(1.0, 4.0, 7.0),
            DVec3::new(2.0, 5.0, 8.0),
            DVec3::new(3.0, 6.0, 10.0),
        );
        let svd_result = svd3(&a);
        verify_svd_properties(&a, &svd_result, 1e-9);
        assert!(svd_result.s.min_element() > 1e-6);
    }
}
