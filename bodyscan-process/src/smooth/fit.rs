//! Local plane and polynomial fits over a neighbourhood.

use crate::error::{ProcessError, ProcessResult};
use glam::DVec3;
use nalgebra::{DMatrix, DVector, Matrix3, SymmetricEigen};

/// Singular values below this fraction of the largest are treated as zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// Least-squares plane through a neighbourhood with an orthonormal
/// tangent basis, anchored at the query point projected onto the plane.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalFrame {
    pub origin: DVec3,
    pub normal: DVec3,
    pub u: DVec3,
    pub v: DVec3,
    /// `λ_min / (λ_0 + λ_1 + λ_2)` of the neighbourhood covariance.
    pub curvature: f64,
}

impl LocalFrame {
    pub fn fit(query: DVec3, neighbors: &[DVec3]) -> Self {
        let n = neighbors.len() as f64;
        let centroid = neighbors.iter().copied().sum::<DVec3>() / n;

        let mut covariance = Matrix3::<f64>::zeros();
        for p in neighbors {
            let d = *p - centroid;
            let d = nalgebra::Vector3::new(d.x, d.y, d.z);
            covariance += d * d.transpose();
        }
        covariance /= n;

        let eigen = SymmetricEigen::new(covariance);
        let (smallest, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, value)| (i, *value))
            .unwrap_or((0, 0.0));
        let column = eigen.eigenvectors.column(smallest);
        let normal = DVec3::new(column[0], column[1], column[2])
            .try_normalize()
            .unwrap_or(DVec3::Z);

        let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();
        let curvature = if total > 0.0 {
            eigen.eigenvalues[smallest].max(0.0) / total
        } else {
            0.0
        };

        let u = normal.any_orthonormal_vector();
        let v = normal.cross(u);
        let origin = query - normal * (query - centroid).dot(normal);

        Self {
            origin,
            normal,
            u,
            v,
            curvature,
        }
    }

    /// Coordinates of `p` in this frame as `(u, v, height)`.
    pub fn local(&self, p: DVec3) -> DVec3 {
        let d = p - self.origin;
        DVec3::new(d.dot(self.u), d.dot(self.v), d.dot(self.normal))
    }
}

/// Number of coefficients of a bivariate polynomial of total degree `order`.
///
/// Saturates at `usize::MAX` for orders too large to fit any cloud.
pub fn coefficient_count(order: usize) -> usize {
    order
        .checked_add(1)
        .zip(order.checked_add(2))
        .and_then(|(a, b)| a.checked_mul(b))
        .map_or(usize::MAX, |n| n / 2)
}

/// A height field `h(u, v) = Σ c_ij u^i v^j` over a [`LocalFrame`], with
/// `u` and `v` scaled by `scale`.
#[derive(Debug, Clone)]
pub(crate) struct PolynomialSurface {
    order: usize,
    scale: f64,
    coefficients: DVector<f64>,
}

impl PolynomialSurface {
    /// Weighted least-squares fit with Gaussian weights `exp(-d² / h²)`,
    /// where `d` is the distance from the frame origin and `h` is `scale`.
    pub fn fit(
        frame: &LocalFrame,
        neighbors: &[DVec3],
        order: usize,
        scale: f64,
    ) -> ProcessResult<Self> {
        let terms = coefficient_count(order);
        if neighbors.len() < terms {
            return Err(ProcessError::InsufficientNeighbors {
                required: terms,
                found: neighbors.len(),
            });
        }

        let sqr_gauss = scale * scale;
        let mut normal_matrix = DMatrix::<f64>::zeros(terms, terms);
        let mut rhs = DVector::<f64>::zeros(terms);
        let mut basis = DVector::<f64>::zeros(terms);
        for p in neighbors {
            let local = frame.local(*p);
            let weight = (-(*p - frame.origin).length_squared() / sqr_gauss).exp();
            fill_basis(&mut basis, order, local.x / scale, local.y / scale);
            normal_matrix += weight * &basis * basis.transpose();
            rhs += weight * local.z * &basis;
        }

        let svd = normal_matrix.svd(true, true);
        let largest = svd.singular_values.max();
        let eps = largest * RANK_TOLERANCE;
        let rank = svd.rank(eps);
        if largest <= 0.0 || rank < terms {
            return Err(ProcessError::InsufficientNeighbors {
                required: terms,
                found: rank,
            });
        }
        let coefficients = svd
            .solve(&rhs, eps)
            .map_err(|e| ProcessError::InvalidParameter(e.to_string()))?;

        Ok(Self {
            order,
            scale,
            coefficients,
        })
    }

    /// Height above the frame at its origin.
    pub fn height(&self) -> f64 {
        self.coefficients[0]
    }

    /// `(∂h/∂u, ∂h/∂v)` at the frame origin, in unscaled units.
    pub fn gradient(&self) -> (f64, f64) {
        if self.order == 0 {
            return (0.0, 0.0);
        }
        // term order is (0,0), (0,1) .. (0,order), (1,0) ..
        let du = self.coefficients[self.order + 1] / self.scale;
        let dv = self.coefficients[1] / self.scale;
        (du, dv)
    }

    /// Project the frame origin onto the surface, returning the new
    /// position and the (unnormalized) surface normal there.
    pub fn project(&self, frame: &LocalFrame) -> (DVec3, DVec3) {
        let (du, dv) = self.gradient();
        let position = frame.origin + frame.normal * self.height();
        let normal = frame.normal - frame.u * du - frame.v * dv;
        (position, normal)
    }
}

/// Monomials `u^i v^j` with `i + j <= order`, ordered by `i` then `j`.
fn fill_basis(basis: &mut DVector<f64>, order: usize, u: f64, v: f64) {
    let mut k = 0;
    let mut u_pow = 1.0;
    for i in 0..=order {
        let mut v_pow = 1.0;
        for _ in 0..=(order - i) {
            basis[k] = u_pow * v_pow;
            k += 1;
            v_pow *= v;
        }
        u_pow *= u;
    }
}
