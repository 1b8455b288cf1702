use crate::{Correspondence, Degeneracy, HomographyError};
use log::trace;
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Relative threshold under which a point set counts as collinear.
const COLLINEAR_EPS: f64 = 1e-9;
/// Relative determinant threshold for the normalized solve.
const SINGULAR_EPS: f64 = 1e-10;
/// Relative threshold on the homogeneous `w` of a projected point.
const W_EPS: f64 = 1e-12;

/// Projective map from board millimeters to image pixels: `p_img ~ H * p_board`.
///
/// Serialized as a row-major `[[f64; 3]; 3]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }

    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }

    /// Apply `H` to `p` and dehomogenize.
    ///
    /// Returns `None` when the point maps to infinity (`w ≈ 0`) or the result
    /// is not finite.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if w.abs() <= W_EPS * v.amax() || w == 0.0 {
            return None;
        }
        let out = Point2::new(v[0] / w, v[1] / w);
        (out.x.is_finite() && out.y.is_finite()).then_some(out)
    }

    /// Inverse through the adjugate: `H⁻¹ = adj(H) / det(H)`.
    pub fn inverse(&self) -> Result<Self, HomographyError> {
        let m = &self.h;
        let adj = Matrix3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
            m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        );
        let det = m[(0, 0)] * adj[(0, 0)] + m[(0, 1)] * adj[(1, 0)] + m[(0, 2)] * adj[(2, 0)];

        let scale = m.norm();
        if !det.is_finite() || det.abs() <= f64::EPSILON * scale * scale * scale {
            return Err(HomographyError::NonInvertible);
        }

        let inv = Self::new(adj / det);
        if inv.is_finite() {
            Ok(inv)
        } else {
            Err(HomographyError::NonInvertible)
        }
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(rows: [[f64; 3]; 3]) -> Self {
        Self::from_array(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_array()
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| (p.x - cx).hypot(p.y - cy))
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

/// True when every point lies on one line (smallest eigenvalue of the
/// second-moment matrix vanishes relative to the spread).
fn is_collinear_set(pts: &[Point2<f64>]) -> bool {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for p in pts {
        let dx = p.x - cx;
        let dy = p.y - cy;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let trace = sxx + syy;
    if trace <= 0.0 {
        return true;
    }
    let disc = ((sxx - syy) * (sxx - syy) + 4.0 * sxy * sxy).sqrt();
    let min_eig = 0.5 * (trace - disc);
    min_eig <= COLLINEAR_EPS * trace
}

/// True when any three of `pts` are collinear. Scale invariant.
pub(crate) fn has_collinear_triple(pts: &[Point2<f64>]) -> bool {
    let n = pts.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let a = pts[j] - pts[i];
                let b = pts[k] - pts[i];
                let c = pts[k] - pts[j];
                let cross = (a.x * b.y - a.y * b.x).abs();
                let scale = a.norm_squared().max(b.norm_squared()).max(c.norm_squared());
                if scale <= 0.0 || cross <= COLLINEAR_EPS * scale {
                    return true;
                }
            }
        }
    }
    false
}

fn all_finite(pts: &[Point2<f64>]) -> bool {
    pts.iter().all(|p| p.x.is_finite() && p.y.is_finite())
}

/// Rescale so that `H[2][2] = 1`, or to unit norm when that entry is ~0.
fn scale_homography(h: Matrix3<f64>) -> Matrix3<f64> {
    let s = h[(2, 2)];
    let norm = h.norm();
    if s.abs() > 1e-12 * norm {
        h / s
    } else {
        h / norm
    }
}

/// Validate the normalized solution, undo the normalization and rescale.
fn denormalize(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Result<Homography, HomographyError> {
    if !hn.iter().all(|v| v.is_finite()) {
        return Err(Degeneracy::NonFinite.into());
    }
    let norm = hn.norm();
    if norm == 0.0 || hn.determinant().abs() <= SINGULAR_EPS * norm * norm * norm {
        return Err(Degeneracy::Singular.into());
    }

    // H = T_dst^-1 * Hn * T_src
    let t_dst_inv = t_dst.try_inverse().ok_or(Degeneracy::Singular)?;
    let h = Homography::new(scale_homography(t_dst_inv * hn * t_src));
    if !h.is_finite() {
        return Err(Degeneracy::NonFinite.into());
    }
    if h.determinant() == 0.0 {
        return Err(Degeneracy::Singular.into());
    }
    Ok(h)
}

/// Estimate `H` such that `p_img ~ H * p_board`.
///
/// Exactly four correspondences are solved directly (see
/// [`homography_from_4pt`]); five or more go through the normalized DLT with
/// the null vector taken from the SVD of the `2N×9` design matrix.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(correspondences), fields(n = correspondences.len()))
)]
pub fn estimate_homography(
    correspondences: &[Correspondence],
) -> Result<Homography, HomographyError> {
    let n = correspondences.len();
    if n < 4 {
        return Err(Degeneracy::TooFewPoints { got: n }.into());
    }

    let board: Vec<Point2<f64>> = correspondences.iter().map(|c| c.board.to_point2()).collect();
    let image: Vec<Point2<f64>> = correspondences.iter().map(|c| c.image.to_point2()).collect();
    if !all_finite(&board) || !all_finite(&image) {
        return Err(Degeneracy::NonFinite.into());
    }

    if n == 4 {
        let src = [board[0], board[1], board[2], board[3]];
        let dst = [image[0], image[1], image[2], image[3]];
        return homography_from_4pt(&src, &dst);
    }

    let (b, tb) = normalize_points(&board);
    let (i, ti) = normalize_points(&image);
    if is_collinear_set(&b) {
        return Err(Degeneracy::Collinear.into());
    }

    // Build A (2N x 9)
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let x = b[k].x;
        let y = b[k].y;
        let u = i[k].x;
        let v = i[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Solve Ah = 0 -> h is the right singular vector of the smallest singular value
    let svd = a.svd(true, true);
    let vt = svd.v_t.ok_or(Degeneracy::NonFinite)?;
    let sv = &svd.singular_values;
    if !sv.iter().all(|s| s.is_finite()) {
        return Err(Degeneracy::NonFinite.into());
    }
    let smallest = sv.imin();

    // A second (near-)null direction means the solution is not unique.
    let largest = sv.max();
    let runner_up = sv
        .iter()
        .enumerate()
        .filter(|&(idx, _)| idx != smallest)
        .map(|(_, &s)| s)
        .fold(f64::INFINITY, f64::min);
    if runner_up <= SINGULAR_EPS * largest {
        trace!("dlt: rank-deficient design matrix (sigma={runner_up:e}, max={largest:e})");
        return Err(Degeneracy::Singular.into());
    }

    let h = vt.row(smallest);
    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    denormalize(hn, tb, ti)
}

/// Compute `H` such that `dst ~ H * src` from exactly four correspondences.
///
/// Fixes `h33 = 1` and solves the resulting 8×8 linear system. No three of the
/// `src` points may be collinear.
pub fn homography_from_4pt(
    src: &[Point2<f64>; 4],
    dst: &[Point2<f64>; 4],
) -> Result<Homography, HomographyError> {
    if !all_finite(src) || !all_finite(dst) {
        return Err(Degeneracy::NonFinite.into());
    }
    if has_collinear_triple(src) {
        return Err(Degeneracy::Collinear.into());
    }

    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b).ok_or(Degeneracy::Singular)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    denormalize(hn, t_src, t_dst)
}
