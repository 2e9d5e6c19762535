use ndarray::{Array2, ArrayView2};
use sprs::{CsMat, TriMat};

use super::{tensor_entries, JacobianAssembler, Sizing};
use crate::domain::DomainBounds;
use crate::linalg::accumulate_gram;

/// Uniform clamped B-spline basis on `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline1d {
    order: usize,
    num_ctrl: usize,
    knots: Vec<f64>,
}

impl BSpline1d {
    /// This method builds a basis of `num_ctrl` functions of the given order
    /// (polynomial degree `order - 1`). Requires `2 <= order <= num_ctrl`,
    /// which configuration checks guarantee.
    pub(crate) fn new(order: usize, num_ctrl: usize) -> Self {
        debug_assert!(order >= 2 && num_ctrl >= order);
        let num_intervals = num_ctrl - order + 1;
        let mut knots = vec![0.; order];
        knots.extend((1..num_intervals).map(|j| j as f64 / num_intervals as f64));
        knots.extend(std::iter::repeat(1.).take(order));
        BSpline1d {
            order,
            num_ctrl,
            knots,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_ctrl(&self) -> usize {
        self.num_ctrl
    }

    /// Number of knot intervals of non-zero length.
    pub fn num_intervals(&self) -> usize {
        self.num_ctrl - self.order + 1
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Index of the knot interval `[u_s, u_{s+1})` containing `t`; the right
    /// end of the domain belongs to the last interval.
    fn span(&self, t: f64) -> usize {
        let last = self.num_ctrl - 1;
        if t >= 1. {
            return last;
        }
        (self.order - 1..=last)
            .rev()
            .find(|&s| self.knots[s] <= t)
            .unwrap_or(self.order - 1)
    }

    /// Evaluates the `deriv`-th derivative of all basis functions at `t`.
    pub fn eval_all(&self, t: f64, deriv: usize) -> Vec<f64> {
        let span = self.span(t);
        self.eval_order(self.order, t, deriv, span)
    }

    /// The `order` non-zero basis functions at `t`, as `(index, value)`.
    pub fn eval_support(&self, t: f64, deriv: usize) -> Vec<(usize, f64)> {
        let span = self.span(t);
        let values = self.eval_order(self.order, t, deriv, span);
        (span + 1 - self.order..=span)
            .map(|j| (j, values[j]))
            .collect()
    }

    // Cox-de Boor recursion; derivatives use
    // N'_{i,k} = (k-1) (N_{i,k-1} / (u_{i+k-1} - u_i) - N_{i+1,k-1} / (u_{i+k} - u_{i+1})).
    fn eval_order(&self, k: usize, t: f64, deriv: usize, span: usize) -> Vec<f64> {
        let u = &self.knots;
        let len = u.len() - k;
        if k == 1 {
            let mut values = vec![0.; len];
            if deriv == 0 {
                values[span] = 1.;
            }
            return values;
        }
        let lower = self.eval_order(k - 1, t, deriv.saturating_sub(1), span);
        let scale = (k - 1) as f64;
        (0..len)
            .map(|i| {
                let den1 = u[i + k - 1] - u[i];
                let den2 = u[i + k] - u[i + 1];
                let left = if den1 > 0. { lower[i] / den1 } else { 0. };
                let right = if den2 > 0. { lower[i + 1] / den2 } else { 0. };
                if deriv == 0 {
                    (t - u[i]) * left + (u[i + k] - t) * right
                } else {
                    scale * (left - right)
                }
            })
            .collect()
    }

    /// Greville abscissae, the knot averages associated with each control
    /// point.
    pub fn greville(&self) -> Vec<f64> {
        let k = self.order;
        (0..self.num_ctrl)
            .map(|i| self.knots[i + 1..i + k].iter().sum::<f64>() / (k - 1) as f64)
            .collect()
    }
}

/// Tensor-product B-spline Jacobian assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineAssembler {
    domain: DomainBounds,
    splines: Vec<BSpline1d>,
}

impl BSplineAssembler {
    /// This method builds one basis per dimension of `domain`. `orders` and
    /// `num_ctrl_pts` hold one entry per dimension. Use
    /// [`RmtValidParams::assembler`](crate::hyperparams::RmtValidParams::assembler)
    /// for an assembler built from checked options.
    pub(crate) fn new(domain: DomainBounds, orders: &[usize], num_ctrl_pts: &[usize]) -> Self {
        let splines = orders
            .iter()
            .zip(num_ctrl_pts)
            .map(|(&order, &num_ctrl)| BSpline1d::new(order, num_ctrl))
            .collect();
        BSplineAssembler { domain, splines }
    }

    pub fn domain(&self) -> &DomainBounds {
        &self.domain
    }

    pub fn splines(&self) -> &[BSpline1d] {
        &self.splines
    }

    fn sizes(&self) -> Vec<usize> {
        self.splines.iter().map(BSpline1d::num_ctrl).collect()
    }

    /// Tensor grid of Gauss-Legendre points, with `order` points per knot
    /// interval and dimension. Along each dimension the energy integrand is a
    /// polynomial of degree at most `2 * order - 2`, which these points
    /// integrate exactly.
    fn quadrature(&self) -> (Array2<f64>, Vec<f64>) {
        let nx = self.splines.len();
        let mut nodes: Vec<(Vec<f64>, f64)> = vec![(Vec::with_capacity(nx), 1.)];
        for (dim, spline) in self.splines.iter().enumerate() {
            let (xi, wi) = gauss_legendre(spline.order());
            let lower = self.domain.lower(dim);
            let h = self.domain.width(dim) / spline.num_intervals() as f64;
            let dim_nodes: Vec<(f64, f64)> = (0..spline.num_intervals())
                .flat_map(|e| {
                    xi.iter().zip(wi.iter()).map(move |(&s, &w)| {
                        (lower + (e as f64 + 0.5 * (s + 1.)) * h, 0.5 * w * h)
                    })
                })
                .collect();
            nodes = nodes
                .iter()
                .flat_map(|(coords, weight)| {
                    dim_nodes.iter().map(move |&(c, w)| {
                        let mut coords = coords.clone();
                        coords.push(c);
                        (coords, weight * w)
                    })
                })
                .collect();
        }
        let mut points = Array2::zeros((nodes.len(), nx));
        let mut weights = Vec::with_capacity(nodes.len());
        for (i, (coords, weight)) in nodes.into_iter().enumerate() {
            for (dim, c) in coords.into_iter().enumerate() {
                points[[i, dim]] = c;
            }
            weights.push(weight);
        }
        (points, weights)
    }
}

impl JacobianAssembler for BSplineAssembler {
    fn nx(&self) -> usize {
        self.splines.len()
    }

    fn num_coefficients(&self) -> usize {
        self.splines.iter().map(BSpline1d::num_ctrl).product()
    }

    fn sizing(&self, ny: usize) -> Sizing {
        let coeff = self.num_coefficients();
        Sizing {
            x: self.nx(),
            y: ny,
            coeff,
            dof: coeff,
            support: self.splines.iter().map(BSpline1d::order).product(),
            elem: self.splines.iter().map(BSpline1d::num_intervals).product(),
        }
    }

    fn compute_jac(&self, kx: usize, ix: usize, x: ArrayView2<f64>) -> CsMat<f64> {
        debug_assert!(kx <= self.nx() && ix <= self.nx());
        let sizes = self.sizes();
        let x = self.domain.clamp(x);
        let mut tri = TriMat::new((x.nrows(), self.num_coefficients()));
        for (row, point) in x.rows().into_iter().enumerate() {
            let per_dim: Vec<Vec<(usize, f64)>> = self
                .splines
                .iter()
                .enumerate()
                .map(|(dim, spline)| {
                    let deriv = usize::from(kx == dim + 1) + usize::from(ix == dim + 1);
                    let width = self.domain.width(dim);
                    let t = (point[dim] - self.domain.lower(dim)) / width;
                    let chain = width.powi(-(deriv as i32));
                    spline
                        .eval_support(t, deriv)
                        .into_iter()
                        .map(|(j, v)| (j, v * chain))
                        .collect()
                })
                .collect();
            for (col, val) in tensor_entries(&per_dim, &sizes) {
                tri.add_triplet(row, col, val);
            }
        }
        tri.to_csr()
    }

    fn energy_hessian(&self, smoothness: &[f64]) -> CsMat<f64> {
        let n = self.num_coefficients();
        let (points, weights) = self.quadrature();
        let mut tri = TriMat::new((n, n));
        for (dim, &s) in smoothness.iter().enumerate() {
            if s == 0. {
                continue;
            }
            let jac = self.compute_jac(dim + 1, dim + 1, points.view());
            accumulate_gram(&mut tri, &jac, &weights, s);
        }
        tri.to_csr()
    }

    fn prolongation_matrices(&self, mg_factors: &[usize]) -> Vec<CsMat<f64>> {
        let mut levels = Vec::with_capacity(mg_factors.len());
        let mut fine: Vec<BSpline1d> = self.splines.clone();
        for &factor in mg_factors {
            let coarse: Vec<BSpline1d> = fine
                .iter()
                .map(|spline| {
                    let order = spline.order();
                    let reduced = (spline.num_ctrl() - order + factor - 1) / factor + order;
                    BSpline1d::new(order, reduced.max(order))
                })
                .collect();
            if coarse
                .iter()
                .zip(&fine)
                .all(|(c, f)| c.num_ctrl() == f.num_ctrl())
            {
                break;
            }
            levels.push(prolongation(&fine, &coarse));
            fine = coarse;
        }
        levels
    }
}

/// Maps coarse coefficients to fine ones by evaluating the coarse basis at the
/// fine Greville abscissae.
fn prolongation(fine: &[BSpline1d], coarse: &[BSpline1d]) -> CsMat<f64> {
    let fine_sizes: Vec<usize> = fine.iter().map(BSpline1d::num_ctrl).collect();
    let coarse_sizes: Vec<usize> = coarse.iter().map(BSpline1d::num_ctrl).collect();
    let rows_per_dim: Vec<Vec<Vec<(usize, f64)>>> = fine
        .iter()
        .zip(coarse)
        .map(|(f, c)| {
            f.greville()
                .into_iter()
                .map(|g| {
                    c.eval_support(g, 0)
                        .into_iter()
                        .filter(|&(_, v)| v != 0.)
                        .collect()
                })
                .collect()
        })
        .collect();

    let n_fine: usize = fine_sizes.iter().product();
    let n_coarse: usize = coarse_sizes.iter().product();
    let mut tri = TriMat::new((n_fine, n_coarse));
    let mut multi = vec![0usize; fine.len()];
    for row in 0..n_fine {
        let per_dim: Vec<Vec<(usize, f64)>> = multi
            .iter()
            .enumerate()
            .map(|(dim, &i)| rows_per_dim[dim][i].clone())
            .collect();
        for (col, val) in tensor_entries(&per_dim, &coarse_sizes) {
            tri.add_triplet(row, col, val);
        }
        // Row-major increment, last dimension fastest.
        for dim in (0..multi.len()).rev() {
            multi[dim] += 1;
            if multi[dim] < fine_sizes[dim] {
                break;
            }
            multi[dim] = 0;
        }
    }
    tri.to_csr()
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`, the roots of the
/// Legendre polynomial of degree `n` found by Newton iteration.
pub(crate) fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.; n];
    let mut weights = vec![0.; n];
    for i in 0..n.div_ceil(2) {
        let mut z = ((i as f64 + 0.75) / (n as f64 + 0.5) * std::f64::consts::PI).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(n, z);
            let step = p / dp;
            z -= step;
            if step.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, z);
        let w = 2. / ((1. - z * z) * dp * dp);
        nodes[i] = -z;
        nodes[n - 1 - i] = z;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

/// Legendre polynomial `P_n(x)` and its derivative, for `|x| < 1`.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let (mut prev, mut curr) = (1., x);
    for k in 2..=n {
        let next = ((2 * k - 1) as f64 * x * curr - (k - 1) as f64 * prev) / k as f64;
        prev = curr;
        curr = next;
    }
    (curr, n as f64 * (x * curr - prev) / (x * x - 1.))
}
