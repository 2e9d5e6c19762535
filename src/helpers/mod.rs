#[cfg(test)]
mod tests;

/// This module contains helpers functions to efficiently write tests.
pub mod test_helpers {
    use approx::AbsDiffEq;
    use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal, Uniform};
    use sprs::CsMat;

    pub fn assert_array_all_close(x: ArrayView1<f64>, y: ArrayView1<f64>, delta: f64) {
        assert_eq!(x.len(), y.len());
        for i in 0..x.len() {
            if x[i].abs_diff_ne(&y[i], delta) {
                panic!(
                    "x[{}]: {}, y[{}]: {} ; with precision level {}",
                    i, x[i], i, y[i], delta
                );
            }
        }
    }

    pub fn assert_array2d_all_close(x: ArrayView2<f64>, y: ArrayView2<f64>, delta: f64) {
        assert_eq!(x.shape(), y.shape());
        for ((idx, a), b) in x.indexed_iter().zip(y.iter()) {
            if a.abs_diff_ne(b, delta) {
                panic!(
                    "x{:?}: {}, y{:?}: {} ; with precision level {}",
                    idx, a, idx, b, delta
                );
            }
        }
    }

    /// Dense copy of a sparse matrix.
    pub fn dense(mat: &CsMat<f64>) -> Array2<f64> {
        mat.to_dense()
    }

    /// This function solves a small dense linear system with Gaussian
    /// elimination and partial pivoting. It is the reference against which the
    /// sparse solvers are checked.
    pub fn solve_dense(a: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
        let size = b.len();
        let mut system = Array2::<f64>::zeros((size, size + 1));
        system.slice_mut(ndarray::s![.., ..size]).assign(a);
        system.column_mut(size).assign(b);

        for i in 0..size {
            let pivot = (i..size)
                .max_by(|&p, &q| system[[p, i]].abs().total_cmp(&system[[q, i]].abs()))
                .unwrap();
            if pivot != i {
                for k in 0..=size {
                    system.swap([i, k], [pivot, k]);
                }
            }
            assert!(system[[i, i]] != 0., "singular matrix");
            for j in i + 1..size {
                let factor = system[[j, i]] / system[[i, i]];
                for k in i..=size {
                    system[[j, k]] -= factor * system[[i, k]];
                }
            }
        }

        let mut x = Array1::<f64>::zeros(size);
        for i in (0..size).rev() {
            let tail: f64 = (i + 1..size).map(|k| system[[i, k]] * x[k]).sum();
            x[i] = (system[[i, size]] - tail) / system[[i, i]];
        }
        x
    }

    pub fn fill_random_vector(capacity: usize, seed: u64) -> Vec<f64> {
        let mut r = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0., 1.).unwrap();
        (0..capacity).map(|_| normal.sample(&mut r)).collect()
    }

    /// Draws `n_samples` points uniformly in the box described by `xlimits`.
    pub fn random_points(n_samples: usize, xlimits: ArrayView2<f64>, seed: u64) -> Array2<f64> {
        let mut r = StdRng::seed_from_u64(seed);
        let nx = xlimits.nrows();
        let mut x = Array2::<f64>::zeros((n_samples, nx));
        for dim in 0..nx {
            let uniform = Uniform::new_inclusive(xlimits[[dim, 0]], xlimits[[dim, 1]]);
            for i in 0..n_samples {
                x[[i, dim]] = uniform.sample(&mut r);
            }
        }
        x
    }

    /// Samples `f` at random points of the box with additive gaussian noise
    /// of standard deviation `noise`. Returns the `(xt, yt)` pair, `yt` having
    /// a single column.
    pub fn generate_training_data<Func>(
        n_samples: usize,
        xlimits: ArrayView2<f64>,
        f: Func,
        noise: f64,
        seed: u64,
    ) -> (Array2<f64>, Array2<f64>)
    where
        Func: Fn(ArrayView1<f64>) -> f64,
    {
        let xt = random_points(n_samples, xlimits, seed);
        let eps = fill_random_vector(n_samples, seed.wrapping_add(1));
        let yt = Array2::from_shape_fn((n_samples, 1), |(i, _)| f(xt.row(i)) + noise * eps[i]);
        (xt, yt)
    }
}
