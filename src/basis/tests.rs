use ndarray::{array, Array1, Array2};

use super::*;
use crate::domain::DomainBounds;
use crate::helpers::test_helpers::{assert_array_all_close, dense};

fn assembler_2d() -> BSplineAssembler {
    let domain = DomainBounds::new(array![[0., 2.], [-1., 1.]]).unwrap();
    BSplineAssembler::new(domain, &[3, 4], &[6, 7])
}

#[test]
fn test_knots() {
    let spline = BSpline1d::new(3, 5);
    assert_eq!(spline.knots(), &[0., 0., 0., 1. / 3., 2. / 3., 1., 1., 1.]);
    assert_eq!(spline.num_intervals(), 3);
    let expected = array![0., 1. / 6., 0.5, 5. / 6., 1.];
    assert_array_all_close(Array1::from(spline.greville()).view(), expected.view(), 1e-15);
}

#[test]
fn test_partition_of_unity() {
    let spline = BSpline1d::new(4, 9);
    for &t in &[0., 0.1, 0.33, 0.5, 0.999, 1.] {
        let values = spline.eval_all(t, 0);
        let sum: f64 = values.iter().sum();
        assert!((sum - 1.).abs() < 1e-14, "t = {}, sum = {}", t, sum);
        assert!(values.iter().all(|&v| v >= 0.));
        let slope: f64 = spline.eval_all(t, 1).iter().sum();
        assert!(slope.abs() < 1e-10);
    }
}

#[test]
fn test_derivatives_match_finite_differences() {
    let spline = BSpline1d::new(4, 8);
    let h = 1e-6;
    for &t in &[0.12, 0.47, 0.81] {
        let d1 = spline.eval_all(t, 1);
        let d2 = spline.eval_all(t, 2);
        let plus = spline.eval_all(t + h, 0);
        let minus = spline.eval_all(t - h, 0);
        let plus_d = spline.eval_all(t + h, 1);
        let minus_d = spline.eval_all(t - h, 1);
        for j in 0..spline.num_ctrl() {
            let fd1 = (plus[j] - minus[j]) / (2. * h);
            let fd2 = (plus_d[j] - minus_d[j]) / (2. * h);
            assert!((fd1 - d1[j]).abs() < 1e-6);
            assert!((fd2 - d2[j]).abs() < 1e-4);
        }
    }
}

#[test]
fn test_sizing() {
    let assembler = assembler_2d();
    let num = assembler.sizing(2);
    assert_eq!(
        num,
        Sizing {
            x: 2,
            y: 2,
            coeff: 42,
            dof: 42,
            support: 12,
            elem: 16
        }
    );
}

#[test]
fn test_jacobian_rows() {
    let assembler = assembler_2d();
    let x = array![[0.3, -0.2], [2.0, 1.0], [1.1, 0.7]];
    let jac = assembler.compute_jac(0, 0, x.view());
    assert_eq!(jac.rows(), 3);
    assert_eq!(jac.cols(), 42);
    let row_sums = dense(&jac).sum_axis(ndarray::Axis(1));
    assert_array_all_close(row_sums.view(), Array1::ones(3).view(), 1e-13);
    for row in jac.outer_iterator() {
        assert!(row.nnz() <= 12);
    }
}

#[test]
fn test_jacobian_reproduces_linear_function() {
    // Coefficients at the Greville abscissae reproduce linear functions.
    let assembler = assembler_2d();
    let g0 = assembler.splines()[0].greville();
    let g1 = assembler.splines()[1].greville();
    let mut coeffs = Array1::zeros(42);
    for i in 0..6 {
        for j in 0..7 {
            let x0 = 2. * g0[i];
            let x1 = -1. + 2. * g1[j];
            coeffs[i * 7 + j] = 3. * x0 - 2. * x1 + 0.5;
        }
    }
    let x = array![[0.3, -0.2], [1.7, 0.9], [1.1, 0.0]];
    let values = &assembler.compute_jac(0, 0, x.view()) * &coeffs;
    let expected = array![0.9 + 0.4 + 0.5, 5.1 - 1.8 + 0.5, 3.3 + 0.5];
    assert_array_all_close(values.view(), expected.view(), 1e-12);

    let d0 = &assembler.compute_jac(1, 0, x.view()) * &coeffs;
    let d1 = &assembler.compute_jac(2, 0, x.view()) * &coeffs;
    assert_array_all_close(d0.view(), (Array1::ones(3) * 3.).view(), 1e-11);
    assert_array_all_close(d1.view(), (Array1::ones(3) * -2.).view(), 1e-11);

    let curvature = &assembler.compute_jac(1, 1, x.view()) * &coeffs;
    assert_array_all_close(curvature.view(), Array1::zeros(3).view(), 1e-10);
}

#[test]
fn test_points_are_clamped() {
    let assembler = assembler_2d();
    let outside = array![[2.5, -3.0]];
    let corner = array![[2.0, -1.0]];
    let a = dense(&assembler.compute_jac(0, 0, outside.view()));
    let b = dense(&assembler.compute_jac(0, 0, corner.view()));
    assert_eq!(a, b);
}

#[test]
fn test_energy_vanishes_on_linear_functions() {
    let domain = DomainBounds::new(array![[0., 1.]]).unwrap();
    let assembler = BSplineAssembler::new(domain, &[4], &[10]);
    let energy = assembler.energy_hessian(&[1.]);
    let greville = Array1::from(assembler.splines()[0].greville());
    let linear = greville.mapv(|g| 2. * g - 1.);
    let e = &energy * &linear;
    assert_array_all_close(e.view(), Array1::zeros(10).view(), 1e-9);

    // x^2 has curvature 2 everywhere: its energy is 4 on the unit interval.
    let quad = Array2::from_shape_fn((200, 1), |(i, _)| i as f64 / 199.);
    let jac = assembler.compute_jac(0, 0, quad.view());
    let target = quad.column(0).mapv(|x| x * x);
    let coeffs = least_squares(&dense(&jac), &target);
    let value = coeffs.dot(&(&energy * &coeffs));
    assert!((value - 4.).abs() < 1e-6, "energy = {}", value);
}

#[test]
fn test_energy_is_symmetric() {
    let assembler = assembler_2d();
    let energy = dense(&assembler.energy_hessian(&[1., 0.5]));
    let diff = &energy - &energy.t();
    assert!(diff.iter().all(|v| v.abs() < 1e-9));
}

#[test]
fn test_prolongation_preserves_linear_functions() {
    let domain = DomainBounds::new(array![[0., 1.]]).unwrap();
    let assembler = BSplineAssembler::new(domain, &[3], &[17]);
    let levels = assembler.prolongation_matrices(&[2, 2]);
    assert_eq!(levels.len(), 2);
    assert_eq!((levels[0].rows(), levels[0].cols()), (17, 10));
    assert_eq!((levels[1].rows(), levels[1].cols()), (10, 7));

    let coarse = BSpline1d::new(3, 10);
    let coarse_coeffs = Array1::from(coarse.greville()).mapv(|g| 4. * g + 1.);
    let fine_coeffs = &levels[0] * &coarse_coeffs;
    let expected = Array1::from(assembler.splines()[0].greville()).mapv(|g| 4. * g + 1.);
    assert_array_all_close(fine_coeffs.view(), expected.view(), 1e-12);
}

#[test]
fn test_prolongation_stops_at_coarsest() {
    let domain = DomainBounds::new(array![[0., 1.]]).unwrap();
    let assembler = BSplineAssembler::new(domain, &[3], &[6]);
    let levels = assembler.prolongation_matrices(&[2, 2, 2, 2]);
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[1].cols(), 4);
}

#[test]
fn test_tensor_entries() {
    let per_dim = vec![vec![(1, 2.), (2, 3.)], vec![(0, 0.5)]];
    let entries = tensor_entries(&per_dim, &[3, 4]);
    assert_eq!(entries, vec![(4, 1.), (8, 1.5)]);
}

fn least_squares(a: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let ata = a.t().dot(a);
    let atb = a.t().dot(b);
    crate::helpers::test_helpers::solve_dense(&ata, &atb)
}

#[test]
fn test_gauss_legendre_degree_of_exactness() {
    for n in 1..=8 {
        let (nodes, weights) = super::bspline::gauss_legendre(n);
        assert!((weights.iter().sum::<f64>() - 2.).abs() < 1e-13);
        // Exact up to degree 2n - 1: ∫ x^(2n-2) over [-1, 1] is 2 / (2n - 1).
        let even = 2 * n as i32 - 2;
        let value: f64 = nodes.iter().zip(&weights).map(|(x, w)| w * x.powi(even)).sum();
        assert!((value - 2. / (even + 1) as f64).abs() < 1e-12, "n = {}", n);
        let odd: f64 = nodes.iter().zip(&weights).map(|(x, w)| w * x.powi(even + 1)).sum();
        assert!(odd.abs() < 1e-12);
    }
}

#[test]
fn test_energy_of_high_order_basis() {
    // x^7 has curvature 42 x^5: its energy is 1764 / 11 on the unit interval.
    let domain = DomainBounds::new(array![[0., 1.]]).unwrap();
    let assembler = BSplineAssembler::new(domain, &[8], &[10]);
    let energy = assembler.energy_hessian(&[1.]);
    let quad = Array2::from_shape_fn((200, 1), |(i, _)| i as f64 / 199.);
    let jac = assembler.compute_jac(0, 0, quad.view());
    let target = quad.column(0).mapv(|x| x.powi(7));
    let coeffs = least_squares(&dense(&jac), &target);
    let value = coeffs.dot(&(&energy * &coeffs));
    assert!((value - 1764. / 11.).abs() < 1e-6 * 1764. / 11., "energy = {}", value);
}
