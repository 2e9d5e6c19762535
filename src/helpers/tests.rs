use super::test_helpers::*;
use ndarray::{array, Array2};

#[test]
fn solve_dense_works() {
    let mat = array![[26., 8., 15.], [8., 14., 5.], [15., 5., 14.]];
    let b = array![1., 2., 3.];
    let x = solve_dense(&mat, &b);
    assert_array_all_close(mat.dot(&x).view(), b.view(), 1e-12);
}

#[test]
fn solve_dense_pivots() {
    let mat = array![[0., 1.], [1., 0.]];
    let b = array![2., 3.];
    let x = solve_dense(&mat, &b);
    assert_array_all_close(x.view(), array![3., 2.].view(), 1e-15);
}

#[test]
#[should_panic]
fn solve_dense_singular_panics() {
    let mat = Array2::<f64>::zeros((3, 3));
    solve_dense(&mat, &array![1., 1., 1.]);
}

#[test]
fn random_points_are_within_bounds() {
    let xlimits = array![[-1., 1.], [10., 20.]];
    let x = random_points(200, xlimits.view(), 0);
    assert_eq!(x.shape(), &[200, 2]);
    assert!(x.column(0).iter().all(|&v| (-1. ..=1.).contains(&v)));
    assert!(x.column(1).iter().all(|&v| (10. ..=20.).contains(&v)));
}

#[test]
fn generated_data_is_reproducible() {
    let xlimits = array![[0., 1.]];
    let (xa, ya) = generate_training_data(10, xlimits.view(), |x| x[0] * x[0], 0.1, 7);
    let (xb, yb) = generate_training_data(10, xlimits.view(), |x| x[0] * x[0], 0.1, 7);
    assert_eq!(xa, xb);
    assert_eq!(ya, yb);

    let (x, y) = generate_training_data(10, xlimits.view(), |x| x[0] * x[0], 0., 7);
    let exact = x.column(0).mapv(|v| v * v);
    assert_array_all_close(y.column(0), exact.view(), 1e-15);
}
