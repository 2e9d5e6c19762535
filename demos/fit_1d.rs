//! Fits a noisy one-dimensional function with values and end slopes, then
//! prints predictions inside and outside of the domain.

use ndarray::{array, Array2};
use sparsermt::helpers::test_helpers::generate_training_data;
use sparsermt::{ParamGuard, RmtParams, RmtSurrogate, TrainingSet};

fn main() -> sparsermt::Result<()> {
    let xlimits = array![[-1., 2.]];
    let f = |x: f64| x * (2. * x).cos();
    let df = |x: f64| (2. * x).cos() - 2. * x * (2. * x).sin();

    let (xt, yt) = generate_training_data(30, xlimits.view(), |x| f(x[0]), 0.02, 7);
    let mut training = TrainingSet::new();
    training
        .set_values(xt, yt)?
        .set_derivatives(array![[-1.], [2.]], array![[df(-1.)], [df(2.)]], 0)?;

    let params = RmtParams::new(xlimits)
        .order(vec![4])
        .num_ctrl_pts(vec![20])
        .energy_weight(1e-6)
        .extrapolate(true)
        .check()?;
    let mut model = RmtSurrogate::new(params);
    model.fit(&training)?;

    let x = Array2::from_shape_fn((13, 1), |(i, _)| -1.5 + 0.3 * i as f64);
    let y = model.predict_values(x.view())?;
    let dy = model.predict_derivatives(x.view(), 0)?;
    for i in 0..x.nrows() {
        println!(
            "x = {:>5.2}  f = {:>8.4} (exact {:>8.4})  f' = {:>8.4}",
            x[[i, 0]],
            y[[i, 0]],
            f(x[[i, 0]]),
            dy[[i, 0]]
        );
    }
    Ok(())
}
