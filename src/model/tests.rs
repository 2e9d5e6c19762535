use ndarray::{array, Array2};

use super::*;
use crate::cache::{DirectoryCache, MemoryCache};
use crate::diagnostics::{FitEvent, RecordingSink};
use crate::helpers::test_helpers::{assert_array2d_all_close, generate_training_data};
use crate::hyperparams::RmtParams;
use crate::param_guard::ParamGuard;

fn linear(x: ndarray::ArrayView1<f64>) -> f64 {
    2. * x[0] - 3. * x[1] + 1.
}

fn training_2d() -> TrainingSet {
    let xlimits = array![[0., 1.], [-1., 1.]];
    let (xt, yt) = generate_training_data(40, xlimits.view(), linear, 0., 42);
    let mut training = TrainingSet::new();
    training.set_values(xt, yt).unwrap();
    training
}

fn params_2d() -> RmtParams {
    RmtParams::new(array![[0., 1.], [-1., 1.]])
        .num_ctrl_pts(vec![6])
        .approx_norm(2.)
}

fn fitted(params: RmtParams) -> RmtSurrogate {
    let mut model = RmtSurrogate::new(params.check().unwrap());
    model.fit(&training_2d()).unwrap();
    model
}

fn loaded_from_cache(sink: &RecordingSink) -> bool {
    sink.events().iter().any(|event| match event {
        FitEvent::Message { message } => message.starts_with("Loaded solution"),
        _ => false,
    })
}

#[test]
fn test_unfitted_model_cannot_evaluate() {
    let model = RmtSurrogate::new(params_2d().check().unwrap());
    assert!(!model.is_fitted());
    assert!(matches!(
        model.predict_values(array![[0.5, 0.]].view()),
        Err(RmtError::NotFitted)
    ));
}

#[test]
fn test_reproduces_linear_function() {
    let model = fitted(params_2d());
    let x = array![[0.1, -0.9], [0.5, 0.], [0.95, 0.7]];
    let expected = Array2::from_shape_fn((3, 1), |(i, _)| linear(x.row(i)));
    assert_array2d_all_close(model.predict_values(x.view()).unwrap().view(), expected.view(), 1e-5);
    assert_array2d_all_close(
        model.predict_derivatives(x.view(), 0).unwrap().view(),
        Array2::from_elem((3, 1), 2.).view(),
        1e-4,
    );
    assert_array2d_all_close(
        model.predict_derivatives(x.view(), 1).unwrap().view(),
        Array2::from_elem((3, 1), -3.).view(),
        1e-4,
    );

    let num = model.solution().unwrap().num();
    assert_eq!((num.x, num.y, num.coeff), (2, 1, 36));
}

#[test]
fn test_evaluation_checks_its_inputs() {
    let model = fitted(params_2d());
    assert!(matches!(
        model.predict_values(array![[0.5]].view()),
        Err(RmtError::DimensionMismatch { what: "point dimension", expected: 2, found: 1 })
    ));
    assert!(matches!(
        model.predict_derivatives(array![[0.5, 0.]].view(), 2),
        Err(RmtError::DimensionMismatch { what: "derivative dimension", .. })
    ));
    assert!(matches!(
        model.predict_values(array![[0.5, 0.], [1.5, 0.]].view()),
        Err(RmtError::OutOfDomain { point: 1, dim: 0, .. })
    ));
}

#[test]
fn test_evaluation_is_repeatable() {
    let model = fitted(params_2d());
    let x = array![[0.3, 0.2], [0.7, -0.4]];
    let first = model.predict_values(x.view()).unwrap();
    let second = model.predict_values(x.view()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_extrapolation_is_linear_from_the_boundary() {
    let mut model = RmtSurrogate::new(
        RmtParams::new(array![[0., 1.]])
            .approx_norm(2.)
            .reg_dv(1e-8)
            .extrapolate(true)
            .check()
            .unwrap(),
    );
    let mut training = TrainingSet::new();
    training.set_values(array![[0.5]], array![[1.]]).unwrap();
    model.fit(&training).unwrap();

    let at_center = model.predict_values(array![[0.5]].view()).unwrap();
    assert!((at_center[[0, 0]] - 1.).abs() < 1e-3);

    let boundary = model.predict_values(array![[1.]].view()).unwrap()[[0, 0]];
    let slope = model.predict_derivatives(array![[1.]].view(), 0).unwrap()[[0, 0]];
    let outside = model.predict_values(array![[2.]].view()).unwrap()[[0, 0]];
    assert!((outside - (boundary + slope)).abs() < 1e-12);

    // The extrapolant's derivative along its own direction is the boundary one.
    let outside_slope = model.predict_derivatives(array![[2.]].view(), 0).unwrap()[[0, 0]];
    assert!((outside_slope - slope).abs() < 1e-12);

    let lower = model.predict_values(array![[0.]].view()).unwrap()[[0, 0]];
    let lower_slope = model.predict_derivatives(array![[0.]].view(), 0).unwrap()[[0, 0]];
    let below = model.predict_values(array![[-0.5]].view()).unwrap()[[0, 0]];
    assert!((below - (lower - 0.5 * lower_slope)).abs() < 1e-12);
}

#[test]
fn test_extrapolation_in_two_dimensions() {
    let model = fitted(params_2d().extrapolate(true));
    let x = array![[1.5, 0.5], [-0.25, 1.5]];
    let expected = Array2::from_shape_fn((2, 1), |(i, _)| linear(x.row(i)));
    assert_array2d_all_close(model.predict_values(x.view()).unwrap().view(), expected.view(), 1e-4);
    // Along the other dimension, the derivative picks up the mixed term.
    assert_array2d_all_close(
        model.predict_derivatives(array![[1.5, 0.5]].view(), 1).unwrap().view(),
        array![[-3.]].view(),
        1e-3,
    );
}

#[test]
fn test_failed_fit_leaves_model_unfitted() {
    let mut model = fitted(params_2d());
    assert!(model.is_fitted());

    let mut training = TrainingSet::new();
    training.set_values(array![[0.5]], array![[1.]]).unwrap();
    assert!(matches!(
        model.fit(&training),
        Err(RmtError::DimensionMismatch { what: "training input dimension", .. })
    ));
    assert!(!model.is_fitted());

    assert!(matches!(model.fit(&TrainingSet::new()), Err(RmtError::EmptyTrainingSet)));
}

#[test]
fn test_training_points_must_lie_in_the_domain() {
    let mut model = RmtSurrogate::new(params_2d().extrapolate(true).check().unwrap());
    let mut training = TrainingSet::new();
    training.set_values(array![[0.5, 2.]], array![[1.]]).unwrap();
    assert!(matches!(
        model.fit(&training),
        Err(RmtError::OutOfDomain { dim: 1, .. })
    ));
}

#[test]
fn test_nonlinear_fit() {
    let model = fitted(params_2d().approx_norm(4.).max_nln_iter(5));
    let x = array![[0.2, 0.3]];
    let expected = Array2::from_shape_fn((1, 1), |(i, _)| linear(x.row(i)));
    assert_array2d_all_close(model.predict_values(x.view()).unwrap().view(), expected.view(), 1e-4);
}

#[test]
fn test_fit_through_unchecked_params() {
    let params = params_2d();
    let solution = <RmtParams as Fit<RmtError>>::fit(&params, &training_2d()).unwrap();
    assert_eq!(solution.coefficients().dim(), (36, 1));

    let invalid = params_2d().approx_norm(1.);
    assert!(matches!(
        <RmtParams as Fit<RmtError>>::fit(&invalid, &training_2d()),
        Err(RmtError::Configuration { option: "approx_norm", .. })
    ));
}

#[test]
fn test_solution_cache_skips_refits() {
    let cache = Arc::new(MemoryCache::new());
    let sink = Arc::new(RecordingSink::new());
    let context = FitContext::new()
        .with_diagnostics(sink.clone())
        .with_cache(cache.clone());
    let params = params_2d().save_solution(true).check().unwrap();

    let first = params.fit_with(&training_2d(), &context).unwrap();
    assert!(!loaded_from_cache(&sink));
    assert_eq!(cache.len(), 1);

    sink.clear();
    let second = params.fit_with(&training_2d(), &context).unwrap();
    assert!(loaded_from_cache(&sink));
    assert_eq!(first, second);

    // Other training data do not match the cached checksum.
    sink.clear();
    let mut other = training_2d();
    other.set_derivatives(array![[0.5, 0.]], array![[2.]], 0).unwrap();
    params.fit_with(&other, &context).unwrap();
    assert!(!loaded_from_cache(&sink));
}

#[test]
fn test_cache_is_ignored_unless_enabled() {
    let cache = Arc::new(MemoryCache::new());
    let context = FitContext::new().with_cache(cache.clone());
    params_2d()
        .check()
        .unwrap()
        .fit_with(&training_2d(), &context)
        .unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_directory_cache_across_models() {
    let dir = std::env::temp_dir().join(format!("sparsermt-model-{}", std::process::id()));
    let cache = Arc::new(DirectoryCache::new(&dir));
    let params = params_2d().save_solution(true).name("plane").check().unwrap();

    let mut first = RmtSurrogate::new(params.clone())
        .with_context(FitContext::new().with_cache(cache.clone()));
    first.fit(&training_2d()).unwrap();
    assert!(cache.path("plane").exists());

    let sink = Arc::new(RecordingSink::new());
    let mut second = RmtSurrogate::new(params).with_context(
        FitContext::new()
            .with_diagnostics(sink.clone())
            .with_cache(cache),
    );
    second.fit(&training_2d()).unwrap();
    assert!(loaded_from_cache(&sink));
    let (a, b) = (first.solution().unwrap(), second.solution().unwrap());
    assert_eq!(a.num(), b.num());
    assert_array2d_all_close(a.coefficients(), b.coefficients(), 1e-12);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_extrapolation_is_continuous_on_the_boundary() {
    let inside = fitted(params_2d());
    let outside = fitted(params_2d().extrapolate(true));
    let x = array![[1., 0.3], [0., -1.], [0.4, 1.]];
    assert_eq!(
        inside.predict_values(x.view()).unwrap(),
        outside.predict_values(x.view()).unwrap()
    );
    assert_eq!(
        inside.predict_derivatives(x.view(), 1).unwrap(),
        outside.predict_derivatives(x.view(), 1).unwrap()
    );
}

#[test]
fn test_out_of_domain_training_fails_before_solving() {
    let sink = Arc::new(RecordingSink::new());
    let params = RmtParams::new(array![[0., 1.]]).approx_norm(2.).check().unwrap();
    let mut training = TrainingSet::new();
    training
        .set_values(array![[0.5], [-0.01]], array![[1.], [2.]])
        .unwrap();
    let result = params.fit_with(&training, &FitContext::new().with_diagnostics(sink.clone()));
    assert!(matches!(
        result,
        Err(RmtError::OutOfDomain { point: 1, dim: 0, .. })
    ));
    assert!(!sink.events().iter().any(|event| matches!(
        event,
        FitEvent::Timing { label, .. } if label.starts_with("Solving")
    )));
}

#[test]
fn test_multigrid_fit_matches_direct() {
    let direct = fitted(params_2d());
    let multigrid = fitted(
        params_2d()
            .solver(SolverKind::Multigrid)
            .mg_factors(vec![2])
            .solver_tolerance(1e-14),
    );
    let x = array![[0.1, -0.9], [0.5, 0.], [0.95, 0.7]];
    assert_array2d_all_close(
        multigrid.predict_values(x.view()).unwrap().view(),
        direct.predict_values(x.view()).unwrap().view(),
        1e-8,
    );
    assert_array2d_all_close(
        multigrid.solution().unwrap().coefficients(),
        direct.solution().unwrap().coefficients(),
        1e-8,
    );
}
