use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::array;
use sparsermt::helpers::test_helpers::generate_training_data;
use sparsermt::linalg::SolverKind;
use sparsermt::{ParamGuard, RmtParams, RmtSurrogate, TrainingSet};

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("rmtb");
    group.sample_size(10);

    let xlimits = array![[0., 1.], [0., 1.]];
    for num_ctrl in [10, 20] {
        for solver in [SolverKind::Direct, SolverKind::Krylov] {
            for approx_norm in [2., 4.] {
                let (xt, yt) = generate_training_data(
                    200,
                    xlimits.view(),
                    |x| (3. * x[0]).sin() * x[1].exp(),
                    0.01,
                    0,
                );
                let mut training = TrainingSet::new();
                training.set_values(xt, yt).unwrap();

                let params = RmtParams::new(xlimits.clone())
                    .num_ctrl_pts(vec![num_ctrl])
                    .solver(solver)
                    .approx_norm(approx_norm)
                    .max_nln_iter(5)
                    .max_print_depth(0)
                    .check()
                    .unwrap();
                let config = (num_ctrl, solver, approx_norm);
                let config_string = format!("{}, {}, {}", num_ctrl, solver, approx_norm);

                group.bench_with_input(
                    BenchmarkId::new("sparsermt", config_string),
                    &config,
                    |b, _| {
                        b.iter(|| {
                            let mut model = RmtSurrogate::new(params.clone());
                            model.fit(&training).unwrap();
                        })
                    },
                );
            }
        }
    }

    group.finish();
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
