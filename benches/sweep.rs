use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pfasst::config::{ControllerOptions, NodeFamily, QDeltaKind, SweeperOptions};
use pfasst::controller::SerialController;
use pfasst::core::traits::Problem;
use pfasst::level::Level;
use pfasst::problem::Advection1d;
use pfasst::step::Step;
use pfasst::sweeper::GenericImplicit;

fn build_step(nvars: usize, dt: f64) -> Step<Vec<f64>> {
    let opts = SweeperOptions::new(3, NodeFamily::GaussRadauRight).with_qdelta(QDeltaKind::Lu);
    let level = Level::new(
        0,
        Box::new(Advection1d::new(nvars, 1.0, 1).unwrap()),
        Box::new(GenericImplicit::new(&opts).unwrap()),
        dt,
    );
    Step::new(vec![level], vec![], dt).unwrap()
}

fn bench_sweep(c: &mut Criterion) {
    let dt = 1e-3;
    let prob = Advection1d::new(64, 1.0, 1).unwrap();
    let u0 = prob.u_exact(0.0).unwrap();

    c.bench_function("sdc single step advection", |ben| {
        ben.iter(|| {
            let opts = ControllerOptions {
                num_procs: 1,
                restol: 1e-10,
                maxiter: 20,
                ..Default::default()
            };
            let mut ctrl = SerialController::new(opts, |_| Ok(build_step(64, dt))).unwrap();
            let (uend, _) = ctrl.run(black_box(u0.clone()), 0.0, dt).unwrap();
            black_box(uend)
        })
    });
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
