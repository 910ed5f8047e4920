//! Benchmarks for the per-tick control path
//!
//! Run with: cargo bench --bench control_tick

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

use duckling_core::config::RuntimeConfig;
use duckling_core::control::{PhaseGenerator, TargetComposer, WalkController};
use duckling_core::hardware::{ImuReading, JointLayout, SimulatedHardware, StaticContacts, StaticImu};
use duckling_core::math::ActionFilter;
use duckling_core::neural::{
    Action, ActionHistory, Activation, DenseLayer, DenseMlpPolicy, ObservationAssembler,
    ObservationInputs, ObservationLayout, Policy, ZeroPolicy,
};
use duckling_core::reference_motion::ReferenceMotion;

const NUM_JOINTS: usize = 14;

// ── Observation assembly ────────────────────────────────────────────────────

fn bench_observation(c: &mut Criterion) {
    let layout = JointLayout::duck();
    let assembler = ObservationAssembler::new(
        ObservationLayout::duck(NUM_JOINTS, 2),
        layout.init_pose().to_vec(),
    );
    let mut history = ActionHistory::new(NUM_JOINTS);
    history.push(Action::new(vec![0.1; NUM_JOINTS])).unwrap();
    let positions = layout.init_pose().to_vec();
    let velocities = vec![0.2; NUM_JOINTS];
    let contacts = vec![1.0, 0.0];
    let command = [0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

    c.bench_function("assemble_observation", |b| {
        b.iter(|| {
            black_box(
                assembler
                    .assemble(&ObservationInputs {
                        imu: Some(ImuReading::level()),
                        positions: Some(&positions),
                        velocities: Some(&velocities),
                        command: &command,
                        history: &history,
                        motor_targets: &positions,
                        contacts: Some(&contacts),
                        phase: [1.0, 0.0],
                    })
                    .unwrap(),
            )
        })
    });
}

// ── Target composition ──────────────────────────────────────────────────────

fn bench_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("TargetComposer");
    let layout = JointLayout::duck();
    let action = vec![0.3; NUM_JOINTS];
    let command = [0.0; 7];

    group.bench_function("compose_raw", |b| {
        let mut composer = TargetComposer::new(&layout, 0.25);
        b.iter(|| black_box(composer.compose(&action, &command, Duration::ZERO).unwrap().len()))
    });

    group.bench_function("compose_filtered", |b| {
        let filter = ActionFilter::new(NUM_JOINTS, 50.0, 10.0).unwrap();
        let mut composer = TargetComposer::new(&layout, 0.25)
            .with_filter(filter, Duration::ZERO)
            .unwrap();
        b.iter(|| {
            black_box(
                composer
                    .compose(&action, &command, Duration::from_secs(2))
                    .unwrap()
                    .len(),
            )
        })
    });

    group.bench_function("phase_advance", |b| {
        let mut phase = PhaseGenerator::new(27, 0.0).unwrap();
        b.iter(|| black_box(phase.advance()))
    });

    group.finish();
}

// ── Policy forward pass ─────────────────────────────────────────────────────

fn bench_policy(c: &mut Criterion) {
    let obs_dim = ObservationLayout::duck(NUM_JOINTS, 2).total_dim();
    let layer = |inputs: usize, outputs: usize, activation| DenseLayer {
        weights: vec![vec![0.01; inputs]; outputs],
        bias: vec![0.0; outputs],
        activation,
    };
    let mut policy = DenseMlpPolicy::from_layers(vec![
        layer(obs_dim, 128, Activation::Elu),
        layer(128, 128, Activation::Elu),
        layer(128, NUM_JOINTS, Activation::Identity),
    ])
    .unwrap();
    let obs = vec![0.1; obs_dim];

    c.bench_function("mlp_128x2_infer", |b| {
        b.iter(|| black_box(policy.infer(&obs).unwrap()))
    });
}

// ── Full simulated tick ─────────────────────────────────────────────────────

fn bench_tick(c: &mut Criterion) {
    let layout = JointLayout::duck();
    let config = RuntimeConfig::default()
        .with_cutoff_frequency(10.0)
        .with_startup_settle(Duration::ZERO);
    let mut controller = WalkController::builder(config)
        .hardware(Arc::new(SimulatedHardware::new(&layout, 50.0)))
        .imu(Arc::new(StaticImu::new(ImuReading::level())))
        .contacts(Arc::new(StaticContacts::new(vec![1.0, 1.0])))
        .policy(Box::new(ZeroPolicy::new(NUM_JOINTS)))
        .reference_motion(ReferenceMotion::with_period(27).unwrap())
        .layout(layout)
        .build()
        .unwrap();

    c.bench_function("walk_controller_tick", |b| {
        b.iter(|| black_box(controller.tick().unwrap()))
    });
}

criterion_group!(benches, bench_observation, bench_targets, bench_policy, bench_tick);
criterion_main!(benches);
