//! End-to-end scenarios: series in, sized and allocated runs out

use std::io::Cursor;

use podshare_core::{HostCapacity, NoopObserver, PodshareError, SizingParams, TimeStepId, WorkloadId};
use podshare_simulation_engine::{
    metrics::MetricsAggregator,
    series::{DelimitedFormat, DemandTable},
    simulation::SimulationRun,
    sweep::{RunSpec, Sweep, run_one},
    synthetic::DemandGenerator,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn sized_run(table: &DemandTable, params: SizingParams) -> SimulationRun {
    let mut run = SimulationRun::from_series(table).unwrap();
    run.size(&params, &NoopObserver).unwrap();
    run
}

fn synthetic(workloads: usize, steps: usize, seed: u64) -> DemandTable {
    DemandGenerator::new(300.0, 3000)
        .with_burst_probability(0.05)
        .generate(workloads, steps, &mut ChaCha8Rng::seed_from_u64(seed))
        .unwrap()
}

#[test]
fn test_alternating_pods_fit_exactly() {
    let table = DemandTable::new(vec![vec![100, 0], vec![50, 50], vec![0, 100]]).unwrap();
    let mut run = sized_run(&table, SizingParams::percentile(100));
    assert_eq!(run.workloads()[0].request(), 100);
    assert_eq!(run.workloads()[1].request(), 100);

    run.run(100, Some(1), &NoopObserver).unwrap();

    let middle = run.time_step(TimeStepId(1)).unwrap();
    assert_eq!(middle.efficiency(), 1.0);
    assert_eq!(middle.values()[0].real_millicores(), 50);
    assert_eq!(middle.values()[1].real_millicores(), 50);
    assert_eq!(run.throttled_pairs(), 0);
}

#[test]
fn test_saturated_host_throttles_both_pods() {
    let table = DemandTable::new(vec![vec![150, 150], vec![100, 100], vec![50, 50]]).unwrap();
    let mut run = sized_run(&table, SizingParams::percentile(50));
    assert_eq!(run.sum_of_requests(), 200);

    run.run(100, Some(8), &NoopObserver).unwrap();

    let first = run.time_step(TimeStepId(0)).unwrap();
    assert_eq!(first.granted_sum(), 100);
    assert_eq!(first.efficiency(), 1.0);
    assert!(run.is_throttled(TimeStepId(0), WorkloadId(0)).unwrap());
    assert!(run.is_throttled(TimeStepId(0), WorkloadId(1)).unwrap());
}

#[test]
fn test_allocation_bounds_hold_on_synthetic_load() {
    let table = synthetic(12, 96, 5);
    let params = SizingParams::percentile(70).with_limit_factor(Some(1.5));

    for capacity in [0, 500, 2000, 6000] {
        let mut run = sized_run(&table, params);
        run.run(capacity, Some(capacity), &NoopObserver).unwrap();

        for step in run.time_steps() {
            let granted = step.granted_sum();
            assert!(granted <= capacity);
            if capacity > 0 {
                assert_eq!(granted == capacity, step.efficiency() == 1.0);
            }
            for value in step.values() {
                let workload = &run.workloads()[value.workload().index()];
                assert!(value.real_millicores() <= value.ideal_millicores());
                if let Some(limit) = workload.limit() {
                    assert!(value.real_millicores() <= limit);
                }
            }
        }
    }
}

#[test]
fn test_more_capacity_never_takes_cpu_away() {
    let table = synthetic(8, 48, 9);
    let params = SizingParams::percentile(60);

    let mut previous: Option<SimulationRun> = None;
    for capacity in (0..=3000).step_by(250) {
        let mut run = sized_run(&table, params);
        run.run(capacity, Some(42), &NoopObserver).unwrap();

        if let Some(smaller) = &previous {
            for (a, b) in smaller.time_steps().iter().zip(run.time_steps()) {
                for (x, y) in a.values().iter().zip(b.values()) {
                    assert!(x.real_millicores() <= y.real_millicores());
                }
            }
        }
        previous = Some(run);
    }
}

#[test]
fn test_same_inputs_same_allocation() {
    let table = synthetic(10, 64, 3);
    let params = SizingParams::percentile(80).with_request_factor(0.8);

    let mut a = sized_run(&table, params);
    let mut b = sized_run(&table, params);
    a.run(1500, Some(77), &NoopObserver).unwrap();
    b.run(1500, Some(77), &NoopObserver).unwrap();

    for (x, y) in a.time_steps().iter().zip(b.time_steps()) {
        assert_eq!(x.values(), y.values());
        assert_eq!(x.efficiency(), y.efficiency());
    }
}

#[test]
fn test_sizing_twice_changes_nothing() {
    let table = synthetic(6, 40, 1);
    let params = SizingParams::percentile(95).with_limit_factor(Some(2.0));

    let mut run = sized_run(&table, params);
    let first: Vec<(u32, Option<u32>)> =
        run.workloads().iter().map(|w| (w.request(), w.limit())).collect();
    run.size(&params, &NoopObserver).unwrap();
    let second: Vec<(u32, Option<u32>)> =
        run.workloads().iter().map(|w| (w.request(), w.limit())).collect();

    assert_eq!(first, second);
}

#[test]
fn test_median_of_four_samples() {
    let table = DemandTable::new(vec![vec![400], vec![100], vec![300], vec![200]]).unwrap();
    let run = sized_run(&table, SizingParams::percentile(50));
    assert_eq!(run.workloads()[0].request(), 300);
}

#[test]
fn test_delimited_file_to_summary() {
    let text = ";POD_1;POD_2;sum\nT_0;120;40;160\nT_1;90;310;400\nT_2;60;60;120\n";
    let table = DelimitedFormat::default().read(Cursor::new(text)).unwrap();
    assert_eq!(table.workload_names(), &["POD_1", "POD_2"]);

    let spec = RunSpec::percentile(100).with_seed(Some(4));
    let run = run_one(&table, &spec, Default::default(), &NoopObserver).unwrap();
    // requests 120 + 310 fit every step
    assert_eq!(run.capacity(), Some(430));

    let summary = MetricsAggregator::summarize(&run).unwrap();
    assert_eq!(summary.name, "P100");
    assert_eq!(summary.throttled_pairs, 0);
    assert_eq!(summary.sum_of_max, 430);
    assert_eq!(summary.biggest_time_step_demand, 400);
}

#[test]
fn test_higher_percentiles_request_more() {
    let table = synthetic(15, 120, 12);
    let runs = Sweep::standard()
        .with_seed(Some(2))
        .run(&table, &NoopObserver)
        .unwrap();

    // Last run is the harness run, the rest are ordered percentiles
    let requests: Vec<u64> = runs[..runs.len() - 1]
        .iter()
        .map(SimulationRun::sum_of_requests)
        .collect();
    assert!(requests.windows(2).all(|w| w[0] <= w[1]));

    let summaries = MetricsAggregator::summarize_all(
        runs.iter().map(|run| (run.name().unwrap_or("unnamed"), run)),
    )
    .unwrap();
    assert_eq!(summaries.last().unwrap().name, "harness");
}

#[test]
fn test_fixed_negative_capacity_is_rejected() {
    let table = synthetic(3, 10, 0);
    let spec = RunSpec::percentile(50).with_capacity(HostCapacity::Fixed(-100));

    assert!(matches!(
        run_one(&table, &spec, Default::default(), &NoopObserver),
        Err(PodshareError::NegativeCapacity(-100))
    ));
}
