//! Visualize how the sizing percentile trades host efficiency for throttling
//!
//! Generates an interactive HTML chart showing:
//! - Average completion and throttled share per swept percentile
//! - Per-step host efficiency for the lowest and highest percentile
//!
//! Usage:
//!   cargo run --example visualize_throttling
//!   Open visualizations/throttling.html in browser

use plotly::{
    color::NamedColor,
    common::{Line, Mode},
    layout::{Axis, Layout},
    Bar, Plot, Scatter,
};
use podshare_core::NoopObserver;
use podshare_simulation_engine::{
    metrics::MetricsAggregator, sweep::Sweep, synthetic::DemandGenerator,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎨 Generating throttling visualization...");

    // One day of 5-minute samples for 40 pods
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let series = DemandGenerator::new(400.0, 4000)
        .with_burst_probability(0.02)
        .generate(40, 288, &mut rng)?;

    let runs = Sweep::standard()
        .with_seed(Some(7))
        .run(&series, &NoopObserver)?;
    let summaries = MetricsAggregator::summarize_all(
        runs.iter().map(|run| (run.name().unwrap_or("unnamed"), run)),
    )?;
    println!("   Simulated {} runs", summaries.len());

    let labels: Vec<String> = summaries.iter().map(|s| s.name.clone()).collect();
    let completion: Vec<f64> = summaries
        .iter()
        .map(|s| s.average_completion_percent)
        .collect();
    let throttled: Vec<f64> = summaries.iter().map(|s| s.throttled_percent).collect();

    let completion_trace = Bar::new(labels.clone(), completion.clone()).name("Average completion (%)");
    let throttled_trace = Bar::new(labels, throttled).name("Throttled pod-steps (%)");

    let mut plot = Plot::new();
    plot.add_trace(completion_trace);
    plot.add_trace(throttled_trace);

    // Efficiency over the day for both ends of the sweep
    let colors = [NamedColor::Blue, NamedColor::OrangeRed];
    let ends = [runs.first(), runs.iter().rev().nth(1)];
    for (run, color) in ends.into_iter().flatten().zip(colors) {
        let steps: Vec<usize> = run.time_steps().iter().map(|t| t.id().index()).collect();
        let efficiency: Vec<f64> = run
            .time_steps()
            .iter()
            .map(|t| t.efficiency() * 100.0)
            .collect();
        let trace = Scatter::new(steps, efficiency)
            .name(&format!("{} efficiency (%)", run.name().unwrap_or("unnamed")))
            .mode(Mode::Lines)
            .x_axis("x2")
            .y_axis("y2")
            .line(Line::new().color(color).width(1.5));
        plot.add_trace(trace);
    }

    let layout = Layout::new()
        .title("CPU fair-share by sizing percentile")
        .x_axis(Axis::new().title("Run").domain(&[0.0, 0.45]))
        .y_axis(Axis::new().title("Percent").range(vec![0.0, 100.0]))
        .x_axis2(Axis::new().title("Time step").domain(&[0.55, 1.0]))
        .y_axis2(
            Axis::new()
                .title("Host efficiency (%)")
                .anchor("x2")
                .range(vec![0.0, 105.0]),
        );
    plot.set_layout(layout);

    std::fs::create_dir_all("visualizations")?;
    let output_path = "visualizations/throttling.html";
    plot.write_html(output_path);

    println!("✅ Visualization saved to {}", output_path);
    println!("\n📊 Key Observations:");
    for summary in &summaries {
        println!(
            "   - {:<8} requests {:>6}m, completion {:>5.1}%, throttled {:>5.1}%",
            summary.name,
            summary.sum_of_requests,
            summary.average_completion_percent,
            summary.throttled_percent
        );
    }
    Ok(())
}
