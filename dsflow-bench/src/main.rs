//! Benchmark runner for dsflow pipeline stages

use dsflow_bench::{bench_parallel_map, run_all, BenchConfig, BenchResult};
use tracing::Level;

fn print_result(result: &BenchResult) {
    println!("\nBenchmark: {}", result.name);
    println!("  Total time:   {:?}", result.total_time);
    println!("  Average time: {:?}", result.avg_time);
    println!("  Min time:     {:?}", result.min_time);
    println!("  Max time:     {:?}", result.max_time);
    println!("  Records:      {}", result.records_per_iteration);
    println!("  Throughput:   {:.2} records/sec", result.throughput);
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::WARN).init();

    println!("=== dsflow Pipeline Benchmarks ===");

    let config = BenchConfig {
        iterations: 5,
        warmup_iterations: 1,
        ..BenchConfig::default()
    };
    for result in run_all(&config)? {
        print_result(&result);
    }

    // Parallel map scaling
    println!("\n=== Parallel Map Scaling ===");
    for num_threads in [1, 2, 4, 8] {
        let config = BenchConfig {
            iterations: 3,
            warmup_iterations: 1,
            num_threads,
            ..BenchConfig::default()
        };
        let result = bench_parallel_map(&config)?;
        println!("\nWorkers: {num_threads}");
        println!("  Average time: {:?}", result.avg_time);
        println!("  Throughput:   {:.2} records/sec", result.throughput);
    }

    Ok(())
}
