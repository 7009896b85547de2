//! Throughput benchmarks for dsflow pipeline stages

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

use dsflow::{csv_dataset, CsvOptions, Dataset, Error, Parallelism, Record, Result};

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Number of timed iterations
    pub iterations: usize,

    /// Untimed iterations run first
    pub warmup_iterations: usize,

    /// Records produced by the benchmark source
    pub records: usize,

    /// Columns per record in the CSV benchmark
    pub num_columns: usize,

    /// Batch size for batching benchmarks
    pub batch_size: usize,

    /// Shuffle buffer size
    pub shuffle_buffer: usize,

    /// Worker count for parallel map benchmarks
    pub num_threads: usize,

    /// Busy-work rounds per record inside map functions
    pub work_per_record: u32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup_iterations: 3,
            records: 100_000,
            num_columns: 8,
            batch_size: 256,
            shuffle_buffer: 10_000,
            num_threads: 4,
            work_per_record: 200,
        }
    }
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchResult {
    /// Name of the benchmark
    pub name: String,

    /// Total time taken
    pub total_time: Duration,

    /// Average time per iteration
    pub avg_time: Duration,

    /// Min time per iteration
    pub min_time: Duration,

    /// Max time per iteration
    pub max_time: Duration,

    /// Records pulled through the pipeline per iteration
    pub records_per_iteration: usize,

    /// Throughput (records/second)
    pub throughput: f64,
}

/// Run `func` repeatedly and time it; `func` returns the records it pulled
pub fn run_benchmark<F>(name: &str, config: &BenchConfig, mut func: F) -> Result<BenchResult>
where
    F: FnMut() -> Result<usize>,
{
    if config.iterations == 0 {
        return Err(Error::InvalidArgument("benchmark needs at least one iteration".into()));
    }

    for _ in 0..config.warmup_iterations {
        func()?;
    }

    let mut times = Vec::with_capacity(config.iterations);
    let mut records = 0;
    let start_total = Instant::now();

    for _ in 0..config.iterations {
        let start = Instant::now();
        records = func()?;
        times.push(start.elapsed());
    }

    let total_time = start_total.elapsed();
    let iterations = u32::try_from(times.len()).unwrap_or(u32::MAX);
    let avg_time = times.iter().sum::<Duration>() / iterations;
    let min_time = times.iter().min().copied().unwrap_or_default();
    let max_time = times.iter().max().copied().unwrap_or_default();

    #[allow(clippy::cast_precision_loss)]
    let throughput = (records * times.len()) as f64 / total_time.as_secs_f64().max(f64::EPSILON);

    info!(benchmark = name, ?avg_time, throughput, "benchmark finished");

    Ok(BenchResult {
        name: name.to_string(),
        total_time,
        avg_time,
        min_time,
        max_time,
        records_per_iteration: records,
        throughput,
    })
}

/// Pull every element of `dataset` and count the records
pub fn drain(dataset: &Dataset) -> Result<usize> {
    let mut records = 0;
    for element in dataset.iterator() {
        records += element?.record_count();
    }
    Ok(records)
}

fn busy_map(rounds: u32) -> impl Fn(Record) -> anyhow::Result<Record> + Send + Sync + 'static {
    move |record| {
        let seed = record.value("value")?.as_i64().unwrap_or_default();
        let mut acc = seed;
        for round in 0..rounds {
            acc = acc.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(i64::from(round));
        }
        Ok(record.with_column("hash", acc))
    }
}

fn range_source(config: &BenchConfig) -> Result<Dataset> {
    let end = i64::try_from(config.records)
        .map_err(|_| Error::InvalidArgument("record count too large".into()))?;
    Dataset::range(0, end, 1)
}

/// Map on the consumer thread
pub fn bench_sequential_map(config: &BenchConfig) -> Result<BenchResult> {
    let dataset = range_source(config)?.map(busy_map(config.work_per_record))?;
    run_benchmark("Sequential map", config, || drain(&dataset))
}

/// Map on a worker pool with ordered release
pub fn bench_parallel_map(config: &BenchConfig) -> Result<BenchResult> {
    let dataset = range_source(config)?
        .map_parallel(busy_map(config.work_per_record), Parallelism::Fixed(config.num_threads))?;
    let name = format!("Parallel map ({} workers)", config.num_threads);
    run_benchmark(&name, config, || drain(&dataset))
}

/// Shuffle through a bounded buffer
pub fn bench_shuffle(config: &BenchConfig) -> Result<BenchResult> {
    let dataset = range_source(config)?.shuffle(config.shuffle_buffer)?;
    run_benchmark("Shuffle", config, || drain(&dataset))
}

/// Group records into batches
pub fn bench_batch(config: &BenchConfig) -> Result<BenchResult> {
    let dataset = range_source(config)?.batch(config.batch_size, false)?;
    run_benchmark("Batch", config, || drain(&dataset))
}

/// Full CSV scan with schema inference, shuffle and batching
pub fn bench_csv_scan(config: &BenchConfig) -> Result<BenchResult> {
    let fixture = CsvFixture::write(config)?;
    let dataset = csv_dataset(&fixture.path, CsvOptions::default())?
        .shuffle(config.shuffle_buffer)?
        .batch(config.batch_size, false)?;
    run_benchmark("CSV scan", config, || drain(&dataset))
}

/// Every benchmark in order
pub fn run_all(config: &BenchConfig) -> Result<Vec<BenchResult>> {
    Ok(vec![
        bench_sequential_map(config)?,
        bench_parallel_map(config)?,
        bench_shuffle(config)?,
        bench_batch(config)?,
        bench_csv_scan(config)?,
    ])
}

/// Generated CSV file, removed on drop
struct CsvFixture {
    path: PathBuf,
}

impl CsvFixture {
    fn write(config: &BenchConfig) -> Result<Self> {
        let path = std::env::temp_dir().join(format!("dsflow-bench-{}.csv", uuid::Uuid::new_v4()));
        let fixture = Self { path };
        let mut out = BufWriter::new(File::create(&fixture.path)?);

        let header: Vec<String> = (0..config.num_columns).map(|i| format!("col_{i}")).collect();
        writeln!(out, "{}", header.join(","))?;
        for row in 0..config.records {
            let fields: Vec<String> = (0..config.num_columns)
                .map(|col| match col % 3 {
                    0 => (row + col).to_string(),
                    1 => format!("{}.25", row % 1000),
                    _ => format!("label_{}", row % 17),
                })
                .collect();
            writeln!(out, "{}", fields.join(","))?;
        }
        out.flush()?;
        Ok(fixture)
    }
}

impl Drop for CsvFixture {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn tiny() -> BenchConfig {
        BenchConfig {
            iterations: 2,
            warmup_iterations: 1,
            records: 500,
            num_columns: 4,
            batch_size: 64,
            shuffle_buffer: 50,
            num_threads: 2,
            work_per_record: 4,
        }
    }

    #[test_case(bench_sequential_map)]
    #[test_case(bench_parallel_map)]
    #[test_case(bench_shuffle)]
    #[test_case(bench_batch)]
    #[test_case(bench_csv_scan)]
    fn every_benchmark_pulls_all_records(bench: fn(&BenchConfig) -> Result<BenchResult>) {
        let result = bench(&tiny()).unwrap();
        assert_eq!(result.records_per_iteration, 500);
        assert!(result.min_time <= result.max_time);
        assert!(result.throughput > 0.0);
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = BenchConfig {
            iterations: 0,
            ..tiny()
        };
        assert!(run_benchmark("noop", &config, || Ok(0)).is_err());
    }

    #[test]
    fn csv_fixture_is_removed() {
        let fixture = CsvFixture::write(&tiny()).unwrap();
        let path = fixture.path.clone();
        assert!(path.exists());
        drop(fixture);
        assert!(!path.exists());
    }
}
