use std::sync::Arc;
use std::time::{Duration, Instant};

use tempalias::{Engine, Interval, MemoryStore, Ms, WalStore};

const DAY: Ms = 86_400_000;
const D0: Ms = 1_700_000_000_000;
const TARGETS: usize = 200;
const ALIASES_PER_TARGET: usize = 50;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().copied().unwrap_or_default().as_secs_f64() * 1000.0,
    );
}

/// Build a chain of splits per target, then resolve across the history.
async fn run<R: tempalias::Repository + 'static>(label: &str, engine: Arc<Engine<R>>) {
    println!("{label}");
    let started = Instant::now();
    let mut handles = Vec::new();
    for t in 0..TARGETS {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let target = format!("target-{t}");
            let mut latencies = Vec::with_capacity(ALIASES_PER_TARGET);
            let op = Instant::now();
            let mut current = engine
                .insert("alias-0", target.as_str(), Interval::open(D0))
                .await
                .expect("insert failed");
            latencies.push(op.elapsed());
            for i in 1..ALIASES_PER_TARGET {
                let op = Instant::now();
                let mut next = engine
                    .replace(&mut current, D0 + i as Ms * DAY, format!("alias-{i}"))
                    .await
                    .expect("replace failed");
                latencies.push(op.elapsed());
                std::mem::swap(&mut current, &mut next);
            }
            latencies
        }));
    }
    let mut writes = Vec::new();
    for h in handles {
        writes.extend(h.await.expect("writer panicked"));
    }
    let write_elapsed = started.elapsed();
    print_latency("insert + replace", &mut writes);
    println!(
        "    throughput: {:.0} ops/s",
        writes.len() as f64 / write_elapsed.as_secs_f64()
    );

    let mut reads = Vec::new();
    for t in 0..TARGETS {
        let target = format!("target-{t}");
        for i in 0..ALIASES_PER_TARGET {
            let op = Instant::now();
            let alias = engine
                .resolve_at(&target, D0 + i as Ms * DAY + DAY / 2)
                .await
                .expect("resolve failed");
            reads.push(op.elapsed());
            assert_eq!(alias, format!("alias-{i}"));
        }
    }
    print_latency("resolve_at", &mut reads);
}

#[tokio::main]
async fn main() {
    run("memory store", Arc::new(Engine::new(Arc::new(MemoryStore::new())))).await;

    let dir = std::env::temp_dir().join(format!("tempalias_bench_{}", ulid::Ulid::new()));
    std::fs::create_dir_all(&dir).expect("create bench dir");
    let store = WalStore::open(&dir.join("bench.wal")).expect("open WAL");
    run("WAL store", Arc::new(Engine::new(Arc::new(store)))).await;
    let _ = std::fs::remove_dir_all(dir);
}
