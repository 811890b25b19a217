// Esox Instance Pool
// Small demo wiring one registry to an in-memory host.
// Run more demos with: cargo run --example basic

use esox_instancepool::{
    MemoryHost, Placement, PoolConfiguration, PoolRegistry, PoolResult, ShutdownMode,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> PoolResult<()> {
    println!("=== Esox Instance Pool ===");
    println!("See demos/ directory for more usage");
    println!();

    // The one registry of this process
    let host = Arc::new(MemoryHost::new());
    let registry = PoolRegistry::new(host.clone(), tokio::runtime::Handle::current());

    let config = PoolConfiguration::new()
        .with_max_count(4)
        .with_prepare_count(1)
        .with_interval(Duration::from_millis(200));
    let pool = registry.get_or_create("spark", config)?;

    println!("Quick Demo:");
    let sparks: Vec<_> = (0..6)
        .filter_map(|i| pool.acquire(Some(&Placement::at([i as f32, 0.0, 0.0]))))
        .collect();
    println!("  Acquired {} of 6 (max_count 4)", sparks.len());

    for spark in &sparks {
        pool.release(spark);
    }
    println!("  Idle after release: {}", pool.idle_count());

    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("  Instances after trimming: {}", pool.count());

    let removed = registry.shutdown(ShutdownMode::Graceful);
    println!("  Shut down {} pool(s), {} instance(s) left", removed, host.live_count());
    Ok(())
}
