//! Registry and background trimming examples

use esox_instancepool::{MemoryHost, PoolConfiguration, PoolRegistry, ShutdownMode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== Esox Instance Pool - Registry Examples ===\n");

    let host = Arc::new(MemoryHost::new());
    let registry = PoolRegistry::new(host.clone(), tokio::runtime::Handle::current());

    // Example 1: One pool per template
    one_pool_per_template(&registry);

    // Example 2: Background trimming
    background_trimming(&registry).await;

    // Example 3: Pausing the trim tasks
    pause_and_resume(&registry).await;

    // Example 4: Shutdown
    let removed = registry.shutdown(ShutdownMode::Graceful);
    println!("4. Shutdown:");
    println!("   Removed {} pools, {} live instances left", removed, host.live_count());
}

fn one_pool_per_template(registry: &PoolRegistry<MemoryHost>) {
    println!("1. One Pool per Template:");

    let arrows = registry
        .get_or_create("arrow", PoolConfiguration::new().with_max_count(16))
        .unwrap();
    let again = registry.get_or_create("arrow", PoolConfiguration::default()).unwrap();
    println!("   Same pool: {}", arrows.ptr_eq(&again));

    match registry.create("arrow", PoolConfiguration::default()) {
        Ok(_) => println!("   Created a second pool"),
        Err(e) => println!("   Error: {}", e),
    }

    registry.create("rock", PoolConfiguration::default()).unwrap();
    for index in 0..registry.len() {
        if let Some(pool) = registry.pool_at(index) {
            println!("   [{}] {:?}", index, pool.template());
        }
    }
    println!();
}

async fn background_trimming(registry: &PoolRegistry<MemoryHost>) {
    println!("2. Background Trimming:");

    let config = PoolConfiguration::new()
        .with_max_count(8)
        .with_prepare_count(2)
        .with_interval(Duration::from_millis(100));
    let sparks = registry.create("spark", config).unwrap();

    let burst: Vec<_> = (0..8).filter_map(|_| sparks.acquire(None)).collect();
    println!("   Burst of {} sparks", burst.len());
    for spark in &burst {
        sparks.release(spark);
    }

    sleep(Duration::from_millis(250)).await;
    println!("   After trimming: {} sparks kept\n", sparks.count());
}

async fn pause_and_resume(registry: &PoolRegistry<MemoryHost>) {
    println!("3. Pause and Resume:");
    let sparks = registry.get("spark").unwrap();
    sparks.set_prepare_count(0);

    registry.deactivate();
    sleep(Duration::from_millis(250)).await;
    println!("   Paused: {} sparks kept", sparks.count());

    registry.activate();
    sleep(Duration::from_millis(50)).await;
    println!("   Resumed: {} sparks kept\n", sparks.count());
}
