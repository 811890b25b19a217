//! Basic usage examples for Pool

use esox_instancepool::{Host, Label, MemoryHost, Placement, Pool, PoolConfiguration};
use std::sync::Arc;

fn main() {
    println!("=== Esox Instance Pool - Basic Examples ===\n");

    // Example 1: Acquire and reuse
    acquire_and_reuse();

    // Example 2: Capacity bound
    bounded_pool();

    // Example 3: Components and placement
    components_and_placement();

    // Example 4: Trimming, metrics and health
    trimming_and_metrics();
}

fn acquire_and_reuse() {
    println!("1. Acquire and Reuse:");
    let host = Arc::new(MemoryHost::new());
    let pool = Pool::new(host.clone(), "bullet", PoolConfiguration::default()).unwrap();

    let first = pool.acquire_detailed(None);
    println!("   Got {:?} (new: {})", first.value, first.is_new);

    if let Some(bullet) = first.value {
        // Hiding an instance hands it back to the pool
        host.set_active(&bullet, false);
    }

    let second = pool.acquire_detailed(None);
    println!("   Got {:?} (new: {})\n", second.value, second.is_new);
}

fn bounded_pool() {
    println!("2. Bounded Pool:");
    let host = Arc::new(MemoryHost::new());
    let pool = Pool::new(host, "enemy", PoolConfiguration::new().with_max_count(2)).unwrap();

    let a = pool.acquire(None);
    let b = pool.acquire(None);
    let c = pool.acquire(None);
    println!("   First: {:?}, second: {:?}", a, b);
    println!("   Third: {:?} (pool at capacity)", c);

    if let Some(a) = a {
        pool.release(&a);
    }
    println!("   After release: {:?}\n", pool.acquire(None));
}

fn components_and_placement() {
    println!("3. Components and Placement:");
    let host = Arc::new(MemoryHost::new());
    host.attach_label("pickup", "health potion");
    let pool = Pool::new(host.clone(), "pickup", PoolConfiguration::default()).unwrap();

    let spot = Placement::at([3.0, 0.0, -2.0]);
    let label = pool.acquire_component::<Label>(Some(&spot));
    println!("   Component: {:?}", label);

    if let Some(id) = pool.instances().first() {
        println!("   Placed at: {:?}\n", host.placement_of(*id).map(|p| p.position));
    }
}

fn trimming_and_metrics() {
    println!("4. Trimming, Metrics and Health:");
    let host = Arc::new(MemoryHost::new());
    let pool = Pool::new(host.clone(), "particle", PoolConfiguration::new().with_max_count(10)).unwrap();

    let burst: Vec<_> = (0..8).filter_map(|_| pool.acquire(None)).collect();
    for particle in burst.iter().skip(2) {
        pool.release(particle);
    }

    let health = pool.health_status();
    println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
    println!("   Utilization: {:.1}%", health.utilization * 100.0);

    let destroyed = pool.trim(3);
    println!("   Trimmed {} idle instances, {} left", destroyed, pool.count());

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
