//! Benchmarks for the closed-form comparison functions.
//! Run with: cargo bench

use splitflow_stats::{expected_loss, probability_greater};

fn main() {
    // Counter magnitudes typical of a mature campaign
    let (a, b, c, d) = (480u64, 1520u64, 445u64, 1555u64);

    // Warmup
    for _ in 0..10 {
        let _ = probability_greater(a, b, c, d).unwrap();
    }

    let iterations = 1_000u32;
    let start = std::time::Instant::now();
    for _ in 0..iterations {
        let _ = probability_greater(a, b, c, d).unwrap();
    }
    let elapsed = start.elapsed();

    println!("=== probability_greater ===");
    println!("Series terms: {}", c);
    println!("Iterations:   {}", iterations);
    println!("Total time:   {:?}", elapsed);
    println!("Per call:     {:?}", elapsed / iterations);

    let start = std::time::Instant::now();
    for _ in 0..iterations {
        let _ = expected_loss(a, b, c, d).unwrap();
    }
    let elapsed = start.elapsed();

    println!("=== expected_loss ===");
    println!("Iterations:   {}", iterations);
    println!("Total time:   {:?}", elapsed);
    println!("Per call:     {:?}", elapsed / iterations);
}
