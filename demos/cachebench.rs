//! Randomized stress driver for the blob cache.
//!
//! Inserts random blobs, keeps an independent ground truth, and every so often
//! re-checks every known blob (same id on re-insert, same bytes on lookup)
//! before resetting both the cache and the ground truth.
//!
//! Run with: `cargo run --release --example cachebench`
//! With options: `cargo run --release --example cachebench -- -n 1000000 --seed 7`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use clap::Parser;
use color_eyre::eyre::ensure;
use log::{debug, info};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use unwind_cache::cache::BlobCache;
use unwind_cache::id::BlobId;

#[derive(Parser, Debug)]
#[command(name = "cachebench")]
#[command(about = "Stress test the deduplicating blob cache")]
struct Args {
    /// Number of inserts to perform (runs forever if omitted)
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// Seed of the blob generator
    #[arg(short, long, default_value_t = 123)]
    seed: u64,

    /// Maximum blob length in bytes
    #[arg(long, default_value_t = 64)]
    max_len: usize,

    /// A check-and-reset happens when `random & mask == 123 & mask`
    #[arg(long, default_value_t = 0xffff)]
    check_mask: u32,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Set on SIGINT; the main loop stops at the next iteration.
static STOP: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_: libc::c_int) {
    STOP.store(true, Ordering::Relaxed);
}

#[cfg(unix)]
fn install_sigint_handler() -> color_eyre::Result<()> {
    let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
    let previous = unsafe { libc::signal(libc::SIGINT, handler) };
    ensure!(previous != libc::SIG_ERR, "failed to install the SIGINT handler");
    Ok(())
}

#[cfg(not(unix))]
fn install_sigint_handler() -> color_eyre::Result<()> {
    Ok(())
}

fn keep_running(stop: &AtomicBool, iterations: Option<u64>, done: u64) -> bool {
    !stop.load(Ordering::Relaxed) && iterations.map_or(true, |n| done < n)
}

/// Whether this iteration verifies and resets. Reachable for any mask.
fn is_check_point(random: u32, mask: u32) -> bool {
    random & mask == 123 & mask
}

/// Re-insert and look up every known blob.
fn verify(cache: &BlobCache, known: &HashMap<Vec<u8>, BlobId>) -> color_eyre::Result<()> {
    for (blob, &id) in known {
        let again = cache.insert(blob);
        ensure!(again == id, "re-insert returned {} instead of {}", again, id);

        let data = cache.lookup(id);
        ensure!(data == Some(&blob[..]), "lookup of {} returned wrong bytes", id);
    }
    ensure!(
        cache.len() == known.len(),
        "cache holds {} blobs, ground truth has {}",
        cache.len(),
        known.len()
    );
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    simplelog::TermLogger::init(
        if args.verbose {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    ensure!(args.max_len > 0, "--max-len must be positive");

    install_sigint_handler()?;

    let mut cache = BlobCache::new();
    let mut known: HashMap<Vec<u8>, BlobId> = HashMap::new();
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let very_start = Instant::now();
    let mut round_start = very_start;
    let mut checks = 0u64;
    let mut done = 0u64;

    while keep_running(&STOP, args.iterations, done) {
        done += 1;

        let len = rng.random_range(1..=args.max_len);
        let mut blob = vec![0u8; len];
        rng.fill(&mut blob[..]);

        let id = cache.insert(&blob);
        let expected = *known.entry(blob).or_insert(id);
        ensure!(id == expected, "insert returned {} for a blob known as {}", id, expected);

        if is_check_point(rng.random(), args.check_mask) {
            let elapsed = round_start.elapsed();
            let rate = known.len() as f64 / elapsed.as_secs_f64().max(1e-9);
            info!("{} blobs, {:.0} inserts/s, {}", known.len(), rate, cache.stats());

            verify(&cache, &known)?;
            checks += 1;

            known.clear();
            cache.reset();
            round_start = Instant::now();
        } else if done % 1000 == 0 {
            debug!("{} inserts, {:?}", done, cache);
        }
    }

    if STOP.load(Ordering::Relaxed) {
        info!("Interrupted, finishing up");
    }

    verify(&cache, &known)?;
    info!(
        "Test complete: {} inserts, {} checks in {:?}",
        done,
        checks,
        very_start.elapsed()
    );

    let reset_start = Instant::now();
    cache.reset();
    info!("Final reset complete in {:?}", reset_start.elapsed());

    Ok(())
}
