//! Stream random episodes into a shared queue while a trainer reads windows
//!
//! Run with `RUST_LOG=replay_queue=debug` to see per-enqueue bookkeeping.

use std::thread;

use anyhow::Result;
use indexmap::IndexMap;
use ndarray::Array2;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use replay_core::prelude::*;
use replay_queue::SharedQueue;

const OBS_DIM: usize = 4;

fn spec() -> ValuesSpec {
    ValuesSpec::timestep(
        IndexMap::from([("obs".to_string(), TensorSpec::float(&[OBS_DIM]))]),
        IndexMap::new(),
        IndexMap::new(),
        IndexMap::from([("action".to_string(), TensorSpec::int(&[]))]),
    )
}

fn random_timesteps(rng: &mut impl Rng, len: usize, ends: bool) -> Timesteps {
    let obs = Array2::from_shape_fn((len, OBS_DIM), |_| rng.gen_range(-1.0f32..1.0));
    let actions: Vec<i64> = (0..len).map(|_| rng.gen_range(0..2)).collect();
    let reward = (0..len).map(|_| rng.gen_range(0.0f32..1.0)).collect();
    let mut terminal = vec![Terminal::No; len];
    if ends {
        terminal[len - 1] = Terminal::Terminal;
    }
    Timesteps::from_parts(
        IndexMap::from([("obs".to_string(), Tensor::from(obs))]),
        IndexMap::new(),
        IndexMap::new(),
        IndexMap::from([("action".to_string(), Tensor::from(actions))]),
        terminal,
        reward,
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = QueueConfig::from_json(r#"{"capacity": 512, "min_capacity": 64}"#)?;
    let queue = SharedQueue::new(&config, spec())?;

    let producer = {
        let queue = queue.clone();
        thread::spawn(move || -> replay_core::Result<()> {
            let mut rng = rand::thread_rng();
            for _ in 0..200 {
                // Episodes arrive in chunks of up to 16 timesteps
                let mut remaining = rng.gen_range(5..60);
                while remaining > 0 {
                    let len = remaining.min(16);
                    remaining -= len;
                    queue.enqueue(&random_timesteps(&mut rng, len, remaining == 0))?;
                }
            }
            Ok(())
        })
    };

    let mut rng = rand::thread_rng();
    for round in 0..20 {
        let occupancy = queue.stats().occupancy;
        if occupancy == 0 {
            thread::yield_now();
            continue;
        }
        let starts: Vec<usize> = (0..8).map(|_| rng.gen_range(0..occupancy)).collect();
        let batch = queue.predecessors(&starts, 4, &[REWARD], &[STATES])?;
        info!(
            round,
            windows = batch.windows.len(),
            slots = batch.windows.indices.len(),
            "sampled predecessor windows"
        );
    }

    producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;

    let stats = queue.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
