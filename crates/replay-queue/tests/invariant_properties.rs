//! Property-based tests for the queue's boundary bookkeeping
//!
//! Episodes of random length are streamed through queues of random capacity
//! in chunks of random size; the invariants are checked after every enqueue.

use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

use replay_core::prelude::*;
use replay_queue::{Queue, Windows};

/// One episode: its length and whether it ends with a genuine terminal
fn episodes_strategy() -> impl Strategy<Value = Vec<(usize, Option<Terminal>)>> {
    let ending = prop_oneof![
        Just(None),
        Just(Some(Terminal::Terminal)),
        Just(Some(Terminal::Truncated)),
    ];
    prop::collection::vec((1usize..12, ending), 1..24)
}

fn reward_queue(capacity: usize) -> Queue {
    let spec = ValuesSpec::new()
        .with_terminal()
        .leaf(REWARD, TensorSpec::float(&[]));
    Queue::new(&QueueConfig::with_capacity(capacity), spec).unwrap()
}

/// Batch of timesteps `first..first + len` whose reward is the timestep number
fn chunk(first: usize, len: usize, ending: Option<Terminal>) -> Timesteps {
    let mut terminal = vec![Terminal::No; len];
    if let Some(flag) = ending {
        terminal[len - 1] = flag;
    }
    let reward: Vec<f32> = (first..first + len).map(|id| id as f32).collect();
    Timesteps::new(terminal).with(REWARD, Tensor::from(reward))
}

/// Stream episodes in chunks of at most `chunk_size`, calling `check` after each enqueue
fn stream(
    queue: &mut Queue,
    episodes: &[(usize, Option<Terminal>)],
    chunk_size: usize,
    mut check: impl FnMut(&Queue, usize) -> TestCaseResult,
) -> TestCaseResult {
    let mut written = 0;
    for &(length, ending) in episodes {
        let mut remaining = length;
        while remaining > 0 {
            let len = remaining.min(chunk_size);
            remaining -= len;
            let flag = if remaining == 0 { ending } else { None };
            queue.enqueue(&chunk(written, len, flag)).unwrap();
            written += len;
            check(queue, written)?;
        }
    }
    Ok(())
}

fn assert_no_crossing(windows: &Windows, terminal: &[Terminal]) -> TestCaseResult {
    let capacity = terminal.len();
    for query in 0..windows.len() {
        let window = windows.window(query).unwrap();
        prop_assert!(!window.is_empty());
        for pair in window.windows(2) {
            prop_assert_eq!(pair[1], (pair[0] + 1) % capacity);
        }
        // Only the newest slot of a window may be a boundary
        for &slot in &window[..window.len() - 1] {
            prop_assert!(!terminal[slot].is_boundary(), "window {:?} crosses slot {}", window, slot);
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn boundary_count_matches_episode_count(
        capacity in 1usize..10,
        chunk_size in 1usize..10,
        episodes in episodes_strategy(),
    ) {
        let mut queue = reward_queue(capacity);
        stream(&mut queue, &episodes, chunk_size.min(capacity), |queue, _| {
            let nonzero = queue.terminal().iter().filter(|flag| flag.is_boundary()).count();
            prop_assert_eq!(nonzero, queue.episode_count() + 1);

            let positions = queue.terminal_indices();
            prop_assert_eq!(positions.len(), queue.episode_count() + 1);
            prop_assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
            for &position in &positions {
                prop_assert!(queue.terminal()[queue.slot(position)].is_boundary());
            }
            prop_assert_eq!(positions.last().copied(), Some(queue.buffer_index() - 1));
            prop_assert!(queue.check_consistency().is_ok());
            Ok(())
        })?;
    }

    #[test]
    fn only_latest_timesteps_are_retrievable(
        capacity in 1usize..10,
        chunk_size in 1usize..10,
        episodes in episodes_strategy(),
    ) {
        let mut queue = reward_queue(capacity);
        stream(&mut queue, &episodes, chunk_size.min(capacity), |queue, written| {
            let occupied: Vec<usize> = (0..queue.occupancy()).collect();
            let values = queue.retrieve(&occupied, &[REWARD]).unwrap();
            let reward = values[REWARD].as_tensor().unwrap().as_float().unwrap();

            let mut ids: Vec<usize> = reward.iter().map(|&r| r as usize).collect();
            ids.sort_unstable();
            let expected: Vec<usize> = (written.saturating_sub(capacity)..written).collect();
            prop_assert_eq!(ids, expected);
            Ok(())
        })?;
    }

    #[test]
    fn windows_never_cross_episode_boundaries(
        capacity in 1usize..10,
        chunk_size in 1usize..10,
        horizon in 0usize..12,
        episodes in episodes_strategy(),
    ) {
        let mut queue = reward_queue(capacity);
        stream(&mut queue, &episodes, chunk_size.min(capacity), |queue, _| {
            let starts: Vec<usize> = (0..queue.capacity()).collect();

            let batch = queue.predecessors(&starts, horizon, &[REWARD], &[REWARD]).unwrap();
            assert_no_crossing(&batch.windows, queue.terminal())?;
            prop_assert!(batch.windows.lengths.iter().all(|&len| len <= horizon + 1));
            prop_assert_eq!(batch.windows.starts.len(), starts.len());
            for (query, &start) in starts.iter().enumerate() {
                prop_assert_eq!(batch.windows.window(query).unwrap().last().copied(), Some(start));
            }

            let batch = queue.successors(&starts, horizon, &[REWARD], &[REWARD]).unwrap();
            assert_no_crossing(&batch.windows, queue.terminal())?;
            prop_assert!(batch.windows.lengths.iter().all(|&len| len <= horizon + 1));
            for (query, &start) in starts.iter().enumerate() {
                prop_assert_eq!(batch.windows.window(query).unwrap().first().copied(), Some(start));
            }
            Ok(())
        })?;
    }

    #[test]
    fn retrieve_returns_what_was_written(
        capacity in 1usize..10,
        episodes in episodes_strategy(),
    ) {
        let mut queue = reward_queue(capacity);
        stream(&mut queue, &episodes, capacity, |queue, written| {
            let newest = queue.slot(queue.buffer_index() - 1);
            let values = queue.retrieve(&[newest], &[REWARD]).unwrap();
            let reward = values[REWARD].as_tensor().unwrap().as_float().unwrap();
            prop_assert_eq!(reward[0] as usize, written - 1);
            Ok(())
        })?;
    }
}
