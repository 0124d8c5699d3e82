// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scoped worker fan-out.
//!
//! Workers claim item indices from a shared counter until none remain. Each
//! worker returns `(index, result)` pairs; results are put back into input
//! order before returning, so callers observe the same sequence regardless of
//! worker count or scheduling.
use std::sync::atomic::{AtomicUsize, Ordering};

/// Worker count to use when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Evaluates `job(i)` for every `i < len` on up to `workers` threads and
/// returns the results in index order.
///
/// With one worker (or at most one item) the jobs run on the calling thread.
pub fn fan_out<T, F>(len: usize, workers: usize, job: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let workers = workers.clamp(1, len.max(1));
    if workers == 1 {
        return (0..len).map(job).collect();
    }

    let next_item = AtomicUsize::new(0);
    let mut tagged: Vec<(usize, T)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let next_item = &next_item;
                let job = &job;
                s.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let i = next_item.fetch_add(1, Ordering::Relaxed);
                        if i >= len {
                            break;
                        }
                        done.push((i, job(i)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(done) => done,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    });
    tagged.sort_unstable_by_key(|(i, _)| *i);
    tagged.into_iter().map(|(_, t)| t).collect()
}
