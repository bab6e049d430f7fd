// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential or bounded-parallel execution of independent tasks.

use crate::domain::{ConfigError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Default number of worker threads for parallel fetch and resolve.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Runs `task` once per item and returns the outputs in item order.
///
/// With `parallel` set, at most `max_workers` scoped threads pull items from a shared
/// index; otherwise everything runs on the calling thread. The first error (in item
/// order) is returned and stops workers from picking up further items.
pub(crate) fn run_tasks<I, O, F>(
    items: &[I],
    parallel: bool,
    max_workers: usize,
    task: F,
) -> Result<Vec<O>>
where
    I: Sync,
    O: Send,
    F: Fn(&I) -> Result<O> + Sync,
{
    let workers = max_workers.max(1).min(items.len());
    if !parallel || workers <= 1 {
        return items.iter().map(&task).collect();
    }

    tracing::trace!(tasks = items.len(), workers, "running tasks in parallel");

    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let slots: Vec<Mutex<Option<Result<O>>>> = items.iter().map(|_| Mutex::new(None)).collect();

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                if failed.load(Ordering::SeqCst) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(item) = items.get(index) else {
                    break;
                };
                let result = task(item);
                if result.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                *slots[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
            });
        }
    });

    let mut outputs = Vec::with_capacity(items.len());
    for slot in slots {
        match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(Ok(output)) => outputs.push(output),
            Some(Err(e)) => return Err(e),
            // skipped after another task failed
            None => {}
        }
    }

    if outputs.len() != items.len() {
        return Err(ConfigError::illegal_state(
            "parallel task run ended without completing every task",
        ));
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn test_sequential_preserves_order() {
        let items = vec![1, 2, 3];
        let out = run_tasks(&items, false, 4, |i| Ok(i * 10)).unwrap();
        assert_eq!(out, vec![10, 20, 30]);
    }

    #[test]
    fn test_parallel_preserves_order() {
        let items: Vec<u64> = (0..20).collect();
        let out = run_tasks(&items, true, 4, |i| {
            // Later items finish first
            thread::sleep(Duration::from_millis(20 - i));
            Ok(*i)
        })
        .unwrap();
        assert_eq!(out, items);
    }

    #[test]
    fn test_parallel_uses_several_threads() {
        let items: Vec<u32> = (0..8).collect();
        let seen = Mutex::new(HashSet::new());
        run_tasks(&items, true, 4, |_| {
            seen.lock().unwrap().insert(thread::current().id());
            thread::sleep(Duration::from_millis(20));
            Ok(())
        })
        .unwrap();
        assert!(seen.lock().unwrap().len() > 1);
    }

    #[test]
    fn test_error_is_returned() {
        let items = vec![1, 2, 3];
        for parallel in [false, true] {
            let err = run_tasks(&items, parallel, 2, |i| {
                if *i == 2 {
                    Err(ConfigError::illegal_state("boom"))
                } else {
                    Ok(*i)
                }
            })
            .unwrap_err();
            assert!(err.is_illegal_state());
        }
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<u8> = Vec::new();
        assert!(run_tasks(&items, true, 4, |i| Ok(*i)).unwrap().is_empty());
    }
}
