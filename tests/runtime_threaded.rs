//! End-to-end tests on the threaded runtime over the wall clock.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskscope::{Runtime, RuntimeBuilder, TaskState};

#[test]
fn tasks_run_concurrently_not_sequentially() {
    common::init_test_logging();
    let runtime = RuntimeBuilder::new().worker_threads(4).build();
    let scope = runtime.new_scope();

    let start = Instant::now();
    let a = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_millis(100)).await?;
            Ok(42)
        })
        .unwrap();
    let b = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_millis(100)).await?;
            Ok(10)
        })
        .unwrap();

    runtime.block_on(scope.join());
    let elapsed = start.elapsed();

    assert_eq!(a.try_outcome().unwrap().unwrap(), 42);
    assert_eq!(b.try_outcome().unwrap().unwrap(), 10);
    // Both slept in parallel; well under the 200ms a serial run would take.
    assert!(
        elapsed < Duration::from_millis(190),
        "took {elapsed:?}, expected concurrent sleeps"
    );
}

#[test]
fn more_tasks_than_workers_all_complete() {
    common::init_test_logging();
    let runtime = RuntimeBuilder::new().worker_threads(2).build();
    let scope = runtime.new_scope();
    let done = Arc::new(AtomicU32::new(0));

    for _ in 0..32 {
        let done = Arc::clone(&done);
        scope
            .spawn(move |cx| async move {
                cx.sleep(Duration::from_millis(5)).await?;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    runtime.block_on(scope.join());
    assert_eq!(done.load(Ordering::SeqCst), 32);
}

#[test]
fn cancel_all_stops_sleepers_promptly() {
    common::init_test_logging();
    let runtime = Runtime::new();
    let scope = runtime.new_scope();

    let handle = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_secs(3600)).await?;
            Ok(())
        })
        .unwrap();

    // Give the task a moment to reach its sleep.
    std::thread::sleep(Duration::from_millis(20));
    let start = Instant::now();
    scope.cancel_all();
    runtime.block_on(scope.join());

    assert_eq!(handle.state(), TaskState::Cancelled);
    // The hour-long sleep was interrupted at the cancellation checkpoint.
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn block_on_task_handle_returns_its_outcome() {
    common::init_test_logging();
    let runtime = Runtime::new();
    let scope = runtime.new_scope();

    let handle = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_millis(10)).await?;
            Ok(String::from("done"))
        })
        .unwrap();

    let outcome = runtime.block_on(handle);
    assert_eq!(outcome.unwrap(), "done");
}

#[test]
fn runtime_drop_cancels_and_joins_outstanding_work() {
    common::init_test_logging();
    let handle = {
        let runtime = Runtime::new();
        let scope = runtime.new_scope();
        let handle = scope
            .spawn(|cx| async move {
                cx.sleep(Duration::from_secs(3600)).await?;
                Ok(())
            })
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        handle
        // Runtime dropped here: shutdown cancellation, workers joined.
    };

    assert_eq!(handle.state(), TaskState::Cancelled);
    assert!(handle.try_outcome().unwrap().is_cancelled());
}

#[test]
fn single_worker_interleaves_suspended_tasks() {
    common::init_test_logging();
    let runtime = RuntimeBuilder::new().worker_threads(1).build();
    let scope = runtime.new_scope();
    let done = Arc::new(AtomicU32::new(0));

    // With one worker, progress on all of these requires that a sleeping
    // task actually releases the worker.
    for _ in 0..8 {
        let done = Arc::clone(&done);
        scope
            .spawn(move |cx| async move {
                for _ in 0..3 {
                    cx.sleep(Duration::from_millis(2)).await?;
                }
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    runtime.block_on(scope.join());
    assert_eq!(done.load(Ordering::SeqCst), 8);
}
