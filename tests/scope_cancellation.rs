//! Cancellation semantics, driven deterministically on the lab runtime.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskscope::{CancelKind, LabRuntime, Outcome, TaskState, Time};

#[test]
fn cancel_then_join_leaves_all_tasks_terminal() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            scope
                .spawn(|cx| async move {
                    for _ in 0..1_000 {
                        cx.sleep(Duration::from_millis(10)).await?;
                    }
                    Ok(())
                })
                .unwrap()
        })
        .collect();

    // Let every task reach its first sleep.
    lab.run_until(Time::from_millis(5));
    scope.cancel_all();
    lab.run_until_quiescent();

    assert!(!scope.is_active());
    for handle in handles {
        assert_eq!(handle.state(), TaskState::Cancelled);
        let outcome = handle.try_outcome().unwrap();
        assert!(outcome.is_cancelled());
    }
}

#[test]
fn cancel_twice_has_no_additional_effect() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();

    let handle = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_secs(1)).await?;
            Ok(())
        })
        .unwrap();

    lab.run_until(Time::from_millis(1));
    scope.cancel_all();
    scope.cancel_all();
    lab.run_until_quiescent();

    assert_eq!(handle.state(), TaskState::Cancelled);
    match handle.try_outcome().unwrap() {
        Outcome::Cancelled(reason) => assert_eq!(reason.kind(), CancelKind::User),
        other => panic!("expected cancelled outcome, got {other}"),
    }
}

#[test]
fn task_without_checkpoints_completes_despite_cancellation() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();
    let counter = Arc::new(AtomicU32::new(0));

    let counter_clone = Arc::clone(&counter);
    let handle = scope
        .spawn(move |_cx| async move {
            // No checkpoint anywhere: cancellation cannot interrupt this.
            for _ in 0..100 {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        })
        .unwrap();

    scope.cancel_all();
    lab.run_until_quiescent();

    assert_eq!(handle.state(), TaskState::Completed);
    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn checkpoint_observes_cancellation_and_unwinds() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();
    let progress = Arc::new(AtomicU32::new(0));

    let progress_clone = Arc::clone(&progress);
    let handle = scope
        .spawn(move |cx| async move {
            for i in 0..100 {
                cx.checkpoint()?;
                progress_clone.store(i + 1, Ordering::SeqCst);
                cx.sleep(Duration::from_millis(10)).await?;
            }
            Ok(())
        })
        .unwrap();

    // Three iterations pass, then cancellation lands.
    lab.run_until(Time::from_millis(25));
    assert_eq!(progress.load(Ordering::SeqCst), 3);
    scope.cancel_all();
    lab.run_until_quiescent();

    assert_eq!(handle.state(), TaskState::Cancelled);
    // The task stopped inside its third sleep; no further progress.
    assert_eq!(progress.load(Ordering::SeqCst), 3);
}

#[test]
fn slow_task_is_cancelled_while_fast_one_completed() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();

    let fast = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_millis(500)).await?;
            Ok("fast")
        })
        .unwrap();
    let slow = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_millis(2000)).await?;
            Ok("slow")
        })
        .unwrap();

    lab.run_until(Time::from_millis(600));
    assert_eq!(fast.state(), TaskState::Completed);
    assert_eq!(slow.state(), TaskState::Suspended);

    scope.cancel_all();
    lab.run_until_quiescent();

    assert_eq!(fast.try_outcome().unwrap().unwrap(), "fast");
    assert_eq!(slow.state(), TaskState::Cancelled);
}

#[test]
fn spawn_into_cancelled_scope_is_refused() {
    common::init_test_logging();
    let lab = LabRuntime::new();
    let scope = lab.new_scope();

    scope.cancel_all();

    let err = scope.spawn(|_cx| async { Ok(()) }).unwrap_err();
    assert!(err.is_scope_closed());
    assert!(scope.child().unwrap_err().is_scope_closed());
}

#[test]
fn cancel_fans_out_to_child_scopes() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let parent = lab.new_scope();
    let child = parent.child().unwrap();

    let inner = child
        .spawn(|cx| async move {
            cx.sleep(Duration::from_secs(10)).await?;
            Ok(())
        })
        .unwrap();

    lab.run_until(Time::from_millis(1));
    parent.cancel_all();
    lab.run_until_quiescent();

    assert!(child.is_cancelled());
    assert_eq!(inner.state(), TaskState::Cancelled);
    match inner.try_outcome().unwrap() {
        Outcome::Cancelled(reason) => {
            assert_eq!(reason.kind(), CancelKind::ParentCancelled);
        }
        other => panic!("expected cancelled outcome, got {other}"),
    }
}

#[test]
fn failure_does_not_cancel_siblings() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();

    let failing = scope
        .spawn(|_cx| async { Err::<(), _>(taskscope::Error::user("boom")) })
        .unwrap();
    let sibling = scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_millis(100)).await?;
            Ok(7)
        })
        .unwrap();

    lab.run_until_quiescent();

    assert_eq!(failing.state(), TaskState::Failed);
    assert_eq!(sibling.state(), TaskState::Completed);
    assert_eq!(sibling.try_outcome().unwrap().unwrap(), 7);
}

#[test]
fn panicking_task_fails_without_poisoning_the_runtime() {
    common::init_test_logging();

    fn boom() -> taskscope::Result<u32> {
        panic!("task blew up")
    }

    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();

    let panicking = scope.spawn(|_cx| async { boom() }).unwrap();
    let survivor = scope.spawn(|_cx| async { Ok(1) }).unwrap();

    lab.run_until_quiescent();

    assert_eq!(panicking.state(), TaskState::Failed);
    assert!(panicking.try_outcome().unwrap().is_failed());
    assert_eq!(survivor.try_outcome().unwrap().unwrap(), 1);
}

#[test]
fn awaiting_another_task_observes_own_scope_cancellation() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let waiting_scope = lab.new_scope();
    let worker_scope = lab.new_scope();
    let completions = Arc::new(AtomicU32::new(0));

    let completions_clone = Arc::clone(&completions);
    let target = worker_scope
        .spawn(move |cx| async move {
            cx.sleep(Duration::from_secs(10)).await?;
            completions_clone.fetch_add(1, Ordering::SeqCst);
            Ok(5)
        })
        .unwrap();

    let waiter = waiting_scope
        .spawn(move |cx| async move {
            let outcome = cx.await_task(target).await?;
            outcome.into_result()
        })
        .unwrap();

    lab.run_until(Time::from_millis(10));
    assert_eq!(waiter.state(), TaskState::Suspended);
    waiting_scope.cancel_all();
    lab.run_until_quiescent();

    // The waiter unwound at its await checkpoint instead of riding out the
    // target's ten-second sleep; the target was untouched.
    assert_eq!(waiter.state(), TaskState::Cancelled);
    assert!(waiter.try_outcome().unwrap().is_cancelled());
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[test]
fn joining_another_scope_observes_own_scope_cancellation() {
    common::init_test_logging();
    let mut lab = LabRuntime::new();
    let waiting_scope = lab.new_scope();
    let worker_scope = lab.new_scope();

    worker_scope
        .spawn(|cx| async move {
            cx.sleep(Duration::from_secs(10)).await?;
            Ok(())
        })
        .unwrap();

    let joined = worker_scope.clone();
    let waiter = waiting_scope
        .spawn(move |cx| async move {
            cx.join(&joined).await?;
            Ok(())
        })
        .unwrap();

    lab.run_until(Time::from_millis(10));
    waiting_scope.cancel_all();
    lab.run_until_quiescent();

    assert_eq!(waiter.state(), TaskState::Cancelled);
    // The joined scope ran its task to completion regardless.
    assert!(!worker_scope.is_cancelled());
    assert!(!worker_scope.is_active());
}

#[test]
fn cancelled_task_releases_scoped_resources() {
    common::init_test_logging();

    struct Guard(Arc<AtomicU32>);
    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicU32::new(0));
    let mut lab = LabRuntime::new();
    let scope = lab.new_scope();

    let drops_clone = Arc::clone(&drops);
    let handle = scope
        .spawn(move |cx| async move {
            let _guard = Guard(drops_clone);
            for _ in 0..1_000 {
                cx.sleep(Duration::from_millis(10)).await?;
            }
            Ok(())
        })
        .unwrap();

    lab.run_until(Time::from_millis(5));
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    scope.cancel_all();
    lab.run_until_quiescent();

    assert_eq!(handle.state(), TaskState::Cancelled);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}
