//! Signals, periodic tasks and transcripts working together across threads.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use horizon_linewire_core::{Pane, PeriodicTask, Signal, Transcript};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_periodic_emits_into_transcript() {
    let signal = Arc::new(Signal::<String>::new());
    let transcript = Arc::new(Transcript::new());

    let t = transcript.clone();
    signal.connect(move |text| t.push(Pane::Sent, None, text.as_str()));

    let s = signal.clone();
    let mut n = 0;
    let task = PeriodicTask::spawn("emit-test", Duration::from_millis(10), move || {
        n += 1;
        s.emit(format!("tick {n}"));
        if n == 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || !task.is_running()));
    task.join();

    assert_eq!(task.tick_count(), 3);
    assert_eq!(
        transcript.texts(Pane::Sent),
        vec!["tick 1", "tick 2", "tick 3"]
    );
}

#[test]
fn test_scoped_slot_stops_receiving_after_drop() {
    let signal = Arc::new(Signal::<u32>::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let h = hits.clone();
    let guard = signal.connect_scoped(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    let s = signal.clone();
    thread::spawn(move || s.emit(1)).join().unwrap();
    drop(guard);
    signal.emit(2);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(signal.connection_count(), 0);
}

#[test]
fn test_cancel_from_another_thread() {
    let task = Arc::new(
        PeriodicTask::spawn("cancel-test", Duration::from_millis(5), || {
            ControlFlow::Continue(())
        })
        .unwrap(),
    );

    assert!(wait_until(Duration::from_secs(5), || task.tick_count() >= 2));

    let t = task.clone();
    thread::spawn(move || t.cancel()).join().unwrap();
    assert!(!task.is_running());

    let ticks = task.tick_count();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(task.tick_count(), ticks);
}
