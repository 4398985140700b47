use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use txlog_core::{Level, LogSession, ManualClock, MessageRecord, Options};

/// Helper: a session on a manual clock whose records land in a channel.
fn capture(clock: &ManualClock, options: Options) -> (LogSession, mpsc::Receiver<MessageRecord>) {
    let (tx, rx) = mpsc::channel();
    let session = LogSession::builder()
        .options(options)
        .clock(clock.clone())
        .callback(move |record| {
            let _ = tx.send(record);
        })
        .build()
        .unwrap();
    (session, rx)
}

// ============================================================
// Verbosity filtering
// ============================================================

#[test]
fn test_entry_kept_iff_level_within_threshold() {
    let thresholds: [u32; 6] = [10, 20, 25, 30, 40, 100];
    let levels: [u32; 7] = [1, 10, 20, 30, 35, 40, 50];

    for threshold in thresholds {
        let clock = ManualClock::new(0.0);
        let (session, rx) = capture(&clock, Options::default().with_verbosity(threshold));
        for level in levels {
            session.log(level, [level]);
        }
        drop(session);

        let record = rx.recv().unwrap();
        let kept: Vec<u32> = record.logs.iter().map(|entry| entry.level.0).collect();
        let expected: Vec<u32> = levels.into_iter().filter(|l| *l <= threshold).collect();
        assert_eq!(kept, expected, "threshold {}", threshold);
    }
}

#[test]
fn test_lazy_payload_only_runs_when_kept() {
    let clock = ManualClock::new(0.0);
    let (session, rx) = capture(&clock, Options::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    session.debug_with(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        vec![json!("expensive")]
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let counter = calls.clone();
    session.log_with(Level::WARN, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        vec![json!("cheap enough"), json!({"retries": 3})]
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    drop(session);

    let record = rx.recv().unwrap();
    assert_eq!(record.logs.len(), 1);
    assert_eq!(record.logs[0].level, Level::WARN);
    assert_eq!(
        record.logs[0].items,
        vec![json!("cheap enough"), json!({"retries": 3})]
    );
}

#[test]
fn test_default_threshold_is_info() {
    let clock = ManualClock::new(0.0);
    let session = LogSession::builder()
        .clock(clock)
        .callback(|_| {})
        .build()
        .unwrap();
    assert_eq!(session.verbosity(), Some(Level::INFO));
    assert!(session.enabled(Level::INFO));
    assert!(!session.enabled(Level::DEBUG));
}

#[test]
fn test_unfiltered_session_keeps_everything() {
    let clock = ManualClock::new(0.0);
    let (session, rx) = capture(&clock, Options::unfiltered());
    session.debug(["d"]);
    session.log(Level(1000), ["very verbose"]);
    drop(session);

    assert_eq!(rx.recv().unwrap().logs.len(), 2);
}

#[test]
fn test_named_verbosity_from_builder() {
    let clock = ManualClock::new(0.0);
    let (tx, rx) = mpsc::channel();
    let session = LogSession::builder()
        .verbosity("warn")
        .unwrap()
        .clock(clock)
        .callback(move |record| {
            let _ = tx.send(record);
        })
        .build()
        .unwrap();
    session.error(["e"]);
    session.warn(["w"]);
    session.info(["i"]);
    drop(session);

    let record = rx.recv().unwrap();
    let levels: Vec<Level> = record.logs.iter().map(|entry| entry.level).collect();
    assert_eq!(levels, vec![Level::ERROR, Level::WARN]);
}

#[test]
fn test_logs_keep_call_order() {
    let clock = ManualClock::new(0.0);
    let (session, rx) = capture(&clock, Options::default());
    for i in 0..5 {
        clock.advance(0.5);
        session.info([json!(i)]);
    }
    drop(session);

    let record = rx.recv().unwrap();
    let items: Vec<i64> = record
        .logs
        .iter()
        .map(|entry| entry.items[0].as_i64().unwrap())
        .collect();
    assert_eq!(items, vec![0, 1, 2, 3, 4]);
    let offsets: Vec<f64> = record.logs.iter().map(|entry| entry.offset).collect();
    assert_eq!(offsets, vec![0.5, 1.0, 1.5, 2.0, 2.5]);
}

// ============================================================
// Finalization
// ============================================================

#[test]
fn test_callback_runs_once_whatever_the_release_order() {
    for order in [[0, 1, 2], [2, 1, 0], [1, 0, 2], [2, 0, 1]] {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let session = LogSession::builder()
            .clock(ManualClock::new(0.0))
            .callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        let mut clones: Vec<Option<LogSession>> =
            vec![Some(session.clone()), Some(session.clone()), Some(session)];
        for index in order {
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            clones[index].take();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_leaked_clone_never_delivers() {
    let clock = ManualClock::new(10.0);
    let (session, rx) = capture(&clock, Options::default());
    clock.advance(0.1);
    let closed = session.timer("closed").unwrap();
    clock.advance(0.1);
    closed.stop();
    let leaked = session.timer("leaked").unwrap();
    std::mem::forget(session.clone());
    drop(leaked);
    drop(session);

    // One clone was leaked, so nothing is delivered.
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_every_timer_closed_after_finalize() {
    let clock = ManualClock::new(10.0);
    let (session, rx) = capture(&clock, Options::default());

    let worker = session.clone();
    let outer = session.timer("outer").unwrap();
    clock.advance(0.25);
    let inner = worker.timer("inner").unwrap();
    clock.advance(0.25);
    inner.stop();
    clock.advance(0.5);

    drop(worker);
    drop(session);
    assert!(rx.try_recv().is_err());
    drop(outer);

    let record = rx.recv().unwrap();
    assert_eq!(record.end, Some(1.0));
    for (name, span) in &record.timers {
        let end = span.end.unwrap_or_else(|| panic!("{} left open", name));
        assert!(end >= span.start);
    }
    assert_eq!(record.timer("outer").unwrap().end, record.end);
    assert_eq!(record.timer("inner").unwrap().end, Some(0.5));
}

#[test]
fn test_zero_elapsed_sessions_have_non_negative_end() {
    let clock = ManualClock::new(1_700_000_000.0);
    let (first, first_rx) = capture(&clock, Options::default());
    let (second, second_rx) = capture(&clock, Options::default());
    drop(first);
    drop(second);

    assert_eq!(first_rx.recv().unwrap().end, Some(0.0));
    assert_eq!(second_rx.recv().unwrap().end, Some(0.0));
}

#[test]
fn test_system_clock_session_end_is_non_negative() {
    let slot = Arc::new(Mutex::new(None));
    let sink = slot.clone();
    let session = LogSession::new(
        move |record| {
            *sink.lock().unwrap() = Some(record);
        },
        Options::default(),
    );
    session.info(["quick"]);
    drop(session);

    let record = slot.lock().unwrap().take().unwrap();
    assert!(record.end.unwrap() >= 0.0);
    assert!(record.logs[0].offset >= 0.0);
}

#[test]
fn test_threads_defer_finalize_until_all_finish() {
    let clock = ManualClock::new(0.0);
    let (session, rx) = capture(&clock, Options::default());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let session = session.clone();
            std::thread::spawn(move || {
                let _timer = session.timer(format!("worker {}", i)).unwrap();
                session.info([format!("worker {} done", i)]);
            })
        })
        .collect();
    drop(session);
    for handle in handles {
        handle.join().unwrap();
    }

    let record = rx.recv().unwrap();
    assert_eq!(record.timers.len(), 4);
    assert_eq!(record.logs.len(), 4);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_fan_out_finalizes_after_last_task() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let session = LogSession::builder()
        .clock(ManualClock::new(0.0))
        .callback(move |record| {
            let _ = tx.send(record);
        })
        .build()
        .unwrap();

    let mut tasks = Vec::new();
    for name in ["auth", "profile", "billing"] {
        let session = session.clone();
        tasks.push(tokio::spawn(async move {
            let timer = session.timer(name).unwrap();
            tokio::task::yield_now().await;
            session.event(format!("{} ready", name)).unwrap();
            timer.stop();
        }));
    }
    drop(session);
    for task in tasks {
        task.await.unwrap();
    }

    let record = rx.recv().await.unwrap();
    assert_eq!(record.timers.len(), 3);
    assert_eq!(record.events.len(), 3);
    assert!(rx.try_recv().is_err());
}

// ============================================================
// Names and wire shape
// ============================================================

#[test]
fn test_name_reuse_always_fails() {
    let clock = ManualClock::new(0.0);
    let (session, _rx) = capture(&clock, Options::default());

    let open = session.timer("t").unwrap();
    assert!(session.timer("t").unwrap_err().is_duplicate_name());
    open.stop();
    assert!(session.timer("t").unwrap_err().is_duplicate_name());

    session.event("e").unwrap();
    assert!(session.event("e").unwrap_err().is_duplicate_name());

    // Timers and events are separate namespaces.
    session.event("t").unwrap();
    let _ = session.timer("e").unwrap();
}

#[test]
fn test_sealed_record_wire_shape() {
    let clock = ManualClock::new(100.0);
    let (session, rx) = capture(&clock, Options::default());
    clock.advance(0.5);
    session.info(["hello", "world"]);
    let timer = session.timer("work").unwrap();
    clock.advance(0.25);
    session.event("halfway").unwrap();
    timer.stop();
    session.set("status", 200);
    clock.advance(0.25);
    drop(session);

    let record = rx.recv().unwrap();
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(
        value,
        json!({
            "start": 100.0,
            "end": 1.0,
            "logs": [[0.5, 30, "hello", "world"]],
            "timers": {"work": [0.5, 0.75]},
            "events": {"halfway": 0.75},
            "data": {"status": 200}
        })
    );

    let back: MessageRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, record);
}

// ============================================================
// Data bag
// ============================================================

#[test]
fn test_data_guard_does_not_block_other_operations() {
    let clock = ManualClock::new(0.0);
    let (session, rx) = capture(&clock, Options::default());
    let (done_tx, done_rx) = mpsc::channel();

    let worker = session.clone();
    std::thread::spawn(move || {
        let timer = worker.timer("populate").unwrap();
        let mut data = worker.data();
        data.insert("user".to_string(), json!("ada"));
        worker.info(["populated"]);
        worker.event("populated").unwrap();
        drop(timer);
        data.insert("status".to_string(), json!(200));
        drop(data);
        let _ = done_tx.send(());
    });

    done_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("operations blocked while the data guard was held");
    drop(session);

    let record = rx.recv_timeout(Duration::from_secs(3)).unwrap();
    assert_eq!(record.logs.len(), 1);
    assert!(record.timer("populate").unwrap().end.is_some());
    assert_eq!(record.event("populated"), Some(0.0));
    assert_eq!(record.data["user"], json!("ada"));
    assert_eq!(record.data["status"], json!(200));
}
