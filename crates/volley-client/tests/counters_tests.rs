use std::sync::Arc;
use std::thread;

use volley_client::Counters;

#[test]
fn concurrent_increments_are_never_lost() {
    let counters = Counters::new();
    let threads = 8;
    let per_thread = 10_000;

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                for n in 0..per_thread {
                    counters.increment_sent();
                    // Roughly every third request gets an answer.
                    if (n + i) % 3 == 0 {
                        counters.increment_received();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let snap = counters.snapshot();
    assert_eq!(snap.sent, (threads * per_thread) as u64);

    let expected_received: u64 = (0..threads)
        .map(|i| (0..per_thread).filter(|n| (n + i) % 3 == 0).count() as u64)
        .sum();
    assert_eq!(snap.received, expected_received);
}

#[test]
fn failure_counters_are_independent() {
    let counters = Counters::new();
    counters.increment_timeouts();
    counters.increment_timeouts();
    counters.increment_read_errors();
    counters.increment_send_failures();
    counters.increment_connect_failures();

    let snap = counters.snapshot();
    assert_eq!(snap.sent, 0);
    assert_eq!(snap.received, 0);
    assert_eq!(snap.timeouts, 2);
    assert_eq!(snap.read_errors, 1);
    assert_eq!(snap.send_failures, 1);
    assert_eq!(snap.connect_failures, 1);
    assert_eq!(snap.active_links, 0);
}
