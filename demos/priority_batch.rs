//! End-to-end tour: priorities, cancellation, events, and drain waiting.
//!
//! Run with: cargo run --example priority_batch

use sluice_rs::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    let scheduler: TaskScheduler<String> = TaskScheduler::with_concurrency(2)?;

    scheduler.on(EventKind::TaskComplete, |event| {
        if let SchedulerEvent::TaskComplete { id, result } = event {
            println!("  [event] {id} completed: {result}");
        }
    });
    scheduler.on(EventKind::TaskError, |event| {
        if let SchedulerEvent::TaskError { id, error } = event {
            println!("  [event] {id} failed: {error}");
        }
    });
    scheduler.on(EventKind::QueueEmpty, |_| {
        println!("  [event] queue drained");
    });

    println!("submitting a mixed batch...");
    for (name, priority, millis) in [
        ("archive-sweep", -5, 40),
        ("page-render", 0, 30),
        ("health-probe", 10, 10),
        ("cache-warm", 0, 20),
    ] {
        scheduler.submit_with_priority(
            async move {
                delay(Duration::from_millis(millis)).await;
                Ok(format!("{name} finished"))
            },
            priority,
        );
    }

    scheduler.submit(async {
        delay(Duration::from_millis(5)).await;
        Err(Error::task_failed("upstream returned 503"))
    });

    let doomed = scheduler.submit_with_priority(
        async { Ok("never runs".to_string()) },
        -100,
    );
    println!("cancelling {doomed}: {}", scheduler.cancel(doomed));

    block_on(scheduler.wait_for_all());

    let stats = scheduler.stats();
    println!(
        "done: {} completed, {} failed, {} cancelled (peak concurrency {})",
        stats.completed,
        stats.failed,
        stats.cancelled,
        scheduler.metrics().peak_running
    );

    Ok(())
}
