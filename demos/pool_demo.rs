//! # Demo: two pools, retries, and progress logging.
//!
//! A `mail` pool runs flaky jobs that succeed after a couple of retries; a
//! bounded `thumbs` pool refuses work once its queue is full.
//!
//! Run with `RUST_LOG=debug cargo run --example pool_demo`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use jobvisor::{
    AfterHandle, FailedHandle, JobError, JobFn, JobRef, LogWriter, MemoryDriver, PoolOption,
    QueueDriver, TOPIC_AFTER_HANDLE, TOPIC_FAILED_HANDLE, WorkerPoolManager, clause,
};

/// Job that fails `failures` times before succeeding.
fn flaky(name: String, failures: u32) -> JobRef {
    let calls = Arc::new(AtomicU32::new(0));
    JobFn::arc(name, move |_ctx: CancellationToken| {
        let calls = Arc::clone(&calls);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                return Err(JobError::fail("smtp unavailable"));
            }
            Ok(())
        }
    })
}

/// Job that honours cancellation while it works.
fn resize(id: u32) -> JobRef {
    JobFn::arc(format!("resize-{id}"), |ctx: CancellationToken| async move {
        tokio::select! {
            _ = ctx.cancelled() => Err(JobError::fatal("cancelled")),
            _ = tokio::time::sleep(Duration::from_millis(100)) => Ok(()),
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let manager = WorkerPoolManager::new();
    manager.bus().subscribe(&LogWriter::new().with_progress())?;
    manager.bus().on_topic(
        TOPIC_AFTER_HANDLE,
        clause(|ev| {
            if let Some(done) = ev.downcast_ref::<AfterHandle>() {
                println!("[done] {}", done.job.name());
            }
            true
        }),
    )?;
    manager.bus().on_topic(
        TOPIC_FAILED_HANDLE,
        clause(|ev| {
            if let Some(failed) = ev.downcast_ref::<FailedHandle>() {
                println!("[failed] {} ({})", failed.job.name(), failed.error);
            }
            true
        }),
    )?;

    let (mail, _) = manager.create(
        "mail",
        Arc::new(MemoryDriver::new()),
        [
            PoolOption::MaxWorkers(3),
            PoolOption::JobMaxAttempts(3),
            PoolOption::JobRetryDelay(Duration::from_millis(20)),
            PoolOption::JobRetryDelayStep(Duration::from_millis(20)),
        ],
    );
    let (thumbs, _) = manager.create(
        "thumbs",
        Arc::new(QueueDriver::new(4)),
        [
            PoolOption::MaxWorkers(2),
            PoolOption::JobMaxExecuteTimePerAttempt(Duration::from_secs(1)),
        ],
    );

    manager.start_all().await;

    for i in 0..6 {
        mail.dispatch(flaky(format!("mail-{i}"), i % 4));
    }
    let refused = (0..10).filter(|i| !thumbs.dispatch(resize(*i))).count();
    println!("[thumbs] refused {refused} jobs");

    tokio::time::sleep(Duration::from_secs(2)).await;
    for name in manager.names() {
        if let Some(pool) = manager.get(&name) {
            println!("[{name}] {:?}", pool.progress());
        }
    }

    manager.release_all().await;
    Ok(())
}
