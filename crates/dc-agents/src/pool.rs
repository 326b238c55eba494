//! Fixed-size worker pool (§4.K) that drains a [`TaskQueue`], gating
//! each dequeue on the circuit breaker and the resource monitor's
//! effective concurrency.

use crate::queue::TaskQueue;
use dc_core::circuit_breaker::CircuitBreaker;
use dc_core::config::ResilienceConfig;
use dc_core::resource_monitor::{effective_concurrency, ResourceMonitor};
use dc_core::types::{Task, TaskResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs `handler` for every task the queue yields, respecting the
/// resource monitor's current degraded-mode concurrency cap and the
/// circuit breaker's open/half-open state.
pub async fn run<F, Fut>(
    queue: Arc<TaskQueue>,
    resilience: ResilienceConfig,
    breaker: Arc<CircuitBreaker>,
    monitor: Arc<ResourceMonitor>,
    handler: F,
) where
    F: Fn(Task) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    let receiver = queue.receiver();
    let mut handles = Vec::new();

    loop {
        let cap = effective_concurrency(&resilience, monitor.current());
        if cap == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        }

        if !breaker.allow_request() {
            tracing::warn!("circuit breaker open, pausing task pool");
            tokio::time::sleep(Duration::from_millis(200)).await;
            continue;
        }

        if !queue.try_acquire() {
            tokio::time::sleep(Duration::from_millis(20)).await;
            continue;
        }

        let task = match receiver.recv_async().await {
            Ok(task) => task,
            Err(_) => {
                queue.release();
                break;
            }
        };

        let queue = Arc::clone(&queue);
        let breaker = Arc::clone(&breaker);
        let handler = handler.clone();
        let handle = tokio::spawn(async move {
            let result = handler(task).await;
            if result.success {
                breaker.record_success();
            } else {
                breaker.record_failure();
            }
            queue.release();
            result
        });
        handles.push(handle);

        if handles.len() as u32 >= cap {
            for handle in handles.drain(..) {
                let _ = handle.await;
            }
        }
    }

    for handle in handles {
        let _ = handle.await;
    }
}
