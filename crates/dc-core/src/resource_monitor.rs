//! Background CPU/memory sampling and degraded-mode tracking (§4.L).

use crate::config::ResilienceConfig;
use crate::types::ResourceSnapshot;
use std::sync::{Arc, RwLock};
use sysinfo::System;
use tokio::sync::watch;

pub struct ResourceMonitor {
    snapshot: Arc<RwLock<ResourceSnapshot>>,
    shutdown: watch::Sender<bool>,
}

impl ResourceMonitor {
    /// Spawn the sampling loop on the current tokio runtime. The
    /// returned handle's `Drop` does not stop the loop; call `shutdown`
    /// explicitly so the loop exits within one sample interval.
    pub fn spawn(config: ResilienceConfig) -> Self {
        let snapshot = Arc::new(RwLock::new(ResourceSnapshot::default()));
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let snapshot_for_task = snapshot.clone();
        tokio::spawn(async move {
            let mut system = System::new_all();
            let interval = std::time::Duration::from_secs(config.resource_sample_interval_secs);
            loop {
                system.refresh_cpu_usage();
                system.refresh_memory();
                let cpu_percent = system.global_cpu_usage();
                let memory_percent = if system.total_memory() > 0 {
                    (system.used_memory() as f64 / system.total_memory() as f64 * 100.0) as f32
                } else {
                    0.0
                };
                let degraded = cpu_percent >= config.cpu_usage_threshold
                    || memory_percent >= config.memory_usage_threshold;

                {
                    let mut guard = snapshot_for_task
                        .write()
                        .expect("resource monitor snapshot lock poisoned");
                    guard.cpu_percent = cpu_percent;
                    guard.memory_percent = memory_percent;
                    guard.degraded = degraded;
                }

                if degraded {
                    tracing::warn!(cpu_percent, memory_percent, "entering degraded mode");
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            snapshot,
            shutdown: shutdown_tx,
        }
    }

    pub fn current(&self) -> ResourceSnapshot {
        *self
            .snapshot
            .read()
            .expect("resource monitor snapshot lock poisoned")
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Fraction of configured concurrency that should be granted while the
/// resource monitor reports degraded mode (§4.L: back off to
/// `degraded_mode_threshold` of `max_concurrent_tasks`).
pub fn effective_concurrency(config: &ResilienceConfig, snapshot: ResourceSnapshot) -> u32 {
    if snapshot.degraded {
        let reduced = (config.max_concurrent_tasks as f32 * config.degraded_mode_threshold) as u32;
        reduced.max(1)
    } else {
        config.max_concurrent_tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_concurrency_is_unchanged_when_not_degraded() {
        let config = ResilienceConfig::default();
        let snapshot = ResourceSnapshot::default();
        assert_eq!(effective_concurrency(&config, snapshot), config.max_concurrent_tasks);
    }

    #[test]
    fn effective_concurrency_backs_off_when_degraded() {
        let config = ResilienceConfig::default();
        let snapshot = ResourceSnapshot {
            cpu_percent: 95.0,
            memory_percent: 50.0,
            degraded: true,
        };
        let reduced = effective_concurrency(&config, snapshot);
        assert!(reduced < config.max_concurrent_tasks);
        assert!(reduced >= 1);
    }

    #[tokio::test]
    async fn monitor_reports_a_snapshot_after_spawn() {
        let mut config = ResilienceConfig::default();
        config.resource_sample_interval_secs = 0;
        let monitor = ResourceMonitor::spawn(config);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let snapshot = monitor.current();
        assert!(snapshot.cpu_percent >= 0.0);
        monitor.shutdown();
    }
}
