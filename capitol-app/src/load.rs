use capitol_core::LoadSample;
use capitol_store::HealthStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Host load in `0.0..=1.0`: the busier of CPU and memory.
pub struct LoadSampler {
    sys: System,
}

impl LoadSampler {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_all();
        Self { sys }
    }

    pub fn sample(&mut self) -> f64 {
        self.sys.refresh_cpu();
        self.sys.refresh_memory();

        let cpu = self.sys.global_cpu_info().cpu_usage() as f64 / 100.0;
        let total = self.sys.total_memory();
        let memory = if total == 0 {
            0.0
        } else {
            self.sys.used_memory() as f64 / total as f64
        };
        cpu.max(memory).clamp(0.0, 1.0)
    }
}

impl Default for LoadSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// Records a load sample every `interval` until the task is aborted. Surge
/// pricing reads the latest one.
pub fn spawn_load_sampler(health: Arc<dyn HealthStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut sampler = LoadSampler::new();
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let load = sampler.sample();
            debug!("Host load {:.2}", load);
            let sample = LoadSample {
                load,
                sampled_at: Utc::now(),
            };
            if let Err(e) = health.record_load(sample).await {
                warn!("Failed to record load sample: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use capitol_store::MemoryStore;

    #[test]
    fn test_sample_is_a_fraction() {
        let mut sampler = LoadSampler::new();
        let load = sampler.sample();
        assert!((0.0..=1.0).contains(&load));
    }

    #[tokio::test]
    async fn test_sampler_records_load() {
        let store = Arc::new(MemoryStore::new());
        let handle = spawn_load_sampler(store.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        let latest = store.latest_load().await.unwrap();
        assert!(latest.is_some());
    }
}
