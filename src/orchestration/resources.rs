//! # Process Resource Sampling
//!
//! Samples process memory, process CPU and free disk space for admission control,
//! and tracks peaks/averages across a run with a background [`ResourceMonitor`].

use crate::config::ResourceLimitsConfig;
use crate::constants::RESOURCE_LIMITS_EXCEEDED;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Disks, Pid, Process, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = BYTES_PER_MB * 1024.0;

/// Point-in-time process resource reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Resident memory of this process
    pub memory_mb: f64,
    /// CPU usage of this process (100.0 = one full core)
    pub cpu_percent: f64,
    /// Free space on the working directory's disk; `None` when unknown
    pub free_disk_gb: Option<f64>,
}

impl ResourceSnapshot {
    pub fn new(memory_mb: f64, cpu_percent: f64, free_disk_gb: Option<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            memory_mb,
            cpu_percent,
            free_disk_gb,
        }
    }

    /// Reading used when sampling itself failed
    pub fn unavailable() -> Self {
        Self::new(0.0, 0.0, None)
    }
}

/// Admission outcome for a task about to start
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    /// Start immediately
    Accept,
    /// Start after a short pause
    Throttle { delay: Duration },
    /// Do not start; the task fails with `reason`
    Reject { reason: String },
}

/// Memory and disk breaches reject; high CPU only throttles
pub fn evaluate_admission(
    snapshot: &ResourceSnapshot,
    limits: &ResourceLimitsConfig,
) -> AdmissionDecision {
    let mut breaches = Vec::new();
    if snapshot.memory_mb > limits.max_memory_mb {
        breaches.push(format!(
            "memory {:.0} MB > {:.0} MB",
            snapshot.memory_mb, limits.max_memory_mb
        ));
    }
    if let Some(free) = snapshot.free_disk_gb {
        if free < limits.min_free_disk_gb {
            breaches.push(format!(
                "free disk {:.2} GB < {:.2} GB",
                free, limits.min_free_disk_gb
            ));
        }
    }

    if !breaches.is_empty() {
        return AdmissionDecision::Reject {
            reason: format!("{RESOURCE_LIMITS_EXCEEDED}: {}", breaches.join(", ")),
        };
    }

    if snapshot.cpu_percent > limits.max_cpu_percent {
        return AdmissionDecision::Throttle {
            delay: limits.cpu_backoff(),
        };
    }

    AdmissionDecision::Accept
}

/// Source of resource readings
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn sample(&self) -> ResourceSnapshot;
}

/// [`ResourceProbe`] reading the current process through `sysinfo`
#[derive(Debug, Clone)]
pub struct SystemResourceSampler {
    system: Arc<Mutex<System>>,
    pid: Option<Pid>,
    disk_path: PathBuf,
}

impl Default for SystemResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemResourceSampler {
    pub fn new() -> Self {
        let disk_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self::for_path(disk_path)
    }

    /// Sampler reporting free space for the disk holding `path`
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| warn!(error = %e, "Unable to determine current pid"))
            .ok();

        Self {
            system: Arc::new(Mutex::new(System::new_with_specifics(RefreshKind::nothing()))),
            pid,
            disk_path: path.into(),
        }
    }

    fn read(system: &Mutex<System>, pid: Option<Pid>, disk_path: &Path) -> ResourceSnapshot {
        let (memory_mb, cpu_percent) = match pid {
            Some(pid) => {
                let mut system = system.lock();
                system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    false,
                    ProcessRefreshKind::nothing().with_memory().with_cpu(),
                );
                let memory = system.process(pid).map(Process::memory).unwrap_or(0);
                let cpu = system.process(pid).map(Process::cpu_usage).unwrap_or(0.0);
                (memory as f64 / BYTES_PER_MB, f64::from(cpu))
            }
            None => (0.0, 0.0),
        };

        ResourceSnapshot::new(memory_mb, cpu_percent, Self::free_disk_gb(disk_path))
    }

    /// Free space of the disk with the longest mount point containing `path`
    fn free_disk_gb(path: &Path) -> Option<f64> {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space() as f64 / BYTES_PER_GB)
    }
}

#[async_trait]
impl ResourceProbe for SystemResourceSampler {
    async fn sample(&self) -> ResourceSnapshot {
        let system = self.system.clone();
        let pid = self.pid;
        let disk_path = self.disk_path.clone();

        match tokio::task::spawn_blocking(move || Self::read(&system, pid, &disk_path)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Resource sampling task failed");
                ResourceSnapshot::unavailable()
            }
        }
    }
}

/// Peak and average usage over a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsageSummary {
    pub peak_memory_mb: f64,
    pub avg_memory_mb: f64,
    pub peak_cpu_percent: f64,
    pub avg_cpu_percent: f64,
    pub min_free_disk_gb: Option<f64>,
    pub samples: usize,
}

#[derive(Debug, Default)]
struct UsageAccumulator {
    memory_sum: f64,
    cpu_sum: f64,
    summary: ResourceUsageSummary,
}

impl UsageAccumulator {
    fn add(&mut self, snapshot: &ResourceSnapshot) {
        let summary = &mut self.summary;
        summary.samples += 1;
        self.memory_sum += snapshot.memory_mb;
        self.cpu_sum += snapshot.cpu_percent;
        summary.peak_memory_mb = summary.peak_memory_mb.max(snapshot.memory_mb);
        summary.peak_cpu_percent = summary.peak_cpu_percent.max(snapshot.cpu_percent);
        summary.avg_memory_mb = self.memory_sum / summary.samples as f64;
        summary.avg_cpu_percent = self.cpu_sum / summary.samples as f64;
        if let Some(free) = snapshot.free_disk_gb {
            summary.min_free_disk_gb = Some(summary.min_free_disk_gb.map_or(free, |m| m.min(free)));
        }
    }
}

/// Background sampler bracketing one orchestration run
pub struct ResourceMonitor {
    accumulator: Arc<Mutex<UsageAccumulator>>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("samples", &self.accumulator.lock().summary.samples)
            .finish()
    }
}

impl ResourceMonitor {
    /// Take an initial sample, then keep sampling every `interval` until stopped
    pub fn start(probe: Arc<dyn ResourceProbe>, interval: Duration) -> Self {
        let accumulator = Arc::new(Mutex::new(UsageAccumulator::default()));
        let (stop, mut stopped) = watch::channel(false);
        let task_accumulator = accumulator.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snapshot = probe.sample().await;
                        task_accumulator.lock().add(&snapshot);
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Resource monitor stopped");
        });

        Self {
            accumulator,
            stop,
            handle,
        }
    }

    /// Current summary without stopping
    pub fn current(&self) -> ResourceUsageSummary {
        self.accumulator.lock().summary.clone()
    }

    /// Stop sampling, take a closing sample and return the summary
    pub async fn stop(self, probe: &dyn ResourceProbe) -> ResourceUsageSummary {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Resource monitor task ended abnormally");
        }

        let closing = probe.sample().await;
        let mut accumulator = self.accumulator.lock();
        accumulator.add(&closing);
        accumulator.summary.clone()
    }
}
