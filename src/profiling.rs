//! Timing and memory statistics for training runs
//!
//! Phases (`forward`, `backward`, `step`, `eval`) are timed with
//! [`Instant`]; process memory comes from `sysinfo` snapshots.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, RefreshKind, System};
use tracing::{debug, info};

pub const FORWARD: &str = "forward";
pub const BACKWARD: &str = "backward";
pub const STEP: &str = "step";
pub const EVAL: &str = "eval";

#[derive(Debug, Clone, Copy, Default)]
struct PhaseStats {
    calls: u64,
    total: Duration,
}

/// Resident memory of the current process, in MB, with the peak seen so far
pub struct MemoryMonitor {
    system: System,
    pid: Pid,
    current_mb: u64,
    peak_mb: u64,
}

impl MemoryMonitor {
    /// `None` when the current process cannot be identified
    pub fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut monitor = Self {
            system: System::new_with_specifics(RefreshKind::everything()),
            pid,
            current_mb: 0,
            peak_mb: 0,
        };
        monitor.sample();
        Some(monitor)
    }

    /// Refreshes the snapshot and returns the current usage
    pub fn sample(&mut self) -> u64 {
        self.system.refresh_all();
        if let Some(process) = self.system.process(self.pid) {
            self.current_mb = process.memory() / 1024 / 1024;
            self.peak_mb = self.peak_mb.max(self.current_mb);
        }
        self.current_mb
    }

    pub fn current_mb(&self) -> u64 {
        self.current_mb
    }

    pub fn peak_mb(&self) -> u64 {
        self.peak_mb
    }
}

/// Per-phase call counts and durations
pub struct Profiler {
    phases: BTreeMap<String, PhaseStats>,
    memory: Option<MemoryMonitor>,
    start_time: Instant,
}

impl Profiler {
    /// `track_memory` enables the `sysinfo` snapshots.
    pub fn new(track_memory: bool) -> Self {
        let memory = if track_memory { MemoryMonitor::new() } else { None };
        Self {
            phases: BTreeMap::new(),
            memory,
            start_time: Instant::now(),
        }
    }

    /// Runs `f` and adds its duration to `phase`.
    pub fn time<T>(&mut self, phase: &str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = f();
        self.record(phase, started.elapsed());
        result
    }

    pub fn record(&mut self, phase: &str, elapsed: Duration) {
        let stats = self.phases.entry(phase.to_string()).or_default();
        stats.calls += 1;
        stats.total += elapsed;
    }

    pub fn sample_memory(&mut self) {
        if let Some(memory) = self.memory.as_mut() {
            let current = memory.sample();
            debug!("memory: {}MB (peak {}MB)", current, memory.peak_mb());
        }
    }

    pub fn calls(&self, phase: &str) -> u64 {
        self.phases.get(phase).map(|s| s.calls).unwrap_or(0)
    }

    pub fn summary(&self) -> ProfileSummary {
        let phases = self
            .phases
            .iter()
            .map(|(name, stats)| {
                let total_ms = stats.total.as_secs_f64() * 1000.0;
                PhaseSummary {
                    name: name.clone(),
                    calls: stats.calls,
                    total_ms,
                    mean_ms: if stats.calls > 0 {
                        total_ms / stats.calls as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        ProfileSummary {
            elapsed_ms: self.start_time.elapsed().as_secs_f64() * 1000.0,
            phases,
            memory_mb: self.memory.as_ref().map(|m| m.current_mb()),
            peak_memory_mb: self.memory.as_ref().map(|m| m.peak_mb()),
        }
    }

    pub fn log_summary(&self, label: &str) {
        let summary = self.summary();
        for phase in &summary.phases {
            info!(
                "{} {}: {} calls, {:.1}ms total, {:.2}ms mean",
                label, phase.name, phase.calls, phase.total_ms, phase.mean_ms
            );
        }
        if let Some(peak) = summary.peak_memory_mb {
            info!("{} peak memory: {}MB", label, peak);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub name: String,
    pub calls: u64,
    pub total_ms: f64,
    pub mean_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub elapsed_ms: f64,
    pub phases: Vec<PhaseSummary>,
    pub memory_mb: Option<u64>,
    pub peak_memory_mb: Option<u64>,
}

impl ProfileSummary {
    pub fn phase(&self, name: &str) -> Option<&PhaseSummary> {
        self.phases.iter().find(|p| p.name == name)
    }
}
