use std::cell::{Cell, RefCell};
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, System};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessStats {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
}

/// Reads CPU and resident memory of the current process.
#[cfg(feature = "cli")]
struct ProcessSampler {
    system: System,
    pid: Pid,
}

#[cfg(feature = "cli")]
impl ProcessSampler {
    fn new() -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        let mut system = System::new_all();
        system.refresh_all();
        Some(Self { system, pid })
    }

    /// `(cpu %, memory MB)`
    fn read(&mut self) -> Option<(f32, u64)> {
        self.system.refresh_all();
        let process = self.system.process(self.pid)?;
        Some((process.cpu_usage(), process.memory() / 1024 / 1024))
    }
}

// without sysinfo only timings are reported
#[cfg(not(feature = "cli"))]
struct ProcessSampler;

#[cfg(not(feature = "cli"))]
impl ProcessSampler {
    fn new() -> Option<Self> {
        Some(Self)
    }

    fn read(&mut self) -> Option<(f32, u64)> {
        None
    }
}

/// Per-phase timing for a pipeline run. Process figures are sampled only
/// when enabled and the `cli` feature brings in `sysinfo`.
pub struct RunMonitor {
    enabled: bool,
    started: Instant,
    phase_started: Cell<Instant>,
    peak_memory_mb: Cell<u64>,
    sampler: Option<RefCell<ProcessSampler>>,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            phase_started: Cell::new(now),
            peak_memory_mb: Cell::new(0),
            sampler: if enabled {
                ProcessSampler::new().map(RefCell::new)
            } else {
                None
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn sample(&self) -> Option<ProcessStats> {
        let (cpu_usage, memory_mb) = self.sampler.as_ref()?.borrow_mut().read()?;
        if memory_mb > self.peak_memory_mb.get() {
            self.peak_memory_mb.set(memory_mb);
        }

        Some(ProcessStats {
            cpu_usage,
            memory_mb,
            peak_memory_mb: self.peak_memory_mb.get(),
        })
    }

    /// Logs the phase that just finished and starts timing the next one.
    pub fn phase_done(&self, phase: &str) {
        let took = self.phase_started.get().elapsed();
        self.phase_started.set(Instant::now());

        if !self.enabled {
            tracing::debug!(phase, ?took, "phase finished");
            return;
        }

        match self.sample() {
            Some(stats) => tracing::info!(
                "📊 {} - took {:?}, CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                phase,
                took,
                stats.cpu_usage,
                stats.memory_mb,
                stats.peak_memory_mb
            ),
            None => tracing::info!("📊 {} - took {:?}", phase, took),
        }
    }

    pub fn finish(&self) {
        if self.enabled {
            tracing::info!(
                "📊 Run finished in {:?}, peak memory {}MB",
                self.elapsed(),
                self.peak_memory_mb.get()
            );
        }
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
