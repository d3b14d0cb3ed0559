//! CPU utilization source. [SystemCpuCounter] is the production implementation on top of
//! `sysinfo`; tests swap in a mock through the [CpuCounter] trait.

use std::time::Instant;

use anyhow::{anyhow, Result};
use sysinfo::{CpuRefreshKind, RefreshKind, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::{debug, instrument, trace};

use crate::utils::percentage::Percentage;

/// Contract for anything that can report overall processor time as a percentage.
#[cfg_attr(test, mockall::automock)]
pub trait CpuCounter {
    /// Current utilization across all cores, normally within 0..=100.
    fn next_value(&mut self) -> Result<f64>;

    /// Frees the underlying handle. Reading afterwards is an error.
    fn release(&mut self);
}

pub struct SystemCpuCounter {
    system: Option<System>,
    last_refresh: Instant,
    last_value: f64,
}

impl SystemCpuCounter {
    #[instrument]
    pub fn new() -> Result<Self> {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing().with_cpu_usage()),
        );
        if system.cpus().is_empty() {
            return Err(anyhow!("No processors were reported by the platform"));
        }
        // The first reading is always zero, usage is computed against this baseline.
        system.refresh_cpu_usage();
        debug!("Acquired CPU counter for {} processors", system.cpus().len());
        Ok(Self {
            system: Some(system),
            last_refresh: Instant::now(),
            last_value: 0.,
        })
    }
}

impl CpuCounter for SystemCpuCounter {
    fn next_value(&mut self) -> Result<f64> {
        let system = self
            .system
            .as_mut()
            .ok_or_else(|| anyhow!("CPU counter was already released"))?;

        // Ticks can be a couple of milliseconds apart, far below what the platform can measure.
        if self.last_refresh.elapsed() >= MINIMUM_CPU_UPDATE_INTERVAL {
            system.refresh_cpu_usage();
            self.last_refresh = Instant::now();
            let raw = system.global_cpu_usage() as f64;
            self.last_value = Percentage::new_opt(raw)
                .map(|v| *v)
                .ok_or_else(|| anyhow!("Platform reported invalid CPU usage {raw}"))?;
            trace!("Refreshed CPU usage {}", self.last_value);
        }
        Ok(self.last_value)
    }

    fn release(&mut self) {
        if self.system.take().is_some() {
            debug!("Released CPU counter");
        }
    }
}
