use crate::collectors::{
    BatteryStatus, ConnectionInfo, HeapCounters, HostProbe, NavigationTiming, NavigatorInfo,
    PaintEntry, ProbeError, ScreenInfo, StorageEstimate,
};
use crate::snapshot::Feature;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use sysinfo::{CpuExt, DiskExt, NetworkExt, NetworksExt, Pid, ProcessExt, System, SystemExt};
use tracing::debug;

/// Native host backed by `sysinfo`.
///
/// Process memory stands in for the heap and mounted disks for the storage
/// quota. Browser-only capabilities (connection, paint timing, battery) are
/// reported as unsupported.
pub struct SystemProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    started: Instant,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(err) => {
                debug!(error = err, "current pid unavailable, heap counters disabled");
                None
            }
        };
        Self {
            system: Mutex::new(system),
            pid,
            started: Instant::now(),
        }
    }

    fn system(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostProbe for SystemProbe {
    fn heap(&self) -> Option<HeapCounters> {
        let pid = self.pid?;
        let mut system = self.system();
        system.refresh_memory();
        if !system.refresh_process(pid) {
            return None;
        }
        let used_bytes = system.process(pid)?.memory();
        let total_bytes = system.total_memory();
        if total_bytes == 0 {
            return None;
        }
        Some(HeapCounters {
            used_bytes,
            total_bytes,
            limit_bytes: total_bytes.saturating_add(system.total_swap()),
        })
    }

    fn resource_transfer_sizes(&self) -> Vec<u64> {
        Vec::new()
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        None
    }

    fn online(&self) -> bool {
        let mut system = self.system();
        system.refresh_networks_list();
        system.refresh_networks();
        system
            .networks()
            .iter()
            .any(|(iface, data)| !is_loopback_iface(iface) && data.total_received() > 0)
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        None
    }

    fn paint_entries(&self) -> Vec<PaintEntry> {
        Vec::new()
    }

    fn performance_entry_count(&self) -> usize {
        0
    }

    fn clock_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn screen(&self) -> ScreenInfo {
        ScreenInfo::default()
    }

    fn navigator(&self) -> NavigatorInfo {
        let system = self.system();
        let platform = system.name().unwrap_or_default();
        let os_version = system.long_os_version().unwrap_or_else(|| platform.clone());
        let hardware_concurrency = match system.cpus().len() {
            0 => None,
            n => Some(n as u32),
        };
        let language = std::env::var("LANG")
            .ok()
            .and_then(|raw| locale_to_language_tag(&raw))
            .unwrap_or_default();
        let languages = if language.is_empty() {
            Vec::new()
        } else {
            vec![language.clone()]
        };
        let cpu_vendor = system
            .cpus()
            .first()
            .map(|c| c.vendor_id().to_string())
            .unwrap_or_default();

        NavigatorInfo {
            platform,
            user_agent: format!(
                "{}/{} ({})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                os_version
            ),
            language,
            languages,
            cookies_enabled: false,
            do_not_track: None,
            max_touch_points: None,
            hardware_concurrency,
            vendor: cpu_vendor,
            product: env!("CARGO_PKG_NAME").to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn storage_estimate(&self) -> Option<Result<StorageEstimate, ProbeError>> {
        let mut system = self.system();
        system.refresh_disks_list();
        system.refresh_disks();
        if system.disks().is_empty() {
            return Some(Err(ProbeError::Rejected(
                "no mounted disks reported".to_string(),
            )));
        }
        let (usage_bytes, quota_bytes) =
            system.disks().iter().fold((0_u64, 0_u64), |(used, total), d| {
                let disk_total = d.total_space();
                let disk_used = disk_total.saturating_sub(d.available_space());
                (used.saturating_add(disk_used), total.saturating_add(disk_total))
            });
        Some(Ok(StorageEstimate {
            usage_bytes,
            quota_bytes,
            persisted: true,
        }))
    }

    async fn battery(&self) -> Option<Result<BatteryStatus, ProbeError>> {
        None
    }

    fn feature(&self, feature: Feature) -> Result<bool, ProbeError> {
        Ok(matches!(feature, Feature::WebWorker))
    }
}

fn is_loopback_iface(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.to_lowercase().contains("loopback")
}

/// `en_US.UTF-8` -> `en-US`; `C` and `POSIX` carry no language.
fn locale_to_language_tag(raw: &str) -> Option<String> {
    let base = raw.split(['.', '@']).next()?.trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    Some(base.replace('_', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_tags() {
        assert_eq!(locale_to_language_tag("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(locale_to_language_tag("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(locale_to_language_tag("C"), None);
        assert_eq!(locale_to_language_tag(""), None);
    }

    #[test]
    fn loopback_interfaces() {
        assert!(is_loopback_iface("lo"));
        assert!(is_loopback_iface("lo0"));
        assert!(is_loopback_iface("Loopback Pseudo-Interface 1"));
        assert!(!is_loopback_iface("eth0"));
    }

    #[tokio::test]
    async fn system_probe_reports_browser_only_capabilities_as_absent() {
        let probe = SystemProbe::new();
        assert!(probe.connection().is_none());
        assert!(probe.battery().await.is_none());
        assert!(probe.navigation_timing().is_none());
        assert_eq!(probe.feature(Feature::WebWorker), Ok(true));
        assert_eq!(probe.feature(Feature::WebGl), Ok(false));
    }
}
