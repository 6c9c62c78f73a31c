use crate::collectors::{HostProbe, NavigatorInfo, ProbeError};
use crate::snapshot::{
    now_unix_ms, BatteryStats, Capabilities, ConnectionQuality, CpuStats, DeviceStats, Feature,
    MemoryStats, NetworkStats, OsFamily, PerformanceStats, Reported, ScreenStats, Snapshot,
    StorageStats, SystemLoad,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

const FALLBACK_HEAP_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;
const FALLBACK_HEAP_LIMIT_BYTES: u64 = 2048 * 1024 * 1024;
const FALLBACK_DOWNLINK_MBPS: f64 = 1.0;
const FALLBACK_RTT_MS: f64 = 100.0;
const DEFAULT_DOWNLINK_MAX_MBPS: f64 = 10.0;
const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Produces snapshots from a [`HostProbe`]. Never fails: every capability
/// that is missing or errors is replaced by its fallback.
pub struct MetricSampler {
    probe: Arc<dyn HostProbe>,
    query_timeout: Duration,
}

impl MetricSampler {
    pub fn new(probe: Arc<dyn HostProbe>, query_timeout: Duration) -> Self {
        Self {
            probe,
            query_timeout,
        }
    }

    pub async fn sample(&self) -> Snapshot {
        let probe = self.probe.as_ref();

        let memory = collect_memory(probe);
        let network = collect_network(probe);
        let performance = collect_performance(probe);
        let screen = collect_screen(probe);
        let navigator = probe.navigator();
        let cpu = CpuStats {
            cores: Reported::from(navigator.hardware_concurrency.filter(|n| *n > 0)),
            platform: OsFamily::from_platform(&navigator.platform),
        };
        let device = collect_device(navigator);
        let (storage, battery) = tokio::join!(
            collect_storage(probe, self.query_timeout),
            collect_battery(probe, self.query_timeout)
        );
        let capabilities = collect_capabilities(probe);

        let connection_quality = ConnectionQuality::from_rtt(network.rtt_ms);
        let system_load = SystemLoad::derive(memory.percent, network.rtt_ms);

        Snapshot {
            collected_at_unix_ms: now_unix_ms(),
            memory,
            network,
            performance,
            screen,
            device,
            storage,
            battery,
            cpu,
            connection_quality,
            system_load,
            capabilities,
        }
    }
}

fn collect_memory(probe: &dyn HostProbe) -> MemoryStats {
    match probe.heap() {
        Some(heap) => MemoryStats::from_bytes(
            heap.used_bytes,
            heap.total_bytes,
            heap.limit_bytes,
            false,
        ),
        None => {
            let transferred = probe
                .resource_transfer_sizes()
                .iter()
                .fold(0_u64, |sum, size| sum.saturating_add(*size));
            debug!(
                transferred_bytes = transferred,
                "heap counters unavailable, estimating from resource transfer sizes"
            );
            MemoryStats::from_bytes(
                transferred,
                FALLBACK_HEAP_TOTAL_BYTES,
                FALLBACK_HEAP_LIMIT_BYTES,
                true,
            )
        }
    }
}

fn collect_network(probe: &dyn HostProbe) -> NetworkStats {
    let online = probe.online();
    match probe.connection() {
        Some(conn) => NetworkStats {
            effective_type: conn.effective_type,
            downlink_mbps: conn.downlink_mbps,
            rtt_ms: conn.rtt_ms,
            save_data: conn.save_data,
            online,
            downlink_max_mbps: conn
                .downlink_max_mbps
                .filter(|v| *v > 0.0)
                .unwrap_or(DEFAULT_DOWNLINK_MAX_MBPS),
        },
        None => NetworkStats {
            effective_type: "unknown".to_string(),
            downlink_mbps: FALLBACK_DOWNLINK_MBPS,
            rtt_ms: FALLBACK_RTT_MS,
            save_data: false,
            online,
            downlink_max_mbps: DEFAULT_DOWNLINK_MAX_MBPS,
        },
    }
}

fn collect_performance(probe: &dyn HostProbe) -> PerformanceStats {
    let (load_time_ms, dom_ready_ms, ttfb_ms) = match probe.navigation_timing() {
        Some(nav) => (
            whole_ms(nav.load_event_end - nav.start_time),
            whole_ms(nav.dom_content_loaded_event_end - nav.start_time),
            whole_ms(nav.response_start - nav.request_start),
        ),
        None => (0, 0, 0),
    };
    let fcp_ms = probe
        .paint_entries()
        .iter()
        .find(|entry| entry.name == FIRST_CONTENTFUL_PAINT)
        .map(|entry| whole_ms(entry.start_time))
        .unwrap_or(0);

    PerformanceStats {
        load_time_ms,
        dom_ready_ms,
        ttfb_ms,
        fcp_ms,
        now_ms: whole_ms(probe.clock_ms()),
        memory_supported: probe.heap().is_some(),
        entries_count: probe.performance_entry_count(),
    }
}

fn collect_screen(probe: &dyn HostProbe) -> ScreenStats {
    let screen = probe.screen();
    ScreenStats {
        width: screen.width,
        height: screen.height,
        avail_width: screen.avail_width,
        avail_height: screen.avail_height,
        color_depth: screen.color_depth,
        pixel_ratio: screen.pixel_ratio,
        orientation: screen
            .orientation
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

fn collect_device(navigator: NavigatorInfo) -> DeviceStats {
    DeviceStats {
        platform: navigator.platform,
        user_agent: navigator.user_agent,
        language: navigator.language,
        languages: navigator.languages,
        cookies_enabled: navigator.cookies_enabled,
        do_not_track: navigator
            .do_not_track
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unspecified".to_string()),
        max_touch_points: navigator.max_touch_points.unwrap_or(0),
        vendor: navigator.vendor,
        product: navigator.product,
        app_version: navigator.app_version,
    }
}

async fn collect_storage(probe: &dyn HostProbe, timeout: Duration) -> StorageStats {
    match bounded(timeout, probe.storage_estimate()).await {
        None => {
            debug!("storage estimate not supported");
            StorageStats::unsupported()
        }
        Some(Ok(estimate)) => StorageStats::from_estimate(
            estimate.usage_bytes,
            estimate.quota_bytes,
            estimate.persisted,
        ),
        Some(Err(err)) => {
            warn!(error = %err, "storage estimate failed");
            StorageStats::failed(err.to_string())
        }
    }
}

async fn collect_battery(probe: &dyn HostProbe, timeout: Duration) -> BatteryStats {
    match bounded(timeout, probe.battery()).await {
        None => {
            debug!("battery status not supported");
            BatteryStats::unsupported(None)
        }
        Some(Ok(status)) => BatteryStats {
            level: (status.level.clamp(0.0, 1.0) * 100.0).round() as u32,
            charging: status.charging,
            charging_time_secs: status.charging_time_secs,
            discharging_time_secs: status.discharging_time_secs,
            supported: true,
            error: None,
        },
        Some(Err(err)) => {
            warn!(error = %err, "battery query failed");
            BatteryStats::unsupported(Some(err.to_string()))
        }
    }
}

fn collect_capabilities(probe: &dyn HostProbe) -> Capabilities {
    let mut caps = Capabilities::default();
    for feature in Feature::ALL {
        let supported = match probe.feature(feature) {
            Ok(supported) => supported,
            Err(err) => {
                debug!(feature = feature.label(), error = %err, "feature check failed");
                false
            }
        };
        caps.set(feature, supported);
    }
    caps
}

/// Runs one async capability query under `timeout`; an elapsed query counts as
/// a failed one.
async fn bounded<T, F>(timeout: Duration, query: F) -> Option<Result<T, ProbeError>>
where
    F: Future<Output = Option<Result<T, ProbeError>>>,
{
    match time::timeout(timeout, query).await {
        Ok(result) => result,
        Err(_elapsed) => Some(Err(ProbeError::TimedOut(timeout))),
    }
}

fn whole_ms(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::profile::{BatteryProfile, HostProfile, ProfileProbe, StorageProfile};
    use crate::collectors::{ConnectionInfo, HeapCounters, NavigationTiming, PaintEntry};
    use crate::snapshot::{LoadStatus, Persistence};

    const MB: u64 = 1_048_576;

    fn sampler(profile: HostProfile) -> MetricSampler {
        MetricSampler::new(
            Arc::new(ProfileProbe::new(profile)),
            Duration::from_millis(1000),
        )
    }

    #[tokio::test]
    async fn every_capability_absent_yields_fallbacks() {
        let snapshot = sampler(HostProfile::default()).sample().await;

        assert_eq!(snapshot.memory.used_mb, 0);
        assert_eq!(snapshot.memory.total_mb, 1024);
        assert_eq!(snapshot.memory.limit_mb, 2048);
        assert_eq!(snapshot.memory.percent, 0);
        assert!(snapshot.memory.estimated);
        assert!(!snapshot.memory.is_low);

        assert_eq!(snapshot.network.effective_type, "unknown");
        assert_eq!(snapshot.network.downlink_mbps, 1.0);
        assert_eq!(snapshot.network.rtt_ms, 100.0);
        assert!(!snapshot.network.save_data);
        assert_eq!(snapshot.network.downlink_max_mbps, 10.0);
        assert!(!snapshot.network.online);

        assert_eq!(snapshot.performance.load_time_ms, 0);
        assert_eq!(snapshot.performance.dom_ready_ms, 0);
        assert_eq!(snapshot.performance.ttfb_ms, 0);
        assert_eq!(snapshot.performance.fcp_ms, 0);
        assert!(!snapshot.performance.memory_supported);

        assert_eq!(snapshot.screen.orientation, "unknown");
        assert_eq!(snapshot.device.do_not_track, "unspecified");
        assert_eq!(snapshot.device.max_touch_points, 0);

        assert_eq!(snapshot.storage.is_persisted, Persistence::NotSupported);
        assert_eq!(snapshot.storage.percent, 0);
        assert!(snapshot.storage.error.is_none());

        assert!(!snapshot.battery.supported);
        assert_eq!(snapshot.battery.level, 0);
        assert!(!snapshot.battery.charging);
        assert!(snapshot.battery.charging_time_secs.is_infinite());
        assert!(snapshot.battery.discharging_time_secs.is_infinite());

        assert_eq!(snapshot.cpu.cores, Reported::Unknown);
        assert_eq!(snapshot.cpu.platform, OsFamily::Other);
        assert_eq!(snapshot.capabilities, Capabilities::default());

        assert_eq!(snapshot.connection_quality, ConnectionQuality::Good);
        assert_eq!(snapshot.system_load.network, 0);
        assert_eq!(snapshot.system_load.status, LoadStatus::Low);
    }

    #[tokio::test]
    async fn fallback_memory_uses_consistent_ratio() {
        let snapshot = sampler(HostProfile {
            resource_transfer_sizes: vec![300 * MB, 212 * MB],
            ..HostProfile::default()
        })
        .sample()
        .await;

        assert_eq!(snapshot.memory.used_mb, 512);
        assert_eq!(snapshot.memory.percent, 50);
        assert_eq!(snapshot.system_load.memory, 50);
    }

    #[tokio::test]
    async fn primary_sources_are_used_when_present() {
        let snapshot = sampler(HostProfile {
            heap: Some(HeapCounters {
                used_bytes: 46 * MB,
                total_bytes: 50 * MB,
                limit_bytes: 4096 * MB,
            }),
            connection: Some(ConnectionInfo {
                effective_type: "4g".to_string(),
                downlink_mbps: 9.5,
                rtt_ms: 350.0,
                save_data: true,
                downlink_max_mbps: None,
            }),
            online: true,
            navigation: Some(NavigationTiming {
                start_time: 0.0,
                request_start: 12.0,
                response_start: 40.0,
                dom_content_loaded_event_end: 310.4,
                load_event_end: 812.6,
            }),
            paint: vec![
                PaintEntry {
                    name: "first-paint".to_string(),
                    start_time: 120.0,
                },
                PaintEntry {
                    name: "first-contentful-paint".to_string(),
                    start_time: 140.4,
                },
            ],
            features: vec![Feature::WebWorker, Feature::IndexedDb],
            ..HostProfile::default()
        })
        .sample()
        .await;

        assert_eq!(snapshot.memory.percent, 92);
        assert!(snapshot.memory.is_low);
        assert!(!snapshot.memory.estimated);
        assert!(snapshot.performance.memory_supported);

        assert_eq!(snapshot.network.effective_type, "4g");
        assert_eq!(snapshot.network.downlink_max_mbps, 10.0);
        assert!(snapshot.network.online);
        assert_eq!(snapshot.connection_quality, ConnectionQuality::Poor);

        assert_eq!(snapshot.performance.load_time_ms, 813);
        assert_eq!(snapshot.performance.dom_ready_ms, 310);
        assert_eq!(snapshot.performance.ttfb_ms, 28);
        assert_eq!(snapshot.performance.fcp_ms, 140);

        assert_eq!(snapshot.system_load.total, 100);
        assert_eq!(snapshot.capabilities.supported_count(), 2);
    }

    #[tokio::test]
    async fn query_failures_are_mapped_to_fallbacks_with_message() {
        let snapshot = sampler(HostProfile {
            storage: Some(StorageProfile::Failing {
                error: "blocked by policy".to_string(),
            }),
            battery: Some(BatteryProfile::Failing {
                error: "not allowed".to_string(),
            }),
            failing_features: Feature::ALL.to_vec(),
            ..HostProfile::default()
        })
        .sample()
        .await;

        assert_eq!(snapshot.storage.is_persisted, Persistence::Unknown);
        assert_eq!(
            snapshot.storage.error.as_deref(),
            Some("permission denied: blocked by policy")
        );
        assert!(!snapshot.battery.supported);
        assert_eq!(snapshot.battery.error.as_deref(), Some("not allowed"));
        assert_eq!(snapshot.capabilities.supported_count(), 0);
    }

    #[tokio::test]
    async fn async_queries_succeed() {
        let snapshot = sampler(HostProfile {
            storage: Some(StorageProfile::Available {
                usage_bytes: 25 * MB,
                quota_bytes: 100 * MB,
                persisted: false,
            }),
            battery: Some(BatteryProfile::Available {
                level: 0.826,
                charging: true,
                charging_time_secs: Some(1_800.0),
                discharging_time_secs: None,
            }),
            ..HostProfile::default()
        })
        .sample()
        .await;

        assert_eq!(snapshot.storage.used_mb, 25);
        assert_eq!(snapshot.storage.quota_mb, 100);
        assert_eq!(snapshot.storage.percent, 25);
        assert_eq!(snapshot.storage.is_persisted, Persistence::No);

        assert!(snapshot.battery.supported);
        assert_eq!(snapshot.battery.level, 83);
        assert_eq!(snapshot.battery.time_to_full_mins(), Some(30));
        assert!(snapshot.battery.discharging_time_secs.is_infinite());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_queries_time_out_into_fallbacks() {
        let sampler = MetricSampler::new(
            Arc::new(ProfileProbe::new(HostProfile {
                storage: Some(StorageProfile::Available {
                    usage_bytes: MB,
                    quota_bytes: 10 * MB,
                    persisted: true,
                }),
                query_delay_ms: 5_000,
                ..HostProfile::default()
            })),
            Duration::from_millis(250),
        );
        let snapshot = sampler.sample().await;
        assert_eq!(snapshot.storage.is_persisted, Persistence::Unknown);
        assert!(snapshot
            .storage
            .error
            .as_deref()
            .is_some_and(|e| e.contains("timed out")));
        assert_eq!(snapshot.storage.used_mb, 0);
    }

    #[test]
    fn negative_or_missing_timings_clamp_to_zero() {
        assert_eq!(whole_ms(-120.0), 0);
        assert_eq!(whole_ms(f64::NAN), 0);
        assert_eq!(whole_ms(99.5), 100);
    }
}
