use crate::collectors::{
    BatteryStatus, ConnectionInfo, HeapCounters, HostProbe, NavigationTiming, NavigatorInfo,
    PaintEntry, ProbeError, ScreenInfo, StorageEstimate,
};
use crate::snapshot::Feature;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A host described declaratively, e.g. from the `host_profile` section of the
/// config. Anything left out is reported as unsupported.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HostProfile {
    pub heap: Option<HeapCounters>,
    pub resource_transfer_sizes: Vec<u64>,
    pub connection: Option<ConnectionInfo>,
    pub online: bool,
    pub navigation: Option<NavigationTiming>,
    pub paint: Vec<PaintEntry>,
    pub entries_count: usize,
    pub screen: ScreenInfo,
    pub navigator: NavigatorInfo,
    pub storage: Option<StorageProfile>,
    pub battery: Option<BatteryProfile>,
    pub features: Vec<Feature>,
    pub failing_features: Vec<Feature>,
    /// Artificial latency applied to the storage and battery queries.
    pub query_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StorageProfile {
    Available {
        usage_bytes: u64,
        quota_bytes: u64,
        #[serde(default)]
        persisted: bool,
    },
    Failing {
        error: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatteryProfile {
    Available {
        level: f64,
        #[serde(default)]
        charging: bool,
        #[serde(default)]
        charging_time_secs: Option<f64>,
        #[serde(default)]
        discharging_time_secs: Option<f64>,
    },
    Failing {
        error: String,
    },
}

pub struct ProfileProbe {
    profile: HostProfile,
    started: Instant,
}

impl ProfileProbe {
    pub fn new(profile: HostProfile) -> Self {
        Self {
            profile,
            started: Instant::now(),
        }
    }

    async fn simulate_latency(&self) {
        if self.profile.query_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.profile.query_delay_ms)).await;
        }
    }
}

#[async_trait]
impl HostProbe for ProfileProbe {
    fn heap(&self) -> Option<HeapCounters> {
        self.profile.heap
    }

    fn resource_transfer_sizes(&self) -> Vec<u64> {
        self.profile.resource_transfer_sizes.clone()
    }

    fn connection(&self) -> Option<ConnectionInfo> {
        self.profile.connection.clone()
    }

    fn online(&self) -> bool {
        self.profile.online
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        self.profile.navigation
    }

    fn paint_entries(&self) -> Vec<PaintEntry> {
        self.profile.paint.clone()
    }

    fn performance_entry_count(&self) -> usize {
        self.profile.entries_count
    }

    fn clock_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn screen(&self) -> ScreenInfo {
        self.profile.screen.clone()
    }

    fn navigator(&self) -> NavigatorInfo {
        self.profile.navigator.clone()
    }

    async fn storage_estimate(&self) -> Option<Result<StorageEstimate, ProbeError>> {
        let storage = self.profile.storage.as_ref()?;
        self.simulate_latency().await;
        Some(match storage {
            StorageProfile::Available {
                usage_bytes,
                quota_bytes,
                persisted,
            } => Ok(StorageEstimate {
                usage_bytes: *usage_bytes,
                quota_bytes: *quota_bytes,
                persisted: *persisted,
            }),
            StorageProfile::Failing { error } => Err(ProbeError::PermissionDenied(error.clone())),
        })
    }

    async fn battery(&self) -> Option<Result<BatteryStatus, ProbeError>> {
        let battery = self.profile.battery.as_ref()?;
        self.simulate_latency().await;
        Some(match battery {
            BatteryProfile::Available {
                level,
                charging,
                charging_time_secs,
                discharging_time_secs,
            } => Ok(BatteryStatus {
                level: level.clamp(0.0, 1.0),
                charging: *charging,
                charging_time_secs: charging_time_secs.unwrap_or(f64::INFINITY),
                discharging_time_secs: discharging_time_secs.unwrap_or(f64::INFINITY),
            }),
            BatteryProfile::Failing { error } => Err(ProbeError::Rejected(error.clone())),
        })
    }

    fn feature(&self, feature: Feature) -> Result<bool, ProbeError> {
        if self.profile.failing_features.contains(&feature) {
            return Err(ProbeError::Rejected(format!(
                "{} check threw",
                feature.label()
            )));
        }
        Ok(self.profile.features.contains(&feature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_parses_tagged_capabilities() {
        let yaml = r#"
online: true
storage:
  status: failing
  error: "quota query blocked"
battery:
  status: available
  level: 0.5
  charging: true
features: [web_worker, local_storage]
failing_features: [web_gl]
"#;
        let profile: HostProfile = serde_yaml::from_str(yaml).unwrap();
        assert!(profile.online);
        assert!(profile.heap.is_none());
        assert!(matches!(
            profile.storage,
            Some(StorageProfile::Failing { ref error }) if error == "quota query blocked"
        ));
        assert!(matches!(
            profile.battery,
            Some(BatteryProfile::Available { charging: true, .. })
        ));
        assert_eq!(profile.features, vec![Feature::WebWorker, Feature::LocalStorage]);
    }

    #[tokio::test]
    async fn failing_queries_surface_as_errors() {
        let probe = ProfileProbe::new(HostProfile {
            storage: Some(StorageProfile::Failing {
                error: "blocked".to_string(),
            }),
            failing_features: vec![Feature::WebGl],
            ..HostProfile::default()
        });
        assert!(matches!(probe.storage_estimate().await, Some(Err(_))));
        assert!(probe.battery().await.is_none());
        assert!(probe.feature(Feature::WebGl).is_err());
        assert_eq!(probe.feature(Feature::Geolocation), Ok(false));
    }
}
