use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub const BYTES_PER_MB: f64 = 1_048_576.0;

/// One point-in-time collection of every metric sub-section.
///
/// Every field is always populated. Capabilities the host does not expose are
/// filled with their fallback values instead of being left out.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub collected_at_unix_ms: i64,
    pub memory: MemoryStats,
    pub network: NetworkStats,
    pub performance: PerformanceStats,
    pub screen: ScreenStats,
    pub device: DeviceStats,
    pub storage: StorageStats,
    pub battery: BatteryStats,
    pub cpu: CpuStats,
    pub connection_quality: ConnectionQuality,
    pub system_load: SystemLoad,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub used_mb: u64,
    pub total_mb: u64,
    pub limit_mb: u64,
    pub percent: u32,
    pub is_low: bool,
    pub estimated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPressure {
    Normal,
    Elevated,
    Low,
}

impl MemoryStats {
    pub fn from_bytes(used: u64, total: u64, limit: u64, estimated: bool) -> Self {
        let ratio = if total > 0 {
            used as f64 / total as f64
        } else {
            0.0
        };
        Self {
            used_mb: bytes_to_mb(used),
            total_mb: bytes_to_mb(total),
            limit_mb: bytes_to_mb(limit),
            percent: (ratio * 100.0).round() as u32,
            is_low: ratio > 0.9,
            estimated,
        }
    }

    pub fn pressure(&self) -> MemoryPressure {
        if self.is_low {
            MemoryPressure::Low
        } else if self.percent > 70 {
            MemoryPressure::Elevated
        } else {
            MemoryPressure::Normal
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    pub effective_type: String,
    pub downlink_mbps: f64,
    pub rtt_ms: f64,
    pub save_data: bool,
    pub online: bool,
    pub downlink_max_mbps: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub load_time_ms: u64,
    pub dom_ready_ms: u64,
    pub ttfb_ms: u64,
    pub fcp_ms: u64,
    pub now_ms: u64,
    pub memory_supported: bool,
    pub entries_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenStats {
    pub width: u32,
    pub height: u32,
    pub avail_width: u32,
    pub avail_height: u32,
    pub color_depth: u32,
    pub pixel_ratio: f64,
    pub orientation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStats {
    pub platform: String,
    pub user_agent: String,
    pub language: String,
    pub languages: Vec<String>,
    pub cookies_enabled: bool,
    pub do_not_track: String,
    pub max_touch_points: u32,
    pub vendor: String,
    pub product: String,
    pub app_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Yes,
    No,
    Unknown,
    NotSupported,
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Persistence::Yes => "Yes",
            Persistence::No => "No",
            Persistence::Unknown => "Unknown",
            Persistence::NotSupported => "Not Supported",
        };
        f.write_str(text)
    }
}

impl Serialize for Persistence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub used_mb: u64,
    pub quota_mb: u64,
    pub percent: u32,
    pub is_persisted: Persistence,
    pub error: Option<String>,
}

impl StorageStats {
    pub fn from_estimate(usage_bytes: u64, quota_bytes: u64, persisted: bool) -> Self {
        let percent = if quota_bytes > 0 {
            (usage_bytes as f64 / quota_bytes as f64 * 100.0).round() as u32
        } else {
            0
        };
        Self {
            used_mb: bytes_to_mb(usage_bytes),
            quota_mb: bytes_to_mb(quota_bytes),
            percent,
            is_persisted: if persisted {
                Persistence::Yes
            } else {
                Persistence::No
            },
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            used_mb: 0,
            quota_mb: 0,
            percent: 0,
            is_persisted: Persistence::Unknown,
            error: Some(error),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            used_mb: 0,
            quota_mb: 0,
            percent: 0,
            is_persisted: Persistence::NotSupported,
            error: None,
        }
    }
}

/// Charging estimates are in seconds; `f64::INFINITY` means "no estimate".
#[derive(Debug, Clone, Serialize)]
pub struct BatteryStats {
    pub level: u32,
    pub charging: bool,
    pub charging_time_secs: f64,
    pub discharging_time_secs: f64,
    pub supported: bool,
    pub error: Option<String>,
}

impl BatteryStats {
    pub fn unsupported(error: Option<String>) -> Self {
        Self {
            level: 0,
            charging: false,
            charging_time_secs: f64::INFINITY,
            discharging_time_secs: f64::INFINITY,
            supported: false,
            error,
        }
    }

    pub fn time_to_full_mins(&self) -> Option<u64> {
        finite_minutes(self.charging_time_secs)
    }

    pub fn time_to_empty_mins(&self) -> Option<u64> {
        finite_minutes(self.discharging_time_secs)
    }
}

fn finite_minutes(secs: f64) -> Option<u64> {
    if secs.is_finite() && secs >= 0.0 {
        Some((secs / 60.0).round() as u64)
    } else {
        None
    }
}

/// A value the host may decline to report. Serializes as the value itself or
/// as the string `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reported<T> {
    Known(T),
    Unknown,
}

impl<T> From<Option<T>> for Reported<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reported::Known(v),
            None => Reported::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reported<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reported::Known(v) => v.fmt(f),
            Reported::Unknown => f.write_str("unknown"),
        }
    }
}

impl<T: Serialize> Serialize for Reported<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reported::Known(v) => v.serialize(serializer),
            Reported::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OsFamily {
    Windows,
    MacOS,
    Linux,
    Other,
}

impl OsFamily {
    /// Substring match against a platform string, Windows first.
    pub fn from_platform(platform: &str) -> Self {
        if platform.contains("Win") {
            OsFamily::Windows
        } else if platform.contains("Mac") {
            OsFamily::MacOS
        } else if platform.contains("Linux") {
            OsFamily::Linux
        } else {
            OsFamily::Other
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuStats {
    pub cores: Reported<u32>,
    pub platform: OsFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Average,
    Poor,
}

impl ConnectionQuality {
    pub fn from_rtt(rtt_ms: f64) -> Self {
        if rtt_ms > 300.0 {
            ConnectionQuality::Poor
        } else if rtt_ms > 100.0 {
            ConnectionQuality::Average
        } else if rtt_ms > 50.0 {
            ConnectionQuality::Good
        } else {
            ConnectionQuality::Excellent
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemLoad {
    pub total: u32,
    pub memory: u32,
    pub network: u32,
    pub status: LoadStatus,
}

const NETWORK_LOAD_PENALTY: u32 = 30;

impl SystemLoad {
    pub fn derive(memory_percent: u32, rtt_ms: f64) -> Self {
        let network = if rtt_ms > 100.0 {
            NETWORK_LOAD_PENALTY
        } else {
            0
        };
        let total = memory_percent.saturating_add(network).min(100);
        let status = if total > 80 {
            LoadStatus::High
        } else if total > 50 {
            LoadStatus::Medium
        } else {
            LoadStatus::Low
        };
        Self {
            total,
            memory: memory_percent,
            network,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    ServiceWorker,
    WebWorker,
    WebGl,
    WebRtc,
    Geolocation,
    Notifications,
    PushManager,
    IndexedDb,
    LocalStorage,
    SessionStorage,
}

impl Feature {
    pub const ALL: [Feature; 10] = [
        Feature::ServiceWorker,
        Feature::WebWorker,
        Feature::WebGl,
        Feature::WebRtc,
        Feature::Geolocation,
        Feature::Notifications,
        Feature::PushManager,
        Feature::IndexedDb,
        Feature::LocalStorage,
        Feature::SessionStorage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Feature::ServiceWorker => "Service Worker",
            Feature::WebWorker => "Web Worker",
            Feature::WebGl => "WebGL",
            Feature::WebRtc => "WebRTC",
            Feature::Geolocation => "Geolocation",
            Feature::Notifications => "Notifications",
            Feature::PushManager => "Push Manager",
            Feature::IndexedDb => "IndexedDB",
            Feature::LocalStorage => "Local Storage",
            Feature::SessionStorage => "Session Storage",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub service_worker: bool,
    pub web_worker: bool,
    pub web_gl: bool,
    pub web_rtc: bool,
    pub geolocation: bool,
    pub notifications: bool,
    pub push_manager: bool,
    pub indexed_db: bool,
    pub local_storage: bool,
    pub session_storage: bool,
}

impl Capabilities {
    pub fn get(&self, feature: Feature) -> bool {
        match feature {
            Feature::ServiceWorker => self.service_worker,
            Feature::WebWorker => self.web_worker,
            Feature::WebGl => self.web_gl,
            Feature::WebRtc => self.web_rtc,
            Feature::Geolocation => self.geolocation,
            Feature::Notifications => self.notifications,
            Feature::PushManager => self.push_manager,
            Feature::IndexedDb => self.indexed_db,
            Feature::LocalStorage => self.local_storage,
            Feature::SessionStorage => self.session_storage,
        }
    }

    pub fn set(&mut self, feature: Feature, supported: bool) {
        let slot = match feature {
            Feature::ServiceWorker => &mut self.service_worker,
            Feature::WebWorker => &mut self.web_worker,
            Feature::WebGl => &mut self.web_gl,
            Feature::WebRtc => &mut self.web_rtc,
            Feature::Geolocation => &mut self.geolocation,
            Feature::Notifications => &mut self.notifications,
            Feature::PushManager => &mut self.push_manager,
            Feature::IndexedDb => &mut self.indexed_db,
            Feature::LocalStorage => &mut self.local_storage,
            Feature::SessionStorage => &mut self.session_storage,
        };
        *slot = supported;
    }

    pub fn supported_count(&self) -> usize {
        Feature::ALL.iter().filter(|f| self.get(**f)).count()
    }

    pub fn coverage_percent(&self) -> u32 {
        (self.supported_count() as f64 / Feature::ALL.len() as f64 * 100.0).round() as u32
    }
}

pub fn bytes_to_mb(bytes: u64) -> u64 {
    (bytes as f64 / BYTES_PER_MB).round() as u64
}

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
