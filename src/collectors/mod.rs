pub mod profile;
pub mod system;

use crate::snapshot::Feature;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure of a capability the host does expose.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("{0}")]
    Rejected(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("query timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct HeapCounters {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub limit_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionInfo {
    pub effective_type: String,
    pub downlink_mbps: f64,
    pub rtt_ms: f64,
    #[serde(default)]
    pub save_data: bool,
    #[serde(default)]
    pub downlink_max_mbps: Option<f64>,
}

/// Navigation timing marks in milliseconds relative to the time origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct NavigationTiming {
    pub start_time: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaintEntry {
    pub name: String,
    pub start_time: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScreenInfo {
    pub width: u32,
    pub height: u32,
    pub avail_width: u32,
    pub avail_height: u32,
    pub color_depth: u32,
    pub pixel_ratio: f64,
    #[serde(default)]
    pub orientation: Option<String>,
}

impl Default for ScreenInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            avail_width: 0,
            avail_height: 0,
            color_depth: 0,
            pixel_ratio: 1.0,
            orientation: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigatorInfo {
    pub platform: String,
    pub user_agent: String,
    pub language: String,
    pub languages: Vec<String>,
    pub cookies_enabled: bool,
    pub do_not_track: Option<String>,
    pub max_touch_points: Option<u32>,
    pub hardware_concurrency: Option<u32>,
    pub vendor: String,
    pub product: String,
    pub app_version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct StorageEstimate {
    pub usage_bytes: u64,
    pub quota_bytes: u64,
    pub persisted: bool,
}

/// `level` is a fraction in `0.0..=1.0`; times are seconds, infinite when the
/// host has no estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    pub level: f64,
    pub charging: bool,
    pub charging_time_secs: f64,
    pub discharging_time_secs: f64,
}

/// Introspection surface of the host the dashboard runs in.
///
/// `None` means the capability is not exposed at all. The two async queries
/// distinguish that from a query that exists but failed.
#[async_trait]
pub trait HostProbe: Send + Sync {
    fn heap(&self) -> Option<HeapCounters>;

    fn resource_transfer_sizes(&self) -> Vec<u64>;

    fn connection(&self) -> Option<ConnectionInfo>;

    fn online(&self) -> bool;

    fn navigation_timing(&self) -> Option<NavigationTiming>;

    fn paint_entries(&self) -> Vec<PaintEntry>;

    fn performance_entry_count(&self) -> usize;

    /// Milliseconds since the host's time origin.
    fn clock_ms(&self) -> f64;

    fn screen(&self) -> ScreenInfo;

    fn navigator(&self) -> NavigatorInfo;

    async fn storage_estimate(&self) -> Option<Result<StorageEstimate, ProbeError>>;

    async fn battery(&self) -> Option<Result<BatteryStatus, ProbeError>>;

    fn feature(&self, feature: Feature) -> Result<bool, ProbeError>;
}
