use crate::snapshot::Snapshot;
use ringbuffer::{AllocRingBuffer, RingBuffer};
use serde::Serialize;

pub const DEFAULT_CAPACITY: usize = 50;
pub const DEFAULT_TREND_WINDOW: usize = 10;
const MIN_ENTRIES_FOR_ANALYTICS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp_unix_ms: i64,
    pub memory_percent: f64,
    pub load_time_ms: f64,
    pub rtt_ms: f64,
    pub downlink_mbps: f64,
}

impl HistoryEntry {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            timestamp_unix_ms: snapshot.collected_at_unix_ms,
            memory_percent: f64::from(snapshot.memory.percent),
            load_time_ms: snapshot.performance.load_time_ms as f64,
            rtt_ms: snapshot.network.rtt_ms,
            downlink_mbps: snapshot.network.downlink_mbps,
        }
    }

    fn field(&self, field: HistoryField) -> f64 {
        match field {
            HistoryField::MemoryPercent => self.memory_percent,
            HistoryField::LoadTimeMs => self.load_time_ms,
            HistoryField::RttMs => self.rtt_ms,
            HistoryField::DownlinkMbps => self.downlink_mbps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryField {
    MemoryPercent,
    LoadTimeMs,
    RttMs,
    DownlinkMbps,
}

/// Result of an analytics query; `Collecting` until at least two entries are
/// held.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Insight<T> {
    Collecting { held: usize, capacity: usize },
    Ready(T),
}

impl<T> Insight<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Insight::Ready(v) => Some(v),
            Insight::Collecting { .. } => None,
        }
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self, Insight::Collecting { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub memory_delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 {
            Direction::Up
        } else if delta < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyVerdict {
    Good,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandwidthVerdict {
    Fast,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyticsSummary {
    pub samples: usize,
    pub avg_memory_percent: i64,
    pub avg_load_time_ms: i64,
    pub avg_rtt_ms: i64,
    pub avg_downlink_mbps: i64,
    pub memory_trend: Direction,
    pub memory_trend_percent: i64,
    pub latency: LatencyVerdict,
    pub bandwidth: BandwidthVerdict,
}

/// Fixed-capacity rolling window of [`HistoryEntry`] values, oldest first.
/// Appending past capacity evicts exactly the oldest entry.
pub struct HistoryBuffer {
    entries: AllocRingBuffer<HistoryEntry>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: AllocRingBuffer::new(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, snapshot: &Snapshot) {
        self.push(HistoryEntry::from_snapshot(snapshot));
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn collecting<T>(&self) -> Option<Insight<T>> {
        if self.len() < MIN_ENTRIES_FOR_ANALYTICS {
            Some(Insight::Collecting {
                held: self.len(),
                capacity: self.capacity,
            })
        } else {
            None
        }
    }

    /// Mean of `field` over every held entry.
    pub fn average(&self, field: HistoryField) -> Insight<f64> {
        if let Some(pending) = self.collecting() {
            return pending;
        }
        Insight::Ready(mean(self.entries.iter().map(|e| e.field(field))))
    }

    /// Mean memory of the newest `window` entries minus that of the oldest
    /// `window` entries. The two windows overlap when fewer than
    /// `2 * window` entries are held.
    pub fn trend(&self, window: usize) -> Insight<Trend> {
        if let Some(pending) = self.collecting() {
            return pending;
        }
        let window = window.clamp(1, self.len());
        let recent = mean(
            self.entries
                .iter()
                .skip(self.len() - window)
                .map(|e| e.memory_percent),
        );
        let oldest = mean(self.entries.iter().take(window).map(|e| e.memory_percent));
        Insight::Ready(Trend {
            memory_delta: recent - oldest,
        })
    }

    pub fn summary(&self, window: usize) -> Insight<AnalyticsSummary> {
        if let Some(pending) = self.collecting() {
            return pending;
        }
        let avg = |field| self.average(field).ready().unwrap_or(0.0).round() as i64;
        let memory_delta = self.trend(window).ready().map_or(0.0, |t| t.memory_delta);
        let avg_rtt_ms = avg(HistoryField::RttMs);
        let avg_downlink_mbps = avg(HistoryField::DownlinkMbps);

        Insight::Ready(AnalyticsSummary {
            samples: self.len(),
            avg_memory_percent: avg(HistoryField::MemoryPercent),
            avg_load_time_ms: avg(HistoryField::LoadTimeMs),
            avg_rtt_ms,
            avg_downlink_mbps,
            memory_trend: Direction::of(memory_delta),
            memory_trend_percent: memory_delta.abs().round() as i64,
            latency: if avg_rtt_ms > 100 {
                LatencyVerdict::High
            } else {
                LatencyVerdict::Good
            },
            bandwidth: if avg_downlink_mbps > 5 {
                BandwidthVerdict::Fast
            } else {
                BandwidthVerdict::Slow
            },
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
