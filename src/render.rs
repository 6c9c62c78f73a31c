use crate::dashboard::{DashboardView, Presenter};
use crate::history::{AnalyticsSummary, BandwidthVerdict, Direction, Insight, LatencyVerdict};
use crate::snapshot::{Feature, MemoryPressure, Snapshot};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::Duration;
use tracing::{info, warn};

/// Plain-text cards on stdout.
pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn show_trigger(&self) {
        info!("system monitor available");
    }

    fn hide_trigger(&self) {
        info!("system monitor removed");
    }

    fn render(&self, view: &DashboardView) {
        write_stdout(&format_view(view));
    }

    fn hide(&self) {
        info!("system monitor hidden");
    }
}

/// One JSON document per refresh on stdout.
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    fn show_trigger(&self) {}

    fn hide_trigger(&self) {}

    fn render(&self, view: &DashboardView) {
        match serde_json::to_string(view) {
            Ok(line) => write_stdout(&format!("{line}\n")),
            Err(err) => warn!(error = %err, "failed to encode dashboard view"),
        }
    }

    fn hide(&self) {}
}

fn write_stdout(text: &str) {
    let mut out = io::stdout().lock();
    if let Err(err) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        warn!(error = %err, "failed to write dashboard output");
    }
}

pub fn format_view(view: &DashboardView) -> String {
    let mut out = String::new();
    format_snapshot(&mut out, &view.snapshot);
    format_analytics(&mut out, &view.analytics);
    out
}

fn format_snapshot(out: &mut String, s: &Snapshot) {
    let mem = &s.memory;
    let _ = writeln!(
        out,
        "Memory       {}MB / {}MB ({}%, limit {}MB){}{}",
        mem.used_mb,
        mem.total_mb,
        mem.percent,
        mem.limit_mb,
        if mem.estimated { " estimated" } else { "" },
        match mem.pressure() {
            MemoryPressure::Low => " [low memory]",
            MemoryPressure::Elevated => " [elevated]",
            MemoryPressure::Normal => "",
        }
    );

    let net = &s.network;
    let _ = writeln!(
        out,
        "Network      {} {:.1}Mbps rtt {}ms ({:?}) {} data saver {}",
        net.effective_type,
        net.downlink_mbps,
        net.rtt_ms,
        s.connection_quality,
        if net.online { "online," } else { "offline," },
        if net.save_data { "on" } else { "off" }
    );

    let perf = &s.performance;
    let _ = writeln!(
        out,
        "Performance  load {}ms, dom ready {}ms, ttfb {}ms, fcp {}ms, heap api {}",
        perf.load_time_ms,
        perf.dom_ready_ms,
        perf.ttfb_ms,
        perf.fcp_ms,
        if perf.memory_supported { "yes" } else { "no" }
    );

    let screen = &s.screen;
    let _ = writeln!(
        out,
        "Screen       {}x{} {} {}bit {}x",
        screen.width, screen.height, screen.orientation, screen.color_depth, screen.pixel_ratio
    );

    let storage = &s.storage;
    let _ = write!(
        out,
        "Storage      {}MB / {}MB ({}%), persisted {}",
        storage.used_mb, storage.quota_mb, storage.percent, storage.is_persisted
    );
    if let Some(err) = &storage.error {
        let _ = write!(out, " [{err}]");
    }
    out.push('\n');

    let battery = &s.battery;
    if battery.supported {
        let _ = write!(
            out,
            "Battery      {}% {}",
            battery.level,
            if battery.charging { "charging" } else { "discharging" }
        );
        if let Some(mins) = battery.time_to_full_mins().filter(|_| battery.charging) {
            let _ = write!(
                out,
                ", {} to full",
                humantime::format_duration(Duration::from_secs(mins * 60))
            );
        }
        if let Some(mins) = battery.time_to_empty_mins().filter(|_| !battery.charging) {
            let _ = write!(
                out,
                ", {} left",
                humantime::format_duration(Duration::from_secs(mins * 60))
            );
        }
        out.push('\n');
    } else {
        let _ = writeln!(out, "Battery      not supported");
    }

    let _ = writeln!(
        out,
        "Device       {} ({}) {}",
        s.device.platform, s.device.language, s.device.user_agent
    );
    let _ = writeln!(
        out,
        "System       {:?}, {} cores, load {}% ({:?})",
        s.cpu.platform, s.cpu.cores, s.system_load.total, s.system_load.status
    );
    let _ = writeln!(
        out,
        "Capabilities {}/{} ({}%)",
        s.capabilities.supported_count(),
        Feature::ALL.len(),
        s.capabilities.coverage_percent()
    );
}

fn format_analytics(out: &mut String, analytics: &Insight<AnalyticsSummary>) {
    match analytics {
        Insight::Collecting { held, capacity } => {
            let _ = writeln!(
                out,
                "Analytics    collecting historical data... ({held}/{capacity} samples)"
            );
        }
        Insight::Ready(summary) => {
            let arrow = match summary.memory_trend {
                Direction::Up => "↑",
                Direction::Down => "↓",
                Direction::Flat => "→",
            };
            let _ = writeln!(
                out,
                "Analytics    memory avg {}% {} {}%, load avg {}ms, rtt avg {}ms ({}), downlink avg {}Mbps ({})",
                summary.avg_memory_percent,
                arrow,
                summary.memory_trend_percent,
                summary.avg_load_time_ms,
                summary.avg_rtt_ms,
                match summary.latency {
                    LatencyVerdict::High => "high",
                    LatencyVerdict::Good => "good",
                },
                summary.avg_downlink_mbps,
                match summary.bandwidth {
                    BandwidthVerdict::Fast => "fast",
                    BandwidthVerdict::Slow => "slow",
                },
            );
        }
    }
}
