use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

pub const DEV_PORTS: [u16; 6] = [3000, 3001, 4200, 8080, 8000, 9000];
const LOOPBACK_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];
const DEBUG_KEY: &str = "debug";

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid page url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

/// Which activation rule matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    Loopback,
    LocalFile,
    DevPort(u16),
    PrivateNetwork,
    DebugFlag,
}

/// The parts of a page address the gate looks at. `port` is `None` when the
/// address uses its scheme's default port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLocation {
    pub host: String,
    pub scheme: String,
    pub port: Option<u16>,
    pub query: Vec<(String, String)>,
}

impl PageLocation {
    pub fn parse(raw: &str) -> Result<Self, GateError> {
        let url = Url::parse(raw).map_err(|source| GateError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        Ok(Self {
            host: url.host_str().unwrap_or_default().to_string(),
            scheme: url.scheme().to_string(),
            port: url.port(),
            query: url.query_pairs().into_owned().collect(),
        })
    }
}

fn private_network_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(192\.168\.|10\.|172\.(1[6-9]|2[0-9]|3[0-1])\.)")
            .expect("private network pattern is valid")
    })
}

/// First matching activation rule, in precedence order.
pub fn decide_reason(
    host: &str,
    scheme: &str,
    port: Option<u16>,
    query: &[(String, String)],
) -> Option<GateReason> {
    if LOOPBACK_HOSTS.contains(&host) {
        return Some(GateReason::Loopback);
    }
    if scheme.trim_end_matches(':') == "file" {
        return Some(GateReason::LocalFile);
    }
    if let Some(port) = port.filter(|p| DEV_PORTS.contains(p)) {
        return Some(GateReason::DevPort(port));
    }
    if private_network_pattern().is_match(host) {
        return Some(GateReason::PrivateNetwork);
    }
    if query.iter().any(|(key, _)| key == DEBUG_KEY) {
        return Some(GateReason::DebugFlag);
    }
    None
}

pub fn decide(host: &str, scheme: &str, port: Option<u16>, query: &[(String, String)]) -> bool {
    decide_reason(host, scheme, port, query).is_some()
}

/// Activation decision taken once at startup, with a sticky manual override.
#[derive(Debug, Clone)]
pub struct EnvironmentGate {
    reason: Option<GateReason>,
    forced: Option<bool>,
}

impl EnvironmentGate {
    pub fn evaluate(location: &PageLocation) -> Self {
        Self {
            reason: decide_reason(
                &location.host,
                &location.scheme,
                location.port,
                &location.query,
            ),
            forced: None,
        }
    }

    pub fn reason(&self) -> Option<GateReason> {
        self.reason
    }

    pub fn detected(&self) -> bool {
        self.reason.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.forced.unwrap_or(self.reason.is_some())
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.forced = Some(enabled);
    }

    pub fn is_overridden(&self) -> bool {
        self.forced.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(url: &str) -> Option<GateReason> {
        let loc = PageLocation::parse(url).unwrap();
        decide_reason(&loc.host, &loc.scheme, loc.port, &loc.query)
    }

    #[test]
    fn loopback_wins_regardless_of_port() {
        assert_eq!(gate("http://localhost:443/"), Some(GateReason::Loopback));
        assert_eq!(gate("http://localhost:3000/"), Some(GateReason::Loopback));
        assert_eq!(gate("http://127.0.0.1/app"), Some(GateReason::Loopback));
    }

    #[test]
    fn file_scheme_enables() {
        assert_eq!(gate("file:///home/dev/index.html"), Some(GateReason::LocalFile));
        assert!(decide("", "file:", None, &[]));
    }

    #[test]
    fn dev_ports_enable() {
        for port in DEV_PORTS {
            let url = format!("https://example.com:{port}/");
            assert_eq!(gate(&url), Some(GateReason::DevPort(port)), "{url}");
        }
        assert_eq!(gate("https://example.com:8443/"), None);
    }

    #[test]
    fn private_ranges() {
        assert_eq!(gate("http://192.168.1.20/"), Some(GateReason::PrivateNetwork));
        assert_eq!(gate("http://10.0.0.5/"), Some(GateReason::PrivateNetwork));
        assert_eq!(gate("http://172.16.0.1/"), Some(GateReason::PrivateNetwork));
        assert_eq!(gate("http://172.31.255.255/"), Some(GateReason::PrivateNetwork));
        assert_eq!(gate("http://172.15.0.1/"), None);
        assert_eq!(gate("http://172.32.0.1/"), None);
        assert_eq!(gate("http://192.169.0.1/"), None);
    }

    #[test]
    fn outside_private_range_still_matches_later_rules() {
        assert_eq!(
            gate("http://172.32.0.1:8080/"),
            Some(GateReason::DevPort(8080))
        );
        assert_eq!(gate("http://172.32.0.1/?debug"), Some(GateReason::DebugFlag));
    }

    #[test]
    fn debug_flag_present_with_any_value() {
        assert_eq!(gate("https://example.com/?debug"), Some(GateReason::DebugFlag));
        assert_eq!(gate("https://example.com/?debug=true"), Some(GateReason::DebugFlag));
        assert_eq!(gate("https://example.com/?debug=0"), Some(GateReason::DebugFlag));
        assert_eq!(gate("https://example.com/?debugging=true"), None);
    }

    #[test]
    fn public_host_is_disabled() {
        assert_eq!(gate("https://203.0.113.5:443/"), None);
        assert!(!decide("203.0.113.5", "https", Some(443), &[]));
    }

    #[test]
    fn default_port_is_not_reported() {
        let loc = PageLocation::parse("https://example.com:443/").unwrap();
        assert_eq!(loc.port, None);
        let loc = PageLocation::parse("http://example.com:8000/").unwrap();
        assert_eq!(loc.port, Some(8000));
    }

    #[test]
    fn invalid_url_is_an_error() {
        assert!(matches!(
            PageLocation::parse("not a url"),
            Err(GateError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn override_is_sticky() {
        let loc = PageLocation::parse("https://shop.example.com/").unwrap();
        let mut gate = EnvironmentGate::evaluate(&loc);
        assert!(!gate.is_enabled());
        assert!(!gate.is_overridden());

        gate.set_enabled(true);
        assert!(gate.is_enabled());
        assert!(!gate.detected());

        gate.set_enabled(false);
        assert!(!gate.is_enabled());
        assert!(gate.is_overridden());
    }
}
