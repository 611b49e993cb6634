use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Facts the `neo` command reports. A user agent is present when the
/// front-end runs on behalf of a browser; otherwise the host is described.
#[derive(Clone, Debug, Default)]
pub struct ClientEnvironment {
    pub user_agent: Option<String>,
    pub platform: String,
    pub resolution: Option<(u16, u16)>,
    pub cores: Option<usize>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

impl ClientEnvironment {
    pub fn detect() -> Self {
        Self {
            user_agent: None,
            platform: whoami::platform().to_string(),
            resolution: None,
            cores: std::thread::available_parallelism().ok().map(|n| n.get()),
            locale: std::env::var("LC_ALL")
                .ok()
                .or_else(|| std::env::var("LANG").ok())
                .filter(|v| !v.is_empty()),
            timezone: std::env::var("TZ").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Blank agents are treated as absent.
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent.filter(|ua| !ua.trim().is_empty());
        self
    }

    pub fn os_guess(&self) -> String {
        match &self.user_agent {
            Some(ua) => os_from_user_agent(ua, &self.platform),
            None => whoami::distro(),
        }
    }

    pub fn browser_guess(&self) -> String {
        match &self.user_agent {
            Some(ua) => browser_from_user_agent(ua),
            None => "Terminal".to_string(),
        }
    }

    pub fn report(&self, uptime: Duration) -> Vec<String> {
        let resolution = self
            .resolution
            .map(|(w, h)| format!("{}×{}", w, h))
            .unwrap_or_else(|| "N/A".to_string());
        let cores = self
            .cores
            .map(|n| format!("{} cores", n))
            .unwrap_or_else(|| "N/A".to_string());
        vec![
            format!("OS: {}", self.os_guess()),
            format!("Host: {}", self.platform),
            format!("Browser: {}", self.browser_guess()),
            format!("Resolution: {}", resolution),
            format!("CPU: {}", cores),
            format!("Locale: {}", self.locale.as_deref().unwrap_or("N/A")),
            format!("Timezone: {}", self.timezone.as_deref().unwrap_or("N/A")),
            format!("Uptime: {}", format_uptime(uptime)),
        ]
    }
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

macro_rules! ua_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("user agent regex is valid"));
    };
}

ua_regex!(FIREFOX, r"Firefox/(\d+\.\d+)");
ua_regex!(EDGE, r"Edg/(\d+\.\d+)");
ua_regex!(OPERA, r"(?:OPR|Opera)/(\d+\.\d+)");
ua_regex!(CHROME, r"Chrome/(\d+\.\d+)");
ua_regex!(SAFARI, r"Version/(\d+\.\d+)");
ua_regex!(MAC, r"Mac OS X (\d+[._]\d+[._]?\d*)");
ua_regex!(WINDOWS, r"Windows NT (\d+\.\d+)");
ua_regex!(ANDROID, r"Android (\d+(?:\.\d+)?)");
ua_regex!(IOS, r"OS (\d+(?:[._]\d+)*)");

pub fn browser_from_user_agent(ua: &str) -> String {
    let (name, version) = if ua.contains("Firefox/") {
        ("Firefox", capture(&FIREFOX, ua))
    } else if ua.contains("Edg/") {
        ("Microsoft Edge", capture(&EDGE, ua))
    } else if ua.contains("OPR/") || ua.contains("Opera/") {
        ("Opera", capture(&OPERA, ua))
    } else if ua.contains("Chrome/") {
        ("Chrome", capture(&CHROME, ua))
    } else if ua.contains("Safari/") && !ua.contains("Chromium") {
        ("Safari", capture(&SAFARI, ua))
    } else {
        ("Unknown Browser", "Unknown".to_string())
    };
    format!("{} {}", name, version)
}

pub fn os_from_user_agent(ua: &str, platform: &str) -> String {
    // iPhone agents also claim "like Mac OS X".
    if ua.contains("iPhone OS") || ua.contains("iOS") {
        return format!("iOS {}", capture(&IOS, ua).replace('_', "."));
    }
    if ua.contains("Mac OS X") {
        return format!("macOS {}", capture(&MAC, ua).replace('_', "."));
    }
    if ua.contains("Windows NT") {
        let nt = WINDOWS
            .captures(ua)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let version = match nt.as_deref() {
            Some("10.0") => "10/11".to_string(),
            Some("6.3") => "8.1".to_string(),
            Some("6.2") => "8".to_string(),
            Some("6.1") => "7".to_string(),
            Some(other) => other.to_string(),
            None => "Unknown".to_string(),
        };
        return format!("Windows {}", version);
    }
    if ua.contains("Linux") || platform.contains("Linux") {
        for distro in ["Ubuntu", "Fedora", "SUSE"] {
            if ua.contains(distro) {
                return distro.to_string();
            }
        }
        // Android agents also say Linux.
        if ua.contains("Android") {
            return format!("Android {}", capture(&ANDROID, ua));
        }
        return "Linux".to_string();
    }
    if ua.contains("Android") {
        return format!("Android {}", capture(&ANDROID, ua));
    }
    "Unknown OS".to_string()
}

pub fn format_uptime(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
    const EDGE_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const FIREFOX_UBUNTU: &str =
        "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";

    #[test]
    fn browsers() {
        assert_eq!(browser_from_user_agent(CHROME_MAC), "Chrome 124.0");
        assert_eq!(browser_from_user_agent(EDGE_WIN), "Microsoft Edge 120.0");
        assert_eq!(browser_from_user_agent(FIREFOX_UBUNTU), "Firefox 125.0");
        assert_eq!(browser_from_user_agent(SAFARI_IPHONE), "Safari 17.4");
        assert_eq!(browser_from_user_agent("curl/8.0"), "Unknown Browser Unknown");
    }

    #[test]
    fn operating_systems() {
        assert_eq!(os_from_user_agent(CHROME_MAC, ""), "macOS 10.15.7");
        assert_eq!(os_from_user_agent(EDGE_WIN, ""), "Windows 10/11");
        assert_eq!(os_from_user_agent(FIREFOX_UBUNTU, ""), "Ubuntu");
        assert_eq!(
            os_from_user_agent("Mozilla/5.0 (Windows NT 6.1)", ""),
            "Windows 7"
        );
        assert_eq!(os_from_user_agent("x", "Linux"), "Linux");
        assert_eq!(os_from_user_agent(SAFARI_IPHONE, ""), "iOS 17.4");
        assert_eq!(os_from_user_agent("x", ""), "Unknown OS");
    }

    #[test]
    fn configured_agent_drives_guesses() {
        let env = ClientEnvironment::detect().with_user_agent(Some(EDGE_WIN.to_string()));
        assert_eq!(env.os_guess(), "Windows 10/11");
        assert_eq!(env.browser_guess(), "Microsoft Edge 120.0");

        let env = ClientEnvironment::detect().with_user_agent(Some("  ".to_string()));
        assert!(env.user_agent.is_none());
        assert_eq!(env.browser_guess(), "Terminal");
    }

    #[test]
    fn uptime_buckets() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 61)), "3h 1m");
        assert_eq!(
            format_uptime(Duration::from_secs(2 * 86400 + 5 * 3600 + 7 * 60)),
            "2d 5h 7m"
        );
    }

    #[test]
    fn report_has_every_field() {
        let env = ClientEnvironment {
            user_agent: Some(FIREFOX_UBUNTU.to_string()),
            platform: "Linux x86_64".into(),
            resolution: Some((1920, 1080)),
            cores: Some(8),
            locale: Some("en-US".into()),
            timezone: None,
        };
        let report = env.report(Duration::from_secs(5));
        assert_eq!(report.len(), 8);
        assert_eq!(report[0], "OS: Ubuntu");
        assert_eq!(report[3], "Resolution: 1920×1080");
        assert_eq!(report[4], "CPU: 8 cores");
        assert_eq!(report[6], "Timezone: N/A");
        assert_eq!(report[7], "Uptime: 5s");
    }
}
