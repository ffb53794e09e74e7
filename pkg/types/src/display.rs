use once_cell::sync::Lazy;
use regex::Regex;

static DISPLAY_SPEC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+)?(:\d+)(\.\d+)?$").expect("static regex is valid"));

/// A parsed `DISPLAY`-style spec such as `:0`, `:0.1` or `foo:1.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySpec {
    pub host: Option<String>,
    pub display_part: String,
    pub screen: u32,
}

impl DisplaySpec {
    /// The second-screen spec derived by flipping screen `0 <-> 1`, written
    /// out as `DISPLAY=<host><:display>.<second-screen>`.
    pub fn second_display_line(&self) -> String {
        let second_screen = if self.screen == 0 { 1 } else { 0 };
        format!(
            "DISPLAY={}{}.{}",
            self.host.as_deref().unwrap_or(""),
            self.display_part,
            second_screen
        )
    }
}

/// `start()` refuses to run unless this passes. Reuses the same parser as
/// `set_display`, against the effective `DISPLAY` (or a caller-supplied
/// default when unset).
pub fn check_configured_display(display: Option<&str>) -> bool {
    parse_display_spec(display.unwrap_or(":0")).is_some()
}

/// Validate and parse a display spec against `^(\w+)?(:\d+)(\.\d+)?$`.
pub fn parse_display_spec(spec: &str) -> Option<DisplaySpec> {
    let caps = DISPLAY_SPEC_RE.captures(spec)?;
    let host = caps.get(1).map(|m| m.as_str().to_string());
    let display_part = caps.get(2)?.as_str().to_string();
    let screen = caps
        .get(3)
        .and_then(|m| m.as_str().trim_start_matches('.').parse().ok())
        .unwrap_or(0);
    Some(DisplaySpec {
        host,
        display_part,
        screen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_display_defaults_screen_zero() {
        let spec = parse_display_spec(":0").unwrap();
        assert_eq!(spec.second_display_line(), "DISPLAY=:0.1");
    }

    #[test]
    fn screen_zero_flips_to_one() {
        let spec = parse_display_spec(":0.0").unwrap();
        assert_eq!(spec.second_display_line(), "DISPLAY=:0.1");
    }

    #[test]
    fn screen_one_flips_to_zero() {
        let spec = parse_display_spec(":0.1").unwrap();
        assert_eq!(spec.second_display_line(), "DISPLAY=:0.0");
    }

    #[test]
    fn host_is_preserved() {
        let spec = parse_display_spec("foo:1").unwrap();
        assert_eq!(spec.host.as_deref(), Some("foo"));
        assert_eq!(spec.second_display_line(), "DISPLAY=foo:1.1");
    }

    #[test]
    fn invalid_spec_is_rejected() {
        assert!(parse_display_spec("not-a-display").is_none());
    }

    #[test]
    fn check_configured_display_defaults_to_colon_zero() {
        assert!(check_configured_display(None));
        assert!(!check_configured_display(Some("not-a-display")));
    }
}
