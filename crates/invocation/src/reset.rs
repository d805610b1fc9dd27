//! Extracts a quota reset estimate from error text.
//!
//! Quota errors from the backend end with a sentence like
//! `Your quota will reset after 15h11m58s.` The components are ordered and
//! each is optional, so `reset after 45m` and `reset after 2h` are both valid.
//! A minutes slot written as `500ms` is read as milliseconds.

use std::sync::LazyLock;

use regex::Regex;

static RESET_AFTER: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)reset\s+after\s+(?:(?P<h>\d+(?:\.\d+)?)\s*h)?\s*(?:(?P<m>\d+(?:\.\d+)?)\s*(?P<m_unit>ms|m))?\s*(?:(?P<s>\d+(?:\.\d+)?)\s*s)?",
    )
    .ok()
});

/// Returns the fractional hours until reset, or `None` if the text carries
/// no reset hint.
pub fn parse_reset_hours(raw: &str) -> Option<f64> {
    let re = RESET_AFTER.as_ref()?;

    for caps in re.captures_iter(raw) {
        let component = |name: &str| -> Option<f64> {
            caps.name(name).and_then(|m| m.as_str().parse::<f64>().ok())
        };
        let (h, m, s) = (component("h"), component("m"), component("s"));
        if h.is_none() && m.is_none() && s.is_none() {
            continue;
        }

        // `ms` shares its first letter with minutes.
        let millis = caps
            .name("m_unit")
            .is_some_and(|u| u.as_str().eq_ignore_ascii_case("ms"));
        let m_hours = match m {
            Some(v) if millis => v / 3_600_000.0,
            Some(v) => v / 60.0,
            None => 0.0,
        };
        let hours = h.unwrap_or(0.0) + m_hours + s.unwrap_or(0.0) / 3600.0;
        if hours.is_finite() {
            return Some(hours);
        }
    }

    None
}
