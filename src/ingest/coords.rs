//! Coordinate extraction from map links.
//!
//! Shortened links (`maps.app.goo.gl/...`) carry no coordinates and are not
//! followed; they yield `None` like any other unrecognised text.

use std::sync::LazyLock;

use regex::Regex;

/// `.../@-42.123,-71.456,15z`
static AT_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([-+]?\d+\.\d+),([-+]?\d+\.\d+)").expect("valid regex")
});

/// `...?q=-42.123,-71.456`
static Q_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"q=([-+]?\d+\.\d+),([-+]?\d+\.\d+)").expect("valid regex")
});

/// A decimal-degree position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Recover a position from free text containing a map link.
pub fn extract_coordinates(text: &str) -> Option<Coordinates> {
    [&*AT_SEGMENT_RE, &*Q_PARAM_RE]
        .into_iter()
        .find_map(|re| {
            let caps = re.captures(text)?;
            let lat = caps[1].parse::<f64>().ok()?;
            let lng = caps[2].parse::<f64>().ok()?;
            Some(Coordinates { lat, lng })
        })
}
