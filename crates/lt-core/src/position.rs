//! Geographic position attached to every outbound chat message

use serde::{Deserialize, Serialize};

/// Latitude / longitude pair in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse `"<lat> <lng>"` or `"<lat>,<lng>"` as typed by a user
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let latitude: f64 = parts.next()?.parse().ok()?;
        let longitude: f64 = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        let position = Self::new(latitude, longitude);
        position.is_valid().then_some(position)
    }

    /// Finite and within the WGS84 latitude / longitude ranges
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Round to the six decimal places the backend expects
    pub fn rounded(self) -> Self {
        let round = |v: f64| (v * 1_000_000.0).round() / 1_000_000.0;
        Self::new(round(self.latitude), round(self.longitude))
    }
}

impl Default for Position {
    /// Jonggak station, Seoul
    fn default() -> Self {
        Self::new(37.5704, 126.9831)
    }
}
