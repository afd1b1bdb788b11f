//! Location values shared by rider flows.

use std::fmt;

use serde::{Deserialize, Serialize};

/// WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

/// A coordinate with a human-readable name (search result or geocoded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedLocation {
    /// Primary display name.
    pub title: String,
    /// Secondary line (street, city). `None` if the source had none.
    pub subtitle: Option<String>,
    /// Position on the map.
    pub coordinate: Coordinate,
}

impl NamedLocation {
    /// Create a location without a subtitle.
    pub fn new(title: impl Into<String>, coordinate: Coordinate) -> Self {
        Self { title: title.into(), subtitle: None, coordinate }
    }

    /// Attach a subtitle.
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }
}

/// A pickup or dropoff candidate during trip request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreTripLocation {
    /// The candidate location.
    pub location: NamedLocation,
    /// The rider explicitly confirmed this location.
    pub was_confirmed: bool,
}

impl PreTripLocation {
    /// Location the rider still has to confirm.
    pub fn unconfirmed(location: NamedLocation) -> Self {
        Self { location, was_confirmed: false }
    }

    /// Location the rider already confirmed.
    pub fn confirmed(location: NamedLocation) -> Self {
        Self { location, was_confirmed: true }
    }
}

/// Which of pickup or dropoff the rider is currently editing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationFocus {
    /// Pickup field is focused.
    #[default]
    Pickup,
    /// Dropoff field is focused.
    Dropoff,
}
