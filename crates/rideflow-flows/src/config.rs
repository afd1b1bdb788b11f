//! Per-flow configuration.
//!
//! Retry budgets differ between flows: trip creation and trip edits retry a
//! bounded number of times and then roll back, while step completion keeps
//! retrying (with a delay) until it succeeds.

use std::time::Duration;

use rideflow_core::{RetryBudget, RetryStrategy};

/// Retries after a failed trip creation before rolling back.
pub const DEFAULT_TRIP_CREATION_RETRIES: u32 = 3;

/// Retries after a failed pickup/dropoff edit before rolling back.
pub const DEFAULT_EDIT_RETRIES: u32 = 5;

/// Retries after a failed vehicle-state sync when going offline.
pub const DEFAULT_VEHICLE_SYNC_RETRIES: u32 = 3;

/// Seat count used when seat selection is disabled.
pub const DEFAULT_SEAT_COUNT: u32 = 1;

/// Largest seat count a rider can request.
pub const DEFAULT_MAX_SEAT_COUNT: u32 = 2;

/// Delay between step completion attempts.
pub const DEFAULT_CONFIRMATION_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Configuration for [`crate::LocationSelectionFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSelectionConfig {
    /// Rider may search for a pickup.
    pub pickup_search_enabled: bool,
    /// Rider may search for a dropoff.
    pub dropoff_search_enabled: bool,
    /// Budget for reverse geocoding a map position.
    pub geocode_retry: RetryBudget,
}

impl Default for LocationSelectionConfig {
    fn default() -> Self {
        Self {
            pickup_search_enabled: true,
            dropoff_search_enabled: true,
            geocode_retry: RetryBudget::immediate(1),
        }
    }
}

/// Configuration for [`crate::PreTripFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreTripConfig {
    /// Ask for a seat count before creating the trip.
    pub seat_selection_enabled: bool,
    /// Seat count used when seat selection is disabled.
    pub default_seat_count: u32,
    /// Largest seat count accepted by `confirm`.
    pub max_seat_count: u32,
    /// Budget for trip creation.
    pub creation_retry: RetryBudget,
}

impl Default for PreTripConfig {
    fn default() -> Self {
        Self {
            seat_selection_enabled: false,
            default_seat_count: DEFAULT_SEAT_COUNT,
            max_seat_count: DEFAULT_MAX_SEAT_COUNT,
            creation_retry: RetryBudget::immediate(DEFAULT_TRIP_CREATION_RETRIES),
        }
    }
}

/// Configuration for [`crate::OnTripEditFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnTripEditConfig {
    /// Budget for pickup/dropoff updates.
    pub edit_retry: RetryBudget,
}

impl Default for OnTripEditConfig {
    fn default() -> Self {
        Self { edit_retry: RetryBudget::immediate(DEFAULT_EDIT_RETRIES) }
    }
}

/// Configuration for [`crate::DrivingPhaseFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrivingPhaseConfig {
    /// Budget for the vehicle-state sync when going offline.
    pub vehicle_sync_retry: RetryBudget,
}

impl Default for DrivingPhaseConfig {
    fn default() -> Self {
        Self { vehicle_sync_retry: RetryBudget::immediate(DEFAULT_VEHICLE_SYNC_RETRIES) }
    }
}

/// Configuration for [`crate::ConfirmationFlow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationConfig {
    /// Budget for each step completion.
    pub step_retry: RetryBudget,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            step_retry: RetryBudget::unbounded(RetryStrategy::Fixed(
                DEFAULT_CONFIRMATION_RETRY_DELAY,
            )),
        }
    }
}
