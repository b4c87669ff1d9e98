//! Turns raw distances into the proximity signal shown to the user.

use std::fmt;

use crate::device::types::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Critical,
    Close,
    Approaching,
    Visible,
    Far,
    Unknown,
}

/**
 * Upper (exclusive) bound of each tier, in ascending order. Anything at or beyond the last bound is
 * `Tier::Far`.
 */
const TIER_BOUNDS: [(f64, Tier); 4] = [
    (5.0, Tier::Critical),
    (10.0, Tier::Close),
    (20.0, Tier::Approaching),
    (50.0, Tier::Visible),
];

impl Tier {
    pub fn classify(distance: Option<f64>) -> Tier {
        let Some(distance) = distance else {
            return Tier::Unknown;
        };

        TIER_BOUNDS.iter()
            .find(|(bound, _)| distance < *bound)
            .map(|(_, tier)| *tier)
            .unwrap_or(Tier::Far)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Close => "close",
            Tier::Approaching => "approaching",
            Tier::Visible => "visible",
            Tier::Far => "far",
            Tier::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProximityState {
    pub is_near: bool,
    pub tier: Tier,
}

impl ProximityState {
    pub const UNKNOWN: ProximityState = ProximityState { is_near: false, tier: Tier::Unknown };
}

/// Derives the proximity state of a reading. Without a reading nothing is near.
pub fn update(reading: Option<Reading>, threshold: f64) -> ProximityState {
    match reading {
        None => ProximityState::UNKNOWN,
        Some(Reading { distance }) => ProximityState {
            is_near: distance < threshold,
            tier: Tier::classify(Some(distance)),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NearEdge {
    Entered,
    Left,
}

/// Reports when `is_near` flips, so that consumers react to crossing the threshold instead of to
/// every small change in distance.
#[derive(Debug, Default)]
pub struct NearDebouncer {
    is_near: bool,
}

impl NearDebouncer {
    pub fn is_near(&self) -> bool {
        self.is_near
    }

    pub fn observe(&mut self, state: &ProximityState) -> Option<NearEdge> {
        if state.is_near == self.is_near {
            return None;
        }

        self.is_near = state.is_near;
        Some(if state.is_near { NearEdge::Entered } else { NearEdge::Left })
    }
}
