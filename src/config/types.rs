use serde::{Deserialize, Serialize};

use crate::device::constants::{DEFAULT_ENDPOINT, DEFAULT_PROXIMITY_THRESHOLD};
use crate::device::endpoint::Endpoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub endpoint: Endpoint,
    // centimeters
    pub proximity_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: Endpoint::parse(DEFAULT_ENDPOINT).expect("DEFAULT_ENDPOINT is a valid endpoint"),
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
        }
    }
}
