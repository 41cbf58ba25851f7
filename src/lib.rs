pub mod actors;
pub mod config;
pub mod notify;
pub mod probe;
pub mod registry;
pub mod report;
pub mod status;
pub mod telegram;

use serde::{Deserialize, Serialize};

/// Binary liveness of a single monitored endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Up,
    Down,
}

impl Liveness {
    pub fn is_down(self) -> bool {
        matches!(self, Liveness::Down)
    }
}

/// One row of the endpoint list: a probed address and the site it belongs to.
///
/// Rows are not deduplicated. An address listed under two sites counts
/// towards both sites' totals and gets a prober per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub site: String,
}

impl Endpoint {
    pub fn new(address: impl ToString, site: impl ToString) -> Self {
        Self {
            address: address.to_string(),
            site: site.to_string(),
        }
    }
}
