//! Shared Host/Site state and its single mutation entry point.
//!
//! The registry is owned by the alert engine task. Probers never touch it
//! directly: they send [`ProbeReport`] messages, and the engine funnels
//! every liveness change through [`SiteRegistry::record_transition`]. That
//! one owner is what keeps the down-count invariant
//! (`0 <= down <= total` for every site) safe without any locking.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::actors::messages::ProbeReport;
use crate::{Endpoint, Liveness};

/// Identity of one endpoint row. The same address under two different
/// sites is two distinct hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostKey {
    pub address: String,
    pub site: String,
}

impl HostKey {
    pub fn of(report: &ProbeReport) -> Self {
        Self {
            address: report.address.clone(),
            site: report.site.clone(),
        }
    }
}

/// Mutable per-site state. Only the registry and the alert engine write
/// to it; everything else sees [`SiteSnapshot`] copies.
#[derive(Debug, Clone)]
pub struct SiteState {
    pub name: String,
    pub total: usize,
    pub down: usize,
    pub alert_active: bool,
    pub last_change: DateTime<Utc>,
}

impl SiteState {
    /// Fraction of hosts currently down. A site with no hosts has ratio
    /// 0.0 and therefore never alerts.
    pub fn fail_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.down as f64 / self.total as f64
    }
}

/// Read-only copy of a site's state for dashboards, queries and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSnapshot {
    pub name: String,
    pub total: usize,
    pub down: usize,
    pub alert_active: bool,
    pub last_change: DateTime<Utc>,
}

/// The keyed Host/Site collection built once at startup.
///
/// Hosts start `Up`, as the original endpoint list loader assumed; the
/// first probe report corrects that where reality disagrees.
pub struct SiteRegistry {
    hosts: HashMap<HostKey, Liveness>,
    sites: BTreeMap<String, SiteState>,
}

impl SiteRegistry {
    pub fn new(endpoints: &[Endpoint], now: DateTime<Utc>) -> Self {
        let mut hosts = HashMap::new();
        let mut sites: BTreeMap<String, SiteState> = BTreeMap::new();

        for endpoint in endpoints {
            let site = sites
                .entry(endpoint.site.clone())
                .or_insert_with(|| SiteState {
                    name: endpoint.site.clone(),
                    total: 0,
                    down: 0,
                    alert_active: false,
                    last_change: now,
                });
            // Every row counts, even a literal duplicate of a previous one.
            site.total += 1;

            hosts.insert(
                HostKey {
                    address: endpoint.address.clone(),
                    site: endpoint.site.clone(),
                },
                Liveness::Up,
            );
        }

        Self { hosts, sites }
    }

    /// Overwrite `last_change` for sites present in a persisted status
    /// mapping. Unknown sites in the mapping are ignored; sites without a
    /// persisted entry keep "now" from construction.
    pub fn seed_last_change(&mut self, persisted: &HashMap<String, DateTime<Utc>>) {
        for site in self.sites.values_mut() {
            if let Some(timestamp) = persisted.get(&site.name) {
                trace!("{}: restored last change {}", site.name, timestamp);
                site.last_change = *timestamp;
            }
        }
    }

    /// Apply a liveness report. The sole mutation entry point for host
    /// state: flips the stored liveness and adjusts the owning site's
    /// down-count by one, or does nothing if the report is not actually a
    /// transition. Returns whether anything changed.
    pub fn record_transition(&mut self, report: &ProbeReport) -> bool {
        let key = HostKey::of(report);
        let Some(stored) = self.hosts.get_mut(&key) else {
            warn!(
                "{}: report for unknown host {}, ignoring",
                report.site, report.address
            );
            return false;
        };

        if *stored == report.liveness {
            return false;
        }
        *stored = report.liveness;

        let Some(site) = self.sites.get_mut(&report.site) else {
            // Unreachable while hosts and sites are built together.
            warn!("{}: host without a site record", report.site);
            return false;
        };

        match report.liveness {
            Liveness::Down => site.down += 1,
            Liveness::Up => site.down = site.down.saturating_sub(1),
        }
        debug!(
            "{}: {} is now {:?} ({} of {} down)",
            site.name, report.address, report.liveness, site.down, site.total
        );
        true
    }

    /// Number of distinct host rows being tracked.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn sites(&self) -> impl Iterator<Item = &SiteState> {
        self.sites.values()
    }

    pub fn sites_mut(&mut self) -> impl Iterator<Item = &mut SiteState> {
        self.sites.values_mut()
    }

    pub fn site(&self, name: &str) -> Option<&SiteState> {
        self.sites.get(name)
    }

    pub fn snapshot(&self) -> Vec<SiteSnapshot> {
        self.sites
            .values()
            .map(|site| SiteSnapshot {
                name: site.name.clone(),
                total: site.total,
                down: site.down,
                alert_active: site.alert_active,
                last_change: site.last_change,
            })
            .collect()
    }

    /// The persistable view: site name to last state change.
    pub fn last_changes(&self) -> HashMap<String, DateTime<Utc>> {
        self.sites
            .values()
            .map(|site| (site.name.clone(), site.last_change))
            .collect()
    }
}
