//! Groups temporally adjacent signals of the same domain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ClusteringConfig;
use crate::types::{IntelligentSignal, SignalDomain, Urgency};

/// A group of related signals shown as one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCluster {
    pub id: String,
    pub domain: SignalDomain,
    pub signal_ids: Vec<String>,
    /// Most urgent member urgency.
    pub urgency: Urgency,
    pub created_at: DateTime<Utc>,
    pub window_ends_at: DateTime<Utc>,
    pub title: String,
    pub max_sis: u8,
}

impl NotificationCluster {
    pub fn len(&self) -> usize {
        self.signal_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal_ids.is_empty()
    }

    pub fn contains(&self, signal_id: &str) -> bool {
        self.signal_ids.iter().any(|id| id == signal_id)
    }

    /// Whether `at` falls inside the cluster's time window.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.created_at && at <= self.window_ends_at
    }

    fn push(&mut self, signal: &IntelligentSignal) {
        self.signal_ids.push(signal.id.clone());
        self.urgency = self.urgency.min(signal.urgency);
        self.max_sis = self.max_sis.max(signal.sis);
        self.title = cluster_title(self.domain, self.signal_ids.len());
    }
}

fn cluster_title(domain: SignalDomain, count: usize) -> String {
    if count == 1 {
        format!("1 {} signal", domain)
    } else {
        format!("{} {} signals", count, domain)
    }
}

/// Builds and extends clusters.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    window: Duration,
    max_members: usize,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new(&ClusteringConfig::default())
    }
}

impl ClusterBuilder {
    pub fn new(config: &ClusteringConfig) -> Self {
        Self {
            window: Duration::hours(config.window_hours.max(0)),
            max_members: config.max_members.max(1),
        }
    }

    pub fn max_members(&self) -> usize {
        self.max_members
    }

    /// Cluster the given signals.
    ///
    /// Signals with an empty id are skipped. The domain comes from the first valid
    /// signal and members of other domains are skipped too. Returns `None` when
    /// nothing valid is left.
    pub fn create_cluster(
        &self,
        signals: &[IntelligentSignal],
        now: DateTime<Utc>,
    ) -> Option<NotificationCluster> {
        let mut valid = signals.iter().filter(|s| s.is_valid());
        let first = valid.next()?;

        let mut cluster = self.start(first, now);
        for signal in valid.filter(|s| s.domain == first.domain) {
            if cluster.len() >= self.max_members {
                break;
            }
            cluster.push(signal);
        }
        Some(cluster)
    }

    /// Put `signal` in the most recent open cluster of its domain, or start a new one.
    ///
    /// Returns the id of the cluster the signal ended up in, or `None` if the signal
    /// is invalid.
    pub fn find_or_create_cluster(
        &self,
        clusters: &mut Vec<NotificationCluster>,
        signal: &IntelligentSignal,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if !signal.is_valid() {
            return None;
        }
        if let Some(existing) = clusters.iter().find(|c| c.contains(&signal.id)) {
            return Some(existing.id.clone());
        }

        let open = clusters
            .iter_mut()
            .filter(|c| {
                c.domain == signal.domain && c.covers(signal.created_at) && c.len() < self.max_members
            })
            .max_by_key(|c| c.created_at);

        match open {
            Some(cluster) => {
                cluster.push(signal);
                Some(cluster.id.clone())
            }
            None => {
                let cluster = self.start(signal, now);
                let id = cluster.id.clone();
                clusters.push(cluster);
                Some(id)
            }
        }
    }

    /// Drop the oldest clusters beyond `limit`.
    pub fn prune(&self, clusters: &mut Vec<NotificationCluster>, limit: usize) {
        if clusters.len() <= limit {
            return;
        }
        clusters.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        clusters.truncate(limit);
    }

    /// The window opens at the founding signal's arrival, never later than `now`.
    fn start(&self, signal: &IntelligentSignal, now: DateTime<Utc>) -> NotificationCluster {
        let opened_at = signal.created_at.min(now);
        NotificationCluster {
            id: Uuid::new_v4().to_string(),
            domain: signal.domain,
            signal_ids: vec![signal.id.clone()],
            urgency: signal.urgency,
            created_at: opened_at,
            window_ends_at: opened_at + self.window,
            title: cluster_title(signal.domain, 1),
            max_sis: signal.sis,
        }
    }
}
