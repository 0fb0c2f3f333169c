use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use clap::ValueEnum;
use serde::Deserialize;

use crate::{classify::Filter, invariants::RateKey};

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Longest window a tracker accepts; longer ones are clamped.
pub const MAX_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// When a tracked key is dropped from the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryPolicy {
    /// Every increment arms its own deadline and the first one to pass deletes
    /// the key, even if the key saw traffic after that increment.
    #[default]
    PerIncrement,
    /// Each increment pushes the key's deadline out by a full window.
    Refresh,
}

#[derive(Debug)]
struct Tracked {
    count: u64,
    expires_at: Instant,
}

/// Windowed request counter keyed by `category:url`.
///
/// Deadlines are kept in arming order and fired lazily whenever the tracker is
/// touched, so no background task is needed.
#[derive(Debug)]
pub struct RateTracker {
    window: Duration,
    policy: ExpiryPolicy,
    counts: HashMap<RateKey, Tracked>,
    deadlines: VecDeque<(Instant, RateKey)>,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, ExpiryPolicy::default())
    }
}

impl RateTracker {
    pub fn new(window: Duration, policy: ExpiryPolicy) -> Self {
        Self {
            window: window.min(MAX_WINDOW),
            policy,
            counts: HashMap::new(),
            deadlines: VecDeque::new(),
        }
    }

    pub fn increment(&mut self, key: RateKey) -> u64 {
        self.increment_at(key, Instant::now())
    }

    /// Bumps `key` and returns its count within the current window.
    pub fn increment_at(&mut self, key: RateKey, now: Instant) -> u64 {
        self.expire(now);
        let expires_at = now + self.window;
        let tracked = self.counts.entry(key.clone()).or_insert(Tracked {
            count: 0,
            expires_at,
        });
        tracked.count += 1;
        tracked.expires_at = expires_at;
        let count = tracked.count;
        self.deadlines.push_back((expires_at, key));
        count
    }

    /// Number of tracked keys whose url passes `filter`.
    pub fn active_endpoints(&mut self, filter: &Filter) -> usize {
        self.active_endpoints_at(filter, Instant::now())
    }

    pub fn active_endpoints_at(&mut self, filter: &Filter, now: Instant) -> usize {
        self.expire(now);
        self.counts
            .keys()
            .filter(|key| filter.should_log(key.url()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Pending deadlines, including ones that will find their key already gone.
    pub fn pending_deadlines(&self) -> usize {
        self.deadlines.len()
    }

    fn expire(&mut self, now: Instant) {
        while let Some((deadline, _)) = self.deadlines.front() {
            if *deadline > now {
                break;
            }
            let Some((deadline, key)) = self.deadlines.pop_front() else {
                break;
            };
            match self.policy {
                ExpiryPolicy::PerIncrement => {
                    self.counts.remove(&key);
                }
                ExpiryPolicy::Refresh => {
                    if self
                        .counts
                        .get(&key)
                        .is_some_and(|tracked| tracked.expires_at <= deadline)
                    {
                        self.counts.remove(&key);
                    }
                }
            }
        }
    }
}
