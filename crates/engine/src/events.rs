//! Invalidation bus.
//!
//! Every committed mutation bumps the version of the topics it touched and
//! broadcasts an [`Invalidation`]. Readers compare versions to know which
//! views are stale.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Transactions,
    TransactionTags,
    Tags,
    Balance,
    Documents,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Transactions,
        Topic::TransactionTags,
        Topic::Tags,
        Topic::Balance,
        Topic::Documents,
    ];

    const fn index(self) -> usize {
        match self {
            Topic::Transactions => 0,
            Topic::TransactionTags => 1,
            Topic::Tags => 2,
            Topic::Balance => 3,
            Topic::Documents => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Topic::Transactions => "transactions",
            Topic::TransactionTags => "transaction_tags",
            Topic::Tags => "tags",
            Topic::Balance => "balance",
            Topic::Documents => "documents",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidation {
    pub topic: Topic,
    pub version: u64,
}

#[derive(Debug)]
pub struct EventBus {
    versions: [AtomicU64; 5],
    sender: broadcast::Sender<Invalidation>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            versions: Default::default(),
            sender,
        }
    }
}

impl EventBus {
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.sender.subscribe()
    }

    /// Bumps every topic in `topics` and notifies subscribers.
    pub fn publish(&self, topics: &[Topic]) {
        for topic in topics {
            let version = self.versions[topic.index()].fetch_add(1, Ordering::SeqCst) + 1;
            // No receivers is fine: versions are still readable.
            let _ = self.sender.send(Invalidation {
                topic: *topic,
                version,
            });
        }
    }

    #[must_use]
    pub fn version(&self, topic: Topic) -> u64 {
        self.versions[topic.index()].load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<(Topic, u64)> {
        Topic::ALL
            .iter()
            .map(|topic| (*topic, self.version(*topic)))
            .collect()
    }
}
