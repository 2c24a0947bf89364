use std::fmt;

use crate::error::SpinError;
use crate::reward_matcher::RewardGrant;
use crate::reward_pool::RewardEntry;

pub type SubscriptionId = u64;

type Subscriber<T> = Box<dyn FnMut(&T) + Send>;

/// A publish point with any number of subscribers.
pub struct Subject<T> {
    next_id: SubscriptionId,
    subscribers: Vec<(SubscriptionId, Subscriber<T>)>,
}

impl<T> Subject<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, value: &T) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// The four notification channels of a wheel session.
#[derive(Debug, Default)]
pub struct SessionEvents {
    pub on_ready: Subject<Vec<RewardEntry>>,
    pub on_error: Subject<SpinError>,
    pub on_success: Subject<RewardGrant>,
    pub on_known_result_reward: Subject<RewardEntry>,
}
