use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use prometheus::IntGauge;
use tokio::sync::Notify;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::DeliveryConfig;
use crate::error::{AppError, DeliveryError};
use crate::models::notification::{DeliveryState, NotificationEvent, PriorityClass};
use crate::notify::backoff::RetryPolicy;

struct Queued {
    priority: PriorityClass,
    created_at: DateTime<Utc>,
    sequence: u64,
    event: NotificationEvent,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap is a max-heap: the "greatest" entry is the most urgent one,
// i.e. the lowest priority class, then the oldest event.
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Default)]
struct QueueState {
    ready: BinaryHeap<Queued>,
    /// Events waiting out a retry backoff.
    deferred: Vec<Queued>,
}

impl QueueState {
    fn len(&self) -> usize {
        self.ready.len() + self.deferred.len()
    }

    fn promote_due(&mut self, now: DateTime<Utc>) {
        let (due, waiting): (Vec<Queued>, Vec<Queued>) =
            self.deferred.drain(..).partition(|queued| {
                queued
                    .event
                    .next_attempt_at
                    .is_none_or(|next_attempt_at| next_attempt_at <= now)
            });
        self.deferred = waiting;
        self.ready.extend(due);
    }
}

/// Priority queue of outbound notifications plus the log of emitted events
/// and their delivery state. The log doubles as the in-app inbox.
pub struct NotificationDispatcher {
    queue: Mutex<QueueState>,
    sequence: AtomicU64,
    log: DashMap<Uuid, NotificationEvent>,
    wakeup: Notify,
    retry: RetryPolicy,
    retention: Duration,
    queued_gauge: IntGauge,
}

impl NotificationDispatcher {
    pub fn new(config: DeliveryConfig, queued_gauge: IntGauge) -> Self {
        Self {
            queue: Mutex::new(QueueState::default()),
            sequence: AtomicU64::new(0),
            log: DashMap::new(),
            wakeup: Notify::new(),
            retry: RetryPolicy::new(&config),
            retention: Duration::try_seconds(config.retention_secs).unwrap_or(Duration::MAX),
            queued_gauge,
        }
    }

    pub fn enqueue(&self, mut event: NotificationEvent) -> Uuid {
        let id = event.id;
        event.delivery_state = DeliveryState::Pending;
        self.log.insert(id, event.clone());

        let priority = event.priority;
        let backlog = {
            let mut queue = self.lock();
            let backlog = queue.len();
            self.push(&mut queue.ready, event);
            self.queued_gauge.set(queue.len() as i64);
            backlog
        };

        if priority == PriorityClass::Emergency {
            warn!(
                notification_id = %id,
                backlog,
                "emergency notification queued ahead of backlog"
            );
        }

        self.wakeup.notify_one();
        id
    }

    /// Removes and returns the most urgent event that is due at `now`.
    /// Taking one event at a time lets an emergency enqueued mid-delivery
    /// overtake everything still waiting.
    pub fn pop_next(&self, now: DateTime<Utc>) -> Option<NotificationEvent> {
        let mut queue = self.lock();
        queue.promote_due(now);
        let next = queue.ready.pop().map(|queued| queued.event);
        self.queued_gauge.set(queue.len() as i64);
        next
    }

    /// Removes and returns every event that is due now, most urgent first.
    pub fn drain(&self) -> Vec<NotificationEvent> {
        self.drain_due(Utc::now())
    }

    pub fn drain_due(&self, now: DateTime<Utc>) -> Vec<NotificationEvent> {
        let mut queue = self.lock();
        queue.promote_due(now);

        let mut drained = Vec::with_capacity(queue.ready.len());
        while let Some(queued) = queue.ready.pop() {
            drained.push(queued.event);
        }

        self.queued_gauge.set(queue.len() as i64);
        drained
    }

    pub fn mark_delivered(&self, event: &NotificationEvent) {
        let mut delivered = event.clone();
        delivered.attempts += 1;
        delivered.delivery_state = DeliveryState::Delivered;
        delivered.next_attempt_at = None;
        self.record_attempt(delivered);
    }

    /// Records a failed attempt. Requeues with backoff while attempts remain,
    /// otherwise marks the event FAILED_PERMANENT and drops it from the queue.
    pub fn report_failure(&self, event: NotificationEvent, failure: &DeliveryError) -> DeliveryState {
        self.report_failure_at(event, failure, Utc::now())
    }

    pub fn report_failure_at(
        &self,
        mut event: NotificationEvent,
        failure: &DeliveryError,
        now: DateTime<Utc>,
    ) -> DeliveryState {
        event.attempts += 1;
        event.last_error = Some(failure.to_string());

        let next_attempt_at = match failure {
            DeliveryError::Rejected(_) => None,
            DeliveryError::Transient(_) if self.retry.exhausted(event.attempts) => None,
            DeliveryError::Transient(_) => self.retry.next_attempt_at(now, event.attempts),
        };

        let Some(next_attempt_at) = next_attempt_at else {
            event.delivery_state = DeliveryState::FailedPermanent;
            event.next_attempt_at = None;
            error!(
                notification_id = %event.id,
                priority = event.priority.as_str(),
                attempts = event.attempts,
                error = %failure,
                "notification permanently failed"
            );
            self.record_attempt(event);
            return DeliveryState::FailedPermanent;
        };

        event.delivery_state = DeliveryState::FailedRetrying;
        event.next_attempt_at = Some(next_attempt_at);
        warn!(
            notification_id = %event.id,
            attempts = event.attempts,
            retry_in_ms = (next_attempt_at - now).num_milliseconds(),
            error = %failure,
            "notification delivery failed; retrying"
        );
        self.record_attempt(event.clone());

        let mut queue = self.lock();
        self.push(&mut queue.deferred, event);
        self.queued_gauge.set(queue.len() as i64);

        DeliveryState::FailedRetrying
    }

    pub fn queued(&self) -> usize {
        self.lock().len()
    }

    pub fn get(&self, id: &Uuid) -> Option<NotificationEvent> {
        self.log.get(id).map(|entry| entry.value().clone())
    }

    /// Logged events created after `since`, newest first.
    pub fn history(&self, since: Option<DateTime<Utc>>) -> Vec<NotificationEvent> {
        let mut events: Vec<NotificationEvent> = self
            .log
            .iter()
            .filter(|entry| since.is_none_or(|since| entry.created_at > since))
            .map(|entry| entry.value().clone())
            .collect();

        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events
    }

    /// Marks an inbox entry as read. Reading twice keeps the first timestamp.
    pub fn mark_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<NotificationEvent, AppError> {
        let mut entry = self
            .log
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

        entry.read_at.get_or_insert(now);
        Ok(entry.clone())
    }

    /// Drops DELIVERED and FAILED_PERMANENT entries older than the retention
    /// window. Events still queued are never pruned.
    pub fn prune_log(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return 0;
        };

        let before = self.log.len();
        self.log.retain(|_, event| {
            let terminal = matches!(
                event.delivery_state,
                DeliveryState::Delivered | DeliveryState::FailedPermanent
            );
            !(terminal && event.created_at < cutoff)
        });

        let pruned = before.saturating_sub(self.log.len());
        if pruned > 0 {
            debug!(pruned, "notification log pruned");
        }
        pruned
    }

    /// Resolves when new work is enqueued or `idle` elapses.
    pub async fn wait_for_work(&self, idle: StdDuration) {
        tokio::select! {
            _ = self.wakeup.notified() => {},
            _ = tokio::time::sleep(idle) => {},
        }
    }

    fn push<C: Extend<Queued>>(&self, target: &mut C, event: NotificationEvent) {
        target.extend(Some(Queued {
            priority: event.priority,
            created_at: event.created_at,
            sequence: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
            event,
        }));
    }

    // Delivery bookkeeping only; the read marker belongs to the inbox.
    fn record_attempt(&self, event: NotificationEvent) {
        match self.log.get_mut(&event.id) {
            Some(mut logged) => {
                logged.delivery_state = event.delivery_state;
                logged.attempts = event.attempts;
                logged.last_error = event.last_error;
                logged.next_attempt_at = event.next_attempt_at;
            }
            None => {
                self.log.insert(event.id, event);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
