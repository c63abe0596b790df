use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::DeliveryError;
use crate::models::notification::{DeliveryState, NotificationEvent};
use crate::notify::dispatcher::NotificationDispatcher;
use crate::observability::metrics::Metrics;
use crate::state::AppState;

const LOG_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Outbound channel for notifications (push, SMS, e-mail, ...).
pub trait DeliveryTransport: Send + Sync + 'static {
    fn deliver(
        &self,
        event: &NotificationEvent,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Publishes to live websocket subscribers. The dispatcher log already
/// serves as the in-app inbox, so having no subscriber is not a failure.
pub struct BroadcastTransport {
    tx: broadcast::Sender<NotificationEvent>,
}

impl BroadcastTransport {
    pub fn new(tx: broadcast::Sender<NotificationEvent>) -> Self {
        Self { tx }
    }
}

impl DeliveryTransport for BroadcastTransport {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), DeliveryError> {
        match self.tx.send(event.clone()) {
            Ok(receivers) => debug!(notification_id = %event.id, receivers, "notification published"),
            Err(_) => debug!(notification_id = %event.id, "no live subscribers"),
        }
        Ok(())
    }
}

/// Delivers due events one at a time, most urgent first, until nothing is
/// due. The queue is consulted again after every attempt, so an emergency
/// raised while a slow delivery is in flight goes out next.
/// Returns the number of attempts made.
pub async fn deliver_pending<T: DeliveryTransport>(
    dispatcher: &NotificationDispatcher,
    transport: &T,
    metrics: &Metrics,
) -> usize {
    let mut attempted = 0;

    while let Some(event) = dispatcher.pop_next(Utc::now()) {
        attempted += 1;

        let outcome = match transport.deliver(&event).await {
            Ok(()) => {
                dispatcher.mark_delivered(&event);
                "delivered"
            }
            Err(err) => match dispatcher.report_failure(event, &err) {
                DeliveryState::FailedPermanent => "failed_permanent",
                _ => "failed_retrying",
            },
        };
        metrics
            .notification_deliveries_total
            .with_label_values(&[outcome])
            .inc();
    }

    attempted
}

pub async fn run_delivery_worker<T: DeliveryTransport>(state: Arc<AppState>, transport: T) {
    info!("notification delivery worker started");

    let idle = Duration::from_millis(state.delivery.poll_interval_ms);
    let mut last_pruned = Instant::now();
    loop {
        let attempted = deliver_pending(&state.dispatcher, &transport, &state.metrics).await;

        if last_pruned.elapsed() >= LOG_PRUNE_INTERVAL {
            state.dispatcher.prune_log(Utc::now());
            last_pruned = Instant::now();
        }

        if attempted == 0 {
            state.dispatcher.wait_for_work(idle).await;
        }
    }
}
