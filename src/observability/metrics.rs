use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub ride_requests_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub reservation_conflicts_total: IntCounter,
    pub trip_transitions_total: IntCounterVec,
    pub active_trips: IntGauge,
    pub notifications_in_queue: IntGauge,
    pub notification_deliveries_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ride_requests_total = IntCounterVec::new(
            Opts::new("ride_requests_total", "Ride requests by matching outcome"),
            &["outcome"],
        )
        .expect("valid ride_requests_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Latency of match-and-reserve in seconds",
            ),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let reservation_conflicts_total = IntCounter::new(
            "reservation_conflicts_total",
            "Reservations lost to a concurrent match",
        )
        .expect("valid reservation_conflicts_total metric");

        let trip_transitions_total = IntCounterVec::new(
            Opts::new("trip_transitions_total", "Committed trip transitions by target state"),
            &["state"],
        )
        .expect("valid trip_transitions_total metric");

        let active_trips = IntGauge::new("active_trips", "Trips not yet in a terminal state")
            .expect("valid active_trips metric");

        let notifications_in_queue = IntGauge::new(
            "notifications_in_queue",
            "Notifications waiting for delivery, including backoff",
        )
        .expect("valid notifications_in_queue metric");

        let notification_deliveries_total = IntCounterVec::new(
            Opts::new(
                "notification_deliveries_total",
                "Notification delivery attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid notification_deliveries_total metric");

        registry
            .register(Box::new(ride_requests_total.clone()))
            .expect("register ride_requests_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(reservation_conflicts_total.clone()))
            .expect("register reservation_conflicts_total");
        registry
            .register(Box::new(trip_transitions_total.clone()))
            .expect("register trip_transitions_total");
        registry
            .register(Box::new(active_trips.clone()))
            .expect("register active_trips");
        registry
            .register(Box::new(notifications_in_queue.clone()))
            .expect("register notifications_in_queue");
        registry
            .register(Box::new(notification_deliveries_total.clone()))
            .expect("register notification_deliveries_total");

        Self {
            registry,
            ride_requests_total,
            match_latency_seconds,
            reservation_conflicts_total,
            trip_transitions_total,
            active_trips,
            notifications_in_queue,
            notification_deliveries_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
