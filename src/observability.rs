use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("revolt_cli.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("revolt_cli.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("revolt_cli.client.request_duration_seconds");

pub(crate) static GATEWAY_FRAMES: Counter = Counter::new("revolt_cli.gateway.frames");
pub(crate) static GATEWAY_BYTES: Counter = Counter::new("revolt_cli.gateway.bytes");
pub(crate) static GATEWAY_KEEPALIVES: Counter = Counter::new("revolt_cli.gateway.keepalives");
pub(crate) static GATEWAY_ERRORS: Counter = Counter::new("revolt_cli.gateway.errors");

pub(crate) static EVENTS_APPLIED: Counter = Counter::new("revolt_cli.session.events_applied");
pub(crate) static EVENT_DECODE_ERRORS: Counter =
    Counter::new("revolt_cli.session.event_decode_errors");
pub(crate) static MESSAGES_SENT: Counter = Counter::new("revolt_cli.session.messages_sent");
pub(crate) static DEFERRED_RESTORES: Counter =
    Counter::new("revolt_cli.session.deferred_restores");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&GATEWAY_FRAMES);
    collector.register_counter(&GATEWAY_BYTES);
    collector.register_counter(&GATEWAY_KEEPALIVES);
    collector.register_counter(&GATEWAY_ERRORS);

    collector.register_counter(&EVENTS_APPLIED);
    collector.register_counter(&EVENT_DECODE_ERRORS);
    collector.register_counter(&MESSAGES_SENT);
    collector.register_counter(&DEFERRED_RESTORES);
}
