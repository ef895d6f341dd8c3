use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("threadchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("threadchat.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("threadchat.client.request_duration_seconds");

pub(crate) static STREAM_OPENED: Counter = Counter::new("threadchat.stream.opened");
pub(crate) static STREAM_DELTAS: Counter = Counter::new("threadchat.stream.deltas");
pub(crate) static STREAM_MALFORMED_FRAMES: Counter =
    Counter::new("threadchat.stream.malformed_frames");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("threadchat.stream.errors");
pub(crate) static STREAM_CANCELLED: Counter = Counter::new("threadchat.stream.cancelled");
pub(crate) static STREAM_BYTES: Counter = Counter::new("threadchat.stream.bytes");
pub(crate) static STREAM_TTFB: Moments = Moments::new("threadchat.stream.ttfb_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("threadchat.stream.duration_seconds");

pub(crate) static CHAT_TURNS: Counter = Counter::new("threadchat.chat.turns");
pub(crate) static CHAT_TURN_ERRORS: Counter = Counter::new("threadchat.chat.turn_errors");
pub(crate) static CHAT_TURN_DURATION: Moments =
    Moments::new("threadchat.chat.turn_duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STREAM_OPENED);
    collector.register_counter(&STREAM_DELTAS);
    collector.register_counter(&STREAM_MALFORMED_FRAMES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_CANCELLED);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFB);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_TURN_ERRORS);
    collector.register_moments(&CHAT_TURN_DURATION);
}
