use biometrics::{Collector, Counter, Moments};

pub(crate) static SESSIONS_OPENED: Counter = Counter::new("shellm.backend.sessions_opened");
pub(crate) static SESSIONS_CLOSED: Counter = Counter::new("shellm.backend.sessions_closed");
pub(crate) static BACKEND_REQUESTS: Counter = Counter::new("shellm.backend.requests");
pub(crate) static BACKEND_REQUEST_ERRORS: Counter =
    Counter::new("shellm.backend.request_errors");

pub(crate) static RENDER_GENERATIONS: Counter = Counter::new("shellm.render.generations");
pub(crate) static RENDER_ERRORS: Counter = Counter::new("shellm.render.errors");
pub(crate) static RENDER_FRAGMENTS: Counter = Counter::new("shellm.render.fragments");
pub(crate) static RENDER_REPAINTS: Counter = Counter::new("shellm.render.repaints");
pub(crate) static RENDER_TTFF: Moments = Moments::new("shellm.render.ttff_seconds");
pub(crate) static RENDER_DURATION: Moments = Moments::new("shellm.render.duration_seconds");

pub(crate) static SINK_WRITES: Counter = Counter::new("shellm.sink.writes");
pub(crate) static SINK_BYTES: Counter = Counter::new("shellm.sink.bytes");

pub(crate) static CHAT_TURNS: Counter = Counter::new("shellm.chat.turns");
pub(crate) static CHAT_COMMANDS: Counter = Counter::new("shellm.chat.commands");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&SESSIONS_OPENED);
    collector.register_counter(&SESSIONS_CLOSED);
    collector.register_counter(&BACKEND_REQUESTS);
    collector.register_counter(&BACKEND_REQUEST_ERRORS);

    collector.register_counter(&RENDER_GENERATIONS);
    collector.register_counter(&RENDER_ERRORS);
    collector.register_counter(&RENDER_FRAGMENTS);
    collector.register_counter(&RENDER_REPAINTS);
    collector.register_moments(&RENDER_TTFF);
    collector.register_moments(&RENDER_DURATION);

    collector.register_counter(&SINK_WRITES);
    collector.register_counter(&SINK_BYTES);

    collector.register_counter(&CHAT_TURNS);
    collector.register_counter(&CHAT_COMMANDS);
}
