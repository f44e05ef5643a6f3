use biometrics::{Collector, Counter, Moments};

pub(crate) static TRANSPORT_REQUESTS: Counter = Counter::new("chatterbox.transport.requests");
pub(crate) static TRANSPORT_ERRORS: Counter = Counter::new("chatterbox.transport.errors");
pub(crate) static TRANSPORT_HEADERS_DURATION: Moments =
    Moments::new("chatterbox.transport.headers_duration_seconds");

pub(crate) static STREAM_TOKENS: Counter = Counter::new("chatterbox.stream.tokens");
pub(crate) static STREAM_IGNORED_LINES: Counter = Counter::new("chatterbox.stream.ignored_lines");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("chatterbox.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("chatterbox.stream.bytes");
pub(crate) static STREAM_TTFT: Moments = Moments::new("chatterbox.stream.ttft_seconds");

pub(crate) static EXCHANGES_STARTED: Counter = Counter::new("chatterbox.exchange.started");
pub(crate) static EXCHANGES_IGNORED: Counter = Counter::new("chatterbox.exchange.ignored");
pub(crate) static EXCHANGES_FAILED: Counter = Counter::new("chatterbox.exchange.failed");
pub(crate) static EXCHANGE_RETRIES: Counter = Counter::new("chatterbox.exchange.retries");
pub(crate) static EXCHANGE_DURATION: Moments =
    Moments::new("chatterbox.exchange.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&TRANSPORT_REQUESTS);
    collector.register_counter(&TRANSPORT_ERRORS);
    collector.register_moments(&TRANSPORT_HEADERS_DURATION);

    collector.register_counter(&STREAM_TOKENS);
    collector.register_counter(&STREAM_IGNORED_LINES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_moments(&STREAM_TTFT);

    collector.register_counter(&EXCHANGES_STARTED);
    collector.register_counter(&EXCHANGES_IGNORED);
    collector.register_counter(&EXCHANGES_FAILED);
    collector.register_counter(&EXCHANGE_RETRIES);
    collector.register_moments(&EXCHANGE_DURATION);
}
