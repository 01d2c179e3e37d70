//! Logging for the SMS dispatcher
//!
//! What gets logged:
//! - `info` once per cycle with the batch outcome counts (`fetched`, `sent`,
//!   `invalid`, `delivery_failed`, `unconfirmed`, `reconcile_failed`, `panicked`)
//! - `warn` for over-length content, unaccepted deliveries and cache write failures
//! - `error` for fetch failures, transport failures and status writes that did not land
//! - pause/resume transitions and control plane requests
//!
//! Every line emitted while handling a message sits under a `dispatch_message`
//! span carrying its `message_id`, nested in the `dispatch_cycle` span.
//!
//! `LOG_FORMAT=json` switches to one JSON object per line with span fields
//! flattened in; otherwise output is plain text. `RUST_LOG` sets the filter
//! (default `info`), e.g. `RUST_LOG=sms_dispatch=debug,tower_http=info`.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging for the given service.
///
/// Reads `LOG_FORMAT` to pick JSON or text output and `RUST_LOG` for level
/// filtering (defaults to INFO).
pub fn init_logging(service_name: &str) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let env_filter = default_env_filter();

    if log_format.eq_ignore_ascii_case("json") {
        init_json_logging(env_filter);
    } else {
        init_text_logging(env_filter);
    }

    tracing::debug!(service = service_name, format = %log_format, "Logging initialized");
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_json_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(false)
                .with_target(true)
                .flatten_event(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();
}

fn init_text_logging(env_filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(true),
        )
        .init();
}
