//! Tracing setup.
//!
//! Logs go to stderr. Interactive terminals get the full formatter with color;
//! anything else (a daemon under a service manager, redirected output) gets
//! compact plain lines. `RUST_LOG` replaces the verbosity-derived filter.

use std::io::{self, IsTerminal};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
///
/// Quiet wins over verbose; 0 = warn, 1 = info, 2 = debug, 3+ = trace.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "snipcycle=error";
    }
    match verbose {
        0 => "snipcycle=warn",
        1 => "snipcycle=info",
        2 => "snipcycle=debug",
        _ => "snipcycle=trace",
    }
}

pub fn init_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let base = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_writer(io::stderr);

    // try_init: a subscriber may already be installed (tests, embedding)
    if io::stderr().is_terminal() {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(base)
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(base.with_ansi(false).compact())
            .try_init();
    }
}
