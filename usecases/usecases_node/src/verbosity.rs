//! `VERBOSE` environment variable parsing and gated diagnostic output.
//!
//! Ports `eixx::connect::verboseness::parse`'s level table (named levels or
//! a bare digit) into a small atomic-flag reporter, in the style of the
//! teacher's `infrastructure_debugging::DebugUtils` — a level read once and
//! checked before every `eprintln!`, rather than a full logging subscriber.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Verbosity {
    None = 0,
    Test = 1,
    Debug = 2,
    Info = 3,
    Message = 4,
    Wire = 5,
    Trace = 6,
}

impl Verbosity {
    fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::None,
            1 => Verbosity::Test,
            2 => Verbosity::Debug,
            3 => Verbosity::Info,
            4 => Verbosity::Message,
            5 => Verbosity::Wire,
            _ => Verbosity::Trace,
        }
    }

    /// Parse a `VERBOSE` value: a named level (`test`, `debug`, `info`,
    /// `message`, `wire`, `trace`, matched by prefix as the original does)
    /// or a bare integer `0..=6`, clamped upward beyond 6.
    pub fn parse(raw: &str) -> Verbosity {
        let raw = raw.trim();
        if raw.is_empty() {
            return Verbosity::None;
        }
        if let Ok(n) = raw.parse::<u8>() {
            return Verbosity::from_level(n);
        }
        if raw.starts_with("test") {
            return Verbosity::Test;
        }
        if raw.starts_with("debug") {
            return Verbosity::Debug;
        }
        if raw.starts_with("info") {
            return Verbosity::Info;
        }
        if raw.starts_with("message") {
            return Verbosity::Message;
        }
        if raw.starts_with("wire") {
            return Verbosity::Wire;
        }
        if raw.starts_with("trace") {
            return Verbosity::Trace;
        }
        Verbosity::None
    }
}

static LEVEL: AtomicU8 = AtomicU8::new(0);
static INIT: OnceLock<()> = OnceLock::new();

fn ensure_initialized() {
    INIT.get_or_init(|| {
        let level = std::env::var("VERBOSE").map(|v| Verbosity::parse(&v)).unwrap_or(Verbosity::None);
        LEVEL.store(level as u8, Ordering::Relaxed);
    });
}

pub fn level() -> Verbosity {
    ensure_initialized();
    Verbosity::from_level(LEVEL.load(Ordering::Relaxed))
}

/// Print `message` (built lazily) if the current level is at least `at`.
pub fn report(at: Verbosity, message: impl FnOnce() -> String) {
    if level() >= at {
        eprintln!("[{at:?}] {}", message());
    }
}
