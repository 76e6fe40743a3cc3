//! Event Bridge and Live Session Hub (spec §4.9). `hub` owns the
//! process-local session registry an HTTP handler registers a
//! connection against; `bridge` wires the durable NOTIFY queue and the
//! Cross-Instance Bus into that hub; `event` defines the SSE wire shape.

pub mod bridge;
pub mod event;
pub mod hub;
pub mod sse;

pub use bridge::{handle_notify_item, notify_realtime_queue, run_global_relay, GLOBAL_CHANNEL};
pub use event::{BusEnvelope, EventKind, LiveEvent};
pub use hub::{run_sweeper, SessionGuard, SessionHub};
pub use sse::live_event_stream;
