//! Interactive dashboard: raw key decoding, per-screen state, throttled
//! full-frame rendering and the event loop tying them to the probe loop.

mod draw;
mod events;
mod input;
mod run;
mod state;
mod text;
mod throttle;

pub use run::{run_dashboard, Dashboard};
