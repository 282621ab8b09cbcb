//! Stream merger: fan-in of concurrently rendered chunk streams.
//!
//! ```text
//! producer A ─┐                    ┌──────────────┐
//! producer B ─┼─ round (join_all) ▶│ MergeWindow  │──▶ Vec<f32> buffers
//! producer C ─┘                    │ pending heap │    (≤ capacity)
//!                                  │ MixBuffer    │
//!                                  └──────────────┘
//! ```
//!
//! [`MergeWindow`] is the synchronous core and is tested on its own;
//! [`merge_streams`] drives it from async producers and feeds it the
//! watermark that decides which part of the timeline is final.

pub mod stream;
pub mod window;

pub use stream::merge_streams;
pub use window::{MergeOptions, MergeWindow};
