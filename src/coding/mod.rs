//! Tier-1 entropy coding.
//!
//! - `blocker`: deterministic subband-respecting partition of a band.
//! - `context`: neighborhood-state context assignment for the three passes.
//! - `mq`: the MQ binary arithmetic encoder/decoder pair.
//! - `block_coder`: the three-pass bit-plane coder driving the MQ codec.

pub mod block_coder;
pub mod blocker;
pub mod context;
pub mod mq;

pub use block_coder::{BlockDecoder, BlockEncoder};
pub use blocker::{BlockRegion, Blocker, Subband};
pub use mq::{MqDecoder, MqEncoder};
