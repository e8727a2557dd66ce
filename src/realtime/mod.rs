//! Realtime Sync Channel.
//!
//! One WebSocket per open board carries three kinds of traffic: structural
//! board updates in both directions, presence (who joined or left the board
//! room) and throttled cursor positions. The channel holds no board state; it
//! relays peer mutations to its owner through [`ChannelEvent`]s.

pub mod channel;
pub mod presence;
pub mod protocol;

pub use channel::{ChannelEvent, ChannelPhase, Identity, RealtimeChannel};
pub use presence::{CursorPosition, CursorThrottle, PresenceEntry, PresenceRoster};
pub use protocol::{ClientFrame, Inbound, ServerFrame};
