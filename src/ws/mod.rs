pub mod hub;
pub mod presence;
pub mod revision;

pub use hub::{CollabHub, ConnectionId, Frame, FrameSender, HubStats};
