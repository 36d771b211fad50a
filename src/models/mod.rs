pub mod playlist;
pub mod provider;

pub use playlist::{ChannelCacheEnvelope, PlaylistItem};
pub use provider::Provider;
