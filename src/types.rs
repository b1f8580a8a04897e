// src/types.rs
use serde::{Deserialize, Serialize};

/// One of the two independent input streams.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Default, Serialize, Deserialize)]
pub enum ChannelId {
    #[default]
    One,
    Two,
}

impl ChannelId {
    pub const ALL: [ChannelId; 2] = [ChannelId::One, ChannelId::Two];

    pub fn index(self) -> usize {
        match self {
            ChannelId::One => 0,
            ChannelId::Two => 1,
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChannelId::One => write!(f, "CH1"),
            ChannelId::Two => write!(f, "CH2"),
        }
    }
}

// Capture workers -> consumer
#[derive(Clone, Debug)]
pub enum ScopeMessage {
    Log(String),
    BlockIngested { channel: ChannelId, samples: usize },
    Finished { channel: ChannelId, blocks: u64 },
    Failed { channel: ChannelId, reason: String },
}
