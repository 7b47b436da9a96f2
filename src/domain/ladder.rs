//! The fixed bitrate ladder every video is encoded into.

/// Target HLS segment length in seconds.
pub const SEGMENT_SECONDS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityConfig {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    /// Target video bitrate in bits per second.
    pub bitrate: u32,
}

impl QualityConfig {
    /// `WIDTHxHEIGHT`, as used by the encoder and the master playlist.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// 1.2x the target, truncated.
    pub fn max_rate(&self) -> u64 {
        self.bitrate as u64 * 12 / 10
    }

    pub fn buffer_size(&self) -> u64 {
        self.bitrate as u64 * 2
    }
}

/// Ordered; players rely on master playlist entries appearing in this order.
pub const LADDER: [QualityConfig; 3] = [
    QualityConfig {
        name: "480p",
        width: 854,
        height: 480,
        bitrate: 800_000,
    },
    QualityConfig {
        name: "720p",
        width: 1280,
        height: 720,
        bitrate: 1_400_000,
    },
    QualityConfig {
        name: "1080p",
        width: 1920,
        height: 1080,
        bitrate: 2_800_000,
    },
];

pub fn find(name: &str) -> Option<&'static QualityConfig> {
    LADDER.iter().find(|quality| quality.name == name)
}
