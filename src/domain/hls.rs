use crate::domain::ladder::QualityConfig;
use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

pub const PLAYLIST_NAME: &str = "playlist.m3u8";
pub const MASTER_PLAYLIST_NAME: &str = "master.m3u8";

pub struct VariantStream {
    pub bandwidth: u32,
    pub resolution: String,
    pub uri: String,
}

pub struct MasterPlaylist {
    pub version: u8,
    pub independent_segments: bool,
    pub variants: Vec<VariantStream>,
}

impl MasterPlaylist {
    pub fn new() -> Self {
        Self {
            version: 3,
            independent_segments: true,
            variants: Vec::new(),
        }
    }

    /// One variant per quality, in the order given.
    pub fn from_qualities<'a>(qualities: impl IntoIterator<Item = &'a QualityConfig>) -> Self {
        let mut playlist = Self::new();
        for quality in qualities {
            playlist.add_variant(
                quality.bitrate,
                quality.resolution(),
                format!("{}/{}", quality.name, PLAYLIST_NAME),
            );
        }
        playlist
    }

    pub fn add_variant(&mut self, bandwidth: u32, resolution: String, uri: String) {
        self.variants.push(VariantStream {
            bandwidth,
            resolution,
            uri,
        });
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("#EXTM3U\n");
        let _ = writeln!(out, "#EXT-X-VERSION:{}", self.version);
        if self.independent_segments {
            out.push_str("#EXT-X-INDEPENDENT-SEGMENTS\n");
        }
        for variant in &self.variants {
            let _ = writeln!(
                out,
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
                variant.bandwidth, variant.resolution
            );
            out.push_str(&variant.uri);
            out.push('\n');
        }
        out
    }
}

impl Default for MasterPlaylist {
    fn default() -> Self {
        Self::new()
    }
}

/// Segment durations read back from an encoder-written media playlist.
#[derive(Debug, Default, PartialEq)]
pub struct MediaPlaylistSummary {
    pub durations: Vec<f64>,
}

impl MediaPlaylistSummary {
    pub fn parse(content: &str) -> Self {
        static EXTINF: OnceLock<Regex> = OnceLock::new();
        let re = EXTINF.get_or_init(|| Regex::new(r"^#EXTINF:(\d+(?:\.\d+)?)").unwrap());

        let durations = content
            .lines()
            .filter_map(|line| re.captures(line.trim()))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
            .collect();
        Self { durations }
    }

    pub fn average(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        Some(self.durations.iter().sum::<f64>() / self.durations.len() as f64)
    }
}
