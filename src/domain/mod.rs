//! Domain layer - pure types and processing rules.

// ffmpeg/ffprobe integration
pub mod av;

// Master playlist rendering and media playlist reading
pub mod hls;

// The fixed quality ladder
pub mod ladder;

// Jobs, renditions, thumbnails and their lifecycle
pub mod video;
