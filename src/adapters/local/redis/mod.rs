//! Redis adapter for local deployment.
//!
//! Provides the Redis-backed `VideoRepository`. Jobs are stored as JSON
//! documents, renditions as a JSON list per video in insertion order, and
//! course membership as a set of video ids.

mod pool;
mod repository;

pub use pool::RedisRepository;

/// Redis key constants
const VIDEO_PREFIX: &str = "vodpipe:video:";
const RENDITIONS_PREFIX: &str = "vodpipe:renditions:";
const COURSE_PREFIX: &str = "vodpipe:course:";

fn video_key(id: impl std::fmt::Display) -> String {
    format!("{}{}", VIDEO_PREFIX, id)
}

fn renditions_key(id: impl std::fmt::Display) -> String {
    format!("{}{}", RENDITIONS_PREFIX, id)
}

fn course_key(course: impl std::fmt::Display) -> String {
    format!("{}{}", COURSE_PREFIX, course)
}
