//! Domain engines of collections
//!
//! The engine gives a collection its kind and its default configuration
//! (banned words and separators suited to the domain).

use super::config::CollectionConfig;
use std::fmt;

/// Domain behavior of a collection kind
pub trait CollectionEngine: Send + Sync + fmt::Debug {
    /// Registered kind name
    fn kind(&self) -> &str;

    /// Configuration a new collection of this kind starts from
    fn default_config(&self) -> CollectionConfig {
        CollectionConfig::default()
    }
}

/// Collection of plain names
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericEngine;

impl CollectionEngine for GenericEngine {
    fn kind(&self) -> &str {
        "simple"
    }
}

/// Movie release names
#[derive(Debug, Default, Clone, Copy)]
pub struct MoviesEngine;

/// Release tags that never belong to a movie title
const MOVIE_BANNED: &[&str] = &[
    "720p", "1080p", "2160p", "x264", "x265", "h264", "bluray", "brrip", "dvdrip", "xvid",
    "hdtv", "webrip", "web-dl", "aac", "ac3", "dts", "multi", "vostfr", "truefrench",
];

impl CollectionEngine for MoviesEngine {
    fn kind(&self) -> &str {
        "movies"
    }

    fn default_config(&self) -> CollectionConfig {
        CollectionConfig {
            banned: MOVIE_BANNED.iter().map(|s| s.to_string()).collect(),
            separators: " ._[]()".to_string(),
            ..CollectionConfig::default()
        }
    }
}
