//! Movie collection model.
//!
//! The shape mirrors the origin's "now playing" listing: a page of
//! [`Movie`] records plus pagination metadata and an optional release
//! window. Item attributes are passed through as received; the service
//! never interprets them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A page of movies as returned by the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieCollection {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub results: Vec<Movie>,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub total_results: i64,
    #[serde(default)]
    pub dates: Option<DateRange>,
}

impl MovieCollection {
    /// Top-level field names, used for case-insensitive decoding.
    pub const FIELDS: &'static [&'static str] =
        &["page", "results", "total_pages", "total_results", "dates"];

    /// The empty default served when the origin answers but cannot be used.
    ///
    /// Page and totals are zero, there are no results, and the release
    /// window is present but unbounded.
    pub fn empty() -> Self {
        Self {
            page: 0,
            results: Vec::new(),
            total_pages: 0,
            total_results: 0,
            dates: Some(DateRange::default()),
        }
    }

    /// Returns true when this collection is the empty default: no items, all
    /// pagination counters zero, and no bound on the release window.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
            && self.page == 0
            && self.total_pages == 0
            && self.total_results == 0
            && self
                .dates
                .as_ref()
                .is_none_or(|d| d.maximum.is_none() && d.minimum.is_none())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

impl Default for MovieCollection {
    fn default() -> Self {
        Self::empty()
    }
}

/// Release window covered by a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub maximum: Option<String>,
    #[serde(default)]
    pub minimum: Option<String>,
}

impl DateRange {
    pub const FIELDS: &'static [&'static str] = &["maximum", "minimum"];
}

/// One record of the listing.
///
/// Attributes the model does not name are kept in `extra` so that the
/// record survives a cache round trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub adult: bool,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: i64,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Movie {
    pub const FIELDS: &'static [&'static str] = &[
        "id",
        "title",
        "original_title",
        "original_language",
        "overview",
        "release_date",
        "adult",
        "video",
        "popularity",
        "vote_average",
        "vote_count",
        "genre_ids",
        "poster_path",
        "backdrop_path",
    ];

    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Default::default()
        }
    }
}
