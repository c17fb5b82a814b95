//! Position descriptors within a publication.
//!
//! A [`Locator`] is an opaque structured position: which resource of the
//! publication (`href`), and where inside it (`locations`). The catalog
//! never interprets locators beyond extracting the total progression for
//! bookmark ordering; readers produce and consume them.

use serde::{Deserialize, Serialize};

/// A position inside a publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Href of the resource the locator points at.
    pub href: String,

    /// Media type of the resource.
    #[serde(rename = "type")]
    pub media_type: String,

    /// Title of the chapter or section, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Precise position within the resource.
    #[serde(default)]
    pub locations: Locations,
}

impl Locator {
    /// Create a locator pointing at the start of a resource.
    pub fn new(href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: media_type.into(),
            title: None,
            locations: Locations::default(),
        }
    }

    /// Set the overall progression through the publication.
    pub fn with_total_progression(mut self, progression: f64) -> Self {
        self.locations.total_progression = Some(progression);
        self
    }

    /// Set the progression within the resource.
    pub fn with_progression(mut self, progression: f64) -> Self {
        self.locations.progression = Some(progression);
        self
    }

    /// Set the section title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Progression through the whole publication, in [0, 1], when known.
    pub fn total_progression(&self) -> Option<f64> {
        self.locations.total_progression
    }
}

/// One or more alternate ways to locate a position within a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locations {
    /// Fragment identifiers within the resource (e.g. a CSS id).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<String>,

    /// Progression within the resource, in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progression: Option<f64>,

    /// One-based position (page or synthetic screen) within the publication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,

    /// Progression through the whole publication, in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_progression: Option<f64>,
}
