//! ApiFlavor - which Enterprise Search product the output talks to
//!
//! Fixed once at construction; the response shape follows from it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Destination;

/// Remote API family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// Destinations are engines
    AppSearch,
    /// Destinations are custom content sources
    WorkplaceSearch,
}

/// Layout of a bulk indexing response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `[{"id": .., "errors": [..]}, ..]`
    BareList,
    /// `{"results": [{"id": .., "errors": [..]}, ..]}`
    WrappedResults,
}

impl ApiFlavor {
    pub fn response_shape(self) -> ResponseShape {
        match self {
            Self::AppSearch => ResponseShape::BareList,
            Self::WorkplaceSearch => ResponseShape::WrappedResults,
        }
    }

    /// Path segments of the bulk indexing endpoint
    pub fn documents_path(self, destination: &Destination) -> Vec<String> {
        match self {
            Self::AppSearch => segments(&[
                "api",
                "as",
                "v1",
                "engines",
                destination.as_str(),
                "documents",
            ]),
            Self::WorkplaceSearch => segments(&[
                "api",
                "ws",
                "v1",
                "sources",
                destination.as_str(),
                "documents",
                "bulk_create",
            ]),
        }
    }

    /// Path segments probed by the connection check
    ///
    /// With a constant destination the destination itself is probed,
    /// otherwise only the collection endpoint.
    pub fn check_path(self, destination: Option<&Destination>) -> Vec<String> {
        let collection = match self {
            Self::AppSearch => ["api", "as", "v1", "engines"],
            Self::WorkplaceSearch => ["api", "ws", "v1", "sources"],
        };
        let mut path = segments(&collection);
        if let Some(destination) = destination {
            path.push(destination.to_string());
        }
        path
    }

    /// Human-readable name of a destination for this flavor
    pub fn destination_kind(self) -> &'static str {
        match self {
            Self::AppSearch => "engine",
            Self::WorkplaceSearch => "source",
        }
    }
}

impl fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppSearch => f.write_str("app_search"),
            Self::WorkplaceSearch => f.write_str("workplace_search"),
        }
    }
}

fn segments(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}
