//! Document loading capability used by the scaler.
//!
//! A loader turns a locator into a [`DocumentHandle`] plus the view box of one
//! page. Loading is asynchronous and may take arbitrarily long; the scaler never
//! blocks on it.

use crate::data_uri;
use crate::error::{PreviewError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use url::Url;
use uuid::Uuid;

/// Opaque reference to a loaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    id: Uuid,
    locator: String,
    page_count: u16,
}

impl DocumentHandle {
    /// Create a handle for a freshly loaded document.
    pub fn new(locator: impl Into<String>, page_count: u16) -> Self {
        Self {
            id: Uuid::new_v4(),
            locator: locator.into(),
            page_count,
        }
    }

    /// Unique id of this load.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Locator the document was loaded from.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u16 {
        self.page_count
    }
}

/// Intrinsic size of a page, in viewport units at scale 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub intrinsic_width: f64,
    pub intrinsic_height: f64,
}

impl PageGeometry {
    pub fn new(intrinsic_width: f64, intrinsic_height: f64) -> Self {
        Self {
            intrinsic_width,
            intrinsic_height,
        }
    }

    /// Read geometry from a `[x0, y0, x1, y1]` view box. The origin is assumed
    /// to be at (0, 0), so the far corner gives the size.
    pub fn from_view_box(view_box: [f64; 4]) -> Self {
        Self::new(view_box[2], view_box[3])
    }

    /// Whether the page has a finite, non-empty size that can be scaled.
    pub fn is_usable(&self) -> bool {
        self.intrinsic_width.is_finite()
            && self.intrinsic_width > 0.0
            && self.intrinsic_height.is_finite()
            && self.intrinsic_height > 0.0
    }
}

/// What the scaler asks a loader for.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub locator: String,
    /// 1-indexed page number.
    pub page_number: u16,
    /// Scale factor in effect when the load was issued.
    pub scale: f64,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPage {
    pub document: DocumentHandle,
    /// Bounding box of the requested page, if the page exists and reports one.
    pub view_box: Option<[f64; 4]>,
}

impl LoadedPage {
    /// Page geometry, if the view box is present.
    pub fn geometry(&self) -> Option<PageGeometry> {
        self.view_box.map(PageGeometry::from_view_box)
    }
}

/// Asynchronous document loading capability.
pub trait DocumentLoader: Send + Sync + 'static {
    /// Load the document behind `request.locator` and read the view box of
    /// `request.page_number`. Each call completes exactly once.
    fn load(&self, request: LoadRequest) -> impl Future<Output = Result<LoadedPage>> + Send;
}

/// Where a locator's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl DocumentSource {
    /// Resolve a locator into a local source.
    ///
    /// `file://` URLs (percent-decoded, empty or `localhost` host) and bare
    /// paths map to files and `data:` URIs are decoded in place. Anything with
    /// another scheme is rejected.
    pub fn from_locator(locator: &str) -> Result<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(PreviewError::UnsupportedLocator("<empty>".to_string()));
        }

        if data_uri::is_data_uri(trimmed) {
            let parsed = data_uri::parse(trimmed)?;
            return Ok(DocumentSource::Bytes(parsed.bytes));
        }

        if trimmed.starts_with("file://") {
            let path = Url::parse(trimmed)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .ok_or_else(|| PreviewError::UnsupportedLocator(trimmed.to_string()))?;
            return Ok(DocumentSource::File(path));
        }

        match trimmed.split_once("://") {
            Some(_) => Err(PreviewError::UnsupportedLocator(trimmed.to_string())),
            None => Ok(DocumentSource::File(PathBuf::from(trimmed))),
        }
    }
}
