//! Content classification and routing of attachments to a renderer strategy.

use crate::config::DispatchConfig;
use crate::document::DocumentLoader;
use crate::error::Result;
use crate::scaler::{DocumentScaler, ScaleState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An attachment to render, supplied fresh by the caller on every render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub content_type: String,
    pub source_locator: String,
    /// Target width in pixels; `None` means natural width.
    pub display_width: Option<f64>,
}

impl AttachmentDescriptor {
    pub fn new(content_type: impl Into<String>, source_locator: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            source_locator: source_locator.into(),
            display_width: None,
        }
    }

    /// Set the target width.
    pub fn with_width(mut self, width: f64) -> Self {
        self.display_width = Some(width);
        self
    }
}

/// Renderer strategy chosen for a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Image,
    Document,
    Unsupported,
}

impl ContentKind {
    /// Classify a MIME-like content type. Parameters are ignored and matching is
    /// case-insensitive; anything that is not `type/subtype` is unsupported.
    pub fn classify(content_type: &str, config: &DispatchConfig) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let Some((top, sub)) = essence.split_once('/') else {
            return ContentKind::Unsupported;
        };
        if top.is_empty() || sub.is_empty() {
            return ContentKind::Unsupported;
        }

        if top == "image" {
            ContentKind::Image
        } else if config
            .document_types
            .iter()
            .any(|t| t.trim().eq_ignore_ascii_case(&essence))
        {
            ContentKind::Document
        } else {
            ContentKind::Unsupported
        }
    }
}

/// Loading state of a document directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Geometry not known yet; render nothing yet.
    Loading,
    /// Scale is computed.
    Ready,
    /// The page has no usable bounding box; render nothing until retried.
    GeometryUnavailable,
}

/// What the presentation layer should draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderDirective {
    /// Show the locator directly at `width`, or at natural width when `None`.
    Image { locator: String, width: Option<f64> },
    /// Draw the document page at `width` and `scale.rendered_height`.
    Document {
        locator: String,
        width: Option<f64>,
        status: DocumentStatus,
        scale: ScaleState,
    },
    /// Nothing to render. Not an error.
    Empty,
    /// Loading the content failed.
    Error { locator: String, message: String },
}

impl RenderDirective {
    /// Whether the presentation layer has anything to draw right now.
    pub fn is_renderable(&self) -> bool {
        match self {
            RenderDirective::Image { .. } => true,
            RenderDirective::Document { status, scale, .. } => {
                *status == DocumentStatus::Ready && scale.rendered_height > 0.0
            }
            RenderDirective::Empty | RenderDirective::Error { .. } => false,
        }
    }
}

/// Routes attachments to the image or document strategy.
#[derive(Debug, Clone, Default)]
pub struct ContentDispatcher {
    config: DispatchConfig,
}

impl ContentDispatcher {
    /// Create a dispatcher.
    pub fn new(config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn classify(&self, content_type: &str) -> ContentKind {
        ContentKind::classify(content_type, &self.config)
    }

    /// Decide how to render `descriptor`. Documents are handed to `scaler`,
    /// which receives the descriptor's locator and width.
    pub fn render<L: DocumentLoader>(
        &self,
        descriptor: &AttachmentDescriptor,
        scaler: &mut DocumentScaler<L>,
    ) -> RenderDirective {
        let kind = self.classify(&descriptor.content_type);
        debug!(
            "Dispatching {} ({}) as {:?}",
            descriptor.source_locator, descriptor.content_type, kind
        );

        match kind {
            ContentKind::Image => RenderDirective::Image {
                locator: descriptor.source_locator.clone(),
                width: descriptor.display_width,
            },
            ContentKind::Document => {
                scaler.update(&descriptor.source_locator, descriptor.display_width);
                scaler.directive()
            }
            ContentKind::Unsupported => RenderDirective::Empty,
        }
    }
}
