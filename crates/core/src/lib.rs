//! # media-preview-core
//!
//! Inline media previews for chat-style interfaces.
//!
//! - **Content dispatch**: classify an attachment by content type and decide
//!   how to render it at a target width
//! - **Document scaling**: fit a PDF page into that width once its geometry
//!   arrives, ignoring loads for locators that were replaced in the meantime
//! - **File previews**: turn a picked file into an upload handle right away and
//!   a `data:` URI preview asynchronously
//!
//! ## Rendering an attachment
//!
//! ```rust,no_run
//! use media_preview_core::{
//!     AttachmentDescriptor, ContentDispatcher, DocumentScaler, PdfiumDocumentLoader,
//!     RenderDirective, ScalerConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let loader = Arc::new(PdfiumDocumentLoader::new()?);
//!     let mut scaler = DocumentScaler::new(loader, ScalerConfig::default())?;
//!     let dispatcher = ContentDispatcher::default();
//!
//!     let attachment =
//!         AttachmentDescriptor::new("application/pdf", "file:///tmp/report.pdf").with_width(480.0);
//!     dispatcher.render(&attachment, &mut scaler);
//!     scaler.settle().await;
//!
//!     if let RenderDirective::Document { scale, .. } = dispatcher.render(&attachment, &mut scaler) {
//!         println!("draw at 480 x {}", scale.rendered_height);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Previewing a picked file
//!
//! ```rust,no_run
//! use media_preview_core::{ChannelSink, FilePreviewPipeline, PipelineConfig, SelectedFile};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = FilePreviewPipeline::new(PipelineConfig::default())?;
//!     let (sink, mut events) = ChannelSink::new();
//!
//!     pipeline.on_file_selected(vec![SelectedFile::new("avatar.png")], sink);
//!
//!     if let Some(selection) = events.next_selection().await {
//!         println!("upload {:?}", selection.raw_file.path());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod data_uri;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod file_preview;
pub mod pdf_renderer;
pub mod scaler;

// Re-export main types for convenience
pub use config::{DispatchConfig, PipelineConfig, PreviewConfig, RasterConfig, ScalerConfig};
pub use dispatcher::{
    AttachmentDescriptor, ContentDispatcher, ContentKind, DocumentStatus, RenderDirective,
};
pub use document::{
    DocumentHandle, DocumentLoader, DocumentSource, LoadRequest, LoadedPage, PageGeometry,
};
pub use error::{PreviewError, Result};
pub use file_preview::{
    ChannelSink, FilePreviewPipeline, FileReader, FileSelection, FsDataUriReader, SelectedFile,
    SelectionEvent, SelectionEvents, SelectionSink,
};
pub use pdf_renderer::{PageRasterizer, PdfiumDocumentLoader, RenderedPage};
pub use scaler::{DocumentScaler, LoadCompletion, LoadOutcome, LoadTicket, ScaleState, ScalerPhase};

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
