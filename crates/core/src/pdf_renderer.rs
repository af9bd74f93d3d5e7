//! PDF support backed by pdfium (Google's PDF engine).
//!
//! - [`PdfiumDocumentLoader`] reads a page's size for the scaler
//! - [`PageRasterizer`] draws a page at a computed [`ScaleState`] into a PNG
//!
//! A bound [`Pdfium`] never leaves the thread that created it. The loader keeps
//! its instance on a dedicated worker thread and talks to it over channels.

use crate::config::RasterConfig;
use crate::document::{DocumentHandle, DocumentLoader, DocumentSource, LoadRequest, LoadedPage};
use crate::error::{PreviewError, Result};
use crate::scaler::ScaleState;
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Largest bitmap edge, in pixels, the rasterizer will ask pdfium for.
pub const MAX_BITMAP_EDGE: u32 = 16_384;

/// Bind to the pdfium library: `./` first, then the usual system locations.
pub fn bind_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("/usr/lib"))
        })
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/usr/local/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| PreviewError::PdfiumError(format!("Failed to load pdfium library: {}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    source: &'a DocumentSource,
) -> std::result::Result<PdfDocument<'a>, PdfiumError> {
    match source {
        DocumentSource::File(path) => pdfium.load_pdf_from_file(path, None),
        DocumentSource::Bytes(bytes) => pdfium.load_pdf_from_byte_slice(bytes, None),
    }
}

/// One page read, queued for the worker thread.
struct PageJob {
    request: LoadRequest,
    source: DocumentSource,
    reply: oneshot::Sender<Result<LoadedPage>>,
}

/// Loads documents with pdfium and reports the requested page's size in
/// points as its view box.
///
/// Reads run one at a time on the loader's worker thread. Clones share the
/// worker; it exits once the last clone is dropped.
#[derive(Debug, Clone)]
pub struct PdfiumDocumentLoader {
    jobs: mpsc::UnboundedSender<PageJob>,
}

impl PdfiumDocumentLoader {
    /// Start the worker thread and bind pdfium on it. Fails if the library
    /// cannot be loaded.
    pub fn new() -> Result<Self> {
        let (jobs, queue) = mpsc::unbounded_channel();
        let (bound_tx, bound_rx) = std::sync::mpsc::channel();

        thread::Builder::new()
            .name("pdfium-loader".to_string())
            .spawn(move || run_worker(queue, bound_tx))
            .map_err(|e| {
                PreviewError::PdfiumError(format!("Failed to start pdfium worker: {}", e))
            })?;

        bound_rx.recv().map_err(|_| {
            PreviewError::PdfiumError("pdfium worker exited during startup".to_string())
        })??;

        info!("Pdfium document loader initialized");
        Ok(Self { jobs })
    }
}

fn run_worker(
    mut queue: mpsc::UnboundedReceiver<PageJob>,
    bound: std::sync::mpsc::Sender<Result<()>>,
) {
    let pdfium = match bind_pdfium() {
        Ok(pdfium) => {
            let _ = bound.send(Ok(()));
            pdfium
        }
        Err(e) => {
            let _ = bound.send(Err(e));
            return;
        }
    };

    while let Some(job) = queue.blocking_recv() {
        let result = read_page(&pdfium, &job.source, &job.request);
        // The load may have been abandoned; its result is not needed then.
        let _ = job.reply.send(result);
    }
    debug!("Pdfium worker stopped");
}

impl DocumentLoader for PdfiumDocumentLoader {
    fn load(&self, request: LoadRequest) -> impl Future<Output = Result<LoadedPage>> + Send {
        let jobs = self.jobs.clone();
        async move {
            let source = DocumentSource::from_locator(&request.locator)?;
            let locator = request.locator.clone();
            let (reply, result) = oneshot::channel();

            jobs.send(PageJob {
                request,
                source,
                reply,
            })
            .map_err(|_| PreviewError::PdfiumError("pdfium worker has stopped".to_string()))?;

            result.await.map_err(|_| {
                warn!("Pdfium worker dropped the load for {}", locator);
                PreviewError::PdfiumError(format!("pdfium worker dropped the load for {}", locator))
            })?
        }
    }
}

fn read_page(pdfium: &Pdfium, source: &DocumentSource, request: &LoadRequest) -> Result<LoadedPage> {
    let start = Instant::now();
    let document = open_document(pdfium, source).map_err(|e| PreviewError::DocumentLoad {
        locator: request.locator.clone(),
        message: e.to_string(),
    })?;

    let page_count = document.pages().len() as u16;
    let handle = DocumentHandle::new(&request.locator, page_count);

    let view_box = match document.pages().get(request.page_number.saturating_sub(1)) {
        Ok(page) => Some([
            0.0,
            0.0,
            f64::from(page.width().value),
            f64::from(page.height().value),
        ]),
        Err(e) => {
            debug!(
                "Page {} of {} unavailable ({} pages): {}",
                request.page_number, request.locator, page_count, e
            );
            None
        }
    };

    debug!("Read {} in {:?}", request.locator, start.elapsed());
    Ok(LoadedPage {
        document: handle,
        view_box,
    })
}

/// A page drawn at a given scale.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page number (1-indexed).
    pub page_number: u16,

    /// PNG image data.
    pub data: Vec<u8>,

    /// Image width in pixels.
    pub width: u32,

    /// Image height in pixels.
    pub height: u32,
}

/// Draws a scaled page into a PNG bitmap.
pub struct PageRasterizer {
    /// Raster configuration.
    config: RasterConfig,
    /// Pdfium library instance.
    pdfium: Arc<Pdfium>,
}

impl PageRasterizer {
    /// Bind pdfium and create a rasterizer.
    pub fn new(config: RasterConfig) -> Result<Self> {
        let rasterizer = Self::from_pdfium(Arc::new(bind_pdfium()?), config);
        info!(
            "Page rasterizer initialized (alpha: {})",
            rasterizer.config.use_alpha
        );
        Ok(rasterizer)
    }

    /// Share an already bound pdfium instance.
    pub fn from_pdfium(pdfium: Arc<Pdfium>, config: RasterConfig) -> Self {
        Self { config, pdfium }
    }

    /// Render `page_number` so that one page unit maps to `scale.scale_factor`
    /// pixels. Blocking; run it off the async runtime for large pages.
    pub fn render_page(
        &self,
        source: &DocumentSource,
        page_number: u16,
        scale: &ScaleState,
    ) -> Result<RenderedPage> {
        let start = Instant::now();
        let document = open_document(&self.pdfium, source)
            .map_err(|e| PreviewError::PdfRenderError(format!("Failed to load PDF: {}", e)))?;

        let page = document
            .pages()
            .get(page_number.saturating_sub(1))
            .map_err(|e| {
                PreviewError::PdfRenderError(format!("Failed to get page {}: {}", page_number, e))
            })?;

        let (width, height) = pixel_size(
            f64::from(page.width().value),
            f64::from(page.height().value),
            scale,
        )?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(width)
            .set_target_height(height)
            .rotate_if_landscape(PdfPageRenderRotation::None, false);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            PreviewError::PdfRenderError(format!("Failed to render page {}: {}", page_number, e))
        })?;

        let rgba_image: RgbaImage = bitmap.as_image().into_rgba8();
        let final_image = if !self.config.use_alpha {
            apply_background(rgba_image, self.config.background_color)
        } else {
            rgba_image
        };

        let data = encode_png(&final_image)?;
        debug!(
            "Rendered page {} at {}x{} in {:?}",
            page_number,
            final_image.width(),
            final_image.height(),
            start.elapsed()
        );

        Ok(RenderedPage {
            page_number,
            data,
            width: final_image.width(),
            height: final_image.height(),
        })
    }
}

/// Bitmap size for a page at `scale`, never smaller than 1x1. Sizes with an
/// edge above [`MAX_BITMAP_EDGE`] are rejected.
fn pixel_size(intrinsic_width: f64, intrinsic_height: f64, scale: &ScaleState) -> Result<(i32, i32)> {
    let factor = if scale.scale_factor.is_finite() && scale.scale_factor > 0.0 {
        scale.scale_factor
    } else {
        1.0
    };
    let to_px = |v: f64| -> Result<i32> {
        let px = (v * factor).round();
        if !(px.is_finite() && px >= 1.0) {
            return Ok(1);
        }
        if px > f64::from(MAX_BITMAP_EDGE) {
            return Err(PreviewError::PdfRenderError(format!(
                "Bitmap edge of {} px exceeds the {} px limit",
                px, MAX_BITMAP_EDGE
            )));
        }
        Ok(px as i32)
    };
    Ok((to_px(intrinsic_width)?, to_px(intrinsic_height)?))
}

/// Blend transparent pixels onto `background`.
fn apply_background(mut image: RgbaImage, background: (u8, u8, u8)) -> RgbaImage {
    let (r, g, b) = background;

    for pixel in image.pixels_mut() {
        let alpha = pixel[3] as f32 / 255.0;
        if alpha < 1.0 {
            let inv_alpha = 1.0 - alpha;
            pixel[0] = ((pixel[0] as f32 * alpha) + (r as f32 * inv_alpha)) as u8;
            pixel[1] = ((pixel[1] as f32 * alpha) + (g as f32 * inv_alpha)) as u8;
            pixel[2] = ((pixel[2] as f32 * alpha) + (b as f32 * inv_alpha)) as u8;
            pixel[3] = 255;
        }
    }

    image
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());

    let mut encoder = png::Encoder::new(&mut buffer, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Fast);

    let mut writer = encoder.write_header().map_err(|e| {
        PreviewError::PngEncodingError(format!("Failed to write PNG header: {}", e))
    })?;

    writer.write_image_data(image.as_raw()).map_err(|e| {
        PreviewError::PngEncodingError(format!("Failed to write PNG data: {}", e))
    })?;

    drop(writer);

    Ok(buffer.into_inner())
}
