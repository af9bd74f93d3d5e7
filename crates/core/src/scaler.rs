//! Responsive scaling of a document page into a target width.
//!
//! [`DocumentScaler`] owns one attachment at a time. A locator change issues an
//! asynchronous load on the tokio runtime; completions come back over the
//! scaler's own channel and are applied with [`DocumentScaler::poll_loads`] or
//! [`DocumentScaler::next_load`]. Every load is tagged with a [`LoadTicket`], so
//! a result that arrives after the locator moved on is discarded instead of
//! overwriting newer state.

use crate::config::ScalerConfig;
use crate::dispatcher::{DocumentStatus, RenderDirective};
use crate::document::{DocumentHandle, DocumentLoader, LoadRequest, LoadedPage, PageGeometry};
use crate::error::{PreviewError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Scale factor and resulting height for a page at the current display width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleState {
    pub scale_factor: f64,
    pub rendered_height: f64,
}

impl Default for ScaleState {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            rendered_height: 0.0,
        }
    }
}

impl ScaleState {
    /// Fit `geometry` into `display_width`.
    ///
    /// Absent, zero, negative or non-finite inputs yield the default state so
    /// NaN and infinities never reach layout.
    pub fn compute(geometry: &PageGeometry, display_width: Option<f64>) -> Self {
        let Some(width) = display_width.filter(|w| w.is_finite() && *w > 0.0) else {
            return Self::default();
        };
        let PageGeometry {
            intrinsic_width,
            intrinsic_height,
        } = *geometry;
        if !(intrinsic_width.is_finite() && intrinsic_width > 0.0) {
            return Self::default();
        }
        if !(intrinsic_height.is_finite() && intrinsic_height >= 0.0) {
            return Self::default();
        }

        let scale_factor = width / intrinsic_width;
        let rendered_height = intrinsic_height * scale_factor;
        // Tiny page sizes can still overflow.
        if !(scale_factor.is_finite() && rendered_height.is_finite()) {
            return Self::default();
        }
        Self {
            scale_factor,
            rendered_height,
        }
    }
}

/// Lifecycle of the scaler's current locator.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalerPhase {
    /// No locator set yet.
    Unloaded,
    /// Load issued, geometry unknown.
    Loading { locator: String },
    /// Geometry known and scale computed.
    Ready {
        locator: String,
        document: DocumentHandle,
        geometry: PageGeometry,
    },
    /// The page loaded without a usable bounding box (missing, empty or
    /// non-finite). Renders nothing until
    /// [`DocumentScaler::retry`].
    GeometryUnavailable {
        locator: String,
        document: DocumentHandle,
    },
    /// The loader reported an error.
    Failed { locator: String, message: String },
}

impl ScalerPhase {
    /// Locator this phase belongs to.
    pub fn locator(&self) -> Option<&str> {
        match self {
            ScalerPhase::Unloaded => None,
            ScalerPhase::Loading { locator }
            | ScalerPhase::Ready { locator, .. }
            | ScalerPhase::GeometryUnavailable { locator, .. }
            | ScalerPhase::Failed { locator, .. } => Some(locator),
        }
    }
}

/// Identity of one issued load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    locator: String,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

/// A finished load, sent back to the scaler that issued it.
#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub result: Result<LoadedPage>,
}

/// What happened to a completion handed to the scaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The completion matched the current load and changed the phase.
    Applied,
    /// The completion belonged to a superseded load and was ignored.
    Stale,
}

/// Stateful per-locator render unit.
pub struct DocumentScaler<L: DocumentLoader> {
    loader: Arc<L>,
    config: ScalerConfig,
    phase: ScalerPhase,
    display_width: Option<f64>,
    scale: ScaleState,
    generation: u64,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<LoadCompletion>,
    completions_rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl<L: DocumentLoader> std::fmt::Debug for DocumentScaler<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentScaler")
            .field("phase", &self.phase)
            .field("display_width", &self.display_width)
            .field("scale", &self.scale)
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl<L: DocumentLoader> DocumentScaler<L> {
    /// Create a scaler in the `Unloaded` phase.
    pub fn new(loader: Arc<L>, config: ScalerConfig) -> Result<Self> {
        config.validate()?;
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Ok(Self {
            loader,
            config,
            phase: ScalerPhase::Unloaded,
            display_width: None,
            scale: ScaleState::default(),
            generation: 0,
            in_flight: 0,
            completions_tx,
            completions_rx,
        })
    }

    /// Current scale state. A pure read.
    pub fn current_geometry(&self) -> ScaleState {
        self.scale
    }

    pub fn phase(&self) -> &ScalerPhase {
        &self.phase
    }

    pub fn locator(&self) -> Option<&str> {
        self.phase.locator()
    }

    pub fn display_width(&self) -> Option<f64> {
        self.display_width
    }

    /// Number of issued loads whose completion has not been received yet,
    /// superseded ones included.
    pub fn loads_in_flight(&self) -> usize {
        self.in_flight
    }

    /// Apply a locator and a width in one step. The width is stored first so a
    /// load that completes immediately already sees it.
    pub fn update(&mut self, locator: &str, display_width: Option<f64>) {
        self.set_display_width(display_width);
        self.set_locator(locator);
    }

    /// Switch to a new locator. Setting the current locator again does nothing.
    pub fn set_locator(&mut self, locator: &str) {
        if self.locator() == Some(locator) {
            return;
        }
        info!("Loading document {}", locator);
        self.begin_load(locator.to_string());
    }

    /// Change the target width. Recomputes immediately when `Ready`; otherwise
    /// the width is kept for the next `Ready` transition.
    pub fn set_display_width(&mut self, display_width: Option<f64>) {
        self.display_width = display_width;
        if let ScalerPhase::Ready { geometry, .. } = &self.phase {
            self.scale = ScaleState::compute(geometry, self.display_width);
            debug!(
                "Rescaled to width {:?}: scale={}, height={}",
                self.display_width, self.scale.scale_factor, self.scale.rendered_height
            );
        }
    }

    /// Re-issue the load for the current locator after a failure or missing
    /// geometry. Returns whether a new load was issued.
    pub fn retry(&mut self) -> bool {
        let locator = match &self.phase {
            ScalerPhase::GeometryUnavailable { locator, .. }
            | ScalerPhase::Failed { locator, .. } => locator.clone(),
            _ => return false,
        };
        info!("Retrying document {}", locator);
        self.begin_load(locator);
        true
    }

    fn begin_load(&mut self, locator: String) {
        self.generation += 1;
        self.scale = ScaleState::default();
        self.phase = ScalerPhase::Loading {
            locator: locator.clone(),
        };

        let ticket = LoadTicket {
            generation: self.generation,
            locator: locator.clone(),
        };
        let request = LoadRequest {
            locator,
            page_number: self.config.page_number,
            scale: self.scale.scale_factor,
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                // Nothing to run the load on; fail this locator instead of panicking.
                let result = Err(PreviewError::TaskFailed(e.to_string()));
                self.apply_completion(LoadCompletion { ticket, result });
                return;
            }
        };

        let loader = Arc::clone(&self.loader);
        let tx = self.completions_tx.clone();
        self.in_flight += 1;
        let load = runtime.spawn(async move { loader.load(request).await });
        runtime.spawn(async move {
            // A panicking or cancelled load still completes, as a failure.
            let result = load.await.unwrap_or_else(|e| Err(PreviewError::from(e)));
            // The scaler may have been dropped; nobody is interested then.
            let _ = tx.send(LoadCompletion { ticket, result });
        });
    }

    /// Apply a load completion. Completions for superseded loads are ignored.
    pub fn apply_completion(&mut self, completion: LoadCompletion) -> LoadOutcome {
        let LoadCompletion { ticket, result } = completion;

        let current = matches!(
            &self.phase,
            ScalerPhase::Loading { locator } if *locator == ticket.locator
        ) && ticket.generation == self.generation;
        if !current {
            debug!(
                "Discarding stale load #{} for {} (current #{})",
                ticket.generation, ticket.locator, self.generation
            );
            return LoadOutcome::Stale;
        }

        let locator = ticket.locator;
        match result {
            Ok(page) => match page.geometry().filter(PageGeometry::is_usable) {
                Some(geometry) => {
                    self.scale = ScaleState::compute(&geometry, self.display_width);
                    info!(
                        "Document {} ready: {}x{} at scale {}",
                        locator,
                        geometry.intrinsic_width,
                        geometry.intrinsic_height,
                        self.scale.scale_factor
                    );
                    self.phase = ScalerPhase::Ready {
                        locator,
                        document: page.document,
                        geometry,
                    };
                }
                None => {
                    debug!(
                        "Document {} has no usable page geometry ({:?})",
                        locator, page.view_box
                    );
                    self.scale = ScaleState::default();
                    self.phase = ScalerPhase::GeometryUnavailable {
                        locator,
                        document: page.document,
                    };
                }
            },
            Err(e) => {
                warn!("Failed to load document {}: {}", locator, e);
                self.scale = ScaleState::default();
                self.phase = ScalerPhase::Failed {
                    locator,
                    message: e.to_string(),
                };
            }
        }
        LoadOutcome::Applied
    }

    /// Apply every completion that has already arrived, without waiting.
    /// Returns how many changed the phase.
    pub fn poll_loads(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if self.apply_completion(completion) == LoadOutcome::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next completion and apply it. Returns `None` when no load
    /// is in flight.
    pub async fn next_load(&mut self) -> Option<LoadOutcome> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.completions_rx.recv().await?;
        self.in_flight -= 1;
        Some(self.apply_completion(completion))
    }

    /// Wait until every issued load has completed.
    pub async fn settle(&mut self) {
        while self.next_load().await.is_some() {}
    }

    /// Directive for the presentation layer.
    pub fn directive(&self) -> RenderDirective {
        let document = |locator: &str, status: DocumentStatus| RenderDirective::Document {
            locator: locator.to_string(),
            width: self.display_width,
            status,
            scale: self.scale,
        };
        match &self.phase {
            ScalerPhase::Unloaded => RenderDirective::Empty,
            ScalerPhase::Loading { locator } => document(locator, DocumentStatus::Loading),
            ScalerPhase::Ready { locator, .. } => document(locator, DocumentStatus::Ready),
            ScalerPhase::GeometryUnavailable { locator, .. } => {
                document(locator, DocumentStatus::GeometryUnavailable)
            }
            ScalerPhase::Failed { locator, message } => RenderDirective::Error {
                locator: locator.clone(),
                message: message.clone(),
            },
        }
    }
}
