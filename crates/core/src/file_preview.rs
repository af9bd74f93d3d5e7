//! Turning a user's file selection into a preview and an upload handle.
//!
//! [`FilePreviewPipeline::on_file_selected`] hands the raw file to the sink
//! right away, then decodes it into a `data:` URI on the tokio runtime and
//! reports either the preview or the decode error.

use crate::config::PipelineConfig;
use crate::data_uri;
use crate::error::{PreviewError, Result};
use futures::stream::{self, Stream};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Raw handle to a file the user picked. Stays valid for upload whatever the
/// decode outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    id: Uuid,
    path: PathBuf,
    name: String,
    declared_type: Option<String>,
}

impl SelectedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string();
        Self {
            id: Uuid::new_v4(),
            path,
            name,
            declared_type: None,
        }
    }

    /// Attach the MIME type reported by the picker.
    pub fn with_declared_type(mut self, mime_type: impl Into<String>) -> Self {
        self.declared_type = Some(mime_type.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }
}

/// Asynchronous file-read capability.
pub trait FileReader: Send + Sync + 'static {
    /// Read `file` and encode it as a data URI. Completes exactly once.
    fn read_as_data_uri(&self, file: &SelectedFile) -> impl Future<Output = Result<String>> + Send;
}

/// Reads files from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsDataUriReader {
    config: PipelineConfig,
}

impl FsDataUriReader {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl FileReader for FsDataUriReader {
    fn read_as_data_uri(&self, file: &SelectedFile) -> impl Future<Output = Result<String>> + Send {
        let path = file.path().to_path_buf();
        let declared = file.declared_type().map(str::to_string);
        let config = self.config.clone();

        async move {
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|source| PreviewError::FileRead {
                    path: path.clone(),
                    source,
                })?;
            if metadata.len() > config.max_file_size {
                return Err(PreviewError::FileTooLarge {
                    path,
                    size: metadata.len(),
                    limit: config.max_file_size,
                });
            }

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| PreviewError::FileRead {
                    path: path.clone(),
                    source,
                })?;
            if bytes.is_empty() {
                return Err(PreviewError::EmptyFile(path));
            }
            // The file may have grown since the metadata check.
            if bytes.len() as u64 > config.max_file_size {
                return Err(PreviewError::FileTooLarge {
                    path,
                    size: bytes.len() as u64,
                    limit: config.max_file_size,
                });
            }

            let mime_type =
                detect_mime_type(&bytes, declared.as_deref(), &path, &config.fallback_mime_type);
            debug!("Encoding {:?} ({} bytes) as {}", path, bytes.len(), mime_type);
            Ok(data_uri::encode(&mime_type, &bytes))
        }
    }
}

/// Pick a MIME type: content sniffing, then the picker's declared type, then
/// the file extension, then `fallback`.
pub fn detect_mime_type(bytes: &[u8], declared: Option<&str>, path: &Path, fallback: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    if let Some(declared) = declared.map(str::trim) {
        if declared.contains('/') && !declared.eq_ignore_ascii_case("application/octet-stream") {
            return declared.to_ascii_lowercase();
        }
    }

    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(fallback)
        .to_string()
}

/// Receives the pipeline's outputs.
pub trait SelectionSink: Send + Sync + 'static {
    /// The raw file, available for upload before decoding starts.
    fn on_raw_file_ready(&self, file: SelectedFile);

    /// The decoded preview. Never called if decoding fails.
    fn on_preview_ready(&self, data_uri: String);

    /// Decoding failed; the raw file is still valid.
    fn on_decode_error(&self, error: PreviewError);
}

/// Decodes one selected file at a time.
pub struct FilePreviewPipeline<R: FileReader = FsDataUriReader> {
    reader: Arc<R>,
}

impl FilePreviewPipeline<FsDataUriReader> {
    /// Create a pipeline that reads from the local filesystem.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self::with_reader(Arc::new(FsDataUriReader::new(config)?)))
    }
}

impl<R: FileReader> FilePreviewPipeline<R> {
    pub fn with_reader(reader: Arc<R>) -> Self {
        Self { reader }
    }

    /// Handle a file-selection event.
    ///
    /// Only the first file is used and an empty selection does nothing. The
    /// sink gets the raw file before this returns; the preview or decode error
    /// follows from a spawned task whose handle is returned.
    pub fn on_file_selected<S: SelectionSink>(
        &self,
        files: impl IntoIterator<Item = SelectedFile>,
        sink: Arc<S>,
    ) -> Option<JoinHandle<()>> {
        let file = files.into_iter().next()?;
        info!("File selected: {}", file.name());

        sink.on_raw_file_ready(file.clone());

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!("No runtime to decode {}: {}", file.name(), e);
                sink.on_decode_error(PreviewError::TaskFailed(e.to_string()));
                return None;
            }
        };

        let reader = Arc::clone(&self.reader);
        let decode_file = file.clone();
        let decode = runtime.spawn(async move { reader.read_as_data_uri(&decode_file).await });
        Some(runtime.spawn(async move {
            // A panicking or cancelled reader still ends in a decode error.
            let result = decode.await.unwrap_or_else(|e| Err(PreviewError::from(e)));
            match result {
                Ok(data_uri) => {
                    debug!("Preview ready for {}", file.name());
                    sink.on_preview_ready(data_uri);
                }
                Err(e) => {
                    warn!("Failed to decode {}: {}", file.name(), e);
                    sink.on_decode_error(e);
                }
            }
        }))
    }
}

/// A pipeline callback, as delivered by [`ChannelSink`].
#[derive(Debug)]
pub enum SelectionEvent {
    RawFileReady(SelectedFile),
    PreviewReady(String),
    DecodeFailed(PreviewError),
}

/// Sink that forwards callbacks over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SelectionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Arc<Self>, SelectionEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), SelectionEvents { rx })
    }
}

impl SelectionSink for ChannelSink {
    fn on_raw_file_ready(&self, file: SelectedFile) {
        let _ = self.tx.send(SelectionEvent::RawFileReady(file));
    }

    fn on_preview_ready(&self, data_uri: String) {
        let _ = self.tx.send(SelectionEvent::PreviewReady(data_uri));
    }

    fn on_decode_error(&self, error: PreviewError) {
        let _ = self.tx.send(SelectionEvent::DecodeFailed(error));
    }
}

/// Receiving end of a [`ChannelSink`].
#[derive(Debug)]
pub struct SelectionEvents {
    rx: mpsc::UnboundedReceiver<SelectionEvent>,
}

impl SelectionEvents {
    pub async fn recv(&mut self) -> Option<SelectionEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SelectionEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next selection to finish decoding, successfully or not.
    /// Returns the partial selection if the channel closes first.
    pub async fn next_selection(&mut self) -> Option<FileSelection> {
        let mut selection: Option<FileSelection> = None;
        while let Some(event) = self.rx.recv().await {
            match event {
                SelectionEvent::RawFileReady(file) => selection = Some(FileSelection::new(file)),
                other => {
                    if let Some(current) = selection.as_mut() {
                        current.apply(other);
                        return selection;
                    }
                }
            }
        }
        selection
    }

    pub fn into_stream(self) -> impl Stream<Item = SelectionEvent> {
        stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
    }
}

/// A picked file and its preview, as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub raw_file: SelectedFile,
    pub preview_data_uri: Option<String>,
    /// Set when decoding failed, so "failed" is distinguishable from "still
    /// decoding".
    pub decode_error: Option<String>,
}

impl FileSelection {
    pub fn new(raw_file: SelectedFile) -> Self {
        Self {
            raw_file,
            preview_data_uri: None,
            decode_error: None,
        }
    }

    /// Fold a pipeline event into this selection. A new raw file starts over.
    pub fn apply(&mut self, event: SelectionEvent) {
        match event {
            SelectionEvent::RawFileReady(file) => *self = FileSelection::new(file),
            SelectionEvent::PreviewReady(data_uri) => self.preview_data_uri = Some(data_uri),
            SelectionEvent::DecodeFailed(e) => self.decode_error = Some(e.to_string()),
        }
    }

    pub fn is_decoding(&self) -> bool {
        self.preview_data_uri.is_none() && self.decode_error.is_none()
    }
}
