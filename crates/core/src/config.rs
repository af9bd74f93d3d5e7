//! Configuration types for media previews.

use crate::error::{PreviewError, Result};
use serde::{Deserialize, Serialize};

/// Default upper bound for files turned into data URIs (8 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// MIME type used when neither content nor name reveal one.
pub const DEFAULT_FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Configuration for content classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// MIME types rendered through the document scaler.
    /// Default: `["application/pdf"]`.
    pub document_types: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            document_types: vec!["application/pdf".to_string()],
        }
    }
}

impl DispatchConfig {
    /// Add another MIME type to route through the document scaler.
    pub fn document_type(mut self, mime_type: impl Into<String>) -> Self {
        self.document_types.push(mime_type.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(bad) = self
            .document_types
            .iter()
            .find(|t| t.trim().is_empty() || !t.contains('/'))
        {
            return Err(PreviewError::InvalidConfig(format!(
                "document type '{}' is not a MIME type",
                bad
            )));
        }
        Ok(())
    }
}

/// Configuration for the document scaler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    /// Page whose geometry drives scaling (1-indexed).
    /// Default: 1.
    pub page_number: u16,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self { page_number: 1 }
    }
}

impl ScalerConfig {
    /// Create a scaler config for a specific page.
    pub fn with_page(page_number: u16) -> Self {
        Self { page_number }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.page_number == 0 {
            return Err(PreviewError::InvalidConfig(
                "page_number is 1-indexed and must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the file preview pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest file (in bytes) that is encoded into a data URI.
    /// Default: 8 MiB.
    pub max_file_size: u64,

    /// MIME type used when detection fails.
    /// Default: `application/octet-stream`.
    pub fallback_mime_type: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            fallback_mime_type: DEFAULT_FALLBACK_MIME_TYPE.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a pipeline config with the given size limit.
    pub fn with_max_file_size(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            ..Default::default()
        }
    }

    /// Set the fallback MIME type.
    pub fn fallback_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.fallback_mime_type = mime_type.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(PreviewError::InvalidConfig(
                "max_file_size must be greater than 0".to_string(),
            ));
        }
        if !self.fallback_mime_type.contains('/') {
            return Err(PreviewError::InvalidConfig(format!(
                "fallback_mime_type '{}' is not a MIME type",
                self.fallback_mime_type
            )));
        }
        Ok(())
    }
}

/// Configuration for rasterizing a scaled page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Whether to keep the alpha channel (transparency).
    /// Default: false.
    pub use_alpha: bool,

    /// Background color for pages (if not using alpha).
    /// Default: white (255, 255, 255).
    pub background_color: (u8, u8, u8),
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            use_alpha: false,
            background_color: (255, 255, 255),
        }
    }
}

impl RasterConfig {
    /// Enable alpha channel.
    pub fn use_alpha(mut self, enabled: bool) -> Self {
        self.use_alpha = enabled;
        self
    }

    /// Set the background color.
    pub fn background_color(mut self, rgb: (u8, u8, u8)) -> Self {
        self.background_color = rgb;
        self
    }
}

/// Combined configuration for the preview core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Content classification.
    pub dispatch: DispatchConfig,

    /// Document scaling.
    pub scaler: ScalerConfig,

    /// File preview pipeline.
    pub pipeline: PipelineConfig,

    /// Page rasterization.
    pub raster: RasterConfig,
}

impl PreviewConfig {
    /// Parse a JSON configuration document and validate it.
    /// Missing sections fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate()?;
        self.scaler.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.document_types, vec!["application/pdf".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatch_config_document_type_builder() {
        let config = DispatchConfig::default().document_type("application/x-pdf");
        assert_eq!(config.document_types.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatch_config_rejects_non_mime() {
        let config = DispatchConfig::default().document_type("pdf");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scaler_config_defaults() {
        let config = ScalerConfig::default();
        assert_eq!(config.page_number, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scaler_config_zero_page() {
        let config = ScalerConfig::with_page(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.fallback_mime_type, "application/octet-stream");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_validation() {
        assert!(PipelineConfig::with_max_file_size(0).validate().is_err());
        assert!(PipelineConfig::default()
            .fallback_mime_type("binary")
            .validate()
            .is_err());
        assert!(PipelineConfig::with_max_file_size(1024)
            .fallback_mime_type("image/png")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_raster_config_builder_pattern() {
        let config = RasterConfig::default()
            .use_alpha(true)
            .background_color((0, 0, 0));
        assert!(config.use_alpha);
        assert_eq!(config.background_color, (0, 0, 0));
    }

    #[test]
    fn test_preview_config_validate_propagates() {
        let mut config = PreviewConfig::default();
        config.scaler.page_number = 0;
        assert!(config.validate().is_err());

        let mut config2 = PreviewConfig::default();
        config2.pipeline.max_file_size = 0;
        assert!(config2.validate().is_err());
    }

    #[test]
    fn test_preview_config_from_json_partial() {
        let config = PreviewConfig::from_json(
            r#"{ "dispatch": { "document_types": ["application/pdf", "application/x-pdf"] } }"#,
        )
        .unwrap();
        assert_eq!(config.dispatch.document_types.len(), 2);
        assert_eq!(config.scaler.page_number, 1);
        assert_eq!(config.pipeline.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_preview_config_from_json_invalid() {
        assert!(PreviewConfig::from_json(r#"{ "scaler": { "page_number": 0 } }"#).is_err());
        assert!(PreviewConfig::from_json("not json").is_err());
    }
}
