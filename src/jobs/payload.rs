use serde::Serialize;
use url::Url;

use super::{JobError, JobOperation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    External,
}

/// A pre-signed URL the provider reads from or writes to directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    href: String,
    storage: StorageKind,
}

impl ResourceLocator {
    pub fn external(href: &str, field: &str) -> Result<Self, JobError> {
        let trimmed = href.trim();
        let parsed = Url::parse(trimmed).map_err(|error| JobError::InvalidLocator {
            field: field.to_string(),
            message: error.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(JobError::InvalidLocator {
                field: field.to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        // Keep the caller's exact text; the signature covers the encoded query.
        Ok(Self {
            href: trimmed.to_string(),
            storage: StorageKind::External,
        })
    }

    pub fn href(&self) -> &str {
        self.href.as_str()
    }

    pub fn storage(&self) -> StorageKind {
        self.storage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskFormat {
    #[default]
    Soft,
    Binary,
}

impl MaskFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Soft => "soft",
            Self::Binary => "binary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "soft" => Some(Self::Soft),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ImageMediaType {
    #[default]
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/tiff")]
    Tiff,
}

impl ImageMediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "jpeg" | "jpg" => Some(Self::Jpeg),
            "image/png" | "png" => Some(Self::Png),
            "image/tiff" | "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobOptions {
    pub mask_format: MaskFormat,
    pub output_type: ImageMediaType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalInput {
    pub href: String,
    pub storage: StorageKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoToneOutput {
    pub href: String,
    pub storage: StorageKind,
    #[serde(rename = "type")]
    pub media_type: ImageMediaType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoTonePayload {
    pub inputs: ExternalInput,
    pub outputs: Vec<AutoToneOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutoutMask {
    pub format: MaskFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutoutOutput {
    pub href: String,
    pub storage: StorageKind,
    pub mask: CutoutMask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveBackgroundPayload {
    pub input: ExternalInput,
    pub output: CutoutOutput,
}

/// Request body for one job. Serializes to the bare provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobRequest {
    AutoTone(AutoTonePayload),
    RemoveBackground(RemoveBackgroundPayload),
}

impl JobRequest {
    pub fn operation(&self) -> JobOperation {
        match self {
            Self::AutoTone(_) => JobOperation::AutoTone,
            Self::RemoveBackground(_) => JobOperation::RemoveBackground,
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, JobError> {
        serde_json::to_vec(self).map_err(JobError::PayloadEncode)
    }
}

pub fn build_job_request(
    operation: JobOperation,
    input: &ResourceLocator,
    output: &ResourceLocator,
    options: &JobOptions,
) -> JobRequest {
    let source = ExternalInput {
        href: input.href().to_string(),
        storage: input.storage(),
    };
    match operation {
        JobOperation::AutoTone => JobRequest::AutoTone(AutoTonePayload {
            inputs: source,
            outputs: vec![AutoToneOutput {
                href: output.href().to_string(),
                storage: output.storage(),
                media_type: options.output_type,
            }],
        }),
        JobOperation::RemoveBackground => JobRequest::RemoveBackground(RemoveBackgroundPayload {
            input: source,
            output: CutoutOutput {
                href: output.href().to_string(),
                storage: output.storage(),
                mask: CutoutMask {
                    format: options.mask_format,
                },
            },
        }),
    }
}
