use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use invex_core::{BoundingBox, InvoiceRecord, Layout};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::hosted::{HostedError, VisionBackend, EXTRACTION_PROMPT};
use crate::reply::{self, ReplyError};
use crate::stats::{self, ImageStats};
use crate::synth::{sample_record, SyntheticProfile};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Hosted extraction failed: {0}")]
    Hosted(#[from] HostedError),
    #[error("Could not read model reply: {0}")]
    Reply(#[from] ReplyError),
}

/// Which field set and box layout an extraction targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Ten-field record, hosted model first when a backend is configured.
    #[default]
    Hosted,
    /// Six-field record from the dataset profile; the backend is never called.
    Dataset,
}

impl ExtractionMode {
    pub fn layout(self) -> Layout {
        match self {
            ExtractionMode::Hosted => Layout::Full,
            ExtractionMode::Dataset => Layout::Dataset,
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Hosted => write!(f, "hosted"),
            ExtractionMode::Dataset => write!(f, "dataset"),
        }
    }
}

impl FromStr for ExtractionMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hosted" => Ok(ExtractionMode::Hosted),
            "dataset" => Ok(ExtractionMode::Dataset),
            other => Err(format!("Unknown extraction mode: '{other}'")),
        }
    }
}

/// Where the record in an [`Extraction`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    HostedModel,
    Synthetic(SyntheticProfile),
    Sample,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::HostedModel => write!(f, "hosted-model"),
            ExtractionSource::Synthetic(p) => write!(f, "synthetic:{p}"),
            ExtractionSource::Sample => write!(f, "sample"),
        }
    }
}

impl Serialize for ExtractionSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The result of a single extraction run.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub source: ExtractionSource,
    /// `None` when the bytes could not be decoded as an image.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub record: InvoiceRecord,
    pub boxes: Vec<BoundingBox>,
}

/// Orchestrates: measure → hosted model → synthetic profiles → sample record → boxes.
pub struct InvoicePipeline<B: VisionBackend> {
    backend: Option<B>,
    mode: ExtractionMode,
    profiles: Vec<SyntheticProfile>,
    today: Option<NaiveDate>,
}

impl<B: VisionBackend> InvoicePipeline<B> {
    pub fn new(backend: Option<B>) -> Self {
        Self {
            backend,
            mode: ExtractionMode::default(),
            profiles: SyntheticProfile::DEFAULT_CHAIN.to_vec(),
            today: None,
        }
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the synthetic fallback chain used in hosted mode.
    pub fn with_profiles(mut self, profiles: Vec<SyntheticProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Pin the issue date of synthetic records instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Process an image on disk. Only reading the file can fail.
    pub async fn process_file(&self, path: &Path) -> Result<Extraction, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.process_bytes(&bytes, &filename).await)
    }

    /// Process raw image bytes. Every content failure turns into the next fallback.
    pub async fn process_bytes(&self, data: &[u8], filename: &str) -> Extraction {
        let stats = match ImageStats::from_bytes(data) {
            Ok(s) => s,
            Err(e) => {
                warn!(filename, error = %e, "Image could not be decoded, using sample record");
                return finish(ExtractionSource::Sample, sample_record(), None, self.mode.layout());
            }
        };

        if self.mode == ExtractionMode::Hosted {
            if let Some(backend) = &self.backend {
                match ask_backend(backend, data).await {
                    Ok(record) => {
                        let layout = self.mode.layout();
                        return finish(ExtractionSource::HostedModel, record, Some(&stats), layout);
                    }
                    Err(e) => warn!(filename, error = %e, "Hosted extraction failed, falling back"),
                }
            }
        }

        let (source, record) = self
            .synthesize(&stats, filename)
            .map(|(p, r)| (ExtractionSource::Synthetic(p), r))
            .unwrap_or_else(|| (ExtractionSource::Sample, sample_record()));
        finish(source, record, Some(&stats), self.mode.layout())
    }

    /// First profile in the active chain that produces a record.
    fn synthesize(
        &self,
        stats: &ImageStats,
        filename: &str,
    ) -> Option<(SyntheticProfile, InvoiceRecord)> {
        let chain: &[SyntheticProfile] = match self.mode {
            ExtractionMode::Hosted => self.profiles.as_slice(),
            ExtractionMode::Dataset => &[SyntheticProfile::Dataset],
        };
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let mut rng = rand::thread_rng();

        chain.iter().find_map(|&profile| {
            match profile.generate(stats, filename, today, &mut rng) {
                Ok(record) => Some((profile, record)),
                Err(e) => {
                    warn!(%profile, error = %e, "Synthetic profile failed");
                    None
                }
            }
        })
    }
}

async fn ask_backend<B: VisionBackend>(
    backend: &B,
    data: &[u8],
) -> Result<InvoiceRecord, PipelineError> {
    let text = backend
        .generate(EXTRACTION_PROMPT, data, stats::sniff_mime(data))
        .await?;
    Ok(reply::parse_reply(&text)?)
}

fn finish(
    source: ExtractionSource,
    record: InvoiceRecord,
    stats: Option<&ImageStats>,
    layout: Layout,
) -> Extraction {
    let (width, height) = match stats {
        Some(s) => (Some(s.width), Some(s.height)),
        None => (None, None),
    };
    let boxes = stats.map(|s| layout.boxes(s.width, s.height)).unwrap_or_default();
    let (filled, fields) = record.coverage();
    info!(%source, filled, fields, boxes = boxes.len(), "Invoice extracted");

    Extraction { source, width, height, record, boxes }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
