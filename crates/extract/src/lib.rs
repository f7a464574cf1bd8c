pub mod annotate;
pub mod hash;
pub mod heuristics;
pub mod hosted;
pub mod pipeline;
pub mod reply;
pub mod stats;
pub mod synth;

pub use annotate::{annotate_png, draw_boxes, AnnotateError};
pub use heuristics::TextExtractor;
pub use hosted::{GeminiBackend, HostedError, MockVision, VisionBackend, EXTRACTION_PROMPT};
pub use pipeline::{Extraction, ExtractionMode, ExtractionSource, InvoicePipeline, PipelineError};
pub use reply::{parse_reply, ReplyError};
pub use stats::{sniff_mime, ImageStats, StatsError};
pub use synth::{sample_record, SynthError, SyntheticProfile};
