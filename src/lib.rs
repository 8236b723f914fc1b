//! Page Translation Pipeline - 页面文本处理与翻译流水线
//!
//! 这个库提供按语言分段、多粒度拼音生成、批量翻译以及处理结果缓存等核心功能，
//! 由宿主程序注入OCR、翻译、页面存储和用户偏好等外部服务。

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod language;
pub mod model;
pub mod services;
pub mod stats;
pub mod translator;
pub mod utils;
pub mod workflow;

pub use cache::{CacheStats, ProcessedTextCache};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use language::{LanguageProcessor, PronunciationTable, TextSpan};
pub use model::{Note, Page, PageProcessingData, ProcessedText, SegmentType, TextSegment};
pub use services::{InMemoryPageStore, OcrService, PageStore, PreferenceStore, StaticPreferences};
pub use stats::{StatsSnapshot, WorkflowStats};
pub use translator::{BatchTranslator, HttpTranslationService, TranslationService};
pub use workflow::{PageSource, PageWorkflow};
