//! 配置管理模块
//!
//! 提供翻译流水线的配置管理功能

// 标准库导入
use std::time::Duration;

// 本地模块导入
use crate::constants::{
    api_config, batch_config, is_valid_api_url, pronunciation_config, text_config,
};
use crate::error::Result;
use crate::pipeline_error;

/// 流水线配置结构体
///
/// 支持Builder模式进行链式配置。
///
/// # Examples
///
/// ```rust
/// use page_translation_pipeline::config::PipelineConfig;
///
/// let config = PipelineConfig::new()
///     .with_api_url("http://localhost:1188/translate")
///     .with_initial_batch_size(8)
///     .with_backfill_batch_size(20);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 翻译API服务地址
    api_url: String,
    /// 请求超时时间
    request_timeout: Duration,
    /// 首次处理的批次大小
    initial_batch_size: usize,
    /// 补齐译文的批次大小
    backfill_batch_size: usize,
    /// 拼音候选子串最短长度
    min_candidate_len: usize,
    /// 拼音候选子串最长长度
    max_candidate_len: usize,
    /// OCR失败时的占位原文
    ocr_placeholder: String,
}

impl PipelineConfig {
    /// 创建新的配置实例
    ///
    /// 返回具有默认值的配置实例：
    /// - API地址: 本地开发服务器
    /// - 请求超时: 30秒
    /// - 首次批次大小: 10
    /// - 补齐批次大小: 15
    /// - 候选子串长度: 2~4
    pub fn new() -> Self {
        Self {
            api_url: api_config::LOCAL_API_URL.to_string(),
            request_timeout: Duration::from_secs(api_config::REQUEST_TIMEOUT_SECONDS),
            initial_batch_size: batch_config::INITIAL_BATCH_SIZE,
            backfill_batch_size: batch_config::BACKFILL_BATCH_SIZE,
            min_candidate_len: pronunciation_config::MIN_CANDIDATE_LEN,
            max_candidate_len: pronunciation_config::MAX_CANDIDATE_LEN,
            ocr_placeholder: text_config::OCR_PLACEHOLDER.to_string(),
        }
    }

    /// 获取API地址
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// 获取请求超时时间
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// 获取首次处理的批次大小
    pub fn initial_batch_size(&self) -> usize {
        self.initial_batch_size
    }

    /// 获取补齐译文的批次大小
    pub fn backfill_batch_size(&self) -> usize {
        self.backfill_batch_size
    }

    /// 获取候选子串长度范围
    pub fn candidate_len_range(&self) -> (usize, usize) {
        (self.min_candidate_len, self.max_candidate_len)
    }

    /// 获取OCR占位文本
    pub fn ocr_placeholder(&self) -> &str {
        &self.ocr_placeholder
    }

    /// 设置API地址
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.to_string();
        self
    }

    /// 设置请求超时时间
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 设置首次处理的批次大小
    pub fn with_initial_batch_size(mut self, size: usize) -> Self {
        self.initial_batch_size = size;
        self
    }

    /// 设置补齐译文的批次大小
    pub fn with_backfill_batch_size(mut self, size: usize) -> Self {
        self.backfill_batch_size = size;
        self
    }

    /// 设置候选子串长度范围
    pub fn with_candidate_len_range(mut self, min: usize, max: usize) -> Self {
        self.min_candidate_len = min;
        self.max_candidate_len = max;
        self
    }

    /// 设置OCR占位文本
    pub fn with_ocr_placeholder(mut self, text: &str) -> Self {
        self.ocr_placeholder = text.to_string();
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.initial_batch_size == 0 {
            return Err(pipeline_error!(config, "initial_batch_size", "批次大小必须大于0"));
        }
        if self.backfill_batch_size == 0 {
            return Err(pipeline_error!(config, "backfill_batch_size", "批次大小必须大于0"));
        }
        if self.min_candidate_len == 0 || self.min_candidate_len > self.max_candidate_len {
            return Err(pipeline_error!(
                config,
                "candidate_len_range",
                format!("无效范围 {}..={}", self.min_candidate_len, self.max_candidate_len)
            ));
        }
        if !is_valid_api_url(&self.api_url) {
            return Err(pipeline_error!(config, "api_url", format!("无效地址: {}", self.api_url)));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}
