//! 翻译模块
//!
//! - [`TranslationService`]：翻译服务抽象，单次往返翻译一段文本
//! - [`HttpTranslationService`]：基于HTTP JSON接口的实现
//! - [`BatchTranslator`]：用唯一分隔符把多段短文本合并为一次请求，再按分隔符拆回
//!
//! 翻译失败永远不会向上传播：失败的文本原样返回。

// 标准库导入
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// 第三方crate导入
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};

// 本地模块导入
use crate::config::PipelineConfig;
use crate::constants::{api_config, batch_config};
use crate::pipeline_error;
use crate::stats::WorkflowStats;

/// 翻译服务抽象
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// 翻译一段文本，一次往返
    async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str)
        -> Result<String>;
}

/// 基于HTTP JSON接口的翻译服务
pub struct HttpTranslationService {
    client: Client,
    api_url: String,
}

impl HttpTranslationService {
    /// 根据配置创建HTTP翻译服务
    pub fn new(config: &PipelineConfig) -> crate::error::Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url().to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl TranslationService for HttpTranslationService {
    async fn translate_text(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&json!({
                "text": text,
                "source_lang": source_lang,
                "target_lang": target_lang
            }))
            .send()
            .await
            .context("发送翻译请求失败")?;

        let status = response.status();
        if !status.is_success() {
            return Err(pipeline_error!(
                translation,
                format!("翻译API返回错误状态: {}", status),
                status.as_u16()
            )
            .into());
        }

        let response_text = response.text().await.context("读取响应失败")?;
        Ok(extract_translated_text(&response_text))
    }
}

/// 从响应体中提取译文
///
/// 优先读取JSON中的 `data`/`text`/`result` 字段，否则把响应体当作纯文本。
pub fn extract_translated_text(response_text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(response_text) {
        Ok(json_val) => api_config::RESPONSE_TEXT_FIELDS
            .iter()
            .find_map(|field| json_val.get(*field).and_then(|v| v.as_str()))
            .unwrap_or(response_text)
            .to_string(),
        Err(_) => response_text.to_string(),
    }
}

static DELIMITER_SEQ: AtomicU64 = AtomicU64::new(0);

/// 生成带时间戳的唯一分隔符，保证不出现在任何输入文本中
pub fn make_delimiter(texts: &[String]) -> String {
    loop {
        let seq = DELIMITER_SEQ.fetch_add(1, Ordering::Relaxed);
        let delimiter = format!(
            "{}_{}_{}{}",
            batch_config::DELIMITER_PREFIX,
            chrono::Utc::now().timestamp_millis(),
            seq,
            batch_config::DELIMITER_SUFFIX
        );
        if !texts.iter().any(|t| t.contains(&delimiter)) {
            return delimiter;
        }
    }
}

/// 批量翻译器
///
/// 同一页面内的批次按顺序执行，限制对翻译服务的并发压力。
#[derive(Clone)]
pub struct BatchTranslator {
    service: Arc<dyn TranslationService>,
    stats: Arc<WorkflowStats>,
}

impl BatchTranslator {
    pub fn new(service: Arc<dyn TranslationService>) -> Self {
        Self::with_stats(service, Arc::new(WorkflowStats::new()))
    }

    pub fn with_stats(service: Arc<dyn TranslationService>, stats: Arc<WorkflowStats>) -> Self {
        Self { service, stats }
    }

    pub fn stats(&self) -> &Arc<WorkflowStats> {
        &self.stats
    }

    /// 翻译单段文本，失败时返回原文
    pub async fn translate_text(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        self.stats.record_translation_call();
        match self.service.translate_text(text, source_lang, target_lang).await {
            Ok(translated) => translated.trim().to_string(),
            Err(e) => {
                warn!("❌ 翻译失败，保留原文: {}", e);
                self.stats.record_fallback();
                text.to_string()
            }
        }
    }

    /// 将多段文本合并为一次翻译请求
    ///
    /// 输出长度与输入相同且顺序一致；请求失败或拆分数量不符时返回原文。
    pub async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Vec<String> {
        match texts.len() {
            0 => return Vec::new(),
            1 => return vec![self.translate_text(&texts[0], source_lang, target_lang).await],
            _ => {}
        }

        let delimiter = make_delimiter(texts);
        let combined = texts.join(&format!("\n{}\n", delimiter));

        self.stats.record_translation_call();
        let response = match self
            .service
            .translate_text(&combined, source_lang, target_lang)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("❌ 批量翻译失败，{} 段文本保留原文: {}", texts.len(), e);
                self.stats.record_fallback();
                return texts.to_vec();
            }
        };

        let pieces: Vec<String> = response
            .split(delimiter.as_str())
            .map(|piece| piece.trim().to_string())
            .collect();

        if pieces.len() != texts.len() {
            warn!(
                "⚠️  批量翻译结果数量不符: 期望 {} 段，实际 {} 段，保留原文",
                texts.len(),
                pieces.len()
            );
            self.stats.record_fallback();
            return texts.to_vec();
        }

        pieces
    }

    /// 按固定批次大小顺序翻译全部文本，结果写回原索引
    pub async fn translate_all(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
        batch_size: usize,
    ) -> Vec<String> {
        if texts.is_empty() {
            return Vec::new();
        }

        let batch_size = batch_size.max(1);
        let batch_count = (texts.len() + batch_size - 1) / batch_size;
        info!("🚀 批量翻译: {} 段文本分成 {} 个批次", texts.len(), batch_count);

        let mut results = vec![String::new(); texts.len()];
        for (batch_idx, chunk) in texts.chunks(batch_size).enumerate() {
            self.stats.record_batch();
            debug!("处理批次 {}/{}: {} 段文本", batch_idx + 1, batch_count, chunk.len());

            let translated = self.translate_batch(chunk, source_lang, target_lang).await;
            let offset = batch_idx * batch_size;
            for (i, text) in translated.into_iter().enumerate() {
                results[offset + i] = text;
            }
        }

        results
    }
}
