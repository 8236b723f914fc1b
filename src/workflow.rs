//! 页面处理工作流
//!
//! 负责把页面原文变成可展示的 [`ProcessedText`]：
//!
//! 1. 查缓存，命中且有内容时直接返回，不发起任何网络请求
//! 2. 获取原文（页面记录，或仅有图片时调用OCR）
//! 3. 按源语言分段
//! 4. 并发执行拼音生成和翻译
//! 5. 组装结果并写入缓存
//!
//! 同时提供显示模式切换、分段删除和按需补齐译文的操作。
//! 同一页面的操作通过页面级互斥锁串行执行；不同页面可以并行处理。
//! 每个操作都在独立任务中运行，调用方中途放弃时翻译仍会完成并写入缓存。

// 标准库导入
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

// 第三方crate导入
use dashmap::DashMap;
use futures::future::join;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

// 本地模块导入
use crate::cache::ProcessedTextCache;
use crate::config::PipelineConfig;
use crate::language::{LanguageProcessor, PronunciationTable, TextSpan};
use crate::model::{Note, Page, PageProcessingData, ProcessedText, TextSegment};
use crate::pipeline_error;
use crate::services::{OcrService, PageStore, PreferenceStore};
use crate::stats::{format_duration, StatsSnapshot, WorkflowStats};
use crate::translator::{BatchTranslator, TranslationService};
use crate::utils::{is_blank, join_translations, preview};

/// 调用方提供的页面内容来源
#[derive(Debug, Clone)]
pub enum PageSource {
    /// 已识别的原文
    Text(String),
    /// 需要OCR的图片数据
    Image(Vec<u8>),
}

/// 翻译阶段的产出
enum TranslationOutcome {
    /// 与分段一一对应的译文
    Segments(Vec<String>),
    /// 整体译文
    Full(String),
}

type PageLocks = DashMap<String, Arc<Mutex<()>>>;

/// 持有中的页面锁，释放时清理无人等待的锁条目
struct PageLockGuard {
    locks: Arc<PageLocks>,
    page_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PageLockGuard {
    fn drop(&mut self) {
        // 先释放互斥锁，之后只剩表内引用说明没有其他持有者或等待者
        self.guard.take();
        self.locks
            .remove_if(&self.page_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// 页面处理工作流
#[derive(Clone)]
pub struct PageWorkflow {
    config: PipelineConfig,
    cache: Arc<ProcessedTextCache>,
    translator: BatchTranslator,
    ocr: Arc<dyn OcrService>,
    pages: Arc<dyn PageStore>,
    preferences: Arc<dyn PreferenceStore>,
    stats: Arc<WorkflowStats>,
    page_locks: Arc<PageLocks>,
}

impl PageWorkflow {
    pub fn new(
        config: PipelineConfig,
        translation: Arc<dyn TranslationService>,
        ocr: Arc<dyn OcrService>,
        pages: Arc<dyn PageStore>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let stats = Arc::new(WorkflowStats::new());
        Self {
            config,
            cache: Arc::new(ProcessedTextCache::new()),
            translator: BatchTranslator::with_stats(translation, stats.clone()),
            ocr,
            pages,
            preferences,
            stats,
            page_locks: Arc::new(DashMap::new()),
        }
    }

    /// 使用共享缓存
    pub fn with_cache(mut self, cache: Arc<ProcessedTextCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ProcessedTextCache> {
        &self.cache
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 当前仍被持有或等待的页面锁数量
    pub fn active_page_locks(&self) -> usize {
        self.page_locks.len()
    }

    /// 处理页面原文
    ///
    /// 缓存命中且有内容时直接返回。否则获取原文、分段、并发生成拼音和翻译，
    /// 组装后写入缓存。OCR失败时返回占位结果（不写缓存）。
    pub async fn process_page_text(&self, page: &Page, source: Option<PageSource>) -> ProcessedText {
        let (text, image) = match source {
            Some(PageSource::Text(text)) if !is_blank(&text) => (Some(text), None),
            Some(PageSource::Image(image)) if is_blank(&page.original_text) => (None, Some(image)),
            _ if !is_blank(&page.original_text) => (Some(page.original_text.clone()), None),
            _ => (None, None),
        };

        let this = self.clone();
        let page_id = page.id.clone();
        let source_lang = page.source_language.clone();
        let target_lang = page.target_language.clone();
        let fallback = self.placeholder(&source_lang, &target_lang);

        self.run_detached(
            async move {
                this.process_locked(&page_id, &source_lang, &target_lang, text, image)
                    .await
            },
            fallback,
        )
        .await
    }

    /// 处理预处理阶段传入的页面数据
    pub async fn process_page_data(&self, data: PageProcessingData) -> ProcessedText {
        if !data.ocr_success || is_blank(data.best_text()) {
            warn!("⚠️  页面 {} 没有可用文字，返回占位结果", data.page_id);
            return self.placeholder(&data.source_language, &data.target_language);
        }

        if !data.titles.is_empty() {
            debug!("页面 {} 检测到标题: {:?}", data.page_id, data.titles);
        }

        let this = self.clone();
        let text = data.best_text().to_string();
        let fallback = self.placeholder(&data.source_language, &data.target_language);

        self.run_detached(
            async move {
                this.process_locked(
                    &data.page_id,
                    &data.source_language,
                    &data.target_language,
                    Some(text),
                    None,
                )
                .await
            },
            fallback,
        )
        .await
    }

    /// 为已缓存的页面准备展示内容
    ///
    /// 只有在缓存的显示模式与当前偏好不一致，或当前模式缺少译文时才会重新翻译和写缓存，
    /// 重复进入未变化的页面不会发起网络请求。
    pub async fn process_and_prepare_page_content(&self, page: &Page, note: &Note) -> ProcessedText {
        let (source_lang, target_lang) = page.language_pair(Some(note));
        let page = Page {
            source_language: source_lang.to_string(),
            target_language: target_lang.to_string(),
            ..page.clone()
        };

        let this = self.clone();
        let fallback = self.placeholder(&page.source_language, &page.target_language);

        self.run_detached(async move { this.prepare_locked(page).await }, fallback)
            .await
    }

    /// 切换页面的显示模式（分段 <-> 全文）
    ///
    /// 进入目标模式前按需补齐译文，结果总是写回缓存。页面未缓存时返回 `None`。
    pub async fn toggle_display_mode_for_page(&self, page_id: &str) -> Option<ProcessedText> {
        let this = self.clone();
        let page_id = page_id.to_string();

        self.run_detached(async move { this.toggle_locked(&page_id).await }, None)
            .await
    }

    /// 删除一个分段并重建全文
    ///
    /// 全文模式下、页面未缓存或索引越界时不做任何修改，返回 `None`。
    pub async fn delete_segment(&self, page: &Page, segment_index: usize) -> Option<ProcessedText> {
        let this = self.clone();
        let page_id = page.id.clone();

        self.run_detached(
            async move { this.delete_segment_locked(&page_id, segment_index).await },
            None,
        )
        .await
    }

    /// 查询片段拼音，查找表缺失时只对该片段重新生成并写回缓存
    pub async fn fragment_pronunciation(&self, page_id: &str, fragment: &str) -> Option<String> {
        let _guard = self.lock_page(page_id).await;

        let cached = self.cache.get(page_id)?;
        if let Some(found) = cached.pronunciation_for(fragment) {
            return Some(found.to_string());
        }

        let processor = LanguageProcessor::for_language(&cached.source_language);
        let generated = processor.resolve_pronunciation(&cached.pronunciations, fragment)?;

        let mut table = cached.pronunciations.clone();
        table.insert(fragment.to_string(), generated.clone());
        self.persist(page_id, &cached.with_pronunciations(table));
        Some(generated)
    }

    /// 页面删除时移除缓存
    ///
    /// 等待该页面正在进行的操作结束后再删除，避免处理结果在失效后被重新写入。
    pub async fn invalidate_page(&self, page_id: &str) -> bool {
        let _guard = self.lock_page(page_id).await;
        let removed = self.cache.remove(page_id);
        debug!("🧹 页面 {} 缓存失效: {}", page_id, removed);
        removed
    }

    /// 笔记删除时移除其全部页面的缓存，返回移除数量
    pub async fn invalidate_note(&self, note: &Note) -> usize {
        // 去重并按固定顺序加锁
        let page_ids: BTreeSet<&str> = note.page_ids.iter().map(String::as_str).collect();
        let mut guards = Vec::with_capacity(page_ids.len());
        for page_id in &page_ids {
            guards.push(self.lock_page(page_id).await);
        }

        let removed = self.cache.remove_many(page_ids.iter().copied());
        info!("🧹 笔记 {} 缓存失效: {} 页", note.id, removed);
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("🧹 处理结果缓存已清空");
    }

    async fn process_locked(
        &self,
        page_id: &str,
        source_lang: &str,
        target_lang: &str,
        text: Option<String>,
        image: Option<Vec<u8>>,
    ) -> ProcessedText {
        let _guard = self.lock_page(page_id).await;

        if let Some(cached) = self.cached_content(page_id) {
            debug!("⚡ 缓存命中: {}", page_id);
            return cached;
        }

        let raw_text = match text {
            Some(text) => text,
            None => match self.recognize(page_id, image).await {
                Some(text) => text,
                None => return self.placeholder(source_lang, target_lang),
            },
        };

        let segment_mode = self.prefers_segment_mode().await;
        self.assemble(page_id, &raw_text, source_lang, target_lang, segment_mode)
            .await
    }

    async fn prepare_locked(&self, page: Page) -> ProcessedText {
        let guard = self.lock_page(&page.id).await;

        let cached = match self.cached_content(&page.id) {
            Some(cached) => cached,
            None => {
                drop(guard);
                let text = Some(page.original_text.clone()).filter(|t| !is_blank(t));
                return self
                    .process_locked(&page.id, &page.source_language, &page.target_language, text, None)
                    .await;
            }
        };

        let show_full_text = !self.prefers_segment_mode().await;
        let needs_mode_switch = cached.show_full_text != show_full_text;
        let needs_translation = cached.needs_translation_for_mode(show_full_text);

        if !needs_mode_switch && !needs_translation {
            debug!("⚡ 页面 {} 无需更新", page.id);
            return cached;
        }

        info!(
            "🔄 更新页面 {}: 切换模式={}, 补齐译文={}",
            page.id, needs_mode_switch, needs_translation
        );
        let updated = self
            .fill_translations(cached.with_show_full_text(show_full_text))
            .await;
        self.persist(&page.id, &updated);
        updated
    }

    async fn toggle_locked(&self, page_id: &str) -> Option<ProcessedText> {
        let _guard = self.lock_page(page_id).await;

        let cached = self.cache.get(page_id)?;
        let show_full_text = !cached.show_full_text;
        let updated = self
            .fill_translations(cached.with_show_full_text(show_full_text))
            .await;

        self.persist(page_id, &updated);
        info!(
            "🔀 页面 {} 切换为{}模式",
            page_id,
            if updated.show_full_text { "全文" } else { "分段" }
        );
        Some(updated)
    }

    async fn delete_segment_locked(&self, page_id: &str, segment_index: usize) -> Option<ProcessedText> {
        let _guard = self.lock_page(page_id).await;

        let cached = self.cache.get(page_id)?;
        if cached.show_full_text {
            info!(
                "🚫 页面 {}: {}",
                page_id,
                pipeline_error!(invalid_op, "delete_segment", "全文模式下不能删除分段")
            );
            return None;
        }

        let processor = LanguageProcessor::for_language(&cached.source_language);
        let Some(updated) = cached.without_segment(segment_index, processor.joiner()) else {
            warn!(
                "⚠️  页面 {} 分段索引越界: {} >= {}",
                page_id,
                segment_index,
                cached.segments.len()
            );
            return None;
        };

        self.persist(page_id, &updated);
        if let Err(e) = self
            .pages
            .update_page_content(page_id, &updated.full_original_text, &updated.full_translated_text)
            .await
        {
            warn!("❌ 页面 {} 内容回写失败: {}", page_id, e);
        }

        info!("🗑️  页面 {} 删除分段 {}，剩余 {} 段", page_id, segment_index, updated.segments.len());
        Some(updated)
    }

    /// 分段、并发生成拼音和翻译，组装后写入缓存
    async fn assemble(
        &self,
        page_id: &str,
        raw_text: &str,
        source_lang: &str,
        target_lang: &str,
        segment_mode: bool,
    ) -> ProcessedText {
        let start = Instant::now();
        let full_text = raw_text.trim().to_string();
        let processor = LanguageProcessor::for_language(source_lang);
        let spans = processor.segment_text(&full_text);

        info!(
            "📝 处理页面 {} [{} -> {}]: {} 段 ({}), {}模式",
            page_id,
            source_lang,
            target_lang,
            spans.len(),
            processor.name(),
            if segment_mode { "分段" } else { "全文" }
        );

        let pronunciation = self.generate_pronunciation(processor, &full_text);
        let translation = self.translate_content(&spans, &full_text, source_lang, target_lang, segment_mode);
        let (table, outcome) = join(pronunciation, translation).await;

        let mut segments: Vec<TextSegment> = spans
            .iter()
            .map(|span| {
                TextSegment::new(&span.text, source_lang, target_lang, span.segment_type)
                    .with_pinyin(processor.resolve_pronunciation(&table, &span.text))
            })
            .collect();

        let full_translated = match outcome {
            TranslationOutcome::Segments(translations) => {
                segments = segments
                    .into_iter()
                    .zip(translations.iter())
                    .map(|(segment, translated)| segment.with_translation(translated))
                    .collect();
                join_translations(translations.iter().map(String::as_str))
            }
            TranslationOutcome::Full(translated) => translated,
        };

        let processed = ProcessedText::new(source_lang, target_lang, &full_text, segments)
            .with_full_translated_text(&full_translated)
            .with_show_full_text(!segment_mode)
            .with_pronunciations(table);

        self.persist(page_id, &processed);
        self.stats.record_page_processed();
        info!(
            "✅ 页面 {} 处理完成，耗时 {}: {}",
            page_id,
            format_duration(start.elapsed()),
            preview(&processed.full_translated_text, 40)
        );
        debug!("{}", self.stats.snapshot().summary(start.elapsed()));

        processed
    }

    async fn generate_pronunciation(&self, processor: LanguageProcessor, text: &str) -> PronunciationTable {
        if !processor.supports_pronunciation() {
            return PronunciationTable::new();
        }

        let (min_len, max_len) = self.config.candidate_len_range();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || processor.generate_pronunciation(&text, min_len, max_len))
            .await
            .unwrap_or_else(|e| {
                warn!("❌ 拼音生成失败: {}", e);
                PronunciationTable::new()
            })
    }

    async fn translate_content(
        &self,
        spans: &[TextSpan],
        full_text: &str,
        source_lang: &str,
        target_lang: &str,
        segment_mode: bool,
    ) -> TranslationOutcome {
        if !segment_mode {
            if is_blank(full_text) {
                return TranslationOutcome::Full(String::new());
            }
            let translated = self
                .translator
                .translate_text(full_text, source_lang, target_lang)
                .await;
            return TranslationOutcome::Full(translated);
        }

        let texts: Vec<String> = spans.iter().map(|span| span.text.clone()).collect();
        let translated = self
            .translator
            .translate_all(&texts, source_lang, target_lang, self.config.initial_batch_size())
            .await;
        TranslationOutcome::Segments(translated)
    }

    /// 按当前显示模式补齐缺失的译文
    ///
    /// 全文模式优先复用已翻译分段的拼接结果，没有任何分段译文时才请求整体翻译。
    async fn fill_translations(&self, processed: ProcessedText) -> ProcessedText {
        if processed.show_full_text {
            if !processed.needs_full_translation() {
                return processed;
            }
            if processed.has_any_segment_translation() {
                debug!("♻️  复用分段译文拼接全文译文");
                let joined = processed.joined_segment_translation();
                return processed.with_full_translated_text(&joined);
            }
            let translated = self
                .translator
                .translate_text(
                    &processed.full_original_text,
                    &processed.source_language,
                    &processed.target_language,
                )
                .await;
            return processed.with_full_translated_text(&translated);
        }

        let mut processed = processed;
        let missing: Vec<usize> = processed
            .segments
            .iter()
            .enumerate()
            .filter(|(_, segment)| segment.needs_translation())
            .map(|(index, _)| index)
            .collect();

        if !missing.is_empty() {
            let texts: Vec<String> = missing
                .iter()
                .map(|&index| processed.segments[index].original_text.clone())
                .collect();
            let translated = self
                .translator
                .translate_all(
                    &texts,
                    &processed.source_language,
                    &processed.target_language,
                    self.config.backfill_batch_size(),
                )
                .await;

            let mut segments = processed.segments.clone();
            for (&index, text) in missing.iter().zip(translated.iter()) {
                segments[index] = segments[index].clone().with_translation(text);
            }
            processed = processed.with_segments(segments);
        }

        // 分段齐全后整体译文总是分段译文的拼接
        if !processed.needs_segment_translation()
            || (processed.needs_full_translation() && processed.has_any_segment_translation())
        {
            let joined = processed.joined_segment_translation();
            processed = processed.with_full_translated_text(&joined);
        }
        processed
    }

    async fn recognize(&self, page_id: &str, image: Option<Vec<u8>>) -> Option<String> {
        let Some(image) = image else {
            warn!("⚠️  页面 {} 既没有原文也没有图片", page_id);
            return None;
        };

        self.stats.record_ocr_call();
        match self.ocr.extract_text(&image).await {
            Ok(text) if !is_blank(&text) => Some(text),
            Ok(_) => {
                warn!("⚠️  页面 {}: {}", page_id, pipeline_error!(ocr, "未识别到文字"));
                None
            }
            Err(e) => {
                warn!("❌ 页面 {}: {}", page_id, pipeline_error!(ocr, e));
                None
            }
        }
    }

    /// 读取用户偏好的处理模式，引导完成前默认使用分段模式
    async fn prefers_segment_mode(&self) -> bool {
        if !self.preferences.onboarding_completed().await {
            return true;
        }
        self.preferences.use_segment_mode().await
    }

    fn cached_content(&self, page_id: &str) -> Option<ProcessedText> {
        let cached = self.cache.get(page_id).filter(ProcessedText::has_content)?;
        self.stats.record_cache_hit();
        Some(cached)
    }

    fn persist(&self, page_id: &str, processed: &ProcessedText) {
        if let Err(e) = self.cache.set(page_id, processed) {
            error!("❌ 页面 {} 写入缓存失败: {}", page_id, e);
        }
    }

    fn placeholder(&self, source_lang: &str, target_lang: &str) -> ProcessedText {
        ProcessedText::placeholder(source_lang, target_lang, self.config.ocr_placeholder())
    }

    /// 获取页面级互斥锁，同一页面的操作依次执行
    async fn lock_page(&self, page_id: &str) -> PageLockGuard {
        let lock = self
            .page_locks
            .entry(page_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        PageLockGuard {
            locks: self.page_locks.clone(),
            page_id: page_id.to_string(),
            guard: Some(guard),
        }
    }

    /// 在独立任务中运行，调用方放弃等待时任务继续执行
    async fn run_detached<F, T>(&self, task: F, fallback: T) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::spawn(task).await {
            Ok(result) => result,
            Err(e) => {
                error!("❌ 页面处理任务异常结束: {}", e);
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{InMemoryPageStore, StaticPreferences};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEcho {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationService for CountingEcho {
        async fn translate_text(&self, text: &str, _: &str, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_uppercase())
        }
    }

    struct NoOcr;

    #[async_trait]
    impl OcrService for NoOcr {
        async fn extract_text(&self, _: &[u8]) -> Result<String> {
            anyhow::bail!("no text available")
        }
    }

    fn workflow(service: Arc<CountingEcho>) -> PageWorkflow {
        PageWorkflow::new(
            PipelineConfig::default(),
            service,
            Arc::new(NoOcr),
            Arc::new(InMemoryPageStore::new()),
            Arc::new(StaticPreferences::default()),
        )
    }

    #[tokio::test]
    async fn test_generic_language_segments_by_whitespace() {
        let service = Arc::new(CountingEcho { calls: AtomicUsize::new(0) });
        let flow = workflow(service.clone());
        let page = Page::new("p1", "n1", "hello brave world", "en", "ko");

        let result = flow.process_page_text(&page, None).await;

        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.full_translated_text, "HELLO BRAVE WORLD");
        assert!(result.segments.iter().all(|s| s.pinyin.is_none()));
        assert!(result.pronunciations.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ocr_failure_returns_placeholder() {
        let service = Arc::new(CountingEcho { calls: AtomicUsize::new(0) });
        let flow = workflow(service.clone());
        let page = Page::new("p1", "n1", "", "zh-CN", "ko");

        let result = flow
            .process_page_text(&page, Some(PageSource::Image(vec![0, 1, 2])))
            .await;

        assert!(result.segments.is_empty());
        assert_eq!(result.full_original_text, flow.config().ocr_placeholder());
        assert!(flow.cache().get("p1").is_none());
        assert_eq!(flow.stats().ocr_calls, 1);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_toggle_uncached_page_is_none() {
        let flow = workflow(Arc::new(CountingEcho { calls: AtomicUsize::new(0) }));
        assert!(flow.toggle_display_mode_for_page("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_fill_translations_reuses_segments_for_full_text() {
        let service = Arc::new(CountingEcho { calls: AtomicUsize::new(0) });
        let flow = workflow(service.clone());
        let processed = ProcessedText::new(
            "en",
            "ko",
            "a b",
            vec![
                TextSegment::new("a", "en", "ko", crate::model::SegmentType::Word).with_translation("A"),
                TextSegment::new("b", "en", "ko", crate::model::SegmentType::Word),
            ],
        )
        .with_show_full_text(true);

        let filled = flow.fill_translations(processed).await;

        assert_eq!(filled.full_translated_text, "A");
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_page_locks_released_after_operations() {
        let flow = workflow(Arc::new(CountingEcho { calls: AtomicUsize::new(0) }));
        let page = Page::new("p1", "n1", "hello world", "en", "ko");

        flow.process_page_text(&page, None).await;
        flow.toggle_display_mode_for_page("p1").await.unwrap();
        flow.fragment_pronunciation("p1", "hello").await;
        flow.invalidate_page("p1").await;

        assert_eq!(flow.active_page_locks(), 0);
    }

    #[tokio::test]
    async fn test_waiting_lock_is_not_pruned() {
        let flow = workflow(Arc::new(CountingEcho { calls: AtomicUsize::new(0) }));

        let first = flow.lock_page("p1").await;
        let other = flow.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.lock_page("p1").await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        drop(first);
        assert_eq!(flow.active_page_locks(), 1);
        waiter.await.unwrap();
        assert_eq!(flow.active_page_locks(), 0);
    }
}
