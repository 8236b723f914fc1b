use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// 流水线运行统计，可在多个任务间共享
#[derive(Debug, Default)]
pub struct WorkflowStats {
    translation_calls: AtomicUsize,
    batches_created: AtomicUsize,
    fallbacks: AtomicUsize,
    ocr_calls: AtomicUsize,
    pages_processed: AtomicUsize,
    cache_hits: AtomicUsize,
}

/// 某一时刻的统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub translation_calls: usize,
    pub batches_created: usize,
    pub fallbacks: usize,
    pub ocr_calls: usize,
    pub pages_processed: usize,
    pub cache_hits: usize,
}

impl WorkflowStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_translation_call(&self) {
        self.translation_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch(&self) {
        self.batches_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ocr_call(&self) {
        self.ocr_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_processed(&self) {
        self.pages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            translation_calls: self.translation_calls.load(Ordering::Relaxed),
            batches_created: self.batches_created.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            ocr_calls: self.ocr_calls.load(Ordering::Relaxed),
            pages_processed: self.pages_processed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// 单行统计摘要，用于日志输出
    pub fn summary(&self, elapsed: Duration) -> String {
        format!(
            "📊 页面 {} 个 | 缓存命中 {} 次 | 翻译请求 {} 次 | 批次 {} 个 | 回退 {} 次 | OCR {} 次 | 耗时 {}",
            self.pages_processed,
            self.cache_hits,
            self.translation_calls,
            self.batches_created,
            self.fallbacks,
            self.ocr_calls,
            format_duration(elapsed)
        )
    }
}

/// 格式化持续时间
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.500s");
    }

    #[test]
    fn test_counters() {
        let stats = WorkflowStats::new();
        stats.record_translation_call();
        stats.record_translation_call();
        stats.record_fallback();
        stats.record_cache_hit();
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.translation_calls, 2);
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert!(snapshot.summary(Duration::from_millis(5)).contains("翻译请求 2 次"));
    }
}
