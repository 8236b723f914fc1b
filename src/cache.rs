//! 处理结果缓存
//!
//! 按页面ID保存组装好的 [`ProcessedText`]，条目以JSON序列化形式存放在分片并发哈希表中，
//! 不同页面的读写互不阻塞。没有过期时间，只在显式删除或清空时失效。
//! 无法反序列化的条目视为未命中并被移除。

// 标准库导入
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

// 第三方crate导入
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

// 本地模块导入
use crate::error::Result;
use crate::model::ProcessedText;
use crate::pipeline_error;

/// 缓存条目
#[derive(Debug, Clone)]
struct CachedEntry {
    payload: String,
    stored_at: DateTime<Utc>,
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub writes: usize,
    pub entries: usize,
}

impl CacheStats {
    /// 命中率（0.0 ~ 1.0）
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 页面处理结果缓存
#[derive(Debug, Default)]
pub struct ProcessedTextCache {
    entries: DashMap<String, CachedEntry>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    evictions: AtomicUsize,
    writes: AtomicUsize,
}

impl ProcessedTextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取页面结果；损坏条目会被移除并按未命中处理
    pub fn get(&self, page_id: &str) -> Option<ProcessedText> {
        let payload = match self.entries.get(page_id) {
            Some(entry) => entry.payload.clone(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match serde_json::from_str::<ProcessedText>(&payload) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!("🗑️  {}", pipeline_error!(cache_corruption, page_id, e));
                // 只移除读到的那一份，避免误删并发写入的新值
                if self
                    .entries
                    .remove_if(page_id, |_, entry| entry.payload == payload)
                    .is_some()
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 写入页面结果
    pub fn set(&self, page_id: &str, value: &ProcessedText) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        self.set_raw(page_id, payload);
        debug!("💾 缓存已写入: {}", page_id);
        Ok(())
    }

    /// 写入已序列化的条目（用于导入外部持久化的数据），读取时才校验
    pub fn set_raw(&self, page_id: &str, payload: String) {
        self.entries.insert(
            page_id.to_string(),
            CachedEntry {
                payload,
                stored_at: Utc::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// 删除页面条目，返回是否存在
    pub fn remove(&self, page_id: &str) -> bool {
        self.entries.remove(page_id).is_some()
    }

    /// 批量删除，返回实际删除的数量
    pub fn remove_many<'a, I>(&self, page_ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        page_ids.into_iter().filter(|id| self.remove(id)).count()
    }

    /// 清空全部条目
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn contains(&self, page_id: &str) -> bool {
        self.entries.contains_key(page_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 条目写入时间
    pub fn stored_at(&self, page_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(page_id).map(|entry| entry.stored_at)
    }

    /// 导出全部条目为JSON（页面ID -> 序列化结果）
    pub fn export_snapshot(&self) -> Result<String> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().payload.clone()))
            .collect();
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// 从JSON快照导入条目，返回导入数量
    pub fn import_snapshot(&self, snapshot: &str) -> Result<usize> {
        let entries: BTreeMap<String, String> = serde_json::from_str(snapshot)?;
        let count = entries.len();
        for (page_id, payload) in entries {
            self.set_raw(&page_id, payload);
        }
        Ok(count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
