//! 外部协作者接口
//!
//! 流水线通过这些 trait 调用文字识别、页面存储和用户偏好，
//! 由宿主程序注入具体实现，测试中可替换为模拟实现。

// 标准库导入
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

// 第三方crate导入
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

// 本地模块导入
use crate::model::Page;
use crate::pipeline_error;

/// 文字识别服务
#[async_trait]
pub trait OcrService: Send + Sync {
    /// 从图片中提取文字，没有可用文字时返回错误
    async fn extract_text(&self, image: &[u8]) -> Result<String>;
}

/// 页面存储
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn read_page(&self, page_id: &str) -> Result<Option<Page>>;

    /// 更新页面的原文和译文字段
    async fn update_page_content(
        &self,
        page_id: &str,
        original_text: &str,
        translated_text: &str,
    ) -> Result<()>;
}

/// 用户偏好（只读）
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn use_segment_mode(&self) -> bool;
    async fn onboarding_completed(&self) -> bool;
}

/// 内存页面存储
#[derive(Debug, Default)]
pub struct InMemoryPageStore {
    pages: RwLock<HashMap<String, Page>>,
}

impl InMemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, page: Page) {
        self.pages.write().await.insert(page.id.clone(), page);
    }

    pub async fn remove(&self, page_id: &str) -> Option<Page> {
        self.pages.write().await.remove(page_id)
    }
}

#[async_trait]
impl PageStore for InMemoryPageStore {
    async fn read_page(&self, page_id: &str) -> Result<Option<Page>> {
        Ok(self.pages.read().await.get(page_id).cloned())
    }

    async fn update_page_content(
        &self,
        page_id: &str,
        original_text: &str,
        translated_text: &str,
    ) -> Result<()> {
        let mut pages = self.pages.write().await;
        let page = pages
            .get_mut(page_id)
            .ok_or_else(|| pipeline_error!(page_not_found, page_id))?;
        page.original_text = original_text.to_string();
        page.translated_text = translated_text.to_string();
        Ok(())
    }
}

/// 固定取值的用户偏好，可在运行时修改
#[derive(Debug)]
pub struct StaticPreferences {
    use_segment_mode: AtomicBool,
    onboarding_completed: AtomicBool,
}

impl StaticPreferences {
    pub fn new(use_segment_mode: bool, onboarding_completed: bool) -> Self {
        Self {
            use_segment_mode: AtomicBool::new(use_segment_mode),
            onboarding_completed: AtomicBool::new(onboarding_completed),
        }
    }

    pub fn set_use_segment_mode(&self, value: bool) {
        self.use_segment_mode.store(value, Ordering::SeqCst);
    }

    pub fn set_onboarding_completed(&self, value: bool) {
        self.onboarding_completed.store(value, Ordering::SeqCst);
    }
}

impl Default for StaticPreferences {
    /// 新用户：尚未完成引导，使用分段模式
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[async_trait]
impl PreferenceStore for StaticPreferences {
    async fn use_segment_mode(&self) -> bool {
        self.use_segment_mode.load(Ordering::SeqCst)
    }

    async fn onboarding_completed(&self) -> bool {
        self.onboarding_completed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_page_store() {
        let store = InMemoryPageStore::new();
        store.insert(Page::new("p1", "n1", "你好", "zh-CN", "ko")).await;

        store.update_page_content("p1", "你", "너").await.unwrap();
        let page = store.read_page("p1").await.unwrap().unwrap();
        assert_eq!(page.original_text, "你");
        assert_eq!(page.translated_text, "너");

        assert!(store.update_page_content("missing", "a", "b").await.is_err());
        assert!(store.read_page("missing").await.unwrap().is_none());
        assert!(store.remove("p1").await.is_some());
    }

    #[tokio::test]
    async fn test_static_preferences() {
        let prefs = StaticPreferences::default();
        assert!(prefs.use_segment_mode().await);
        assert!(!prefs.onboarding_completed().await);

        prefs.set_use_segment_mode(false);
        prefs.set_onboarding_completed(true);
        assert!(!prefs.use_segment_mode().await);
        assert!(prefs.onboarding_completed().await);
    }
}
