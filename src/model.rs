//! 数据模型模块
//!
//! 定义页面处理结果 [`ProcessedText`]、分段 [`TextSegment`] 以及页面、笔记和
//! 预处理阶段传入的 [`PageProcessingData`]。
//!
//! 所有模型都是不可变值：每次修改都通过 `with_*` 方法产生新的值。

// 标准库导入
use std::collections::BTreeMap;

// 第三方crate导入
use serde::{Deserialize, Serialize};

// 本地模块导入
use crate::utils::{is_blank, join_translations};

/// 分段类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// 按句子边界切分的分段
    Sentence,
    /// 无句子边界时按单字切分
    Character,
    /// 按空白切分的词
    Word,
}

/// 单个文本分段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub original_text: String,
    pub pinyin: Option<String>,
    pub translated_text: Option<String>,
    pub source_language: String,
    pub target_language: String,
    pub segment_type: SegmentType,
}

impl TextSegment {
    /// 创建尚未翻译的分段
    pub fn new(
        original_text: &str,
        source_language: &str,
        target_language: &str,
        segment_type: SegmentType,
    ) -> Self {
        Self {
            original_text: original_text.to_string(),
            pinyin: None,
            translated_text: None,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            segment_type,
        }
    }

    pub fn with_pinyin(mut self, pinyin: Option<String>) -> Self {
        self.pinyin = pinyin;
        self
    }

    pub fn with_translation(mut self, translated: &str) -> Self {
        self.translated_text = Some(translated.to_string());
        self
    }

    /// 是否已有非空译文
    pub fn has_translation(&self) -> bool {
        self.translated_text
            .as_deref()
            .map(|t| !is_blank(t))
            .unwrap_or(false)
    }

    /// 原文非空但缺少译文
    pub fn needs_translation(&self) -> bool {
        !is_blank(&self.original_text) && !self.has_translation()
    }
}

/// 一个页面经过分段、拼音生成和翻译后组装出的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedText {
    pub source_language: String,
    pub target_language: String,
    pub full_original_text: String,
    pub full_translated_text: String,
    pub segments: Vec<TextSegment>,
    pub show_full_text: bool,
    pub show_pinyin: bool,
    pub show_translation: bool,
    /// 片段 -> 拼音 查找表，覆盖全文、句子、候选词和单字
    #[serde(default)]
    pub pronunciations: BTreeMap<String, String>,
}

impl ProcessedText {
    /// 创建分段模式下尚未翻译的结果
    pub fn new(
        source_language: &str,
        target_language: &str,
        full_original_text: &str,
        segments: Vec<TextSegment>,
    ) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            full_original_text: full_original_text.to_string(),
            full_translated_text: String::new(),
            segments,
            show_full_text: false,
            show_pinyin: true,
            show_translation: true,
            pronunciations: BTreeMap::new(),
        }
    }

    /// 文字识别失败时返回的占位结果：带说明原文，没有分段
    pub fn placeholder(source_language: &str, target_language: &str, message: &str) -> Self {
        Self::new(source_language, target_language, message, Vec::new())
    }

    pub fn with_segments(mut self, segments: Vec<TextSegment>) -> Self {
        self.segments = segments;
        self
    }

    pub fn with_full_translated_text(mut self, translated: &str) -> Self {
        self.full_translated_text = translated.to_string();
        self
    }

    pub fn with_show_full_text(mut self, show: bool) -> Self {
        self.show_full_text = show;
        self
    }

    pub fn with_show_pinyin(mut self, show: bool) -> Self {
        self.show_pinyin = show;
        self
    }

    pub fn with_show_translation(mut self, show: bool) -> Self {
        self.show_translation = show;
        self
    }

    pub fn with_pronunciations(mut self, pronunciations: BTreeMap<String, String>) -> Self {
        self.pronunciations = pronunciations;
        self
    }

    /// 是否处于分段模式
    pub fn is_segment_mode(&self) -> bool {
        !self.show_full_text
    }

    /// 是否有可直接展示的内容（缓存命中判断依据）
    pub fn has_content(&self) -> bool {
        !is_blank(&self.full_original_text) && !self.segments.is_empty()
    }

    /// 是否有分段缺少译文
    pub fn needs_segment_translation(&self) -> bool {
        self.segments.iter().any(TextSegment::needs_translation)
    }

    /// 是否缺少整体译文
    pub fn needs_full_translation(&self) -> bool {
        !is_blank(&self.full_original_text) && is_blank(&self.full_translated_text)
    }

    /// 指定显示模式下是否还需要翻译
    pub fn needs_translation_for_mode(&self, show_full_text: bool) -> bool {
        if show_full_text {
            self.needs_full_translation()
        } else {
            self.needs_segment_translation()
        }
    }

    /// 是否至少有一个分段已翻译
    pub fn has_any_segment_translation(&self) -> bool {
        self.segments.iter().any(TextSegment::has_translation)
    }

    /// 将已翻译分段按顺序以单个空格拼接
    pub fn joined_segment_translation(&self) -> String {
        join_translations(
            self.segments
                .iter()
                .filter_map(|s| s.translated_text.as_deref()),
        )
    }

    /// 查找片段的拼音
    pub fn pronunciation_for(&self, fragment: &str) -> Option<&str> {
        self.pronunciations.get(fragment).map(String::as_str)
    }

    /// 删除指定分段并重建全文原文和译文
    ///
    /// 原文使用 `joiner` 拼接（中文为空串，其他语言为空格），译文始终以单个空格拼接。
    /// 索引越界时返回 `None`。
    pub fn without_segment(&self, index: usize, joiner: &str) -> Option<Self> {
        if index >= self.segments.len() {
            return None;
        }

        let mut segments = self.segments.clone();
        segments.remove(index);

        let full_original = segments
            .iter()
            .map(|s| s.original_text.as_str())
            .collect::<Vec<_>>()
            .join(joiner);

        let mut updated = self.clone().with_segments(segments);
        updated.full_original_text = full_original;
        updated.full_translated_text = updated.joined_segment_translation();
        Some(updated)
    }
}

/// 页面记录（由页面存储提供）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub note_id: String,
    pub original_text: String,
    pub translated_text: String,
    pub image_url: Option<String>,
    pub source_language: String,
    pub target_language: String,
}

impl Page {
    pub fn new(id: &str, note_id: &str, original_text: &str, source: &str, target: &str) -> Self {
        Self {
            id: id.to_string(),
            note_id: note_id.to_string(),
            original_text: original_text.to_string(),
            translated_text: String::new(),
            image_url: None,
            source_language: source.to_string(),
            target_language: target.to_string(),
        }
    }

    pub fn with_image_url(mut self, url: &str) -> Self {
        self.image_url = Some(url.to_string());
        self
    }

    /// 页面自身语言缺失时回退到所属笔记的语言
    pub fn language_pair<'a>(&'a self, note: Option<&'a Note>) -> (&'a str, &'a str) {
        let source = match note {
            Some(n) if is_blank(&self.source_language) => n.source_language.as_str(),
            _ => self.source_language.as_str(),
        };
        let target = match note {
            Some(n) if is_blank(&self.target_language) => n.target_language.as_str(),
            _ => self.target_language.as_str(),
        };
        (source, target)
    }
}

/// 笔记：包含多个页面
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub source_language: String,
    pub target_language: String,
    pub page_ids: Vec<String>,
}

/// 预处理阶段与流水线之间传递的临时数据，不做持久化
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageProcessingData {
    pub page_id: String,
    pub image_url: Option<String>,
    pub raw_text: String,
    pub cleaned_text: Option<String>,
    pub reordered_text: Option<String>,
    pub titles: Vec<String>,
    pub ocr_success: bool,
    pub source_language: String,
    pub target_language: String,
}

impl PageProcessingData {
    /// 选择最佳可用文本：重排 > 清洗 > 原始
    pub fn best_text(&self) -> &str {
        [self.reordered_text.as_deref(), self.cleaned_text.as_deref()]
            .into_iter()
            .flatten()
            .find(|t| !is_blank(t))
            .unwrap_or(self.raw_text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(original: &str, translated: Option<&str>) -> TextSegment {
        let seg = TextSegment::new(original, "zh-CN", "ko", SegmentType::Sentence);
        match translated {
            Some(t) => seg.with_translation(t),
            None => seg,
        }
    }

    fn sample() -> ProcessedText {
        ProcessedText::new(
            "zh-CN",
            "ko",
            "甲乙丙",
            vec![
                segment("甲", Some("A")),
                segment("乙", Some("B")),
                segment("丙", Some("C")),
            ],
        )
        .with_full_translated_text("A B C")
    }

    #[test]
    fn test_without_segment_rebuilds_full_texts() {
        let updated = sample().without_segment(1, "").unwrap();
        assert_eq!(updated.segments.len(), 2);
        assert_eq!(updated.full_original_text, "甲丙");
        assert_eq!(updated.full_translated_text, "A C");
    }

    #[test]
    fn test_without_segment_out_of_range() {
        assert!(sample().without_segment(3, "").is_none());
    }

    #[test]
    fn test_translation_needs() {
        let partial = ProcessedText::new(
            "zh-CN",
            "ko",
            "甲乙",
            vec![segment("甲", Some("A")), segment("乙", None)],
        );
        assert!(partial.needs_segment_translation());
        assert!(partial.needs_full_translation());
        assert!(partial.has_any_segment_translation());
        assert_eq!(partial.joined_segment_translation(), "A");
        assert!(!sample().needs_translation_for_mode(false));
        assert!(!sample().needs_translation_for_mode(true));
    }

    #[test]
    fn test_blank_translation_counts_as_missing() {
        let seg = segment("甲", Some("  "));
        assert!(seg.needs_translation());
        assert!(!segment("", None).needs_translation());
    }

    #[test]
    fn test_placeholder_has_no_content() {
        let placeholder = ProcessedText::placeholder("zh-CN", "ko", "no text");
        assert!(placeholder.segments.is_empty());
        assert!(!placeholder.has_content());
        assert!(sample().has_content());
    }

    #[test]
    fn test_copy_on_write_leaves_original() {
        let original = sample();
        let toggled = original.clone().with_show_full_text(true);
        assert!(!original.show_full_text);
        assert!(toggled.show_full_text);
    }

    #[test]
    fn test_best_text_preference() {
        let mut data = PageProcessingData {
            raw_text: "raw".to_string(),
            ..Default::default()
        };
        assert_eq!(data.best_text(), "raw");
        data.cleaned_text = Some("cleaned".to_string());
        assert_eq!(data.best_text(), "cleaned");
        data.reordered_text = Some(" ".to_string());
        assert_eq!(data.best_text(), "cleaned");
        data.reordered_text = Some("reordered".to_string());
        assert_eq!(data.best_text(), "reordered");
    }

    #[test]
    fn test_language_pair_falls_back_to_note() {
        let page = Page::new("p1", "n1", "你好", "", "ko");
        let note = Note {
            id: "n1".to_string(),
            title: "t".to_string(),
            source_language: "zh-CN".to_string(),
            target_language: "en".to_string(),
            page_ids: vec!["p1".to_string()],
        };
        assert_eq!(page.language_pair(Some(&note)), ("zh-CN", "ko"));
        assert_eq!(page.language_pair(None), ("", "ko"));
    }

    #[test]
    fn test_deserialize_without_pronunciations() {
        let json = r#"{"source_language":"ko","target_language":"zh","full_original_text":"a","full_translated_text":"","segments":[],"show_full_text":true,"show_pinyin":false,"show_translation":true}"#;
        let parsed: ProcessedText = serde_json::from_str(json).unwrap();
        assert!(parsed.pronunciations.is_empty());
        assert!(parsed.show_full_text);
    }
}
