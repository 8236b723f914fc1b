//! 语言处理模块
//!
//! 按源语言提供分段和发音生成能力：
//! - 中文：按句子边界切分，生成全文/句子/候选词/单字四种粒度的拼音查找表
//! - 韩文和其他语言：按空白切分，不生成发音
//!
//! 语言选择只看语言代码的主标签（`zh-CN` -> `zh`），未知语言回退到通用处理器。

// 标准库导入
use std::collections::BTreeMap;
use std::sync::OnceLock;

// 第三方crate导入
use pinyin::ToPinyin;
use regex::Regex;
use tracing::debug;

// 本地模块导入
use crate::constants::{language_codes, text_config};
use crate::model::SegmentType;
use crate::utils::{contains_han, is_han};

/// 拼音查找表：片段 -> 带声调拼音
pub type PronunciationTable = BTreeMap<String, String>;

/// 分段结果：文本及其在原文中的起始字符位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub text: String,
    pub start_index: usize,
    pub segment_type: SegmentType,
}

/// 按语言划分的处理器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageProcessor {
    Chinese,
    Korean,
    Generic,
}

fn sentence_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let boundaries = regex::escape(text_config::CHINESE_SENTENCE_BOUNDARIES);
        Regex::new(&format!("[^{}]+", boundaries)).expect("sentence boundary pattern is valid")
    })
}

fn word_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\S+").expect("whitespace pattern is valid"))
}

impl LanguageProcessor {
    /// 根据语言代码选择处理器
    pub fn for_language(code: &str) -> Self {
        let primary = code
            .split(|c: char| c == '-' || c == '_')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match primary.as_str() {
            language_codes::CHINESE => LanguageProcessor::Chinese,
            language_codes::KOREAN => LanguageProcessor::Korean,
            _ => LanguageProcessor::Generic,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LanguageProcessor::Chinese => "chinese",
            LanguageProcessor::Korean => "korean",
            LanguageProcessor::Generic => "generic",
        }
    }

    /// 重建全文时分段之间的连接符
    pub fn joiner(&self) -> &'static str {
        match self {
            LanguageProcessor::Chinese => "",
            LanguageProcessor::Korean | LanguageProcessor::Generic => " ",
        }
    }

    /// 是否生成发音
    pub fn supports_pronunciation(&self) -> bool {
        matches!(self, LanguageProcessor::Chinese)
    }

    /// 将文本切分为有序分段
    pub fn segment_text(&self, text: &str) -> Vec<TextSpan> {
        match self {
            LanguageProcessor::Chinese => {
                let sentences = collect_spans(sentence_regex(), text, SegmentType::Sentence);
                if sentences.is_empty() {
                    split_characters(text)
                } else {
                    sentences
                }
            }
            LanguageProcessor::Korean | LanguageProcessor::Generic => {
                collect_spans(word_regex(), text, SegmentType::Word)
            }
        }
    }

    /// 生成多粒度拼音查找表
    ///
    /// 覆盖全文、每个句子、长度在 `min_len..=max_len` 的纯汉字候选子串以及每个汉字。
    /// 非中文处理器返回空表。
    pub fn generate_pronunciation(
        &self,
        text: &str,
        min_len: usize,
        max_len: usize,
    ) -> PronunciationTable {
        let mut table = PronunciationTable::new();
        if !self.supports_pronunciation() || !contains_han(text) {
            return table;
        }

        let trimmed = text.trim();
        table.insert(trimmed.to_string(), pinyin_of(trimmed));

        for span in self.segment_text(trimmed) {
            if !contains_han(&span.text) {
                continue;
            }
            table
                .entry(span.text.clone())
                .or_insert_with(|| pinyin_of(&span.text));

            let chars: Vec<char> = span.text.chars().collect();
            for len in min_len.max(1)..=max_len {
                for window in chars.windows(len) {
                    if window.iter().all(|c| is_han(*c)) {
                        let candidate: String = window.iter().collect();
                        table
                            .entry(candidate)
                            .or_insert_with_key(|key| pinyin_of(key));
                    }
                }
            }
        }

        for c in trimmed.chars().filter(|c| is_han(*c)) {
            table
                .entry(c.to_string())
                .or_insert_with_key(|key| pinyin_of(key));
        }

        debug!("🔤 生成拼音查找表: {} 项", table.len());
        table
    }

    /// 查找片段拼音，表中缺失时只对该片段重新生成
    pub fn resolve_pronunciation(
        &self,
        table: &PronunciationTable,
        fragment: &str,
    ) -> Option<String> {
        if let Some(found) = table.get(fragment) {
            return Some(found.clone());
        }
        if !self.supports_pronunciation() || !contains_han(fragment) {
            return None;
        }
        Some(pinyin_of(fragment.trim()))
    }
}

/// 将文本转换为带声调拼音，音节之间以空格分隔，非汉字原样保留
pub fn pinyin_of(text: &str) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut pending = String::new();

    for c in text.chars() {
        match c.to_pinyin() {
            Some(p) => {
                if !pending.is_empty() {
                    tokens.push(std::mem::take(&mut pending));
                }
                tokens.push(p.with_tone().to_string());
            }
            None if c.is_whitespace() => {
                if !pending.is_empty() {
                    tokens.push(std::mem::take(&mut pending));
                }
            }
            None => pending.push(c),
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }

    tokens.join(" ")
}

fn collect_spans(pattern: &Regex, text: &str, segment_type: SegmentType) -> Vec<TextSpan> {
    pattern
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            let leading = raw.len() - raw.trim_start().len();
            Some(TextSpan {
                text: trimmed.to_string(),
                start_index: text[..m.start() + leading].chars().count(),
                segment_type,
            })
        })
        .collect()
}

fn split_characters(text: &str) -> Vec<TextSpan> {
    text.chars()
        .enumerate()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(index, c)| TextSpan {
            text: c.to_string(),
            start_index: index,
            segment_type: SegmentType::Character,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_primary_subtag() {
        assert_eq!(LanguageProcessor::for_language("zh-CN"), LanguageProcessor::Chinese);
        assert_eq!(LanguageProcessor::for_language("ZH_tw"), LanguageProcessor::Chinese);
        assert_eq!(LanguageProcessor::for_language("ko"), LanguageProcessor::Korean);
        assert_eq!(LanguageProcessor::for_language("ko-KR"), LanguageProcessor::Korean);
        assert_eq!(LanguageProcessor::for_language("fr"), LanguageProcessor::Generic);
        assert_eq!(LanguageProcessor::for_language(""), LanguageProcessor::Generic);
    }

    #[test]
    fn test_chinese_sentence_split() {
        let spans = LanguageProcessor::Chinese.segment_text("你好,世界");
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["你好", "世界"]);
        assert_eq!(spans[0].start_index, 0);
        assert_eq!(spans[1].start_index, 3);
        assert!(spans.iter().all(|s| s.segment_type == SegmentType::Sentence));
    }

    #[test]
    fn test_chinese_split_with_full_width_punctuation() {
        let spans = LanguageProcessor::Chinese.segment_text("今天天气很好。我们去公园吧！ 好的");
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["今天天气很好", "我们去公园吧", "好的"]);
        assert_eq!(spans[2].start_index, 15);
    }

    #[test]
    fn test_chinese_character_fallback() {
        let spans = LanguageProcessor::Chinese.segment_text("。！ ？");
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["。", "！", "？"]);
        assert!(spans.iter().all(|s| s.segment_type == SegmentType::Character));
        assert_eq!(spans[2].start_index, 3);
    }

    #[test]
    fn test_whitespace_split() {
        let spans = LanguageProcessor::Korean.segment_text("안녕하세요  세계\n반가워요");
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["안녕하세요", "세계", "반가워요"]);
        assert_eq!(spans[1].start_index, 7);
        assert!(LanguageProcessor::Generic.segment_text("   ").is_empty());
    }

    #[test]
    fn test_pinyin_of() {
        assert_eq!(pinyin_of("你好"), "nǐ hǎo");
        assert_eq!(pinyin_of("你好 ABC"), "nǐ hǎo ABC");
    }

    #[test]
    fn test_pronunciation_granularities() {
        let table = LanguageProcessor::Chinese.generate_pronunciation("你好,世界", 2, 4);
        assert_eq!(table.get("你好,世界").map(String::as_str), Some("nǐ hǎo , shì jiè"));
        assert_eq!(table.get("你好").map(String::as_str), Some("nǐ hǎo"));
        assert_eq!(table.get("世界").map(String::as_str), Some("shì jiè"));
        assert_eq!(table.get("界").map(String::as_str), Some("jiè"));
        assert!(!table.contains_key("好,世"));
    }

    #[test]
    fn test_candidate_substrings() {
        let table = LanguageProcessor::Chinese.generate_pronunciation("我爱北京天安门", 2, 4);
        assert!(table.contains_key("北京"));
        assert!(table.contains_key("天安门"));
        assert!(table.contains_key("北京天安"));
        assert!(!table.contains_key("爱北京天安"));
    }

    #[test]
    fn test_non_chinese_has_no_pronunciation() {
        assert!(LanguageProcessor::Korean
            .generate_pronunciation("안녕하세요", 2, 4)
            .is_empty());
        assert!(LanguageProcessor::Chinese
            .generate_pronunciation("hello", 2, 4)
            .is_empty());
    }

    #[test]
    fn test_resolve_pronunciation_backfills_missing_fragment() {
        let table = LanguageProcessor::Chinese.generate_pronunciation("你好", 2, 4);
        assert_eq!(
            LanguageProcessor::Chinese.resolve_pronunciation(&table, "你好"),
            Some("nǐ hǎo".to_string())
        );
        assert_eq!(
            LanguageProcessor::Chinese.resolve_pronunciation(&table, "中国"),
            Some("zhōng guó".to_string())
        );
        assert_eq!(LanguageProcessor::Korean.resolve_pronunciation(&table, "중국"), None);
    }

    #[test]
    fn test_joiner() {
        assert_eq!(LanguageProcessor::Chinese.joiner(), "");
        assert_eq!(LanguageProcessor::Korean.joiner(), " ");
    }
}
