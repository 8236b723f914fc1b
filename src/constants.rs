//! 流水线常量配置
//!
//! 该文件定义了翻译服务、批量翻译、缓存和分段相关的常量，方便统一管理和维护

/// 翻译API配置
pub mod api_config {
    /// 本地开发API地址
    pub const LOCAL_API_URL: &str = "http://localhost:1188/translate";

    /// 请求超时时间（秒）
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// 响应中可能携带译文的字段，按顺序尝试
    pub const RESPONSE_TEXT_FIELDS: &[&str] = &["data", "text", "result"];
}

/// 批量翻译配置
pub mod batch_config {
    /// 首次处理页面时的批次大小
    pub const INITIAL_BATCH_SIZE: usize = 10;

    /// 补齐缺失译文时的批次大小
    pub const BACKFILL_BATCH_SIZE: usize = 15;

    /// 分隔符前缀，后接毫秒时间戳和序号
    pub const DELIMITER_PREFIX: &str = "⟦SEGMENT_BREAK";

    /// 分隔符后缀
    pub const DELIMITER_SUFFIX: &str = "⟧";
}

/// 发音（拼音）生成配置
pub mod pronunciation_config {
    /// 候选子串最短长度（字符）
    pub const MIN_CANDIDATE_LEN: usize = 2;

    /// 候选子串最长长度（字符）
    pub const MAX_CANDIDATE_LEN: usize = 4;
}

/// 文本与占位内容
pub mod text_config {
    /// OCR失败时的占位原文
    pub const OCR_PLACEHOLDER: &str = "无法识别此页面中的文字，请重新拍摄或手动输入内容。";

    /// 中文句子边界字符
    pub const CHINESE_SENTENCE_BOUNDARIES: &str = "。！？!?.,，;；、\n";
}

/// 语言代码
pub mod language_codes {
    /// 中文主标签
    pub const CHINESE: &str = "zh";

    /// 韩文主标签
    pub const KOREAN: &str = "ko";
}

/// 验证API URL是否有效
pub fn is_valid_api_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.scheme() == "http" || parsed.scheme() == "https",
        Err(_) => false,
    }
}
