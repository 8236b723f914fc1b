use tracing::Level;

/// 初始化日志系统
///
/// 库本身不会安装订阅者，由宿主程序按需调用。
pub fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose { Level::DEBUG } else { Level::INFO };

    // 宿主可能已经安装过订阅者，重复安装时忽略
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// 判断文本是否为空或只有空白
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// 判断字符是否为汉字（CJK统一表意文字及扩展A区、兼容区）
pub fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
    )
}

/// 文本是否包含汉字
pub fn contains_han(text: &str) -> bool {
    text.chars().any(is_han)
}

/// 将非空译文按顺序以单个空格拼接
pub fn join_translations<'a, I>(translations: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    translations
        .into_iter()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 截断过长文本用于日志输出
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \n\t"));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn test_han_detection() {
        assert!(is_han('你'));
        assert!(!is_han('a'));
        assert!(!is_han('안'));
        assert!(contains_han("hello 世界"));
        assert!(!contains_han("안녕하세요"));
    }

    #[test]
    fn test_join_translations_skips_blank() {
        let joined = join_translations(vec!["안녕", " ", "세계 "]);
        assert_eq!(joined, "안녕 세계");
    }

    #[test]
    fn test_init_logging_is_repeatable() {
        init_logging(false, true);
        init_logging(true, false);
        init_logging(false, false);
        tracing::debug!("logging initialized");
    }

    #[test]
    fn test_preview() {
        assert_eq!(preview("你好世界", 2), "你好…");
        assert_eq!(preview("abc", 5), "abc");
    }
}
