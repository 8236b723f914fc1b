//! 统一错误处理模块
//!
//! 提供翻译流水线的统一错误类型定义和处理机制。
//! 外部协作者（OCR、翻译、页面存储）的错误在编排层被捕获并降级，
//! 不会以错误形式传播给调用方。

// 标准库导入
use std::fmt;

// 第三方crate导入
use anyhow::Error as AnyhowError;

/// 流水线统一错误类型
#[derive(Debug)]
pub enum PipelineError {
    /// 文字识别失败，没有可用文本
    Ocr {
        /// 具体错误信息
        details: String,
    },

    /// 翻译服务调用失败
    Translation {
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 缓存条目无法反序列化
    CacheCorruption {
        /// 页面ID
        page_id: String,
        /// 底层错误信息
        details: String,
    },

    /// 当前状态下不允许的操作（例如全文模式下删除分段）
    InvalidOperation {
        /// 操作名称
        operation: String,
        /// 拒绝原因
        reason: String,
    },

    /// 页面不存在
    PageNotFound {
        /// 页面ID
        page_id: String,
    },

    /// 配置相关错误
    Configuration {
        /// 配置项名称
        field: String,
        /// 错误原因
        reason: String,
    },

    /// 内部处理错误（包装anyhow::Error）
    Internal {
        /// 包装的错误
        source: AnyhowError,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Ocr { details } => {
                write!(f, "文字识别失败: {}", details)
            }
            PipelineError::Translation { message, status_code } => {
                if let Some(code) = status_code {
                    write!(f, "翻译请求失败 [{}]: {}", code, message)
                } else {
                    write!(f, "翻译请求失败: {}", message)
                }
            }
            PipelineError::CacheCorruption { page_id, details } => {
                write!(f, "缓存条目损坏 [{}]: {}", page_id, details)
            }
            PipelineError::InvalidOperation { operation, reason } => {
                write!(f, "操作{}不允许: {}", operation, reason)
            }
            PipelineError::PageNotFound { page_id } => {
                write!(f, "页面不存在: {}", page_id)
            }
            PipelineError::Configuration { field, reason } => {
                write!(f, "配置错误 [{}]: {}", field, reason)
            }
            PipelineError::Internal { source } => {
                write!(f, "内部处理错误: {}", source)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Internal { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// 流水线结果类型别名
pub type Result<T> = std::result::Result<T, PipelineError>;

/// 便捷的错误创建宏
#[macro_export]
macro_rules! pipeline_error {
    (ocr, $details:expr) => {
        $crate::error::PipelineError::Ocr {
            details: $details.to_string(),
        }
    };
    (translation, $msg:expr) => {
        $crate::error::PipelineError::Translation {
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (translation, $msg:expr, $code:expr) => {
        $crate::error::PipelineError::Translation {
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (cache_corruption, $page_id:expr, $details:expr) => {
        $crate::error::PipelineError::CacheCorruption {
            page_id: $page_id.to_string(),
            details: $details.to_string(),
        }
    };
    (invalid_op, $op:expr, $reason:expr) => {
        $crate::error::PipelineError::InvalidOperation {
            operation: $op.to_string(),
            reason: $reason.to_string(),
        }
    };
    (page_not_found, $page_id:expr) => {
        $crate::error::PipelineError::PageNotFound {
            page_id: $page_id.to_string(),
        }
    };
    (config, $field:expr, $reason:expr) => {
        $crate::error::PipelineError::Configuration {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}

/// 从anyhow::Error转换为PipelineError
impl From<AnyhowError> for PipelineError {
    fn from(error: AnyhowError) -> Self {
        PipelineError::Internal { source: error }
    }
}

/// 从reqwest::Error转换为PipelineError
impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        PipelineError::Translation {
            message: error.to_string(),
            status_code,
        }
    }
}

/// 从serde_json::Error转换为PipelineError
impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Internal {
            source: AnyhowError::new(error),
        }
    }
}
