//! 模板处理、渲染与配置的错误类型

use crate::i18n::Bundle;
use thiserror::Error;

/// 输入格式错误：在边界处拒绝，不提交任何状态
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to parse template: {source}{}", hint_suffix(.hint))]
    Parse {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    #[error("template name is required")]
    MissingName,

    #[error("a template must keep at least one page")]
    LastPage,

    #[error("unknown page: {0}")]
    UnknownPage(String),

    #[error("unknown element: {0}")]
    UnknownElement(String),

    #[error("flow templates have no pages to edit")]
    NotPageBased,

    #[error("custom-html elements require template author privileges")]
    CustomHtmlForbidden,
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for TemplateError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the template schema. Check field names and types."
                    .to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input, is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        TemplateError::Parse { source: e, hint }
    }
}

/// 布局 / 绘制管线的失败；数据缺失不算失败
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot allocate a {width}x{height} raster surface")]
    Surface { width: i32, height: i32 },

    #[error("raster snapshot failed: {0}")]
    Snapshot(String),

    #[error("PDF assembly failed: {0}")]
    Assembly(String),

    #[error("template has no pages")]
    NoPages,

    #[error("render cancelled")]
    Cancelled,

    #[error("render timed out after {0} s")]
    TimedOut(u64),

    #[error("a render for template {template} / property {property} is already running")]
    AlreadyInFlight { template: String, property: String },

    #[error("render worker failed: {0}")]
    Worker(String),

    #[error("cannot write PDF: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// 用户提示对应的语言包 key
    pub fn notice_key(&self) -> &'static str {
        match self {
            RenderError::AlreadyInFlight { .. } => "render.busy",
            RenderError::TimedOut(_) => "render.timeout",
            _ => "render.failed",
        }
    }

    /// 给用户的通用提示，细节只写日志
    pub fn user_message(&self, strings: &Bundle) -> String {
        strings.get(self.notice_key()).to_string()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("invalid locale bundle {locale}: {source}")]
    Locale {
        locale: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_carry_a_hint() {
        let err: TemplateError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("failed to parse template"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn notice_keys_are_generic() {
        assert_eq!(RenderError::NoPages.notice_key(), "render.failed");
        assert_eq!(RenderError::TimedOut(3).notice_key(), "render.timeout");
    }
}
