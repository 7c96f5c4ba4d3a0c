//! User-facing text and keyword lists, per display locale.
//!
//! The offline fallback resolver must be byte-for-byte deterministic, so
//! every string it can produce lives here as a fixed constant rather than
//! being assembled ad hoc at the call sites.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    /// BCP 47-ish tag passed to the remote intent service so it writes the
    /// reply in the right language.
    pub fn tag(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh-CN",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" => Locale::Zh,
            _ => Locale::En,
        }
    }

    /// Keywords that mean "show me everything you can do". Matched as
    /// case-insensitive substrings of the lowered input.
    pub fn catalog_keywords(&self) -> &'static [&'static str] {
        match self {
            Locale::En => &["list", "help", "show", "what", "commands"],
            Locale::Zh => &["列表", "列出", "帮助", "查看", "什么", "命令"],
        }
    }

    pub fn offline_catalog_reply(&self) -> &'static str {
        match self {
            Locale::En => {
                "Offline mode: the intent service is unavailable, so here is \
                 everything I can run. Pick an operation below."
            }
            Locale::Zh => "离线模式:意图服务不可用,以下是全部可执行操作,请从中选择。",
        }
    }

    pub fn offline_matched_reply(&self, action_name: &str) -> String {
        match self {
            Locale::En => format!(
                "Offline mode: matched \"{}\". Use the run button to execute it.",
                action_name
            ),
            Locale::Zh => format!("离线模式:已匹配“{}”,点击运行按钮执行。", action_name),
        }
    }

    pub fn offline_ambiguous_reply(&self) -> &'static str {
        match self {
            Locale::En => {
                "Offline mode: several operations match. Pick one below or be \
                 more specific."
            }
            Locale::Zh => "离线模式:匹配到多个操作,请从下方选择或进一步说明。",
        }
    }

    pub fn offline_no_match_reply(&self) -> &'static str {
        match self {
            Locale::En => {
                "Offline mode: I could not recognize that request. Try \"list\" \
                 to see every available operation."
            }
            Locale::Zh => "离线模式:无法识别该请求,输入“列表”查看全部可用操作。",
        }
    }

    pub fn executing_label(&self) -> &'static str {
        match self {
            Locale::En => "Executing",
            Locale::Zh => "正在执行",
        }
    }

    pub fn executed_label(&self) -> &'static str {
        match self {
            Locale::En => "Executed",
            Locale::Zh => "执行完成",
        }
    }

    pub fn cancelled_label(&self) -> &'static str {
        match self {
            Locale::En => "Cancelled",
            Locale::Zh => "已取消",
        }
    }

    pub fn send_failed_reply(&self) -> &'static str {
        match self {
            Locale::En => "Message could not be delivered to the console session. Try again.",
            Locale::Zh => "消息未能送达控制台会话,请重试。",
        }
    }
}
