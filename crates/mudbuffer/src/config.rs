//! 緩衝區設定模組
//!
//! 定義文字緩衝區的行為設定與顯示色彩設定檔，皆可序列化存檔。

use serde::{Deserialize, Serialize};

use crate::color::{default_palette, Rgb, DEFAULT_BG, DEFAULT_FG};
use crate::encoding::TextEncoding;

/// 緩衝區行為設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// 自動換行的欄寬，0 表示不換行
    #[serde(default = "default_wrap_at")]
    pub wrap_at: usize,
    /// 換行後續行的縮排字元數
    #[serde(default)]
    pub wrap_indent: usize,
    /// 保留的行數上限
    #[serde(default = "default_lines_limit")]
    pub lines_limit: usize,
    /// 超過上限時一次刪除的行數
    #[serde(default = "default_batch_delete_size")]
    pub batch_delete_size: usize,
    /// 伺服器文字的編碼
    #[serde(default)]
    pub encoding: TextEncoding,
}

fn default_wrap_at() -> usize {
    100
}

fn default_lines_limit() -> usize {
    10_000
}

fn default_batch_delete_size() -> usize {
    1_000
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            wrap_at: default_wrap_at(),
            wrap_indent: 0,
            lines_limit: default_lines_limit(),
            batch_delete_size: default_batch_delete_size(),
            encoding: TextEncoding::default(),
        }
    }
}

/// 顯示色彩設定檔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// ANSI 16 色調色盤，前 8 個為暗色、後 8 個為亮色
    #[serde(default = "default_palette")]
    pub ansi_colors: [Rgb; 16],
    /// 預設前景色
    #[serde(default = "default_fg")]
    pub default_fg: Rgb,
    /// 預設背景色
    #[serde(default = "default_bg")]
    pub default_bg: Rgb,
    /// 粗體文字是否改用亮色系
    #[serde(default = "default_bold_is_bright")]
    pub bold_is_bright: bool,
}

fn default_fg() -> Rgb {
    DEFAULT_FG
}

fn default_bg() -> Rgb {
    DEFAULT_BG
}

fn default_bold_is_bright() -> bool {
    true
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            ansi_colors: default_palette(),
            default_fg: DEFAULT_FG,
            default_bg: DEFAULT_BG,
            bold_is_bright: true,
        }
    }
}
