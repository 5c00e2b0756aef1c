//! 顏色定義模組
//!
//! 提供 ANSI 16 色基本色盤與 xterm 256 色的 RGB 對應

use serde::{Deserialize, Serialize};

/// RGB 顏色值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// 創建新的 RGB 顏色
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 轉為 CSS 十六進位表示（如 `#bb0000`）
    pub fn to_css(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// 預設前景色
pub const DEFAULT_FG: Rgb = Rgb::new(200, 200, 200);

/// 預設背景色
pub const DEFAULT_BG: Rgb = Rgb::new(0, 0, 0);

/// xterm 6x6x6 色彩立方體的六個亮度層級
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// ANSI 基本 16 色（0-7 暗色、8-15 亮色）
pub fn default_palette() -> [Rgb; 16] {
    [
        Rgb::new(0, 0, 0),       // Black
        Rgb::new(187, 0, 0),     // Red
        Rgb::new(0, 187, 0),     // Green
        Rgb::new(187, 187, 0),   // Yellow
        Rgb::new(0, 0, 187),     // Blue
        Rgb::new(187, 0, 187),   // Magenta
        Rgb::new(0, 187, 187),   // Cyan
        Rgb::new(187, 187, 187), // White
        Rgb::new(128, 128, 128), // Bright Black (Gray)
        Rgb::new(255, 85, 85),   // Bright Red
        Rgb::new(85, 255, 85),   // Bright Green
        Rgb::new(255, 255, 85),  // Bright Yellow
        Rgb::new(85, 85, 255),   // Bright Blue
        Rgb::new(255, 85, 255),  // Bright Magenta
        Rgb::new(85, 255, 255),  // Bright Cyan
        Rgb::new(255, 255, 255), // Bright White
    ]
}

/// 解析 xterm 256 色索引
///
/// 0-15 取自傳入的色盤，16-231 為 6x6x6 色彩立方體，232-255 為灰階
pub fn xterm_color(index: u8, palette: &[Rgb; 16]) -> Rgb {
    match index {
        0..=15 => palette[index as usize],
        16..=231 => {
            let i = index - 16;
            let r = CUBE_LEVELS[(i / 36) as usize];
            let g = CUBE_LEVELS[((i / 6) % 6) as usize];
            let b = CUBE_LEVELS[(i % 6) as usize];
            Rgb::new(r, g, b)
        }
        _ => {
            let gray = (index - 232) * 10 + 8;
            Rgb::new(gray, gray, gray)
        }
    }
}
