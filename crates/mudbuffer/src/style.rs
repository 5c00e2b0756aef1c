//! 字元樣式模組
//!
//! 定義單一字元的顯示屬性、來源旗標與完整樣式值。
//! 顯示屬性（粗體、底線等）與內部紀錄用旗標（本地回顯）分為兩組，
//! 互不混用。

use bitflags::bitflags;

use crate::color::{self, Rgb};

bitflags! {
    /// 顯示屬性位元組
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DisplayAttrs: u8 {
        const BOLD = 0x01;
        const ITALIC = 0x02;
        const UNDERLINE = 0x04;
        const OVERLINE = 0x08;
        const STRIKEOUT = 0x10;
        const REVERSE = 0x20;
    }
}

bitflags! {
    /// 字元來源旗標（內部紀錄用，不影響顯示）
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SourceFlags: u8 {
        /// 來自本地回顯而非伺服器
        const ECHO = 0x01;
    }
}

/// 鏈結編號，指向 [`crate::link::LinkStore`] 中的條目
pub type LinkId = u32;

/// 無鏈結
pub const NO_LINK: LinkId = 0;

/// 單一字元的完整樣式
///
/// 相等比較只看前景色、背景色與顯示屬性；選取狀態、來源旗標
/// 與鏈結編號不參與比較。
#[derive(Debug, Clone, Copy)]
pub struct CharStyle {
    fg: Rgb,
    bg: Rgb,
    attrs: DisplayAttrs,
    source: SourceFlags,
    selected: bool,
    link: LinkId,
}

impl CharStyle {
    /// 以指定前景與背景色創建樣式
    pub fn new(fg: Rgb, bg: Rgb) -> Self {
        Self {
            fg,
            bg,
            attrs: DisplayAttrs::empty(),
            source: SourceFlags::empty(),
            selected: false,
            link: NO_LINK,
        }
    }

    /// 設置顯示屬性
    pub fn with_attrs(mut self, attrs: DisplayAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    /// 設置來源旗標
    pub fn with_source(mut self, source: SourceFlags) -> Self {
        self.source = source;
        self
    }

    /// 設置鏈結編號
    pub fn with_link(mut self, link: LinkId) -> Self {
        self.link = link;
        self
    }

    pub fn fg(&self) -> Rgb {
        self.fg
    }

    pub fn bg(&self) -> Rgb {
        self.bg
    }

    pub fn attrs(&self) -> DisplayAttrs {
        self.attrs
    }

    pub fn source(&self) -> SourceFlags {
        self.source
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn is_bold(&self) -> bool {
        self.attrs.contains(DisplayAttrs::BOLD)
    }

    pub fn is_italic(&self) -> bool {
        self.attrs.contains(DisplayAttrs::ITALIC)
    }

    pub fn is_underline(&self) -> bool {
        self.attrs.contains(DisplayAttrs::UNDERLINE)
    }

    pub fn is_overline(&self) -> bool {
        self.attrs.contains(DisplayAttrs::OVERLINE)
    }

    pub fn is_strikeout(&self) -> bool {
        self.attrs.contains(DisplayAttrs::STRIKEOUT)
    }

    pub fn is_reverse(&self) -> bool {
        self.attrs.contains(DisplayAttrs::REVERSE)
    }

    /// 同時設置前景與背景色
    pub fn set_colors(&mut self, fg: Rgb, bg: Rgb) {
        self.fg = fg;
        self.bg = bg;
    }

    pub fn set_foreground(&mut self, fg: Rgb) {
        self.fg = fg;
    }

    pub fn set_background(&mut self, bg: Rgb) {
        self.bg = bg;
    }

    /// 整組替換顯示屬性
    pub fn set_all_display_attributes(&mut self, attrs: DisplayAttrs) {
        self.attrs = attrs;
    }

    pub fn set_link(&mut self, link: LinkId) {
        self.link = link;
    }

    pub fn select(&mut self) {
        self.selected = true;
    }

    pub fn deselect(&mut self) {
        self.selected = false;
    }
}

impl Default for CharStyle {
    fn default() -> Self {
        Self::new(color::DEFAULT_FG, color::DEFAULT_BG)
    }
}

impl PartialEq for CharStyle {
    fn eq(&self, other: &Self) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.attrs == other.attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style() {
        let style = CharStyle::default();
        assert_eq!(style.fg(), color::DEFAULT_FG);
        assert_eq!(style.bg(), color::DEFAULT_BG);
        assert!(style.attrs().is_empty());
        assert_eq!(style.link(), NO_LINK);
        assert!(!style.is_selected());
    }

    #[test]
    fn test_equality_ignores_bookkeeping() {
        // 選取狀態、來源與鏈結不影響相等比較
        let base = CharStyle::new(Rgb::new(1, 2, 3), Rgb::new(4, 5, 6));
        let mut other = base.with_link(7).with_source(SourceFlags::ECHO);
        other.select();
        assert_eq!(base, other);

        let colored = base.with_attrs(DisplayAttrs::BOLD);
        assert_ne!(base, colored);
    }

    #[test]
    fn test_attr_queries() {
        let style =
            CharStyle::default().with_attrs(DisplayAttrs::BOLD | DisplayAttrs::UNDERLINE);
        assert!(style.is_bold());
        assert!(style.is_underline());
        assert!(!style.is_italic());
        assert!(!style.is_reverse());
    }

    #[test]
    fn test_setters() {
        let mut style = CharStyle::default();
        style.set_foreground(Rgb::new(255, 0, 0));
        style.set_background(Rgb::new(0, 0, 255));
        style.set_all_display_attributes(DisplayAttrs::ITALIC);
        style.set_link(3);
        style.select();

        assert_eq!(style.fg(), Rgb::new(255, 0, 0));
        assert_eq!(style.bg(), Rgb::new(0, 0, 255));
        assert!(style.is_italic());
        assert_eq!(style.link(), 3);
        assert!(style.is_selected());
    }
}
