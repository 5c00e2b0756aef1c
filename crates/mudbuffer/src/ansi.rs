//! ANSI 跳脫序列狀態機模組
//!
//! 逐字元剖析 ANSI escape sequence，維護目前的 SGR 顯示狀態
//! （前景色、背景色、粗體、底線等），並處理 OSC 8 超連結與
//! OSC P / OSC R 調色盤指令。序列可能跨封包被切斷，狀態機會
//! 停在中間狀態等待後續字元。

use tracing::debug;

use crate::color::{xterm_color, Rgb};
use crate::config::Profile;
use crate::link::{LinkEntry, LinkStore};
use crate::style::{CharStyle, DisplayAttrs, LinkId, NO_LINK};

/// CSI 參數段長度上限，超過即視為惡意或損毀的序列
const CSI_MAX_LEN: usize = 256;
/// OSC 內容長度上限
const OSC_MAX_LEN: usize = 2048;

/// 剖析器所在的狀態
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum SeqState {
    /// 一般文字
    #[default]
    Plain,
    /// 已讀到 ESC
    Escape,
    /// ESC ( 或 ESC )，等待一個字集代號
    Charset,
    /// CSI 序列，累積參數位元組
    Csi(String),
    /// OSC 序列，累積內容
    Osc(String),
    /// OSC 內容後讀到 ESC，等待 ST 的反斜線
    OscEsc(String),
}

/// ANSI 狀態機
///
/// 吃進解碼後的字元流，吐出應顯示的字元；跳脫序列被吃掉並轉為
/// 內部顯示狀態的變化。`current_style` 回傳此刻套用於新字元的樣式。
#[derive(Debug)]
pub struct AnsiMachine {
    state: SeqState,
    fg: Rgb,
    /// fg 的亮色版本，粗體提亮時使用
    fg_light: Rgb,
    bg: Rgb,
    /// fg 是否仍為預設色（預設色不受粗體提亮影響）
    is_default_color: bool,
    attrs: DisplayAttrs,
    link: LinkId,
    palette: [Rgb; 16],
    /// 設定檔的原始調色盤，OSC R 重設時還原用
    profile_palette: [Rgb; 16],
    default_fg: Rgb,
    default_bg: Rgb,
    bold_is_bright: bool,
}

impl AnsiMachine {
    pub fn new(profile: &Profile) -> Self {
        Self {
            state: SeqState::Plain,
            fg: profile.default_fg,
            fg_light: profile.default_fg,
            bg: profile.default_bg,
            is_default_color: true,
            attrs: DisplayAttrs::empty(),
            link: NO_LINK,
            palette: profile.ansi_colors,
            profile_palette: profile.ansi_colors,
            default_fg: profile.default_fg,
            default_bg: profile.default_bg,
            bold_is_bright: profile.bold_is_bright,
        }
    }

    /// 餵入一個字元
    ///
    /// # Returns
    /// `Some(ch)` 表示該字元應該顯示；`None` 表示字元被跳脫序列吃掉
    pub fn advance(&mut self, ch: char, links: &mut LinkStore) -> Option<char> {
        loop {
            let state = std::mem::take(&mut self.state);
            match state {
                SeqState::Plain => {
                    if ch == '\x1b' {
                        self.state = SeqState::Escape;
                        return None;
                    }
                    return Some(ch);
                }
                SeqState::Escape => {
                    match ch {
                        '[' => self.state = SeqState::Csi(String::new()),
                        ']' => self.state = SeqState::Osc(String::new()),
                        '(' | ')' => self.state = SeqState::Charset,
                        // ESC ESC：重新開始一個序列
                        '\x1b' => self.state = SeqState::Escape,
                        // 其他 introducer 不支援，吃掉一個字元
                        _ => {}
                    }
                    return None;
                }
                SeqState::Charset => {
                    // 字集代號本身被吃掉，不影響顯示狀態
                    return None;
                }
                SeqState::Csi(mut params) => {
                    match ch {
                        '\x20'..='\x3f' => {
                            if params.len() >= CSI_MAX_LEN {
                                debug!("CSI 序列過長，放棄剖析");
                                continue;
                            }
                            params.push(ch);
                            self.state = SeqState::Csi(params);
                            return None;
                        }
                        '\x40'..='\x7e' => {
                            if ch == 'm' {
                                self.apply_sgr(&params);
                            }
                            return None;
                        }
                        // 非法字元中止序列，該字元以一般流程重新處理
                        _ => continue,
                    }
                }
                SeqState::Osc(mut payload) => {
                    match ch {
                        '\x07' => {
                            self.apply_osc(&payload, links);
                            return None;
                        }
                        '\x1b' => {
                            self.state = SeqState::OscEsc(payload);
                            return None;
                        }
                        c if (c as u32) < 0x20 => {
                            // 其他控制字元中止 OSC，字元重新處理
                            continue;
                        }
                        _ => {
                            if payload.len() >= OSC_MAX_LEN {
                                debug!("OSC 序列過長，放棄剖析");
                                continue;
                            }
                            payload.push(ch);
                            self.state = SeqState::Osc(payload);
                            return None;
                        }
                    }
                }
                SeqState::OscEsc(payload) => {
                    if ch == '\\' {
                        self.apply_osc(&payload, links);
                        return None;
                    }
                    // ESC 後面不是反斜線：OSC 被中止，ESC 已出現，
                    // 目前字元以 Escape 狀態重新處理
                    self.state = SeqState::Escape;
                    continue;
                }
            }
        }
    }

    /// 是否正停在序列中間等待後續輸入
    pub fn in_sequence(&self) -> bool {
        self.state != SeqState::Plain
    }

    /// 此刻套用於新字元的樣式
    pub fn current_style(&self) -> CharStyle {
        let fg = if self.bold_is_bright
            && !self.is_default_color
            && self.attrs.contains(DisplayAttrs::BOLD)
        {
            self.fg_light
        } else {
            self.fg
        };
        CharStyle::new(fg, self.bg)
            .with_attrs(self.attrs)
            .with_link(self.link)
    }

    /// 目前展開中的超連結 id
    pub fn current_link(&self) -> LinkId {
        self.link
    }

    /// 重新載入色彩設定
    ///
    /// 調色盤與預設色換新，進行中的顏色回到預設；顯示屬性、連結
    /// 與剖析狀態不受影響。
    pub fn update_colors(&mut self, profile: &Profile) {
        self.palette = profile.ansi_colors;
        self.profile_palette = profile.ansi_colors;
        self.default_fg = profile.default_fg;
        self.default_bg = profile.default_bg;
        self.bold_is_bright = profile.bold_is_bright;
        self.fg = profile.default_fg;
        self.fg_light = profile.default_fg;
        self.bg = profile.default_bg;
        self.is_default_color = true;
    }

    fn reset_format(&mut self) {
        self.fg = self.default_fg;
        self.fg_light = self.default_fg;
        self.bg = self.default_bg;
        self.is_default_color = true;
        self.attrs = DisplayAttrs::empty();
    }

    fn apply_sgr(&mut self, params: &str) {
        if params.is_empty() {
            self.reset_format();
            return;
        }
        let items: Vec<&str> = params.split(';').collect();
        let mut i = 0;
        while i < items.len() {
            let item = items[i];
            if item.contains(':') {
                self.apply_colon_item(item);
                i += 1;
                continue;
            }
            let code = match parse_code(item) {
                Some(code) => code,
                None => {
                    i += 1;
                    continue;
                }
            };
            if code == 38 || code == 48 {
                let rest = &items[i + 1..];
                let consumed = self.apply_extended_color(code == 38, rest);
                i += 1 + consumed;
                continue;
            }
            self.apply_simple_code(code);
            i += 1;
        }
    }

    /// 處理冒號分隔的單一參數項，如 `38:5:196` 或 `38:2::10:20:30`
    fn apply_colon_item(&mut self, item: &str) {
        let subs: Vec<&str> = item.split(':').collect();
        let code = match parse_code(subs[0]) {
            Some(code) => code,
            None => return,
        };
        if code != 38 && code != 48 {
            self.apply_simple_code(code);
            return;
        }
        let is_fg = code == 38;
        match subs.get(1).copied() {
            Some("5") if subs.len() >= 3 => {
                if let Some(index) = parse_code(subs[2]) {
                    self.set_extended_palette(is_fg, index);
                }
            }
            Some("2") if subs.len() == 5 => {
                self.set_extended_rgb(is_fg, &subs[2..5]);
            }
            Some("2") if subs.len() >= 6 => {
                // 第三欄為 colorspace id，略過
                self.set_extended_rgb(is_fg, &subs[3..6]);
            }
            _ => {}
        }
    }

    /// 處理分號形式的 38/48 延伸色，回傳額外吃掉的參數個數
    fn apply_extended_color(&mut self, is_fg: bool, rest: &[&str]) -> usize {
        match rest.first().and_then(|s| parse_code(s)) {
            Some(5) if rest.len() >= 2 => {
                if let Some(index) = parse_code(rest[1]) {
                    self.set_extended_palette(is_fg, index);
                }
                2
            }
            Some(2) if rest.len() >= 4 => {
                self.set_extended_rgb(is_fg, &rest[1..4]);
                4
            }
            // 參數不足或形式不明，吃掉 38/48 本身就好
            _ => 0,
        }
    }

    fn set_extended_palette(&mut self, is_fg: bool, index: u16) {
        if index > 255 {
            return;
        }
        let color = xterm_color(index as u8, &self.palette);
        if is_fg {
            self.fg = color;
            // 256 色不做粗體提亮
            self.fg_light = color;
            self.is_default_color = false;
        } else {
            self.bg = color;
        }
    }

    fn set_extended_rgb(&mut self, is_fg: bool, parts: &[&str]) {
        let mut rgb = [0u8; 3];
        for (slot, part) in rgb.iter_mut().zip(parts) {
            match parse_code(part) {
                Some(v) if v <= 255 => *slot = v as u8,
                // 任一分量非法就放棄整個指令
                _ => return,
            }
        }
        let color = Rgb::new(rgb[0], rgb[1], rgb[2]);
        if is_fg {
            self.fg = color;
            self.fg_light = color;
            self.is_default_color = false;
        } else {
            self.bg = color;
        }
    }

    fn apply_simple_code(&mut self, code: u16) {
        match code {
            0 => self.reset_format(),
            1 => self.attrs.insert(DisplayAttrs::BOLD),
            3 => self.attrs.insert(DisplayAttrs::ITALIC),
            4 => self.attrs.insert(DisplayAttrs::UNDERLINE),
            7 => self.attrs.insert(DisplayAttrs::REVERSE),
            9 => self.attrs.insert(DisplayAttrs::STRIKEOUT),
            21 | 22 => self.attrs.remove(DisplayAttrs::BOLD),
            23 => self.attrs.remove(DisplayAttrs::ITALIC),
            24 => self.attrs.remove(DisplayAttrs::UNDERLINE),
            27 => self.attrs.remove(DisplayAttrs::REVERSE),
            29 => self.attrs.remove(DisplayAttrs::STRIKEOUT),
            30..=37 => {
                let i = (code - 30) as usize;
                self.fg = self.palette[i];
                self.fg_light = self.palette[i + 8];
                self.is_default_color = false;
            }
            39 => {
                self.fg = self.default_fg;
                self.fg_light = self.default_fg;
                self.is_default_color = true;
            }
            40..=47 => self.bg = self.palette[(code - 40) as usize],
            49 => self.bg = self.default_bg,
            53 => self.attrs.insert(DisplayAttrs::OVERLINE),
            55 => self.attrs.remove(DisplayAttrs::OVERLINE),
            90..=97 => {
                let i = (code - 90) as usize + 8;
                self.fg = self.palette[i];
                self.fg_light = self.palette[i];
                self.is_default_color = false;
            }
            100..=107 => self.bg = self.palette[(code - 100) as usize + 8],
            // 不認識的代碼安靜略過
            _ => {}
        }
    }

    fn apply_osc(&mut self, payload: &str, links: &mut LinkStore) {
        if let Some(rest) = payload.strip_prefix("8;") {
            let uri = match rest.split_once(';') {
                Some((_params, uri)) => uri,
                None => rest,
            };
            if uri.is_empty() {
                self.link = NO_LINK;
            } else {
                self.link = links.add(LinkEntry {
                    permanent: false,
                    commands: vec![uri.to_string()],
                    hints: vec![uri.to_string()],
                    script_refs: Vec::new(),
                });
                debug!("開啟超連結 {}: {}", self.link, uri);
            }
            return;
        }
        if let Some(rest) = payload.strip_prefix('P') {
            self.apply_palette_set(rest);
            return;
        }
        if payload == "R" {
            // 調色盤還原為設定檔的值，進行中的顏色不動
            self.palette = self.profile_palette;
        }
    }

    /// OSC P 的內容為一個十六進位索引 nibble 加 RRGGBB 六碼
    fn apply_palette_set(&mut self, spec: &str) {
        if spec.len() != 7 || !spec.is_ascii() {
            return;
        }
        let index = match u8::from_str_radix(&spec[..1], 16) {
            Ok(index) => index as usize,
            Err(_) => return,
        };
        let parse = |range: &str| u8::from_str_radix(range, 16).ok();
        if let (Some(r), Some(g), Some(b)) =
            (parse(&spec[1..3]), parse(&spec[3..5]), parse(&spec[5..7]))
        {
            self.palette[index] = Rgb::new(r, g, b);
        }
    }
}

fn parse_code(item: &str) -> Option<u16> {
    if item.is_empty() {
        return Some(0);
    }
    item.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::default_palette;

    fn feed(machine: &mut AnsiMachine, links: &mut LinkStore, input: &str) -> String {
        input
            .chars()
            .filter_map(|ch| machine.advance(ch, links))
            .collect()
    }

    fn machine() -> (AnsiMachine, LinkStore) {
        (AnsiMachine::new(&Profile::default()), LinkStore::default())
    }

    #[test]
    fn test_plain_text_passes_through() {
        let (mut m, mut links) = machine();
        assert_eq!(feed(&mut m, &mut links, "hello"), "hello");
        assert!(!m.in_sequence());
    }

    #[test]
    fn test_red_bold_is_bright() {
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b[1;31mA");
        assert_eq!(visible, "A");
        // 預設開啟粗體提亮，紅色取亮色版
        assert_eq!(m.current_style().fg(), Rgb::new(255, 85, 85));
        assert!(m.current_style().is_bold());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[1;31;44m");
        feed(&mut m, &mut links, "\x1b[0m");
        let style = m.current_style();
        assert_eq!(style, CharStyle::default());
        assert!(!style.is_bold());
    }

    #[test]
    fn test_bare_sgr_is_reset() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[31m");
        feed(&mut m, &mut links, "\x1b[m");
        assert_eq!(m.current_style().fg(), Rgb::new(200, 200, 200));
    }

    #[test]
    fn test_256_color_semicolon_and_colon_agree() {
        let (mut a, mut links_a) = machine();
        let (mut b, mut links_b) = machine();
        feed(&mut a, &mut links_a, "\x1b[38;5;196m");
        feed(&mut b, &mut links_b, "\x1b[38:5:196m");
        assert_eq!(a.current_style().fg(), b.current_style().fg());
        assert_eq!(a.current_style().fg(), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_truecolor_colon_form() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[38:2:10:20:30m");
        assert_eq!(m.current_style().fg(), Rgb::new(10, 20, 30));
    }

    #[test]
    fn test_truecolor_with_colorspace_id() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[38:2::10:20:30m");
        assert_eq!(m.current_style().fg(), Rgb::new(10, 20, 30));
    }

    #[test]
    fn test_truecolor_semicolon_background() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[48;2;1;2;3m");
        assert_eq!(m.current_style().bg(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_csi_aborted_by_invalid_char_reprocesses() {
        // ESC 中止前一個 CSI，其後的 [31m 必須照常生效
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b[3\x1b[31mA");
        assert_eq!(visible, "A");
        assert_eq!(m.current_style().fg(), Rgb::new(187, 0, 0));
    }

    #[test]
    fn test_unknown_escape_swallows_one_char() {
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b=Hello");
        assert_eq!(visible, "Hello");
    }

    #[test]
    fn test_charset_designator_consumed() {
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b(BHello");
        assert_eq!(visible, "Hello");
    }

    #[test]
    fn test_sequence_parked_across_calls() {
        let (mut m, mut links) = machine();
        assert_eq!(feed(&mut m, &mut links, "\x1b[3"), "");
        assert!(m.in_sequence());
        assert_eq!(feed(&mut m, &mut links, "1mX"), "X");
        assert_eq!(m.current_style().fg(), Rgb::new(187, 0, 0));
    }

    #[test]
    fn test_osc8_hyperlink_bel() {
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b]8;;https://example.com\x07link\x1b]8;;\x07after");
        assert_eq!(visible, "linkafter");
        assert_eq!(m.current_link(), NO_LINK);
        let entry = links.get(1).unwrap();
        assert_eq!(entry.commands, vec!["https://example.com".to_string()]);
    }

    #[test]
    fn test_osc8_hyperlink_st_terminator() {
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b]8;;https://mud.tw\x1b\\X");
        assert_eq!(visible, "X");
        assert_eq!(m.current_link(), 1);
        assert_eq!(m.current_style().link(), 1);
    }

    #[test]
    fn test_osc_palette_redefine_and_reset() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b]P1FF0000\x07");
        feed(&mut m, &mut links, "\x1b[31m");
        assert_eq!(m.current_style().fg(), Rgb::new(255, 0, 0));
        feed(&mut m, &mut links, "\x1b]R\x07");
        feed(&mut m, &mut links, "\x1b[31m");
        assert_eq!(m.current_style().fg(), default_palette()[1]);
    }

    #[test]
    fn test_attribute_toggles() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[3;4;9;53m");
        let style = m.current_style();
        assert!(style.is_italic());
        assert!(style.is_underline());
        assert!(style.is_strikeout());
        assert!(style.is_overline());
        feed(&mut m, &mut links, "\x1b[23;24;29;55m");
        let style = m.current_style();
        assert!(!style.is_italic());
        assert!(!style.is_underline());
        assert!(!style.is_strikeout());
        assert!(!style.is_overline());
    }

    #[test]
    fn test_bold_off_both_codes() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[1m");
        assert!(m.current_style().is_bold());
        feed(&mut m, &mut links, "\x1b[22m");
        assert!(!m.current_style().is_bold());
        feed(&mut m, &mut links, "\x1b[1m\x1b[21m");
        assert!(!m.current_style().is_bold());
    }

    #[test]
    fn test_bright_foreground_codes() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[91m");
        assert_eq!(m.current_style().fg(), Rgb::new(255, 85, 85));
    }

    #[test]
    fn test_unknown_codes_skipped() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[31;999;44m");
        let style = m.current_style();
        assert_eq!(style.fg(), Rgb::new(187, 0, 0));
        assert_eq!(style.bg(), Rgb::new(0, 0, 187));
    }

    #[test]
    fn test_non_sgr_final_terminates_csi() {
        // x 落在 CSI 終止位元組範圍，序列到此結束且不影響樣式，
        // 其後的 ;31m 是一般文字
        let (mut m, mut links) = machine();
        let visible = feed(&mut m, &mut links, "\x1b[x;31mA");
        assert_eq!(visible, ";31mA");
        assert_eq!(m.current_style().fg(), Rgb::new(200, 200, 200));
    }

    #[test]
    fn test_empty_param_acts_as_reset() {
        // 空參數段視同 0；\x1b[;31m 先重設再設紅色
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[1m\x1b[;31m");
        assert!(!m.current_style().is_bold());
        assert_eq!(m.current_style().fg(), Rgb::new(187, 0, 0));
    }

    #[test]
    fn test_update_colors_keeps_attrs() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[1;31m");
        let mut profile = Profile::default();
        profile.default_fg = Rgb::new(1, 2, 3);
        m.update_colors(&profile);
        let style = m.current_style();
        assert!(style.is_bold());
        assert_eq!(style.fg(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn test_reverse_video_codes() {
        let (mut m, mut links) = machine();
        feed(&mut m, &mut links, "\x1b[7m");
        assert!(m.current_style().is_reverse());
        feed(&mut m, &mut links, "\x1b[27m");
        assert!(!m.current_style().is_reverse());
    }
}
