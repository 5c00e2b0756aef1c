//! HTML 匯出模組
//!
//! 把帶樣式的緩衝區內容轉為行內 CSS 的 HTML 片段，供日誌檔與
//! 剪貼簿使用。相鄰且樣式相同的格合併為同一個 `<span>`，連結
//! 標記輸出為 `<a>`；內部跳脫用的隱藏碼位不會出現在結果中。

use crate::encoding::is_hidden_nibble;
use crate::style::{CharStyle, NO_LINK};

use super::Buffer;

impl Buffer {
    /// 將第 `y` 行的 [from, to) 轉為 HTML
    ///
    /// # Arguments
    /// * `to` - `None` 表示到行尾
    /// * `show_timestamp` - 是否在行首加上時間戳
    /// * `space_padding` - 以空白把內容補到這個欄數，0 表示不補
    pub fn line_to_html(
        &self,
        y: usize,
        from: usize,
        to: Option<usize>,
        show_timestamp: bool,
        space_padding: usize,
    ) -> String {
        let line = match self.lines.get(y) {
            Some(line) => line,
            None => return String::new(),
        };
        let to = to.unwrap_or_else(|| line.len()).min(line.len());
        let from = from.min(to);
        let mut out = String::new();
        if show_timestamp {
            escape_into(&mut out, line.time());
        }
        let mut run_text = String::new();
        let mut run_style: Option<CharStyle> = None;
        for (grapheme, style) in line
            .graphemes()
            .zip(line.styles().iter())
            .skip(from)
            .take(to - from)
        {
            let same = match &run_style {
                Some(current) => current == style && current.link() == style.link(),
                None => false,
            };
            if !same {
                if let Some(style) = run_style.take() {
                    self.write_html_run(&mut out, &style, &run_text);
                    run_text.clear();
                }
                run_style = Some(*style);
            }
            run_text.push_str(grapheme);
        }
        if let Some(style) = run_style {
            self.write_html_run(&mut out, &style, &run_text);
        }
        for _ in (to - from)..space_padding {
            out.push(' ');
        }
        out
    }

    /// 將 [from, to]（含尾）的行轉為 HTML，行與行以 `<br>` 接合
    pub fn buffer_to_html(&self, from: usize, to: usize, show_timestamps: bool) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let to = to.min(self.lines.len() - 1);
        if from > to {
            return String::new();
        }
        let mut parts = Vec::new();
        for row in from..=to {
            parts.push(self.line_to_html(row, 0, None, show_timestamps, 0));
        }
        parts.join("<br>\n")
    }

    fn write_html_run(&self, out: &mut String, style: &CharStyle, text: &str) {
        if text.is_empty() {
            return;
        }
        out.push_str(&format!("<span style=\"{}\">", style_css(style)));
        let entry = match style.link() {
            NO_LINK => None,
            id => self.links.get(id),
        };
        if let Some(entry) = entry {
            let href = entry.commands.first().map(String::as_str).unwrap_or("");
            let title = entry.hints.join(" ");
            out.push_str(&format!(
                "<a style=\"color: inherit;\" href=\"{}\" title=\"{}\">",
                escape(href),
                escape(&title)
            ));
            escape_into(out, text);
            out.push_str("</a>");
        } else {
            escape_into(out, text);
        }
        out.push_str("</span>");
    }
}

fn style_css(style: &CharStyle) -> String {
    // 反白以對調前景背景呈現
    let (fg, bg) = if style.is_reverse() {
        (style.bg(), style.fg())
    } else {
        (style.fg(), style.bg())
    };
    let mut css = format!("color: {}; background-color: {};", fg.to_css(), bg.to_css());
    if style.is_bold() {
        css.push_str(" font-weight: bold;");
    }
    if style.is_italic() {
        css.push_str(" font-style: italic;");
    }
    let mut decorations = Vec::new();
    if style.is_underline() {
        decorations.push("underline");
    }
    if style.is_overline() {
        decorations.push("overline");
    }
    if style.is_strikeout() {
        decorations.push("line-through");
    }
    if !decorations.is_empty() {
        css.push_str(" text-decoration: ");
        css.push_str(&decorations.join(" "));
        css.push(';');
    }
    css
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        if is_hidden_nibble(ch) {
            continue;
        }
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            ch => out.push(ch),
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}
