//! 緩衝區單行模組
//!
//! 一行文字加上逐格的顯示樣式。格的單位是 grapheme cluster 而不是
//! `char`，中文字、emoji 與組合字元各占一格；`styles` 的長度恆等於
//! `text` 的 grapheme 數，所有編輯操作都必須維持這個對應。

use unicode_segmentation::{GraphemeCursor, UnicodeSegmentation};

use crate::style::CharStyle;

/// 計算文字的 grapheme 數（即顯示欄位數）
pub fn length_in_graphemes(text: &str) -> usize {
    text.graphemes(true).count()
}

fn is_boundary_at(text: &str, offset: usize) -> bool {
    GraphemeCursor::new(offset, text.len(), true)
        .is_boundary(text, 0)
        .unwrap_or(true)
}

/// 緩衝區中的一行
#[derive(Debug, Clone, Default)]
pub struct BufferLine {
    text: String,
    styles: Vec<CharStyle>,
    time: String,
    prompt: bool,
    wrapped: bool,
}

impl BufferLine {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn styles(&self) -> &[CharStyle] {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut [CharStyle] {
        &mut self.styles
    }

    /// 到達此行的時間戳
    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn set_time(&mut self, time: impl Into<String>) {
        self.time = time.into();
    }

    /// 是否為提示列（未以換行結尾而被強制送出的行）
    pub fn is_prompt(&self) -> bool {
        self.prompt
    }

    pub fn set_prompt(&mut self, prompt: bool) {
        self.prompt = prompt;
    }

    /// 是否為自動換行產生的續行
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    pub fn set_wrapped(&mut self, wrapped: bool) {
        self.wrapped = wrapped;
    }

    /// 行的格數
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// 附加一個字元
    ///
    /// 若字元與行尾合併為同一個 grapheme cluster（如組合用讀音符號），
    /// 不會新增格位，沿用前一格的樣式。
    ///
    /// # Example
    /// ```
    /// use mudbuffer::{BufferLine, CharStyle};
    ///
    /// let mut line = BufferLine::default();
    /// line.push('天', CharStyle::default());
    /// line.push('e', CharStyle::default());
    /// line.push('\u{301}', CharStyle::default()); // 與 e 合併為 é
    /// assert_eq!(line.len(), 2);
    /// ```
    pub fn push(&mut self, ch: char, style: CharStyle) {
        let seam = self.text.len();
        self.text.push(ch);
        if seam == 0 || is_boundary_at(&self.text, seam) {
            self.styles.push(style);
        }
    }

    /// 附加一個 grapheme cluster
    pub fn push_grapheme(&mut self, grapheme: &str, style: CharStyle) {
        if grapheme.is_empty() {
            return;
        }
        let seam = self.text.len();
        self.text.push_str(grapheme);
        let mut added = grapheme.graphemes(true).count();
        if seam > 0 && !is_boundary_at(&self.text, seam) {
            // 第一個 cluster 併入前一格
            added -= 1;
        }
        for _ in 0..added {
            self.styles.push(style);
        }
    }

    /// 取得第 `col` 格的 grapheme
    pub fn grapheme(&self, col: usize) -> Option<&str> {
        self.text.graphemes(true).nth(col)
    }

    pub fn style(&self, col: usize) -> Option<&CharStyle> {
        self.styles.get(col)
    }

    pub fn style_mut(&mut self, col: usize) -> Option<&mut CharStyle> {
        self.styles.get_mut(col)
    }

    /// 格位轉位元組偏移；`col == len()` 對應行尾，超過則回傳 `None`
    pub fn byte_offset(&self, col: usize) -> Option<usize> {
        if col > self.len() {
            return None;
        }
        if col == self.len() {
            return Some(self.text.len());
        }
        self.text.grapheme_indices(true).nth(col).map(|(i, _)| i)
    }

    /// 自第 `col` 格切下行尾，回傳切下的部分
    ///
    /// 超出行尾的 `col` 視同行尾（回傳空行）。切下的行沿用時間戳，
    /// 不帶 prompt 與 wrapped 標記。
    pub fn split_off(&mut self, col: usize) -> BufferLine {
        let col = col.min(self.len());
        let offset = self.byte_offset(col).unwrap_or_else(|| self.text.len());
        BufferLine {
            text: self.text.split_off(offset),
            styles: self.styles.split_off(col),
            time: self.time.clone(),
            prompt: false,
            wrapped: false,
        }
    }

    /// 將另一行的內容逐格接到行尾
    pub fn extend_from(&mut self, other: &BufferLine) {
        for (grapheme, style) in other.text.graphemes(true).zip(other.styles.iter()) {
            self.push_grapheme(grapheme, *style);
        }
    }

    /// 截斷到 `col` 格
    pub fn truncate(&mut self, col: usize) {
        if col >= self.len() {
            return;
        }
        if let Some(offset) = self.byte_offset(col) {
            self.text.truncate(offset);
            self.styles.truncate(col);
        }
    }

    /// 在第 `col` 格插入文字
    ///
    /// # Returns
    /// `col` 超出行尾或文字含換行時回傳 `false`，不做任何修改
    pub fn insert_text(&mut self, col: usize, text: &str, style: CharStyle) -> bool {
        if col > self.len() || text.contains('\n') {
            return false;
        }
        let tail = self.split_off(col);
        for grapheme in text.graphemes(true) {
            self.push_grapheme(grapheme, style);
        }
        self.extend_from(&tail);
        true
    }

    /// 移除 [from, to) 的格位
    pub fn remove_range(&mut self, from: usize, to: usize) {
        let to = to.min(self.len());
        if from >= to {
            return;
        }
        let tail = self.split_off(to);
        self.truncate(from);
        self.extend_from(&tail);
    }

    /// 以空白補到指定格數
    pub fn pad(&mut self, count: usize, style: CharStyle) {
        for _ in 0..count {
            self.push(' ', style);
        }
    }

    /// 複製 [from, to) 的格位為新行
    pub fn sub_line(&self, from: usize, to: usize) -> BufferLine {
        let to = to.min(self.len());
        let mut line = BufferLine {
            time: self.time.clone(),
            ..Default::default()
        };
        if from >= to {
            return line;
        }
        let start = match self.byte_offset(from) {
            Some(start) => start,
            None => return line,
        };
        let end = self.byte_offset(to).unwrap_or_else(|| self.text.len());
        line.text.push_str(&self.text[start..end]);
        line.styles.extend_from_slice(&self.styles[from..to]);
        line
    }

    /// 逐格走訪 grapheme
    pub fn graphemes(&self) -> impl Iterator<Item = &str> {
        self.text.graphemes(true)
    }
}
