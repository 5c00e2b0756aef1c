//! 文字緩衝區模組
//!
//! MUD 客戶端的核心資料結構：伺服器位元組流經解碼與 ANSI 剖析後，
//! 逐行累積在一個有上限的捲動緩衝區裡。提供自動換行、樣式與超連結
//! 標記、複製剪下貼上、搜尋、HTML 匯出與工作階段日誌等操作。
//!
//! 行與行內格位都從 0 起算；格位以 grapheme cluster 為單位。範圍
//! 形式的操作（apply、copy、text_range）採半開區間 [begin, end)，
//! 行刪除（delete_lines）則為含尾的閉區間。

mod html;
mod line;

pub use line::{length_in_graphemes, BufferLine};

use std::collections::VecDeque;

use regex::Regex;
use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::ansi::AnsiMachine;
use crate::color::Rgb;
use crate::config::{BufferConfig, Profile};
use crate::encoding::{StreamDecoder, TextEncoding};
use crate::link::{LinkEntry, LinkStore};
use crate::logger::{LogError, LogFormat, SessionLogger};
use crate::style::{CharStyle, DisplayAttrs, LinkId, SourceFlags, NO_LINK};

/// 單次 append 可寫入的格數上限，防止失控的腳本塞爆緩衝區
pub const MAX_CHARS_PER_ECHO: usize = 1_000_000;

/// 緩衝區中的位置：第 `line` 行的第 `column` 格
///
/// 排序為行優先，可直接比較前後。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor {
    pub line: usize,
    pub column: usize,
}

impl Cursor {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// 搜尋命中的範圍，半開區間 [begin, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub begin: Cursor,
    pub end: Cursor,
}

/// 自緩衝區複製出的片段，可再貼回任何緩衝區
#[derive(Debug, Clone, Default)]
pub struct BufferSlice {
    lines: Vec<BufferLine>,
}

impl BufferSlice {
    pub fn lines(&self) -> &[BufferLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// 捲動文字緩衝區
pub struct Buffer {
    lines: VecDeque<BufferLine>,
    links: LinkStore,
    decoder: StreamDecoder,
    ansi: AnsiMachine,
    /// 尚未以換行收尾的累積中文字
    current: BufferLine,
    profile: Profile,
    wrap_at: usize,
    wrap_indent: usize,
    lines_limit: usize,
    batch_delete_size: usize,
    /// append_line 收尾後為真，下一次 append 須另起新行
    line_closed: bool,
    /// 已寫入日誌的最後一行行號
    last_logged: Option<usize>,
    /// 該行寫入當下的內容，用來偵測行號因刪除而失效
    last_logged_text: String,
}

impl Buffer {
    pub fn new(config: BufferConfig, profile: Profile) -> Self {
        Self {
            lines: VecDeque::new(),
            links: LinkStore::default(),
            decoder: StreamDecoder::new(config.encoding),
            ansi: AnsiMachine::new(&profile),
            current: BufferLine::default(),
            profile,
            wrap_at: config.wrap_at,
            wrap_indent: config.wrap_indent,
            lines_limit: config.lines_limit,
            batch_delete_size: config.batch_delete_size,
            line_closed: false,
            last_logged: None,
            last_logged_text: String::new(),
        }
    }

    // ------------------------------------------------------------------
    // 輸入管線

    /// 處理一個位元組封包
    ///
    /// 解碼、剖析 ANSI 序列後逐字附加到累積中的行；換行符號將該行
    /// 存入緩衝區。封包可以在任何位置被切斷，未完成的多位元組字元
    /// 與跳脫序列會保留到下一個封包。
    ///
    /// # Arguments
    /// * `chunk` - 原始位元組
    /// * `from_server` - 伺服器輸出為 `true`；本地回顯為 `false`，
    ///   其字元會帶上 ECHO 來源旗標且不參與位元組暫存
    ///
    /// # Returns
    /// 本次呼叫存入緩衝區的行數
    ///
    /// # Example
    /// ```
    /// use mudbuffer::Buffer;
    ///
    /// let mut buffer = Buffer::default();
    /// buffer.process_bytes(b"Hello \x1b[31mworld\x1b[0m\r\n", true);
    /// assert_eq!(buffer.line(0), Some("Hello world"));
    /// ```
    pub fn process_bytes(&mut self, chunk: &[u8], from_server: bool) -> usize {
        let text = self.decoder.decode(chunk, from_server);
        let mut committed = 0;
        for ch in text.chars() {
            let visible = match self.ansi.advance(ch, &mut self.links) {
                Some(ch) => ch,
                None => continue,
            };
            match visible {
                '\n' => {
                    self.commit_line(false);
                    committed += 1;
                }
                '\r' => {}
                '\t' => {
                    let style = self.stamp_style(from_server);
                    // 展開到下一個 8 欄定位點
                    loop {
                        self.current.push(' ', style);
                        if self.current.len() % 8 == 0 {
                            break;
                        }
                    }
                }
                ch if (ch as u32) < 0x20 || ch == '\x7f' => {}
                ch => {
                    let style = self.stamp_style(from_server);
                    self.current.push(ch, style);
                }
            }
        }
        committed
    }

    /// 將累積中的行以提示列身分強制存入
    ///
    /// MUD 的提示列通常不以換行結尾，閒置逾時後由呼叫端觸發。
    ///
    /// # Returns
    /// 累積中的行為空時回傳 `false`
    pub fn flush_prompt(&mut self) -> bool {
        if self.current.is_empty() {
            return false;
        }
        self.commit_line(true);
        true
    }

    /// 尚未存入緩衝區的累積中文字
    pub fn pending_line(&self) -> &str {
        self.current.text()
    }

    fn stamp_style(&self, from_server: bool) -> CharStyle {
        let style = self.ansi.current_style();
        if from_server {
            style
        } else {
            style.with_source(SourceFlags::ECHO)
        }
    }

    fn commit_line(&mut self, prompt: bool) {
        let mut line = std::mem::take(&mut self.current);
        line.set_time(timestamp_now());
        line.set_prompt(prompt);
        self.lines.push_back(line);
        self.line_closed = false;
        if self.wrap_at > 0 {
            let index = self.lines.len() - 1;
            let style = self.base_style();
            self.wrap_line_at(index, self.wrap_at, self.wrap_indent, style);
        }
        self.shrink_buffer();
    }

    fn base_style(&self) -> CharStyle {
        CharStyle::new(self.profile.default_fg, self.profile.default_bg)
    }

    // ------------------------------------------------------------------
    // 寫入操作

    /// 將帶樣式的文字接到緩衝區最後一行
    ///
    /// `sub_start..sub_end` 選取 `text` 的 grapheme 視窗，文字中的
    /// 換行會開新行。緩衝區為空時先建立一行。
    ///
    /// # Arguments
    /// * `link` - 不為 [`NO_LINK`] 時，寫入的每一格都標上該連結
    pub fn append(
        &mut self,
        text: &str,
        sub_start: usize,
        sub_end: usize,
        format: CharStyle,
        link: LinkId,
    ) {
        let mut style = format;
        if link != NO_LINK {
            style.set_link(link);
        }
        let total = length_in_graphemes(text);
        let start = sub_start.min(total);
        let end = sub_end.min(total).max(start);
        let mut window = end - start;
        if window > MAX_CHARS_PER_ECHO {
            warn!("單次 append 達 {} 格，截斷至 {} 格", window, MAX_CHARS_PER_ECHO);
            window = MAX_CHARS_PER_ECHO;
        }
        if self.lines.is_empty() || self.line_closed {
            let mut next = BufferLine::default();
            next.set_time(timestamp_now());
            self.lines.push_back(next);
            self.line_closed = false;
        }
        if window == 0 {
            self.shrink_buffer();
            return;
        }
        let mut touched = vec![self.lines.len() - 1];
        for grapheme in text.graphemes(true).skip(start).take(window) {
            if grapheme == "\n" || grapheme == "\r\n" {
                let mut next = BufferLine::default();
                next.set_time(timestamp_now());
                self.lines.push_back(next);
                touched.push(self.lines.len() - 1);
                continue;
            }
            if let Some(last) = self.lines.back_mut() {
                last.push_grapheme(grapheme, style);
            }
        }
        if self.wrap_at > 0 {
            let base = self.base_style();
            let mut offset = 0usize;
            for (i, index) in touched.into_iter().enumerate() {
                let index = index + offset;
                if index >= self.lines.len() {
                    break;
                }
                // 被接長的行重新參與換行；它若本是續行，重新換行後
                // 首段保留續行標記
                let was_continuation = i == 0
                    && self
                        .lines
                        .get_mut(index)
                        .map(|line| {
                            let flag = line.is_wrapped();
                            line.set_wrapped(false);
                            flag
                        })
                        .unwrap_or(false);
                let produced = self.wrap_line_at(index, self.wrap_at, self.wrap_indent, base);
                if was_continuation {
                    if let Some(line) = self.lines.get_mut(index) {
                        line.set_wrapped(true);
                    }
                }
                offset += produced.saturating_sub(1);
            }
        }
        self.shrink_buffer();
    }

    /// 同 [`append`](Self::append)，寫完後以新行收尾
    ///
    /// 收尾不立即產生空行，下一次 append 才會另起新行。
    pub fn append_line(
        &mut self,
        text: &str,
        sub_start: usize,
        sub_end: usize,
        format: CharStyle,
        link: LinkId,
    ) {
        self.append(text, sub_start, sub_end, format, link);
        self.line_closed = true;
    }

    /// 寫入一段可點擊的連結文字
    ///
    /// # Returns
    /// 配發的連結 id，之後可用 [`link`](Self::link) 查回內容
    pub fn add_link(
        &mut self,
        permanent: bool,
        text: &str,
        commands: Vec<String>,
        hints: Vec<String>,
        format: CharStyle,
        script_refs: Vec<i64>,
    ) -> LinkId {
        let id = self.links.add(LinkEntry {
            permanent,
            commands,
            hints,
            script_refs,
        });
        let total = length_in_graphemes(text);
        self.append(text, 0, total, format, id);
        id
    }

    /// 在指定位置插入文字（單行，不可含換行）
    ///
    /// # Returns
    /// 游標超出範圍或文字含換行時回傳 `false`
    pub fn insert_in_line(&mut self, cursor: Cursor, text: &str, format: CharStyle) -> bool {
        if text.is_empty() || text.contains('\n') {
            return false;
        }
        match self.lines.get_mut(cursor.line) {
            Some(line) => line.insert_text(cursor.column, text, format),
            None => false,
        }
    }

    /// 以新文字取代同一行內 [begin, end) 的內容
    pub fn replace_in_line(
        &mut self,
        begin: Cursor,
        end: Cursor,
        with: &str,
        format: CharStyle,
    ) -> bool {
        if begin.line != end.line || begin.column > end.column || with.contains('\n') {
            return false;
        }
        let line = match self.lines.get_mut(begin.line) {
            Some(line) => line,
            None => return false,
        };
        if end.column > line.len() {
            return false;
        }
        line.remove_range(begin.column, end.column);
        line.insert_text(begin.column, with, format)
    }

    /// 以空白把第 `y` 行補長 `count` 格
    pub fn expand_line(&mut self, y: usize, count: usize, format: CharStyle) -> bool {
        match self.lines.get_mut(y) {
            Some(line) => {
                line.pad(count, format);
                true
            }
            None => false,
        }
    }

    /// 刪除第 `y` 行
    pub fn delete_line(&mut self, y: usize) -> bool {
        self.delete_lines(y, y)
    }

    /// 刪除 [from, to] 的行（含尾）
    pub fn delete_lines(&mut self, from: usize, to: usize) -> bool {
        if from > to || to >= self.lines.len() {
            return false;
        }
        let removed = to - from + 1;
        self.lines.drain(from..=to);
        self.adjust_watermark_removal(from, to, removed);
        true
    }

    // ------------------------------------------------------------------
    // 自動換行

    /// 將第 `y` 行依欄寬重新換行
    ///
    /// 在欄寬內的最後一個空白後斷行（空白留在前段行尾），整段無
    /// 空白時於欄寬處硬切；續行前面補上 `indent` 個空白格並帶上
    /// 續行標記。帶標記的續行不再處理，重複呼叫不會改變結果。
    ///
    /// # Returns
    /// 該行換行後佔的行數；`y` 超出範圍或 `width` 為 0 時回傳 0
    pub fn wrap_line(&mut self, y: usize, width: usize, indent: usize, format: CharStyle) -> usize {
        if y >= self.lines.len() || width == 0 {
            return 0;
        }
        self.wrap_line_at(y, width, indent, format)
    }

    fn wrap_line_at(&mut self, y: usize, width: usize, indent: usize, format: CharStyle) -> usize {
        let needs = match self.lines.get(y) {
            Some(line) => !line.is_wrapped() && line.len() > width,
            None => return 0,
        };
        if !needs {
            return 1;
        }
        let mut rest = match self.lines.remove(y) {
            Some(line) => line,
            None => return 0,
        };
        let time = rest.time().to_string();
        let prompt = rest.is_prompt();
        let mut segments: Vec<BufferLine> = Vec::new();
        loop {
            if rest.len() <= width {
                segments.push(rest);
                break;
            }
            let cut = break_column(&rest, width);
            let tail = rest.split_off(cut);
            segments.push(rest);
            rest = tail;
        }
        let produced = segments.len();
        for (i, mut segment) in segments.into_iter().enumerate() {
            if i > 0 && indent > 0 {
                let mut padded = BufferLine::default();
                padded.pad(indent, format);
                padded.extend_from(&segment);
                segment = padded;
            }
            segment.set_time(time.clone());
            segment.set_prompt(prompt && i == 0);
            segment.set_wrapped(i > 0);
            self.lines.insert(y + i, segment);
        }
        if produced > 1 {
            if let Some(mark) = self.last_logged {
                if mark > y {
                    self.last_logged = Some(mark + produced - 1);
                }
            }
        }
        produced
    }

    // ------------------------------------------------------------------
    // 樣式與連結標記

    /// 對 [begin, end) 範圍開關顯示屬性
    pub fn apply_attribute(
        &mut self,
        begin: Cursor,
        end: Cursor,
        attrs: DisplayAttrs,
        state: bool,
    ) -> bool {
        self.apply_range(begin, end, |style| {
            let mut current = style.attrs();
            current.set(attrs, state);
            style.set_all_display_attributes(current);
        })
    }

    /// 對 [begin, end) 範圍設定前景色
    pub fn apply_fg_color(&mut self, begin: Cursor, end: Cursor, color: Rgb) -> bool {
        self.apply_range(begin, end, |style| style.set_foreground(color))
    }

    /// 對 [begin, end) 範圍設定背景色
    pub fn apply_bg_color(&mut self, begin: Cursor, end: Cursor, color: Rgb) -> bool {
        self.apply_range(begin, end, |style| style.set_background(color))
    }

    /// 把 [begin, end) 範圍標記為一個新連結
    ///
    /// # Returns
    /// 範圍無效時回傳 `false`，且不配發連結 id
    pub fn apply_link(
        &mut self,
        begin: Cursor,
        end: Cursor,
        commands: Vec<String>,
        hints: Vec<String>,
        script_refs: Vec<i64>,
    ) -> bool {
        if self.check_range(begin, end).is_none() {
            return false;
        }
        let id = self.links.add(LinkEntry {
            permanent: false,
            commands,
            hints,
            script_refs,
        });
        self.apply_range(begin, end, |style| style.set_link(id))
    }

    fn check_range(&self, begin: Cursor, end: Cursor) -> Option<(Cursor, Cursor)> {
        if begin > end {
            return None;
        }
        let begin_line = self.lines.get(begin.line)?;
        let end_line = self.lines.get(end.line)?;
        if begin.column > begin_line.len() || end.column > end_line.len() {
            return None;
        }
        Some((begin, end))
    }

    fn apply_range<F>(&mut self, begin: Cursor, end: Cursor, mut f: F) -> bool
    where
        F: FnMut(&mut CharStyle),
    {
        let (begin, end) = match self.check_range(begin, end) {
            Some(range) => range,
            None => return false,
        };
        for row in begin.line..=end.line {
            let line = match self.lines.get_mut(row) {
                Some(line) => line,
                None => break,
            };
            let from = if row == begin.line { begin.column } else { 0 };
            let to = if row == end.line { end.column } else { line.len() };
            if from < to {
                for style in &mut line.styles_mut()[from..to] {
                    f(style);
                }
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // 複製、剪下、貼上

    /// 複製 [begin, end) 為可攜帶的片段，樣式與連結標記一併保留
    pub fn copy(&self, begin: Cursor, end: Cursor) -> BufferSlice {
        if begin == end {
            return BufferSlice::default();
        }
        let (begin, end) = match self.check_range(begin, end) {
            Some(range) => range,
            None => return BufferSlice::default(),
        };
        let mut lines = Vec::new();
        for row in begin.line..=end.line {
            let line = match self.lines.get(row) {
                Some(line) => line,
                None => break,
            };
            let from = if row == begin.line { begin.column } else { 0 };
            let to = if row == end.line { end.column } else { line.len() };
            lines.push(line.sub_line(from, to));
        }
        BufferSlice { lines }
    }

    /// 剪下 [begin, end)；跨行時尾行殘餘接回首行
    pub fn cut(&mut self, begin: Cursor, end: Cursor) -> BufferSlice {
        let slice = self.copy(begin, end);
        if slice.is_empty() {
            return slice;
        }
        if begin.line == end.line {
            if let Some(line) = self.lines.get_mut(begin.line) {
                line.remove_range(begin.column, end.column);
            }
        } else {
            let tail = match self.lines.get_mut(end.line) {
                Some(line) => line.split_off(end.column),
                None => BufferLine::default(),
            };
            if let Some(first) = self.lines.get_mut(begin.line) {
                first.truncate(begin.column);
                first.extend_from(&tail);
            }
            let removed_from = begin.line + 1;
            self.lines.drain(removed_from..=end.line);
            self.adjust_watermark_removal(removed_from, end.line, end.line - removed_from + 1);
        }
        slice
    }

    /// 在游標處貼上片段
    ///
    /// 游標在緩衝區結尾（或緩衝區為空）時等同附加；否則於游標處
    /// 切開，片段首行併入游標所在行，其餘插入為新行。
    ///
    /// # Returns
    /// 片段為空或游標無效時回傳 `false`
    pub fn paste(&mut self, at: Cursor, slice: &BufferSlice) -> bool {
        if slice.is_empty() {
            return false;
        }
        if self.lines.is_empty() || at == self.end_pos() {
            self.append_slice(slice);
            return true;
        }
        if !self.is_valid_cursor(at) {
            return false;
        }
        let tail = match self.lines.get_mut(at.line) {
            Some(line) => line.split_off(at.column),
            None => return false,
        };
        let mut insert_at = at.line;
        if let (Some(target), Some(first)) = (self.lines.get_mut(at.line), slice.lines.first()) {
            target.extend_from(first);
        }
        for line in slice.lines.iter().skip(1) {
            insert_at += 1;
            self.lines.insert(insert_at, line.clone());
        }
        if let Some(last) = self.lines.get_mut(insert_at) {
            last.extend_from(&tail);
        }
        let inserted = slice.lines.len() - 1;
        if inserted > 0 {
            if let Some(mark) = self.last_logged {
                if mark > at.line {
                    self.last_logged = Some(mark + inserted);
                }
            }
        }
        true
    }

    /// 把片段整段接到緩衝區尾端
    pub fn append_slice(&mut self, slice: &BufferSlice) {
        for line in slice.lines.iter() {
            let mut line = line.clone();
            if line.time().is_empty() {
                line.set_time(timestamp_now());
            }
            self.lines.push_back(line);
        }
        self.line_closed = false;
        self.shrink_buffer();
    }

    // ------------------------------------------------------------------
    // 容量管理

    fn shrink_buffer(&mut self) {
        while self.lines.len() > self.lines_limit {
            let batch = self.batch_delete_size.clamp(1, self.lines.len());
            self.lines.drain(0..batch);
            if let Some(mark) = self.last_logged {
                if mark >= batch {
                    self.last_logged = Some(mark - batch);
                } else {
                    self.last_logged = None;
                    self.last_logged_text.clear();
                }
            }
            debug!("緩衝區超過 {} 行，移除最舊的 {} 行", self.lines_limit, batch);
        }
    }

    fn adjust_watermark_removal(&mut self, from: usize, to: usize, removed: usize) {
        if let Some(mark) = self.last_logged {
            if mark > to {
                self.last_logged = Some(mark - removed);
            } else if mark >= from {
                self.last_logged = None;
                self.last_logged_text.clear();
            }
        }
    }

    // ------------------------------------------------------------------
    // 查詢

    /// 緩衝區目前的行數
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 第 `y` 行的純文字
    pub fn line(&self, y: usize) -> Option<&str> {
        self.lines.get(y).map(|line| line.text())
    }

    /// 第 `y` 行的完整紀錄（含樣式與時間戳）
    pub fn line_record(&self, y: usize) -> Option<&BufferLine> {
        self.lines.get(y)
    }

    pub fn last_line_number(&self) -> Option<usize> {
        self.lines.len().checked_sub(1)
    }

    /// 緩衝區結尾的位置（最後一行行尾），空緩衝區為 (0, 0)
    pub fn end_pos(&self) -> Cursor {
        match self.lines.back() {
            Some(last) => Cursor::new(self.lines.len() - 1, last.len()),
            None => Cursor::new(0, 0),
        }
    }

    pub fn is_valid_cursor(&self, cursor: Cursor) -> bool {
        match self.lines.get(cursor.line) {
            Some(line) => cursor.column <= line.len(),
            None => false,
        }
    }

    /// 取得最後 `n` 行的純文字，由舊到新
    pub fn get_end_lines(&self, n: usize) -> Vec<&str> {
        self.lines
            .iter()
            .rev()
            .take(n)
            .map(|line| line.text())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// 取出 [begin, end) 的純文字，跨行以換行接合
    pub fn text_range(&self, begin: Cursor, end: Cursor) -> Option<String> {
        let (begin, end) = self.check_range(begin, end)?;
        let mut parts = Vec::new();
        for row in begin.line..=end.line {
            let line = self.lines.get(row)?;
            let from = if row == begin.line { begin.column } else { 0 };
            let to = if row == end.line { end.column } else { line.len() };
            parts.push(line.sub_line(from, to).text().to_string());
        }
        Some(parts.join("\n"))
    }

    /// 在第 `y` 行自 `from_col` 起尋找子字串
    ///
    /// # Returns
    /// 命中處的格位
    pub fn find(&self, y: usize, what: &str, from_col: usize) -> Option<usize> {
        if what.is_empty() {
            return None;
        }
        let line = self.lines.get(y)?;
        let start = line.byte_offset(from_col)?;
        let found = line.text()[start..].find(what)?;
        Some(length_in_graphemes(&line.text()[..start + found]))
    }

    /// 以正規表示式搜尋 [from, to] 的行，回傳所有命中範圍
    pub fn search(&self, pattern: &Regex, from: usize, to: usize) -> Vec<SearchMatch> {
        let mut matches = Vec::new();
        if self.lines.is_empty() {
            return matches;
        }
        let to = to.min(self.lines.len() - 1);
        for row in from..=to {
            let line = match self.lines.get(row) {
                Some(line) => line,
                None => break,
            };
            for found in pattern.find_iter(line.text()) {
                matches.push(SearchMatch {
                    begin: Cursor::new(row, length_in_graphemes(&line.text()[..found.start()])),
                    end: Cursor::new(row, length_in_graphemes(&line.text()[..found.end()])),
                });
            }
        }
        matches
    }

    /// 以分隔字串切割第 `y` 行
    pub fn split(&self, y: usize, sep: &str) -> Vec<String> {
        match self.lines.get(y) {
            Some(line) if !sep.is_empty() => {
                line.text().split(sep).map(str::to_string).collect()
            }
            Some(line) => vec![line.text().to_string()],
            None => Vec::new(),
        }
    }

    /// 以正規表示式切割第 `y` 行
    pub fn split_regex(&self, y: usize, pattern: &Regex) -> Vec<String> {
        match self.lines.get(y) {
            Some(line) => pattern.split(line.text()).map(str::to_string).collect(),
            None => Vec::new(),
        }
    }

    /// 自 `col` 起跳過連續空白，回傳第一個非空白的格位
    pub fn skip_spaces_at_begin_of_line(&self, y: usize, col: usize) -> usize {
        let line = match self.lines.get(y) {
            Some(line) => line,
            None => return col,
        };
        let mut col = col;
        for grapheme in line.graphemes().skip(col) {
            if grapheme.chars().all(char::is_whitespace) {
                col += 1;
            } else {
                break;
            }
        }
        col
    }

    /// 清空所有行與累積中的文字
    ///
    /// 連結表、解碼器與剖析狀態保留，已配發的連結 id 仍可查詢。
    pub fn clear(&mut self) {
        self.lines.clear();
        self.current = BufferLine::default();
        self.line_closed = false;
        self.last_logged = None;
        self.last_logged_text.clear();
    }

    // ------------------------------------------------------------------
    // 日誌

    /// 將 [from, to]（含尾）的行寫入工作階段日誌
    ///
    /// 已寫過的行不會重複：內部水位記住最後寫入的行號與內容，
    /// 內容吻合時只補寫其後的新行。日誌未在錄製中則不做事。
    pub fn log(&mut self, from: usize, to: usize, logger: &mut SessionLogger) -> Result<(), LogError> {
        if self.lines.is_empty() || !logger.is_recording() {
            return Ok(());
        }
        let mut start = from;
        if let Some(mark) = self.last_logged {
            if mark < self.lines.len() && self.lines[mark].text() == self.last_logged_text {
                start = start.max(mark + 1);
            }
        }
        let to = to.min(self.lines.len() - 1);
        if start > to {
            return Ok(());
        }
        for row in start..=to {
            let rendered = match logger.format() {
                LogFormat::Html => self.line_to_html(row, 0, None, logger.timestamps(), 0),
                LogFormat::PlainText => {
                    let line = &self.lines[row];
                    if logger.timestamps() {
                        format!("{}{}", line.time(), line.text())
                    } else {
                        line.text().to_string()
                    }
                }
            };
            logger.log_line(&rendered)?;
        }
        self.last_logged = Some(to);
        self.last_logged_text = self.lines[to].text().to_string();
        Ok(())
    }

    /// 把尚未寫入日誌的行全部補寫
    pub fn log_remaining_output(&mut self, logger: &mut SessionLogger) -> Result<(), LogError> {
        if self.lines.is_empty() {
            return Ok(());
        }
        self.log(0, self.lines.len() - 1, logger)
    }

    // ------------------------------------------------------------------
    // 設定

    /// 自動換行欄寬，0 表示不換行
    pub fn set_wrap_at(&mut self, wrap_at: usize) {
        self.wrap_at = wrap_at;
    }

    pub fn wrap_at(&self) -> usize {
        self.wrap_at
    }

    pub fn set_wrap_indent(&mut self, indent: usize) {
        self.wrap_indent = indent;
    }

    pub fn wrap_indent(&self) -> usize {
        self.wrap_indent
    }

    /// 調整容量上限並立即套用
    ///
    /// 上限最低 100 行；批次刪除行數夾在 1 與上限之間。
    pub fn set_buffer_size(&mut self, limit: usize, batch_delete_size: usize) {
        self.lines_limit = limit.max(100);
        self.batch_delete_size = batch_delete_size.clamp(1, self.lines_limit);
        self.shrink_buffer();
    }

    pub fn max_buffer_size(&self) -> usize {
        self.lines_limit
    }

    /// 以名稱切換伺服器編碼
    ///
    /// # Returns
    /// 名稱無法識別時回傳 `false`，編碼不變
    pub fn set_encoding(&mut self, label: &str) -> bool {
        match TextEncoding::from_label(label) {
            Some(encoding) => {
                self.decoder.set_encoding(encoding);
                true
            }
            None => {
                warn!("未知的編碼名稱: {}", label);
                false
            }
        }
    }

    pub fn encoding(&self) -> &'static str {
        self.decoder.encoding().label()
    }

    /// 換用新的色彩設定檔；調色盤重載，進行中的顏色回到預設
    pub fn set_profile(&mut self, profile: Profile) {
        self.ansi.update_colors(&profile);
        self.profile = profile;
    }

    /// 同 [`set_profile`](Self::set_profile)，沿用外部持有的設定檔
    pub fn update_colors(&mut self, profile: &Profile) {
        self.set_profile(profile.clone());
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// 目前生效的行為設定快照
    pub fn config(&self) -> BufferConfig {
        BufferConfig {
            wrap_at: self.wrap_at,
            wrap_indent: self.wrap_indent,
            lines_limit: self.lines_limit,
            batch_delete_size: self.batch_delete_size,
            encoding: self.decoder.encoding(),
        }
    }

    /// 查詢連結內容；id 在緩衝區存續期間一直有效，行被淘汰也不例外
    pub fn link(&self, id: LinkId) -> Option<&LinkEntry> {
        self.links.get(id)
    }

    pub fn links(&self) -> &LinkStore {
        &self.links
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new(BufferConfig::default(), Profile::default())
    }
}

/// 找出不超過 `width` 的斷行點：欄寬內最後一個空白之後，否則硬切
fn break_column(line: &BufferLine, width: usize) -> usize {
    let mut cut = width;
    for (col, grapheme) in line.graphemes().enumerate().take(width) {
        if grapheme.chars().all(char::is_whitespace) {
            cut = col + 1;
        }
    }
    cut
}

fn timestamp_now() -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03} ",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
        now.subsec_millis()
    )
}
