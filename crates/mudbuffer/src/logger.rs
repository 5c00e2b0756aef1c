//! 工作階段日誌模組
//!
//! 把緩衝區收到的文字即時寫入日誌檔，支援純文字與 HTML 兩種格式。
//! HTML 格式帶有深色背景的頁面骨架，樣式由呼叫端（緩衝區的 HTML
//! 匯出）先行轉好，這裡只負責檔案的開關與逐行寫入。

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// 日誌寫入錯誤
#[derive(Debug, Error)]
pub enum LogError {
    #[error("IO 錯誤: {0}")]
    Io(#[from] io::Error),
    #[error("日誌未開啟")]
    NotOpen,
}

/// 日誌檔格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 純文字，一行一筆
    #[default]
    PlainText,
    /// 行內 CSS 的 HTML
    Html,
}

/// 工作階段日誌
///
/// # Example
/// ```no_run
/// use mudbuffer::{LogFormat, SessionLogger};
///
/// let mut logger = SessionLogger::new("session.log").with_format(LogFormat::PlainText);
/// logger.start()?;
/// logger.log_line("你推開了厚重的木門。")?;
/// logger.stop()?;
/// # Ok::<(), mudbuffer::LogError>(())
/// ```
pub struct SessionLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    format: LogFormat,
    /// 純文字格式是否在行首帶時間戳
    timestamps: bool,
    lines_logged: u64,
}

impl SessionLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            format: LogFormat::default(),
            timestamps: false,
            lines_logged: 0,
        }
    }

    /// 指定格式（builder 風格）
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 開始錄製
    ///
    /// 檔案以附加模式開啟，不存在時建立；HTML 格式且檔案全新時
    /// 先寫入頁面開頭。已在錄製中則不做事。
    pub fn start(&mut self) -> Result<(), LogError> {
        if self.writer.is_some() {
            debug!("日誌已在錄製中: {}", self.path.display());
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let fresh = fs::metadata(&self.path).map(|meta| meta.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        if fresh && self.format == LogFormat::Html {
            write_html_header(&mut writer)?;
        }
        self.writer = Some(writer);
        info!("開始錄製日誌: {}", self.path.display());
        Ok(())
    }

    /// 停止錄製並落盤；未在錄製中則不做事
    pub fn stop(&mut self) -> Result<(), LogError> {
        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => return Ok(()),
        };
        if self.format == LogFormat::Html {
            write_html_footer(&mut writer)?;
        }
        writer.flush()?;
        info!("停止錄製日誌: {}，共 {} 行", self.path.display(), self.lines_logged);
        Ok(())
    }

    /// 寫入一行（內容須已依格式轉換完成）
    pub fn log_line(&mut self, line: &str) -> Result<(), LogError> {
        let writer = self.writer.as_mut().ok_or(LogError::NotOpen)?;
        match self.format {
            LogFormat::PlainText => writeln!(writer, "{}", line)?,
            LogFormat::Html => writeln!(writer, "{}<br>", line)?,
        }
        self.lines_logged += 1;
        Ok(())
    }

    /// 把緩衝的內容立即寫入磁碟
    pub fn flush(&mut self) -> Result<(), LogError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn set_timestamps(&mut self, timestamps: bool) {
        self.timestamps = timestamps;
    }

    pub fn timestamps(&self) -> bool {
        self.timestamps
    }

    /// 開始錄製以來寫入的行數
    pub fn lines_logged(&self) -> u64 {
        self.lines_logged
    }
}

impl Default for SessionLogger {
    fn default() -> Self {
        Self::new("session.log")
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn write_html_header(writer: &mut BufWriter<File>) -> io::Result<()> {
    writeln!(writer, "<!DOCTYPE html>")?;
    writeln!(writer, "<html>")?;
    writeln!(writer, "<head>")?;
    writeln!(writer, "<meta charset=\"utf-8\">")?;
    writeln!(writer, "<style>")?;
    writeln!(
        writer,
        "body {{ background-color: #000000; color: #c8c8c8; font-family: monospace; white-space: pre-wrap; }}"
    )?;
    writeln!(writer, "a {{ color: inherit; }}")?;
    writeln!(writer, "</style>")?;
    writeln!(writer, "</head>")?;
    writeln!(writer, "<body>")?;
    Ok(())
}

fn write_html_footer(writer: &mut BufWriter<File>) -> io::Result<()> {
    writeln!(writer, "</body>")?;
    writeln!(writer, "</html>")?;
    Ok(())
}
