//! mudbuffer - MUD 客戶端文字緩衝引擎
//!
//! 處理 MUD 伺服器輸出的完整管線：位元組解碼（UTF-8、GBK、
//! GB18030、Big5 等，跨封包的不完整字元自動接回）、ANSI/SGR 跳脫
//! 序列剖析（含 OSC 8 超連結與調色盤指令）、帶樣式與連結標記的
//! 捲動緩衝區，以及 HTML 匯出與工作階段日誌。
//!
//! # 主要模組
//! - [`encoding`] - 串流解碼器與無法解碼位元組的隱藏跳脫
//! - [`ansi`] - ANSI 跳脫序列狀態機與目前顯示狀態
//! - [`buffer`] - 捲動緩衝區：自動換行、樣式標記、剪貼、搜尋、匯出
//! - [`logger`] - 純文字 / HTML 工作階段日誌
//!
//! # Example
//! ```
//! use mudbuffer::Buffer;
//!
//! let mut buffer = Buffer::default();
//! buffer.process_bytes(b"\x1b[32mWelcome, traveler!\x1b[0m\r\n", true);
//! assert_eq!(buffer.line(0), Some("Welcome, traveler!"));
//! ```

pub mod ansi;
pub mod buffer;
pub mod color;
pub mod config;
pub mod encoding;
pub mod link;
pub mod logger;
pub mod style;

pub use ansi::AnsiMachine;
pub use buffer::{
    length_in_graphemes, Buffer, BufferLine, BufferSlice, Cursor, SearchMatch, MAX_CHARS_PER_ECHO,
};
pub use color::Rgb;
pub use config::{BufferConfig, Profile};
pub use encoding::{
    decode_hidden_raw_bytes, encode_raw_byte_to_hidden, is_hidden_nibble, StreamDecoder,
    TextEncoding,
};
pub use link::{LinkEntry, LinkStore};
pub use logger::{LogError, LogFormat, SessionLogger};
pub use style::{CharStyle, DisplayAttrs, LinkId, SourceFlags, NO_LINK};
