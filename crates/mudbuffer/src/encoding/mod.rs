//! 字元編碼解碼模組
//!
//! 將伺服器送來的原始位元組串流轉為 Unicode 文字，支援台灣與大陸
//! MUD 伺服器常用的 Big5、GBK、GB18030 以及 UTF-8 等編碼。封包可能在
//! 多位元組字元中間被切斷，結尾的不完整序列會保留到下一個封包再解；
//! 無法解碼的位元組以兩個保留碼位跳脫，之後仍可還原回原始位元組，
//! 任何輸入位元組都不會被丟棄。

use std::collections::HashMap;

use bytes::BytesMut;
use encoding_rs::{BIG5, GB18030, GBK, WINDOWS_1252};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 支援的字元編碼
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "ASCII")]
    Ascii,
    #[default]
    #[serde(rename = "UTF-8")]
    Utf8,
    #[serde(rename = "GBK")]
    Gbk,
    #[serde(rename = "GB18030")]
    Gb18030,
    #[serde(rename = "Big5")]
    Big5,
    #[serde(rename = "ISO 8859-1")]
    Latin1,
    #[serde(rename = "Windows-1252")]
    Cp1252,
}

lazy_static! {
    /// 編碼名稱查詢表（鍵一律大寫）
    static ref ENCODING_LABELS: HashMap<&'static str, TextEncoding> = {
        let mut m = HashMap::new();
        m.insert("ASCII", TextEncoding::Ascii);
        m.insert("UTF-8", TextEncoding::Utf8);
        m.insert("UTF8", TextEncoding::Utf8);
        m.insert("GBK", TextEncoding::Gbk);
        m.insert("GB18030", TextEncoding::Gb18030);
        m.insert("BIG5", TextEncoding::Big5);
        m.insert("ISO 8859-1", TextEncoding::Latin1);
        m.insert("LATIN1", TextEncoding::Latin1);
        m.insert("WINDOWS-1252", TextEncoding::Cp1252);
        m.insert("CP1252", TextEncoding::Cp1252);
        m
    };
}

impl TextEncoding {
    /// 顯示名稱
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Ascii => "ASCII",
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Gbk => "GBK",
            TextEncoding::Gb18030 => "GB18030",
            TextEncoding::Big5 => "Big5",
            TextEncoding::Latin1 => "ISO 8859-1",
            TextEncoding::Cp1252 => "Windows-1252",
        }
    }

    /// 由名稱查詢編碼（不分大小寫），無法識別時回傳 `None`
    pub fn from_label(label: &str) -> Option<Self> {
        ENCODING_LABELS
            .get(label.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    /// 所有支援的編碼
    pub fn all() -> &'static [TextEncoding] {
        &[
            TextEncoding::Ascii,
            TextEncoding::Utf8,
            TextEncoding::Gbk,
            TextEncoding::Gb18030,
            TextEncoding::Big5,
            TextEncoding::Latin1,
            TextEncoding::Cp1252,
        ]
    }

    /// 是否為多位元組編碼（解碼時可能出現跨封包的不完整序列）
    pub fn is_multi_byte(&self) -> bool {
        matches!(
            self,
            TextEncoding::Utf8 | TextEncoding::Gbk | TextEncoding::Gb18030 | TextEncoding::Big5
        )
    }
}

/// 隱藏位元組的 16 個 nibble 碼位（U+FDD0 起的 noncharacter 區段）
const RAW_NIBBLES: [char; 16] = [
    '\u{FDD0}', '\u{FDD1}', '\u{FDD2}', '\u{FDD3}', '\u{FDD4}', '\u{FDD5}', '\u{FDD6}',
    '\u{FDD7}', '\u{FDD8}', '\u{FDD9}', '\u{FDDA}', '\u{FDDB}', '\u{FDDC}', '\u{FDDD}',
    '\u{FDDE}', '\u{FDDF}',
];

const RAW_NIBBLE_BASE: u32 = 0xFDD0;

/// 將無法解碼的位元組跳脫為兩個隱藏 nibble 字元（高四位在前）
pub fn encode_raw_byte_to_hidden(byte: u8) -> [char; 2] {
    [
        RAW_NIBBLES[(byte >> 4) as usize],
        RAW_NIBBLES[(byte & 0x0F) as usize],
    ]
}

/// 是否為隱藏 nibble 字元
pub fn is_hidden_nibble(ch: char) -> bool {
    hidden_nibble_value(ch).is_some()
}

fn hidden_nibble_value(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (RAW_NIBBLE_BASE..RAW_NIBBLE_BASE + 16).contains(&cp) {
        Some((cp - RAW_NIBBLE_BASE) as u8)
    } else {
        None
    }
}

/// 將文字中的隱藏 nibble 對還原為原始位元組
///
/// 非 nibble 字元會被略過並重置配對狀態；落單的 nibble 不產生輸出。
pub fn decode_hidden_raw_bytes(text: &str) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut high: Option<u8> = None;
    for ch in text.chars() {
        match hidden_nibble_value(ch) {
            Some(nibble) => match high.take() {
                Some(h) => bytes.push((h << 4) | nibble),
                None => high = Some(nibble),
            },
            None => high = None,
        }
    }
    bytes
}

fn push_hidden(out: &mut String, byte: u8) {
    let [hi, lo] = encode_raw_byte_to_hidden(byte);
    out.push(hi);
    out.push(lo);
}

/// 串流解碼器
///
/// 每個緩衝區持有一個解碼器；伺服器路徑上結尾的不完整多位元組
/// 序列會暫存於 `pending`，下一個伺服器封包先補上再解。本地產生的
/// 文字不參與暫存。
#[derive(Debug, Default)]
pub struct StreamDecoder {
    encoding: TextEncoding,
    pending: Option<BytesMut>,
}

impl StreamDecoder {
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            pending: None,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// 切換編碼；前一個編碼留下的不完整位元組直接丟棄
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        if self.encoding == encoding {
            return;
        }
        if let Some(held) = self.pending.take() {
            debug!("切換編碼至 {} 時丟棄 {} 個未完成位元組", encoding.label(), held.len());
        }
        self.encoding = encoding;
    }

    /// 是否有跨封包暫存的位元組
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// 解碼一個位元組封包
    ///
    /// # Arguments
    /// * `chunk` - 原始位元組
    /// * `from_server` - 是否來自伺服器；只有伺服器路徑會取回並補上
    ///   前次暫存的位元組，也只有伺服器路徑會暫存新的不完整序列
    ///
    /// # Returns
    /// 解碼後的文字；無法解碼的位元組以隱藏 nibble 對跳脫
    pub fn decode(&mut self, chunk: &[u8], from_server: bool) -> String {
        let held = if from_server { self.pending.take() } else { None };
        let assembled;
        let data: &[u8] = match held {
            Some(mut bytes) => {
                bytes.extend_from_slice(chunk);
                assembled = bytes;
                &assembled
            }
            None => chunk,
        };

        let mut out = String::with_capacity(data.len());
        let tail = match self.encoding {
            TextEncoding::Ascii => {
                decode_ascii(data, &mut out);
                0
            }
            TextEncoding::Latin1 => {
                // ISO 8859-1 每個位元組直接對應 U+0000..U+00FF，
                // 不能走 encoding_rs（其 latin1 標籤實為 Windows-1252）
                for &b in data {
                    out.push(b as char);
                }
                0
            }
            TextEncoding::Cp1252 => {
                let (text, _) = WINDOWS_1252.decode_without_bom_handling(data);
                out.push_str(&text);
                0
            }
            TextEncoding::Utf8 => decode_utf8(data, &mut out),
            TextEncoding::Gbk => decode_gb(data, &mut out, false),
            TextEncoding::Gb18030 => decode_gb(data, &mut out, true),
            TextEncoding::Big5 => decode_big5(data, &mut out),
        };

        if tail > 0 {
            let rest = &data[data.len() - tail..];
            if from_server {
                self.pending = Some(BytesMut::from(rest));
            } else {
                // 本地文字沒有下一個封包可等，直接跳脫
                for &b in rest {
                    push_hidden(&mut out, b);
                }
            }
        }

        out
    }
}

fn decode_ascii(data: &[u8], out: &mut String) {
    for &b in data {
        if b < 0x80 {
            out.push(b as char);
        } else {
            push_hidden(out, b);
        }
    }
}

/// UTF-8 lead byte 對應的序列總長；1 為 ASCII，0 為非法 lead
fn utf8_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// 檢查（可能不完整的）UTF-8 序列的 continuation bytes 是否合法
///
/// 涵蓋 RFC 3629 的特例範圍：E0 拒絕 overlong、ED 拒絕 surrogate、
/// F0 拒絕 overlong、F4 拒絕超出 U+10FFFF。
fn utf8_part_valid(seq: &[u8]) -> bool {
    let lead = seq[0];
    for (i, &b) in seq.iter().enumerate().skip(1) {
        let (lo, hi) = match (lead, i) {
            (0xE0, 1) => (0xA0, 0xBF),
            (0xED, 1) => (0x80, 0x9F),
            (0xF0, 1) => (0x90, 0xBF),
            (0xF4, 1) => (0x80, 0x8F),
            _ => (0x80, 0xBF),
        };
        if b < lo || b > hi {
            return false;
        }
    }
    true
}

fn decode_utf8(data: &[u8], out: &mut String) -> usize {
    let len = data.len();
    let mut pos = 0;
    while pos < len {
        let lead = data[pos];
        if lead < 0x80 {
            out.push(lead as char);
            pos += 1;
            continue;
        }
        let need = utf8_len(lead);
        if need == 0 {
            push_hidden(out, lead);
            pos += 1;
            continue;
        }
        let available = len - pos;
        if available < need {
            if utf8_part_valid(&data[pos..]) {
                // 尾端被切斷但目前為止合法，留待下一個封包
                return available;
            }
            push_hidden(out, lead);
            pos += 1;
            continue;
        }
        let unit = &data[pos..pos + need];
        if utf8_part_valid(unit) {
            if let Some(ch) = std::str::from_utf8(unit).ok().and_then(|s| s.chars().next()) {
                out.push(ch);
                pos += need;
                continue;
            }
        }
        // 非法序列只跳脫 lead，後續位元組重新掃描
        push_hidden(out, lead);
        pos += 1;
    }
    0
}

fn is_gb_trail(b: u8) -> bool {
    (0x40..=0xFE).contains(&b) && b != 0x7F
}

/// GBK 與 GB18030 共用的解碼流程；`four_byte` 開啟 GB18030 的
/// 四位元組形式（lead, 0x30-0x39, 0x81-0xFE, 0x30-0x39）
fn decode_gb(data: &[u8], out: &mut String, four_byte: bool) -> usize {
    let encoding = if four_byte { GB18030 } else { GBK };
    let len = data.len();
    let mut pos = 0;
    while pos < len {
        let lead = data[pos];
        if lead < 0x80 {
            out.push(lead as char);
            pos += 1;
            continue;
        }
        if !(0x81..=0xFE).contains(&lead) {
            push_hidden(out, lead);
            pos += 1;
            continue;
        }
        if pos + 1 >= len {
            return 1;
        }
        let b2 = data[pos + 1];
        if four_byte && (0x30..=0x39).contains(&b2) {
            if pos + 2 >= len {
                return 2;
            }
            let b3 = data[pos + 2];
            if !(0x81..=0xFE).contains(&b3) {
                push_hidden(out, lead);
                pos += 1;
                continue;
            }
            if pos + 3 >= len {
                return 3;
            }
            let b4 = data[pos + 3];
            if !(0x30..=0x39).contains(&b4) {
                push_hidden(out, lead);
                pos += 1;
                continue;
            }
            decode_unit(encoding, &data[pos..pos + 4], out);
            pos += 4;
            continue;
        }
        if is_gb_trail(b2) {
            decode_unit(encoding, &data[pos..pos + 2], out);
            pos += 2;
        } else {
            // 控制字元不可能是 trail byte，lead 跳脫後重新掃描
            push_hidden(out, lead);
            pos += 1;
        }
    }
    0
}

fn is_big5_trail(b: u8) -> bool {
    (0x40..=0x7E).contains(&b) || (0xA1..=0xFE).contains(&b)
}

fn decode_big5(data: &[u8], out: &mut String) -> usize {
    let len = data.len();
    let mut pos = 0;
    while pos < len {
        let lead = data[pos];
        if lead < 0x80 {
            out.push(lead as char);
            pos += 1;
            continue;
        }
        if !(0x81..=0xFE).contains(&lead) {
            push_hidden(out, lead);
            pos += 1;
            continue;
        }
        if pos + 1 >= len {
            return 1;
        }
        if is_big5_trail(data[pos + 1]) {
            decode_unit(BIG5, &data[pos..pos + 2], out);
            pos += 2;
        } else {
            push_hidden(out, lead);
            pos += 1;
        }
    }
    0
}

/// 解碼一個結構上合法的多位元組單元
///
/// 結構合法但查無對應字元（解出 U+FFFD）時，整個單元逐位元組跳脫，
/// 確保原始位元組可還原。
fn decode_unit(encoding: &'static encoding_rs::Encoding, unit: &[u8], out: &mut String) {
    let (text, had_errors) = encoding.decode_without_bom_handling(unit);
    if had_errors || text.contains('\u{FFFD}') {
        for &b in unit {
            push_hidden(out, b);
        }
    } else {
        out.push_str(&text);
    }
}
