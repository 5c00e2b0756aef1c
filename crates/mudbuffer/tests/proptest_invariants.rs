//! 緩衝區不變量的 property-based 測試
//!
//! 隨機輸入下驗證：封包切點不影響解碼結果、隱藏位元組可完整
//! 還原、自動換行可重複套用、容量上限恆成立、樣式格數恆等於
//! grapheme 數。

use mudbuffer::{
    decode_hidden_raw_bytes, encode_raw_byte_to_hidden, length_in_graphemes, Buffer, BufferConfig,
    CharStyle, Profile, StreamDecoder, TextEncoding,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn chunked_decode_matches_whole(
        bytes in proptest::collection::vec(any::<u8>(), 0..512),
        split in 0usize..512,
    ) {
        // 同一串位元組不論在哪裡切成兩個封包，解出的文字都一樣
        let encodings = [
            TextEncoding::Utf8,
            TextEncoding::Gbk,
            TextEncoding::Gb18030,
            TextEncoding::Big5,
        ];
        for encoding in encodings {
            let split = split.min(bytes.len());
            let mut whole = StreamDecoder::new(encoding);
            let expected = whole.decode(&bytes, true);
            let mut chunked = StreamDecoder::new(encoding);
            let mut actual = chunked.decode(&bytes[..split], true);
            actual.push_str(&chunked.decode(&bytes[split..], true));
            prop_assert_eq!(actual, expected);
        }
    }

    #[test]
    fn hidden_bytes_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut text = String::new();
        for &byte in &bytes {
            let [hi, lo] = encode_raw_byte_to_hidden(byte);
            text.push(hi);
            text.push(lo);
        }
        prop_assert_eq!(decode_hidden_raw_bytes(&text), bytes);
    }

    #[test]
    fn wrap_is_idempotent(
        text in "[ -~]{0,200}",
        width in 2usize..40,
        indent in 0usize..5,
    ) {
        prop_assume!(indent < width);
        let config = BufferConfig {
            wrap_at: 0,
            ..Default::default()
        };
        let mut buffer = Buffer::new(config, Profile::default());
        buffer.process_bytes(text.as_bytes(), true);
        buffer.process_bytes(b"\n", true);
        let style = CharStyle::default();
        buffer.wrap_line(0, width, indent, style);
        let after_first = buffer.size();
        let snapshot: Vec<String> = (0..after_first)
            .map(|y| buffer.line(y).unwrap_or_default().to_string())
            .collect();
        // 再套用一次不得改變任何東西
        for y in 0..after_first {
            buffer.wrap_line(y, width, indent, style);
        }
        prop_assert_eq!(buffer.size(), after_first);
        let again: Vec<String> = (0..after_first)
            .map(|y| buffer.line(y).unwrap_or_default().to_string())
            .collect();
        prop_assert_eq!(again, snapshot);
    }

    #[test]
    fn size_limit_holds(
        lines in proptest::collection::vec("[a-z]{0,20}", 1..60),
        limit in 3usize..10,
        batch in 1usize..5,
    ) {
        let config = BufferConfig {
            wrap_at: 0,
            lines_limit: limit,
            batch_delete_size: batch,
            ..Default::default()
        };
        let mut buffer = Buffer::new(config, Profile::default());
        for line in &lines {
            buffer.process_bytes(line.as_bytes(), true);
            buffer.process_bytes(b"\n", true);
        }
        prop_assert!(buffer.size() <= limit);
    }

    #[test]
    fn styles_match_graphemes(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        // 任意位元組流經解碼與剖析後，每一行的樣式數都等於 grapheme 數
        let mut buffer = Buffer::default();
        buffer.process_bytes(&bytes, true);
        buffer.process_bytes(b"\n", true);
        for y in 0..buffer.size() {
            let line = buffer.line_record(y).unwrap();
            prop_assert_eq!(line.styles().len(), length_in_graphemes(line.text()));
        }
    }
}
