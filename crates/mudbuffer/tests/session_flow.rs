//! 完整工作階段的整合測試
//!
//! 以貼近真實連線的情境驗證整條管線：封包在字元與跳脫序列中間
//! 被切斷、提示列與本地回顯交錯、超連結點擊、換行縮排、日誌
//! 補寫與去重。

use std::env;
use std::fs;
use std::path::PathBuf;

use mudbuffer::{
    is_hidden_nibble, Buffer, BufferConfig, Cursor, LogFormat, Profile, Rgb, SessionLogger,
    SourceFlags, TextEncoding, NO_LINK,
};

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("mudbuffer_flow_{}_{}.log", name, std::process::id()))
}

#[test]
fn test_big5_session_with_split_packets() {
    // 封包在 SGR 序列與 Big5 雙位元組字元中間被切斷
    let config = BufferConfig {
        encoding: TextEncoding::Big5,
        ..Default::default()
    };
    let mut buffer = Buffer::new(config, Profile::default());
    buffer.process_bytes(&[0x1B, b'[', b'3'], true);
    buffer.process_bytes(&[b'1', b'm', 0xA7], true);
    buffer.process_bytes(&[0x41, 0xA6, 0x6E, 0x1B, b'[', b'0', b'm', b'\r', b'\n'], true);
    assert_eq!(buffer.line(0), Some("你好"));
    let line = buffer.line_record(0).unwrap();
    assert_eq!(line.style(0).unwrap().fg(), Rgb::new(187, 0, 0));
    assert_eq!(line.style(1).unwrap().fg(), Rgb::new(187, 0, 0));
}

#[test]
fn test_prompt_then_echo_interleave() {
    let mut buffer = Buffer::default();
    buffer.process_bytes(b"HP: 100/100> ", true);
    assert_eq!(buffer.size(), 0);
    assert_eq!(buffer.pending_line(), "HP: 100/100> ");
    assert!(buffer.flush_prompt());
    buffer.process_bytes(b"look\n", false);
    assert_eq!(buffer.size(), 2);
    assert!(buffer.line_record(0).unwrap().is_prompt());
    let echo = buffer.line_record(1).unwrap();
    assert!(echo.style(0).unwrap().source().contains(SourceFlags::ECHO));
    assert!(!buffer
        .line_record(0)
        .unwrap()
        .style(0)
        .unwrap()
        .source()
        .contains(SourceFlags::ECHO));
}

#[test]
fn test_osc8_link_clickthrough() {
    let mut buffer = Buffer::default();
    buffer.process_bytes(b"\x1b]8;;go north\x07[north exit]\x1b]8;;\x07 ahead\n", true);
    let line = buffer.line_record(0).unwrap();
    assert_eq!(line.text(), "[north exit] ahead");
    let id = line.style(0).unwrap().link();
    assert_ne!(id, NO_LINK);
    assert_eq!(buffer.link(id).unwrap().commands[0], "go north");
    // 連結關閉後的文字不帶標記
    assert_eq!(line.style(line.len() - 1).unwrap().link(), NO_LINK);
}

#[test]
fn test_wrap_with_indent_on_room_description() {
    let config = BufferConfig {
        wrap_at: 20,
        wrap_indent: 2,
        ..Default::default()
    };
    let mut buffer = Buffer::new(config, Profile::default());
    buffer.process_bytes(
        b"The market square bustles with traders from distant lands selling wares\n",
        true,
    );
    assert!(buffer.size() > 1);
    assert!(!buffer.line_record(0).unwrap().is_wrapped());
    for y in 0..buffer.size() {
        let line = buffer.line(y).unwrap();
        if y > 0 {
            // 續行以兩個縮排空白開頭並帶續行標記
            assert!(line.starts_with("  "), "line {}: {:?}", y, line);
            assert!(!line[2..].starts_with(' '));
            assert!(buffer.line_record(y).unwrap().is_wrapped());
        }
    }
}

#[test]
fn test_encoding_switch_discards_partial_char() {
    let mut buffer = Buffer::default();
    // UTF-8 的「好」只送出前兩個位元組
    buffer.process_bytes(&[0xE5, 0xA5], true);
    assert!(buffer.set_encoding("Big5"));
    buffer.process_bytes(b"abc\n", true);
    assert_eq!(buffer.line(0), Some("abc"));
}

#[test]
fn test_local_echo_never_holds_bytes() {
    let config = BufferConfig {
        encoding: TextEncoding::Gbk,
        ..Default::default()
    };
    let mut buffer = Buffer::new(config, Profile::default());
    // 本地路徑結尾的不完整字元立即以隱藏碼位跳脫
    buffer.process_bytes(&[0xC4], false);
    assert_eq!(buffer.pending_line().chars().count(), 2);
    assert!(buffer.pending_line().chars().all(is_hidden_nibble));
}

#[test]
fn test_copy_cut_paste_between_buffers() {
    let mut source = Buffer::default();
    source.process_bytes(b"\x1b[33mgold coin\x1b[0m on the floor\n", true);
    let slice = source.copy(Cursor::new(0, 0), Cursor::new(0, 9));
    assert_eq!(slice.lines()[0].text(), "gold coin");

    // 貼在行中間會把該行切開併入
    let mut target = Buffer::default();
    target.process_bytes(b"<>\n", true);
    assert!(target.paste(Cursor::new(0, 1), &slice));
    assert_eq!(target.line(0), Some("<gold coin>"));
    assert_eq!(
        target.line_record(0).unwrap().style(1).unwrap().fg(),
        Rgb::new(187, 187, 0)
    );

    // 貼在結尾則附加為新行
    let end = target.end_pos();
    assert!(target.paste(end, &slice));
    assert_eq!(target.line(1), Some("gold coin"));

    let cut = source.cut(Cursor::new(0, 0), Cursor::new(0, 10));
    assert_eq!(cut.lines()[0].text(), "gold coin ");
    assert_eq!(source.line(0), Some("on the floor"));
}

#[test]
fn test_html_log_dedupes_lines() {
    let path = temp_path("html");
    let _ = fs::remove_file(&path);
    let mut logger = SessionLogger::new(&path).with_format(LogFormat::Html);
    logger.start().unwrap();

    let mut buffer = Buffer::default();
    buffer.process_bytes(b"\x1b[31mdanger\x1b[0m ahead\n", true);
    buffer.log_remaining_output(&mut logger).unwrap();
    // 沒有新內容時重複呼叫不得重寫
    buffer.log_remaining_output(&mut logger).unwrap();
    buffer.process_bytes(b"second line\n", true);
    buffer.log_remaining_output(&mut logger).unwrap();
    logger.stop().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("danger").count(), 1);
    assert_eq!(content.matches("second line").count(), 1);
    assert!(content.contains("color: #bb0000"));
    assert!(content.starts_with("<!DOCTYPE html>"));
    let _ = fs::remove_file(&path);
}

#[test]
fn test_plain_log_with_timestamps() {
    let path = temp_path("plain");
    let _ = fs::remove_file(&path);
    let mut logger = SessionLogger::new(&path);
    logger.set_timestamps(true);
    logger.start().unwrap();

    let mut buffer = Buffer::default();
    buffer.process_bytes(b"a quiet evening\n", true);
    let time = buffer.line_record(0).unwrap().time().to_string();
    buffer.log_remaining_output(&mut logger).unwrap();
    logger.stop().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains(&format!("{}a quiet evening", time)));
    let _ = fs::remove_file(&path);
}

#[test]
fn test_log_survives_eviction() {
    let path = temp_path("evict");
    let _ = fs::remove_file(&path);
    let mut logger = SessionLogger::new(&path);
    logger.start().unwrap();

    let config = BufferConfig {
        wrap_at: 0,
        lines_limit: 4,
        batch_delete_size: 2,
        ..Default::default()
    };
    let mut buffer = Buffer::new(config, Profile::default());
    for i in 0..3 {
        buffer.process_bytes(format!("early{}\n", i).as_bytes(), true);
    }
    buffer.log_remaining_output(&mut logger).unwrap();
    for i in 0..6 {
        buffer.process_bytes(format!("late{}\n", i).as_bytes(), true);
    }
    buffer.log_remaining_output(&mut logger).unwrap();
    logger.stop().unwrap();

    let content = fs::read_to_string(&path).unwrap();
    // 淘汰打斷水位後，仍在緩衝區內的行會被補寫，已寫過的不重複
    assert_eq!(content.matches("early0").count(), 1);
    assert_eq!(content.matches("early2").count(), 1);
    for i in 3..6 {
        assert_eq!(content.matches(&format!("late{}", i)).count(), 1);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn test_search_across_session() {
    let mut buffer = Buffer::default();
    buffer.process_bytes(b"You see 3 goblins.\nA goblin strikes you!\n", true);
    let pattern = regex::Regex::new(r"goblins?").unwrap();
    let matches = buffer.search(&pattern, 0, 1);
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].begin.line, 0);
    assert_eq!(matches[1].begin.line, 1);
    let text = buffer
        .text_range(matches[1].begin, matches[1].end)
        .unwrap();
    assert_eq!(text, "goblin");
}
