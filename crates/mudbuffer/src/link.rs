//! 超鏈結表模組
//!
//! 儲存緩衝區文字所指向的鏈結資料（命令列表、提示文字、腳本參考）。
//! 編號從 1 開始遞增且永不重用，字元上的鏈結編號在緩衝區存活期間
//! 始終可以查回條目，即使該行已被淘汰。

use crate::style::{LinkId, NO_LINK};

/// 單一鏈結條目
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkEntry {
    /// 是否為常駐鏈結（不隨畫面更新失效）
    pub permanent: bool,
    /// 點擊時可執行的命令列表
    pub commands: Vec<String>,
    /// 對應每個命令的提示文字
    pub hints: Vec<String>,
    /// 腳本回呼參考（由外部腳本層解讀，本模組只保存）
    pub script_refs: Vec<i64>,
}

/// 鏈結表
///
/// # Example
/// ```
/// use mudbuffer::link::{LinkEntry, LinkStore};
///
/// let mut store = LinkStore::new();
/// let id = store.add(LinkEntry {
///     commands: vec!["look door".to_string()],
///     ..Default::default()
/// });
/// assert_eq!(id, 1);
/// assert!(store.get(id).is_some());
/// assert!(store.get(0).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LinkStore {
    entries: Vec<LinkEntry>,
}

impl LinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登錄新條目並回傳分配到的編號
    pub fn add(&mut self, entry: LinkEntry) -> LinkId {
        self.entries.push(entry);
        self.entries.len() as LinkId
    }

    /// 查詢條目；編號 0 與未分配過的編號回傳 `None`
    pub fn get(&self, id: LinkId) -> Option<&LinkEntry> {
        if id == NO_LINK {
            return None;
        }
        self.entries.get(id as usize - 1)
    }

    pub fn get_mut(&mut self, id: LinkId) -> Option<&mut LinkEntry> {
        if id == NO_LINK {
            return None;
        }
        self.entries.get_mut(id as usize - 1)
    }

    /// 目前已分配的最大編號（尚未分配時為 0）
    pub fn last_id(&self) -> LinkId {
        self.entries.len() as LinkId
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
