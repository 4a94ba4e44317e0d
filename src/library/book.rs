//! 书籍实体
//!
//! 一本书对应书库中的一个目录，目录名即书籍ID。
//! 目录中保存原始EPUB文件、裁剪后的封面以及元数据文件。

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::epub::reader::{self, ContentMap, EpubReader};
use crate::error::{ReadpubError, Result};
use crate::library::metadata::{Metadata, MetadataPatch, MetadataStore, Progress, Status};

/// 关闭状态下的页码
pub const CLOSED: i64 = -1;

/// 书库中"当前打开的书"
///
/// 整个书库同一时间最多只有一本书处于打开状态。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenSlot {
    holder: Option<String>,
}

impl OpenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前打开的书籍ID
    pub fn holder(&self) -> Option<&str> {
        self.holder.as_deref()
    }

    pub fn is_free(&self) -> bool {
        self.holder.is_none()
    }

    fn occupy(&mut self, id: &str) {
        self.holder = Some(id.to_string());
    }

    /// 只有当前持有者是 `id` 时才清空
    pub(crate) fn release_if(&mut self, id: &str) {
        if self.holder() == Some(id) {
            self.holder = None;
        }
    }
}

/// 书籍
#[derive(Debug)]
pub struct Book {
    id: String,
    dir: PathBuf,
    reader: EpubReader,
    store: MetadataStore,
    content: ContentMap,
    page: Option<usize>,
}

impl Book {
    /// 在已有的书籍目录上创建Book，不会读取任何文件
    pub fn new<P: Into<PathBuf>>(dir: P, reader: EpubReader) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let store = MetadataStore::new(&dir);

        Self {
            id,
            dir,
            reader,
            store,
            content: ContentMap::new(),
            page: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 书籍目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 目录中的EPUB备份文件
    pub fn backup_file(&self) -> Result<PathBuf> {
        reader::locate_book(&self.dir)
    }

    // === 元数据 ===

    /// 获取元数据，第一次调用时解析EPUB并写入元数据文件
    ///
    /// # 参数
    /// * `uploader` - 当前用户，仅在第一次物化时写入
    pub fn get_metadata(&mut self, uploader: &str) -> Result<Metadata> {
        let (dir, reader) = (&self.dir, self.reader);
        self.store
            .ensure_materialized(|| derive_metadata(dir, reader, uploader))
            .cloned()
    }

    /// 已缓存的元数据，不会触发解析
    pub fn metadata(&self) -> Option<&Metadata> {
        self.store.cached()
    }

    /// 合并部分字段并写入文件
    pub fn update_metadata(&mut self, patch: &MetadataPatch, uploader: &str) -> Result<()> {
        let (dir, reader) = (&self.dir, self.reader);
        self.store
            .update(patch, || derive_metadata(dir, reader, uploader))
    }

    /// 把当前元数据写回文件
    pub fn save_metadata(&mut self, uploader: &str) -> Result<()> {
        let (dir, reader) = (&self.dir, self.reader);
        self.store.save(|| derive_metadata(dir, reader, uploader))
    }

    /// 删除元数据文件，已缓存的元数据仍然有效
    pub fn del_metadata(&self) -> Result<()> {
        self.store.delete()
    }

    // === 内容 ===

    /// 读取全部内容到内存
    pub fn load(&mut self) -> Result<()> {
        if !self.content.is_empty() {
            return Err(ReadpubError::AlreadyLoaded);
        }
        self.content = self.reader.read(&self.dir)?;
        debug!(id = %self.id, parts = self.content.len(), "加载书籍内容");
        Ok(())
    }

    /// 释放内存中的内容，不影响页码
    pub fn release(&mut self) {
        self.content.clear();
    }

    pub fn is_loaded(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn content(&self) -> &ContentMap {
        &self.content
    }

    /// 脊柱中的部分数量
    pub fn page_count(&self) -> usize {
        self.content.len()
    }

    // === 打开与翻页 ===

    /// 打开书籍
    ///
    /// 需要先 `load()`，并且书库中没有其他打开的书。
    pub fn open(&mut self, slot: &mut OpenSlot) -> Result<()> {
        if self.content.is_empty() {
            return Err(ReadpubError::NotLoaded);
        }
        if let Some(holder) = slot.holder() {
            if holder != self.id {
                return Err(ReadpubError::AnotherBookOpen(holder.to_string()));
            }
        }
        if self.page.is_some() {
            return Err(ReadpubError::AlreadyOpen);
        }

        slot.occupy(&self.id);
        self.page = Some(0);
        debug!(id = %self.id, "打开书籍");
        Ok(())
    }

    /// 关闭书籍，同时释放书库的打开位置
    pub fn close(&mut self, slot: &mut OpenSlot) {
        self.page = None;
        slot.release_if(&self.id);
    }

    pub fn is_open(&self) -> bool {
        self.page.is_some()
    }

    /// 当前页码，关闭时为 `CLOSED`，超过 `i64::MAX` 时为 `i64::MAX`
    pub fn page(&self) -> i64 {
        self.page
            .map_or(CLOSED, |page| i64::try_from(page).unwrap_or(i64::MAX))
    }

    /// 翻到第 `page` 页，不检查页码上限
    pub fn turn_to_page(&mut self, page: usize) -> Result<()> {
        match self.page {
            Some(_) => {
                self.page = Some(page);
                Ok(())
            }
            None => Err(ReadpubError::NotOpen),
        }
    }

    pub fn next_page(&mut self) -> Result<()> {
        let page = self.page.ok_or(ReadpubError::NotOpen)?;
        self.turn_to_page(page.saturating_add(1))
    }

    /// 上一页，已经在第0页时停留在第0页
    pub fn prev_page(&mut self) -> Result<()> {
        let page = self.page.ok_or(ReadpubError::NotOpen)?;
        self.turn_to_page(page.saturating_sub(1))
    }

    /// 当前页对应的脊柱部分
    pub fn current_part(&self) -> Option<(&str, &[u8])> {
        self.page.and_then(|page| self.content.part(page))
    }

    /// 根据当前页码计算的阅读进度
    pub fn current_progress(&self) -> Option<Progress> {
        let page = self.page?;
        let total = self.page_count().max(1);
        Some(Progress(page as f64, total as f64))
    }
}

/// 从EPUB中派生出一条新的元数据记录
fn derive_metadata(dir: &Path, reader: EpubReader, uploader: &str) -> Result<Metadata> {
    let epub = reader.read_metadata(dir)?;

    Ok(Metadata {
        title: epub.title,
        author: epub.author,
        filepath: posix_path(&epub.filepath),
        coverpath: epub.coverpath.as_deref().map(posix_path).unwrap_or_default(),
        uploader: uploader.to_string(),
        uploadtime: Local::now().to_rfc3339(),
        status: Status::Normal,
        progress: Progress::default(),
    })
}

fn posix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
