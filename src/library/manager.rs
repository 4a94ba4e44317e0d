//! 书库管理器
//!
//! 书库根目录下的 `books/` 中，每个子目录对应一本书。
//! 管理器持有所有书籍以及"当前打开的书"，所有打开、关闭和翻页操作都经过这里。

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::epub::reader::{self, EpubReader};
use crate::error::{ReadpubError, Result};
use crate::library::book::{Book, OpenSlot};
use crate::library::id;
use crate::library::metadata::{Metadata, MetadataPatch, Status};

/// 存放书籍的子目录名
pub const BOOKS_DIR: &str = "books";

/// 主机上的默认用户名
pub fn default_identity() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// 书库管理器
#[derive(Debug)]
pub struct BookManager {
    datapath: PathBuf,
    books: HashMap<String, Book>,
    opened: OpenSlot,
    user: String,
    reader: EpubReader,
    max_id_attempts: usize,
}

impl BookManager {
    /// 使用默认配置打开书库
    ///
    /// # 参数
    /// * `datapath` - 书库根目录，必须是已存在的目录
    pub fn new<P: Into<PathBuf>>(datapath: P) -> Result<Self> {
        Self::with_config(datapath, &Config::default())
    }

    /// 使用指定配置打开书库
    pub fn with_config<P: Into<PathBuf>>(datapath: P, config: &Config) -> Result<Self> {
        let datapath = datapath.into();
        if !datapath.is_dir() {
            return Err(ReadpubError::NotADirectory(datapath));
        }

        let mut manager = Self {
            datapath,
            books: HashMap::new(),
            opened: OpenSlot::new(),
            user: default_identity(),
            reader: config.reader(),
            max_id_attempts: config.max_id_attempts,
        };
        manager.scan()?;
        Ok(manager)
    }

    /// 重新扫描 `books/` 目录，重建书籍注册表
    pub fn scan(&mut self) -> Result<()> {
        let books_path = self.books_path();
        if !books_path.exists() {
            fs::create_dir_all(&books_path)?;
        }

        let mut books = HashMap::new();
        for entry in fs::read_dir(&books_path)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "无法读取书籍目录项");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let book = Book::new(path, self.reader);
            books.insert(book.id().to_string(), book);
        }

        debug!(count = books.len(), "扫描书库");
        self.books = books;
        self.opened = OpenSlot::new();
        Ok(())
    }

    // === 访问器 ===

    pub fn datapath(&self) -> &Path {
        &self.datapath
    }

    pub fn books_path(&self) -> PathBuf {
        self.datapath.join(BOOKS_DIR)
    }

    pub fn books(&self) -> impl Iterator<Item = &Book> {
        self.books.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.books.keys().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.books.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Book> {
        self.books.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Book> {
        self.books.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// 当前打开的书籍ID
    pub fn opened_book(&self) -> Option<&str> {
        self.opened.holder()
    }

    /// 当前用户
    pub fn user(&self) -> &str {
        &self.user
    }

    fn book_mut(&mut self, id: &str) -> Result<&mut Book> {
        self.books
            .get_mut(id)
            .ok_or_else(|| ReadpubError::UnknownBook(id.to_string()))
    }

    // === 增删 ===

    /// 添加一本书
    ///
    /// 源文件被原样复制到 `books/<id>/`，并立即生成元数据。
    ///
    /// # 返回值
    /// * `Result<(String, Metadata)>` - 新书的ID和元数据
    pub fn add_book<P: AsRef<Path>>(&mut self, src: P) -> Result<(String, Metadata)> {
        let src = src.as_ref();
        if !src.is_file() {
            return Err(ReadpubError::NotFound(src.to_path_buf()));
        }
        if !reader::is_supported(src) {
            return Err(ReadpubError::UnsupportedFormat(src.display().to_string()));
        }
        let file_name = src
            .file_name()
            .ok_or_else(|| ReadpubError::NotFound(src.to_path_buf()))?;

        let id = self.get_new_id()?;
        let backup_path = self.books_path().join(&id);
        fs::create_dir(&backup_path)?;

        let result = fs::copy(src, backup_path.join(file_name))
            .map_err(ReadpubError::from)
            .and_then(|_| {
                let mut book = Book::new(&backup_path, self.reader);
                let metadata = book.get_metadata(&self.user)?;
                Ok((book, metadata))
            });

        match result {
            Ok((book, metadata)) => {
                info!(id = %id, title = %metadata.title, "添加书籍");
                self.books.insert(id.clone(), book);
                Ok((id, metadata))
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&backup_path) {
                    warn!(path = %backup_path.display(), error = %cleanup, "无法清理添加失败的书籍目录");
                }
                Err(e)
            }
        }
    }

    /// 修改书籍状态
    pub fn set_status(&mut self, id: &str, status: Status) -> Result<()> {
        let user = self.user.clone();
        self.book_mut(id)?
            .update_metadata(&MetadataPatch::new().status(status), &user)?;
        info!(id = %id, status = %status, "修改书籍状态");
        Ok(())
    }

    /// 移入回收站，书籍仍然保留在书库和磁盘上
    pub fn soft_delete(&mut self, id: &str) -> Result<()> {
        self.set_status(id, Status::Deleted)
    }

    /// 从回收站恢复
    pub fn recover(&mut self, id: &str) -> Result<()> {
        self.set_status(id, Status::Normal)
    }

    pub fn pin(&mut self, id: &str) -> Result<()> {
        self.set_status(id, Status::Pinned)
    }

    pub fn unpin(&mut self, id: &str) -> Result<()> {
        self.set_status(id, Status::Normal)
    }

    /// 彻底删除书籍及其目录，不可恢复
    ///
    /// ID不在书库中时什么也不做，目录已经不存在时也不会报错。
    pub fn hard_delete(&mut self, id: &str) -> Result<()> {
        let Some(book) = self.books.get(id) else {
            debug!(id = %id, "书籍不在书库中，跳过删除");
            return Ok(());
        };
        match fs::remove_dir_all(book.dir()) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.opened.release_if(id);
        self.books.remove(id);
        info!(id = %id, "彻底删除书籍");
        Ok(())
    }

    // === 查询 ===

    /// 查找元数据与所有给定字段都相等的书籍
    ///
    /// 无法读取元数据的书籍会被跳过。
    pub fn find(&mut self, criteria: &MetadataPatch) -> Vec<&Book> {
        let user = self.user.clone();
        let mut matched = Vec::new();
        for (id, book) in self.books.iter_mut() {
            match book.get_metadata(&user) {
                Ok(metadata) if metadata.matches(criteria) => matched.push(id.clone()),
                Ok(_) => {}
                Err(e) => warn!(id = %id, error = %e, "无法读取书籍元数据"),
            }
        }

        matched
            .iter()
            .filter_map(|id| self.books.get(id))
            .collect()
    }

    /// 书架上显示的书籍：不含回收站，置顶在前，其余按上传时间排序
    pub fn list(&mut self) -> Vec<&Book> {
        let mut books: Vec<&Book> = self
            .find(&MetadataPatch::new())
            .into_iter()
            .filter(|book| book.metadata().is_some_and(|m| m.status != Status::Deleted))
            .collect();

        books.sort_by(|a, b| {
            let (a, b) = (a.metadata(), b.metadata());
            let key = |m: Option<&Metadata>| {
                m.map(|m| (m.status != Status::Pinned, m.uploadtime.clone()))
            };
            key(a).cmp(&key(b))
        });
        books
    }

    // === ID ===

    /// 生成一个不与现有书籍冲突的ID
    pub fn get_new_id(&self) -> Result<String> {
        let attempts = self.max_id_attempts;
        id::allocate_id(|id| self.books.contains_key(id), attempts, id::widen_at(attempts))
    }

    // === 用户 ===

    /// 切换用户
    ///
    /// 目前只支持空用户名和空密码，即主机的默认用户。
    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        if !username.is_empty() {
            return Err(ReadpubError::LoginError(format!("不支持的用户: {username}")));
        }
        if !password.is_empty() {
            return Err(ReadpubError::LoginError("默认用户不需要密码".to_string()));
        }

        self.user = default_identity();
        info!(user = %self.user, "登录");
        Ok(())
    }

    // === 阅读 ===

    /// 加载书籍内容
    pub fn load_book(&mut self, id: &str) -> Result<()> {
        self.book_mut(id)?.load()
    }

    /// 释放书籍内容
    pub fn release_book(&mut self, id: &str) -> Result<()> {
        self.book_mut(id)?.release();
        Ok(())
    }

    /// 打开书籍
    pub fn open_book(&mut self, id: &str) -> Result<()> {
        let book = self
            .books
            .get_mut(id)
            .ok_or_else(|| ReadpubError::UnknownBook(id.to_string()))?;
        book.open(&mut self.opened)
    }

    /// 关闭书籍
    pub fn close_book(&mut self, id: &str) -> Result<()> {
        let book = self
            .books
            .get_mut(id)
            .ok_or_else(|| ReadpubError::UnknownBook(id.to_string()))?;
        book.close(&mut self.opened);
        Ok(())
    }

    pub fn turn_to_page(&mut self, id: &str, page: usize) -> Result<()> {
        self.book_mut(id)?.turn_to_page(page)
    }

    pub fn next_page(&mut self, id: &str) -> Result<()> {
        self.book_mut(id)?.next_page()
    }

    pub fn prev_page(&mut self, id: &str) -> Result<()> {
        self.book_mut(id)?.prev_page()
    }

    /// 把当前页码记录为阅读进度
    pub fn save_progress(&mut self, id: &str) -> Result<()> {
        let user = self.user.clone();
        let book = self.book_mut(id)?;
        let progress = book.current_progress().ok_or(ReadpubError::NotOpen)?;
        let patch = MetadataPatch {
            progress: Some(progress),
            ..MetadataPatch::default()
        };
        book.update_metadata(&patch, &user)
    }
}
