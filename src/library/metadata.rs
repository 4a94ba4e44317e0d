//! 书籍元数据模块
//!
//! 每本书的元数据保存在书籍目录下的 `metadata.yaml` 中。
//! 第一次读取时从EPUB中解析并写入，之后一律以该文件为准。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::{ReadpubError, Result};

/// 元数据文件名
pub const METADATA_FILE: &str = "metadata.yaml";

/// 书籍在书库中的状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Normal,
    Deleted,
    Pinned,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::Deleted => "deleted",
            Status::Pinned => "pinned",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Status::Normal),
            "deleted" => Ok(Status::Deleted),
            "pinned" => Ok(Status::Pinned),
            other => Err(format!("未知的状态: {other}")),
        }
    }
}

/// 阅读进度 (当前页, 总页数)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress(pub f64, pub f64);

impl Default for Progress {
    fn default() -> Self {
        Progress(0.0, 1.0)
    }
}

impl Progress {
    pub fn current(&self) -> f64 {
        self.0
    }

    pub fn total(&self) -> f64 {
        self.1
    }

    /// 已读比例，限制在 `[0, 1]`
    pub fn ratio(&self) -> f64 {
        if self.1 <= 0.0 {
            return 0.0;
        }
        (self.0 / self.1).clamp(0.0, 1.0)
    }

    /// 书卡上显示的进度文字
    pub fn label(&self) -> String {
        if self.0 <= 0.0 {
            "未读".to_string()
        } else if self.0 >= self.1 {
            "已读完".to_string()
        } else {
            format!("已读 {:.1}%", self.ratio() * 100.0)
        }
    }
}

/// 一本书的元数据记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    /// 备份文件路径，使用 `/` 分隔
    pub filepath: String,
    /// 封面路径，没有封面时为空
    pub coverpath: String,
    pub uploader: String,
    pub uploadtime: String,
    pub status: Status,
    pub progress: Progress,
}

impl Metadata {
    /// 把补丁中给出的字段合并到当前记录
    pub fn apply(&mut self, patch: &MetadataPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(author) = &patch.author {
            self.author = author.clone();
        }
        if let Some(filepath) = &patch.filepath {
            self.filepath = filepath.clone();
        }
        if let Some(coverpath) = &patch.coverpath {
            self.coverpath = coverpath.clone();
        }
        if let Some(uploader) = &patch.uploader {
            self.uploader = uploader.clone();
        }
        if let Some(uploadtime) = &patch.uploadtime {
            self.uploadtime = uploadtime.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
    }

    /// 补丁中给出的每个字段都与记录相等时返回true
    pub fn matches(&self, criteria: &MetadataPatch) -> bool {
        fn eq<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().is_none_or(|wanted| wanted == actual)
        }

        eq(&criteria.title, &self.title)
            && eq(&criteria.author, &self.author)
            && eq(&criteria.filepath, &self.filepath)
            && eq(&criteria.coverpath, &self.coverpath)
            && eq(&criteria.uploader, &self.uploader)
            && eq(&criteria.uploadtime, &self.uploadtime)
            && eq(&criteria.status, &self.status)
            && eq(&criteria.progress, &self.progress)
    }
}

/// 元数据的部分更新，也用作查询条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub filepath: Option<String>,
    pub coverpath: Option<String>,
    pub uploader: Option<String>,
    pub uploadtime: Option<String>,
    pub status: Option<Status>,
    pub progress: Option<Progress>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn uploader(mut self, uploader: impl Into<String>) -> Self {
        self.uploader = Some(uploader.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, current: f64, total: f64) -> Self {
        self.progress = Some(Progress(current, total));
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// 元数据的缓存与持久化
///
/// 内存缓存优先，其次是元数据文件，两者都没有时才调用派生函数并写入文件。
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
    cached: Option<Metadata>,
}

impl MetadataStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(METADATA_FILE),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cached(&self) -> Option<&Metadata> {
        self.cached.as_ref()
    }

    /// 确保元数据已经物化，返回权威版本
    pub fn ensure_materialized<F>(&mut self, derive: F) -> Result<&Metadata>
    where
        F: FnOnce() -> Result<Metadata>,
    {
        let metadata = match self.cached.take() {
            Some(metadata) => metadata,
            None if self.path.exists() => {
                debug!(path = %self.path.display(), "读取元数据文件");
                self.load()?
            }
            None => {
                let metadata = derive()?;
                self.write(&metadata)?;
                debug!(path = %self.path.display(), "写入新的元数据文件");
                metadata
            }
        };
        Ok(self.cached.insert(metadata))
    }

    /// 合并补丁并持久化
    pub fn update<F>(&mut self, patch: &MetadataPatch, derive: F) -> Result<()>
    where
        F: FnOnce() -> Result<Metadata>,
    {
        let mut metadata = self.ensure_materialized(derive)?.clone();
        metadata.apply(patch);
        self.write(&metadata)?;
        self.cached = Some(metadata);
        Ok(())
    }

    /// 把当前记录写回文件
    pub fn save<F>(&mut self, derive: F) -> Result<()>
    where
        F: FnOnce() -> Result<Metadata>,
    {
        let metadata = self.ensure_materialized(derive)?.clone();
        self.write(&metadata)
    }

    /// 删除元数据文件，内存缓存保持不变
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Result<Metadata> {
        let content = fs::read_to_string(&self.path)?;
        Ok(serde_yml::from_str(&content)?)
    }

    /// 先写临时文件再重命名，避免留下写了一半的元数据
    fn write(&self, metadata: &Metadata) -> Result<()> {
        let content = serde_yml::to_string(metadata)?;
        let tmp_path = self.path.with_extension("yaml.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ReadpubError::Storage(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn sample() -> Metadata {
        Metadata {
            title: "呐喊".to_string(),
            author: "鲁迅".to_string(),
            filepath: "/library/books/abc/nahan.epub".to_string(),
            coverpath: String::new(),
            uploader: "reader".to_string(),
            uploadtime: "2024-05-01T12:00:00+08:00".to_string(),
            status: Status::Normal,
            progress: Progress(0.0, 1.0),
        }
    }

    #[test]
    fn test_progress_label() {
        assert_eq!(Progress(0.0, 10.0).label(), "未读");
        assert_eq!(Progress(2.5, 10.0).label(), "已读 25.0%");
        assert_eq!(Progress(10.0, 10.0).label(), "已读完");
        assert_eq!(Progress(3.0, 0.0).ratio(), 0.0);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("pinned".parse::<Status>(), Ok(Status::Pinned));
        assert!("archived".parse::<Status>().is_err());
        assert_eq!(Status::Deleted.to_string(), "deleted");
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut metadata = sample();
        metadata.progress = Progress(12.0, 345.5);
        metadata.status = Status::Pinned;

        let yaml = serde_yml::to_string(&metadata).unwrap();
        assert!(yaml.contains("status: pinned"));
        let parsed: Metadata = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_apply_patch() {
        let mut metadata = sample();
        metadata.apply(&MetadataPatch::new().status(Status::Deleted).progress(3.0, 9.0));

        assert_eq!(metadata.status, Status::Deleted);
        assert_eq!(metadata.progress, Progress(3.0, 9.0));
        assert_eq!(metadata.title, "呐喊");

        let before = metadata.clone();
        metadata.apply(&MetadataPatch::new());
        assert_eq!(metadata, before);
    }

    #[test]
    fn test_matches() {
        let metadata = sample();
        assert!(metadata.matches(&MetadataPatch::new()));
        assert!(metadata.matches(&MetadataPatch::new().status(Status::Normal).author("鲁迅")));
        assert!(!metadata.matches(&MetadataPatch::new().status(Status::Normal).author("鲁")));
    }

    #[test]
    fn test_materialize_once() {
        let dir = TempDir::new().unwrap();
        let mut store = MetadataStore::new(dir.path());
        let calls = Cell::new(0);
        let derive = || {
            calls.set(calls.get() + 1);
            Ok(sample())
        };

        let first = store.ensure_materialized(derive).unwrap().clone();
        assert!(store.path().exists());

        // 删除文件后仍然返回缓存，并且不会再次写入
        store.delete().unwrap();
        let second = store.ensure_materialized(derive).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(calls.get(), 1);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_existing_file_is_authoritative() {
        let dir = TempDir::new().unwrap();
        let mut edited = sample();
        edited.status = Status::Pinned;
        fs::write(dir.path().join(METADATA_FILE), serde_yml::to_string(&edited).unwrap()).unwrap();

        let mut store = MetadataStore::new(dir.path());
        let metadata = store
            .ensure_materialized(|| panic!("不应重新解析EPUB"))
            .unwrap();
        assert_eq!(metadata, &edited);
    }

    #[test]
    fn test_update_persists() {
        let dir = TempDir::new().unwrap();
        let mut store = MetadataStore::new(dir.path());
        store
            .update(&MetadataPatch::new().status(Status::Deleted), || Ok(sample()))
            .unwrap();

        let mut reopened = MetadataStore::new(dir.path());
        let metadata = reopened.ensure_materialized(|| Ok(sample())).unwrap();
        assert_eq!(metadata.status, Status::Deleted);
        assert_eq!(metadata.title, "呐喊");
        assert!(!dir.path().join("metadata.yaml.tmp").exists());
    }

    #[test]
    fn test_derive_failure_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = MetadataStore::new(dir.path());
        let result = store.ensure_materialized(|| Err(ReadpubError::UnsupportedFormat("坏文件".to_string())));

        assert!(result.is_err());
        assert!(!store.path().exists());
        assert!(store.cached().is_none());
    }

    #[test]
    fn test_delete_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path());
        assert!(store.delete().is_ok());
    }
}
