use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::epub::cover::{self, COVER_HEIGHT, COVER_WIDTH};
use crate::epub::opf::Opf;
use crate::error::{ReadpubError, Result};

/// 目前支持的电子书扩展名
pub const SUPPORTED_EXTENSIONS: &[&str] = &["epub"];

/// 作者缺失时使用的默认值
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// 按脊柱顺序排列的书籍内容，键为脊柱项的idref
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMap {
    parts: Vec<(String, Vec<u8>)>,
}

impl ContentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: String, content: Vec<u8>) {
        self.parts.push((id, content));
    }

    /// 根据idref获取内容，重复的idref返回第一个
    pub fn get(&self, id: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(part_id, _)| part_id == id)
            .map(|(_, content)| content.as_slice())
    }

    /// 按阅读顺序获取第 `index` 个部分
    pub fn part(&self, index: usize) -> Option<(&str, &[u8])> {
        self.parts
            .get(index)
            .map(|(id, content)| (id.as_str(), content.as_slice()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts
            .iter()
            .map(|(id, content)| (id.as_str(), content.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }
}

/// 仅读取元数据时的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpubMetadata {
    pub title: String,
    pub author: String,
    /// 书籍文件本身的路径
    pub filepath: PathBuf,
    /// 裁剪缩放后的封面路径，没有封面时为None
    pub coverpath: Option<PathBuf>,
}

/// EPUB文件读取器
///
/// 读取器本身不持有任何文件，每次调用都会重新打开压缩包。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpubReader {
    cover_size: (u32, u32),
}

impl Default for EpubReader {
    fn default() -> Self {
        Self {
            cover_size: (COVER_WIDTH, COVER_HEIGHT),
        }
    }
}

impl EpubReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定封面的目标尺寸
    pub fn with_cover_size(mut self, width: u32, height: u32) -> Self {
        self.cover_size = (width.max(1), height.max(1));
        self
    }

    pub fn cover_size(&self) -> (u32, u32) {
        self.cover_size
    }

    /// 读取全部内容
    ///
    /// # 参数
    /// * `path` - epub文件路径，或包含epub文件的目录
    ///
    /// # 返回值
    /// * `Result<ContentMap>` - 按脊柱顺序排列的内容，找不到的部分为空字节
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<ContentMap> {
        let book_path = locate_book(path.as_ref())?;
        let mut epub = Epub::new(&book_path)?;
        let opf = epub.parse_opf()?;
        let opf_dir = epub.opf_directory();

        let mut content = ContentMap::new();
        for item in &opf.spine {
            let bytes = match opf.href_of(&item.idref) {
                Some(href) => {
                    let full_path = resolve_href(&opf_dir, href);
                    match epub.extract_binary_file(&full_path)? {
                        Some(bytes) => bytes,
                        None => {
                            warn!(idref = %item.idref, path = %full_path, "脊柱项指向的文件不存在");
                            Vec::new()
                        }
                    }
                }
                None => {
                    warn!(idref = %item.idref, "脊柱项不在清单中");
                    Vec::new()
                }
            };
            content.push(item.idref.clone(), bytes);
        }

        debug!(path = %book_path.display(), parts = content.len(), "读取书籍内容");
        Ok(content)
    }

    /// 只读取元数据，并把封面裁剪缩放后保存到书籍所在目录
    pub fn read_metadata<P: AsRef<Path>>(&self, path: P) -> Result<EpubMetadata> {
        let book_path = locate_book(path.as_ref())?;
        let mut epub = Epub::new(&book_path)?;
        let opf = epub.parse_opf()?;

        let title = match opf.metadata.title() {
            Some(title) => title.to_string(),
            None => file_stem(&book_path),
        };
        let author = opf
            .metadata
            .creator()
            .unwrap_or(UNKNOWN_AUTHOR)
            .to_string();

        let coverpath = match opf.cover_href() {
            Some(href) => {
                let full_path = resolve_href(&epub.opf_directory(), href);
                match epub.extract_binary_file(&full_path)? {
                    Some(bytes) => {
                        let dir = book_path.parent().unwrap_or_else(|| Path::new("."));
                        let file_name = href.rsplit('/').next().unwrap_or(href);
                        Some(cover::save_cover(dir, file_name, &bytes, self.cover_size)?)
                    }
                    None => {
                        warn!(path = %full_path, "封面文件不存在");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(EpubMetadata {
            title,
            author,
            filepath: book_path,
            coverpath,
        })
    }
}

/// 找到实际的书籍文件
///
/// 如果 `path` 是目录，返回其中（按文件名排序）第一个受支持格式的文件，
/// 没有时返回 `NotFound`。
pub fn locate_book(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(ReadpubError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|entry| entry.is_file() && is_supported(entry))
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ReadpubError::NotFound(path.to_path_buf()))
}

/// 检查扩展名是否为受支持的电子书格式
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// 将清单中的href解析为压缩包内的完整路径
///
/// 每个 `../` 向上一级目录，`./` 和空段被忽略。
pub fn resolve_href(opf_dir: &str, href: &str) -> String {
    let mut segments: Vec<&str> = opf_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "" | "." => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// 打开的EPUB压缩包
struct Epub {
    archive: ZipArchive<File>,
    opf_path: String,
}

impl Epub {
    fn new(path: &Path) -> Result<Epub> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file).map_err(|e| {
            ReadpubError::UnsupportedFormat(format!("{}: {}", path.display(), e))
        })?;

        let opf_path = first_opf_by_index(&archive);

        match opf_path {
            Some(opf_path) => Ok(Epub { archive, opf_path }),
            None => Err(ReadpubError::UnsupportedFormat(format!(
                "缺少OPF包文件: {}",
                path.display()
            ))),
        }
    }

    /// 提取指定文件的二进制内容，文件不存在时返回None
    fn extract_binary_file(&mut self, filename: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(filename) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn parse_opf(&mut self) -> Result<Opf> {
        let opf_path = self.opf_path.clone();
        let bytes = self.extract_binary_file(&opf_path)?.unwrap_or_default();
        let opf_content = String::from_utf8_lossy(&bytes);

        Opf::parse_xml(&opf_content).map_err(|e| match e {
            ReadpubError::Xml(xml_err) => {
                ReadpubError::UnsupportedFormat(format!("OPF解析错误 {}: {}", opf_path, xml_err))
            }
            other => other,
        })
    }

    /// 获取OPF文件所在的目录
    fn opf_directory(&self) -> String {
        match self.opf_path.rfind('/') {
            Some(index) => self.opf_path[..index].to_string(),
            None => String::new(),
        }
    }
}

/// 按压缩包内的顺序找到第一个 `.opf` 条目
fn first_opf_by_index(archive: &ZipArchive<File>) -> Option<String> {
    (0..archive.len())
        .filter_map(|index| archive.name_for_index(index))
        .find(|name| name.ends_with(".opf"))
        .map(str::to_string)
}
