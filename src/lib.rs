pub mod config;
pub mod epub;
pub mod error;
pub mod library;

// === 核心API重新导出 ===

/// 书库管理器（主要接口）
pub use library::{Book, BookManager, OpenSlot};

/// 错误处理
pub use error::{ReadpubError, Result};

// === 数据结构 ===

/// 书籍元数据
pub use library::{Metadata, MetadataPatch, MetadataStore, Progress, Status};

/// EPUB读取
pub use epub::{ContentMap, EpubMetadata, EpubReader};

/// 配置
pub use config::{Config, DataPathStatus, get_datapath};

// === 库信息 ===

/// readpub库的版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// readpub库的描述
pub const DESCRIPTION: &str = "一个管理EPUB电子书的个人书库";

/// 库的主页
pub const HOMEPAGE: &str = "https://github.com/Chitaoji/readpub";

// === 便捷函数 ===

/// 打开书库
///
/// 这是 `BookManager::new` 的便捷包装函数。
///
/// # 示例
///
/// ```no_run
/// let mut library = readpub::open("/path/to/library")?;
/// let (id, metadata) = library.add_book("book.epub")?;
/// println!("{}: {}", id, metadata.title);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open<P: Into<std::path::PathBuf>>(datapath: P) -> Result<BookManager> {
    BookManager::new(datapath)
}
