pub mod cover;
pub mod opf;
pub mod reader;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

// 重新导出EPUB读取器
pub use reader::{ContentMap, EpubMetadata, EpubReader, SUPPORTED_EXTENSIONS, UNKNOWN_AUTHOR};

// 重新导出OPF相关
pub use opf::{ManifestItem, Opf, PackageMetadata, SpineItem};
