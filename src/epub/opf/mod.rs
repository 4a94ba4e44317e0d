//! OPF（Open Packaging Format）包文件解析模块
//!
//! 此模块负责解析EPUB中的包文件，提取清单、脊柱以及书库需要的少量元数据。

mod manifest;
mod metadata;
mod parser;
mod spine;

pub use manifest::ManifestItem;
pub use metadata::PackageMetadata;
pub use parser::Opf;
pub use spine::SpineItem;
