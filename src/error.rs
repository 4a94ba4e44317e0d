use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReadpubError>;

/// 书库相关的错误类型
#[derive(Error, Debug)]
pub enum ReadpubError {
    #[error("找不到文件或目录: {0}")]
    NotFound(PathBuf),

    #[error("不是目录: {0}")]
    NotADirectory(PathBuf),

    #[error("不支持的电子书格式: {0}")]
    UnsupportedFormat(String),

    #[error("书籍内容已加载，请先调用release()")]
    AlreadyLoaded,

    #[error("书籍内容尚未加载")]
    NotLoaded,

    #[error("书籍已经打开")]
    AlreadyOpen,

    #[error("另一本书已经打开: {0}")]
    AnotherBookOpen(String),

    #[error("书籍尚未打开")]
    NotOpen,

    #[error("尝试{0}次后仍无法生成可用的书籍ID")]
    IdExhausted(usize),

    #[error("登录失败: {0}")]
    LoginError(String),

    #[error("书库中没有这本书: {0}")]
    UnknownBook(String),

    #[error("存储错误: {0}")]
    Storage(#[from] io::Error),

    #[error("Zip文件错误: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML解析错误: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("图片处理错误: {0}")]
    Image(#[from] image::ImageError),

    #[error("元数据文件格式错误: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("配置文件错误: {0}")]
    Config(String),
}
