//! 配置模块
//!
//! 配置保存为YAML文件，缺少的字段使用默认值。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::epub::cover::{COVER_HEIGHT, COVER_WIDTH};
use crate::epub::reader::EpubReader;
use crate::error::{ReadpubError, Result};
use crate::library::id::DEFAULT_ATTEMPTS;

/// 配置文件名
pub const CONFIG_FILE: &str = "config.yaml";

/// 应用目录名
pub const APP_DIR: &str = "readpub";

/// 书库目录名
pub const DATA_DIR: &str = "ReadPub";

/// 书库配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 书库根目录，未设置时使用系统数据目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datapath: Option<PathBuf>,
    /// 生成书籍ID的最大尝试次数
    pub max_id_attempts: usize,
    /// 封面宽度
    pub cover_width: u32,
    /// 封面高度
    pub cover_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datapath: None,
            max_id_attempts: DEFAULT_ATTEMPTS,
            cover_width: COVER_WIDTH,
            cover_height: COVER_HEIGHT,
        }
    }
}

impl Config {
    /// 默认配置文件路径：`<系统配置目录>/readpub/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// 从配置文件中加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ReadpubError::Config(format!("无法读取配置文件: {}", e)))?;

        serde_yml::from_str(&content)
            .map_err(|e| ReadpubError::Config(format!("配置文件格式错误: {}", e)))
    }

    /// 生成默认配置文件
    pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml_content = serde_yml::to_string(&Self::default())
            .map_err(|e| ReadpubError::Config(format!("序列化配置失败: {}", e)))?;

        let content_with_header = format!(
            "# readpub 配置文件\n# datapath: 书库根目录，不填则使用系统数据目录\n# max_id_attempts: 生成书籍ID的最大尝试次数\n# cover_width/cover_height: 封面尺寸\n\n{}",
            yaml_content
        );

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ReadpubError::Config(format!("创建配置目录失败: {}", e)))?;
        }
        fs::write(path, content_with_header)
            .map_err(|e| ReadpubError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    /// 配置文件存在时加载，不存在时先生成默认配置
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        if let Err(e) = Self::generate_default_config(path) {
            warn!(path = %path.display(), error = %e, "无法生成默认配置文件");
        }
        Ok(Self::default())
    }

    /// 按配置创建EPUB读取器
    pub fn reader(&self) -> EpubReader {
        EpubReader::new().with_cover_size(self.cover_width, self.cover_height)
    }
}

/// 书库目录的检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPathStatus {
    Ok,
    /// 目录不存在且无法创建
    MkdirFailed,
    /// 路径存在但不是目录
    NotADir,
}

/// 默认书库目录：`<系统本地数据目录>/ReadPub`
pub fn default_datapath() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR)
}

/// 获取书库目录，不存在时尝试创建
///
/// # 返回值
/// * `(PathBuf, DataPathStatus)` - 目录路径和检查结果
pub fn get_datapath(datapath: Option<PathBuf>) -> (PathBuf, DataPathStatus) {
    let datapath = datapath.unwrap_or_else(default_datapath);
    if !datapath.exists() {
        if let Err(e) = fs::create_dir_all(&datapath) {
            warn!(path = %datapath.display(), error = %e, "无法创建书库目录");
            return (datapath, DataPathStatus::MkdirFailed);
        }
    } else if !datapath.is_dir() {
        return (datapath, DataPathStatus::NotADir);
    }
    (datapath, DataPathStatus::Ok)
}
