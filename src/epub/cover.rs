//! 封面处理模块
//!
//! 封面统一裁剪为书卡使用的比例，再缩放到固定尺寸保存在书籍目录中。

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::epub::reader::is_supported;
use crate::error::Result;

/// 封面宽度
pub const COVER_WIDTH: u32 = 248;
/// 封面高度
pub const COVER_HEIGHT: u32 = 360;

/// 删除目录中所有名为 `cover.*` 的旧封面
///
/// 书籍文件本身即使叫 `cover.epub` 也不会被删除。
pub fn remove_old_covers(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_cover = path
            .file_stem()
            .is_some_and(|stem| stem == "cover");
        if is_cover && path.is_file() && !is_supported(&path) {
            debug!(path = %path.display(), "删除旧封面");
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// 居中裁剪到目标宽高比，较长的一边两侧对称裁掉
pub fn crop_to_aspect(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = image.dimensions();
    let (src_w64, src_h64) = (src_w as u64, src_h as u64);
    let (width, height) = (width as u64, height as u64);

    if src_w64 * height > src_h64 * width {
        let crop_w = ((src_h64 * width / height) as u32).clamp(1, src_w);
        let x = (src_w - crop_w) / 2;
        image.crop_imm(x, 0, crop_w, src_h)
    } else {
        let crop_h = ((src_w64 * height / width) as u32).clamp(1, src_h);
        let y = (src_h - crop_h) / 2;
        image.crop_imm(0, y, src_w, crop_h)
    }
}

/// 解码封面，裁剪缩放后以原文件名保存到 `dir`
///
/// # 参数
/// * `dir` - 书籍备份目录
/// * `file_name` - 原封面的文件名
/// * `bytes` - 原封面的二进制内容
/// * `size` - 目标尺寸(宽, 高)
///
/// # 返回值
/// * `Result<PathBuf>` - 保存后的封面路径
pub fn save_cover(dir: &Path, file_name: &str, bytes: &[u8], size: (u32, u32)) -> Result<PathBuf> {
    let (width, height) = size;
    let decoded = image::load_from_memory(bytes)?;
    let resized = crop_to_aspect(&decoded, width, height).resize_exact(width, height, FilterType::Lanczos3);

    let mut path = dir.join(file_name);
    let format = match ImageFormat::from_path(&path) {
        Ok(format) if format.can_write() => format,
        _ => {
            path = dir.join("cover.png");
            ImageFormat::Png
        }
    };

    // JPEG不支持透明通道
    let resized = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => resized,
    };

    // 解码成功后才删除旧封面
    remove_old_covers(dir)?;
    resized.save_with_format(&path, format)?;

    debug!(path = %path.display(), width, height, "保存封面");
    Ok(path)
}
