//! 测试用的EPUB构造器

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::FileOptions;

/// 按需拼装一个最小的EPUB文件
pub struct EpubFixture {
    title: Option<String>,
    creator: Option<String>,
    manifest: Vec<(String, String, String)>,
    spine: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
    cover_id: Option<String>,
    with_opf: bool,
}

impl EpubFixture {
    pub fn new() -> Self {
        Self {
            title: None,
            creator: None,
            manifest: Vec::new(),
            spine: Vec::new(),
            files: Vec::new(),
            cover_id: None,
            with_opf: true,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_string());
        self
    }

    /// 添加一个章节：清单项、脊柱项和文件
    pub fn chapter(mut self, id: &str, href: &str, text: &str) -> Self {
        let xhtml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title>{text}</title></head>
<body><h1>{text}</h1><p>这是{text}的内容。</p></body>
</html>"#
        );
        self.manifest.push((id.to_string(), href.to_string(), "application/xhtml+xml".to_string()));
        self.spine.push(id.to_string());
        self.files.push((format!("OEBPS/{href}"), xhtml.into_bytes()));
        self
    }

    /// 清单和脊柱中存在，但压缩包里没有文件
    pub fn dangling(mut self, id: &str, href: &str) -> Self {
        self.manifest.push((id.to_string(), href.to_string(), "application/xhtml+xml".to_string()));
        self.spine.push(id.to_string());
        self
    }

    /// 只在脊柱中出现的idref
    pub fn spine_only(mut self, id: &str) -> Self {
        self.spine.push(id.to_string());
        self
    }

    pub fn cover(mut self, href: &str, bytes: Vec<u8>) -> Self {
        self.manifest.push(("cover-image".to_string(), href.to_string(), "image/jpeg".to_string()));
        self.files.push((format!("OEBPS/{href}"), bytes));
        self.cover_id = Some("cover-image".to_string());
        self
    }

    pub fn without_opf(mut self) -> Self {
        self.with_opf = false;
        self
    }

    fn opf(&self) -> String {
        let mut metadata = String::new();
        if let Some(title) = &self.title {
            metadata.push_str(&format!("<dc:title>{title}</dc:title>\n"));
        }
        if let Some(creator) = &self.creator {
            metadata.push_str(&format!("<dc:creator>{creator}</dc:creator>\n"));
        }
        if let Some(cover_id) = &self.cover_id {
            metadata.push_str(&format!(r#"<meta name="cover" content="{cover_id}"/>"#));
        }

        let manifest: String = self
            .manifest
            .iter()
            .map(|(id, href, media_type)| {
                format!(r#"<item id="{id}" href="{href}" media-type="{media_type}"/>"#)
            })
            .collect();
        let spine: String = self
            .spine
            .iter()
            .map(|id| format!(r#"<itemref idref="{id}"/>"#))
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
{metadata}
</metadata>
<manifest>{manifest}</manifest>
<spine>{spine}</spine>
</package>"#
        )
    }

    /// 写入到 `path` 并返回该路径
    pub fn write<P: AsRef<Path>>(self, path: P) -> PathBuf {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).unwrap();
        let mut zip = ZipWriter::new(file);

        zip.start_file("mimetype", FileOptions::<()>::default()).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();

        if self.with_opf {
            zip.start_file("OEBPS/content.opf", FileOptions::<()>::default()).unwrap();
            zip.write_all(self.opf().as_bytes()).unwrap();
        }

        for (name, bytes) in &self.files {
            zip.start_file(name.as_str(), FileOptions::<()>::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }

        zip.finish().unwrap();
        path
    }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 200]));
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}
