//! 集成测试用的EPUB文件

use image::{DynamicImage, ImageFormat, RgbImage};
use std::fs::File;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::FileOptions;

/// 写入一本包含 `chapters` 个章节的EPUB，可选带一张640×480的JPEG封面 `images/cover.jpg`
pub fn write_epub(path: &Path, title: &str, creator: &str, chapters: usize, with_cover: bool) -> PathBuf {
    let mut manifest = String::new();
    let mut spine = String::new();
    let mut files = Vec::new();

    for i in 0..chapters {
        let href = format!("text/ch{i}.xhtml");
        manifest.push_str(&format!(
            r#"<item id="ch{i}" href="{href}" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="ch{i}"/>"#));
        let body = format!(
            r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><h1>第{i}章</h1><p>正文{i}</p></body></html>"#
        );
        files.push((format!("OEBPS/{href}"), body.into_bytes()));
    }

    let mut cover_meta = String::new();
    if with_cover {
        manifest.push_str(r#"<item id="cover-image" href="images/cover.jpg" media-type="image/jpeg"/>"#);
        cover_meta.push_str(r#"<meta name="cover" content="cover-image"/>"#);
        files.push(("OEBPS/images/cover.jpg".to_string(), cover_jpeg()));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>{title}</dc:title>
<dc:creator>{creator}</dc:creator>
{cover_meta}
</metadata>
<manifest>{manifest}</manifest>
<spine>{spine}</spine>
</package>"#
    );

    let mut zip = ZipWriter::new(File::create(path).unwrap());
    zip.start_file("mimetype", FileOptions::<()>::default()).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("OEBPS/content.opf", FileOptions::<()>::default()).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();
    for (name, bytes) in files {
        zip.start_file(name, FileOptions::<()>::default()).unwrap();
        zip.write_all(&bytes).unwrap();
    }
    zip.finish().unwrap();
    path.to_path_buf()
}

fn cover_jpeg() -> Vec<u8> {
    let image = RgbImage::from_fn(640, 480, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .unwrap();
    buffer.into_inner()
}
