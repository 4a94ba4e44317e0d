//! OPF解析器模块
//!
//! 提供OPF（Open Packaging Format）文件的XML解析功能。

use crate::epub::opf::{manifest::ManifestItem, metadata::PackageMetadata, spine::SpineItem};
use crate::error::{ReadpubError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

/// OPF文件解析结果
#[derive(Debug, Clone)]
pub struct Opf {
    /// EPUB版本
    pub version: String,
    /// 元数据
    pub metadata: PackageMetadata,
    /// 清单项(文件列表)
    pub manifest: HashMap<String, ManifestItem>,
    /// 脊柱(阅读顺序)
    pub spine: Vec<SpineItem>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Metadata,
    Manifest,
    Spine,
}

impl Opf {
    /// 解析OPF文件内容
    ///
    /// 命名空间前缀会被忽略，`<dc:creator>` 与 `<creator>` 等价。
    pub fn parse_xml(xml_content: &str) -> Result<Opf> {
        let mut reader = Reader::from_str(xml_content);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut version = String::new();
        let mut metadata = PackageMetadata::new();
        let mut manifest = HashMap::new();
        let mut spine = Vec::new();

        let mut buf = Vec::new();
        let mut section = Section::None;
        let mut text_content = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let local_name = e.local_name();
                    match local_name.as_ref() {
                        b"package" => {
                            version = attribute(e, b"version")?.unwrap_or_default();
                        }
                        b"metadata" => section = Section::Metadata,
                        b"manifest" => section = Section::Manifest,
                        b"spine" => section = Section::Spine,
                        b"item" if section == Section::Manifest => {
                            if let Some(item) = Self::parse_manifest_item(e)? {
                                manifest.insert(item.id.clone(), item);
                            }
                        }
                        b"itemref" if section == Section::Spine => {
                            if let Some(item) = Self::parse_spine_item(e)? {
                                spine.push(item);
                            }
                        }
                        b"meta" if section == Section::Metadata => {
                            let name = attribute(e, b"name")?;
                            let content = attribute(e, b"content")?;
                            if let (Some(name), Some(content)) = (name, content) {
                                metadata.add_meta_name_based(&name, content);
                            }
                        }
                        _ if section == Section::Metadata => text_content.clear(),
                        _ => {}
                    }
                }
                Event::End(ref e) => {
                    let local_name = e.local_name();
                    match local_name.as_ref() {
                        b"metadata" | b"manifest" | b"spine" => section = Section::None,
                        b"meta" => {}
                        name if section == Section::Metadata => {
                            let content = text_content.trim();
                            if !content.is_empty() {
                                let tag = String::from_utf8_lossy(name);
                                metadata.add_dublin_core(&tag, content.to_string());
                            }
                            text_content.clear();
                        }
                        _ => {}
                    }
                }
                Event::Text(e) if section == Section::Metadata => {
                    text_content.push_str(&e.unescape()?);
                }
                Event::CData(e) if section == Section::Metadata => {
                    text_content.push_str(&String::from_utf8_lossy(&e));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Opf {
            version,
            metadata,
            manifest,
            spine,
        })
    }

    /// 解析清单项，缺少id或href的项目会被忽略
    fn parse_manifest_item(e: &BytesStart) -> Result<Option<ManifestItem>> {
        let id = attribute(e, b"id")?.unwrap_or_default();
        let href = attribute(e, b"href")?.unwrap_or_default();
        if id.is_empty() || href.is_empty() {
            return Ok(None);
        }

        let mut item = ManifestItem::new(id, href);
        item.media_type = attribute(e, b"media-type")?;
        Ok(Some(item))
    }

    /// 解析脊柱项
    fn parse_spine_item(e: &BytesStart) -> Result<Option<SpineItem>> {
        let Some(idref) = attribute(e, b"idref")?.filter(|idref| !idref.is_empty()) else {
            return Ok(None);
        };

        let mut item = SpineItem::new(idref);
        item.linear = attribute(e, b"linear")?.as_deref() != Some("no");
        Ok(Some(item))
    }

    /// 根据清单项ID获取href
    pub fn href_of(&self, id: &str) -> Option<&str> {
        self.manifest.get(id).map(|item| item.href.as_str())
    }

    /// 获取 `<meta name="cover">` 声明的封面href
    pub fn cover_href(&self) -> Option<&str> {
        self.metadata
            .cover
            .as_deref()
            .and_then(|id| self.href_of(id))
    }
}

/// 按本地名读取属性值
fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| ReadpubError::Xml(quick_xml::Error::InvalidAttr(err)))?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(String::from_utf8_lossy(&attr.value).to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package version="2.0" xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:title>呐喊</dc:title>
        <dc:creator opf:role="aut">鲁迅</dc:creator>
        <dc:language>zh-CN</dc:language>
        <meta name="cover" content="cover-image"/>
    </metadata>
    <manifest>
        <item id="cover-image" href="images/cover.jpg" media-type="image/jpeg"/>
        <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
        <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
        <item id="broken"/>
    </manifest>
    <spine toc="ncx">
        <itemref idref="ch1"/>
        <itemref idref="ch2" linear="no"/>
    </spine>
</package>"#;

    #[test]
    fn test_parse_package() {
        let opf = Opf::parse_xml(SAMPLE_OPF).expect("解析OPF失败");

        assert_eq!(opf.version, "2.0");
        assert_eq!(opf.metadata.title(), Some("呐喊"));
        assert_eq!(opf.metadata.creator(), Some("鲁迅"));
        assert_eq!(opf.manifest.len(), 3);
        assert!(opf.manifest["cover-image"].is_image());
    }

    #[test]
    fn test_spine_keeps_document_order() {
        let opf = Opf::parse_xml(SAMPLE_OPF).unwrap();

        let idrefs: Vec<&str> = opf.spine.iter().map(|item| item.idref.as_str()).collect();
        assert_eq!(idrefs, vec!["ch1", "ch2"]);
        assert!(opf.spine[0].linear);
        assert!(!opf.spine[1].linear);
    }

    #[test]
    fn test_cover_href() {
        let opf = Opf::parse_xml(SAMPLE_OPF).unwrap();
        assert_eq!(opf.cover_href(), Some("images/cover.jpg"));
        assert_eq!(opf.href_of("ch2"), Some("text/ch2.xhtml"));
        assert_eq!(opf.href_of("missing"), None);
    }

    #[test]
    fn test_missing_cover_and_creator() {
        let simple_opf = concat!(
            r#"<?xml version="1.0"?>"#,
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">"#,
            r#"<metadata xmlns:dc="http://purl.org/dc/elements/1.1/">"#,
            r#"<dc:title>Test Book</dc:title>"#,
            r#"<dc:creator></dc:creator>"#,
            r#"</metadata>"#,
            r#"<manifest></manifest>"#,
            r#"<spine></spine>"#,
            r#"</package>"#
        );

        let opf = Opf::parse_xml(simple_opf).expect("解析简单OPF失败");
        assert_eq!(opf.metadata.title(), Some("Test Book"));
        assert_eq!(opf.metadata.creator(), None);
        assert_eq!(opf.cover_href(), None);
        assert!(opf.spine.is_empty());
    }
}
