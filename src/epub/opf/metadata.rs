//! 元数据模块
//!
//! 只保留书库关心的Dublin Core字段和封面声明。

/// OPF文件中的元数据信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    /// 所有 `<dc:title>` 的文本，按出现顺序
    pub titles: Vec<String>,
    /// 所有 `<dc:creator>` 的文本，按出现顺序
    pub creators: Vec<String>,
    /// `<meta name="cover" content="..."/>` 中的清单项ID
    pub cover: Option<String>,
}

impl PackageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第一个非空标题
    pub fn title(&self) -> Option<&str> {
        first_non_empty(&self.titles)
    }

    /// 第一个非空作者
    pub fn creator(&self) -> Option<&str> {
        first_non_empty(&self.creators)
    }

    /// 记录Dublin Core元素，暂时只关心title和creator
    pub fn add_dublin_core(&mut self, tag: &str, value: String) {
        match tag {
            "title" => self.titles.push(value),
            "creator" => self.creators.push(value),
            _ => {}
        }
    }

    /// 记录基于name属性的meta标签
    pub fn add_meta_name_based(&mut self, name: &str, content: String) {
        if name == "cover" && self.cover.is_none() {
            self.cover = Some(content);
        }
    }
}

fn first_non_empty(values: &[String]) -> Option<&str> {
    values
        .iter()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_empty_creator() {
        let mut metadata = PackageMetadata::new();
        metadata.add_dublin_core("creator", "  ".to_string());
        metadata.add_dublin_core("creator", "鲁迅".to_string());
        assert_eq!(metadata.creator(), Some("鲁迅"));
        assert_eq!(metadata.title(), None);
    }

    #[test]
    fn test_first_cover_meta_wins() {
        let mut metadata = PackageMetadata::new();
        metadata.add_meta_name_based("cover", "cover-image".to_string());
        metadata.add_meta_name_based("cover", "other".to_string());
        metadata.add_meta_name_based("generator", "calibre".to_string());
        assert_eq!(metadata.cover.as_deref(), Some("cover-image"));
    }
}
