//! 把XHTML章节转换为纯文本，供命令行阅读使用

use scraper::{ElementRef, Html, Node, Selector};

/// 将XHTML内容转换为格式化文本
///
/// 块级元素结束时换行，图片和 `<head>` 中的内容被跳过，
/// 连续超过两个的换行会被压缩。
pub fn html_to_text(html: &[u8]) -> String {
    let html = String::from_utf8_lossy(html);
    let document = Html::parse_document(&html);

    let mut result = String::new();
    match Selector::parse("body") {
        Ok(body_selector) => match document.select(&body_selector).next() {
            Some(body) => process_element(body, &mut result),
            None => process_element(document.root_element(), &mut result),
        },
        Err(_) => process_element(document.root_element(), &mut result),
    }

    clean_excessive_newlines(&result)
}

fn process_element(element: ElementRef, result: &mut String) {
    let tag_name = element.value().name();
    if matches!(tag_name, "img" | "head" | "script" | "style") {
        return;
    }

    for node in element.children() {
        match node.value() {
            Node::Text(text) => result.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(node) {
                    process_element(child, result);
                }
            }
            _ => {}
        }
    }

    match tag_name {
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "tr" | "br" => {
            result.push('\n');
        }
        "td" | "th" => result.push('\t'),
        _ => {}
    }
}

/// 清理多余的连续换行符
fn clean_excessive_newlines(text: &str) -> String {
    let mut result = String::new();
    let mut newline_count = 0;

    for ch in text.chars() {
        if ch == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push(ch);
            }
        } else {
            newline_count = 0;
            result.push(ch);
        }
    }

    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let html = br#"<html><head><title>Skip me</title></head>
<body><h1>Chapter</h1><p>First<br/>line</p><img src="a.png"/><p>Second</p></body></html>"#;

        let text = html_to_text(html);
        assert!(!text.contains("Skip me"));
        assert!(text.starts_with("Chapter\n"));
        assert!(text.contains("First\nline"));
        assert!(text.ends_with("Second"));
    }

    #[test]
    fn test_clean_excessive_newlines() {
        assert_eq!(clean_excessive_newlines("\na\n\n\n\nb\n"), "a\n\nb");
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(html_to_text(b""), "");
    }
}
