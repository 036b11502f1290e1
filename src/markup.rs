//! custom-html 元素的简易标记排版。
//!
//! 标记按原样解释，不做转义或过滤。下列词汇表之外的标签
//! 只作为无布局的包裹层，`script`/`style` 的内容与浏览器一样不显示。

use crate::text::{Paragraph, Run};
use regex::Regex;
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)[^>]*?>|<!--[\s\S]*?-->")
            .expect("tag pattern is valid")
    })
}

#[derive(Default)]
struct Flow {
    paragraphs: Vec<Paragraph>,
    current: Paragraph,
    bold: u32,
    italic: u32,
    scale: Vec<f32>,
    hidden: u32,
}

impl Flow {
    fn push_text(&mut self, raw: &str) {
        if self.hidden > 0 {
            return;
        }
        let decoded = decode_entities(raw);
        let mut text = String::with_capacity(decoded.len());
        let mut last_space = self
            .current
            .runs
            .last()
            .map_or(true, |r| r.text.ends_with(' '));
        for ch in decoded.chars() {
            if ch.is_whitespace() && ch != '\u{a0}' {
                if !last_space {
                    text.push(' ');
                    last_space = true;
                }
            } else {
                text.push(ch);
                last_space = false;
            }
        }
        if text.is_empty() {
            return;
        }
        self.current.runs.push(Run {
            text,
            bold: self.bold > 0,
            italic: self.italic > 0,
            scale: self.scale.last().copied().unwrap_or(1.0),
        });
    }

    fn break_line(&mut self) {
        let mut done = std::mem::take(&mut self.current);
        if let Some(last) = done.runs.last_mut() {
            let trimmed = last.text.trim_end().len();
            last.text.truncate(trimmed);
        }
        done.runs.retain(|r| !r.text.is_empty());
        if !done.runs.is_empty() {
            self.paragraphs.push(done);
        }
    }

    fn open(&mut self, tag: &str) {
        match tag {
            "b" | "strong" => self.bold += 1,
            "i" | "em" => self.italic += 1,
            "h1" | "h2" | "h3" | "h4" => {
                self.break_line();
                self.bold += 1;
                self.scale.push(heading_scale(tag));
            }
            "li" => {
                self.break_line();
                self.current.bullet = true;
            }
            "br" => self.break_line(),
            "script" | "style" => self.hidden += 1,
            t if is_block(t) => self.break_line(),
            _ => {}
        }
    }

    fn close(&mut self, tag: &str) {
        match tag {
            "b" | "strong" => self.bold = self.bold.saturating_sub(1),
            "i" | "em" => self.italic = self.italic.saturating_sub(1),
            "h1" | "h2" | "h3" | "h4" => {
                self.break_line();
                self.bold = self.bold.saturating_sub(1);
                self.scale.pop();
            }
            "script" | "style" => self.hidden = self.hidden.saturating_sub(1),
            t if t == "li" || is_block(t) => self.break_line(),
            _ => {}
        }
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div" | "section" | "article" | "header" | "footer" | "ul" | "ol" | "tr" | "table"
            | "blockquote" | "h5" | "h6" | "hr"
    )
}

fn heading_scale(tag: &str) -> f32 {
    match tag {
        "h1" => 2.0,
        "h2" => 1.5,
        "h3" => 1.17,
        _ => 1.0,
    }
}

/// 把 `markup` 排成由样式文本段组成的段落
pub fn parse(markup: &str) -> Vec<Paragraph> {
    let mut flow = Flow::default();
    let mut cursor = 0;
    for caps in tag_regex().captures_iter(markup) {
        let Some(whole) = caps.get(0) else { continue };
        flow.push_text(&markup[cursor..whole.start()]);
        cursor = whole.end();
        let Some(name) = caps.get(2) else {
            // 注释
            continue;
        };
        let tag = name.as_str().to_ascii_lowercase();
        if caps.get(1).is_some_and(|m| m.as_str() == "/") {
            flow.close(&tag);
        } else {
            flow.open(&tag);
        }
    }
    flow.push_text(&markup[cursor..]);
    flow.break_line();
    flow.paragraphs
}

pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                e if e.starts_with("#x") || e.starts_with("#X") => {
                    u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
                }
                e if e.starts_with('#') => e[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// 标记的纯文本，每段一行
pub fn plain_text(markup: &str) -> String {
    parse(markup)
        .iter()
        .map(Paragraph::plain_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_and_inline_styles() {
        let paras = parse("<h2>Arrival</h2><p>Keys are in the <b>blue</b> box.</p><ul><li>One</li><li>Two</li></ul>");
        assert_eq!(paras.len(), 4);
        assert!(paras[0].runs[0].bold);
        assert_eq!(paras[0].runs[0].scale, 1.5);
        assert_eq!(paras[1].plain_text(), "Keys are in the blue box.");
        assert!(paras[1].runs[1].bold);
        assert!(!paras[1].runs[2].bold);
        assert!(paras[2].bullet);
        assert_eq!(paras[3].plain_text(), "Two");
    }

    #[test]
    fn entities_whitespace_and_hidden_bodies() {
        assert_eq!(decode_entities("a &amp; b &lt;3 &#65;&#x42; &bogus"), "a & b <3 AB &bogus");
        assert_eq!(plain_text("  one\n   two <br/>three "), "one two\nthree");
        assert_eq!(plain_text("<script>alert(1)</script>shown<!-- note -->"), "shown");
    }

    #[test]
    fn unknown_tags_pass_through_as_wrappers() {
        assert_eq!(plain_text("<marquee>hi <span>there</span></marquee>"), "hi there");
    }
}
