use crate::schema::TextAlignment;
use skia_safe::{
    font_style::{Slant, Weight, Width},
    textlayout::{
        FontCollection, Paragraph as SkParagraph, ParagraphBuilder, ParagraphStyle, TextAlign,
        TextStyle,
    },
    Canvas, Color, Color4f, FontMgr, FontStyle, Paint, Point, Rect,
};

/// 段落内的一段样式文本；`scale` 乘以块字号
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub scale: f32,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub bullet: bool,
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::plain(text)],
            bullet: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        let mut p = Self::plain(text);
        p.runs[0].bold = true;
        p
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextSpec {
    pub font_size: f32,
    pub color: Color,
    pub family: Option<String>,
    pub bold: bool,
    pub align: TextAlignment,
}

impl Default for TextSpec {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            color: Color::BLACK,
            family: None,
            bold: false,
            align: TextAlignment::Left,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub paragraphs: Vec<Paragraph>,
    pub spec: TextSpec,
}

impl TextBlock {
    /// `text` 的每一行生成一个普通段落
    pub fn from_text(text: &str, spec: TextSpec) -> Self {
        Self {
            paragraphs: text.lines().map(Paragraph::plain).collect(),
            spec,
        }
    }

    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn paragraph_gap(&self) -> f32 {
        self.spec.font_size * 0.4
    }
}

/// 一次渲染各阶段共用的文本排版与测量
pub struct Typesetter {
    font_collection: FontCollection,
}

impl Typesetter {
    pub fn new() -> Self {
        let font_mgr = FontMgr::default();
        let mut font_collection = FontCollection::new();
        font_collection.set_default_font_manager(font_mgr, None);
        Self { font_collection }
    }

    fn build(&self, block: &TextBlock, paragraph: &Paragraph, width: f32) -> SkParagraph {
        let spec = &block.spec;
        let mut para_style = ParagraphStyle::new();
        para_style.set_text_align(match spec.align {
            TextAlignment::Left => TextAlign::Left,
            TextAlignment::Center => TextAlign::Center,
            TextAlignment::Right => TextAlign::Right,
            TextAlignment::Justify => TextAlign::Justify,
        });

        let mut builder = ParagraphBuilder::new(&para_style, &self.font_collection);
        for (i, run) in paragraph.runs.iter().enumerate() {
            let mut ts = TextStyle::new();
            ts.set_font_size(spec.font_size * run.scale);
            ts.set_foreground_paint(&Paint::new(Color4f::from(spec.color), None));
            if let Some(family) = &spec.family {
                ts.set_font_families(&[family.as_str()]);
            }
            let weight = if spec.bold || run.bold {
                Weight::BOLD
            } else {
                Weight::NORMAL
            };
            let slant = if run.italic {
                Slant::Italic
            } else {
                Slant::Upright
            };
            ts.set_font_style(FontStyle::new(weight, Width::NORMAL, slant));
            builder.push_style(&ts);
            if i == 0 && paragraph.bullet {
                builder.add_text("• ");
            }
            builder.add_text(&run.text);
            builder.pop();
        }
        let mut p = builder.build();
        p.layout(width.max(1.0));
        p
    }

    /// `block` 按 `width` 换行后的高度
    pub fn measure(&self, block: &TextBlock, width: f32) -> f32 {
        let mut height = 0.0;
        for (i, paragraph) in block.paragraphs.iter().enumerate() {
            if i > 0 {
                height += block.paragraph_gap();
            }
            height += self.build(block, paragraph, width).height();
        }
        height
    }

    /// 从 `rect` 左上角开始绘制 `block`，按其宽度换行
    /// 超出 rect 底部的部分照常绘制，不裁剪
    pub fn paint(&self, canvas: &Canvas, block: &TextBlock, rect: Rect) -> f32 {
        let mut y = rect.top();
        for (i, paragraph) in block.paragraphs.iter().enumerate() {
            if i > 0 {
                y += block.paragraph_gap();
            }
            let p = self.build(block, paragraph, rect.width());
            p.paint(canvas, Point::new(rect.left(), y));
            y += p.height();
        }
        y - rect.top()
    }
}

impl Default for Typesetter {
    fn default() -> Self {
        Self::new()
    }
}
