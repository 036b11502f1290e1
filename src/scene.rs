//! 单个栅格 surface 的显示列表。坐标单位为 pt，
//! DPI 倍率由 painter 处理。

use crate::content::{Card, Node, TableData};
use crate::markup;
use crate::paint::parse_color;
use crate::schema::{BorderStyle, Element, Styling, TextAlignment, TemplateStyling};
use crate::text::{Paragraph, TextBlock, TextSpec, Typesetter};
use skia_safe::{Color, Rect};

pub const MUTED: Color = Color::from_rgb(0x6B, 0x72, 0x80);
const CARD_FILL: Color = Color::from_rgb(0xF9, 0xFA, 0xFB);
const CARD_BORDER: Color = Color::from_rgb(0xE5, 0xE7, 0xEB);
const TABLE_HEAD_FILL: Color = Color::from_rgb(0xF3, 0xF4, 0xF6);
const TABLE_BORDER: Color = Color::from_rgb(0xD1, 0xD5, 0xDB);
const CARD_PADDING: f32 = 8.0;
const CARD_GAP: f32 = 8.0;
const CELL_PADDING: f32 = 5.0;
const QR_CAPTION_SIZE: f32 = 7.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Solid(Color),
    /// 从左到右的线性渐变
    Gradient(Color, Color),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Color,
    pub style: BorderStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowSpec {
    pub dx: f32,
    pub dy: f32,
    pub blur: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
    pub radius: f32,
    pub shadow: Option<ShadowSpec>,
}

impl Frame {
    pub fn solid(color: Color) -> Self {
        Self {
            fill: Some(Fill::Solid(color)),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.fill.is_none() && self.stroke.is_none() && self.shadow.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mark {
    Box { rect: Rect, frame: Frame },
    Text { rect: Rect, block: TextBlock },
    Image { rect: Rect, source: String },
    QrCode { rect: Rect, data: String },
    Rule { rect: Rect, color: Color },
    /// 页面背景图；加载失败时不绘制
    Backdrop { rect: Rect, source: String, opacity: f32 },
    /// 绘制到独立图层，使 `opacity` 作用于整组
    Group { id: String, bounds: Rect, opacity: f32, marks: Vec<Mark> },
}

impl Scene {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            marks: Vec::new(),
        }
    }

    /// 按绘制顺序列出 scene 中的全部文本，每段一行
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        collect_text(&self.marks, &mut lines);
        lines.join("\n")
    }

    /// 按绘制顺序列出顶层分组 id
    pub fn group_ids(&self) -> Vec<&str> {
        self.marks
            .iter()
            .filter_map(|m| match m {
                Mark::Group { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn collect_text(marks: &[Mark], out: &mut Vec<String>) {
    for mark in marks {
        match mark {
            Mark::Text { block, .. } => {
                out.extend(block.paragraphs.iter().map(Paragraph::plain_text))
            }
            Mark::Group { marks, .. } => collect_text(marks, out),
            _ => {}
        }
    }
}

/// 把内容节点转换为 mark，布局依赖文本高度时先测量
pub struct SceneBuilder<'a> {
    typesetter: &'a Typesetter,
    theme: &'a TemplateStyling,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(typesetter: &'a Typesetter, theme: &'a TemplateStyling) -> Self {
        Self { typesetter, theme }
    }

    pub fn typesetter(&self) -> &Typesetter {
        self.typesetter
    }

    pub fn base_spec(&self) -> TextSpec {
        TextSpec {
            font_size: self.theme.font_size,
            color: parse_color(&self.theme.text_color),
            family: self.theme.font_family.clone(),
            bold: false,
            align: TextAlignment::Left,
        }
    }

    pub fn text_spec(&self, style: &Styling) -> TextSpec {
        let base = self.base_spec();
        TextSpec {
            font_size: style.font_size.unwrap_or(base.font_size),
            color: style.color.as_deref().map(parse_color).unwrap_or(base.color),
            family: style.font_family.clone().or(base.family),
            bold: style.is_bold(),
            align: style.text_align.unwrap_or_default(),
        }
    }

    /// 绝对定位元素生成一个分组：先画盒子样式，再画内容
    pub fn element(&self, element: &Element, node: &Node) -> Mark {
        let style = &element.style;
        let pos = element.position;
        let margin = style.margin.unwrap_or_default();
        let bounds = Rect::from_xywh(
            pos.x + margin.left,
            pos.y + margin.top,
            pos.width.max(0.0),
            pos.height.max(0.0),
        );
        let frame = frame_for(style);
        let padding = style.padding.unwrap_or_default();
        let inner = Rect::from_ltrb(
            bounds.left + padding.left,
            bounds.top + padding.top,
            (bounds.right - padding.right).max(bounds.left + padding.left),
            (bounds.bottom - padding.bottom).max(bounds.top + padding.top),
        );

        let mut marks = Vec::new();
        if !frame.is_empty() {
            marks.push(Mark::Box {
                rect: bounds,
                frame,
            });
        }
        let spec = self.text_spec(style);
        self.node(node, inner, &spec, &mut marks);

        Mark::Group {
            id: element.id.clone(),
            bounds,
            opacity: style.opacity.unwrap_or(1.0).clamp(0.0, 1.0),
            marks,
        }
    }

    /// 在 `rect` 内布局 `node`，返回占用的高度
    pub fn node(
        &self,
        node: &Node,
        rect: Rect,
        spec: &TextSpec,
        out: &mut Vec<Mark>,
    ) -> f32 {
        match node {
            Node::Text(text) => self.text(TextBlock::from_text(text, spec.clone()), rect, out),
            Node::Placeholder(text) => {
                let spec = TextSpec {
                    color: MUTED,
                    align: TextAlignment::Center,
                    ..spec.clone()
                };
                self.text(TextBlock::from_text(text, spec), rect, out)
            }
            Node::Markup(html) => {
                let block = TextBlock {
                    paragraphs: markup::parse(html),
                    spec: spec.clone(),
                };
                self.text(block, rect, out)
            }
            Node::Cards(cards) => self.cards(cards, rect, spec, out),
            Node::Table(table) => self.table(table, rect, spec, out),
            Node::QrCode { data } => self.qr_code(data, rect, spec, out),
            Node::Image { url } => {
                out.push(Mark::Image {
                    rect,
                    source: url.clone(),
                });
                rect.height()
            }
            Node::Rule { thickness } => {
                out.push(Mark::Rule {
                    rect: Rect::from_xywh(rect.left, rect.top, rect.width(), *thickness),
                    color: spec.color,
                });
                *thickness
            }
            Node::Empty => 0.0,
        }
    }

    fn text(&self, block: TextBlock, rect: Rect, out: &mut Vec<Mark>) -> f32 {
        if block.paragraphs.is_empty() {
            return 0.0;
        }
        let height = self.typesetter.measure(&block, rect.width());
        out.push(Mark::Text { rect, block });
        height
    }

    fn card_block(&self, card: &Card, spec: &TextSpec) -> TextBlock {
        let mut paragraphs = vec![Paragraph::bold(card.title.clone())];
        paragraphs.extend(card.lines.iter().map(|l| Paragraph::plain(l.clone())));
        TextBlock {
            paragraphs,
            spec: TextSpec {
                align: TextAlignment::Left,
                ..spec.clone()
            },
        }
    }

    fn cards(&self, cards: &[Card], rect: Rect, spec: &TextSpec, out: &mut Vec<Mark>) -> f32 {
        let columns = if rect.width() >= 360.0 { 2 } else { 1 };
        let card_w = (rect.width() - CARD_GAP * (columns - 1) as f32) / columns as f32;
        let text_w = (card_w - CARD_PADDING * 2.0).max(1.0);

        let mut y = rect.top;
        for row in cards.chunks(columns) {
            let blocks: Vec<TextBlock> = row.iter().map(|c| self.card_block(c, spec)).collect();
            let row_h = blocks
                .iter()
                .map(|b| self.typesetter.measure(b, text_w))
                .fold(0.0_f32, f32::max)
                + CARD_PADDING * 2.0;

            for (i, block) in blocks.into_iter().enumerate() {
                let x = rect.left + i as f32 * (card_w + CARD_GAP);
                let card = Rect::from_xywh(x, y, card_w, row_h);
                out.push(Mark::Box {
                    rect: card,
                    frame: Frame {
                        fill: Some(Fill::Solid(CARD_FILL)),
                        stroke: Some(Stroke {
                            width: 1.0,
                            color: CARD_BORDER,
                            style: BorderStyle::Solid,
                        }),
                        radius: 6.0,
                        shadow: None,
                    },
                });
                out.push(Mark::Text {
                    rect: card.with_inset((CARD_PADDING, CARD_PADDING)),
                    block,
                });
            }
            y += row_h + CARD_GAP;
        }
        (y - CARD_GAP - rect.top).max(0.0)
    }

    fn table(&self, table: &TableData, rect: Rect, spec: &TextSpec, out: &mut Vec<Mark>) -> f32 {
        let columns = table
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(table.headers.len()))
            .max()
            .unwrap_or(0)
            .max(1);
        let col_w = rect.width() / columns as f32;
        let cell_spec = TextSpec {
            align: TextAlignment::Left,
            ..spec.clone()
        };
        let stroke = Stroke {
            width: 0.5,
            color: TABLE_BORDER,
            style: BorderStyle::Solid,
        };

        let mut y = rect.top;
        let header = (!table.headers.is_empty()).then_some(&table.headers);
        let rows = header
            .into_iter()
            .map(|r| (r, true))
            .chain(table.rows.iter().map(|r| (r, false)));

        for (cells, is_header) in rows {
            let blocks: Vec<TextBlock> = (0..columns)
                .map(|i| {
                    let text = cells.get(i).map(String::as_str).unwrap_or_default();
                    TextBlock {
                        paragraphs: if is_header {
                            vec![Paragraph::bold(text)]
                        } else {
                            text.lines().map(Paragraph::plain).collect()
                        },
                        spec: cell_spec.clone(),
                    }
                })
                .collect();
            let row_h = blocks
                .iter()
                .map(|b| self.typesetter.measure(b, col_w - CELL_PADDING * 2.0))
                .fold(0.0_f32, f32::max)
                + CELL_PADDING * 2.0;

            for (i, block) in blocks.into_iter().enumerate() {
                let cell = Rect::from_xywh(rect.left + i as f32 * col_w, y, col_w, row_h);
                out.push(Mark::Box {
                    rect: cell,
                    frame: Frame {
                        fill: is_header.then_some(Fill::Solid(TABLE_HEAD_FILL)),
                        stroke: Some(stroke.clone()),
                        radius: 0.0,
                        shadow: None,
                    },
                });
                if !block.paragraphs.is_empty() {
                    out.push(Mark::Text {
                        rect: cell.with_inset((CELL_PADDING, CELL_PADDING)),
                        block,
                    });
                }
            }
            y += row_h;
        }
        y - rect.top
    }

    fn qr_code(&self, data: &str, rect: Rect, spec: &TextSpec, out: &mut Vec<Mark>) -> f32 {
        let caption = TextBlock::from_text(
            data,
            TextSpec {
                font_size: QR_CAPTION_SIZE,
                color: MUTED,
                align: TextAlignment::Center,
                bold: false,
                ..spec.clone()
            },
        );
        let caption_h = if data.is_empty() {
            0.0
        } else {
            self.typesetter.measure(&caption, rect.width())
        };
        let side = rect.width().min(rect.height() - caption_h).max(0.0);
        let square = Rect::from_xywh(
            rect.left + (rect.width() - side) / 2.0,
            rect.top,
            side,
            side,
        );
        out.push(Mark::QrCode {
            rect: square,
            data: data.to_string(),
        });
        if caption_h > 0.0 {
            out.push(Mark::Text {
                rect: Rect::from_xywh(rect.left, square.bottom, rect.width(), caption_h),
                block: caption,
            });
        }
        side + caption_h
    }
}

pub fn frame_for(style: &Styling) -> Frame {
    let stroke = style.border.as_ref().and_then(|b| {
        (b.width > 0.0 && b.style != BorderStyle::None).then(|| Stroke {
            width: b.width,
            color: b.color.as_deref().map(parse_color).unwrap_or(Color::BLACK),
            style: b.style,
        })
    });
    Frame {
        fill: style
            .background_color
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| Fill::Solid(parse_color(c))),
        stroke,
        radius: style.border.as_ref().map_or(0.0, |b| b.radius),
        shadow: style.shadow.as_ref().map(|s| ShadowSpec {
            dx: s.offset_x,
            dy: s.offset_y,
            blur: s.blur,
            color: s
                .color
                .as_deref()
                .map(parse_color)
                .unwrap_or(Color::from_argb(0x40, 0, 0, 0)),
        }),
    }
}
