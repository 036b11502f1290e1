//! 分节流式渲染：所有启用的分节纵向堆叠在一张长画布上，
//! 整体栅格化一次后按页高切片。

use super::{rasterize, RenderContext};
use crate::content::{local_info_grid, Node};
use crate::error::RenderError;
use crate::interpolate::{substitute, Bindings};
use crate::paint::{parse_color, Painter};
use crate::pdf::{artifact_file_name, PdfArtifact, PdfWriter};
use crate::scene::{Fill, Frame, Mark, Scene, SceneBuilder, MUTED};
use crate::schema::{enabled_sections, HeaderStyle, Section, SectionKind, Template, TextAlignment};
use crate::text::{Paragraph, TextBlock, TextSpec};
use skia_safe::{Color, Rect};
use tracing::debug;

const BANNER_PADDING: f32 = 18.0;
const SECTION_PADDING: f32 = 14.0;
const SECTION_GAP: f32 = 12.0;
const TITLE_GAP: f32 = 6.0;
const SECTION_FILL: Color = Color::from_rgb(0xF9, 0xFA, 0xFB);
/// 交给自适应内容的高度上限，不据此裁剪
const OPEN_HEIGHT: f32 = 100_000.0;

/// 流式长图中一页高度的切片 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub top: i32,
    pub height: i32,
}

/// 用高度不超过 `band` 的连续切片覆盖 `total` 像素。
/// 至少返回一个切片，空内容也会生成一页
pub fn plan_bands(total: i32, band: i32) -> Vec<Band> {
    let band = band.max(1);
    let total = total.max(0);
    let mut bands = vec![Band {
        top: 0,
        height: total.min(band),
    }];
    let mut top = band;
    let mut remaining = total - band;
    while remaining > 0 {
        bands.push(Band {
            top,
            height: remaining.min(band),
        });
        top += band;
        remaining -= band;
    }
    bands
}

/// 分节正文：有自定义内容时用内容，否则用该分节类型的默认内容
pub fn section_body(section: &Section, bindings: &Bindings) -> Node {
    if !section.content.trim().is_empty() {
        return Node::Text(substitute(&section.content, bindings));
    }
    let p = bindings.property;
    let text = match section.kind {
        SectionKind::PropertyInfo => {
            let address = [&p.address, &p.city, &p.country]
                .into_iter()
                .filter(|s| !s.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            [p.description.as_str(), address.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        }
        SectionKind::Checkin => p.check_in_instructions.clone(),
        SectionKind::Wifi => p.wifi_password.clone(),
        SectionKind::Rules => p.house_rules.clone(),
        SectionKind::Emergency => p.emergency_contacts.clone(),
        SectionKind::LocalInfo => return local_info_grid(bindings),
        SectionKind::Header | SectionKind::Footer | SectionKind::Custom => return Node::Empty,
    };
    Node::Text(substitute(&text, bindings))
}

/// 把整个流式内容布局成一个长 scene，宽度为内容区宽度
pub fn build_flow_scene(
    template: &Template,
    sections: &[Section],
    builder: &SceneBuilder,
    bindings: &Bindings,
) -> Scene {
    let (_, _, width, _) = template.layout.content_box();
    let mut marks = Vec::new();
    let mut y = banner(template, builder, bindings, width, &mut marks);
    for section in enabled_sections(sections) {
        y += SECTION_GAP;
        y += section_block(template, section, builder, bindings, y, width, &mut marks);
    }

    let mut scene = Scene::new(width, y.max(1.0));
    scene.marks.push(Mark::Box {
        rect: Rect::from_wh(width, scene.height),
        frame: Frame::solid(parse_color(&template.styling.background_color)),
    });
    scene.marks.extend(marks);
    scene
}

fn banner(
    template: &Template,
    builder: &SceneBuilder,
    bindings: &Bindings,
    width: f32,
    out: &mut Vec<Mark>,
) -> f32 {
    let theme = &template.styling;
    let base = builder.base_spec();
    let on_banner = TextSpec {
        color: Color::WHITE,
        ..base.clone()
    };
    let title = TextBlock {
        paragraphs: vec![Paragraph::bold(bindings.property.name.clone())],
        spec: TextSpec {
            font_size: base.font_size * 2.0,
            ..on_banner.clone()
        },
    };
    let subtitle_text = if template.name.trim().is_empty() {
        bindings.strings.get("header.subtitle")
    } else {
        template.name.as_str()
    };
    let subtitle = TextBlock::from_text(subtitle_text, on_banner);

    let inner_w = (width - BANNER_PADDING * 2.0).max(1.0);
    let title_h = builder.typesetter().measure(&title, inner_w);
    let subtitle_h = builder.typesetter().measure(&subtitle, inner_w);
    let height = BANNER_PADDING * 2.0 + title_h + TITLE_GAP + subtitle_h;

    let primary = parse_color(&theme.primary_color);
    let fill = match theme.header_style {
        HeaderStyle::Gradient => Fill::Gradient(primary, parse_color(&theme.secondary_color)),
        HeaderStyle::Flat => Fill::Solid(primary),
    };
    out.push(Mark::Box {
        rect: Rect::from_wh(width, height),
        frame: Frame {
            fill: Some(fill),
            radius: theme.border_radius,
            ..Default::default()
        },
    });
    out.push(Mark::Text {
        rect: Rect::from_xywh(BANNER_PADDING, BANNER_PADDING, inner_w, title_h),
        block: title,
    });
    out.push(Mark::Text {
        rect: Rect::from_xywh(
            BANNER_PADDING,
            BANNER_PADDING + title_h + TITLE_GAP,
            inner_w,
            subtitle_h,
        ),
        block: subtitle,
    });
    height
}

fn section_block(
    template: &Template,
    section: &Section,
    builder: &SceneBuilder,
    bindings: &Bindings,
    top: f32,
    width: f32,
    out: &mut Vec<Mark>,
) -> f32 {
    let theme = &template.styling;
    let style = &section.style;
    let pad = style.padding.unwrap_or(SECTION_PADDING);
    let base = builder.base_spec();

    let is_header = section.kind == SectionKind::Header;
    let is_footer = section.kind == SectionKind::Footer;
    let body_spec = TextSpec {
        font_size: style.font_size.unwrap_or(base.font_size),
        color: style
            .text_color
            .as_deref()
            .map(parse_color)
            .unwrap_or(if is_footer { MUTED } else { base.color }),
        align: if is_footer {
            TextAlignment::Center
        } else {
            TextAlignment::Left
        },
        ..base
    };
    let title_color = match (&style.title_color, is_header, is_footer) {
        (Some(c), _, _) => parse_color(c),
        (None, true, _) => Color::WHITE,
        (None, _, true) => MUTED,
        (None, false, false) => parse_color(&theme.primary_color),
    };
    let title_spec = TextSpec {
        font_size: body_spec.font_size * if is_footer { 1.0 } else { 1.4 },
        color: title_color,
        bold: !is_footer,
        ..body_spec.clone()
    };

    let left = pad;
    let inner_w = (width - pad * 2.0).max(1.0);
    let mut inner = Vec::new();
    let mut used = 0.0;
    let title = substitute(&section.title, bindings);
    if !title.trim().is_empty() {
        used += builder.node(
            &Node::Text(title),
            Rect::from_xywh(left, top + pad, inner_w, OPEN_HEIGHT),
            &title_spec,
            &mut inner,
        );
    }
    let body = section_body(section, bindings);
    let gap = if used > 0.0 { TITLE_GAP } else { 0.0 };
    let body_h = builder.node(
        &body,
        Rect::from_xywh(left, top + pad + used + gap, inner_w, OPEN_HEIGHT),
        &body_spec,
        &mut inner,
    );
    if body_h > 0.0 {
        used += gap + body_h;
    }

    let height = used + pad * 2.0;
    let fill = match (&style.background_color, is_header) {
        (Some(c), _) => parse_color(c),
        (None, true) => parse_color(&theme.primary_color),
        (None, false) => SECTION_FILL,
    };
    out.push(Mark::Box {
        rect: Rect::from_xywh(0.0, top, width, height),
        frame: Frame {
            fill: Some(Fill::Solid(fill)),
            radius: style.border_radius.unwrap_or(theme.border_radius),
            ..Default::default()
        },
    });
    out.extend(inner);
    debug!(section = %section.id, kind = ?section.kind, height, "section laid out");
    height
}

/// 切片的放置位置：`src` 为栅格像素，`dst` 为页面 pt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub src: Rect,
    pub dst: Rect,
}

/// 为尺寸 `image` 的流式长图生成每个 PDF 页面的放置位置。
/// 每个切片高度等于内容区高度，按实际高度放在内容区左上角
pub fn place_bands(
    image: (i32, i32),
    content_box: (f32, f32, f32, f32),
    scale: f32,
) -> Vec<Placement> {
    let (left, top, width, height) = content_box;
    let band_px = ((height * scale).floor() as i32).max(1);
    plan_bands(image.1, band_px)
        .into_iter()
        .map(|band| Placement {
            src: Rect::from_xywh(0.0, band.top as f32, image.0 as f32, band.height as f32),
            dst: Rect::from_xywh(left, top, width, band.height as f32 / scale),
        })
        .collect()
}

/// 整体栅格化一次，再按 PDF 页切片
pub fn render(ctx: &RenderContext, sections: &[Section]) -> Result<PdfArtifact, RenderError> {
    let template = ctx.template;
    let builder = SceneBuilder::new(ctx.typesetter, &template.styling);
    let scene = build_flow_scene(template, sections, &builder, &ctx.bindings);
    ctx.cancel.check()?;

    let mut painter = Painter::new(ctx.typesetter, ctx.images);
    let image = rasterize(&scene, &mut painter, ctx.scale)?;

    let layout = &template.layout;
    let placements = place_bands((image.width(), image.height()), layout.content_box(), ctx.scale);
    debug!(
        surface_height = image.height(),
        bands = placements.len(),
        "flow surface sliced"
    );

    let mut bytes = Vec::new();
    let page_count = {
        let mut writer = PdfWriter::new(&mut bytes, &template.name, layout.page_dimensions());
        for placement in &placements {
            ctx.cancel.check()?;
            writer.add_image_page(&image, placement.src, placement.dst)?;
            debug!(
                page = writer.pages(),
                top = placement.src.top,
                height = placement.src.height(),
                "band placed"
            );
        }
        writer.finish()?
    };

    Ok(PdfArtifact {
        file_name: artifact_file_name(&ctx.bindings.property.name),
        bytes,
        page_count,
    })
}
