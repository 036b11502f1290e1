//! 页面模板渲染：每个页面对应一个栅格 surface 和一个 PDF 页

use super::{rasterize, RenderContext};
use crate::content::render_content;
use crate::error::RenderError;
use crate::interpolate::Bindings;
use crate::paint::{parse_color_opt, Painter};
use crate::pdf::{artifact_file_name, PdfArtifact, PdfWriter};
use crate::scene::{Frame, Mark, Scene, SceneBuilder};
use crate::schema::{elements_in_paint_order, pages_in_order, Layout, Page};
use crate::visibility::is_visible;
use skia_safe::Rect;
use tracing::debug;

/// 先画背景，再按绘制顺序画所有可见元素。
/// 隐藏元素不会出现在 scene 中
pub fn build_page_scene(
    page: &Page,
    layout: &Layout,
    builder: &SceneBuilder,
    bindings: &Bindings,
) -> Scene {
    let (width, height) = layout.page_dimensions();
    let mut scene = Scene::new(width, height);
    let full = Rect::from_wh(width, height);

    if let Some(background) = &page.background {
        if let Some(color) = background.color.as_deref().and_then(parse_color_opt) {
            scene.marks.push(Mark::Box {
                rect: full,
                frame: Frame::solid(color),
            });
        }
        if let Some(source) = background.image.as_deref().filter(|s| !s.is_empty()) {
            scene.marks.push(Mark::Backdrop {
                rect: full,
                source: source.to_string(),
                opacity: background.opacity.unwrap_or(1.0).clamp(0.0, 1.0),
            });
        }
    }

    for element in elements_in_paint_order(&page.elements) {
        if !is_visible(element, bindings.property) {
            continue;
        }
        let node = render_content(element, bindings);
        scene.marks.push(builder.element(element, &node));
    }
    scene
}

/// 每个页面恰好生成一个 PDF 页，不读取 `pageBreak`
pub fn render(ctx: &RenderContext, pages: &[Page]) -> Result<PdfArtifact, RenderError> {
    let ordered = pages_in_order(pages);
    if ordered.is_empty() {
        return Err(RenderError::NoPages);
    }

    let template = ctx.template;
    let layout = &template.layout;
    let builder = SceneBuilder::new(ctx.typesetter, &template.styling);
    let mut painter = Painter::new(ctx.typesetter, ctx.images);
    let (left, top, width, height) = layout.content_box();
    let dst = Rect::from_xywh(left, top, width, height);

    let mut bytes = Vec::new();
    let page_count = {
        let mut writer = PdfWriter::new(&mut bytes, &template.name, layout.page_dimensions());
        for page in ordered {
            ctx.cancel.check()?;
            let scene = build_page_scene(page, layout, &builder, &ctx.bindings);
            let image = rasterize(&scene, &mut painter, ctx.scale)?;
            let src = Rect::from_wh(image.width() as f32, image.height() as f32);
            writer.add_image_page(&image, src, dst)?;
            debug!(
                page = %page.id,
                elements = scene.group_ids().len(),
                "page rasterized"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use crate::interpolate::tests::fixed_now;
    use crate::record::Property;
    use crate::schema::{
        Condition, ConditionOperator, Content, Element, ElementKind, PageBackground,
        PageBreak, Position, Styling, TemplateStyling,
    };
    use crate::text::Typesetter;

    fn text_element(id: &str, order: i32, conditions: Vec<Condition>) -> Element {
        Element {
            id: id.into(),
            kind: ElementKind::Text,
            position: Position {
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 20.0,
            },
            order,
            content: Content {
                text: Some(id.to_uppercase()),
                ..Default::default()
            },
            style: Styling::default(),
            conditions,
        }
    }

    #[test]
    fn hidden_elements_are_skipped_and_order_is_kept() {
        let page = Page {
            id: "p".into(),
            name: "Page".into(),
            order: 0,
            elements: vec![
                text_element("b", 1, vec![]),
                text_element(
                    "wifi",
                    0,
                    vec![Condition {
                        field: "wifiPassword".into(),
                        operator: ConditionOperator::Exists,
                        value: String::new(),
                    }],
                ),
                text_element("a", 0, vec![]),
            ],
            page_break: PageBreak::default(),
            background: Some(PageBackground {
                color: Some("#eeeeee".into()),
                image: Some(String::new()),
                opacity: None,
            }),
        };
        let ts = Typesetter::new();
        let theme = TemplateStyling::default();
        let builder = SceneBuilder::new(&ts, &theme);
        let catalog = Catalog::builtin().unwrap();
        let property = Property::default();
        let bindings = Bindings {
            property: &property,
            local_info: &[],
            public_url: "",
            now: fixed_now(),
            strings: catalog.bundle("en"),
        };
        let scene = build_page_scene(&page, &Layout::default(), &builder, &bindings);
        assert_eq!(scene.group_ids(), ["a", "b"]);
        assert!(matches!(scene.marks[0], Mark::Box { .. }));
        assert_eq!(scene.marks.len(), 3);
        assert_eq!(scene.plain_text(), "A\nB");
    }
}
