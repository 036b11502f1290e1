//! 两种渲染策略。两者收尾相同：[`Scene`] 绘制到临时栅格 surface，
//! 截取快照后放到 PDF 页面上。

pub mod flow;
pub mod pages;

use crate::error::RenderError;
use crate::interpolate::Bindings;
use crate::paint::{ImageLoader, Painter};
use crate::scene::Scene;
use crate::schema::Template;
use crate::surface::{to_pixels, ScratchSurface};
use crate::text::Typesetter;
use crate::worker::CancelToken;
use skia_safe::Image;

/// 一次渲染的只读输入
pub struct RenderContext<'a> {
    pub template: &'a Template,
    pub bindings: Bindings<'a>,
    pub typesetter: &'a Typesetter,
    pub images: &'a ImageLoader,
    /// 每 pt 的像素数
    pub scale: f32,
    pub cancel: &'a CancelToken,
}

/// 在新 surface 上绘制 `scene` 并返回快照。
/// 无论绘制成功与否，返回前 surface 都已释放
pub fn rasterize(scene: &Scene, painter: &mut Painter, scale: f32) -> Result<Image, RenderError> {
    let mut surface = ScratchSurface::new(
        to_pixels(scene.width, scale),
        to_pixels(scene.height, scale),
    )?;
    painter.paint_scene(surface.canvas(), scene, scale);
    let image = surface.snapshot();
    if image.width() <= 0 || image.height() <= 0 {
        return Err(RenderError::Snapshot(format!(
            "empty snapshot of a {}x{} surface",
            surface.size().0,
            surface.size().1
        )));
    }
    Ok(image)
}
