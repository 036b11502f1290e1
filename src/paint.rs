use crate::scene::{Fill, Frame, Mark, Scene, Stroke};
use crate::schema::BorderStyle;
use crate::text::Typesetter;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use qrcode::{EcLevel, QrCode};
use skia_safe::{
    images, BlurStyle, Canvas, ClipOp, Color, Data, Image, MaskFilter, Paint, PaintStyle, PathEffect,
    Point, RRect, Rect, Shader, TileMode,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 在 skia canvas 上执行 [`Scene`]，持有单次渲染的图片缓存
pub struct Painter<'a> {
    typesetter: &'a Typesetter,
    loader: &'a ImageLoader,
    images: HashMap<String, Option<Image>>,
}

impl<'a> Painter<'a> {
    pub fn new(typesetter: &'a Typesetter, loader: &'a ImageLoader) -> Self {
        Self {
            typesetter,
            loader,
            images: HashMap::new(),
        }
    }

    /// 以每 pt `scale` 像素绘制 `scene`
    pub fn paint_scene(&mut self, canvas: &Canvas, scene: &Scene, scale: f32) {
        canvas.save();
        canvas.scale((scale, scale));
        for mark in &scene.marks {
            self.paint_mark(canvas, mark);
        }
        canvas.restore();
    }

    fn paint_mark(&mut self, canvas: &Canvas, mark: &Mark) {
        match mark {
            Mark::Box { rect, frame } => draw_frame(canvas, *rect, frame),
            Mark::Text { rect, block } => {
                self.typesetter.paint(canvas, block, *rect);
            }
            Mark::Image { rect, source } => self.draw_image(canvas, *rect, source),
            Mark::QrCode { rect, data } => draw_qr_code(canvas, *rect, data),
            Mark::Rule { rect, color } => {
                let mut p = Paint::default();
                p.set_style(PaintStyle::Fill);
                p.set_color(*color);
                canvas.draw_rect(*rect, &p);
            }
            Mark::Backdrop {
                rect,
                source,
                opacity,
            } => self.draw_background_image(canvas, *rect, source, *opacity),
            Mark::Group { opacity, marks, .. } => {
                if *opacity < 1.0 {
                    // 阴影可能超出 bounds，图层不限定范围
                    canvas.save_layer_alpha(None, (opacity * 255.0).round() as u32);
                } else {
                    canvas.save();
                }
                for m in marks {
                    self.paint_mark(canvas, m);
                }
                canvas.restore();
            }
        }
    }

    fn image(&mut self, source: &str) -> Option<Image> {
        if let Some(cached) = self.images.get(source) {
            return cached.clone();
        }
        let loaded = self.loader.load(source);
        if loaded.is_none() && !source.is_empty() {
            tracing::warn!(source = %truncate(source, 80), "image could not be decoded, drawing placeholder");
        }
        self.images.insert(source.to_string(), loaded.clone());
        loaded
    }

    fn draw_image(&mut self, canvas: &Canvas, rect: Rect, source: &str) {
        match self.image(source) {
            Some(image) => draw_image_cover(canvas, &image, rect, 1.0),
            None => draw_image_placeholder(canvas, rect),
        }
    }

    fn draw_background_image(&mut self, canvas: &Canvas, rect: Rect, source: &str, opacity: f32) {
        if let Some(image) = self.image(source) {
            draw_image_cover(canvas, &image, rect, opacity);
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

pub fn draw_frame(canvas: &Canvas, rect: Rect, frame: &Frame) {
    let rrect = RRect::new_rect_xy(rect, frame.radius, frame.radius);

    if let Some(shadow) = &frame.shadow {
        let mut p = Paint::default();
        p.set_anti_alias(true);
        p.set_color(shadow.color);
        if shadow.blur > 0.0 {
            if let Some(mf) = MaskFilter::blur(BlurStyle::Normal, shadow.blur / 2.0, false) {
                p.set_mask_filter(mf);
            }
        }
        canvas.draw_rrect(rrect.with_offset((shadow.dx, shadow.dy)), &p);
    }

    if let Some(fill) = &frame.fill {
        let mut p = Paint::default();
        p.set_anti_alias(true);
        p.set_style(PaintStyle::Fill);
        match fill {
            Fill::Solid(color) => {
                p.set_color(*color);
            }
            Fill::Gradient(from, to) => {
                let colors: &[Color] = &[*from, *to];
                if let Some(shader) = Shader::linear_gradient(
                    (
                        Point::new(rect.left, rect.top),
                        Point::new(rect.right, rect.top),
                    ),
                    colors,
                    None,
                    TileMode::Clamp,
                    None,
                    None,
                ) {
                    p.set_shader(shader);
                } else {
                    p.set_color(*from);
                }
            }
        }
        canvas.draw_rrect(rrect, &p);
    }

    if let Some(stroke) = &frame.stroke {
        canvas.draw_rrect(rrect, &stroke_paint(stroke));
    }
}

fn stroke_paint(stroke: &Stroke) -> Paint {
    let mut p = Paint::default();
    p.set_anti_alias(true);
    p.set_style(PaintStyle::Stroke);
    p.set_stroke_width(stroke.width);
    p.set_color(stroke.color);
    let w = stroke.width.max(0.5);
    let intervals: Option<[f32; 2]> = match stroke.style {
        BorderStyle::Dashed => Some([w * 3.0, w * 2.0]),
        BorderStyle::Dotted => Some([w, w]),
        _ => None,
    };
    if let Some(intervals) = intervals {
        p.set_path_effect(PathEffect::dash(&intervals, 0.0));
    }
    p
}

/// `object-fit: cover`：缩放铺满，超出部分两侧均匀裁掉
pub fn cover_source_rect(image_w: f32, image_h: f32, dst: Rect) -> Rect {
    if image_w <= 0.0 || image_h <= 0.0 || dst.width() <= 0.0 || dst.height() <= 0.0 {
        return Rect::from_wh(image_w.max(0.0), image_h.max(0.0));
    }
    let image_ratio = image_w / image_h;
    let box_ratio = dst.width() / dst.height();
    if image_ratio > box_ratio {
        let w = image_h * box_ratio;
        Rect::from_xywh((image_w - w) / 2.0, 0.0, w, image_h)
    } else {
        let h = image_w / box_ratio;
        Rect::from_xywh(0.0, (image_h - h) / 2.0, image_w, h)
    }
}

fn draw_image_cover(canvas: &Canvas, image: &Image, rect: Rect, opacity: f32) {
    let src = cover_source_rect(image.width() as f32, image.height() as f32, rect);
    let mut p = Paint::default();
    p.set_anti_alias(true);
    p.set_alpha_f(opacity.clamp(0.0, 1.0));
    canvas.save();
    canvas.clip_rect(rect, ClipOp::Intersect, true);
    canvas.draw_image_rect(
        image,
        Some((&src, skia_safe::canvas::SrcRectConstraint::Fast)),
        rect,
        &p,
    );
    canvas.restore();
}

fn draw_image_placeholder(canvas: &Canvas, rect: Rect) {
    let mut p = Paint::default();
    p.set_color(Color::LIGHT_GRAY);
    p.set_style(PaintStyle::Fill);
    canvas.draw_rect(rect, &p);

    p.set_color(Color::RED);
    p.set_style(PaintStyle::Stroke);
    p.set_stroke_width(1.0);
    canvas.draw_line(Point::new(rect.left(), rect.top()), Point::new(rect.right(), rect.bottom()), &p);
    canvas.draw_line(Point::new(rect.right(), rect.top()), Point::new(rect.left(), rect.bottom()), &p);
}

/// 绘制二维码；内容无法编码时绘制虚线占位框
pub fn draw_qr_code(canvas: &Canvas, rect: Rect, text: &str) {
    let code = if text.is_empty() {
        None
    } else {
        QrCode::with_error_correction_level(text.as_bytes(), EcLevel::M).ok()
    };
    let Some(code) = code else {
        let stroke = Stroke {
            width: 1.0,
            color: Color::GRAY,
            style: BorderStyle::Dashed,
        };
        canvas.draw_rect(rect, &stroke_paint(&stroke));
        return;
    };

    let modules_count = code.width();
    let module_size = rect.width().min(rect.height()) / modules_count as f32;

    let mut p = Paint::default();
    p.set_color(Color::BLACK);
    p.set_style(PaintStyle::Fill);
    p.set_anti_alias(false); // 二维码不需要抗锯齿，要锐利

    let colors = code.to_colors();
    for (i, color) in colors.iter().enumerate() {
        if matches!(color, qrcode::Color::Dark) {
            let row = i / modules_count;
            let col = i % modules_count;
            let cell = Rect::from_xywh(
                rect.left + col as f32 * module_size,
                rect.top + row as f32 * module_size,
                module_size,
                module_size,
            );
            canvas.draw_rect(cell, &p);
        }
    }
}

/// 图片数据来源：`data:` URI 总是解码，远程 URL 从不请求，
/// 本地文件只允许 `asset_dir` 目录内的
#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    asset_dir: Option<PathBuf>,
}

impl ImageLoader {
    pub fn new(asset_dir: Option<PathBuf>) -> Self {
        Self { asset_dir }
    }

    pub fn load(&self, source: &str) -> Option<Image> {
        let bytes = if let Some(rest) = source.strip_prefix("data:") {
            decode_data_uri(rest)?
        } else if source.starts_with("http://") || source.starts_with("https://") || source.is_empty() {
            return None;
        } else {
            let path = self.resolve(source.strip_prefix("file://").unwrap_or(source))?;
            std::fs::read(path).ok()?
        };
        images::deferred_from_encoded_data(Data::new_copy(&bytes), None)
    }

    /// `path` 的规范化路径，仅当它位于资源目录内
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let Some(root) = self.asset_dir.as_deref() else {
            tracing::warn!(path = %truncate(path, 80), "local image paths are disabled");
            return None;
        };
        let root = root.canonicalize().ok()?;
        let full = root.join(Path::new(path)).canonicalize().ok()?;
        if full.starts_with(&root) {
            Some(full)
        } else {
            tracing::warn!(path = %truncate(path, 80), "image path outside the asset directory");
            None
        }
    }
}

fn decode_data_uri(rest: &str) -> Option<Vec<u8>> {
    let (meta, payload) = rest.split_once(',')?;
    if meta.ends_with(";base64") {
        BASE64.decode(payload.trim()).ok()
    } else {
        Some(payload.as_bytes().to_vec())
    }
}

/// 支持 `#RGB`、`#RRGGBB`、`#RRGGBBAA` 和少量颜色名，其余按黑色处理
pub fn parse_color(spec: &str) -> Color {
    parse_color_opt(spec).unwrap_or(Color::BLACK)
}

pub fn parse_color_opt(spec: &str) -> Option<Color> {
    let s = spec.trim();
    match s.to_ascii_lowercase().as_str() {
        "white" => return Some(Color::WHITE),
        "black" => return Some(Color::BLACK),
        "transparent" => return Some(Color::TRANSPARENT),
        _ => {}
    }
    let hex = s.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => {
            let nib = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(Color::from_rgb(nib(0)?, nib(1)?, nib(2)?))
        }
        6 => Some(Color::from_rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::from_argb(byte(6)?, byte(0)?, byte(2)?, byte(4)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors() {
        assert_eq!(parse_color("#ff8000"), Color::from_rgb(255, 128, 0));
        assert_eq!(parse_color("#FFF"), Color::WHITE);
        assert_eq!(parse_color("#00000080"), Color::from_argb(0x80, 0, 0, 0));
        assert_eq!(parse_color("tomato"), Color::BLACK);
        assert_eq!(parse_color_opt("#12"), None);
    }

    #[test]
    fn cover_crops_the_long_side() {
        let dst = Rect::from_wh(100.0, 100.0);
        assert_eq!(cover_source_rect(200.0, 100.0, dst), Rect::from_xywh(50.0, 0.0, 100.0, 100.0));
        assert_eq!(cover_source_rect(100.0, 400.0, dst), Rect::from_xywh(0.0, 150.0, 100.0, 100.0));
    }

    #[test]
    fn unloadable_sources_yield_none() {
        let loader = ImageLoader::default();
        assert!(loader.load("").is_none());
        assert!(loader.load("https://example.com/a.png").is_none());
        assert!(loader.load("data:image/png;base64,not-base64!!").is_none());
        assert!(loader.load("/definitely/not/here.png").is_none());
    }

    fn write_png(path: &Path) {
        let mut surface = skia_safe::surfaces::raster_n32_premul((4, 4)).unwrap();
        surface.canvas().clear(Color::RED);
        let png = surface
            .image_snapshot()
            .encode(None, skia_safe::EncodedImageFormat::PNG, 100)
            .unwrap();
        std::fs::write(path, png.as_bytes()).unwrap();
    }

    #[test]
    fn local_files_are_refused_without_asset_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        write_png(&path);
        let loader = ImageLoader::default();
        assert!(loader.load(&path.to_string_lossy()).is_none());
        assert!(loader.load(&format!("file://{}", path.display())).is_none());
    }

    #[test]
    fn local_files_load_only_inside_asset_dir() {
        let root = tempfile::tempdir().unwrap();
        let assets = root.path().join("assets");
        std::fs::create_dir(&assets).unwrap();
        write_png(&assets.join("logo.png"));
        write_png(&root.path().join("secret.png"));

        let loader = ImageLoader::new(Some(assets.clone()));
        assert!(loader.load("logo.png").is_some());
        assert!(loader.load(&assets.join("logo.png").to_string_lossy()).is_some());
        assert!(loader.load("../secret.png").is_none());
        assert!(loader.load(&root.path().join("secret.png").to_string_lossy()).is_none());
    }
}
