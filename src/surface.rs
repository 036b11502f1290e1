use crate::error::RenderError;
use skia_safe::{surfaces, Canvas, Color, Image, Surface};
use std::sync::atomic::{AtomicUsize, Ordering};

static LIVE: AtomicUsize = AtomicUsize::new(0);

/// 一次绘制期间独占的离屏栅格 surface，
/// 无论渲染如何结束，drop 时都会释放
pub struct ScratchSurface {
    surface: Surface,
    width: i32,
    height: i32,
}

impl ScratchSurface {
    pub fn new(width: i32, height: i32) -> Result<Self, RenderError> {
        if width <= 0 || height <= 0 {
            return Err(RenderError::Surface { width, height });
        }
        let mut surface = surfaces::raster_n32_premul((width, height))
            .ok_or(RenderError::Surface { width, height })?;
        surface.canvas().clear(Color::WHITE);
        LIVE.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(width, height, "scratch surface allocated");
        Ok(Self {
            surface,
            width,
            height,
        })
    }

    pub fn canvas(&mut self) -> &Canvas {
        self.surface.canvas()
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// 栅格化当前画布内容
    pub fn snapshot(&mut self) -> Image {
        self.surface.image_snapshot()
    }
}

impl Drop for ScratchSurface {
    fn drop(&mut self) {
        LIVE.fetch_sub(1, Ordering::SeqCst);
        tracing::debug!(width = self.width, height = self.height, "scratch surface released");
    }
}

/// 当前进程中仍存活的临时 surface 数量
pub fn live_surfaces() -> usize {
    LIVE.load(Ordering::SeqCst)
}

/// `points` 按 `scale` 换算成像素，至少 1 像素
pub fn to_pixels(points: f32, scale: f32) -> i32 {
    ((points * scale).ceil() as i32).max(1)
}
