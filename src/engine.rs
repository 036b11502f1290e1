use crate::config::Config;
use crate::error::RenderError;
use crate::i18n::{Catalog, DEFAULT_LOCALE};
use crate::interpolate::Bindings;
use crate::paint::{ImageLoader, Painter};
use crate::pdf::{check_header, PdfArtifact};
use crate::record::{LocalInfo, Property};
use crate::render::{self, flow, pages, RenderContext};
use crate::scene::{Scene, SceneBuilder};
use crate::schema::{pages_in_order, Template, TemplateBody};
use crate::text::Typesetter;
use crate::worker::CancelToken;
use chrono::{Local, NaiveDateTime};
use serde::Deserialize;
use skia_safe::EncodedImageFormat;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 一次生成请求：模板快照 + 绑定数据
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub template: Template,
    pub property: Property,
    #[serde(default)]
    pub local_info: Vec<LocalInfo>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 每 pt 的像素数
    pub dpi_scale: f32,
    pub public_base_url: String,
    pub default_locale: String,
    /// 本地图片路径的根目录；`None` 时拒绝本地路径
    pub asset_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dpi_scale: 2.0,
            public_base_url: "http://localhost:18088/p".to_string(),
            default_locale: DEFAULT_LOCALE.to_string(),
            asset_dir: None,
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            dpi_scale: config.dpi_scale,
            public_base_url: config.public_base_url.clone(),
            default_locale: config.default_locale.clone(),
            asset_dir: config.asset_dir.clone(),
        }
    }
}

/// 同步渲染管线。一次调用完成一遍完整渲染，不修改模板。
pub struct Engine {
    catalog: Arc<Catalog>,
    settings: EngineSettings,
    images: ImageLoader,
}

impl Engine {
    pub fn new(catalog: Arc<Catalog>, settings: EngineSettings) -> Self {
        let images = ImageLoader::new(settings.asset_dir.clone());
        Engine {
            catalog,
            settings,
            images,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn public_url(&self, property: &Property) -> String {
        format!(
            "{}/{}",
            self.settings.public_base_url.trim_end_matches('/'),
            property.id
        )
    }

    fn locale<'r>(&'r self, request: &'r RenderRequest) -> &'r str {
        request
            .locale
            .as_deref()
            .unwrap_or(&self.settings.default_locale)
    }

    pub fn render(
        &self,
        request: &RenderRequest,
        cancel: &CancelToken,
    ) -> Result<PdfArtifact, RenderError> {
        self.render_at(request, Local::now().naive_local(), cancel)
    }

    /// 以固定时钟 `now` 渲染
    pub fn render_at(
        &self,
        request: &RenderRequest,
        now: NaiveDateTime,
        cancel: &CancelToken,
    ) -> Result<PdfArtifact, RenderError> {
        let template = &request.template;
        let strategy = template.body.strategy();
        info!(
            template = %template.id,
            property = %request.property.id,
            ?strategy,
            "render started"
        );

        let public_url = self.public_url(&request.property);
        let typesetter = Typesetter::new();
        let ctx = RenderContext {
            template,
            bindings: Bindings {
                property: &request.property,
                local_info: &request.local_info,
                public_url: &public_url,
                now,
                strings: self.catalog.bundle(self.locale(request)),
            },
            typesetter: &typesetter,
            images: &self.images,
            scale: self.settings.dpi_scale,
            cancel,
        };

        let artifact = match &template.body {
            TemplateBody::Flow { sections } => flow::render(&ctx, sections)?,
            TemplateBody::Pages { pages } => pages::render(&ctx, pages)?,
        };
        check_header(&artifact.bytes)?;

        info!(
            template = %template.id,
            pages = artifact.page_count,
            bytes = artifact.bytes.len(),
            file = %artifact.file_name,
            "render finished"
        );
        Ok(artifact)
    }

    /// 只布局不栅格化：流式模板返回一个 scene，页面模板按顺序每页一个
    pub fn layout_at(&self, request: &RenderRequest, now: NaiveDateTime) -> Vec<Scene> {
        let public_url = self.public_url(&request.property);
        let typesetter = Typesetter::new();
        let bindings = Bindings {
            property: &request.property,
            local_info: &request.local_info,
            public_url: &public_url,
            now,
            strings: self.catalog.bundle(self.locale(request)),
        };
        let template = &request.template;
        let builder = SceneBuilder::new(&typesetter, &template.styling);
        match &template.body {
            TemplateBody::Flow { sections } => {
                vec![flow::build_flow_scene(template, sections, &builder, &bindings)]
            }
            TemplateBody::Pages { pages } => pages_in_order(pages)
                .into_iter()
                .map(|page| pages::build_page_scene(page, &template.layout, &builder, &bindings))
                .collect(),
        }
    }

    /// 按配置的 DPI 倍率输出单个 scene 的 PNG
    pub fn preview_png(
        &self,
        request: &RenderRequest,
        index: usize,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, RenderError> {
        let scenes = self.layout_at(request, Local::now().naive_local());
        let scene = scenes.get(index).ok_or(RenderError::NoPages)?;
        cancel.check()?;
        let typesetter = Typesetter::new();
        let mut painter = Painter::new(&typesetter, &self.images);
        let image = render::rasterize(scene, &mut painter, self.settings.dpi_scale)?;
        let data = image
            .encode(None, EncodedImageFormat::PNG, 100)
            .ok_or_else(|| RenderError::Snapshot("PNG encoding failed".into()))?;
        Ok(data.as_bytes().to_vec())
    }
}
