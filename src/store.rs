//! 模板持久化边界：新建、规范化、JSON 导入 / 导出与复制。
//! 存储本身不在本 crate 内。

use crate::error::TemplateError;
use crate::schema::{
    ElementKind, Layout, Page, PageBreak, Section, SectionKind, SectionStyling, Strategy,
    Template, TemplateBody, TemplateStyling,
};
use chrono::Utc;
use uuid::Uuid;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn default_page(order: i32) -> Page {
    Page {
        id: new_id(),
        name: format!("Page {}", order + 1),
        order,
        elements: Vec::new(),
        page_break: PageBreak::Auto,
        background: None,
    }
}

/// 新建流式模板的标准分节
pub fn default_sections() -> Vec<Section> {
    [
        (SectionKind::Header, "Welcome"),
        (SectionKind::PropertyInfo, "About the property"),
        (SectionKind::Checkin, "Check-in"),
        (SectionKind::Wifi, "WiFi"),
        (SectionKind::Rules, "House rules"),
        (SectionKind::LocalInfo, "Around the area"),
        (SectionKind::Emergency, "Emergency contacts"),
        (SectionKind::Footer, "{{publicUrl}}"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (kind, title))| Section {
        id: new_id(),
        kind,
        title: title.to_string(),
        enabled: true,
        order: i as i32,
        content: String::new(),
        style: SectionStyling::default(),
    })
    .collect()
}

pub fn new_template(name: &str, strategy: Strategy) -> Result<Template, TemplateError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TemplateError::MissingName);
    }
    let now = Utc::now();
    let body = match strategy {
        Strategy::Flow => TemplateBody::Flow {
            sections: default_sections(),
        },
        Strategy::Pages => TemplateBody::Pages {
            pages: vec![default_page(0)],
        },
    };
    Ok(Template {
        id: new_id(),
        name: name.to_string(),
        layout: Layout::default(),
        body,
        styling: TemplateStyling::default(),
        created_at: now,
        updated_at: now,
    })
}

/// 页面模板至少有一页
pub fn normalize(template: &mut Template) {
    if let TemplateBody::Pages { pages } = &mut template.body {
        if pages.is_empty() {
            tracing::debug!(template = %template.id, "materializing default page");
            pages.push(default_page(0));
        }
    }
}

fn regenerate_ids(template: &mut Template) {
    template.id = new_id();
    if let TemplateBody::Pages { pages } = &mut template.body {
        for page in pages {
            page.id = new_id();
        }
    }
    let now = Utc::now();
    template.created_at = now;
    template.updated_at = now;
}

/// 解析导出的模板，并重新生成 id，避免与已存储的模板冲突
pub fn import(json: &str) -> Result<Template, TemplateError> {
    let mut template: Template = serde_json::from_str(json)?;
    if template.name.trim().is_empty() {
        return Err(TemplateError::MissingName);
    }
    regenerate_ids(&mut template);
    normalize(&mut template);
    Ok(template)
}

pub fn export(template: &Template) -> Result<String, TemplateError> {
    Ok(serde_json::to_string_pretty(template)?)
}

pub fn duplicate(template: &Template) -> Template {
    let mut copy = template.clone();
    copy.name = format!("{} (copy)", template.name);
    regenerate_ids(&mut copy);
    normalize(&mut copy);
    copy
}

pub fn contains_custom_html(template: &Template) -> bool {
    match &template.body {
        TemplateBody::Pages { pages } => pages
            .iter()
            .flat_map(|p| &p.elements)
            .any(|e| e.kind == ElementKind::CustomHtml),
        TemplateBody::Flow { .. } => false,
    }
}
