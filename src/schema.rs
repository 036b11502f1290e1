use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 信息手册模板顶层结构
///
/// `body` 决定渲染策略：`flow` (旧版分节流式) 或 `pages` (自由页面/元素)。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(flatten)]
    pub body: TemplateBody,
    #[serde(default)]
    pub styling: TemplateStyling,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// 渲染策略，以 `strategy` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum TemplateBody {
    Flow {
        #[serde(default)]
        sections: Vec<Section>,
    },
    Pages {
        #[serde(default)]
        pages: Vec<Page>,
    },
}

impl TemplateBody {
    pub fn strategy(&self) -> Strategy {
        match self {
            TemplateBody::Flow { .. } => Strategy::Flow,
            TemplateBody::Pages { .. } => Strategy::Pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    Flow,
    Pages,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default = "default_columns")]
    pub columns: u8,
    /// 编辑器吸附网格 (pt)，不影响渲染
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_snap: Option<f32>,
}

fn default_columns() -> u8 {
    1
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            margins: Margins::default(),
            columns: default_columns(),
            grid_snap: None,
        }
    }
}

impl Layout {
    /// 物理页面尺寸 (pt)，已考虑方向
    pub fn page_dimensions(&self) -> (f32, f32) {
        let (w, h) = self.page_size.portrait_pt();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// 页边距内的可打印区域 (pt)
    pub fn content_box(&self) -> (f32, f32, f32, f32) {
        let (w, h) = self.page_dimensions();
        let m = &self.margins;
        (
            m.left,
            m.top,
            (w - m.left - m.right).max(1.0),
            (h - m.top - m.bottom).max(1.0),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
    A3,
    A5,
}

impl PageSize {
    pub fn portrait_pt(self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A5 => (419.53, 595.28),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        // 约 10mm
        Self {
            top: 28.35,
            right: 28.35,
            bottom: 28.35,
            left: 28.35,
        }
    }
}

// -----------------------------------------------------------------------------
// 页面 / 元素模型
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub elements: Vec<Element>,
    /// 已存储但渲染器尚未使用：每个页面始终对应一个物理页
    #[serde(default)]
    pub page_break: PageBreak,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<PageBackground>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageBreak {
    #[default]
    Auto,
    Always,
    Avoid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBackground {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
}

/// 页面上的一个定位元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub position: Position,
    /// 绘制顺序，升序；后绘制的覆盖先绘制的
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub style: Styling,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Text,
    Image,
    Table,
    Divider,
    Spacer,
    PropertyData,
    LocalInfoGrid,
    QrCode,
    CustomHtml,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// 元素内容。字段按元素类型取用，与类型无关的字段被忽略。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// text / unknown: 文本，支持 {{var}} 插值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// property-data: 房源字段键名
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_field: Option<String>,
    /// qr-code: 编码内容，支持插值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<TableSource>,
    /// custom-html: 原始标记，插值后不转义
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableSource {
    LocalInfo,
    Static,
}

// -----------------------------------------------------------------------------
// 样式
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Styling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    /// 支持 "bold", "normal" 或数字 700, 400
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<FontWeight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<Sides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<Sides>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

impl Styling {
    pub fn is_bold(&self) -> bool {
        match &self.font_weight {
            Some(FontWeight::String(s)) => s.eq_ignore_ascii_case("bold"),
            Some(FontWeight::Number(n)) => *n >= 600,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sides {
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub right: f32,
    #[serde(default)]
    pub bottom: f32,
    #[serde(default)]
    pub left: f32,
}

impl Sides {
    pub fn uniform(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Border {
    #[serde(default)]
    pub width: f32,
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BorderStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    #[serde(default)]
    pub offset_x: f32,
    #[serde(default)]
    pub offset_y: f32,
    #[serde(default)]
    pub blur: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// -----------------------------------------------------------------------------
// 显示条件
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    #[serde(alias = "not-equals", alias = "notEquals")]
    NotEquals,
    Contains,
    #[serde(alias = "not-contains", alias = "notContains")]
    NotContains,
    Exists,
    #[serde(alias = "not-exists", alias = "notExists")]
    NotExists,
    #[serde(other)]
    Unknown,
}

// -----------------------------------------------------------------------------
// 旧版分节模型
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub style: SectionStyling,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Header,
    PropertyInfo,
    Checkin,
    Wifi,
    Rules,
    LocalInfo,
    Emergency,
    Footer,
    Custom,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionStyling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f32>,
}

/// 模板全局样式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStyling {
    pub primary_color: String,
    pub secondary_color: String,
    pub background_color: String,
    pub text_color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    pub font_size: f32,
    #[serde(default)]
    pub header_style: HeaderStyle,
    #[serde(default)]
    pub border_radius: f32,
}

impl Default for TemplateStyling {
    fn default() -> Self {
        Self {
            primary_color: "#2563EB".to_string(),
            secondary_color: "#7C3AED".to_string(),
            background_color: "#FFFFFF".to_string(),
            text_color: "#1F2937".to_string(),
            font_family: None,
            font_size: 11.0,
            header_style: HeaderStyle::default(),
            border_radius: 6.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderStyle {
    #[default]
    Flat,
    Gradient,
}

// -----------------------------------------------------------------------------
// 辅助枚举 (Untagged Enums)
// -----------------------------------------------------------------------------

/// 处理 fontWeight 的多态类型 (String 或 Number)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontWeight {
    String(String),
    Number(u16),
}

/// 按 `order` 稳定排序，相同时保持插入顺序
pub fn pages_in_order(pages: &[Page]) -> Vec<&Page> {
    let mut sorted: Vec<&Page> = pages.iter().collect();
    sorted.sort_by_key(|p| p.order);
    sorted
}

/// 绘制顺序：先按 `order`，再按 `zIndex`，最后按插入顺序
pub fn elements_in_paint_order(elements: &[Element]) -> Vec<&Element> {
    let mut sorted: Vec<&Element> = elements.iter().collect();
    sorted.sort_by_key(|e| (e.order, e.style.z_index.unwrap_or(0)));
    sorted
}

pub fn enabled_sections(sections: &[Section]) -> Vec<&Section> {
    let mut sorted: Vec<&Section> = sections.iter().filter(|s| s.enabled).collect();
    sorted.sort_by_key(|s| s.order);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pages_template_with_loose_element_fields() {
        let json = r##"{
            "id": "t1",
            "name": "Welcome book",
            "layout": { "pageSize": "letter", "orientation": "landscape",
                        "margins": { "top": 10, "right": 10, "bottom": 10, "left": 10 },
                        "columns": 1 },
            "strategy": "pages",
            "pages": [{
                "id": "p1", "name": "Cover", "order": 0, "pageBreak": "always",
                "elements": [{
                    "id": "e1", "type": "property-data",
                    "position": { "x": 10, "y": 20, "width": 100, "height": 30 },
                    "content": { "dataField": "wifiPassword" },
                    "style": { "fontWeight": 700, "textAlign": "center" },
                    "conditions": [{ "field": "wifiPassword", "operator": "not-exists" }]
                }, {
                    "id": "e2", "type": "sparkle",
                    "position": { "x": 0, "y": 0, "width": 1, "height": 1 }
                }]
            }]
        }"##;
        let t: Template = serde_json::from_str(json).unwrap();
        assert_eq!(t.body.strategy(), Strategy::Pages);
        assert_eq!(t.layout.page_dimensions(), (792.0, 612.0));
        let TemplateBody::Pages { pages } = &t.body else {
            panic!("expected pages body");
        };
        assert_eq!(pages[0].page_break, PageBreak::Always);
        let e = &pages[0].elements[0];
        assert_eq!(e.kind, ElementKind::PropertyData);
        assert!(e.style.is_bold());
        assert_eq!(e.conditions[0].operator, ConditionOperator::NotExists);
        assert_eq!(pages[0].elements[1].kind, ElementKind::Unknown);
    }

    #[test]
    fn paint_order_is_stable_on_ties() {
        let mk = |id: &str, order: i32| Element {
            id: id.to_string(),
            kind: ElementKind::Spacer,
            position: Position::default(),
            order,
            content: Content::default(),
            style: Styling::default(),
            conditions: vec![],
        };
        let elements = vec![mk("a", 1), mk("b", 0), mk("c", 1), mk("d", 0)];
        let ids: Vec<&str> = elements_in_paint_order(&elements)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, ["b", "d", "a", "c"]);
    }

    #[test]
    fn unknown_operator_is_tolerated() {
        let c: Condition =
            serde_json::from_str(r#"{"field":"name","operator":"matches","value":"x"}"#).unwrap();
        assert_eq!(c.operator, ConditionOperator::Unknown);
    }
}
