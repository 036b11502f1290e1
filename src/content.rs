//! 按元素类型生成内容。纯函数：结果是交给 scene 布局的 [`Node`]，
//! 这里不接触 skia。

use crate::interpolate::{substitute, Bindings};
use crate::record::LocalInfo;
use crate::schema::{Element, ElementKind, TableSource};

/// 分隔线粗细 (pt)
pub const DIVIDER_THICKNESS: f32 = 2.0;

/// 周边信息表格列名，与缺省单元格一样不随语言变化
pub const LOCAL_INFO_HEADERS: [&str; 4] = ["Name", "Category", "Address", "Phone"];
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    /// 居中的灰色提示，例如空的周边信息网格
    Placeholder(String),
    Cards(Vec<Card>),
    Table(TableData),
    QrCode { data: String },
    Image { url: String },
    Rule { thickness: f32 },
    /// 原始标记：已插值，不转义
    Markup(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn render_content(element: &Element, bindings: &Bindings) -> Node {
    let content = &element.content;
    match element.kind {
        ElementKind::Text | ElementKind::Unknown => text_node(content.text.as_deref(), bindings),
        ElementKind::PropertyData => {
            let key = content.data_field.as_deref().unwrap_or_default();
            let raw = bindings.property.field_or_empty(key);
            Node::Text(substitute(raw, bindings))
        }
        ElementKind::LocalInfoGrid => local_info_grid(bindings),
        ElementKind::Table => match content.data_source {
            Some(TableSource::LocalInfo) => Node::Table(local_info_table(bindings)),
            _ => Node::Table(TableData {
                headers: content.headers.clone().unwrap_or_default(),
                rows: content.rows.clone().unwrap_or_default(),
            }),
        },
        ElementKind::QrCode => Node::QrCode {
            data: substitute(content.qr_data.as_deref().unwrap_or_default(), bindings),
        },
        ElementKind::Image => Node::Image {
            url: content.image_url.clone().unwrap_or_default(),
        },
        ElementKind::Divider => Node::Rule {
            thickness: DIVIDER_THICKNESS,
        },
        ElementKind::Spacer => Node::Empty,
        ElementKind::CustomHtml => {
            Node::Markup(substitute(content.html.as_deref().unwrap_or_default(), bindings))
        }
    }
}

fn text_node(text: Option<&str>, bindings: &Bindings) -> Node {
    Node::Text(substitute(text.unwrap_or_default(), bindings))
}

/// 每条周边信息一张卡片，没有记录时显示占位提示
pub fn local_info_grid(bindings: &Bindings) -> Node {
    if bindings.local_info.is_empty() {
        return Node::Placeholder(bindings.strings.get("localInfo.empty").to_string());
    }
    Node::Cards(
        bindings
            .local_info
            .iter()
            .map(|info| local_info_card(info, bindings))
            .collect(),
    )
}

pub fn local_info_card(info: &LocalInfo, bindings: &Bindings) -> Card {
    let mut lines = vec![info.category.clone()];
    if !info.description.is_empty() {
        lines.push(info.description.clone());
    }
    lines.push(info.address.clone());
    if let Some(phone) = info.phone() {
        lines.push(format!("{}: {}", bindings.strings.get("localInfo.phone"), phone));
    }
    if let Some(hours) = info.opening_hours() {
        lines.push(format!("{}: {}", bindings.strings.get("localInfo.hours"), hours));
    }
    Card {
        title: info.name.clone(),
        lines,
    }
}

fn local_info_table(bindings: &Bindings) -> TableData {
    TableData {
        headers: LOCAL_INFO_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows: bindings
            .local_info
            .iter()
            .map(|info| {
                vec![
                    info.name.clone(),
                    info.category.clone(),
                    info.address.clone(),
                    info.phone().unwrap_or(NOT_AVAILABLE).to_string(),
                ]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use crate::interpolate::tests::fixed_now;
    use crate::record::Property;
    use crate::schema::{Content, Position, Styling};

    fn element(kind: ElementKind, content: Content) -> Element {
        Element {
            id: "e".into(),
            kind,
            position: Position::default(),
            order: 0,
            content,
            style: Styling::default(),
            conditions: vec![],
        }
    }

    fn bakery() -> LocalInfo {
        LocalInfo {
            name: "Padaria Sol".into(),
            category: "Bakery".into(),
            address: "Rua 1".into(),
            description: "Fresh bread".into(),
            ..Default::default()
        }
    }

    fn render(el: &Element, property: &Property, local: &[LocalInfo]) -> Node {
        render_in(el, property, local, "en")
    }

    fn render_in(el: &Element, property: &Property, local: &[LocalInfo], locale: &str) -> Node {
        let catalog = Catalog::builtin().unwrap();
        let b = Bindings {
            property,
            local_info: local,
            public_url: "",
            now: fixed_now(),
            strings: catalog.bundle(locale),
        };
        render_content(el, &b)
    }

    #[test]
    fn table_from_local_info_defaults_phone() {
        let el = element(
            ElementKind::Table,
            Content {
                data_source: Some(TableSource::LocalInfo),
                ..Default::default()
            },
        );
        let Node::Table(table) = render(&el, &Property::default(), &[bakery()]) else {
            panic!("expected table");
        };
        assert_eq!(table.headers, ["Name", "Category", "Address", "Phone"]);
        assert_eq!(table.rows, vec![vec!["Padaria Sol", "Bakery", "Rua 1", "N/A"]]);
    }

    #[test]
    fn table_literals_do_not_follow_locale() {
        let el = element(
            ElementKind::Table,
            Content {
                data_source: Some(TableSource::LocalInfo),
                ..Default::default()
            },
        );
        for locale in ["fr", "es"] {
            let Node::Table(table) = render_in(&el, &Property::default(), &[bakery()], locale) else {
                panic!("expected table");
            };
            assert_eq!(table.headers, ["Name", "Category", "Address", "Phone"]);
            assert_eq!(table.rows[0][3], "N/A");
        }
    }

    #[test]
    fn static_table_is_verbatim() {
        let el = element(
            ElementKind::Table,
            Content {
                headers: Some(vec!["Day".into()]),
                rows: Some(vec![vec!["{{propertyName}}".into()]]),
                ..Default::default()
            },
        );
        let Node::Table(table) = render(&el, &Property::default(), &[bakery()]) else {
            panic!("expected table");
        };
        assert_eq!(table.rows[0][0], "{{propertyName}}");
    }

    #[test]
    fn empty_grid_renders_placeholder() {
        let el = element(ElementKind::LocalInfoGrid, Content::default());
        assert_eq!(
            render(&el, &Property::default(), &[]),
            Node::Placeholder("No local information available".into())
        );
    }

    #[test]
    fn cards_only_include_present_optionals() {
        let mut with_phone = bakery();
        with_phone.phone = Some("+351 1".into());
        let el = element(ElementKind::LocalInfoGrid, Content::default());
        let Node::Cards(cards) = render(&el, &Property::default(), &[bakery(), with_phone]) else {
            panic!("expected cards");
        };
        assert_eq!(cards[0].lines, ["Bakery", "Fresh bread", "Rua 1"]);
        assert_eq!(cards[1].lines.last().unwrap(), "Phone: +351 1");
    }

    #[test]
    fn property_data_resolves_then_substitutes() {
        let p = Property {
            name: "Casa Azul".into(),
            house_rules: "No parties at {{propertyName}}".into(),
            ..Default::default()
        };
        let el = element(
            ElementKind::PropertyData,
            Content {
                data_field: Some("houseRules".into()),
                ..Default::default()
            },
        );
        assert_eq!(render(&el, &p, &[]), Node::Text("No parties at Casa Azul".into()));

        let unknown = element(
            ElementKind::PropertyData,
            Content {
                data_field: Some("ownerPhone".into()),
                ..Default::default()
            },
        );
        assert_eq!(render(&unknown, &p, &[]), Node::Text(String::new()));
    }

    #[test]
    fn unknown_kind_uses_text_path_and_html_is_not_escaped() {
        let p = Property {
            name: "<b>Villa</b>".into(),
            ..Default::default()
        };
        let el = element(
            ElementKind::Unknown,
            Content {
                text: Some("Hello".into()),
                ..Default::default()
            },
        );
        assert_eq!(render(&el, &p, &[]), Node::Text("Hello".into()));

        let html = element(
            ElementKind::CustomHtml,
            Content {
                html: Some("<p>{{propertyName}}</p>".into()),
                ..Default::default()
            },
        );
        assert_eq!(render(&html, &p, &[]), Node::Markup("<p><b>Villa</b></p>".into()));
    }
}
