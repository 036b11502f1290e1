use chrono::{NaiveDate, NaiveDateTime};
use infobook_agent_lib::engine::{Engine, EngineSettings, RenderRequest};
use infobook_agent_lib::i18n::Catalog;
use infobook_agent_lib::paint::{ImageLoader, Painter};
use infobook_agent_lib::record::{LocalInfo, Property};
use infobook_agent_lib::render::{self, flow::place_bands};
use infobook_agent_lib::scene::Mark;
use infobook_agent_lib::schema::{
    Content, Element, ElementKind, Position, Section, SectionKind, SectionStyling, Strategy,
    Styling, TemplateBody,
};
use infobook_agent_lib::store::new_template;
use infobook_agent_lib::text::Typesetter;
use infobook_agent_lib::worker::CancelToken;
use skia_safe::Color;
use std::sync::Arc;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .and_then(|d| d.and_hms_opt(9, 30, 0))
        .unwrap()
}

fn engine() -> Engine {
    Engine::new(
        Arc::new(Catalog::builtin().unwrap()),
        EngineSettings {
            dpi_scale: 1.0,
            ..Default::default()
        },
    )
}

fn villa() -> Property {
    Property {
        id: "villa-1".into(),
        name: "Seaside Villa".into(),
        ..Default::default()
    }
}

fn element(id: &str, kind: ElementKind, order: i32, content: Content, style: Styling) -> Element {
    Element {
        id: id.into(),
        kind,
        position: Position {
            x: 100.0,
            y: 100.0,
            width: 200.0,
            height: 100.0,
        },
        order,
        content,
        style,
        conditions: vec![],
    }
}

fn pages_request(elements: Vec<Element>, local_info: Vec<LocalInfo>) -> RenderRequest {
    let mut template = new_template("Welcome book", Strategy::Pages).unwrap();
    if let TemplateBody::Pages { pages } = &mut template.body {
        pages[0].elements = elements;
    }
    RenderRequest {
        template,
        property: villa(),
        local_info,
        locale: None,
    }
}

#[test]
fn scenario_a_text_is_substituted_on_first_page() {
    let req = pages_request(
        vec![element(
            "welcome",
            ElementKind::Text,
            0,
            Content {
                text: Some("Welcome to {{propertyName}}".into()),
                ..Default::default()
            },
            Styling::default(),
        )],
        vec![],
    );
    let engine = engine();
    let scenes = engine.layout_at(&req, now());
    assert_eq!(scenes.len(), 1);
    assert!(scenes[0].plain_text().contains("Welcome to Seaside Villa"));

    let artifact = engine.render_at(&req, now(), &CancelToken::new()).unwrap();
    assert_eq!(artifact.page_count, 1);
    assert!(artifact.bytes.starts_with(b"%PDF"));
    assert_eq!(artifact.file_name, "Seaside Villa-information-book.pdf");
}

#[test]
fn scenario_b_empty_local_info_shows_placeholder_without_cards() {
    let req = pages_request(
        vec![element(
            "grid",
            ElementKind::LocalInfoGrid,
            0,
            Content::default(),
            Styling::default(),
        )],
        vec![],
    );
    let scenes = engine().layout_at(&req, now());
    let scene = &scenes[0];
    assert_eq!(scene.plain_text(), "No local information available");

    let Some(Mark::Group { marks, .. }) = scene.marks.last() else {
        panic!("expected element group");
    };
    assert!(marks.iter().all(|m| matches!(m, Mark::Text { .. })));
}

#[test]
fn scenario_c_higher_order_occludes_lower_order() {
    let filled = |hex: &str| Styling {
        background_color: Some(hex.into()),
        ..Default::default()
    };
    // 插入顺序与绘制顺序相反
    let req = pages_request(
        vec![
            element("top", ElementKind::Spacer, 1, Content::default(), filled("#0000FF")),
            element("bottom", ElementKind::Spacer, 0, Content::default(), filled("#FF0000")),
        ],
        vec![],
    );
    let scenes = engine().layout_at(&req, now());
    assert_eq!(scenes[0].group_ids(), ["bottom", "top"]);

    let typesetter = Typesetter::new();
    let loader = ImageLoader::default();
    let mut painter = Painter::new(&typesetter, &loader);
    let image = render::rasterize(&scenes[0], &mut painter, 1.0).unwrap();
    let pixels = image.peek_pixels().unwrap();
    assert_eq!(pixels.get_color((200, 150)), Color::BLUE);
    // 两个盒子之外保持白色
    assert_eq!(pixels.get_color((20, 20)), Color::WHITE);
}

#[test]
fn scenario_d_tall_flow_spans_several_contiguous_pages() {
    let long = (1..=60)
        .map(|i| format!("Rule {i}: please keep {{{{propertyName}}}} tidy."))
        .collect::<Vec<_>>()
        .join("\n");
    let mut template = new_template("Legacy", Strategy::Flow).unwrap();
    template.body = TemplateBody::Flow {
        sections: (0..3)
            .map(|i| Section {
                id: format!("s{i}"),
                kind: SectionKind::Rules,
                title: format!("Part {i}"),
                enabled: true,
                order: i,
                content: long.clone(),
                style: SectionStyling::default(),
            })
            .collect(),
    };
    let req = RenderRequest {
        template,
        property: villa(),
        local_info: vec![],
        locale: None,
    };

    let engine = engine();
    let scenes = engine.layout_at(&req, now());
    let flow = &scenes[0];
    let (_, _, _, content_h) = req.template.layout.content_box();
    assert!(flow.height > content_h * 2.0);
    assert!(flow.plain_text().starts_with("Seaside Villa\nLegacy\nPart 0"));

    let artifact = engine.render_at(&req, now(), &CancelToken::new()).unwrap();
    assert!(artifact.page_count > 1);

    let typesetter = Typesetter::new();
    let loader = ImageLoader::default();
    let mut painter = Painter::new(&typesetter, &loader);
    let image = render::rasterize(flow, &mut painter, 1.0).unwrap();
    let placed = place_bands(
        (image.width(), image.height()),
        req.template.layout.content_box(),
        1.0,
    );
    assert_eq!(placed.len(), artifact.page_count);

    let (left, top, width, _) = req.template.layout.content_box();
    assert_eq!(placed[0].src.top, 0.0);
    for pair in placed.windows(2) {
        // 相邻切片之间没有间隙也没有重叠
        assert_eq!(pair[0].src.bottom, pair[1].src.top);
        assert!(pair[0].src.top < pair[1].src.top);
    }
    for p in &placed {
        assert_eq!(p.src.left, 0.0);
        assert_eq!(p.src.width(), image.width() as f32);
        assert!(p.src.height() <= content_h.floor());
        assert_eq!((p.dst.left, p.dst.top, p.dst.width()), (left, top, width));
        assert_eq!(p.dst.height(), p.src.height());
    }
    assert_eq!(placed.last().unwrap().src.bottom, image.height() as f32);
}

#[test]
fn french_render_keeps_table_literals() {
    let mut req = pages_request(
        vec![element(
            "table",
            ElementKind::Table,
            0,
            Content {
                data_source: Some(infobook_agent_lib::schema::TableSource::LocalInfo),
                ..Default::default()
            },
            Styling::default(),
        )],
        vec![LocalInfo {
            name: "Boulangerie".into(),
            category: "Bakery".into(),
            address: "Rue 2".into(),
            ..Default::default()
        }],
    );
    req.locale = Some("fr".into());
    let text = engine().layout_at(&req, now())[0].plain_text();
    assert_eq!(text, "Name\nCategory\nAddress\nPhone\nBoulangerie\nBakery\nRue 2\nN/A");
}

#[test]
fn cancelled_token_stops_the_render() {
    let req = pages_request(vec![], vec![]);
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(engine().render_at(&req, now(), &cancel).is_err());
}

#[test]
fn hidden_elements_do_not_render() {
    use infobook_agent_lib::schema::{Condition, ConditionOperator};
    let mut wifi = element(
        "wifi",
        ElementKind::PropertyData,
        0,
        Content {
            data_field: Some("wifiPassword".into()),
            ..Default::default()
        },
        Styling::default(),
    );
    wifi.conditions = vec![Condition {
        field: "wifiPassword".into(),
        operator: ConditionOperator::Exists,
        value: String::new(),
    }];
    let mut req = pages_request(vec![wifi], vec![]);
    assert!(engine().layout_at(&req, now())[0].group_ids().is_empty());

    req.property.wifi_password = "sunny123".into();
    let scenes = engine().layout_at(&req, now());
    assert_eq!(scenes[0].plain_text(), "sunny123");
}

#[test]
fn local_info_table_defaults_missing_phone() {
    let req = pages_request(
        vec![element(
            "table",
            ElementKind::Table,
            0,
            Content {
                data_source: Some(infobook_agent_lib::schema::TableSource::LocalInfo),
                ..Default::default()
            },
            Styling::default(),
        )],
        vec![LocalInfo {
            name: "Padaria Sol".into(),
            category: "Bakery".into(),
            address: "Rua 1".into(),
            ..Default::default()
        }],
    );
    let text = engine().layout_at(&req, now())[0].plain_text();
    assert_eq!(text, "Name\nCategory\nAddress\nPhone\nPadaria Sol\nBakery\nRua 1\nN/A");
}
