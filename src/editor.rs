//! 页面模板的交互式布局编辑器核心
//!
//! 每次提交的修改都把整份模板快照压入线性撤销历史。
//! 选中操作不产生历史；拖动或缩放过程中实时更新，
//! 松开时只记录一条历史。

use crate::error::TemplateError;
use crate::schema::{
    Condition, Content, Element, ElementKind, Page, Position, Styling, Template, TemplateBody,
};
use crate::store::{default_page, new_id, normalize};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

pub const HISTORY_LIMIT: usize = 100;
const MIN_SIZE: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Editing {
        page: String,
        element: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorOutcome {
    Saved(Template),
    Cancelled,
}

/// 要替换的元素字段；`None` 表示不修改
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementPatch {
    pub position: Option<Position>,
    pub order: Option<i32>,
    pub content: Option<Content>,
    pub style: Option<Styling>,
    pub conditions: Option<Vec<Condition>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureKind {
    Drag,
    Resize,
}

#[derive(Debug, Clone)]
struct Gesture {
    kind: GestureKind,
    element: String,
    pointer: (f32, f32),
    origin: Position,
    before: Template,
}

pub struct Editor {
    template: Template,
    state: EditorState,
    undo: Vec<Template>,
    redo: Vec<Template>,
    gesture: Option<Gesture>,
}

impl Editor {
    pub fn open(mut template: Template) -> Result<Self, TemplateError> {
        if !matches!(template.body, TemplateBody::Pages { .. }) {
            return Err(TemplateError::NotPageBased);
        }
        normalize(&mut template);
        Ok(Self {
            template,
            state: EditorState::Idle,
            undo: Vec::new(),
            redo: Vec::new(),
            gesture: None,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.undo.len()
    }

    pub fn pages(&self) -> &[Page] {
        pages(&self.template)
    }

    pub fn selected_page(&self) -> Option<&str> {
        match &self.state {
            EditorState::Editing { page, .. } => Some(page),
            EditorState::Idle => None,
        }
    }

    pub fn selected_element(&self) -> Option<&str> {
        match &self.state {
            EditorState::Editing { element, .. } => element.as_deref(),
            EditorState::Idle => None,
        }
    }

    // --- 选中 ---

    pub fn select_page(&mut self, id: &str) -> Result<(), TemplateError> {
        if !self.pages().iter().any(|p| p.id == id) {
            return Err(TemplateError::UnknownPage(id.to_string()));
        }
        self.state = EditorState::Editing {
            page: id.to_string(),
            element: None,
        };
        Ok(())
    }

    /// 选中任意页面上的元素，并切换到该页
    pub fn select_element(&mut self, id: &str) -> Result<(), TemplateError> {
        let page = self
            .pages()
            .iter()
            .find(|p| p.elements.iter().any(|e| e.id == id))
            .map(|p| p.id.clone())
            .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))?;
        self.state = EditorState::Editing {
            page,
            element: Some(id.to_string()),
        };
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        if let EditorState::Editing { element, .. } = &mut self.state {
            *element = None;
        }
    }

    // --- 页面 ---

    pub fn add_page(&mut self) -> Result<String, TemplateError> {
        let id = self.mutate(|t| {
            let pages = pages_mut(t)?;
            let order = pages.iter().map(|p| p.order + 1).max().unwrap_or(0);
            let mut page = default_page(order);
            page.name = format!("Page {}", pages.len() + 1);
            let id = page.id.clone();
            pages.push(page);
            Ok(id)
        })?;
        self.state = EditorState::Editing {
            page: id.clone(),
            element: None,
        };
        Ok(id)
    }

    /// `id` 是唯一页面时拒绝，模板保持不变
    pub fn delete_page(&mut self, id: &str) -> Result<(), TemplateError> {
        let result = self.mutate(|t| {
            let pages = pages_mut(t)?;
            let index = pages
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| TemplateError::UnknownPage(id.to_string()))?;
            if pages.len() <= 1 {
                return Err(TemplateError::LastPage);
            }
            pages.remove(index);
            Ok(())
        });
        if let Err(e) = &result {
            warn!(page = id, error = %e, "delete page rejected");
        }
        result?;
        self.reconcile_selection();
        Ok(())
    }

    // --- 元素 ---

    /// 在选中页面 (未选中时为第一页) 的最上层添加 `kind` 的默认元素并选中
    pub fn add_element(&mut self, kind: ElementKind) -> Result<String, TemplateError> {
        let page_id = match self.selected_page() {
            Some(p) => p.to_string(),
            None => self
                .pages()
                .first()
                .map(|p| p.id.clone())
                .ok_or_else(|| TemplateError::UnknownPage(String::new()))?,
        };
        let id = self.mutate(|t| {
            let page = page_mut(t, &page_id)?;
            let order = page.elements.iter().map(|e| e.order + 1).max().unwrap_or(0);
            let element = default_element(kind, order);
            let id = element.id.clone();
            page.elements.push(element);
            Ok(id)
        })?;
        self.state = EditorState::Editing {
            page: page_id,
            element: Some(id.clone()),
        };
        Ok(id)
    }

    pub fn update_element(&mut self, id: &str, patch: ElementPatch) -> Result<(), TemplateError> {
        let grid = self.template.layout.grid_snap;
        self.mutate(|t| {
            let element = element_mut(t, id)?;
            if let Some(position) = patch.position {
                element.position = snap_position(position, grid);
            }
            if let Some(order) = patch.order {
                element.order = order;
            }
            if let Some(content) = patch.content {
                element.content = content;
            }
            if let Some(style) = patch.style {
                element.style = style;
            }
            if let Some(conditions) = patch.conditions {
                element.conditions = conditions;
            }
            Ok(())
        })
    }

    pub fn delete_element(&mut self, id: &str) -> Result<(), TemplateError> {
        self.mutate(|t| {
            let page = pages_mut(t)?
                .iter_mut()
                .find(|p| p.elements.iter().any(|e| e.id == id))
                .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))?;
            page.elements.retain(|e| e.id != id);
            Ok(())
        })?;
        if self.selected_element() == Some(id) {
            self.clear_selection();
        }
        Ok(())
    }

    // --- 拖动 / 缩放 ---

    pub fn begin_drag(&mut self, id: &str, pointer: (f32, f32)) -> Result<(), TemplateError> {
        self.begin_gesture(GestureKind::Drag, id, pointer)
    }

    /// 从右下角缩放
    pub fn begin_resize(&mut self, id: &str, pointer: (f32, f32)) -> Result<(), TemplateError> {
        self.begin_gesture(GestureKind::Resize, id, pointer)
    }

    fn begin_gesture(
        &mut self,
        kind: GestureKind,
        id: &str,
        pointer: (f32, f32),
    ) -> Result<(), TemplateError> {
        self.select_element(id)?;
        let origin = element(&self.template, id)?.position;
        self.gesture = Some(Gesture {
            kind,
            element: id.to_string(),
            pointer,
            origin,
            before: self.template.clone(),
        });
        Ok(())
    }

    /// 指针移动时实时更新，不记录历史
    pub fn drag_to(&mut self, pointer: (f32, f32)) -> Result<(), TemplateError> {
        let Some(g) = &self.gesture else {
            return Ok(());
        };
        let (dx, dy) = (pointer.0 - g.pointer.0, pointer.1 - g.pointer.1);
        let o = g.origin;
        let next = match g.kind {
            GestureKind::Drag => Position {
                x: o.x + dx,
                y: o.y + dy,
                ..o
            },
            GestureKind::Resize => Position {
                width: (o.width + dx).max(MIN_SIZE),
                height: (o.height + dy).max(MIN_SIZE),
                ..o
            },
        };
        let next = snap_position(next, self.template.layout.grid_snap);
        let id = g.element.clone();
        element_mut(&mut self.template, &id)?.position = next;
        Ok(())
    }

    /// 提交手势，返回是否记录了历史；位置没有变化时不记录
    pub fn end_drag(&mut self) -> bool {
        let Some(g) = self.gesture.take() else {
            return false;
        };
        if g.before == self.template {
            return false;
        }
        self.push_undo(g.before);
        true
    }

    /// 放弃手势，恢复到开始前的位置
    pub fn cancel_gesture(&mut self) {
        if let Some(g) = self.gesture.take() {
            self.template = g.before;
        }
    }

    // --- 撤销 / 重做 ---

    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(prev) = self.undo.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.template, prev);
        self.redo.push(current);
        self.reconcile_selection();
        true
    }

    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        let Some(next) = self.redo.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.template, next);
        self.undo.push(current);
        self.reconcile_selection();
        true
    }

    pub fn save(mut self) -> EditorOutcome {
        self.cancel_gesture();
        self.template.updated_at = Utc::now();
        EditorOutcome::Saved(self.template)
    }

    pub fn cancel(self) -> EditorOutcome {
        EditorOutcome::Cancelled
    }

    /// 在副本上执行 `f`，成功后才替换模板并记录历史
    fn mutate<T>(
        &mut self,
        f: impl FnOnce(&mut Template) -> Result<T, TemplateError>,
    ) -> Result<T, TemplateError> {
        self.cancel_gesture();
        let mut next = self.template.clone();
        let out = f(&mut next)?;
        let prev = std::mem::replace(&mut self.template, next);
        self.push_undo(prev);
        Ok(out)
    }

    fn push_undo(&mut self, snapshot: Template) {
        self.undo.push(snapshot);
        if self.undo.len() > HISTORY_LIMIT {
            self.undo.remove(0);
        }
        self.redo.clear();
    }

    /// 撤销、重做或删除后，清掉已不存在的选中项
    fn reconcile_selection(&mut self) {
        let EditorState::Editing { page, element } = &self.state else {
            return;
        };
        let pages = pages(&self.template);
        let Some(current) = pages.iter().find(|p| &p.id == page) else {
            self.state = match pages.first() {
                Some(first) => EditorState::Editing {
                    page: first.id.clone(),
                    element: None,
                },
                None => EditorState::Idle,
            };
            return;
        };
        let keep = element
            .as_ref()
            .filter(|id| current.elements.iter().any(|e| &e.id == *id))
            .cloned();
        self.state = EditorState::Editing {
            page: current.id.clone(),
            element: keep,
        };
    }
}

fn pages(template: &Template) -> &[Page] {
    match &template.body {
        TemplateBody::Pages { pages } => pages,
        TemplateBody::Flow { .. } => &[],
    }
}

fn pages_mut(template: &mut Template) -> Result<&mut Vec<Page>, TemplateError> {
    match &mut template.body {
        TemplateBody::Pages { pages } => Ok(pages),
        TemplateBody::Flow { .. } => Err(TemplateError::NotPageBased),
    }
}

fn page_mut<'t>(template: &'t mut Template, id: &str) -> Result<&'t mut Page, TemplateError> {
    pages_mut(template)?
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| TemplateError::UnknownPage(id.to_string()))
}

fn element<'t>(template: &'t Template, id: &str) -> Result<&'t Element, TemplateError> {
    pages(template)
        .iter()
        .flat_map(|p| &p.elements)
        .find(|e| e.id == id)
        .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))
}

fn element_mut<'t>(template: &'t mut Template, id: &str) -> Result<&'t mut Element, TemplateError> {
    pages_mut(template)?
        .iter_mut()
        .flat_map(|p| p.elements.iter_mut())
        .find(|e| e.id == id)
        .ok_or_else(|| TemplateError::UnknownElement(id.to_string()))
}

pub fn snap(value: f32, grid: Option<f32>) -> f32 {
    match grid {
        Some(g) if g > 0.0 => (value / g).round() * g,
        _ => value,
    }
}

fn snap_position(p: Position, grid: Option<f32>) -> Position {
    Position {
        x: snap(p.x, grid),
        y: snap(p.y, grid),
        width: snap(p.width, grid).max(MIN_SIZE.min(p.width)),
        height: snap(p.height, grid).max(MIN_SIZE.min(p.height)),
    }
}

/// 新建 `kind` 元素的默认尺寸和内容
pub fn default_element(kind: ElementKind, order: i32) -> Element {
    let (width, height) = match kind {
        ElementKind::Text | ElementKind::Unknown => (200.0, 40.0),
        ElementKind::Image => (200.0, 150.0),
        ElementKind::Table => (300.0, 120.0),
        ElementKind::Divider => (300.0, 10.0),
        ElementKind::Spacer => (200.0, 20.0),
        ElementKind::PropertyData => (200.0, 30.0),
        ElementKind::LocalInfoGrid => (400.0, 200.0),
        ElementKind::QrCode => (100.0, 120.0),
        ElementKind::CustomHtml => (300.0, 100.0),
    };
    let content = match kind {
        ElementKind::Text | ElementKind::Unknown => Content {
            text: Some("New text".into()),
            ..Default::default()
        },
        ElementKind::Table => Content {
            headers: Some(vec!["Column 1".into(), "Column 2".into()]),
            rows: Some(vec![vec![String::new(), String::new()]]),
            ..Default::default()
        },
        ElementKind::PropertyData => Content {
            data_field: Some("name".into()),
            ..Default::default()
        },
        ElementKind::QrCode => Content {
            qr_data: Some("{{publicUrl}}".into()),
            ..Default::default()
        },
        ElementKind::CustomHtml => Content {
            html: Some("<p>Custom content</p>".into()),
            ..Default::default()
        },
        ElementKind::Image => Content {
            image_url: Some(String::new()),
            ..Default::default()
        },
        ElementKind::Divider | ElementKind::Spacer | ElementKind::LocalInfoGrid => {
            Content::default()
        }
    };
    let style = match kind {
        ElementKind::Text | ElementKind::PropertyData | ElementKind::Unknown => Styling {
            font_size: Some(12.0),
            ..Default::default()
        },
        ElementKind::Divider => Styling {
            color: Some("#E5E7EB".into()),
            ..Default::default()
        },
        _ => Styling::default(),
    };
    Element {
        id: new_id(),
        kind,
        position: Position {
            x: 40.0,
            y: 40.0,
            width,
            height,
        },
        order,
        content,
        style,
        conditions: Vec::new(),
    }
}
