//! 每个请求的身份信息，由外部认证层通过请求头传入

use crate::error::TemplateError;
use crate::schema::Template;
use crate::store::contains_custom_html;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    #[default]
    Owner,
    Admin,
}

impl Role {
    fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::Owner
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Option<String>,
    pub role: Role,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        Session {
            user_id: header(USER_ID_HEADER).map(str::to_string),
            role: header(USER_ROLE_HEADER).map(Role::parse).unwrap_or_default(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session::from_headers(&parts.headers))
    }
}

/// 谁可以导入含 custom-html 的模板。自定义标记不经转义直接渲染，
/// 因此编写它需要权限
#[derive(Debug, Clone, Copy)]
pub struct AuthoringPolicy {
    pub restrict_custom_html: bool,
}

impl AuthoringPolicy {
    pub fn may_author(&self, session: &Session, template: &Template) -> bool {
        !self.restrict_custom_html || session.role == Role::Admin || !contains_custom_html(template)
    }

    pub fn check(&self, session: &Session, template: &Template) -> Result<(), TemplateError> {
        if self.may_author(session, template) {
            Ok(())
        } else {
            tracing::warn!(user = ?session.user_id, template = %template.id, "custom-html rejected by policy");
            Err(TemplateError::CustomHtmlForbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Element, ElementKind, Position, Strategy, TemplateBody};
    use crate::store::new_template;
    use axum::http::HeaderValue;

    fn with_custom_html() -> Template {
        let mut t = new_template("Html", Strategy::Pages).unwrap();
        if let TemplateBody::Pages { pages } = &mut t.body {
            pages[0].elements.push(Element {
                id: "h".into(),
                kind: ElementKind::CustomHtml,
                position: Position::default(),
                order: 0,
                content: Default::default(),
                style: Default::default(),
                conditions: vec![],
            });
        }
        t
    }

    #[test]
    fn headers_to_session() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("Admin"));
        let s = Session::from_headers(&headers);
        assert_eq!(s.user_id.as_deref(), Some("u-1"));
        assert_eq!(s.role, Role::Admin);

        let anon = Session::from_headers(&HeaderMap::new());
        assert_eq!(anon.user_id, None);
        assert_eq!(anon.role, Role::Owner);
    }

    #[test]
    fn policy_gates_custom_html_on_role() {
        let policy = AuthoringPolicy {
            restrict_custom_html: true,
        };
        let owner = Session {
            user_id: None,
            role: Role::Owner,
        };
        let admin = Session {
            role: Role::Admin,
            ..owner.clone()
        };
        let t = with_custom_html();
        assert!(matches!(policy.check(&owner, &t), Err(TemplateError::CustomHtmlForbidden)));
        assert!(policy.check(&admin, &t).is_ok());
        assert!(policy.check(&owner, &new_template("Plain", Strategy::Pages).unwrap()).is_ok());

        let open = AuthoringPolicy {
            restrict_custom_html: false,
        };
        assert!(open.check(&owner, &t).is_ok());
    }
}
