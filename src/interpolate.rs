use crate::i18n::Bundle;
use crate::record::{LocalInfo, Property};
use chrono::NaiveDateTime;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// 渲染时从模板外部读取的全部数据。
///
/// `now` 每次渲染只取一次，整份文档显示同一个日期和时间
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub property: &'a Property,
    pub local_info: &'a [LocalInfo],
    pub public_url: &'a str,
    pub now: NaiveDateTime,
    pub strings: Bundle<'a>,
}

/// `{{identifier}}` 占位符替换
pub struct Interpolator;

impl Interpolator {
    fn get_regex() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| {
            Regex::new(r"\{\{\s*([a-zA-Z0-9_]+)\s*\}\}").expect("placeholder pattern is valid")
        })
    }

    /// 对 `template` 只扫描一遍：替换后的值不再扫描，
    /// 不支持的标识符原样保留
    pub fn render(template: &str, bindings: &Bindings) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        Self::get_regex()
            .replace_all(template, |caps: &Captures| {
                match Self::lookup(&caps[1], bindings) {
                    Some(value) => value,
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// 引擎能替换的标识符
    pub const SUPPORTED: [&'static str; 12] = [
        "propertyName",
        "propertyAddress",
        "propertyCity",
        "propertyCountry",
        "propertyDescription",
        "wifiPassword",
        "checkInInstructions",
        "houseRules",
        "emergencyContacts",
        "publicUrl",
        "currentDate",
        "currentTime",
    ];

    fn lookup(identifier: &str, b: &Bindings) -> Option<String> {
        let p = b.property;
        let value = match identifier {
            "propertyName" => p.name.clone(),
            "propertyAddress" => p.address.clone(),
            "propertyCity" => p.city.clone(),
            "propertyCountry" => p.country.clone(),
            "propertyDescription" => p.description.clone(),
            "wifiPassword" => p.wifi_password.clone(),
            "checkInInstructions" => p.check_in_instructions.clone(),
            "houseRules" => p.house_rules.clone(),
            "emergencyContacts" => p.emergency_contacts.clone(),
            "publicUrl" => b.public_url.to_string(),
            "currentDate" => b.now.format("%Y-%m-%d").to_string(),
            "currentTime" => b.now.format("%H:%M").to_string(),
            _ => return None,
        };
        Some(value)
    }
}

pub fn substitute(text: &str, bindings: &Bindings) -> String {
    Interpolator::render(text, bindings)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use chrono::NaiveDate;

    pub(crate) fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .and_then(|d| d.and_hms_opt(15, 4, 5))
            .unwrap()
    }

    fn with_bindings<R>(property: &Property, f: impl FnOnce(&Bindings) -> R) -> R {
        let catalog = Catalog::builtin().unwrap();
        let b = Bindings {
            property,
            local_info: &[],
            public_url: "https://book.example/p/villa",
            now: fixed_now(),
            strings: catalog.bundle("en"),
        };
        f(&b)
    }

    #[test]
    fn replaces_known_tokens() {
        let p = Property {
            name: "Seaside Villa".into(),
            wifi_password: "sunny123".into(),
            ..Default::default()
        };
        let out = with_bindings(&p, |b| {
            substitute(
                "Welcome to {{propertyName}}! WiFi: {{ wifiPassword }} ({{currentDate}} {{currentTime}}) {{publicUrl}}",
                b,
            )
        });
        assert_eq!(
            out,
            "Welcome to Seaside Villa! WiFi: sunny123 (2024-07-01 15:04) https://book.example/p/villa"
        );
    }

    #[test]
    fn leaves_unknown_tokens_verbatim() {
        let p = Property::default();
        let out = with_bindings(&p, |b| substitute("Hi {{guestName}} {{ nope }}", b));
        assert_eq!(out, "Hi {{guestName}} {{ nope }}");
    }

    #[test]
    fn does_not_expand_values_recursively() {
        let p = Property {
            name: "{{wifiPassword}}".into(),
            wifi_password: "secret".into(),
            ..Default::default()
        };
        let out = with_bindings(&p, |b| substitute("{{propertyName}}", b));
        assert_eq!(out, "{{wifiPassword}}");
    }
}
