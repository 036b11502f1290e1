//! 语言包，启动时一次性加载

use crate::error::ConfigError;
use std::collections::HashMap;

pub const DEFAULT_LOCALE: &str = "en";

const BUILTIN: [(&str, &str); 3] = [
    ("en", include_str!("locales/en.json")),
    ("fr", include_str!("locales/fr.json")),
    ("es", include_str!("locales/es.json")),
];

#[derive(Debug, Clone, Default)]
struct Strings(HashMap<String, String>);

/// 全部语言包；默认语言一定存在
#[derive(Debug, Clone)]
pub struct Catalog {
    bundles: HashMap<&'static str, Strings>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut bundles = HashMap::new();
        for (locale, raw) in BUILTIN {
            let strings: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|source| ConfigError::Locale { locale, source })?;
            bundles.insert(locale, Strings(strings));
        }
        Ok(Self { bundles })
    }

    /// 取 `locale` 对应的语言包 (`fr-CA` 匹配 `fr`)，缺失时回退到默认语言
    pub fn bundle(&self, locale: &str) -> Bundle<'_> {
        let lang = locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let primary = self.bundles.get(lang.as_str());
        Bundle {
            primary,
            fallback: self.bundles.get(DEFAULT_LOCALE),
        }
    }

    pub fn locales(&self) -> Vec<&'static str> {
        let mut locales: Vec<&'static str> = self.bundles.keys().copied().collect();
        locales.sort_unstable();
        locales
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bundle<'a> {
    primary: Option<&'a Strings>,
    fallback: Option<&'a Strings>,
}

impl<'a> Bundle<'a> {
    /// 先查当前语言，再查默认语言；都没有时返回 key 本身
    pub fn get<'k>(&self, key: &'k str) -> &'k str
    where
        'a: 'k,
    {
        self.primary
            .and_then(|s| s.0.get(key))
            .or_else(|| self.fallback.and_then(|s| s.0.get(key)))
            .map(String::as_str)
            .unwrap_or(key)
    }
}
