use serde::{Deserialize, Serialize};

/// 绑定的主记录 (房源)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Property {
    pub id: String,
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub description: String,
    pub check_in_instructions: String,
    pub wifi_password: String,
    pub house_rules: String,
    pub emergency_contacts: String,
}

impl Property {
    /// property-data 元素与显示条件共用的封闭字段表。
    /// 未知字段返回 `None`，调用方按空字符串处理
    pub fn field(&self, key: &str) -> Option<&str> {
        let value = match key {
            "name" => &self.name,
            "address" => &self.address,
            "city" => &self.city,
            "country" => &self.country,
            "description" => &self.description,
            "checkInInstructions" => &self.check_in_instructions,
            "wifiPassword" => &self.wifi_password,
            "houseRules" => &self.house_rules,
            "emergencyContacts" => &self.emergency_contacts,
            _ => return None,
        };
        Some(value.as_str())
    }

    pub fn field_or_empty(&self, key: &str) -> &str {
        self.field(key).unwrap_or_default()
    }
}

/// 周边信息 (次级记录)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalInfo {
    pub name: String,
    pub category: String,
    pub address: String,
    pub description: String,
    pub city: String,
    pub country: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
}

impl LocalInfo {
    pub fn phone(&self) -> Option<&str> {
        present(&self.phone)
    }

    pub fn opening_hours(&self) -> Option<&str> {
        present(&self.opening_hours)
    }
}

/// 空字符串视为缺失
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
