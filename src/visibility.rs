use crate::record::Property;
use crate::schema::{Condition, ConditionOperator, Element};

/// 所有条件同时成立 (AND)；没有条件时总是可见
pub fn is_visible(element: &Element, property: &Property) -> bool {
    element
        .conditions
        .iter()
        .all(|condition| evaluate(condition, property))
}

pub fn evaluate(condition: &Condition, property: &Property) -> bool {
    let actual = property.field_or_empty(&condition.field);
    let expected = condition.value.as_str();
    match condition.operator {
        ConditionOperator::Equals => actual == expected,
        ConditionOperator::NotEquals => actual != expected,
        ConditionOperator::Contains => actual.contains(expected),
        ConditionOperator::NotContains => !actual.contains(expected),
        ConditionOperator::Exists => !actual.is_empty(),
        ConditionOperator::NotExists => actual.is_empty(),
        // 未知运算符放行
        ConditionOperator::Unknown => true,
    }
}
