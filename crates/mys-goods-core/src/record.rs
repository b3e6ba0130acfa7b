//! 记录边界上的“只解析已知字段”步骤。
//!
//! 约定：
//! - 配置文件可能由更新版本的程序写入，多出来的字段在这里被显式剔除（并以 `debug!` 记录）
//! - 剔除之后再交给 `#[serde(deny_unknown_fields)]` 的原始结构体做类型校验
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// 从对象中移除所有不在 `known` 中的键。
///
/// 返回值：
/// - 被移除的键（按原对象中的顺序）
pub fn retain_known(map: &mut Map<String, Value>, known: &[&str]) -> Vec<String> {
    let unknown: Vec<String> = map
        .keys()
        .filter(|k| !known.contains(&k.as_str()))
        .cloned()
        .collect();
    for key in &unknown {
        map.remove(key);
    }
    unknown
}

/// 剔除未知字段后反序列化为 `T`。
///
/// 参数：
/// - `value`：原始 JSON 值（非对象时原样交给 serde，由其报告类型错误）
/// - `known`：`T` 接受的字段名
/// - `record`：记录位置描述，仅用于日志
///
/// 异常处理：
/// - 字段缺失或类型不符时返回 serde 的错误
pub fn parse_known<T: DeserializeOwned>(
    mut value: Value,
    known: &[&str],
    record: &str,
) -> Result<T, serde_json::Error> {
    if let Value::Object(map) = &mut value {
        let dropped = retain_known(map, known);
        if !dropped.is_empty() {
            debug!("{record}: 忽略未知字段 {:?}", dropped);
        }
    }
    serde_json::from_value(value)
}

/// 非空字符串视图：`None` 与 `Some("")` 都视为“无值”。
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
