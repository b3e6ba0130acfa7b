//! 环境变量覆盖层。
//!
//! 约定：
//! - 变量名为 `MYS_GOODS_TOOL_` + 字段名（不区分大小写）
//! - 优先级：环境变量 > 配置文件 > 内置默认值
//! - 环境变量在加载时读取一次，之后不再刷新
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// 所有设置分组共用的环境变量前缀。
pub const ENV_PREFIX: &str = "MYS_GOODS_TOOL_";

/// 一次性读取的环境变量快照（键为去掉前缀后的大写字段名）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 读取当前进程环境中带前缀的变量（非 UTF-8 的变量被跳过）。
    pub fn from_process_env() -> Self {
        Self::from_pairs(
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// 由显式键值对构造；不带前缀的键被忽略。
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .filter_map(|(key, value)| {
                let upper = key.as_ref().to_uppercase();
                let field = upper.strip_prefix(ENV_PREFIX)?.to_string();
                Some((field, value.into()))
            })
            .collect();
        Self { vars }
    }

    /// 按字段名查找覆盖值。
    pub fn get(&self, field: &str) -> Option<&str> {
        self.vars.get(&field.to_uppercase()).map(String::as_str)
    }

    /// 字段对应的完整环境变量名。
    pub fn var_name(field: &str) -> String {
        format!("{ENV_PREFIX}{}", field.to_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// 合并默认值、配置文件值与环境变量值。
///
/// 参数：
/// - `defaults`：内置默认值（决定哪些键是已知字段，以及字段的类型倾向）
/// - `file`：配置文件中的值（只取已知键）
/// - `env`：环境变量快照
///
/// 返回值：
/// - 包含 `defaults` 全部键的字典
pub fn resolve(defaults: &Map<String, Value>, file: Option<&Map<String, Value>>, env: &EnvOverlay) -> Map<String, Value> {
    let mut resolved = defaults.clone();
    if let Some(file) = file {
        for (key, value) in file {
            if let Some(slot) = resolved.get_mut(key) {
                *slot = value.clone();
            }
        }
    }
    for (key, slot) in resolved.iter_mut() {
        if let Some(raw) = env.get(key) {
            *slot = env_value(defaults.get(key), raw);
        }
    }
    resolved
}

/// 把环境变量文本转换为 JSON 值：字符串字段原样保留，其余字段按 JSON 解析。
fn env_value(default: Option<&Value>, raw: &str) -> Value {
    match default {
        Some(Value::String(_)) => Value::String(raw.to_string()),
        Some(Value::Bool(_)) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Value::Bool(true),
            "0" | "false" | "no" | "off" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn precedence_is_env_then_file_then_default() {
        let defaults = map(json!({"timeout": 10.0, "ntp_server": "ntp.aliyun.com", "retry_interval": 2.0}));
        let file = map(json!({"timeout": 5.0, "ntp_server": "pool.ntp.org"}));
        let env = EnvOverlay::from_pairs([("MYS_GOODS_TOOL_TIMEOUT", "1.5")]);

        let resolved = resolve(&defaults, Some(&file), &env);
        assert_eq!(resolved["timeout"], json!(1.5));
        assert_eq!(resolved["ntp_server"], json!("pool.ntp.org"));
        assert_eq!(resolved["retry_interval"], json!(2.0));
    }

    #[test]
    fn unknown_file_keys_are_not_carried() {
        let defaults = map(json!({"a": 1}));
        let file = map(json!({"a": 2, "b": 3}));
        let resolved = resolve(&defaults, Some(&file), &EnvOverlay::empty());
        assert_eq!(resolved, map(json!({"a": 2})));
    }

    #[test]
    fn string_fields_take_env_text_verbatim() {
        let defaults = map(json!({"SALT_IOS": "abc"}));
        let env = EnvOverlay::from_pairs([("mys_goods_tool_salt_ios", "12345")]);
        assert_eq!(resolve(&defaults, None, &env)["SALT_IOS"], json!("12345"));
    }

    #[test]
    fn bool_fields_accept_common_spellings() {
        let defaults = map(json!({"enable_ntp_sync": true}));
        for (raw, expected) in [("off", json!(false)), ("1", json!(true)), ("maybe", json!("maybe"))] {
            let env = EnvOverlay::from_pairs([("MYS_GOODS_TOOL_ENABLE_NTP_SYNC", raw)]);
            assert_eq!(resolve(&defaults, None, &env)["enable_ntp_sync"], expected);
        }
    }

    #[test]
    fn unprefixed_vars_are_ignored() {
        let env = EnvOverlay::from_pairs([("TIMEOUT", "1"), ("PATH", "/bin")]);
        assert!(env.is_empty());
        assert_eq!(EnvOverlay::var_name("salt_ios"), "MYS_GOODS_TOOL_SALT_IOS");
    }
}
