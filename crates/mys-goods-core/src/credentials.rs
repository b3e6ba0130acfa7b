//! 米游社会话凭据（Cookies）模型。
//!
//! 字段约定：
//! - 用户 ID 有四个冗余字段（`stuid`/`ltuid`/`account_id`/`login_uid`），逻辑上是同一个值
//! - stoken 有两种互不兼容的格式，分别存放在内部槽位 `stoken_v1` / `stoken_v2`，
//!   对外只暴露一个逻辑字段 `stoken`
//! - 以 `v2_` 开头的 stoken 属于 v2 格式
//! - 空字符串与缺失等价
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{non_empty, parse_known};

/// v2 格式 stoken 的前缀。
pub const V2_TOKEN_PREFIX: &str = "v2_";

/// 用户 ID 字段，按读取优先级排列。
pub const IDENTITY_KEYS: [&str; 4] = ["stuid", "ltuid", "account_id", "login_uid"];

/// 逻辑 stoken 在导出字典中的键名。
pub const SESSION_TOKEN_KEY: &str = "stoken";

/// stoken 的存放槽位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSlot {
    /// 旧格式（`stoken_v1`）。
    V1,
    /// `v2_` 前缀的新格式（`stoken_v2`）。
    V2,
}

/// 凭据操作错误。
///
/// 用途：
/// - `MalformedInput`：setter 收到了错误形状的值，调用被拒绝，记录保持不变
/// - `Validation`：合并后的字典不满足字段类型，记录保持不变
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("字段 {field} 需要字符串值，实际收到 {found}")]
    MalformedInput { field: &'static str, found: &'static str },
    #[error("Cookies 字段校验失败: {0}")]
    Validation(#[from] serde_json::Error),
}

/// 米游社 Cookies 数据。
///
/// stoken 的两个槽位不直接开放写入，只能经由 [`CredentialSet::set_session_token`]
/// （或反序列化）按前缀分类存放。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub stuid: Option<String>,
    pub ltuid: Option<String>,
    pub account_id: Option<String>,
    pub login_uid: Option<String>,

    stoken_v1: Option<String>,
    stoken_v2: Option<String>,

    pub cookie_token: Option<String>,
    pub login_ticket: Option<String>,
    pub ltoken: Option<String>,
    pub mid: Option<String>,
}

/// 按前缀判断 stoken 应存放的槽位；空字符串不归入任何槽位。
pub fn classify_token(value: &str) -> Option<TokenSlot> {
    if value.is_empty() {
        None
    } else if value.starts_with(V2_TOKEN_PREFIX) {
        Some(TokenSlot::V2)
    } else {
        Some(TokenSlot::V1)
    }
}

/// 读取逻辑用户 ID：四个字段中第一个非空值。
pub fn derive_logical_id(cookies: &CredentialSet) -> Option<&str> {
    [
        &cookies.stuid,
        &cookies.ltuid,
        &cookies.account_id,
        &cookies.login_uid,
    ]
    .into_iter()
    .find_map(non_empty)
}

/// 写入逻辑用户 ID：同一个值覆盖全部四个字段。
pub fn apply_logical_id(mut cookies: CredentialSet, value: &str) -> CredentialSet {
    cookies.stuid = Some(value.to_owned());
    cookies.ltuid = Some(value.to_owned());
    cookies.account_id = Some(value.to_owned());
    cookies.login_uid = Some(value.to_owned());
    cookies
}

/// 读取逻辑 stoken：优先 v1，其次 v2。
pub fn derive_session_token(cookies: &CredentialSet) -> Option<&str> {
    non_empty(&cookies.stoken_v1).or_else(|| non_empty(&cookies.stoken_v2))
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一个组合 stoken 构造，分类规则与 [`CredentialSet::set_session_token`] 相同。
    pub fn with_token(token: impl AsRef<str>) -> Self {
        let mut cookies = Self::default();
        cookies.set_session_token(token.as_ref());
        cookies
    }

    /// 从 JSON 值解析（未知字段被忽略）。
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let raw: RawCredentials = parse_known(value, RawCredentials::FIELDS, "cookies")?;
        Ok(raw.into())
    }

    pub fn logical_id(&self) -> Option<&str> {
        derive_logical_id(self)
    }

    pub fn set_logical_id(&mut self, value: &str) {
        *self = apply_logical_id(std::mem::take(self), value);
    }

    pub fn session_token(&self) -> Option<&str> {
        derive_session_token(self)
    }

    /// 写入 stoken。
    ///
    /// 行为：
    /// - 空字符串忽略
    /// - `v2_` 前缀写入 v2 槽位，否则写入 v1 槽位
    /// - 另一个槽位保持原值，不会被清空
    pub fn set_session_token(&mut self, value: &str) {
        match classify_token(value) {
            Some(TokenSlot::V1) => self.stoken_v1 = Some(value.to_owned()),
            Some(TokenSlot::V2) => self.stoken_v2 = Some(value.to_owned()),
            None => {}
        }
    }

    /// 以动态 JSON 值写入 stoken。
    ///
    /// 异常处理：
    /// - 非字符串（包括 `null`）返回 [`CredentialError::MalformedInput`]，记录不变
    pub fn set_session_token_value(&mut self, value: &Value) -> Result<(), CredentialError> {
        match value {
            Value::String(token) => {
                self.set_session_token(token);
                Ok(())
            }
            other => Err(CredentialError::MalformedInput {
                field: SESSION_TOKEN_KEY,
                found: json_type_name(other),
            }),
        }
    }

    pub fn token_v1(&self) -> Option<&str> {
        self.stoken_v1.as_deref()
    }

    pub fn token_v2(&self) -> Option<&str> {
        self.stoken_v2.as_deref()
    }

    /// 是否为可用于登录态请求的完整 Cookies（用户 ID、stoken、cookie_token 均非空）。
    pub fn is_complete(&self) -> bool {
        self.logical_id().is_some()
            && self.session_token().is_some()
            && non_empty(&self.cookie_token).is_some()
    }

    /// 用另一份 Cookies 更新：对方的非空字段逐个覆盖本方。
    ///
    /// 对方的 stoken 以 v1 优先的逻辑值参与合并，并经由分类写入。
    pub fn merge(&mut self, other: &CredentialSet) {
        for (key, value) in other.externalize(false) {
            self.assign(&key, value);
        }
    }

    /// 用键值对更新：与当前状态合并后整体重新解析。
    ///
    /// 参数：
    /// - `entries`：新字段（同名时覆盖当前值；`stoken` 经由分类写入）
    ///
    /// 异常处理：
    /// - 合并结果不满足字段类型时返回 [`CredentialError::Validation`]，记录不变
    pub fn merge_map<I>(&mut self, entries: I) -> Result<(), CredentialError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut combined: Map<String, Value> = self
            .persisted_map()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        combined.extend(entries);
        *self = Self::from_value(Value::Object(combined))?;
        Ok(())
    }

    /// 导出 Cookies 字典（用于请求头）。
    ///
    /// 参数：
    /// - `prefer_v2`：`stoken` 是否取 v2 槽位（默认 v1 优先）
    ///
    /// 返回值：
    /// - 不含 `stoken_v1`/`stoken_v2`，不含空值
    ///
    /// 副作用：
    /// - 先执行 [`CredentialSet::normalize`]（幂等）
    pub fn export(&mut self, prefer_v2: bool) -> BTreeMap<String, String> {
        self.normalize();
        self.externalize(prefer_v2)
    }

    /// 规整为落盘后重新读取时的形态。
    ///
    /// 行为：
    /// - 逻辑用户 ID 回写到四个字段上；没有用户 ID 时四个字段都清空
    /// - 空字符串字段改为缺失
    pub fn normalize(&mut self) {
        match self.logical_id().map(str::to_owned) {
            Some(id) => self.set_logical_id(&id),
            None => {
                self.stuid = None;
                self.ltuid = None;
                self.account_id = None;
                self.login_uid = None;
            }
        }
        for field in [
            &mut self.stoken_v1,
            &mut self.stoken_v2,
            &mut self.cookie_token,
            &mut self.login_ticket,
            &mut self.ltoken,
            &mut self.mid,
        ] {
            if field.as_deref() == Some("") {
                *field = None;
            }
        }
    }

    fn externalize(&self, prefer_v2: bool) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(id) = self.logical_id() {
            for key in IDENTITY_KEYS {
                out.insert(key.to_string(), id.to_string());
            }
        }
        let token = if prefer_v2 {
            non_empty(&self.stoken_v2)
        } else {
            self.session_token()
        };
        if let Some(token) = token {
            out.insert(SESSION_TOKEN_KEY.to_string(), token.to_string());
        }
        for (key, value) in self.auxiliary_fields() {
            if let Some(value) = non_empty(value) {
                out.insert(key.to_string(), value.to_string());
            }
        }
        out
    }

    /// 落盘形式：导出字段（含 v1 优先的 `stoken`），外加非空的原始槽位，
    /// 使两个槽位都能往返。
    fn persisted_map(&self) -> BTreeMap<String, String> {
        let mut out = self.externalize(false);
        if let Some(v1) = non_empty(&self.stoken_v1) {
            out.insert("stoken_v1".to_string(), v1.to_string());
        }
        if let Some(v2) = non_empty(&self.stoken_v2) {
            out.insert("stoken_v2".to_string(), v2.to_string());
        }
        out
    }

    fn auxiliary_fields(&self) -> [(&'static str, &Option<String>); 4] {
        [
            ("cookie_token", &self.cookie_token),
            ("login_ticket", &self.login_ticket),
            ("ltoken", &self.ltoken),
            ("mid", &self.mid),
        ]
    }

    fn assign(&mut self, key: &str, value: String) {
        let slot = match key {
            SESSION_TOKEN_KEY => {
                self.set_session_token(&value);
                return;
            }
            "stuid" => &mut self.stuid,
            "ltuid" => &mut self.ltuid,
            "account_id" => &mut self.account_id,
            "login_uid" => &mut self.login_uid,
            "cookie_token" => &mut self.cookie_token,
            "login_ticket" => &mut self.login_ticket,
            "ltoken" => &mut self.ltoken,
            "mid" => &mut self.mid,
            _ => return,
        };
        *slot = Some(value);
    }
}

impl Serialize for CredentialSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.persisted_map())
    }
}

impl<'de> Deserialize<'de> for CredentialSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// 落盘/导入用的原始字段集合（含组合字段 `stoken`）。
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawCredentials {
    stuid: Option<String>,
    ltuid: Option<String>,
    account_id: Option<String>,
    login_uid: Option<String>,
    stoken: Option<String>,
    stoken_v1: Option<String>,
    stoken_v2: Option<String>,
    cookie_token: Option<String>,
    login_ticket: Option<String>,
    ltoken: Option<String>,
    mid: Option<String>,
}

impl RawCredentials {
    const FIELDS: &'static [&'static str] = &[
        "stuid",
        "ltuid",
        "account_id",
        "login_uid",
        "stoken",
        "stoken_v1",
        "stoken_v2",
        "cookie_token",
        "login_ticket",
        "ltoken",
        "mid",
    ];
}

impl From<RawCredentials> for CredentialSet {
    fn from(raw: RawCredentials) -> Self {
        let mut cookies = CredentialSet {
            stuid: raw.stuid,
            ltuid: raw.ltuid,
            account_id: raw.account_id,
            login_uid: raw.login_uid,
            stoken_v1: raw.stoken_v1,
            stoken_v2: raw.stoken_v2,
            cookie_token: raw.cookie_token,
            login_ticket: raw.login_ticket,
            ltoken: raw.ltoken,
            mid: raw.mid,
        };
        // 组合字段在原始槽位之后写入，走与 setter 相同的分类。
        if let Some(token) = raw.stoken {
            cookies.set_session_token(&token);
        }
        cookies
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn complete() -> CredentialSet {
        let mut cookies = CredentialSet::with_token("abcd1234");
        cookies.set_logical_id("123");
        cookies.cookie_token = Some("ck".into());
        cookies
    }

    #[test]
    fn logical_id_fans_out_to_all_identity_fields() {
        let mut cookies = CredentialSet::new();
        assert_eq!(cookies.logical_id(), None);
        cookies.set_logical_id("10086");
        assert_eq!(cookies.logical_id(), Some("10086"));
        for field in [&cookies.stuid, &cookies.ltuid, &cookies.account_id, &cookies.login_uid] {
            assert_eq!(field.as_deref(), Some("10086"));
        }
    }

    #[test]
    fn logical_id_reads_first_non_empty_in_priority_order() {
        let cookies = CredentialSet {
            stuid: Some(String::new()),
            ltuid: None,
            account_id: Some("acc".into()),
            login_uid: Some("login".into()),
            ..Default::default()
        };
        assert_eq!(derive_logical_id(&cookies), Some("acc"));

        let only_stuid = CredentialSet {
            stuid: Some("123".into()),
            ..Default::default()
        };
        assert_eq!(only_stuid.logical_id(), Some("123"));
    }

    #[test]
    fn plain_token_goes_to_v1_slot() {
        let cookies = CredentialSet::with_token("abcd1234");
        assert_eq!(cookies.session_token(), Some("abcd1234"));
        assert_eq!(cookies.token_v1(), Some("abcd1234"));
        assert_eq!(cookies.token_v2(), None);
    }

    #[test]
    fn v2_token_goes_to_v2_slot() {
        let mut cookies = CredentialSet::new();
        cookies.set_session_token("v2_xyz==");
        assert_eq!(cookies.session_token(), Some("v2_xyz=="));
        assert_eq!(cookies.token_v2(), Some("v2_xyz=="));
        assert_eq!(cookies.token_v1(), None);
    }

    #[test]
    fn setting_v2_keeps_stale_v1_and_v1_wins_on_read() {
        let mut cookies = CredentialSet::with_token("abcd1234");
        cookies.set_session_token("v2_abcd1234==");
        assert_eq!(cookies.token_v1(), Some("abcd1234"));
        assert_eq!(cookies.token_v2(), Some("v2_abcd1234=="));
        assert_eq!(cookies.session_token(), Some("abcd1234"));

        let mut reversed = CredentialSet::new();
        reversed.set_session_token("v2_abcd1234==");
        reversed.set_session_token("abcd1234");
        assert_eq!(reversed.session_token(), Some("abcd1234"));
    }

    #[test]
    fn empty_token_is_not_stored() {
        let mut cookies = CredentialSet::new();
        cookies.set_session_token("");
        assert_eq!(cookies, CredentialSet::new());
        assert_eq!(classify_token(""), None);
    }

    #[test]
    fn non_string_token_value_is_rejected_without_side_effects() {
        let mut cookies = CredentialSet::with_token("keep");
        let err = cookies.set_session_token_value(&Value::Null).unwrap_err();
        assert!(matches!(err, CredentialError::MalformedInput { found: "null", .. }));
        assert!(cookies.set_session_token_value(&json!(42)).is_err());
        assert_eq!(cookies.session_token(), Some("keep"));

        cookies.set_session_token_value(&json!("v2_new")).unwrap();
        assert_eq!(cookies.token_v2(), Some("v2_new"));
    }

    #[test]
    fn completeness_requires_id_token_and_cookie_token() {
        assert!(!CredentialSet::new().is_complete());
        assert!(complete().is_complete());

        let mut no_ck = complete();
        no_ck.cookie_token = Some(String::new());
        assert!(!no_ck.is_complete());

        let mut no_id = complete();
        no_id.set_logical_id("");
        assert!(!no_id.is_complete());

        let mut no_token = CredentialSet::new();
        no_token.set_logical_id("123");
        no_token.cookie_token = Some("ck".into());
        assert!(!no_token.is_complete());
    }

    #[test]
    fn export_drops_empties_and_internal_slots() {
        let mut cookies = CredentialSet {
            stuid: Some("123".into()),
            cookie_token: Some(String::new()),
            mid: Some("mid".into()),
            ..Default::default()
        };
        cookies.set_session_token("abcd1234");
        cookies.set_session_token("v2_abcd1234==");
        let exported = cookies.export(false);

        assert!(exported.values().all(|v| !v.is_empty()));
        assert!(!exported.contains_key("stoken_v1"));
        assert!(!exported.contains_key("stoken_v2"));
        assert!(!exported.contains_key("cookie_token"));
        assert_eq!(exported["stoken"], "abcd1234");
        for key in IDENTITY_KEYS {
            assert_eq!(exported[key], "123");
        }
        // 导出时身份字段已回写到记录本身。
        assert_eq!(cookies.login_uid.as_deref(), Some("123"));

        assert_eq!(cookies.export(true)["stoken"], "v2_abcd1234==");
    }

    #[test]
    fn export_prefer_v2_without_v2_omits_token() {
        let mut cookies = CredentialSet::with_token("abcd1234");
        assert!(!cookies.export(true).contains_key("stoken"));
    }

    #[test]
    fn merge_copies_only_non_empty_fields() {
        let mut target = complete();
        target.ltoken = Some("old-ltoken".into());
        let update = CredentialSet {
            cookie_token: Some(String::new()),
            ltoken: Some("new-ltoken".into()),
            ..Default::default()
        };
        target.merge(&update);

        assert_eq!(target.cookie_token.as_deref(), Some("ck"));
        assert_eq!(target.ltoken.as_deref(), Some("new-ltoken"));
        assert_eq!(target.logical_id(), Some("123"));
        assert_eq!(target.session_token(), Some("abcd1234"));
    }

    #[test]
    fn merge_classifies_incoming_token() {
        let mut target = CredentialSet::with_token("abcd1234");
        target.merge(&CredentialSet::with_token("v2_fresh"));
        assert_eq!(target.token_v1(), Some("abcd1234"));
        assert_eq!(target.token_v2(), Some("v2_fresh"));
    }

    #[test]
    fn merge_map_combines_and_revalidates() {
        let mut cookies = complete();
        cookies
            .merge_map([
                ("stoken".to_string(), json!("v2_from_login")),
                ("mid".to_string(), json!("m1")),
                ("unrelated".to_string(), json!(1)),
            ])
            .unwrap();
        assert_eq!(cookies.token_v1(), Some("abcd1234"));
        assert_eq!(cookies.token_v2(), Some("v2_from_login"));
        assert_eq!(cookies.mid.as_deref(), Some("m1"));
        assert_eq!(cookies.cookie_token.as_deref(), Some("ck"));
    }

    #[test]
    fn merge_map_type_error_leaves_record_untouched() {
        let mut cookies = complete();
        let before = cookies.clone();
        let err = cookies
            .merge_map([("cookie_token".to_string(), json!(12345))])
            .unwrap_err();
        assert!(matches!(err, CredentialError::Validation(_)));
        assert_eq!(cookies, before);
    }

    #[test]
    fn persisted_form_keeps_both_slots() {
        let mut cookies = complete();
        cookies.set_session_token("v2_second");
        let value = serde_json::to_value(&cookies).unwrap();
        assert_eq!(value["stoken_v1"], "abcd1234");
        assert_eq!(value["stoken_v2"], "v2_second");
        assert_eq!(value["stoken"], "abcd1234");

        let back: CredentialSet = serde_json::from_value(value).unwrap();
        assert_eq!(back, cookies);
    }

    #[test]
    fn v2_only_record_persists_v2_as_stoken() {
        let mut cookies = CredentialSet::with_token("v2_only==");
        cookies.set_logical_id("1");
        let value = serde_json::to_value(&cookies).unwrap();
        assert_eq!(value["stoken"], "v2_only==");
        assert!(value.get("stoken_v1").is_none());

        let back: CredentialSet = serde_json::from_value(value).unwrap();
        assert_eq!(back, cookies);
    }

    #[test]
    fn normalized_record_survives_a_round_trip() {
        let mut cookies = CredentialSet {
            stuid: Some("123".into()),
            cookie_token: Some(String::new()),
            ..Default::default()
        };
        cookies.normalize();
        assert_eq!(cookies.ltuid.as_deref(), Some("123"));
        assert_eq!(cookies.cookie_token, None);

        let back: CredentialSet = serde_json::from_value(serde_json::to_value(&cookies).unwrap()).unwrap();
        assert_eq!(back, cookies);
    }

    #[test]
    fn normalize_clears_empty_identity() {
        let mut cookies = CredentialSet {
            stuid: Some(String::new()),
            ltuid: Some(String::new()),
            ..Default::default()
        };
        cookies.normalize();
        assert_eq!(cookies, CredentialSet::new());
    }

    #[test]
    fn combined_stoken_in_file_is_classified() {
        let cookies: CredentialSet =
            serde_json::from_value(json!({"stuid": "1", "stoken": "v2_abcd1234==", "x": "y"})).unwrap();
        assert_eq!(cookies.token_v2(), Some("v2_abcd1234=="));
        assert_eq!(cookies.token_v1(), None);
        assert_eq!(cookies.session_token(), Some("v2_abcd1234=="));
    }
}
