//! 米游社账户数据。
//!
//! 设备 ID 约束：
//! - 创建账户时缺失的设备 ID 会且只会生成一次，此后不可修改
//! - 远端会基于设备指纹做风控，设备 ID 变化会让已有登录态失效
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::credentials::CredentialSet;
use crate::record::parse_known;

/// 设备 ID 生成器（外部协作方的接缝）。
pub trait DeviceIdGenerator {
    fn generate(&self) -> String;
}

/// 默认生成器：大写、带连字符的随机 UUID。
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidDeviceIdGenerator;

impl DeviceIdGenerator for UuidDeviceIdGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().hyphenated().to_string().to_uppercase()
    }
}

/// 一个受控的米游社账户。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// 手机号。
    pub phone_number: Option<String>,
    /// Cookies。
    pub cookies: CredentialSet,
    /// iOS 设备用 deviceID。
    device_id_ios: String,
    /// 安卓设备用 deviceID。
    device_id_android: String,
}

impl Account {
    /// 创建账户。
    ///
    /// 参数：
    /// - `device_id_ios` / `device_id_android`：缺失或为空时由 `generator` 生成
    pub fn create(
        phone_number: Option<String>,
        cookies: CredentialSet,
        device_id_ios: Option<String>,
        device_id_android: Option<String>,
        generator: &dyn DeviceIdGenerator,
    ) -> Self {
        let (account, _) = Self::assemble(
            phone_number,
            cookies,
            device_id_ios,
            device_id_android,
            generator,
        );
        account
    }

    /// 从 JSON 值解析账户（未知字段被忽略）。
    ///
    /// 返回值：
    /// - `(账户, 是否生成了新的设备 ID)`；后者为真时调用方应尽快落盘
    pub fn from_value(
        value: Value,
        generator: &dyn DeviceIdGenerator,
    ) -> Result<(Self, bool), serde_json::Error> {
        let raw: RawAccount = parse_known(value, RawAccount::FIELDS, "account")?;
        let cookies = CredentialSet::from_value(raw.cookies)?;
        Ok(Self::assemble(
            raw.phone_number,
            cookies,
            raw.device_id_ios,
            raw.device_id_android,
            generator,
        ))
    }

    fn assemble(
        phone_number: Option<String>,
        cookies: CredentialSet,
        device_id_ios: Option<String>,
        device_id_android: Option<String>,
        generator: &dyn DeviceIdGenerator,
    ) -> (Self, bool) {
        let mut generated = false;
        let mut or_generate = |id: Option<String>| match id.filter(|v| !v.is_empty()) {
            Some(id) => id,
            None => {
                generated = true;
                generator.generate()
            }
        };
        let device_id_ios = or_generate(device_id_ios);
        let device_id_android = or_generate(device_id_android);
        (
            Self {
                phone_number,
                cookies,
                device_id_ios,
                device_id_android,
            },
            generated,
        )
    }

    pub fn device_id_ios(&self) -> &str {
        &self.device_id_ios
    }

    pub fn device_id_android(&self) -> &str {
        &self.device_id_android
    }

    pub fn logical_id(&self) -> Option<&str> {
        self.cookies.logical_id()
    }

    pub fn set_logical_id(&mut self, value: &str) {
        self.cookies.set_logical_id(value);
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAccount {
    #[serde(default)]
    phone_number: Option<String>,
    cookies: Value,
    #[serde(default)]
    device_id_ios: Option<String>,
    #[serde(default)]
    device_id_android: Option<String>,
}

impl RawAccount {
    const FIELDS: &'static [&'static str] =
        &["phone_number", "cookies", "device_id_ios", "device_id_android"];
}
