//! 配置文件落盘模型（config.json）与加载/保存生命周期。
//!
//! 生命周期：
//! - 文件存在：逐字段解析并校验，任何失败都返回错误，由启动点终止进程
//! - 文件不存在：以默认值构造并立即写出
//! - 运行期修改只发生在内存中，直到显式调用 [`ConfigStore::save`]
//! - 保存总是整份覆盖写入（非原子替换）
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::account::{Account, DeviceIdGenerator, UuidDeviceIdGenerator};
use crate::env::EnvOverlay;
use crate::plan::{AccountRef, ExchangePlan, PlanParseError};
use crate::record::retain_known;
use crate::settings::{resolve_group, DeviceConfig, Preference, SaltConfig};

/// 访问配置文件所需的权限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("读取"),
            Access::Write => f.write_str("写入"),
        }
    }
}

/// 配置文件错误。
///
/// 用途：
/// - `Malformed`：文件内容不符合格式（用户需要修改内容）
/// - `Inaccessible`：文件无法读取或写入（用户需要检查权限）
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败，请检查配置文件 {} 格式是否正确：{reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("无法{access}配置文件 {}，请检查程序是否有{access}权限：{source}", .path.display())]
    Inaccessible {
        path: PathBuf,
        access: Access,
        source: std::io::Error,
    },
    #[error("序列化配置失败: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ConfigError {
    /// 是否为“内容格式错误”（相对于“文件不可访问”）。
    pub fn is_malformed(&self) -> bool {
        matches!(self, ConfigError::Malformed { .. })
    }

    /// 出错的配置文件路径。
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Malformed { path, .. } | ConfigError::Inaccessible { path, .. } => Some(path),
            ConfigError::Encode(_) => None,
        }
    }
}

/// 配置根对象。
///
/// 字段说明：
/// - `exchange_plans`：兑换计划列表
/// - `preference`：偏好设置
/// - `salt_config`：生成请求头 DS 所用的 salt
/// - `device_config`：设备信息
/// - `accounts`：已绑定的账户（键为用户自定义的账户名）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigStore {
    #[serde(skip)]
    path: PathBuf,
    pub exchange_plans: Vec<ExchangePlan>,
    pub preference: Preference,
    pub salt_config: SaltConfig,
    pub device_config: DeviceConfig,
    pub accounts: BTreeMap<String, Account>,
}

impl ConfigStore {
    const FIELDS: &'static [&'static str] = &[
        "exchange_plans",
        "preference",
        "salt_config",
        "device_config",
        "accounts",
    ];

    /// 以内置默认值构造（不读取环境变量，不落盘）。
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exchange_plans: Vec::new(),
            preference: Preference::default(),
            salt_config: SaltConfig::default(),
            device_config: DeviceConfig::default(),
            accounts: BTreeMap::new(),
        }
    }

    /// 进程启动时的唯一加载入口（读取进程环境变量，使用默认设备 ID 生成器）。
    pub fn bootstrap(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Self::bootstrap_with(path, &EnvOverlay::from_process_env(), &UuidDeviceIdGenerator)
    }

    /// 加载配置；文件不存在时写出默认配置。
    ///
    /// 异常处理：
    /// - 内容格式错误：[`ConfigError::Malformed`]
    /// - 读取/写入失败：[`ConfigError::Inaccessible`]
    pub fn bootstrap_with(
        path: impl Into<PathBuf>,
        env: &EnvOverlay,
        generator: &dyn DeviceIdGenerator,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.is_file() {
            return Self::load(path, env, generator);
        }
        let mut store = Self::from_env_defaults(path, env)?;
        store.save()?;
        info!("配置文件 {} 不存在，已创建默认配置文件", store.path.display());
        Ok(store)
    }

    /// 读取并校验已存在的配置文件。
    ///
    /// 行为：
    /// - 各设置分组独立应用环境变量覆盖
    /// - 兑换计划按序号引用的账户必须存在
    /// - 若有账户缺少设备 ID，新生成的 ID 会立即写回文件；写回失败只输出警告，
    ///   本次运行仍使用已加载的配置
    pub fn load(
        path: impl Into<PathBuf>,
        env: &EnvOverlay,
        generator: &dyn DeviceIdGenerator,
    ) -> Result<Self, ConfigError> {
        let path = path.into();
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Inaccessible {
            path: path.clone(),
            access: Access::Read,
            source,
        })?;
        let (mut store, generated) = Self::parse(path, &bytes, env, generator)?;
        if generated {
            info!("已为缺少设备 ID 的账户生成新 ID，写回 {}", store.path.display());
            if let Err(e) = store.save() {
                warn!("设备 ID 未能写回，下次启动会重新生成: {e}");
            }
        }
        Ok(store)
    }

    fn from_env_defaults(path: PathBuf, env: &EnvOverlay) -> Result<Self, ConfigError> {
        let malformed = |reason: String| ConfigError::Malformed {
            path: path.clone(),
            reason,
        };
        let preference = resolve_group(None, env).map_err(|e| malformed(e.to_string()))?;
        let salt_config = resolve_group(None, env).map_err(|e| malformed(e.to_string()))?;
        let device_config = resolve_group(None, env).map_err(|e| malformed(e.to_string()))?;
        Ok(Self {
            preference,
            salt_config,
            device_config,
            ..Self::with_defaults(path)
        })
    }

    fn parse(
        path: PathBuf,
        bytes: &[u8],
        env: &EnvOverlay,
        generator: &dyn DeviceIdGenerator,
    ) -> Result<(Self, bool), ConfigError> {
        let malformed = |reason: String| ConfigError::Malformed {
            path: path.clone(),
            reason,
        };

        let root: Value = serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(mut root) = root else {
            return Err(malformed("顶层必须是 JSON 对象".to_string()));
        };
        let dropped = retain_known(&mut root, Self::FIELDS);
        if !dropped.is_empty() {
            debug!("config: 忽略未知字段 {:?}", dropped);
        }

        let mut generated = false;

        let mut exchange_plans = Vec::new();
        for (i, value) in take_array(&mut root, "exchange_plans").map_err(&malformed)?.into_iter().enumerate() {
            let (plan, fresh) = ExchangePlan::from_value(value, generator).map_err(|e| match e {
                PlanParseError::Schema(e) => malformed(format!("exchange_plans[{i}]: {e}")),
                PlanParseError::NegativeIndex(n) => {
                    malformed(format!("exchange_plans[{i}]: account 序号 {n} 不能为负数"))
                }
            })?;
            generated |= fresh;
            exchange_plans.push(plan);
        }

        let preference = resolve_group(root.get("preference"), env).map_err(|e| malformed(e.to_string()))?;
        let salt_config = resolve_group(root.get("salt_config"), env).map_err(|e| malformed(e.to_string()))?;
        let device_config =
            resolve_group(root.get("device_config"), env).map_err(|e| malformed(e.to_string()))?;

        let mut accounts = BTreeMap::new();
        for (key, value) in take_object(&mut root, "accounts").map_err(&malformed)? {
            let (account, fresh) =
                Account::from_value(value, generator).map_err(|e| malformed(format!("accounts.{key}: {e}")))?;
            generated |= fresh;
            accounts.insert(key, account);
        }

        for (i, plan) in exchange_plans.iter().enumerate() {
            if let AccountRef::Index(index) = plan.account {
                if index >= accounts.len() {
                    return Err(malformed(format!(
                        "exchange_plans[{i}]: account 序号 {index} 超出范围（共 {} 个账户）",
                        accounts.len()
                    )));
                }
            }
        }

        Ok((
            Self {
                path,
                exchange_plans,
                preference,
                salt_config,
                device_config,
                accounts,
            },
            generated,
        ))
    }

    /// 配置文件路径。
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 序列化为配置文件文本（4 空格缩进）。
    pub fn to_json(&self) -> Result<String, ConfigError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer).map_err(ConfigError::Encode)?;
        String::from_utf8(buf).map_err(|e| ConfigError::Encode(serde::ser::Error::custom(e)))
    }

    /// 保存配置文件（整份覆盖写入）。
    ///
    /// 写出前先规整所有 Cookies（见 [`crate::CredentialSet::normalize`]），
    /// 使内存中的配置与重新读取的结果一致。
    ///
    /// 返回值：
    /// - 写入的字节数
    ///
    /// 异常处理：
    /// - 写入失败返回 [`ConfigError::Inaccessible`]，内存中的配置保持可用
    pub fn save(&mut self) -> Result<usize, ConfigError> {
        self.normalize();
        let text = self.to_json()?;
        std::fs::write(&self.path, text.as_bytes()).map_err(|source| ConfigError::Inaccessible {
            path: self.path.clone(),
            access: Access::Write,
            source,
        })?;
        debug!("已保存配置文件 {}（{} 字节）", self.path.display(), text.len());
        Ok(text.len())
    }

    fn normalize(&mut self) {
        let embedded = self.exchange_plans.iter_mut().filter_map(|plan| match &mut plan.account {
            AccountRef::Embedded(account) => Some(account),
            AccountRef::Index(_) => None,
        });
        for account in self.accounts.values_mut().chain(embedded) {
            account.cookies.normalize();
        }
    }

    /// 解析兑换计划引用的账户；序号按账户键的排序位置计算。
    pub fn resolve_account<'a>(&'a self, plan: &'a ExchangePlan) -> Option<&'a Account> {
        match &plan.account {
            AccountRef::Embedded(account) => Some(account),
            AccountRef::Index(index) => self.accounts.values().nth(*index),
        }
    }

    /// 账户键对应的序号（用于构造 [`AccountRef::Index`]）。
    pub fn account_index(&self, key: &str) -> Option<usize> {
        self.accounts.keys().position(|k| k == key)
    }
}

fn take_array(root: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>, String> {
    match root.remove(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(format!("{key} 必须是 JSON 数组")),
    }
}

fn take_object(root: &mut Map<String, Value>, key: &str) -> Result<Map<String, Value>, String> {
    match root.remove(key) {
        None => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(format!("{key} 必须是 JSON 对象")),
    }
}
