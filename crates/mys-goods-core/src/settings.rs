//! 设置分组：偏好设置、DS salt、设备信息。
//!
//! 每个分组独立地取默认值、读取配置文件与环境变量覆盖，然后做类型与范围校验。
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::env::{resolve, EnvOverlay};
use crate::paths;
use crate::record::retain_known;

/// 设置分组解析失败。
#[derive(Debug, Error)]
#[error("{section}: {reason}")]
pub struct SettingsError {
    pub section: &'static str,
    pub reason: String,
}

/// 一个可独立取默认值、可被环境变量覆盖的设置分组。
pub trait SettingsGroup: Serialize + DeserializeOwned + Default {
    /// 分组在配置文件中的键名。
    const SECTION: &'static str;

    /// 范围校验（类型校验由反序列化完成）。
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// 解析一个设置分组。
///
/// 参数：
/// - `file`：配置文件中该分组的值（缺失时为 `None`）
/// - `env`：环境变量快照
///
/// 异常处理：
/// - 分组不是对象、字段类型不符或范围校验失败时返回 [`SettingsError`]
pub fn resolve_group<G: SettingsGroup>(file: Option<&Value>, env: &EnvOverlay) -> Result<G, SettingsError> {
    let fail = |reason: String| SettingsError {
        section: G::SECTION,
        reason,
    };
    let defaults = match serde_json::to_value(G::default()) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(fail("默认值不是对象".to_string())),
        Err(e) => return Err(fail(e.to_string())),
    };
    let file_map: Option<Map<String, Value>> = match file {
        None => None,
        Some(Value::Object(map)) => {
            let mut map = map.clone();
            let known: Vec<&str> = defaults.keys().map(String::as_str).collect();
            let dropped = retain_known(&mut map, &known);
            if !dropped.is_empty() {
                debug!("{}: 忽略未知字段 {:?}", G::SECTION, dropped);
            }
            Some(map)
        }
        Some(_) => return Err(fail("必须是 JSON 对象".to_string())),
    };

    let overridden: Vec<String> = defaults
        .keys()
        .filter(|k| env.get(k).is_some())
        .map(|k| EnvOverlay::var_name(k))
        .collect();
    for var in &overridden {
        debug!("{}: 使用环境变量 {var} 覆盖", G::SECTION);
    }

    let resolved = resolve(&defaults, file_map.as_ref(), env);
    let env_hint = || {
        if overridden.is_empty() {
            String::new()
        } else {
            format!("（已应用环境变量 {}）", overridden.join(", "))
        }
    };
    let group: G = serde_json::from_value(Value::Object(resolved))
        .map_err(|e| fail(format!("{e}{}", env_hint())))?;
    group
        .validate()
        .map_err(|e| fail(format!("{e}{}", env_hint())))?;
    Ok(group)
}

/// 偏好设置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preference {
    /// GitHub 加速代理。
    pub github_proxy: Option<String>,
    /// 是否开启连接测试。
    pub enable_connection_test: bool,
    /// 连接测试间隔（秒）。
    pub connection_test_interval: Option<f64>,
    /// 网络请求超时时间（秒）。
    pub timeout: Option<f64>,
    /// 最大网络请求重试次数。
    pub max_retry_times: Option<u32>,
    /// 网络请求重试间隔（秒，兑换请求除外）。
    pub retry_interval: f64,
    /// 是否开启 NTP 时间同步（只调整发出兑换请求的时间，不修改系统时间）。
    pub enable_ntp_sync: Option<bool>,
    /// NTP 服务器地址。
    pub ntp_server: Option<String>,
    /// GEETEST 行为验证静态文件目录（为空时使用内置文件）。
    pub geetest_statics_path: Option<PathBuf>,
    /// 登录时 GEETEST 行为验证 WEB 服务的本地监听地址。
    pub geetest_listen_address: Option<(String, u16)>,
    /// 兑换线程数。
    pub exchange_thread_count: u32,
    /// 每个兑换线程之间的等待间隔（秒）。
    pub exchange_thread_interval: f64,
    /// 兑换时间延迟（秒），避免请求时间过于精准。
    pub exchange_latency: f64,
    /// 是否保存日志。
    pub enable_log_output: bool,
    /// 日志保存路径。
    pub log_path: Option<PathBuf>,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            github_proxy: Some("https://ghproxy.com/".to_string()),
            enable_connection_test: true,
            connection_test_interval: Some(30.0),
            timeout: Some(10.0),
            max_retry_times: Some(3),
            retry_interval: 2.0,
            enable_ntp_sync: Some(true),
            ntp_server: Some("ntp.aliyun.com".to_string()),
            geetest_statics_path: None,
            geetest_listen_address: Some(("localhost".to_string(), 0)),
            exchange_thread_count: 3,
            exchange_thread_interval: 0.05,
            exchange_latency: 0.03,
            enable_log_output: true,
            log_path: Some(paths::default_log_path()),
        }
    }
}

impl SettingsGroup for Preference {
    const SECTION: &'static str = "preference";

    fn validate(&self) -> Result<(), String> {
        let durations = [
            ("connection_test_interval", self.connection_test_interval),
            ("timeout", self.timeout),
            ("retry_interval", Some(self.retry_interval)),
            ("exchange_thread_interval", Some(self.exchange_thread_interval)),
            ("exchange_latency", Some(self.exchange_latency)),
        ];
        for (name, value) in durations {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(format!("{name} 必须为非负数，实际为 {v}"));
                }
            }
        }
        if self.exchange_thread_count == 0 {
            return Err("exchange_thread_count 至少为 1".to_string());
        }
        if let Some(log_path) = &self.log_path {
            if !log_location_writable(log_path) {
                warn!("程序没有写入日志文件 {} 的权限", log_path.display());
            }
        }
        Ok(())
    }
}

/// 日志位置是否可写。
///
/// 行为：
/// - 文件已存在：尝试以追加方式打开
/// - 文件不存在：在最近的已存在上级目录中创建并删除一个临时文件
fn log_location_writable(path: &Path) -> bool {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|d| d.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    if absolute.is_file() {
        return OpenOptions::new().append(true).open(&absolute).is_ok();
    }
    let Some(dir) = absolute.ancestors().skip(1).find(|p| p.is_dir()) else {
        return false;
    };
    let marker = dir.join(format!(".write-check-{}", Uuid::new_v4()));
    match OpenOptions::new().write(true).create_new(true).open(&marker) {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            true
        }
        Err(_) => false,
    }
}

/// 生成请求头 DS 所用的 salt 值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SaltConfig {
    /// iOS 请求头 DS 所需的 salt。
    pub salt_ios: String,
    /// 安卓请求头 DS 所需的 salt。
    pub salt_android: String,
    /// 安卓设备传入 content 生成 DS 所需的 salt。
    pub salt_data: String,
    /// 安卓设备传入 url 参数生成 DS 所需的 salt。
    pub salt_params: String,
    pub salt_prod: String,
}

impl Default for SaltConfig {
    fn default() -> Self {
        Self {
            salt_ios: "ulInCDohgEs557j0VsPDYnQaaz6KJcv5".to_string(),
            salt_android: "n0KjuIrKgLHh08LWSCYP0WXlVXaYvV64".to_string(),
            salt_data: "t0qEgfub6cvueAPgR5m9aQWWVciEer7v".to_string(),
            salt_params: "xV8v4Qu54lUKrEYFZkJhB8cuOh9Asafs".to_string(),
            salt_prod: "JwYDpKvLj6MrMqqYU6jTKF17KNO2PXoS".to_string(),
        }
    }
}

impl SettingsGroup for SaltConfig {
    const SECTION: &'static str = "salt_config";
}

/// 设备信息。DS 算法与设备信息有关联，非必要请勿修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DeviceConfig {
    /// 移动端 User-Agent。
    pub user_agent_mobile: String,
    /// 桌面端 User-Agent。
    pub user_agent_pc: String,
    /// 获取 ActionTicket 时所用的 User-Agent。
    pub user_agent_other: String,
    /// 安卓端 User-Agent。
    pub user_agent_android: String,
    /// 安卓端 User-Agent（米游币任务等）。
    pub user_agent_android_other: String,
    /// iOS 小组件 User-Agent。
    pub user_agent_widget: String,

    pub x_rpc_device_model_mobile: String,
    pub x_rpc_device_model_pc: String,
    pub x_rpc_device_model_android: String,

    pub x_rpc_device_name_mobile: String,
    pub x_rpc_device_name_pc: String,
    pub x_rpc_device_name_android: String,

    pub x_rpc_sys_version: String,
    pub x_rpc_sys_version_android: String,

    pub x_rpc_channel: String,
    pub x_rpc_channel_android: String,

    pub x_rpc_app_version: String,
    pub x_rpc_platform: String,
    /// sec-ch-ua。
    pub ua: String,
    /// sec-ch-ua-platform。
    pub ua_platform: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            user_agent_mobile: "Mozilla/5.0 (iPhone; CPU iPhone OS 15_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) miHoYoBBS/2.42.1".to_string(),
            user_agent_pc: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Safari/605.1.15".to_string(),
            user_agent_other: "Hyperion/275 CFNetwork/1402.0.8 Darwin/22.2.0".to_string(),
            user_agent_android: "Mozilla/5.0 (Linux; Android 11; MI 8 SE Build/RQ3A.211001.001; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/104.0.5112.97 Mobile Safari/537.36 miHoYoBBS/2.36.1".to_string(),
            user_agent_android_other: "okhttp/4.9.3".to_string(),
            user_agent_widget: "WidgetExtension/231 CFNetwork/1390 Darwin/22.0.0".to_string(),
            x_rpc_device_model_mobile: "iPhone10,2".to_string(),
            x_rpc_device_model_pc: "OS X 10.15.7".to_string(),
            x_rpc_device_model_android: "MI 8 SE".to_string(),
            x_rpc_device_name_mobile: "iPhone".to_string(),
            x_rpc_device_name_pc: "Microsoft Edge 103.0.1264.62".to_string(),
            x_rpc_device_name_android: "Xiaomi MI 8 SE".to_string(),
            x_rpc_sys_version: "15.4".to_string(),
            x_rpc_sys_version_android: "11".to_string(),
            x_rpc_channel: "appstore".to_string(),
            x_rpc_channel_android: "miyousheluodi".to_string(),
            x_rpc_app_version: "2.28.1".to_string(),
            x_rpc_platform: "ios".to_string(),
            ua: "\".Not/A)Brand\";v=\"99\", \"Microsoft Edge\";v=\"103\", \"Chromium\";v=\"103\"".to_string(),
            ua_platform: "\"macOS\"".to_string(),
        }
    }
}

impl SettingsGroup for DeviceConfig {
    const SECTION: &'static str = "device_config";
}
