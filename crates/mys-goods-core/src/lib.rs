//! 米游社商品兑换工具核心库：登录态凭据、账户与配置文件。
//!
//! 功能：
//! - 定义米游社 Cookies 模型（用户 ID 多字段归一、stoken v1/v2 双格式归一）
//! - 定义账户与兑换计划模型
//! - 定义可被环境变量覆盖的设置分组（偏好设置、DS salt、设备信息）
//! - 提供配置文件（config.json）的加载、校验与保存
//!
//! 使用约定：
//! - 进程启动时调用一次 [`store::ConfigStore::bootstrap`]，之后以引用传递 `ConfigStore`
//! - 本库不做任何同步；并发修改需由调用方自行加锁
//!
//! 作者：mys-goods 项目组
//! 创建时间：2026-10-14
//! 修改时间：2026-10-14

pub mod account;
pub mod credentials;
pub mod env;
pub mod paths;
pub mod plan;
pub mod record;
pub mod settings;
pub mod store;

pub use account::{Account, DeviceIdGenerator, UuidDeviceIdGenerator};
pub use credentials::{CredentialError, CredentialSet};
pub use env::EnvOverlay;
pub use plan::{AccountRef, ExchangePlan};
pub use settings::{DeviceConfig, Preference, SaltConfig};
pub use store::{ConfigError, ConfigStore};
