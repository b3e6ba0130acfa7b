//! 兑换计划数据。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::account::{Account, DeviceIdGenerator};
use crate::record::parse_known;

/// 兑换计划引用的账户。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AccountRef {
    /// 直接内嵌的账户数据。
    Embedded(Account),
    /// 账户在 `ConfigStore::accounts` 中的位置。
    ///
    /// 位置按账户键的字典序计算，与配置文件中账户出现的先后顺序无关：
    /// `{"b": …, "a": …}` 中序号 0 指向 `"a"`。
    /// 手工编辑配置文件时请按排序后的位置填写序号。
    Index(usize),
}

/// 一次商品兑换计划。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangePlan {
    /// 商品 ID。
    pub good_id: i64,
    /// 收货地址 ID。
    pub address_id: i64,
    /// 米游社账户。
    pub account: AccountRef,
    /// 商品对应游戏的玩家 UID（由兑换执行方解析后回填）。
    pub game_uid: Option<i64>,
}

/// 解析兑换计划时的失败原因。
#[derive(Debug)]
pub(crate) enum PlanParseError {
    Schema(serde_json::Error),
    NegativeIndex(i64),
}

impl ExchangePlan {
    /// 从 JSON 值解析（未知字段被忽略）。
    ///
    /// 返回值：
    /// - `(计划, 内嵌账户是否生成了新的设备 ID)`
    pub(crate) fn from_value(
        value: Value,
        generator: &dyn DeviceIdGenerator,
    ) -> Result<(Self, bool), PlanParseError> {
        let raw: RawExchangePlan =
            parse_known(value, RawExchangePlan::FIELDS, "exchange_plan").map_err(PlanParseError::Schema)?;
        let (account, generated) = match raw.account {
            Value::Number(n) => match n.as_i64() {
                Some(index) if index < 0 => return Err(PlanParseError::NegativeIndex(index)),
                Some(index) => (AccountRef::Index(index as usize), false),
                None => {
                    return Err(PlanParseError::Schema(serde::de::Error::custom(format!(
                        "account 序号必须为整数，实际为 {n}"
                    ))))
                }
            },
            other => {
                let (account, generated) =
                    Account::from_value(other, generator).map_err(PlanParseError::Schema)?;
                (AccountRef::Embedded(account), generated)
            }
        };
        Ok((
            Self {
                good_id: raw.good_id,
                address_id: raw.address_id,
                account,
                game_uid: raw.game_uid,
            },
            generated,
        ))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawExchangePlan {
    good_id: i64,
    address_id: i64,
    account: Value,
    #[serde(default)]
    game_uid: Option<i64>,
}

impl RawExchangePlan {
    const FIELDS: &'static [&'static str] = &["good_id", "address_id", "account", "game_uid"];
}
