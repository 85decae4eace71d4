//! 零售商（商户档案）模型。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// 零售商审核状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetailerStatus {
    #[default]
    Pending,
    Active,
    Suspended,
    Rejected,
}

impl RetailerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetailerStatus::Pending => "pending",
            RetailerStatus::Active => "active",
            RetailerStatus::Suspended => "suspended",
            RetailerStatus::Rejected => "rejected",
        }
    }

    /// 未知取值按 pending 处理。
    pub fn parse(value: &str) -> Self {
        match value {
            "active" => RetailerStatus::Active,
            "suspended" => RetailerStatus::Suspended,
            "rejected" => RetailerStatus::Rejected,
            _ => RetailerStatus::Pending,
        }
    }
}

/// 地址信息。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetailerAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// 零售商记录。
///
/// 仅在 `AppUser.retailer_id` 有值时通过关联查询获取，不嵌入用户记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retailer {
    pub id: String,
    pub business_name: String,
    pub business_type: Option<String>,
    pub registration_number: Option<String>,
    pub tax_number: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: RetailerAddress,
    pub credit_limit: f64,
    pub current_balance: f64,
    pub status: RetailerStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<i64>,
    pub documents: Vec<Value>,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}
