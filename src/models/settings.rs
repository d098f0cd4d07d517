use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    #[default]
    Actual,
    Estimated,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Actual => "actual",
            PaymentMode::Estimated => "estimated",
        }
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "actual" => Ok(PaymentMode::Actual),
            "estimated" => Ok(PaymentMode::Estimated),
            other => Err(format!("unknown payment mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSettings {
    pub payment_mode: PaymentMode,
    pub hide_currency: bool,
}

impl DashboardSettings {
    /// Currency hiding only applies to estimated figures.
    pub fn effective_hide_currency(&self) -> bool {
        self.payment_mode == PaymentMode::Estimated && self.hide_currency
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveSettingsRequest {
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub hide_currency: bool,
}
