use serde::Serialize;

use crate::external_services::NotificationError;

pub const INVENTORY: &str = "INVENTORY";
pub const CUSTOMER: &str = "CUSTOMER";

/// Settings for the fiscal receipt passed back in MNT_ATTRIBUTES.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSettings {
    pub item_name: String,
    pub vat_tag: String,
}

/**
Позиция чека. Moneta ожидает INVENTORY как JSON-массив строкой.
 */
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InventoryItem<'a> {
    name: &'a str,
    price: f64,
    quantity: u32,
    vat_tag: &'a str,
    /**
    Признак способа расчёта
     */
    pm: &'static str,
    /**
    Признак предмета расчёта
     */
    po: &'static str,
}

impl ReceiptSettings {
    /// Single-item receipt for `amount` addressed to `customer`. Empty values are dropped.
    pub fn attributes(
        &self,
        amount: &str,
        customer: &str,
    ) -> Result<Vec<(String, String)>, NotificationError> {
        let invalid_amount = || NotificationError::InvalidAmount(amount.to_string());

        let price = amount
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|p| p.is_finite())
            .ok_or_else(invalid_amount)?;

        let inventory = serde_json::to_string(&[InventoryItem {
            name: &self.item_name,
            price,
            quantity: 1,
            vat_tag: &self.vat_tag,
            pm: "full_payment",
            po: "commodity",
        }])
        .map_err(|_| invalid_amount())?;

        Ok([(INVENTORY, inventory), (CUSTOMER, customer.to_string())]
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.to_string(), value))
            .collect())
    }
}
