use std::fmt::{Debug, Formatter};
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::{de, Deserialize, Deserializer};

use crate::external_services::moneta::receipt::ReceiptSettings;
use crate::external_services::moneta::response::{PlainTextEncoder, ResponseEncoder, XmlEncoder};
use crate::external_services::moneta::SignatureCodec;
use crate::record_store::AirtableSettings;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// `SUCCESS` / `FAIL`
    Plain,
    /// Signed `MNT_RESPONSE`
    #[default]
    Xml,
    /// Signed `MNT_RESPONSE` with INVENTORY and CUSTOMER attributes
    XmlReceipt,
}

#[derive(Deserialize, Clone)]
pub struct Config {
    #[serde(rename = "mnt_id", default)]
    pub merchant_id: String,
    #[serde(rename = "mnt_integrity_code", default)]
    pub integrity_code: String,

    #[serde(rename = "airtable_api_key", default)]
    pub airtable_api_key: String,
    #[serde(rename = "airtable_base_id", default)]
    pub airtable_base_id: String,
    #[serde(rename = "airtable_table_name", default = "default_table_name")]
    pub airtable_table_name: String,
    #[serde(rename = "airtable_api_url", default = "default_api_url")]
    pub airtable_api_url: String,
    #[serde(
        rename = "airtable_timeout_secs",
        default = "default_timeout_secs",
        deserialize_with = "timeout_secs"
    )]
    pub airtable_timeout_secs: u64,
    #[serde(rename = "airtable_recipient_field", default = "default_recipient_field")]
    pub airtable_recipient_field: String,

    #[serde(rename = "webhook_response_format", default)]
    pub response_format: ResponseFormat,
    #[serde(rename = "webhook_include_description", default, deserialize_with = "boolean")]
    pub include_description: bool,
    #[serde(rename = "webhook_include_amount", default, deserialize_with = "boolean")]
    pub include_amount: bool,

    #[serde(rename = "receipt_item_name", default = "default_item_name")]
    pub receipt_item_name: String,
    #[serde(rename = "receipt_vat_tag", default = "default_vat_tag")]
    pub receipt_vat_tag: String,

    #[serde(rename = "bind_addr", default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_table_name() -> String {
    "Payments".to_string()
}

fn default_api_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Environment flags: "1"/"true"/"yes"/"on" and "0"/"false"/"no"/"off"/"".
fn boolean<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = String::deserialize(deserializer)?;

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(de::Error::custom(format!("Invalid boolean {other:?}"))),
    }
}

fn timeout_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = String::deserialize(deserializer)?;

    match value.trim() {
        "" => Ok(default_timeout_secs()),
        secs => secs.parse().map_err(de::Error::custom),
    }
}

fn default_recipient_field() -> String {
    "Email (from Resident)".to_string()
}

fn default_item_name() -> String {
    "Подписка на мероприятия".to_string()
}

fn default_vat_tag() -> String {
    "1105".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

impl Config {
    /// Reads the process environment, `.env` included when present.
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let config = envy::from_env::<Self>().context("Invalid environment variable")?;

        Ok(config.trimmed())
    }

    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::from_iter::<_, Self>(vars).context("Invalid environment variable")?;

        Ok(config.trimmed())
    }

    fn trimmed(mut self) -> Self {
        for value in [
            &mut self.merchant_id,
            &mut self.integrity_code,
            &mut self.airtable_api_key,
            &mut self.airtable_base_id,
            &mut self.airtable_table_name,
        ] {
            *value = value.trim().to_string();
        }

        self
    }

    /// Names of required variables that are empty or unset.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("MNT_ID", &self.merchant_id),
            ("MNT_INTEGRITY_CODE", &self.integrity_code),
            ("AIRTABLE_API_KEY", &self.airtable_api_key),
            ("AIRTABLE_BASE_ID", &self.airtable_base_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn signature_codec(&self) -> SignatureCodec {
        SignatureCodec::new(self.integrity_code.clone())
    }

    pub fn airtable_settings(&self) -> AirtableSettings {
        AirtableSettings {
            api_url: self.airtable_api_url.clone(),
            api_key: self.airtable_api_key.clone(),
            base_id: self.airtable_base_id.clone(),
            table_name: self.airtable_table_name.clone(),
            recipient_field: self.airtable_recipient_field.clone(),
            timeout: Duration::from_secs(self.airtable_timeout_secs),
        }
    }

    /// Present only for deployments that answer with receipt attributes.
    pub fn receipt_settings(&self) -> Option<ReceiptSettings> {
        match self.response_format {
            ResponseFormat::XmlReceipt => Some(ReceiptSettings {
                item_name: self.receipt_item_name.clone(),
                vat_tag: self.receipt_vat_tag.clone(),
            }),
            ResponseFormat::Plain | ResponseFormat::Xml => None,
        }
    }

    pub fn response_encoder(&self) -> Box<dyn ResponseEncoder> {
        match self.response_format {
            ResponseFormat::Plain => Box::new(PlainTextEncoder),
            ResponseFormat::Xml | ResponseFormat::XmlReceipt => Box::new(XmlEncoder::new(
                self.include_description,
                self.include_amount,
            )),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("merchant_id", &self.merchant_id)
            .field("integrity_code", &"<redacted>")
            .field("airtable_api_key", &"<redacted>")
            .field("airtable_base_id", &self.airtable_base_id)
            .field("airtable_table_name", &self.airtable_table_name)
            .field("airtable_api_url", &self.airtable_api_url)
            .field("airtable_timeout_secs", &self.airtable_timeout_secs)
            .field("response_format", &self.response_format)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[
            ("MNT_ID", " 12345 "),
            ("MNT_INTEGRITY_CODE", "secret"),
            ("AIRTABLE_API_KEY", "key"),
            ("AIRTABLE_BASE_ID", "app1"),
        ]))
        .unwrap();

        assert_eq!(config.merchant_id, "12345");
        assert_eq!(config.airtable_table_name, "Payments");
        assert_eq!(config.airtable_api_url, "https://api.airtable.com/v0");
        assert_eq!(config.airtable_timeout_secs, 10);
        assert_eq!(config.response_format, ResponseFormat::Xml);
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert!(config.missing_required().is_empty());
        assert!(config.receipt_settings().is_none());
    }

    #[test]
    fn test_missing_required_is_not_fatal() {
        let config = Config::from_vars(vars(&[("MNT_ID", "12345"), ("AIRTABLE_API_KEY", "  ")]))
            .unwrap();

        assert_eq!(
            config.missing_required(),
            ["MNT_INTEGRITY_CODE", "AIRTABLE_API_KEY", "AIRTABLE_BASE_ID"]
        );
    }

    #[test]
    fn test_response_format() {
        let config = Config::from_vars(vars(&[
            ("WEBHOOK_RESPONSE_FORMAT", "xml_receipt"),
            ("RECEIPT_VAT_TAG", "1104"),
        ]))
        .unwrap();

        assert_eq!(config.response_format, ResponseFormat::XmlReceipt);
        assert_eq!(
            config.receipt_settings(),
            Some(ReceiptSettings {
                item_name: "Подписка на мероприятия".to_string(),
                vat_tag: "1104".to_string(),
            })
        );

        let config = Config::from_vars(vars(&[("WEBHOOK_RESPONSE_FORMAT", "plain")])).unwrap();
        assert_eq!(config.response_format, ResponseFormat::Plain);

        assert!(Config::from_vars(vars(&[("WEBHOOK_RESPONSE_FORMAT", "json")])).is_err());
    }

    #[test]
    fn test_flags_accept_numeric_form() {
        let config = Config::from_vars(vars(&[
            ("WEBHOOK_INCLUDE_AMOUNT", "1"),
            ("WEBHOOK_INCLUDE_DESCRIPTION", "True"),
            ("AIRTABLE_TIMEOUT_SECS", ""),
        ]))
        .unwrap();

        assert!(config.include_amount);
        assert!(config.include_description);
        assert_eq!(config.airtable_timeout_secs, 10);

        let config = Config::from_vars(vars(&[
            ("WEBHOOK_INCLUDE_AMOUNT", "0"),
            ("WEBHOOK_INCLUDE_DESCRIPTION", ""),
            ("AIRTABLE_TIMEOUT_SECS", " 30 "),
        ]))
        .unwrap();

        assert!(!config.include_amount);
        assert!(!config.include_description);
        assert_eq!(config.airtable_timeout_secs, 30);

        assert!(Config::from_vars(vars(&[("WEBHOOK_INCLUDE_AMOUNT", "maybe")])).is_err());
        assert!(Config::from_vars(vars(&[("AIRTABLE_TIMEOUT_SECS", "ten")])).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::from_vars(vars(&[
            ("MNT_INTEGRITY_CODE", "integrity-secret"),
            ("AIRTABLE_API_KEY", "api-secret"),
        ]))
        .unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("integrity-secret"));
        assert!(!debug.contains("api-secret"));
    }
}
