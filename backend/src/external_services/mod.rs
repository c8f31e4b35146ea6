pub mod moneta;

use md5::{Digest, Md5};
use thiserror::Error;

use crate::record_store::RecordStoreError;

fn md5_hex(data: &str) -> String {
    let mut hasher = Md5::new();

    hasher.update(data.as_bytes());

    hex::encode(hasher.finalize())
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Merchant id mismatch: received {received:?}")]
    MerchantMismatch { received: String },

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Integrity code is not configured")]
    NotConfigured,

    #[error("Record update failed: {0}")]
    RecordUpdate(#[source] RecordStoreError),

    #[error("Recipient lookup failed: {0}")]
    RecipientLookup(#[source] RecordStoreError),

    #[error("Amount {0:?} is not a number")]
    InvalidAmount(String),
}

impl NotificationError {
    /// Rejections caused by the request itself, as opposed to downstream failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NotificationError::MerchantMismatch { .. } | NotificationError::InvalidSignature
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NotificationError::MerchantMismatch { .. } => "merchant_mismatch",
            NotificationError::InvalidSignature => "invalid_signature",
            NotificationError::NotConfigured => "not_configured",
            NotificationError::RecordUpdate(_) => "record_update",
            NotificationError::RecipientLookup(_) => "recipient_lookup",
            NotificationError::InvalidAmount(_) => "invalid_amount",
        }
    }
}
