use std::sync::Arc;

use tracing::{error, info, warn};

use crate::external_services::moneta::receipt::ReceiptSettings;
use crate::external_services::moneta::response::ResponseEnvelope;
use crate::external_services::moneta::{
    NotificationParams, PaymentStatus, ResultCode, SignatureCodec, MNT_AMOUNT,
};
use crate::external_services::NotificationError;
use crate::record_store::RecordStore;

#[derive(Debug)]
pub enum Outcome {
    /// Request without any parameters, answered before validation.
    HealthCheck,
    Accepted(ResponseEnvelope),
    Rejected {
        error: NotificationError,
        envelope: ResponseEnvelope,
    },
}

impl Outcome {
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            Outcome::HealthCheck => None,
            Outcome::Accepted(envelope) | Outcome::Rejected { envelope, .. } => Some(envelope),
        }
    }
}

pub struct NotificationHandler {
    merchant_id: String,
    codec: SignatureCodec,
    store: Arc<dyn RecordStore>,
    receipt: Option<ReceiptSettings>,
}

impl NotificationHandler {
    pub fn new(
        merchant_id: impl Into<String>,
        codec: SignatureCodec,
        store: Arc<dyn RecordStore>,
        receipt: Option<ReceiptSettings>,
    ) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            codec,
            store,
            receipt,
        }
    }

    pub async fn handle(&self, params: &NotificationParams) -> Outcome {
        if params.is_empty() {
            return Outcome::HealthCheck;
        }

        let transaction_id = params.transaction_id();

        // An unconfigured merchant id must not match a notification without MNT_ID.
        if self.merchant_id.is_empty() || params.merchant_id() != self.merchant_id {
            let received = params.merchant_id().to_string();
            let envelope = self
                .envelope(ResultCode::Failure, &received, params)
                .with_description("Unknown merchant");

            return self.reject(NotificationError::MerchantMismatch { received }, envelope);
        }

        if !self.codec.is_configured() {
            let envelope = self
                .envelope(ResultCode::Failure, &self.merchant_id, params)
                .with_description("Processing error");

            return self.reject(NotificationError::NotConfigured, envelope);
        }

        if !self.codec.verify_inbound(params) {
            let envelope = self
                .envelope(ResultCode::Failure, &self.merchant_id, params)
                .with_description("Invalid signature");

            return self.reject(NotificationError::InvalidSignature, envelope);
        }

        let attributes = match &self.receipt {
            Some(receipt) => match self.receipt_attributes(receipt, params).await {
                Ok(attributes) => attributes,
                Err(err) => return self.failure(err, params),
            },
            None => Vec::new(),
        };

        let status = PaymentStatus::for_params(params);

        if let Err(err) = self
            .store
            .update_payment(transaction_id, params.amount(), status)
            .await
        {
            return self.failure(NotificationError::RecordUpdate(err), params);
        }

        info!(
            transaction_id,
            operation_id = params.operation_id(),
            amount = params.amount(),
            %status,
            "Payment notification accepted"
        );

        Outcome::Accepted(
            self.envelope(ResultCode::Success, &self.merchant_id, params)
                .with_description("Payment accepted")
                .with_attributes(attributes),
        )
    }

    async fn receipt_attributes(
        &self,
        receipt: &ReceiptSettings,
        params: &NotificationParams,
    ) -> Result<Vec<(String, String)>, NotificationError> {
        let customer = self
            .store
            .recipient_email(params.transaction_id())
            .await
            .map_err(NotificationError::RecipientLookup)?;

        receipt.attributes(params.amount(), &customer)
    }

    fn envelope(
        &self,
        result_code: ResultCode,
        merchant_id: &str,
        params: &NotificationParams,
    ) -> ResponseEnvelope {
        let envelope =
            ResponseEnvelope::signed(&self.codec, result_code, merchant_id, params.transaction_id());

        match params.get(MNT_AMOUNT) {
            Some(amount) => envelope.with_amount(amount),
            None => envelope,
        }
    }

    fn reject(&self, error: NotificationError, envelope: ResponseEnvelope) -> Outcome {
        warn!(
            transaction_id = %envelope.transaction_id,
            reason = error.kind(),
            "Payment notification rejected: {error}"
        );

        Outcome::Rejected { error, envelope }
    }

    /// Downstream failure after the notification passed validation.
    fn failure(&self, error: NotificationError, params: &NotificationParams) -> Outcome {
        error!(
            transaction_id = params.transaction_id(),
            reason = error.kind(),
            "Payment notification failed: {error}"
        );

        let envelope = self
            .envelope(ResultCode::Failure, &self.merchant_id, params)
            .with_description("Processing error");

        Outcome::Rejected { error, envelope }
    }
}
