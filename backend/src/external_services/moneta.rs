pub mod receipt;
pub mod response;

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};

use crate::external_services::md5_hex;

pub const MNT_ID: &str = "MNT_ID";
pub const MNT_TRANSACTION_ID: &str = "MNT_TRANSACTION_ID";
pub const MNT_OPERATION_ID: &str = "MNT_OPERATION_ID";
pub const MNT_AMOUNT: &str = "MNT_AMOUNT";
pub const MNT_CURRENCY_CODE: &str = "MNT_CURRENCY_CODE";
pub const MNT_SUBSCRIBER_ID: &str = "MNT_SUBSCRIBER_ID";
pub const MNT_TEST_MODE: &str = "MNT_TEST_MODE";
pub const MNT_SIGNATURE: &str = "MNT_SIGNATURE";

/**
Параметры уведомления Moneta, собранные из query, form и JSON.
Все значения хранятся строками в том виде, в котором пришли.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationParams(HashMap<String, String>);

impl NotificationParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn field(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }

    /**
    Идентификатор магазина в системе Moneta
     */
    pub fn merchant_id(&self) -> &str {
        self.field(MNT_ID)
    }

    /**
    ID заказа в нашей системе, он же id записи в Airtable
     */
    pub fn transaction_id(&self) -> &str {
        self.field(MNT_TRANSACTION_ID)
    }

    /**
    ID операции в системе Moneta
     */
    pub fn operation_id(&self) -> &str {
        self.field(MNT_OPERATION_ID)
    }

    /**
    Сумма, строка с двумя знаками после точки. Не переформатируется.
     */
    pub fn amount(&self) -> &str {
        self.field(MNT_AMOUNT)
    }

    pub fn currency_code(&self) -> &str {
        self.field(MNT_CURRENCY_CODE)
    }

    pub fn subscriber_id(&self) -> &str {
        self.field(MNT_SUBSCRIBER_ID)
    }

    /**
    "1" для тестовых платежей. Если поле не передано, считается "0".
     */
    pub fn test_mode(&self) -> &str {
        self.get(MNT_TEST_MODE).unwrap_or("0")
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode() == "1"
    }

    /// Received signature, lower-cased.
    pub fn signature(&self) -> String {
        self.field(MNT_SIGNATURE).to_lowercase()
    }
}

impl FromIterator<(String, String)> for NotificationParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, String)> for NotificationParams {
    fn extend<T: IntoIterator<Item = (String, String)>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    Failure,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Success => "200",
            ResultCode::Failure => "500",
        }
    }
}

impl Display for ResultCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    TestPaid,
}

impl PaymentStatus {
    pub fn for_params(params: &NotificationParams) -> Self {
        if params.is_test_mode() {
            PaymentStatus::TestPaid
        } else {
            PaymentStatus::Paid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::TestPaid => "Test Paid",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MD5 signatures of the Moneta notification protocol.
///
/// Inbound and outbound signatures concatenate different fields in a
/// different order; each direction has its own method.
#[derive(Clone)]
pub struct SignatureCodec {
    integrity_code: String,
}

impl SignatureCodec {
    pub fn new(integrity_code: impl Into<String>) -> Self {
        Self {
            integrity_code: integrity_code.into(),
        }
    }

    /// Without an integrity code every signature is computable from public fields.
    pub fn is_configured(&self) -> bool {
        !self.integrity_code.is_empty()
    }

    /**
    MD5(MNT_ID + MNT_TRANSACTION_ID + MNT_OPERATION_ID + MNT_AMOUNT +
        MNT_CURRENCY_CODE + MNT_SUBSCRIBER_ID + MNT_TEST_MODE + INTEGRITY_CODE)
     */
    pub fn sign_inbound(&self, params: &NotificationParams) -> String {
        let data = [
            params.merchant_id(),
            params.transaction_id(),
            params.operation_id(),
            params.amount(),
            params.currency_code(),
            params.subscriber_id(),
            params.test_mode(),
            &self.integrity_code,
        ]
        .concat();

        md5_hex(&data)
    }

    pub fn verify_inbound(&self, params: &NotificationParams) -> bool {
        self.sign_inbound(params) == params.signature()
    }

    /**
    MD5(MNT_RESULT_CODE + MNT_ID + MNT_TRANSACTION_ID + INTEGRITY_CODE)
     */
    pub fn sign_outbound(
        &self,
        result_code: ResultCode,
        merchant_id: &str,
        transaction_id: &str,
    ) -> String {
        let data = [
            result_code.as_str(),
            merchant_id,
            transaction_id,
            &self.integrity_code,
        ]
        .concat();

        md5_hex(&data)
    }
}

impl Debug for SignatureCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureCodec")
            .field("integrity_code", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> NotificationParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn reference_params() -> NotificationParams {
        params(&[
            (MNT_ID, "M1"),
            (MNT_TRANSACTION_ID, "T1"),
            (MNT_OPERATION_ID, "O1"),
            (MNT_AMOUNT, "10.00"),
            (MNT_CURRENCY_CODE, "RUB"),
            (MNT_SUBSCRIBER_ID, ""),
        ])
    }

    #[test]
    fn test_sign_inbound_reference_vector() {
        let codec = SignatureCodec::new("S");

        // MD5("M1T1O110.00RUB0S")
        assert_eq!(
            codec.sign_inbound(&reference_params()),
            "c91b10d1fdb6378453b2d59e6fccc2cf"
        );
    }

    #[test]
    fn test_sign_inbound_missing_fields_are_empty() {
        let codec = SignatureCodec::new("S");
        let mut p = reference_params();
        p.0.remove(MNT_SUBSCRIBER_ID);

        assert_eq!(codec.sign_inbound(&p), "c91b10d1fdb6378453b2d59e6fccc2cf");
        assert_eq!(
            codec.sign_inbound(&NotificationParams::new()),
            md5_hex("0S")
        );
    }

    #[test]
    fn test_sign_inbound_uses_test_mode_and_subscriber() {
        let codec = SignatureCodec::new("S");
        let mut p = reference_params();
        p.insert(MNT_TEST_MODE, "1");

        assert_eq!(codec.sign_inbound(&p), "57cb31a8bf91cbc4e788887ca34d0f23");

        let mut p = reference_params();
        p.insert(MNT_SUBSCRIBER_ID, "42user");

        assert_eq!(codec.sign_inbound(&p), "ac9d0eee1f553173b0f1cb786d8970b8");
    }

    #[test]
    fn test_amount_is_hashed_verbatim() {
        let codec = SignatureCodec::new("S");
        let mut p = reference_params();
        p.insert(MNT_AMOUNT, "10.0");

        assert_ne!(codec.sign_inbound(&p), "c91b10d1fdb6378453b2d59e6fccc2cf");
    }

    #[test]
    fn test_verify_inbound_ignores_case() {
        let codec = SignatureCodec::new("S");

        for sign in [
            "c91b10d1fdb6378453b2d59e6fccc2cf",
            "C91B10D1FDB6378453B2D59E6FCCC2CF",
            "C91b10D1fdb6378453B2d59e6fccc2cF",
        ] {
            let mut p = reference_params();
            p.insert(MNT_SIGNATURE, sign);

            assert!(codec.verify_inbound(&p), "{sign} should be accepted");
        }
    }

    #[test]
    fn test_verify_inbound_rejects_wrong_secret() {
        let codec = SignatureCodec::new("other");
        let mut p = reference_params();
        p.insert(MNT_SIGNATURE, "c91b10d1fdb6378453b2d59e6fccc2cf");

        assert!(!codec.verify_inbound(&p));
    }

    #[test]
    fn test_sign_outbound() {
        let codec = SignatureCodec::new("S");

        assert_eq!(
            codec.sign_outbound(ResultCode::Success, "M1", "T1"),
            "6c3d44799ef2906774ae21f20394d871"
        );
        assert_eq!(
            codec.sign_outbound(ResultCode::Failure, "M1", "T1"),
            "41b8222765a6c0e8a37c27cbc9f27c2e"
        );
    }

    #[test]
    fn test_test_mode_defaults_only_when_absent() {
        let mut p = NotificationParams::new();
        assert_eq!(p.test_mode(), "0");
        assert_eq!(PaymentStatus::for_params(&p), PaymentStatus::Paid);

        p.insert(MNT_TEST_MODE, "");
        assert_eq!(p.test_mode(), "");

        p.insert(MNT_TEST_MODE, "1");
        assert_eq!(PaymentStatus::for_params(&p), PaymentStatus::TestPaid);
        assert_eq!(PaymentStatus::TestPaid.to_string(), "Test Paid");
    }

    #[test]
    fn test_is_configured() {
        assert!(SignatureCodec::new("S").is_configured());
        assert!(!SignatureCodec::new("").is_configured());
    }

    #[test]
    fn test_debug_hides_integrity_code() {
        let codec = SignatureCodec::new("very-secret");

        assert!(!format!("{codec:?}").contains("very-secret"));
    }
}
