use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::external_services::moneta::{ResultCode, SignatureCodec};
use crate::notification_handler::Outcome;

pub const HEALTH_CHECK_BODY: &str = "OK";
pub const PLAIN_SUCCESS_BODY: &str = "SUCCESS";
pub const PLAIN_FAIL_BODY: &str = "FAIL";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_XML: &str = "application/xml";

/**
Ответ Moneta на уведомление о платеже.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    pub merchant_id: String,
    pub transaction_id: String,
    pub result_code: ResultCode,
    /**
    Текстовое описание результата (MNT_DESCRIPTION)
     */
    pub description: Option<String>,
    /**
    Сумма из уведомления, строка без изменений (MNT_AMOUNT)
     */
    pub amount: Option<String>,
    /**
    MD5(MNT_RESULT_CODE + MNT_ID + MNT_TRANSACTION_ID + INTEGRITY_CODE)
     */
    pub signature: String,
    /**
    Пары KEY/VALUE блока MNT_ATTRIBUTES, в порядке добавления
     */
    pub attributes: Vec<(String, String)>,
}

impl ResponseEnvelope {
    pub fn signed(
        codec: &SignatureCodec,
        result_code: ResultCode,
        merchant_id: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        let merchant_id = merchant_id.into();
        let transaction_id = transaction_id.into();
        let signature = codec.sign_outbound(result_code, &merchant_id, &transaction_id);

        Self {
            merchant_id,
            transaction_id,
            result_code,
            description: None,
            amount: None,
            signature,
            attributes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<(String, String)>) -> Self {
        self.attributes = attributes;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookReply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl WebhookReply {
    pub fn health_check() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: TEXT_PLAIN,
            body: HEALTH_CHECK_BODY.to_string(),
        }
    }
}

impl IntoResponse for WebhookReply {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// Wire format of the answer sent back to the gateway. Picked once per deployment.
pub trait ResponseEncoder: Send + Sync {
    fn encode(&self, outcome: &Outcome) -> WebhookReply;
}

/// `SUCCESS` / `FAIL` bodies; the HTTP status carries the failure class.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextEncoder;

impl ResponseEncoder for PlainTextEncoder {
    fn encode(&self, outcome: &Outcome) -> WebhookReply {
        match outcome {
            Outcome::HealthCheck => WebhookReply::health_check(),

            Outcome::Accepted(_) => WebhookReply {
                status: StatusCode::OK,
                content_type: TEXT_PLAIN,
                body: PLAIN_SUCCESS_BODY.to_string(),
            },

            Outcome::Rejected { error, .. } => WebhookReply {
                status: if error.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                },
                content_type: TEXT_PLAIN,
                body: PLAIN_FAIL_BODY.to_string(),
            },
        }
    }
}

/// `MNT_RESPONSE` document. Always HTTP 200, the gateway reads MNT_RESULT_CODE.
#[derive(Debug, Default, Clone, Copy)]
pub struct XmlEncoder {
    pub include_description: bool,
    pub include_amount: bool,
}

impl XmlEncoder {
    pub fn new(include_description: bool, include_amount: bool) -> Self {
        Self {
            include_description,
            include_amount,
        }
    }

    /**
    <?xml version="1.0" encoding="UTF-8"?>
    <MNT_RESPONSE>
      <MNT_ID>...</MNT_ID>
      <MNT_TRANSACTION_ID>...</MNT_TRANSACTION_ID>
      <MNT_RESULT_CODE>...</MNT_RESULT_CODE>
      <MNT_DESCRIPTION>...</MNT_DESCRIPTION>
      <MNT_AMOUNT>...</MNT_AMOUNT>
      <MNT_SIGNATURE>...</MNT_SIGNATURE>
      <MNT_ATTRIBUTES>
        <ATTRIBUTE><KEY>...</KEY><VALUE>...</VALUE></ATTRIBUTE>
      </MNT_ATTRIBUTES>
    </MNT_RESPONSE>
     */
    pub fn render(&self, envelope: &ResponseEnvelope) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);

        xml.push_str("<MNT_RESPONSE>");
        push_element(&mut xml, "MNT_ID", &envelope.merchant_id);
        push_element(&mut xml, "MNT_TRANSACTION_ID", &envelope.transaction_id);
        push_element(&mut xml, "MNT_RESULT_CODE", envelope.result_code.as_str());

        if self.include_description {
            if let Some(description) = &envelope.description {
                push_element(&mut xml, "MNT_DESCRIPTION", description);
            }
        }
        if self.include_amount {
            if let Some(amount) = &envelope.amount {
                push_element(&mut xml, "MNT_AMOUNT", amount);
            }
        }

        push_element(&mut xml, "MNT_SIGNATURE", &envelope.signature);

        if envelope.attributes.is_empty() {
            xml.push_str("<MNT_ATTRIBUTES/>");
        } else {
            xml.push_str("<MNT_ATTRIBUTES>");
            for (key, value) in &envelope.attributes {
                xml.push_str("<ATTRIBUTE>");
                push_element(&mut xml, "KEY", key);
                push_element(&mut xml, "VALUE", value);
                xml.push_str("</ATTRIBUTE>");
            }
            xml.push_str("</MNT_ATTRIBUTES>");
        }

        xml.push_str("</MNT_RESPONSE>");
        xml
    }
}

impl ResponseEncoder for XmlEncoder {
    fn encode(&self, outcome: &Outcome) -> WebhookReply {
        match outcome.envelope() {
            None => WebhookReply::health_check(),
            Some(envelope) => WebhookReply {
                status: StatusCode::OK,
                content_type: APPLICATION_XML,
                body: self.render(envelope),
            },
        }
    }
}

fn push_element(xml: &mut String, tag: &str, text: &str) {
    xml.push_str(&format!("<{tag}>{}</{tag}>", escape_xml(text)));
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }

    escaped
}
