pub mod params;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::external_services::moneta::response::ResponseEncoder;
use crate::notification_handler::NotificationHandler;
use crate::record_store::RecordStore;

use self::webhooks::moneta_webhook;

pub struct AppState {
    pub handler: NotificationHandler,
    pub encoder: Box<dyn ResponseEncoder>,
}

impl AppState {
    pub fn new(handler: NotificationHandler, encoder: Box<dyn ResponseEncoder>) -> Self {
        Self { handler, encoder }
    }

    pub fn from_config(config: &Config, store: Arc<dyn RecordStore>) -> Self {
        let handler = NotificationHandler::new(
            config.merchant_id.clone(),
            config.signature_codec(),
            store,
            config.receipt_settings(),
        );

        Self::new(handler, config.response_encoder())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhook", get(moneta_webhook).post(moneta_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
