pub mod api;
pub mod config;
pub mod external_services;
pub mod notification_handler;
pub mod record_store;
