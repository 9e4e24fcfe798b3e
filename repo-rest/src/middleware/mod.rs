//! Middleware applied by [`Server`](crate::server::Server)

pub mod request_tracking;

pub use request_tracking::{
    redact_query, request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    RedactingMakeSpan, REQUEST_ID_HEADER, SENSITIVE_HEADERS,
};
