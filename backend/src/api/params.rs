use std::collections::HashMap;

use serde_json::value::RawValue;

use crate::external_services::moneta::NotificationParams;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const APPLICATION_JSON: &str = "application/json";

/// Merges query string, form body and JSON body into one mapping.
///
/// Later sources win on key collisions: query, then form, then JSON.
/// Bodies that can't be decoded contribute nothing.
pub fn collect_params(
    query: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> NotificationParams {
    let mut params = NotificationParams::new();

    if let Some(query) = query {
        params.extend(decode_urlencoded(query.as_bytes()));
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if content_type.starts_with(FORM_URLENCODED) {
        params.extend(decode_urlencoded(body));
    } else if content_type.starts_with(APPLICATION_JSON) {
        params.extend(decode_json_object(body));
    }

    params
}

fn decode_urlencoded(bytes: &[u8]) -> Vec<(String, String)> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes).unwrap_or_default()
}

fn decode_json_object(body: &[u8]) -> Vec<(String, String)> {
    let Ok(object) = serde_json::from_slice::<HashMap<String, Box<RawValue>>>(body) else {
        return Vec::new();
    };

    object
        .into_iter()
        .map(|(key, value)| (key, stringify(&value)))
        .collect()
}

/// Strings are unquoted, null is empty, anything else keeps its JSON text
/// so `10.00` stays `10.00`.
fn stringify(value: &RawValue) -> String {
    let raw = value.get().trim();

    if raw.starts_with('"') {
        serde_json::from_str::<String>(raw).unwrap_or_default()
    } else if raw == "null" {
        String::new()
    } else {
        raw.to_string()
    }
}
