use crate::errors::{ConnectorError, ConnectorResult};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

fn invalid_integer(constraint: &str, key: &str) -> ConnectorError {
    let constraint = if constraint.is_empty() {
        String::new()
    } else {
        format!("{} ", constraint)
    };
    ConnectorError::InvalidParameter(format!(
        "Please provide a valid {}integer value in the {}",
        constraint, key
    ))
}

/// Validate an integer action parameter given as a JSON number or numeric string.
///
/// Integral floats such as `10.0` are accepted. Negative values are always
/// rejected, zero only when `allow_zero` is false.
pub fn validate_integer(value: &Value, key: &str, allow_zero: bool) -> ConnectorResult<u64> {
    let number = match value {
        Value::Number(n) => {
            if let Some(n) = n.as_u64() {
                Some(Ok(n))
            } else {
                n.as_f64().map(|f| float_to_integer(f, key))
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .map(|f| float_to_integer(f, key)),
        _ => None,
    };

    let number = match number {
        Some(result) => result?,
        None => {
            debug!("Parameter {} is not numeric: {:?}", key, value);
            return Err(invalid_integer("", key));
        }
    };

    if !allow_zero && number == 0 {
        return Err(invalid_integer("non-zero positive", key));
    }

    Ok(number)
}

fn float_to_integer(value: f64, key: &str) -> ConnectorResult<u64> {
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(invalid_integer("", key));
    }
    if value < 0.0 {
        return Err(invalid_integer("non-negative", key));
    }
    if value >= u64::MAX as f64 {
        return Err(invalid_integer("", key));
    }
    Ok(value as u64)
}

/// Search filters accepted by `run_query`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryFilters {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub internet_message_id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Raw Gmail query; replaces every other filter when present
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum QueryField {
    Label,
    Subject,
    Sender,
    MessageId,
    Body,
}

impl QueryField {
    const ORDER: [QueryField; 5] = [
        QueryField::Label,
        QueryField::Subject,
        QueryField::Sender,
        QueryField::MessageId,
        QueryField::Body,
    ];

    fn value<'a>(&self, filters: &'a QueryFilters) -> Option<&'a str> {
        match self {
            QueryField::Label => filters.label.as_deref(),
            QueryField::Subject => filters.subject.as_deref(),
            QueryField::Sender => filters.sender.as_deref(),
            QueryField::MessageId => filters.internet_message_id.as_deref(),
            QueryField::Body => filters.body.as_deref(),
        }
    }

    fn render(&self, value: &str) -> String {
        match self {
            QueryField::Label => format!("label:{}", value),
            QueryField::Subject => format!("subject:{}", value),
            QueryField::Sender => format!("from:{}", value),
            QueryField::MessageId => format!("rfc822msgid:{}", value),
            QueryField::Body => value.to_string(),
        }
    }
}

/// Build the Gmail search string for `run_query`.
pub fn build_query(filters: &QueryFilters) -> String {
    if let Some(query) = &filters.query {
        return query.clone();
    }

    QueryField::ORDER
        .iter()
        .filter_map(|field| field.value(filters).map(|value| field.render(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

const PROMOTED_HEADERS: [&str; 5] = ["subject", "delivered-to", "from", "to", "message-id"];

/// Flatten a metadata-format message.
///
/// `payload` is removed and the first `Subject`, `Delivered-To`, `From`, `To`
/// and `Message-ID` headers (case-insensitive) are hoisted to top-level keys
/// with `-` replaced by `_`.
pub fn map_email_details(mut message: Map<String, Value>) -> Map<String, Value> {
    let headers = match message.remove("payload") {
        Some(Value::Object(mut payload)) => payload.remove("headers"),
        _ => None,
    };

    let headers = match headers {
        Some(Value::Array(headers)) if !headers.is_empty() => headers,
        _ => return message,
    };

    // Headers still to find; each is taken from its first occurrence only
    let mut pending: Vec<&str> = PROMOTED_HEADERS.to_vec();
    let mut promoted = Map::new();

    for header in &headers {
        if pending.is_empty() {
            break;
        }

        let name = match header.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => name.to_lowercase(),
            _ => continue,
        };

        let Some(pos) = pending.iter().position(|wanted| *wanted == name) else {
            continue;
        };
        pending.swap_remove(pos);

        let value = header
            .get("value")
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
        promoted.insert(name.replace('-', "_"), value);
    }

    message.extend(promoted);
    message
}

/// Split a comma separated id list, trimming entries and dropping empty ones.
pub fn parse_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render ids the way operators see them in delete messages: `['a', 'b']`.
pub fn format_id_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{}'", id)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Append `item` unless it is already present, keeping first-seen order.
pub(crate) fn push_unique(items: &mut Vec<String>, item: &str) {
    if !items.iter().any(|existing| existing == item) {
        items.push(item.to_string());
    }
}
