use serde::Serializer;
use crate::ApiError;

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Fail with a validation error naming `property` when `value` is blank.
pub fn assert_not_blank(value: &str, property: &str) -> Result<(), ApiError> {
    if is_blank(value) {
        return Err(ApiError::Validation(format!("{property} may not be null/empty/blank")));
    }
    Ok(())
}

pub fn assert_condition(condition: bool, moniker: &str, property: &str) -> Result<(), ApiError> {
    if !condition {
        return Err(ApiError::Validation(format!("{property} failed custom condition {moniker}")));
    }
    Ok(())
}

/// Join ids the way audit details display them: `a|b|c`.
pub fn string_list<S: AsRef<str>>(values: &[S]) -> String {
    values.iter().map(|v| v.as_ref()).collect::<Vec<_>>().join("|")
}

/// Treat whitespace-only optional values as absent.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Escape an attribute value for use inside a distinguished name string (RFC 4514).
pub fn escape_dn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Serializes a binary blob as its length so key material never ends up in JSON output
pub fn serialize_blob_len<S>(blob: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u64(blob.len() as u64)
}
