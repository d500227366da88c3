//! Platform length limits for message bodies

use crate::error::{NotifyError, NotifyResult};

const ELLIPSIS: char = '…';

/// Length as the platform counts it: UTF-16 code units
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Make `text` fit within `limit` UTF-16 units.
///
/// Over-long text is either cut at a character boundary and suffixed with
/// an ellipsis (logged at `warn`), or rejected when `truncate` is off.
pub fn fit_to_limit(
    text: &str,
    limit: usize,
    truncate: bool,
    position: &str,
) -> NotifyResult<String> {
    let length = utf16_len(text);
    if length <= limit {
        return Ok(text.to_string());
    }

    if !truncate {
        return Err(NotifyError::Validation(format!(
            "{} is {} characters long, limit is {}",
            position, length, limit
        )));
    }

    let budget = limit.saturating_sub(ELLIPSIS.len_utf16());
    let mut used = 0;
    let mut cut = 0;
    for (offset, ch) in text.char_indices() {
        if used + ch.len_utf16() > budget {
            break;
        }
        used += ch.len_utf16();
        cut = offset + ch.len_utf8();
    }

    let mut truncated = String::with_capacity(cut + ELLIPSIS.len_utf8());
    truncated.push_str(&text[..cut]);
    truncated.push(ELLIPSIS);

    tracing::warn!(
        position,
        original_length = length,
        limit,
        "Message body truncated to platform limit"
    );

    Ok(truncated)
}
