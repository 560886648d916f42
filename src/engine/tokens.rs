use crate::model::*;

// ── Resource Token Parser ─────────────────────────────────────────

/// ASCII and full-width comma and semicolon.
const DELIMITERS: [char; 4] = [',', '，', ';', '；'];

/// Split text on any run of delimiters, trimming pieces and dropping empties.
pub fn split_tokens(text: &str) -> Vec<String> {
    text.split(DELIMITERS)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a raw list field into tokens, in order, without deduplication.
///
/// Rich-text segments are concatenated *before* splitting, so a token may span
/// segments: `[{text:"a"},{text:"b,c"}]` yields `["ab", "c"]`.
pub fn parse_tokens(raw: &RawValue) -> Vec<String> {
    match raw {
        RawValue::Text(s) => split_tokens(s),
        RawValue::Segments(segments) => {
            let joined: String = segments
                .iter()
                .map(|seg| seg.text.as_deref().unwrap_or(""))
                .collect();
            split_tokens(&joined)
        }
        RawValue::Object(seg) => seg.text.as_deref().map(split_tokens).unwrap_or_default(),
        RawValue::Null | RawValue::Number(_) | RawValue::Other(_) => Vec::new(),
    }
}

/// Parse and normalize into a set. Duplicates collapse to the first occurrence.
pub fn resource_set(raw: &RawValue, case: Case) -> ResourceSet {
    parse_tokens(raw).iter().map(|t| case.normalize(t)).collect()
}

/// Single-value path for catalog cells, event names and timestamp text.
/// Segment sequences contribute only their first segment. Blank text is `None`.
pub fn text_value(raw: &RawValue) -> Option<String> {
    let text = match raw {
        RawValue::Text(s) => s.clone(),
        RawValue::Segments(segments) => segments.first()?.text.clone()?,
        RawValue::Object(seg) => seg.text.clone()?,
        RawValue::Number(n) => n.to_string(),
        RawValue::Null | RawValue::Other(_) => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
