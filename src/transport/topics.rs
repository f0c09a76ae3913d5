//! Topic pattern helpers.
//!
//! Patterns are `/`-separated; a `+` segment matches exactly one topic
//! segment and that segment is taken as the device id.  Outgoing topics use
//! a `{device_id}` placeholder instead.

/// Placeholder substituted by [`format_topic`].
pub const DEVICE_PLACEHOLDER: &str = "{device_id}";

/// Returns the segment matched by the first `+` when `topic` matches
/// `pattern`.  Empty device ids never match.
pub fn device_id<'t>(pattern: &str, topic: &'t str) -> Option<&'t str> {
    let mut pattern_parts = pattern.split('/');
    let mut topic_parts = topic.split('/');
    let mut device = None;

    loop {
        match (pattern_parts.next(), topic_parts.next()) {
            (None, None) => return device,
            (Some("+"), Some(seg)) => {
                if seg.is_empty() {
                    return None;
                }
                device.get_or_insert(seg);
            }
            (Some(p), Some(seg)) if p == seg => {}
            _ => return None,
        }
    }
}

/// Substitute `device_id` into an outgoing topic pattern.
pub fn format_topic(pattern: &str, device_id: &str) -> String {
    pattern.replace(DEVICE_PLACEHOLDER, device_id)
}
