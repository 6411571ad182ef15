//! Canonical plugin naming.
//!
//! Display names in the spec document are case- and punctuation-insensitive.
//! Every registry lookup and cache key uses the canonical identifier
//! produced here, so `"My-Plugin"`, `"my_plugin"`, and `"MyPlugin"` all
//! refer to the same plugin.

/// Normalize a plugin display name to its canonical identifier:
/// lowercase, ASCII alphanumerics only.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
