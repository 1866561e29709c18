//! URL slug derivation for product names.

/// Derive a URL-safe slug from a display name.
///
/// Lowercases the input, maps every run of non-alphanumeric characters to a
/// single `-`, and trims leading/trailing separators. Mirrors what the
/// catalog expects for `products.slug`, which is unique per product name.
///
/// # Example
///
/// ```
/// use mercantile_core::slugify;
///
/// assert_eq!(slugify("Mechanical Keyboard (87 keys)"), "mechanical-keyboard-87-keys");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_separator = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(slugify("Wireless Mouse"), "wireless-mouse");
    }

    #[test]
    fn test_collapses_separators() {
        assert_eq!(slugify("A  --  B"), "a-b");
    }

    #[test]
    fn test_trims_edges() {
        assert_eq!(slugify("  padded name  "), "padded-name");
        assert_eq!(slugify("!!bang!!"), "bang");
    }

    #[test]
    fn test_keeps_digits() {
        assert_eq!(slugify("USB-C Hub 3000"), "usb-c-hub-3000");
    }

    #[test]
    fn test_unicode_lowercase() {
        assert_eq!(slugify("Café Crème"), "café-crème");
    }

    #[test]
    fn test_empty() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("***"), "");
    }
}
