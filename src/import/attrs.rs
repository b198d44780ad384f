//! Flat attribute lists and typed accessors.
//!
//! The streaming parsers hand every element's attributes around as a flat
//! `(name, value)` list. Lookups are case-sensitive. The typed accessors
//! mirror the lenient C-locale semantics the format has always had: missing
//! strings are empty, missing numbers are zero, and a missing `printable`
//! means printable.

use quick_xml::events::BytesStart;

use crate::error::Result;

/// Attributes of one element, in document order.
pub type AttributeList = Vec<(String, String)>;

/// Collect the attributes of an element start tag, unescaping values.
pub fn collect_attributes(element: &BytesStart<'_>) -> Result<AttributeList> {
    let mut attributes = AttributeList::new();
    for attribute in element.attributes() {
        let attribute = attribute?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// String attribute; empty on miss.
pub fn attr_string<'a>(attributes: &'a AttributeList, key: &str) -> &'a str {
    attributes
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
        .unwrap_or("")
}

/// Integer attribute; 0 on miss or malformed value.
pub fn attr_int(attributes: &AttributeList, key: &str) -> i32 {
    attr_string(attributes, key).trim().parse().unwrap_or(0)
}

/// Float attribute; 0 on miss or malformed value.
pub fn attr_float(attributes: &AttributeList, key: &str) -> f32 {
    attr_string(attributes, key).trim().parse().unwrap_or(0.0)
}

/// Boolean attribute, parsed as an integer; true on miss.
///
/// Note that the textual values `true`/`false` are not recognized (they parse
/// as 0); this is bit-compatible with the original integer-cast reader and is
/// relied on by existing files.
pub fn attr_bool(attributes: &AttributeList, key: &str) -> bool {
    match attributes.iter().find(|(name, _)| name == key) {
        None => true,
        Some((_, value)) => value.trim().parse::<i64>().unwrap_or(0) != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeList {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn string_defaults_to_empty() {
        let a = attrs(&[("name", "cube")]);
        assert_eq!(attr_string(&a, "name"), "cube");
        assert_eq!(attr_string(&a, "missing"), "");
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let a = attrs(&[("Name", "cube")]);
        assert_eq!(attr_string(&a, "name"), "");
    }

    #[test]
    fn numbers_default_to_zero() {
        let a = attrs(&[("id", "42"), ("x", "1.5"), ("bad", "abc")]);
        assert_eq!(attr_int(&a, "id"), 42);
        assert_eq!(attr_int(&a, "missing"), 0);
        assert_eq!(attr_int(&a, "bad"), 0);
        assert_eq!(attr_float(&a, "x"), 1.5);
        assert_eq!(attr_float(&a, "missing"), 0.0);
    }

    #[test]
    fn printable_semantics() {
        let a = attrs(&[("printable", "0")]);
        assert!(!attr_bool(&a, "printable"));
        let a = attrs(&[("printable", "1")]);
        assert!(attr_bool(&a, "printable"));
        // missing means printable
        assert!(attr_bool(&attrs(&[]), "printable"));
        // textual booleans are not recognized
        let a = attrs(&[("printable", "true")]);
        assert!(!attr_bool(&a, "printable"));
    }

    #[test]
    fn collect_unescapes_values() {
        let element = BytesStart::from_content(r#"metadata key="a" value="x &amp; y""#, 8);
        let a = collect_attributes(&element).unwrap();
        assert_eq!(attr_string(&a, "value"), "x & y");
    }
}
