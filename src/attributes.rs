//! Parsing of Zimbra's `<a n="name">value</a>` attribute records.

use crate::element::Element;
use std::collections::HashMap;

/// Attribute name to every value seen for it, in document order.
pub type AttributeMap = HashMap<String, Vec<String>>;

/// Collect attribute records from `elements` into an [`AttributeMap`].
///
/// Elements named `a`, `attr` or `attribute` contribute their text to the
/// list for their `name` (or `n`) attribute. When an element carries both,
/// `name` wins. Other elements are skipped.
pub fn parse_attributes<'a, I>(elements: I) -> AttributeMap
where
    I: IntoIterator<Item = &'a Element>,
{
    let mut output = AttributeMap::new();
    for element in elements {
        if !matches!(element.local_name(), "a" | "attr" | "attribute") {
            continue;
        }
        // Unnamed records are kept under the empty name
        let name = element
            .attr("name")
            .or_else(|| element.attr("n"))
            .unwrap_or_default();
        output
            .entry(name.to_string())
            .or_default()
            .push(element.text().to_string());
    }
    output
}
