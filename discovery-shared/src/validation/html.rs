//! Whitelist HTML validation.
//!
//! Only a small set of formatting tags is accepted. Each tag allows its own
//! attributes plus [`UNIVERSAL_ATTRIBUTES`]. Comments, declarations and
//! processing instructions are always rejected.

use crate::errors::ValidationError;

pub const UNIVERSAL_ATTRIBUTES: &[&str] = &["align", "dir", "lang", "style", "typeof"];

const ALLOWED_TAGS: &[(&str, &[&str])] = &[
    ("a", &["href", "property", "rel", "target", "title"]),
    ("b", &[]),
    ("bdo", &[]),
    ("br", &[]),
    ("div", &["property"]),
    ("em", &[]),
    ("i", &[]),
    ("img", &["alt", "height", "src", "title", "width"]),
    ("li", &[]),
    ("ol", &["start", "type"]),
    ("p", &[]),
    ("span", &["property"]),
    ("strong", &[]),
    ("table", &["border", "cellpadding", "cellspacing"]),
    ("td", &["colspan", "rowspan"]),
    ("th", &["colspan", "rowspan", "scope"]),
    ("tr", &[]),
    ("u", &[]),
    ("ul", &[]),
];

fn allowed_attributes(tag: &str) -> Option<&'static [&'static str]> {
    ALLOWED_TAGS
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, attrs)| *attrs)
}

/// Validates `input`, returning the first offending token.
pub fn validate_html(input: &str) -> Result<(), ValidationError> {
    let bytes = input.as_bytes();
    let mut pos = 0;

    while let Some(offset) = input[pos..].find('<') {
        let start = pos + offset;
        let rest = &input[start..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map(|i| i + 3).unwrap_or(rest.len());
            return Err(ValidationError::html(format!(
                "comment not allowed: {}",
                &rest[..end]
            )));
        }

        if rest.starts_with("<!") {
            let token = until_close(rest);
            let is_doctype = rest
                .get(2..9)
                .map(|word| word.eq_ignore_ascii_case("doctype"))
                .unwrap_or(false);
            if is_doctype {
                return Err(ValidationError::html(format!(
                    "doctype not allowed: {}",
                    token
                )));
            }
            return Err(ValidationError::html(format!(
                "declaration not allowed: {}",
                token
            )));
        }

        if rest.starts_with("<?") {
            return Err(ValidationError::html(format!(
                "processing instruction not allowed: {}",
                until_close(rest)
            )));
        }

        let is_end = rest.starts_with("</");
        let name_start = if is_end { start + 2 } else { start + 1 };
        if !bytes
            .get(name_start)
            .map(|b| b.is_ascii_alphabetic())
            .unwrap_or(false)
        {
            // A bare `<` in text.
            pos = start + 1;
            continue;
        }

        let close = find_tag_end(input, name_start).ok_or_else(|| {
            ValidationError::html(format!("unterminated tag: {}", rest))
        })?;
        let inner = &input[name_start..close];
        let name_len = inner
            .find(|c: char| c.is_whitespace() || c == '/')
            .unwrap_or(inner.len());
        let tag = inner[..name_len].to_ascii_lowercase();

        let allowed = allowed_attributes(&tag)
            .ok_or_else(|| ValidationError::html(format!("tag not allowed: {}", &input[start..=close])))?;

        if !is_end {
            for attribute in parse_attribute_names(&inner[name_len..]) {
                let attribute = attribute.to_ascii_lowercase();
                if !allowed.contains(&attribute.as_str())
                    && !UNIVERSAL_ATTRIBUTES.contains(&attribute.as_str())
                {
                    return Err(ValidationError::html(format!(
                        "attribute '{}' not allowed on <{}>",
                        attribute, tag
                    )));
                }
            }
        }

        pos = close + 1;
    }

    Ok(())
}

fn until_close(rest: &str) -> &str {
    match rest.find('>') {
        Some(i) => &rest[..=i],
        None => rest,
    }
}

/// Index of the `>` closing the tag that starts at `from`, skipping quoted values.
fn find_tag_end(input: &str, from: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in input[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

fn parse_attribute_names(mut rest: &str) -> Vec<&str> {
    let mut names = Vec::new();

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        names.push(&rest[..name_len]);
        rest = rest[name_len..].trim_start();

        if let Some(after_eq) = rest.strip_prefix('=') {
            let value = after_eq.trim_start();
            rest = match value.chars().next() {
                Some(q @ ('"' | '\'')) => match value[1..].find(q) {
                    Some(end) => &value[end + 2..],
                    None => "",
                },
                _ => {
                    let end = value.find(char::is_whitespace).unwrap_or(value.len());
                    &value[end..]
                }
            };
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(html: &str) -> String {
        match validate_html(html) {
            Err(ValidationError::Html(msg)) => msg,
            other => panic!("expected rejection for {html:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_accepts_whitelisted_markup() {
        assert!(validate_html("<p>Hello</p>").is_ok());
        assert!(validate_html("plain text with 3 < 4").is_ok());
        assert!(validate_html(
            r#"<ul><li><a href="https://x.org" target='_blank'>x</a></li></ul><br/>"#
        )
        .is_ok());
        assert!(validate_html(r#"<div style="color: red" lang=en><img src="a.png" alt="a > b"></div>"#).is_ok());
        assert!(validate_html("<P>Upper</P>").is_ok());
    }

    #[test]
    fn test_rejects_unknown_tags() {
        assert!(rejected("<script>alert(1)</script>").contains("<script>"));
        assert!(rejected("</foo>").contains("</foo>"));
    }

    #[test]
    fn test_rejects_unknown_attributes() {
        assert!(rejected("<p onload=''>x</p>").contains("onload"));
        assert!(rejected(r#"<a href="x" onclick="y">x</a>"#).contains("onclick"));
    }

    #[test]
    fn test_rejects_comments_and_declarations() {
        assert!(rejected("<!--x-->").contains("<!--x-->"));
        assert!(rejected("<!DOCTYPE html>").contains("doctype"));
        assert!(rejected("<![CDATA[x]]>").contains("declaration"));
        assert!(rejected("<?pi>").contains("<?pi>"));
    }

    #[test]
    fn test_rejects_unterminated_tag() {
        assert!(rejected("<p class=").contains("unterminated"));
    }
}
