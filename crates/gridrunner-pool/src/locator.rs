//! Translates the script locator grammar into a form fantoccini can search with.
//!
//! fantoccini's own `Locator` only speaks CSS, id, link text and XPath. The
//! remaining prefixes (`name`, `tagName`, `className`, `partialLinkText`) are
//! rewritten into an equivalent CSS or XPath expression before the search
//! reaches the driver.

use fantoccini::Locator;

use crate::error::PoolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Css,
    Id,
    LinkText,
    XPath,
}

/// A locator as written in a `.side` script, resolved to a string fantoccini
/// can search with directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocator {
    kind: Kind,
    value: String,
    /// The original `prefix=value` text, kept for error messages.
    original: String,
}

impl ScriptLocator {
    /// Parses a `prefix=value` target string. A bare string with no `=`
    /// is treated as a CSS selector, matching the convention Selenium IDE
    /// itself falls back to. A string with a `=` but an unrecognized
    /// prefix fails with `BadLocator`.
    pub fn parse(target: &str) -> Result<Self, PoolError> {
        let original = target.to_string();
        let (prefix, rest) = match target.split_once('=') {
            Some((p, r)) => (p, r),
            None => return Ok(ScriptLocator { kind: Kind::Css, value: original.clone(), original }),
        };
        let (kind, value) = match prefix {
            "css" => (Kind::Css, rest.to_string()),
            "id" => (Kind::Id, rest.to_string()),
            "linkText" => (Kind::LinkText, rest.to_string()),
            "xpath" => (Kind::XPath, rest.to_string()),
            "name" => (Kind::Css, format!("[name=\"{}\"]", rest)),
            "tagName" => (Kind::Css, rest.to_string()),
            "className" => (Kind::Css, format!(".{}", rest)),
            "partialLinkText" => (Kind::XPath, format!("//a[contains(text(), \"{}\")]", rest)),
            _ => return Err(PoolError::BadLocator(original)),
        };
        Ok(ScriptLocator { kind, value, original })
    }

    /// Resolves to the `fantoccini::Locator` the driver actually searches with.
    pub fn resolve(&self) -> Locator<'_> {
        match self.kind {
            Kind::Css => Locator::Css(&self.value),
            Kind::Id => Locator::Id(&self.value),
            Kind::LinkText => Locator::LinkText(&self.value),
            Kind::XPath => Locator::XPath(&self.value),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_target_defaults_to_css() {
        let loc = ScriptLocator::parse("#submit").unwrap();
        assert_eq!(loc.resolve(), Locator::Css("#submit"));
    }

    #[test]
    fn name_prefix_rewrites_to_attribute_selector() {
        let loc = ScriptLocator::parse("name=username").unwrap();
        assert_eq!(loc.resolve(), Locator::Css("[name=\"username\"]"));
    }

    #[test]
    fn class_name_prefix_rewrites_to_dot_selector() {
        let loc = ScriptLocator::parse("className=btn-primary").unwrap();
        assert_eq!(loc.resolve(), Locator::Css(".btn-primary"));
    }

    #[test]
    fn tag_name_prefix_rewrites_to_bare_selector() {
        let loc = ScriptLocator::parse("tagName=button").unwrap();
        assert_eq!(loc.resolve(), Locator::Css("button"));
    }

    #[test]
    fn partial_link_text_rewrites_to_contains_xpath() {
        let loc = ScriptLocator::parse("partialLinkText=Sign").unwrap();
        assert_eq!(loc.resolve(), Locator::XPath("//a[contains(text(), \"Sign\")]"));
    }

    #[test]
    fn link_text_and_xpath_and_id_pass_through_natively() {
        assert_eq!(ScriptLocator::parse("linkText=Home").unwrap().resolve(), Locator::LinkText("Home"));
        assert_eq!(ScriptLocator::parse("xpath=//div").unwrap().resolve(), Locator::XPath("//div"));
        assert_eq!(ScriptLocator::parse("id=main").unwrap().resolve(), Locator::Id("main"));
    }

    #[test]
    fn unknown_prefix_fails_with_bad_locator() {
        let err = ScriptLocator::parse("frobnicate=thing").unwrap_err();
        assert!(matches!(err, PoolError::BadLocator(original) if original == "frobnicate=thing"));
    }
}
