//! Sitemap model: the declarative tree of typed selector rules
//!
//! A [`SiteMap`] is immutable for the duration of a run. Selectors form a
//! tree through their parent ids, rooted at the pseudo-parent [`ROOT_PARENT`].
//! The tree queries here ([`SiteMap::children_of`], [`SiteMap::is_leaf`])
//! drive both selector activation and the recursion decision for Link
//! selectors.

use serde::{Deserialize, Serialize};

/// Pseudo-parent id that activates top-level selectors.
pub const ROOT_PARENT: &str = "_root";

/// One extraction rule and its position in the selector tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selector {
    /// Unique within a sitemap. Duplicates are not validated; the last
    /// evaluation wins.
    pub id: String,

    #[serde(rename = "type")]
    pub selector_type: SelectorType,

    /// Ordered parent ids. Only the first entry activates the selector; the
    /// rest are carried for self-reference detection and config round-trips.
    #[serde(rename = "parentSelectors")]
    pub parent_selectors: Vec<String>,

    /// CSS selector expression.
    pub selector: String,

    /// When false, only the first matched node is used.
    #[serde(default)]
    pub multiple: bool,

    /// Text selectors only: extract the first match of this pattern from the
    /// node text, falling back to the full trimmed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,

    /// Required for ElementAttribute selectors.
    #[serde(
        rename = "extractAttribute",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extract_attribute: Option<String>,

    /// Per-selector delay in milliseconds. Workers sleep for the largest
    /// delay declared under the active parent before fetching a page.
    #[serde(default)]
    pub delay: u64,
}

impl Selector {
    /// The parent id that activates this selector. The list is never empty in
    /// a validated config.
    pub fn first_parent(&self) -> &str {
        self.parent_selectors.first().map(String::as_str).unwrap_or("")
    }

    /// True when the selector names itself among its parents. Self-referential
    /// Link selectors implement pagination: their discovered links feed the
    /// seed list instead of producing a field. The whole parent list is
    /// scanned here, unlike activation which only consults the first entry.
    pub fn is_self_referential(&self) -> bool {
        self.parent_selectors.iter().any(|p| p == &self.id)
    }
}

/// Selector rule types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorType {
    #[serde(rename = "SelectorText")]
    Text,
    #[serde(rename = "SelectorLink")]
    Link,
    #[serde(rename = "SelectorImage")]
    Image,
    #[serde(rename = "SelectorElementAttribute")]
    ElementAttribute,
    #[serde(rename = "SelectorElement")]
    Element,
    #[serde(rename = "SelectorTable")]
    Table,
}

/// A declarative scrape definition: seed URL patterns plus selector tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteMap {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Ordered seed URL patterns. Range suffixes (`[1-10]`) are expanded
    /// lazily by the URL expander. During a run the live seed list is held
    /// behind a mutex in the scrape scope; this field is the initial value.
    #[serde(rename = "startUrl")]
    pub start_urls: Vec<String>,

    pub selectors: Vec<Selector>,
}

impl SiteMap {
    /// Returns the selectors activated under the given parent id, in
    /// declaration order. A dangling parent id simply yields nothing.
    pub fn children_of<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Selector> {
        self.selectors
            .iter()
            .filter(move |s| s.first_parent() == parent)
    }

    /// True when no selector names the given id as its activating parent.
    /// Leaf Link selectors yield their raw link list; non-leaf Link selectors
    /// trigger a recursive scrape over their descendants.
    pub fn is_leaf(&self, id: &str) -> bool {
        self.children_of(id).next().is_none()
    }
}
