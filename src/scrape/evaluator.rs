//! Selector evaluation
//!
//! Given a fetched page body and the selectors activated under one parent id,
//! [`evaluate_page`] produces the extraction record for that page plus the
//! follow-up work that must happen after the parsed document is dropped:
//! pagination links to append to the seed list and nested Link scrapes to run
//! recursively. The split exists because `scraper::Html` is not `Send`, so
//! the whole pass is synchronous and nothing borrowed from the document may
//! cross an await point.
//!
//! Per-selector failures never abort a page: a selector expression or regex
//! that does not compile logs a warning and matches nothing, and a missing
//! attribute logs a warning and reads as empty.

use crate::sitemap::{Selector, SelectorType, SiteMap};
use crate::url::resolve_href;
use regex::Regex;
use scraper::{ElementRef, Html, Selector as CssSelector};
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

static TR: LazyLock<CssSelector> =
    LazyLock::new(|| CssSelector::parse("tr").expect("static selector"));
static TH: LazyLock<CssSelector> =
    LazyLock::new(|| CssSelector::parse("th").expect("static selector"));
static TD: LazyLock<CssSelector> =
    LazyLock::new(|| CssSelector::parse("td").expect("static selector"));

/// One page's extraction record plus deferred work.
#[derive(Debug, Default)]
pub struct PageEvaluation {
    /// Selector id to extracted value; empty records are never exported.
    pub record: Map<String, Value>,

    /// Link selectors with descendants: each becomes the seed list of a
    /// recursive engine invocation whose result map is this field's value.
    pub nested: Vec<NestedLinks>,

    /// Links discovered by self-referential (pagination) selectors. The
    /// worker appends unseen entries to the scope's shared seed list.
    pub pagination: Vec<String>,
}

/// Deferred recursive scrape for one nested Link selector.
#[derive(Debug)]
pub struct NestedLinks {
    pub selector_id: String,
    pub links: Vec<String>,
}

/// Evaluates every selector activated under `parent` against one page.
pub fn evaluate_page(
    body: &str,
    page_url: &str,
    sitemap: &SiteMap,
    parent: &str,
) -> PageEvaluation {
    let document = Html::parse_document(body);
    let mut evaluation = PageEvaluation::default();

    for selector in sitemap.children_of(parent) {
        let id = selector.id.clone();
        match selector.selector_type {
            SelectorType::Text => {
                if let Some(value) = evaluate_text(&document, selector) {
                    evaluation.record.insert(id, value);
                }
            }
            SelectorType::Link => {
                let links: Vec<String> = attribute_values(&document, selector, "href")
                    .into_iter()
                    .map(|href| resolve_href(&href, page_url))
                    .collect();
                if selector.is_self_referential() {
                    // Pagination: links feed the seed list, never a field.
                    evaluation.pagination.extend(links);
                } else if sitemap.is_leaf(&selector.id) {
                    evaluation.record.insert(id, json!(links));
                } else {
                    evaluation.nested.push(NestedLinks {
                        selector_id: id,
                        links,
                    });
                }
            }
            SelectorType::Image => {
                if let Some(value) = collapse(attribute_values(&document, selector, "src")) {
                    evaluation.record.insert(id, value);
                }
            }
            SelectorType::ElementAttribute => {
                let attribute = selector.extract_attribute.as_deref().unwrap_or("");
                evaluation
                    .record
                    .insert(id, json!(attribute_values(&document, selector, attribute)));
            }
            SelectorType::Element => {
                evaluation
                    .record
                    .insert(id, evaluate_element(&document, selector, sitemap));
            }
            SelectorType::Table => {
                evaluation
                    .record
                    .insert(id, evaluate_table(&document, selector));
            }
        }
    }

    evaluation
}

/// Parses a selector expression, logging and matching nothing on failure.
fn compile_expression(selector: &Selector) -> Option<CssSelector> {
    match CssSelector::parse(&selector.selector) {
        Ok(css) => Some(css),
        Err(e) => {
            tracing::warn!(id = %selector.id, expression = %selector.selector, %e,
                "invalid selector expression, matching nothing");
            None
        }
    }
}

/// Matched nodes in document order, truncated to the first match when
/// `multiple` is false.
fn select_nodes<'a>(document: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    let Some(css) = compile_expression(selector) else {
        return Vec::new();
    };
    let mut nodes: Vec<ElementRef<'a>> = document.select(&css).collect();
    if !selector.multiple {
        nodes.truncate(1);
    }
    nodes
}

/// Trimmed text of every descendant text node, concatenated.
fn node_text(node: ElementRef<'_>) -> String {
    node.text().collect::<String>().trim().to_string()
}

/// Zero values omit the field, one collapses to a scalar, several stay a list.
fn collapse(values: Vec<String>) -> Option<Value> {
    let mut values = values;
    match values.len() {
        0 => None,
        1 => Some(Value::String(values.remove(0))),
        _ => Some(json!(values)),
    }
}

fn evaluate_text(document: &Html, selector: &Selector) -> Option<Value> {
    let pattern = selector
        .regex
        .as_deref()
        .filter(|p| !p.is_empty())
        .and_then(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(id = %selector.id, pattern = %p, %e,
                    "invalid regex, using full text");
                None
            }
        });

    let values = select_nodes(document, selector)
        .into_iter()
        .map(|node| {
            let text = node_text(node);
            match &pattern {
                // First match of the trimmed text; the full text is the
                // fallback, never an empty string via the regex path.
                Some(re) => re
                    .find(&text)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or(text),
                None => text,
            }
        })
        .collect();

    collapse(values)
}

/// Reads one attribute from every matched node. Missing attributes warn and
/// read as empty.
fn attribute_values(document: &Html, selector: &Selector, attribute: &str) -> Vec<String> {
    select_nodes(document, selector)
        .into_iter()
        .map(|node| match node.value().attr(attribute) {
            Some(value) => value.to_string(),
            None => {
                tracing::warn!(id = %selector.id, attribute, "attribute not found");
                String::new()
            }
        })
        .collect()
}

/// Per matched container, evaluates each child selector (Text, Image or Link
/// only) against the container subtree. One nesting level: grandchildren are
/// not consulted.
fn evaluate_element(document: &Html, selector: &Selector, sitemap: &SiteMap) -> Value {
    let mut mappings: Vec<Value> = Vec::new();

    for container in select_nodes(document, selector) {
        let mut mapping = Map::new();
        for child in sitemap.children_of(&selector.id) {
            let Some(css) = compile_expression(child) else {
                continue;
            };
            match child.selector_type {
                SelectorType::Text => {
                    let text: String = container
                        .select(&css)
                        .flat_map(|node| node.text())
                        .collect();
                    mapping.insert(child.id.clone(), Value::String(text));
                }
                SelectorType::Image => {
                    mapping.insert(
                        child.id.clone(),
                        Value::String(first_attribute(container, &css, child, "src")),
                    );
                }
                SelectorType::Link => {
                    mapping.insert(
                        child.id.clone(),
                        Value::String(first_attribute(container, &css, child, "href")),
                    );
                }
                _ => {}
            }
        }
        if !mapping.is_empty() {
            mappings.push(Value::Object(mapping));
        }
    }

    json!(mappings)
}

/// First match's raw attribute within a container; empty when absent.
fn first_attribute(
    container: ElementRef<'_>,
    css: &CssSelector,
    child: &Selector,
    attribute: &str,
) -> String {
    match container
        .select(css)
        .next()
        .and_then(|node| node.value().attr(attribute))
    {
        Some(value) => value.to_string(),
        None => {
            tracing::warn!(id = %child.id, attribute, "attribute not found");
            String::new()
        }
    }
}

/// Flattens all matched tables into one header list and one row list.
///
/// Multiple distinct tables interleave without separation; that is a known
/// limitation of the format, not corrected here. The `multiple` flag is
/// ignored: every matched table contributes.
fn evaluate_table(document: &Html, selector: &Selector) -> Value {
    let Some(css) = compile_expression(selector) else {
        return json!({"header": [], "rows": []});
    };

    let mut header: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for table in document.select(&css) {
        for row in table.select(&TR) {
            for cell in row.select(&TH) {
                header.push(cell.text().collect());
            }
            let cells: Vec<String> = row.select(&TD).map(|cell| cell.text().collect()).collect();
            if !cells.is_empty() {
                rows.push(cells);
            }
        }
    }

    json!({"header": header, "rows": rows})
}
