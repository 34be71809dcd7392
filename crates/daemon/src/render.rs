//! HTML rendering: Markdown conversion, `{{ name }}` substitution and page assembly

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use common::fragments::Fragment;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap()
});

/// Used when the blog has no `topmatter` fragment
pub const DEFAULT_TOPMATTER: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title }}</title>
</head>
<body>
"#;

/// Used when the blog has no `bottommatter` fragment
pub const DEFAULT_BOTTOMMATTER: &str = "\n</body>\n</html>\n";

/// Converts markdown content to an HTML fragment
pub fn markdown_to_html(markdown: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Replace `{{ name }}` placeholders with values from `vars`.
///
/// Placeholders naming an unknown variable are left as they are. Values are
/// inserted verbatim.
pub fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &regex::Captures| match vars.get(&caps["name"]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Escape `text` for use in HTML text or attribute values
pub fn escape_html(text: &str) -> String {
    askama::MarkupDisplay::new_unsafe(text, askama::Html).to_string()
}

/// Wrap `content` in the page fragments.
///
/// Topmatter and header go before the content, footer and bottommatter
/// after. Each fragment is rendered against `vars`; the content is not.
pub fn assemble_page(
    fragments: &HashMap<Fragment, Option<Arc<str>>>,
    content: &str,
    vars: &HashMap<&str, String>,
) -> String {
    let text = |fragment: Fragment| fragment_text(fragments, fragment);

    let mut page = String::new();
    page.push_str(&render_template(
        text(Fragment::Topmatter).unwrap_or(DEFAULT_TOPMATTER),
        vars,
    ));
    if let Some(header) = text(Fragment::Header) {
        page.push_str(&render_template(header, vars));
    }
    page.push_str(content);
    if let Some(footer) = text(Fragment::Footer) {
        page.push_str(&render_template(footer, vars));
    }
    page.push_str(&render_template(
        text(Fragment::Bottommatter).unwrap_or(DEFAULT_BOTTOMMATTER),
        vars,
    ));
    page
}

fn fragment_text(
    fragments: &HashMap<Fragment, Option<Arc<str>>>,
    fragment: Fragment,
) -> Option<&str> {
    fragments.get(&fragment).and_then(|text| text.as_deref())
}
