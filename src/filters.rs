//! Template filters registered with tera

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use minify_html::{minify, Cfg};
use std::collections::HashMap;
use tera::{Tera, Value};

use crate::config::BuildConfig;
use crate::content::parse_date_string;

/// Tags that organise pages rather than describe them
const STRUCTURAL_TAGS: [&str; 4] = ["all", "nav", "post", "posts"];

/// Register every filter on a tera instance
pub fn register(tera: &mut Tera, config: &BuildConfig) {
    let prefix = config.path_prefix.clone();
    tera.register_filter(
        "url",
        move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
            let path = tera::try_get_value!("url", "value", String, value);
            Ok(Value::String(url_for(&prefix, &path)))
        },
    );

    let prefix = config.path_prefix.clone();
    let base = config.site.url.clone();
    tera.register_filter(
        "absolute_url",
        move |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
            let path = tera::try_get_value!("absolute_url", "value", String, value);
            Ok(Value::String(absolute_url(&base, &prefix, &path)))
        },
    );

    tera.register_filter("cssmin", cssmin_filter);
    tera.register_filter("readable_date", readable_date_filter);
    tera.register_filter("html_date", html_date_filter);
    tera.register_filter("head", head_filter);
    tera.register_filter("filter_tag_list", filter_tag_list_filter);
    tera.register_filter("slugify", slugify_filter);
}

/// Minify a CSS stylesheet.
///
/// The input is returned unchanged if the minifier produces nothing usable.
pub fn minify_css(css: &str) -> String {
    let cfg = Cfg {
        minify_css: true,
        ..Cfg::default()
    };
    let wrapped = format!("<style>{}</style>", css);
    let minified = minify(wrapped.as_bytes(), &cfg);
    String::from_utf8(minified)
        .ok()
        .and_then(|html| {
            html.strip_prefix("<style>")
                .and_then(|s| s.strip_suffix("</style>"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| css.to_string())
}

/// Prefix an absolute path with the deployment path prefix
pub fn url_for(prefix: &str, path: &str) -> String {
    let external = path.contains("://") || path.starts_with("//") || path.starts_with("mailto:");
    if external || !path.starts_with('/') || prefix == "/" {
        return path.to_string();
    }
    format!("{}{}", prefix.trim_end_matches('/'), path)
}

/// Full URL including the site origin
pub fn absolute_url(base: &str, prefix: &str, path: &str) -> String {
    let url = url_for(prefix, path);
    if url.contains("://") || !url.starts_with('/') {
        return url;
    }
    format!("{}{}", base.trim_end_matches('/'), url)
}

fn date_arg(name: &str, value: &Value) -> tera::Result<DateTime<Local>> {
    match value {
        Value::String(s) => parse_date_string(s)
            .ok_or_else(|| tera::Error::msg(format!("Filter `{}`: cannot parse date `{}`", name, s))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.with_timezone(&Local))
            .ok_or_else(|| tera::Error::msg(format!("Filter `{}`: invalid timestamp {}", name, n))),
        _ => Err(tera::Error::msg(format!(
            "Filter `{}` expects a date string or timestamp",
            name
        ))),
    }
}

/// Tera filter: minify CSS
fn cssmin_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let css = tera::try_get_value!("cssmin", "value", String, value);
    Ok(Value::String(minify_css(&css)))
}

/// Tera filter: human readable date, e.g. `05 Mar 2024`
fn readable_date_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let date = date_arg("readable_date", value)?;
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("readable_date", "format", String, val),
        None => "%d %b %Y".to_string(),
    };
    let items: Vec<Item> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(tera::Error::msg(format!(
            "Filter `readable_date`: invalid date format `{}`",
            format
        )));
    }
    Ok(Value::String(date.format_with_items(items.into_iter()).to_string()))
}

/// Tera filter: `YYYY-MM-DD` for `<time datetime>` attributes
fn html_date_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let date = date_arg("html_date", value)?;
    Ok(Value::String(date.format("%Y-%m-%d").to_string()))
}

/// Tera filter: first `n` items of an array, or the last `-n`
fn head_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let items = tera::try_get_value!("head", "value", Vec<Value>, value);
    let n = match args.get("n") {
        Some(val) => tera::try_get_value!("head", "n", i64, val),
        None => return Err(tera::Error::msg("Filter `head` requires an `n` argument")),
    };
    let len = items.len();
    let taken: Vec<Value> = if n < 0 {
        let count = (n.unsigned_abs() as usize).min(len);
        items.into_iter().skip(len - count).collect()
    } else {
        items.into_iter().take(n as usize).collect()
    };
    Ok(Value::Array(taken))
}

/// Tera filter: drop structural tags from a tag list
fn filter_tag_list_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let tags = tera::try_get_value!("filter_tag_list", "value", Vec<String>, value);
    Ok(Value::Array(
        tags.into_iter()
            .filter(|t| !STRUCTURAL_TAGS.contains(&t.as_str()))
            .map(Value::String)
            .collect(),
    ))
}

/// Tera filter: URL slug
fn slugify_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("slugify", "value", String, value);
    Ok(Value::String(slug::slugify(s)))
}
