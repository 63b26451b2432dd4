//! HTML rendering for the query form.
//!
//! Renders the form, result tables with column headers and marked NULL values,
//! and error blocks. All user-supplied text passes through [`escape_html`].

use std::fmt::Write;

use crate::db::{QueryResult, Value};
use crate::query::QueryOutcome;

/// Query shown in the form before the user types anything.
pub const DEFAULT_QUERY: &str = "SELECT * FROM users";

/// What to show below the form.
#[derive(Debug, Clone, Copy)]
pub enum PageContent<'a> {
    /// Nothing has been run yet.
    Empty,
    /// A query succeeded.
    Table(&'a QueryOutcome),
    /// A query failed; the message is shown verbatim.
    Error(&'a str),
}

/// Everything the page needs to render.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub title: &'a str,
    pub target: &'a str,
    pub query: &'a str,
    pub caching: bool,
    pub content: PageContent<'a>,
}

impl Page<'_> {
    /// Renders the full HTML document.
    pub fn render(&self) -> String {
        let mut html = String::with_capacity(4096);
        let title = escape_html(self.title);

        let _ = writeln!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <h1>{title}</h1>\n<p class=\"target\">Database: {}</p>",
            escape_html(self.target)
        );

        let _ = writeln!(
            html,
            "<form method=\"post\" action=\"/query\">\n\
             <label for=\"query\">Enter SQL query</label>\n\
             <textarea id=\"query\" name=\"query\" rows=\"6\">{}</textarea>\n\
             <button type=\"submit\">Run Query</button>\n</form>",
            escape_html(self.query)
        );

        if self.caching {
            html.push_str(
                "<form method=\"post\" action=\"/cache/clear\" class=\"cache\">\n\
                 <button type=\"submit\">Clear cache</button>\n</form>\n",
            );
        }

        match self.content {
            PageContent::Empty => {}
            PageContent::Table(outcome) => render_outcome(&mut html, outcome),
            PageContent::Error(message) => {
                let _ = writeln!(
                    html,
                    "<div class=\"error\">Error: {}</div>",
                    escape_html(message)
                );
            }
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}

fn render_outcome(html: &mut String, outcome: &QueryOutcome) {
    let result = &outcome.result;
    let rows = if result.row_count == 1 { "row" } else { "rows" };
    let _ = write!(
        html,
        "<p class=\"summary\">{} {rows} in {} ms",
        result.row_count,
        result.execution_time.as_millis()
    );
    if outcome.from_cache {
        html.push_str(" <span class=\"cached\">(cached)</span>");
    }
    html.push_str("</p>\n");

    render_table(html, result);
}

/// Renders a result table as an HTML `<table>`.
pub fn render_table(html: &mut String, result: &QueryResult) {
    if result.columns.is_empty() {
        html.push_str("<p class=\"empty\">(statement returned no columns)</p>\n");
        return;
    }

    html.push_str("<table>\n<thead><tr>");
    for column in &result.columns {
        let _ = write!(
            html,
            "<th title=\"{}\">{}</th>",
            escape_html(&column.data_type),
            escape_html(&column.name)
        );
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &result.rows {
        html.push_str("<tr>");
        for value in row {
            match value {
                Value::Null => html.push_str("<td class=\"null\">NULL</td>"),
                Value::Int(_) | Value::Float(_) => {
                    let _ = write!(html, "<td class=\"num\">{value}</td>");
                }
                other => {
                    let _ = write!(html, "<td>{}</td>", escape_html(&other.to_display_string()));
                }
            }
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
}

/// Escapes text for use in HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = "body{font-family:sans-serif;margin:2rem;max-width:60rem}\
textarea{width:100%;font-family:monospace}\
label{display:block;margin-bottom:.25rem}\
.target{color:#666}\
.cache{margin-top:.5rem}\
.error{color:#a00;background:#fee;padding:.75rem;white-space:pre-wrap;margin-top:1rem}\
table{border-collapse:collapse;margin-top:1rem}\
th,td{border:1px solid #ccc;padding:.25rem .5rem;text-align:left}\
td.num{text-align:right}\
td.null{color:#999;font-style:italic}\
.cached{color:#080}";
