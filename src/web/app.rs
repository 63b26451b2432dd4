//! Request routing for the query form.
//!
//! Query failures are turned into an error block (or a JSON error) here and never
//! propagate further, so a bad query cannot take the server down.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::http::{Method, Request, Response, StatusCode};
use super::page::{Page, PageContent, DEFAULT_QUERY};
use crate::query::QueryRunner;

/// Shared state behind every request.
#[derive(Clone)]
pub struct App {
    runner: Arc<QueryRunner>,
    title: Arc<str>,
}

#[derive(Debug, Deserialize)]
struct ApiQuery {
    query: String,
}

impl App {
    /// Creates the app around a query runner.
    pub fn new(runner: Arc<QueryRunner>, title: impl Into<String>) -> Self {
        Self {
            runner,
            title: title.into().into(),
        }
    }

    /// Returns the runner serving this app.
    pub fn runner(&self) -> &Arc<QueryRunner> {
        &self.runner
    }

    /// Routes a request to its handler.
    pub async fn handle(&self, request: Request) -> Response {
        match (request.method(), request.path()) {
            (Method::Get, "/") => self.index(&request).await,
            (Method::Head, "/") => self.index(&request).await.without_body(),
            (Method::Post, "/query") => self.submit_form(&request).await,
            (Method::Post, "/api/query") => self.submit_json(&request).await,
            (Method::Post, "/cache/clear") => {
                self.runner.clear_cache().await;
                Response::redirect("/")
            }
            (_, "/" | "/query" | "/api/query" | "/cache/clear") => {
                Response::text(StatusCode::MethodNotAllowed, "Method Not Allowed")
            }
            _ => Response::text(StatusCode::NotFound, "Not Found"),
        }
    }

    /// `GET /` shows the form; `GET /?query=...` also runs the query.
    async fn index(&self, request: &Request) -> Response {
        match request.query_param("query") {
            Some(sql) => self.run_and_render(&sql).await,
            None => Response::html(StatusCode::Ok, self.page(DEFAULT_QUERY, PageContent::Empty)),
        }
    }

    /// `POST /query` with a url-encoded `query` field.
    async fn submit_form(&self, request: &Request) -> Response {
        match request.form_field("query") {
            Some(sql) => self.run_and_render(&sql).await,
            None => Response::html(
                StatusCode::BadRequest,
                self.page("", PageContent::Error("missing form field 'query'")),
            ),
        }
    }

    async fn run_and_render(&self, sql: &str) -> Response {
        info!("Running query from form ({} bytes)", sql.len());
        match self.runner.run(sql).await {
            Ok(outcome) => {
                Response::html(StatusCode::Ok, self.page(sql, PageContent::Table(&outcome)))
            }
            Err(e) => {
                let page = self.page(sql, PageContent::Error(e.message()));
                Response::html(StatusCode::Ok, page)
            }
        }
    }

    /// `POST /api/query` with a JSON body `{"query": "..."}`.
    async fn submit_json(&self, request: &Request) -> Response {
        let body: ApiQuery = match serde_json::from_slice(request.body()) {
            Ok(body) => body,
            Err(e) => {
                return Response::json(
                    StatusCode::BadRequest,
                    &json!({ "error": format!("invalid request body: {e}") }),
                )
            }
        };

        match self.runner.run(&body.query).await {
            Ok(outcome) => {
                let result = &outcome.result;
                Response::json(
                    StatusCode::Ok,
                    &json!({
                        "columns": result.column_names(),
                        "rows": result.rows,
                        "row_count": result.row_count,
                        "execution_time_ms": result.execution_time.as_millis() as u64,
                        "cached": outcome.from_cache,
                    }),
                )
            }
            Err(e) => {
                warn!("API query failed: {e}");
                Response::json(StatusCode::BadRequest, &json!({ "error": e.message() }))
            }
        }
    }

    fn page(&self, query: &str, content: PageContent<'_>) -> String {
        Page {
            title: &self.title,
            target: &self.runner.target(),
            query,
            caching: self.runner.caching_enabled(),
            content,
        }
        .render()
    }
}
