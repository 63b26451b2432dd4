//! Web form for running queries.
//!
//! A minimal HTTP/1.1 server: one page with a SQL textarea, a result page, and a
//! small JSON endpoint for scripted use.

mod app;
pub mod http;
mod page;
mod server;

pub use app::App;
pub use http::{Method, Request, Response, StatusCode};
pub use page::{escape_html, DEFAULT_QUERY};
pub use server::{Server, MAX_REQUEST_SIZE};

use std::future::Future;

use crate::error::Result;

/// Serves `app` on an already bound server until `shutdown` resolves.
pub async fn serve(server: Server, app: App, shutdown: impl Future<Output = ()>) -> Result<()> {
    server
        .run(
            move |request| {
                let app = app.clone();
                async move { app.handle(request).await }
            },
            shutdown,
        )
        .await
}
