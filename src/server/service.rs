//! The `may_minihttp` service binding a mount route to a dispatch pipeline.

use std::io;
use std::sync::Arc;

use may_minihttp::{HttpService, Request, Response};
use tracing::debug;

use crate::handler::ApiHandler;
use crate::runtime_config::RuntimeConfig;

use super::request::parse_request;
use super::response::{write_plain_error, write_response};
use super::route::RoutePattern;

/// Serves one [`ApiHandler`] under a route pattern.
///
/// Only `GET` and `POST` reach the pipeline; other methods answer 405 and
/// unmatched paths answer 404, both outside the protocol envelope.
pub struct SlimApiService {
    handler: Arc<ApiHandler>,
    route: RoutePattern,
    max_body_size: usize,
}

impl Clone for SlimApiService {
    fn clone(&self) -> Self {
        SlimApiService {
            handler: Arc::clone(&self.handler),
            route: self.route.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

impl SlimApiService {
    #[must_use]
    pub fn new(route: &str, handler: Arc<ApiHandler>) -> Self {
        SlimApiService {
            handler,
            route: RoutePattern::new(route),
            max_body_size: RuntimeConfig::from_env().max_body_size,
        }
    }

    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }
}

impl HttpService for SlimApiService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        // may_minihttp does not expose the peer address; host resolution
        // relies on the forwarded-address header.
        let mut request = parse_request(req, String::new(), self.max_body_size);

        if request.method != http::Method::GET && request.method != http::Method::POST {
            write_plain_error(res, 405, "method not allowed");
            return Ok(());
        }

        let Some(route_params) = self.route.matches(&request.path) else {
            debug!(path = %request.path, "no route matched");
            write_plain_error(res, 404, "not found");
            return Ok(());
        };
        request.route_params = route_params;

        let parts = self.handler.handle(request);
        write_response(res, parts);
        Ok(())
    }
}
