//! The dispatch pipeline: stage interfaces and their orchestration.
//!
//! An [`ApiHandler`] is a fixed sequence of pluggable stages executed once
//! per request:
//!
//! 1. resolve the client host;
//! 2. resolve the operation name and request format, look up the operation,
//!    decode arguments, invoke (recovery boundary A);
//! 3. build the response envelope, serialize the wire body (recovery
//!    boundary B — on failure the payload is cleared and the segment runs
//!    once more, keeping the error visible);
//! 4. hand the finished body back to the transport;
//! 5. emit one structured log record.
//!
//! Expected failures travel through [`ApiState::error`]; the two boundaries
//! only exist to fold genuinely unexpected panics into the same error shape
//! so a broken operation still answers with a well-formed envelope.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::ApiError;
use crate::registry::ApiMethodRegister;
use crate::response::ApiResponse;
use crate::state::{ApiState, HttpRequest, HttpResponseParts};

/// Resolves the operation name (and protocol specifics such as the request
/// format) from the inbound request. Runs first; setting `state.error`
/// skips lookup, decoding and invocation.
pub trait ApiNameResolver: Send + Sync {
    fn fill_method(&self, state: &mut ApiState);
}

/// Resolves the client host into `state.user_host`.
pub trait ApiUserHostResolver: Send + Sync {
    fn fill_user_host(&self, state: &mut ApiState);
}

/// Builds the operation's argument from the request and stores the prepared
/// invocation on the state. A conversion failure goes to `state.error`.
pub trait ApiDecoder: Send + Sync {
    fn decode(&self, state: &mut ApiState);
}

/// Runs the prepared invocation, filling `state.data` / `state.error`.
pub trait ApiMethodCaller: Send + Sync {
    fn call(&self, state: &mut ApiState);
}

/// Maps `(data, error)` onto the abstract response envelope.
pub trait ApiResponseBuilder: Send + Sync {
    fn build_response(&self, state: &mut ApiState);
}

/// Serializes the envelope into the wire body and content type.
pub trait ApiResponseWriter: Send + Sync {
    fn write_response(&self, state: &mut ApiState);
}

/// Emits the request's one log record from the accumulated buffer.
pub trait ApiLogger: Send + Sync {
    fn log(&self, state: &mut ApiState);
}

/// The standard caller: runs the prepared invocation left by the decoder.
pub struct BasicApiMethodCaller;

impl ApiMethodCaller for BasicApiMethodCaller {
    fn call(&self, state: &mut ApiState) {
        let Some(prepared) = state.prepared.take() else {
            std::panic::panic_any(ApiError::internal("no prepared invocation on the state"));
        };
        match prepared(state) {
            Ok(data) => state.data = data,
            Err(e) => state.error = Some(e),
        }
    }
}

/// The standard response builder.
///
/// No error yields `{0, "", data}`. A business error passes its own code
/// and message through; a bad request becomes `{400, "bad request"}`; any
/// other error becomes `{500, "internal error"}` so internals never leak.
pub struct BasicApiResponseBuilder;

impl ApiResponseBuilder for BasicApiResponseBuilder {
    fn build_response(&self, state: &mut ApiState) {
        let data = state.data.clone().unwrap_or(serde_json::Value::Null);

        let response = match &state.error {
            None => ApiResponse::success(data),
            Some(ApiError::Biz { code, message, .. }) => ApiResponse {
                code: *code,
                message: message.clone(),
                data,
            },
            Some(ApiError::BadRequest { .. }) => ApiResponse::bad_request(),
            Some(_) => ApiResponse::internal_error(),
        };
        state.response = Some(response);
    }
}

/// The assembled pipeline. Built via [`ApiHandlerBuilder`], which refuses
/// to produce a handler with any stage missing.
pub struct ApiHandler {
    name: String,
    registry: Box<dyn ApiMethodRegister>,
    name_resolver: Box<dyn ApiNameResolver>,
    user_host_resolver: Box<dyn ApiUserHostResolver>,
    decoder: Box<dyn ApiDecoder>,
    method_caller: Box<dyn ApiMethodCaller>,
    response_builder: Box<dyn ApiResponseBuilder>,
    response_writer: Box<dyn ApiResponseWriter>,
    logger: Box<dyn ApiLogger>,
}

impl ApiHandler {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ApiHandlerBuilder {
        ApiHandlerBuilder {
            name: name.into(),
            registry: None,
            name_resolver: None,
            user_host_resolver: None,
            decoder: None,
            method_caller: None,
            response_builder: None,
            response_writer: None,
            logger: None,
        }
    }

    /// The handler's identifier, used in log records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The registry operations are registered into.
    #[must_use]
    pub fn registry(&self) -> &dyn ApiMethodRegister {
        self.registry.as_ref()
    }

    /// Process one request through the full pipeline.
    ///
    /// Always produces a response; unexpected failures inside the pipeline
    /// are folded into the envelope. Only a repeated failure while writing
    /// the recovery response propagates as a panic, for the transport layer
    /// to turn into a dropped or 500 connection.
    pub fn handle(&self, request: HttpRequest) -> HttpResponseParts {
        let mut state = ApiState::new(request);

        self.user_host_resolver.fill_user_host(&mut state);

        // Boundary A: resolve → look up → decode → invoke.
        self.handle_request(&mut state);

        // Boundary B: build envelope → serialize body. If this fails the
        // result payload may be the culprit (e.g. unserializable); drop it
        // and run the segment once more with the error kept for visibility.
        if !self.handle_response(&mut state) {
            state.data = None;
            self.response_builder.build_response(&mut state);
            self.response_writer.write_response(&mut state);
        }

        let parts = HttpResponseParts {
            status: 200,
            content_type: if state.response_content_type.is_empty() {
                crate::CONTENT_TYPE_JSON.to_string()
            } else {
                state.response_content_type.clone()
            },
            body: state.response_body.take().unwrap_or_default(),
        };

        self.logger.log(&mut state);

        parts
    }

    fn handle_request(&self, state: &mut ApiState) {
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.name_resolver.fill_method(state);
            if state.error.is_some() {
                return;
            }

            match self.registry.get_method(&state.name) {
                Some(method) => state.method = Some(method),
                None => {
                    state.error = Some(ApiError::bad_request_caused(
                        simple_error("method not found"),
                        "bad request",
                    ));
                    return;
                }
            }

            self.decoder.decode(state);
            if state.error.is_none() {
                self.method_caller.call(state);
            }
        }));

        if let Err(payload) = result {
            state.error = Some(ApiError::from_panic(&state.name, payload));
        }
    }

    fn handle_response(&self, state: &mut ApiState) -> bool {
        let result = catch_unwind(AssertUnwindSafe(|| {
            self.response_builder.build_response(state);
            self.response_writer.write_response(state);
        }));

        match result {
            Ok(()) => true,
            Err(payload) => {
                state.error = Some(ApiError::from_panic(&state.name, payload));
                false
            }
        }
    }
}

fn simple_error(message: &str) -> Box<dyn std::error::Error + Send + Sync> {
    message.to_string().into()
}

/// Explicit dependency injection for [`ApiHandler`]: every stage must be
/// supplied; `build` panics on a missing one since an incomplete pipeline
/// is a configuration error.
pub struct ApiHandlerBuilder {
    name: String,
    registry: Option<Box<dyn ApiMethodRegister>>,
    name_resolver: Option<Box<dyn ApiNameResolver>>,
    user_host_resolver: Option<Box<dyn ApiUserHostResolver>>,
    decoder: Option<Box<dyn ApiDecoder>>,
    method_caller: Option<Box<dyn ApiMethodCaller>>,
    response_builder: Option<Box<dyn ApiResponseBuilder>>,
    response_writer: Option<Box<dyn ApiResponseWriter>>,
    logger: Option<Box<dyn ApiLogger>>,
}

impl ApiHandlerBuilder {
    #[must_use]
    pub fn registry(mut self, v: impl ApiMethodRegister + 'static) -> Self {
        self.registry = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn name_resolver(mut self, v: impl ApiNameResolver + 'static) -> Self {
        self.name_resolver = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn user_host_resolver(mut self, v: impl ApiUserHostResolver + 'static) -> Self {
        self.user_host_resolver = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn decoder(mut self, v: impl ApiDecoder + 'static) -> Self {
        self.decoder = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn method_caller(mut self, v: impl ApiMethodCaller + 'static) -> Self {
        self.method_caller = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn response_builder(mut self, v: impl ApiResponseBuilder + 'static) -> Self {
        self.response_builder = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn response_writer(mut self, v: impl ApiResponseWriter + 'static) -> Self {
        self.response_writer = Some(Box::new(v));
        self
    }

    #[must_use]
    pub fn logger(mut self, v: impl ApiLogger + 'static) -> Self {
        self.logger = Some(Box::new(v));
        self
    }

    /// Assemble the handler.
    ///
    /// # Panics
    ///
    /// Panics when any stage is missing.
    #[must_use]
    pub fn build(self) -> ApiHandler {
        fn require<T>(v: Option<T>, stage: &str) -> T {
            match v {
                Some(v) => v,
                None => panic!("ApiHandler is missing the {stage} stage"),
            }
        }

        ApiHandler {
            name: self.name,
            registry: require(self.registry, "registry"),
            name_resolver: require(self.name_resolver, "name resolver"),
            user_host_resolver: require(self.user_host_resolver, "user host resolver"),
            decoder: require(self.decoder, "decoder"),
            method_caller: require(self.method_caller, "method caller"),
            response_builder: require(self.response_builder, "response builder"),
            response_writer: require(self.response_writer, "response writer"),
            logger: require(self.logger, "logger"),
        }
    }
}
