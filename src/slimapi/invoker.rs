//! A blocking client for calling SlimAPI services.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::response::ApiResponse;

/// Calls one SlimAPI operation at a fixed URL.
///
/// `TParam` is the request parameter type; `TData` matches the envelope's
/// `Data`. Requests always go out as `Content-Type: application/json`.
pub struct SlimApiInvoker<TParam, TData> {
    /// The target URL.
    pub uri: String,
    /// When set, runs against each request before it is sent; used by the
    /// signing extension to append credentials.
    #[allow(clippy::type_complexity)]
    pub request_setup:
        Option<Box<dyn Fn(reqwest::blocking::Request) -> anyhow::Result<reqwest::blocking::Request> + Send + Sync>>,
    client: reqwest::blocking::Client,
    _marker: std::marker::PhantomData<fn(TParam) -> TData>,
}

impl<TParam, TData> SlimApiInvoker<TParam, TData>
where
    TParam: Serialize,
    TData: DeserializeOwned,
{
    /// Create an invoker for the given URL.
    ///
    /// # Panics
    ///
    /// Panics when `uri` is empty; a blank target is a configuration error.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        assert!(!uri.is_empty(), "uri must be provided");
        SlimApiInvoker {
            uri,
            request_setup: None,
            client: reqwest::blocking::Client::new(),
            _marker: std::marker::PhantomData,
        }
    }

    #[must_use]
    pub fn with_request_setup(
        mut self,
        setup: impl Fn(reqwest::blocking::Request) -> anyhow::Result<reqwest::blocking::Request>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.request_setup = Some(Box::new(setup));
        self
    }

    /// Execute the call and return the raw envelope without inspecting its
    /// code.
    pub fn call_raw(&self, params: &TParam) -> anyhow::Result<ApiResponse<TData>> {
        let wrap = |e: anyhow::Error| e.context(format!("request \"{}\"", self.uri));

        let request = self
            .client
            .post(self.uri.as_str())
            .header(reqwest::header::CONTENT_TYPE, crate::CONTENT_TYPE_JSON)
            .body(serde_json::to_vec(params).map_err(|e| wrap(e.into()))?)
            .build()
            .map_err(|e| wrap(e.into()))?;

        let request = match &self.request_setup {
            Some(setup) => setup(request).map_err(wrap)?,
            None => request,
        };

        let response = self.client.execute(request).map_err(|e| wrap(e.into()))?;
        let body = response.bytes().map_err(|e| wrap(e.into()))?;
        let envelope: ApiResponse<TData> =
            serde_json::from_slice(&body).map_err(|e| wrap(e.into()))?;
        Ok(envelope)
    }

    /// Execute the call; a nonzero envelope code maps to [`ApiError::Biz`].
    pub fn call(&self, params: &TParam) -> anyhow::Result<TData> {
        let envelope = self.call_raw(params)?;
        if envelope.code != 0 {
            return Err(ApiError::biz(envelope.code, envelope.message).into());
        }
        Ok(envelope.data)
    }
}
