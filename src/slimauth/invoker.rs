//! A blocking client that signs requests before sending them.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::response::ApiResponse;
use crate::slimapi::SlimApiInvoker;

use super::sign::append_sign;

/// Calls one SlimAuth-protected operation at a fixed URL, signing each
/// request with the system clock.
pub struct SlimAuthInvoker<TParam, TData> {
    inner: SlimApiInvoker<TParam, TData>,
}

/// Connection parameters for a [`SlimAuthInvoker`].
#[derive(Debug, Clone, Default)]
pub struct SlimAuthInvokerOptions {
    /// The target URL.
    pub uri: String,
    /// The caller's access key.
    pub key: String,
    /// The HMAC secret paired with the key.
    pub secret: String,
    /// The `Authorization` scheme; empty means the default.
    pub auth_scheme: String,
}

impl<TParam, TData> SlimAuthInvoker<TParam, TData>
where
    TParam: Serialize,
    TData: DeserializeOwned,
{
    #[must_use]
    pub fn new(options: SlimAuthInvokerOptions) -> Self {
        let SlimAuthInvokerOptions {
            uri,
            key,
            secret,
            auth_scheme,
        } = options;

        let inner = SlimApiInvoker::new(uri).with_request_setup(move |mut request| {
            let timestamp = chrono::Utc::now().timestamp();
            append_sign(&mut request, &key, &secret, &auth_scheme, timestamp)?;
            Ok(request)
        });

        SlimAuthInvoker { inner }
    }

    /// Execute the call and return the raw envelope.
    pub fn call_raw(&self, params: &TParam) -> anyhow::Result<ApiResponse<TData>> {
        self.inner.call_raw(params)
    }

    /// Execute the call; a nonzero envelope code maps to
    /// [`crate::error::ApiError::Biz`].
    pub fn call(&self, params: &TParam) -> anyhow::Result<TData> {
        self.inner.call(params)
    }
}
