//! Operation descriptors and the typed signature glue.
//!
//! A WebAPI operation is a plain function. The permitted signatures form a
//! small closed set, checked when the descriptor is constructed:
//!
//! - arguments: none, one structured argument `A: DeserializeOwned`, the
//!   request state `&mut ApiState`, or both (in either order);
//! - results: a serializable value `T`, or `Result<T, ApiError>` whose error
//!   half maps onto the wire envelope.
//!
//! The decoder stage calls [`ApiMethod::bind`], which converts the decoded
//! parameter map into the declared argument and returns a [`PreparedCall`];
//! conversion failures surface as bad-request errors at decode time, before
//! the operation runs. The caller stage then runs the prepared call.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::conv;
use crate::error::ApiError;
use crate::state::ApiState;

/// A decoded invocation, ready to run against the request state.
pub type PreparedCall = Box<dyn FnOnce(&mut ApiState) -> Result<Option<Value>, ApiError> + Send>;

/// The declared result shape of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// The operation returns a value (possibly `()`).
    Value,
    /// The operation returns a value and an error.
    ValueAndError,
}

type Binder =
    Box<dyn Fn(&mut ApiState, Option<Value>) -> Result<PreparedCall, ApiError> + Send + Sync>;

/// A registered operation: name, provider label and the typed callable.
pub struct ApiMethod {
    /// The name the operation was registered under. Lookup is
    /// case-insensitive, but the original spelling is kept here.
    pub name: String,
    /// The provider label, used to group operations in logs. May be empty.
    pub provider: String,
    shape: ResultShape,
    binder: Binder,
}

/// Shared handle to a registered operation.
pub type ApiMethodRef = Arc<ApiMethod>;

impl ApiMethod {
    /// Build a descriptor from any function in the permitted signature set.
    pub fn new<M, F>(name: impl Into<String>, provider: impl Into<String>, f: F) -> Self
    where
        F: ApiMethodFn<M>,
    {
        let f = Arc::new(f);
        ApiMethod {
            name: name.into(),
            provider: provider.into(),
            shape: F::SHAPE,
            binder: Box::new(move |state, params| Arc::clone(&f).prepare(state, params)),
        }
    }

    #[must_use]
    pub fn shape(&self) -> ResultShape {
        self.shape
    }

    /// Convert the decoded parameter map into this operation's argument and
    /// return the invocation to run.
    pub fn bind(
        &self,
        state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        (self.binder)(state, params)
    }
}

impl std::fmt::Debug for ApiMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMethod")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("shape", &self.shape)
            .finish()
    }
}

fn convert_arg<A: DeserializeOwned>(params: Option<Value>) -> Result<A, ApiError> {
    let params = params.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    conv::from_value(params).map_err(|e| ApiError::bad_request_caused(e, "bad request"))
}

fn serialize_data<T: Serialize>(data: T) -> Result<Option<Value>, ApiError> {
    serde_json::to_value(data)
        .map(Some)
        .map_err(|e| ApiError::internal_caused(e, "serialize result"))
}

/// One signature out of the permitted set. `M` is an inference marker; user
/// code never names it.
pub trait ApiMethodFn<M>: Send + Sync + Sized + 'static {
    /// The declared result shape, recorded on the descriptor.
    const SHAPE: ResultShape;

    /// Convert `params` into the declared argument and produce the call.
    fn prepare(
        self: Arc<Self>,
        state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError>;
}

/// Inference markers for the signature set.
pub mod markers {
    pub struct NoArg;
    pub struct Arg<A>(std::marker::PhantomData<A>);
    pub struct State;
    pub struct ArgState<A>(std::marker::PhantomData<A>);
    pub struct StateArg<A>(std::marker::PhantomData<A>);
    pub struct Plain<T>(std::marker::PhantomData<T>);
    pub struct Fallible<T>(std::marker::PhantomData<T>);
}

use markers::*;

// fn() -> T
impl<F, T> ApiMethodFn<(NoArg, Plain<T>)> for F
where
    F: Fn() -> T + Send + Sync + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::Value;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        _params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        Ok(Box::new(move |_state| serialize_data((*self)())))
    }
}

// fn() -> Result<T, ApiError>
impl<F, T> ApiMethodFn<(NoArg, Fallible<T>)> for F
where
    F: Fn() -> Result<T, ApiError> + Send + Sync + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::ValueAndError;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        _params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        Ok(Box::new(move |_state| (*self)().and_then(serialize_data)))
    }
}

// fn(A) -> T
impl<F, A, T> ApiMethodFn<(Arg<A>, Plain<T>)> for F
where
    F: Fn(A) -> T + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::Value;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        let arg: A = convert_arg(params)?;
        Ok(Box::new(move |_state| serialize_data((*self)(arg))))
    }
}

// fn(A) -> Result<T, ApiError>
impl<F, A, T> ApiMethodFn<(Arg<A>, Fallible<T>)> for F
where
    F: Fn(A) -> Result<T, ApiError> + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::ValueAndError;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        let arg: A = convert_arg(params)?;
        Ok(Box::new(move |_state| (*self)(arg).and_then(serialize_data)))
    }
}

// fn(&mut ApiState) -> T
impl<F, T> ApiMethodFn<(State, Plain<T>)> for F
where
    F: Fn(&mut ApiState) -> T + Send + Sync + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::Value;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        _params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        Ok(Box::new(move |state| serialize_data((*self)(state))))
    }
}

// fn(&mut ApiState) -> Result<T, ApiError>
impl<F, T> ApiMethodFn<(State, Fallible<T>)> for F
where
    F: Fn(&mut ApiState) -> Result<T, ApiError> + Send + Sync + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::ValueAndError;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        _params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        Ok(Box::new(move |state| (*self)(state).and_then(serialize_data)))
    }
}

// fn(A, &mut ApiState) -> T
impl<F, A, T> ApiMethodFn<(ArgState<A>, Plain<T>)> for F
where
    F: Fn(A, &mut ApiState) -> T + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::Value;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        let arg: A = convert_arg(params)?;
        Ok(Box::new(move |state| serialize_data((*self)(arg, state))))
    }
}

// fn(A, &mut ApiState) -> Result<T, ApiError>
impl<F, A, T> ApiMethodFn<(ArgState<A>, Fallible<T>)> for F
where
    F: Fn(A, &mut ApiState) -> Result<T, ApiError> + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::ValueAndError;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        let arg: A = convert_arg(params)?;
        Ok(Box::new(move |state| {
            (*self)(arg, state).and_then(serialize_data)
        }))
    }
}

// fn(&mut ApiState, A) -> T
impl<F, A, T> ApiMethodFn<(StateArg<A>, Plain<T>)> for F
where
    F: Fn(&mut ApiState, A) -> T + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::Value;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        let arg: A = convert_arg(params)?;
        Ok(Box::new(move |state| serialize_data((*self)(state, arg))))
    }
}

// fn(&mut ApiState, A) -> Result<T, ApiError>
impl<F, A, T> ApiMethodFn<(StateArg<A>, Fallible<T>)> for F
where
    F: Fn(&mut ApiState, A) -> Result<T, ApiError> + Send + Sync + 'static,
    A: DeserializeOwned + Send + 'static,
    T: Serialize + 'static,
{
    const SHAPE: ResultShape = ResultShape::ValueAndError;

    fn prepare(
        self: Arc<Self>,
        _state: &mut ApiState,
        params: Option<Value>,
    ) -> Result<PreparedCall, ApiError> {
        let arg: A = convert_arg(params)?;
        Ok(Box::new(move |state| {
            (*self)(state, arg).and_then(serialize_data)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HttpRequest;
    use http::Method;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct PlusArgs {
        a: i32,
        b: i32,
    }

    fn state() -> ApiState {
        ApiState::new(HttpRequest::new(Method::GET, "/"))
    }

    #[test]
    fn test_arg_method_binds_and_runs() {
        let m = ApiMethod::new("Plus", "demo", |args: PlusArgs| args.a + args.b);
        assert_eq!(m.shape(), ResultShape::Value);

        let mut s = state();
        let call = m.bind(&mut s, Some(json!({"A": "1", "b": 2}))).unwrap();
        let out = call(&mut s).unwrap();
        assert_eq!(out, Some(json!(3)));
    }

    #[test]
    fn test_bind_reports_bad_request_on_conversion_failure() {
        let m = ApiMethod::new("Plus", "demo", |args: PlusArgs| args.a + args.b);
        let mut s = state();
        let err = m.bind(&mut s, Some(json!({"a": "x", "b": 2}))).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[test]
    fn test_fallible_method_surfaces_error() {
        let m = ApiMethod::new("Fail", "demo", || -> Result<i32, ApiError> {
            Err(ApiError::biz(1001, "nope"))
        });
        assert_eq!(m.shape(), ResultShape::ValueAndError);

        let mut s = state();
        let call = m.bind(&mut s, None).unwrap();
        let err = call(&mut s).unwrap_err();
        assert!(matches!(err, ApiError::Biz { code: 1001, .. }));
    }

    #[test]
    fn test_state_method_reads_request() {
        let m = ApiMethod::new("Host", "demo", |state: &mut ApiState| {
            state.user_host.clone()
        });
        let mut s = state();
        s.user_host = "10.0.0.1".to_string();
        let call = m.bind(&mut s, None).unwrap();
        assert_eq!(call(&mut s).unwrap(), Some(json!("10.0.0.1")));
    }

    #[test]
    fn test_arg_and_state_method() {
        let m = ApiMethod::new("Echo", "demo", |args: PlusArgs, state: &mut ApiState| {
            format!("{}:{}", state.name, args.a + args.b)
        });
        let mut s = state();
        s.name = "echo".to_string();
        let call = m.bind(&mut s, Some(json!({"a": 2, "b": 3}))).unwrap();
        assert_eq!(call(&mut s).unwrap(), Some(json!("echo:5")));
    }

    #[test]
    fn test_unit_result_serializes_to_null() {
        let m = ApiMethod::new("Ping", "demo", || ());
        let mut s = state();
        let call = m.bind(&mut s, None).unwrap();
        assert_eq!(call(&mut s).unwrap(), Some(Value::Null));
    }
}
