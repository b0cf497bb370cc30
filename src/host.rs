//! Client host resolution.

use crate::handler::ApiUserHostResolver;
use crate::state::ApiState;

/// The standard resolver: prefer the first `X-Forwarded-For` element, fall
/// back to the transport peer address, then normalize.
///
/// Normalization: the IPv6 loopback (`::1` / `[::1]`) becomes `127.0.0.1`
/// so per-host statistics line up, the port is stripped, and any bracket
/// wrapping is removed.
pub struct BasicApiUserHostResolver;

impl ApiUserHostResolver for BasicApiUserHostResolver {
    fn fill_user_host(&self, state: &mut ApiState) {
        let forwarded = state.request.get_header("x-forwarded-for");
        let raw = forwarded.unwrap_or(&state.request.remote_addr);

        // The forwarded chain may hold several addresses; the first one is
        // the original client.
        let ip = raw.replacen("::1", "127.0.0.1", 1);
        let ip = ip.split(',').next().unwrap_or("").trim();

        // Strip ":port". The loopback was already rewritten above, so any
        // remaining colon separates the port.
        let ip = match ip.find(':') {
            Some(idx) if idx > 0 => &ip[..idx],
            _ => ip,
        };

        let ip = if ip.len() > 2 && ip.starts_with('[') && ip.ends_with(']') {
            &ip[1..ip.len() - 1]
        } else {
            ip
        };

        state.user_host = ip.to_string();
    }
}
