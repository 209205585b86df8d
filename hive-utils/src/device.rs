//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use async_trait::async_trait;
use derive_new::new;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug_span, trace};

/// Opaque request/response interface to the dataplane.
///
/// Implementations own the transport and wire format. A call resolves once,
/// with either a reply or a structured failure.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    async fn call(
        &self,
        request: DeviceRequest,
    ) -> Result<DeviceReply, DeviceError>;
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct DeviceRequest {
    // Name of the device API message (e.g. "create_loopback").
    pub message: String,
    pub args: Value,
}

#[derive(Clone, Debug, Eq, PartialEq, new)]
#[derive(Deserialize, Serialize)]
pub struct DeviceReply {
    // Negative values indicate failure.
    pub retval: i32,
    pub data: Value,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeviceError {
    pub kind: DeviceErrorKind,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviceErrorKind {
    // The device executed the request and rejected it.
    Call(i32),
    // The request never reached the device, or the reply was lost.
    Transport,
    // No reply within the configured timeout.
    Timeout,
}

// ===== impl DeviceReply =====

impl DeviceReply {
    pub fn ok(data: Value) -> DeviceReply {
        DeviceReply { retval: 0, data }
    }
}

// ===== impl DeviceError =====

impl DeviceError {
    pub fn call(retval: i32, message: impl Into<String>) -> DeviceError {
        DeviceError {
            kind: DeviceErrorKind::Call(retval),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> DeviceError {
        DeviceError {
            kind: DeviceErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> DeviceError {
        DeviceError {
            kind: DeviceErrorKind::Timeout,
            message: message.into(),
        }
    }

    // Device-side return code, if the device produced one.
    pub fn code(&self) -> Option<i32> {
        match self.kind {
            DeviceErrorKind::Call(retval) => Some(retval),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DeviceErrorKind::Call(retval) => {
                write!(f, "device call failed (retval {retval}): {}", self.message)
            }
            DeviceErrorKind::Transport => {
                write!(f, "device transport failure: {}", self.message)
            }
            DeviceErrorKind::Timeout => {
                write!(f, "device call timed out: {}", self.message)
            }
        }
    }
}

impl std::error::Error for DeviceError {}

// ===== global functions =====

// Sends a request to the device and waits for its reply.
//
// The reply is awaited exactly once, bounded by `timeout`. Replies carrying a
// negative return value are converted into errors.
pub async fn invoke(
    device: &dyn DeviceApi,
    request: DeviceRequest,
    timeout: Duration,
) -> Result<DeviceReply, DeviceError> {
    let message = request.message.clone();
    debug_span!("device", %message).in_scope(|| {
        trace!(args = %request.args, "sending request");
    });

    let reply = tokio::time::timeout(timeout, device.call(request))
        .await
        .map_err(|_| {
            DeviceError::timeout(format!("{message} after {timeout:?}"))
        })??;
    if reply.retval < 0 {
        return Err(DeviceError::call(reply.retval, message));
    }

    Ok(reply)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Fixed(i32);

    struct Stalled;

    #[async_trait]
    impl DeviceApi for Fixed {
        async fn call(
            &self,
            _request: DeviceRequest,
        ) -> Result<DeviceReply, DeviceError> {
            Ok(DeviceReply::new(self.0, json!({})))
        }
    }

    #[async_trait]
    impl DeviceApi for Stalled {
        async fn call(
            &self,
            _request: DeviceRequest,
        ) -> Result<DeviceReply, DeviceError> {
            std::future::pending().await
        }
    }

    fn request() -> DeviceRequest {
        DeviceRequest::new("show_version".to_owned(), json!({}))
    }

    #[tokio::test]
    async fn invoke_success() {
        let reply = invoke(&Fixed(0), request(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.retval, 0);
    }

    #[tokio::test]
    async fn invoke_negative_retval() {
        let error = invoke(&Fixed(-2), request(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(error.code(), Some(-2));
    }

    #[tokio::test(start_paused = true)]
    async fn invoke_timeout() {
        let error = invoke(&Stalled, request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(error.kind, DeviceErrorKind::Timeout);
    }
}
