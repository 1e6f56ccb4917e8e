// SPDX-FileCopyrightText: Copyright (c) 2025-2026 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Status types and the bridge between the coordinator and the caller's
//! framework.
//!
//! Both sides share the closed taxonomy {Ok, Unknown, FailedPrecondition,
//! Aborted, InvalidArgument}. Codes outside that set are mapped to the
//! unknown code of the receiving side; the reason text is carried over.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Status code used by the coordinator, dispatch queue and transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum StatusCode {
    Ok,
    UnknownError,
    PreconditionError,
    Aborted,
    InvalidArgument,
    InProgress,
}

/// Terminal (or in-progress) status reported by the coordinator side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    code: StatusCode,
    reason: Arc<str>,
}

impl Status {
    pub fn new(code: StatusCode, reason: impl Into<Arc<str>>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::Ok, "")
    }

    pub fn unknown_error(reason: impl Into<Arc<str>>) -> Self {
        Self::new(StatusCode::UnknownError, reason)
    }

    pub fn precondition_error(reason: impl Into<Arc<str>>) -> Self {
        Self::new(StatusCode::PreconditionError, reason)
    }

    pub fn aborted(reason: impl Into<Arc<str>>) -> Self {
        Self::new(StatusCode::Aborted, reason)
    }

    pub fn invalid_argument(reason: impl Into<Arc<str>>) -> Self {
        Self::new(StatusCode::InvalidArgument, reason)
    }

    pub fn in_progress() -> Self {
        Self::new(StatusCode::InProgress, "")
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    /// `Ok(())` for an ok status, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Status> {
        if self.is_ok() { Ok(()) } else { Err(self) }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{:?}", self.code)
        } else {
            write!(f, "{:?}: {}", self.code, self.reason)
        }
    }
}

impl std::error::Error for Status {}

/// Error codes of the host framework that drives push-pull ops.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum OpCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

/// Status as seen by the host framework.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpStatus {
    code: OpCode,
    message: String,
}

impl OpStatus {
    pub fn new(code: OpCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(OpCode::Ok, "")
    }

    pub fn code(&self) -> OpCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.code == OpCode::Ok
    }
}

impl Display for OpStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl From<Status> for OpStatus {
    fn from(status: Status) -> Self {
        let code = match status.code {
            StatusCode::Ok => OpCode::Ok,
            StatusCode::UnknownError => OpCode::Unknown,
            StatusCode::PreconditionError => OpCode::FailedPrecondition,
            StatusCode::Aborted => OpCode::Aborted,
            StatusCode::InvalidArgument => OpCode::InvalidArgument,
            StatusCode::InProgress => OpCode::Unknown,
        };
        OpStatus::new(code, status.reason.as_ref())
    }
}

impl From<OpStatus> for Status {
    fn from(status: OpStatus) -> Self {
        let code = match status.code {
            OpCode::Ok => StatusCode::Ok,
            OpCode::Unknown => StatusCode::UnknownError,
            OpCode::FailedPrecondition => StatusCode::PreconditionError,
            OpCode::Aborted => StatusCode::Aborted,
            OpCode::InvalidArgument => StatusCode::InvalidArgument,
            _ => StatusCode::UnknownError,
        };
        Status::new(code, status.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::ok(StatusCode::Ok, OpCode::Ok)]
    #[case::unknown(StatusCode::UnknownError, OpCode::Unknown)]
    #[case::precondition(StatusCode::PreconditionError, OpCode::FailedPrecondition)]
    #[case::aborted(StatusCode::Aborted, OpCode::Aborted)]
    #[case::invalid(StatusCode::InvalidArgument, OpCode::InvalidArgument)]
    fn shared_codes_map_both_ways(#[case] internal: StatusCode, #[case] framework: OpCode) {
        let op: OpStatus = Status::new(internal, "reason").into();
        assert_eq!(op.code(), framework);
        assert_eq!(op.message(), "reason");

        let back: Status = op.into();
        assert_eq!(back.code(), internal);
        assert_eq!(back.reason(), "reason");
    }

    #[test]
    fn in_progress_is_unknown_to_the_framework() {
        let op: OpStatus = Status::in_progress().into();
        assert_eq!(op.code(), OpCode::Unknown);
    }

    #[rstest]
    #[case(OpCode::Cancelled)]
    #[case(OpCode::DeadlineExceeded)]
    #[case(OpCode::ResourceExhausted)]
    #[case(OpCode::Internal)]
    #[case(OpCode::Unavailable)]
    fn framework_codes_outside_the_taxonomy_become_unknown(#[case] code: OpCode) {
        let status: Status = OpStatus::new(code, "boom").into();
        assert_eq!(status.code(), StatusCode::UnknownError);
        assert_eq!(status.reason(), "boom");
    }

    #[test]
    fn into_result_splits_ok_from_errors() {
        assert!(Status::ok().into_result().is_ok());
        let err = Status::aborted("stop").into_result().unwrap_err();
        assert_eq!(err.code(), StatusCode::Aborted);
        assert_eq!(err.to_string(), "Aborted: stop");
    }
}
