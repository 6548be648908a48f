//! Three-way classification of engine call outcomes.

use crate::engine::{EngineReturn, TlsEngine};
use crate::error::{ErrorCode, ErrorDetail, TlsError};

/// Result of one driver operation.
///
/// `Incomplete` means the operation could not finish without more transport
/// I/O: drain outbound bytes, supply inbound bytes, and call again.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult<T> {
    Incomplete,
    Complete(T),
    Failed(TlsError),
}

impl<T> OperationResult<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, OperationResult::Complete(_))
    }

    pub fn is_incomplete(&self) -> bool {
        matches!(self, OperationResult::Incomplete)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OperationResult::Failed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> OperationResult<U> {
        match self {
            OperationResult::Incomplete => OperationResult::Incomplete,
            OperationResult::Complete(value) => OperationResult::Complete(f(value)),
            OperationResult::Failed(err) => OperationResult::Failed(err),
        }
    }

    /// `Ok(None)` for `Incomplete`, `Ok(Some(value))` for `Complete`.
    pub fn into_result(self) -> Result<Option<T>, TlsError> {
        match self {
            OperationResult::Incomplete => Ok(None),
            OperationResult::Complete(value) => Ok(Some(value)),
            OperationResult::Failed(err) => Err(err),
        }
    }
}

/// Run one engine call and classify its outcome.
///
/// The engine's error state is cleared first so that reasons left over from
/// an earlier call are never attributed to this one.
pub(crate) fn classify<E, T>(
    engine: &mut E,
    call: impl FnOnce(&mut E) -> EngineReturn<T>,
) -> OperationResult<T>
where
    E: TlsEngine + ?Sized,
{
    engine.clear_errors();
    match call(engine) {
        EngineReturn::Done(value) => OperationResult::Complete(value),
        EngineReturn::NoProgress => {
            let code = engine.error_code();
            if code.is_would_block() {
                return OperationResult::Incomplete;
            }
            let reasons = engine.take_errors();
            log::log!(
                failure_log_level(code),
                "TLS operation failed: {code} ({} reasons)",
                reasons.len()
            );
            OperationResult::Failed(TlsError::Engine(ErrorDetail { code, reasons }))
        }
    }
}

/// A peer's close_notify ends the session normally.
fn failure_log_level(code: ErrorCode) -> log::Level {
    match code {
        ErrorCode::ZeroReturn => log::Level::Debug,
        _ => log::Level::Error,
    }
}
