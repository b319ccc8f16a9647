//! Error adapters
//!
//! Every boundary-crossing call runs the lower error through the adapter
//! of the receiving layer. Well-known lower messages are remapped into the
//! receiving layer's vocabulary; anything else is wrapped with its message
//! kept and the lower error preserved as the cause. In both cases the origin
//! is reset to the adaptation site.

use std::borrow::Cow;
use std::panic::Location;

use super::app_error::{AppError, AppResult};
use super::kind::ErrorKind;
use super::messages::{in_memory, joint, persistent, service};

/// Adapt a persistent / in-memory / broker error into the joint layer
#[track_caller]
pub fn to_joint(err: AppError) -> AppError {
    adapt_at(err, ErrorKind::Joint, Location::caller())
}

/// Adapt a joint / broker error into the service layer
#[track_caller]
pub fn to_service(err: AppError) -> AppError {
    adapt_at(err, ErrorKind::Service, Location::caller())
}

fn adapt_at(err: AppError, target: ErrorKind, origin: &'static Location<'static>) -> AppError {
    if err.kind() == target {
        return err;
    }
    let message: Cow<'static, str> = match remap(err.kind(), err.message(), target) {
        Some(known) => Cow::Borrowed(known),
        None => Cow::Owned(err.message().to_owned()),
    };
    AppError::at(target, message, origin).with_source(err)
}

fn remap(from: ErrorKind, message: &str, to: ErrorKind) -> Option<&'static str> {
    match (from, to) {
        (ErrorKind::Persistent, ErrorKind::Joint) => match message {
            persistent::NO_ROWS => Some(joint::EMPTY_RESULT),
            persistent::ZERO_ROWS_AFFECTED => Some(joint::DATA_NOT_SAVED),
            m if m.starts_with("duplicate key value") => Some(joint::DUPLICATE_DATA),
            _ => None,
        },
        (ErrorKind::InMemory, ErrorKind::Joint) => match message {
            in_memory::NOT_NUMERIC => Some(joint::TYPE_CONVERSION_FAILED),
            in_memory::EMPTY_RESULT => Some(joint::EMPTY_RESULT),
            _ => None,
        },
        (ErrorKind::Joint, ErrorKind::Service) => match message {
            joint::DUPLICATE_DATA => Some(service::ALREADY_EXISTS),
            joint::DATA_NOT_SAVED => Some(service::NOTHING_CHANGED),
            joint::EMPTY_RESULT => Some(service::EMPTY_RESULT),
            _ => None,
        },
        _ => None,
    }
}

/// Adapter shortcuts on results
pub trait AdaptExt<T> {
    /// Run the error through the joint adapter
    fn joint_err(self) -> AppResult<T>;

    /// Run the error through the service adapter
    fn service_err(self) -> AppResult<T>;
}

impl<T> AdaptExt<T> for AppResult<T> {
    #[track_caller]
    fn joint_err(self) -> AppResult<T> {
        let origin = Location::caller();
        self.map_err(|e| adapt_at(e, ErrorKind::Joint, origin))
    }

    #[track_caller]
    fn service_err(self) -> AppResult<T> {
        let origin = Location::caller();
        self.map_err(|e| adapt_at(e, ErrorKind::Service, origin))
    }
}
