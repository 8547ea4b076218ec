// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, result};

use thiserror::Error;
use tokio::sync::watch;

pub(crate) type Result<T, E = Error> = result::Result<T, E>;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("JSON format error: {0}")]
    Json(serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("server answered with HTTP status {0}")]
    Status(u16),
    #[error("admin authentication error: {0}")]
    Auth(#[from] Auth),
    #[error("storage error: {0}")]
    Storage(#[from] Storage),
    #[error("PIN retrieval error: {0}")]
    Pin(#[from] Pin),
    #[error("internal communication error: {0}")]
    Internal(#[from] Internal),
    #[error("no camera capture file is configured")]
    NoCaptureFile,
    #[error("command execution failed")]
    Command,
    #[error("operation cancelled")]
    Cancelled,
}

impl From<pinentry::Error> for Error {
    fn from(value: pinentry::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(
            clippy::wildcard_enum_match_arm,
            clippy::match_wildcard_for_single_variants
        )]
        match value {
            pinentry::Error::Cancelled | pinentry::Error::Timeout => Self::Cancelled,
            pinentry::Error::Io(e) => Self::Io(e),
            _ => Self::Pin(Pin::Pinentry(value)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value.classify() {
            serde_json::error::Category::Io => Self::Io(value.into()),
            _ => Self::Json(value),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

/// Failures of the admin PIN flows. The messages are shown to the operator
/// verbatim, so they are phrased for the kiosk screen rather than for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Auth {
    #[error("Enter a 5-digit numeric code")]
    InvalidFormat,
    #[error("{0}")]
    Rejected(String),
    #[error("Server unreachable: {0}")]
    Unreachable(String),
    #[error("Server unreachable and local PIN did not match")]
    LocalPinMismatch,
}

impl Auth {
    pub(crate) const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

#[derive(Error, Debug)]
pub(crate) enum Storage {
    #[error("session storage lock was poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub(crate) enum Pin {
    #[error("Pinentry implementation error: {0}")]
    Pinentry(pinentry::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Internal {
    #[error("channel is closed")]
    ChannelClosed,
}

impl From<watch::error::RecvError> for Error {
    fn from(value: watch::error::RecvError) -> Self {
        Self::Internal(value.into())
    }
}

impl From<watch::error::RecvError> for Internal {
    fn from(_: watch::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
