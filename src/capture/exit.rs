// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::{debug, warn};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::{
    auth::{self, Access, Authenticator},
    error,
    metadata,
    pin::PinBuffer,
};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ExitOutcome {
    /// The PIN was not accepted; the prompt stays open with a message.
    Stay { message: String },
    /// The operator may leave the kiosk.
    Leave(Access),
    /// The prompt was closed before an answer arrived.
    Cancelled,
}

/// The PIN prompt guarding the way out of kiosk mode.
pub(crate) struct ExitPrompt {
    auth: Arc<Authenticator>,
    buffer: PinBuffer,
    cancel: CancellationToken,
}

impl ExitPrompt {
    pub(crate) fn new(auth: Arc<Authenticator>) -> Self {
        Self {
            auth,
            buffer: PinBuffer::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn push_digit(&mut self, c: char) -> bool {
        self.buffer.push(c)
    }

    pub(crate) fn backspace(&mut self) {
        self.buffer.backspace();
    }

    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.buffer.len() == metadata::PIN_LENGTH
    }

    pub(crate) fn masked(&self) -> String {
        self.buffer.masked()
    }

    /// A handle that closes the prompt from elsewhere, e.g. while a
    /// submission is outstanding.
    pub(crate) fn closer(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn close(&mut self) {
        self.cancel.cancel();
        self.buffer.clear();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) async fn submit(&mut self) -> ExitOutcome {
        if self.is_closed() {
            return ExitOutcome::Cancelled;
        }

        let pin = self.buffer.as_str().to_owned();
        if let Err(e) = auth::check_format(&pin) {
            return stay(e.to_string());
        }

        let exchanged = select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("Exit prompt closed while signing in");
                return ExitOutcome::Cancelled;
            }
            r = self.auth.exchange(&pin) => r,
        };
        if self.is_closed() {
            return ExitOutcome::Cancelled;
        }

        match self.auth.settle(&pin, exchanged) {
            Ok(access) => {
                self.buffer.clear();
                ExitOutcome::Leave(access)
            }
            Err(error::Error::Auth(e)) => stay(e.to_string()),
            Err(e) => {
                warn!("Could not record the admin session: {}", e);
                stay(format!("Could not sign in: {e}"))
            }
        }
    }
}

fn stay(message: String) -> ExitOutcome {
    ExitOutcome::Stay { message }
}
