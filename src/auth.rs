// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::{debug, info, warn};
use subtle::ConstantTimeEq;

use crate::{
    api::AdminApi,
    error::{self, Result},
    metadata,
    session::SessionStore,
};

/// How admin access was obtained.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    /// The server issued a token, which is now stored durably.
    Token,
    /// The server could not be reached and the PIN matched the local
    /// fallback. Nothing durable was stored.
    LocalFallback,
}

pub(crate) fn check_format(pin: &str) -> Result<(), error::Auth> {
    if pin.len() == metadata::PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(error::Auth::InvalidFormat)
    }
}

/// Admin sign-in: a server exchange, with a fallback to the locally stored
/// PIN when the server is unreachable.
pub(crate) struct Authenticator {
    api: Arc<dyn AdminApi>,
    session: Arc<SessionStore>,
}

impl Authenticator {
    pub(crate) fn new(api: Arc<dyn AdminApi>, session: Arc<SessionStore>) -> Self {
        Self { api, session }
    }

    pub(crate) fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The network half of sign-in. Has no effect on the session.
    pub(crate) async fn exchange(&self, pin: &str) -> Result<String, error::Auth> {
        check_format(pin)?;
        self.api.authenticate(pin).await
    }

    /// Applies the outcome of [`Self::exchange`] to the session.
    pub(crate) fn settle(&self, pin: &str, exchanged: Result<String, error::Auth>) -> Result<Access> {
        match exchanged {
            Ok(token) => {
                self.session.set_admin_token(&token)?;
                self.session.mark_fast_path_active();
                info!("Admin signed in with a server-issued token");
                Ok(Access::Token)
            }
            Err(e) if e.is_unreachable() => {
                warn!("Falling back to the local PIN because the server is unavailable: {}", e);
                self.local_fallback(pin)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn local_fallback(&self, pin: &str) -> Result<Access> {
        let local = self.session.local_pin();
        if pin.as_bytes().ct_eq(local.as_bytes()).unwrap_u8() == 1 {
            self.session.mark_fast_path_active();
            info!("Admin signed in with the local fallback PIN");
            Ok(Access::LocalFallback)
        } else {
            Err(error::Auth::LocalPinMismatch.into())
        }
    }

    pub(crate) async fn sign_in(&self, pin: &str) -> Result<Access> {
        let exchanged = self.exchange(pin).await;
        self.settle(pin, exchanged)
    }

    pub(crate) async fn validate(&self, token: &str) -> Result<bool, error::Auth> {
        self.api.validate(token).await
    }

    /// Replaces the admin PIN on the server, then signs in again with the new
    /// PIN so the stored token reflects it. The local fallback PIN follows the
    /// server's.
    pub(crate) async fn rotate_pin(&self, current_pin: &str, new_pin: &str) -> Result<String> {
        check_format(new_pin)?;

        let message = self.api.change_pin(current_pin, new_pin).await?;
        self.session.set_local_pin(new_pin)?;
        debug!("Server accepted the new PIN: {}", message);

        let token = self.api.authenticate(new_pin).await?;
        self.session.set_admin_token(&token)?;
        self.session.mark_fast_path_active();

        Ok(message)
    }
}
