// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt as _;
use log::error;
use secrecy::ExposeSecret as _;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt as _, BufReader};
use tokio_stream::wrappers::LinesStream;

use crate::{
    api::{FaceVerifier, StatusApi},
    auth::Authenticator,
    error::{self, Result},
    pin::{self, Prompt},
    route::{GuardView, RouteGuard},
};

pub(crate) mod admin;
pub(crate) mod kiosk;
pub(crate) mod logout;
pub(crate) mod set_pin;

/// Everything a command needs to talk to the server and the operator.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) auth: Arc<Authenticator>,
    pub(crate) status: Arc<dyn StatusApi>,
    pub(crate) verifier: Arc<dyn FaceVerifier>,
    pub(crate) prompt: Arc<dyn Prompt>,
}

impl Context {
    pub(crate) fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(Arc::clone(&self.auth))
    }

    /// Checks admin access for a one-shot command. Without a usable session
    /// the operator is asked for the admin PIN instead.
    pub(crate) async fn require_admin(&self) -> Result<()> {
        let mut mount = self.route_guard().mount();
        match mount.settled().await? {
            GuardView::Granted => return Ok(()),
            GuardView::Checking | GuardView::Redirected => mount.unmount(),
        }

        let Some(pin) = pin::read_pin(&*self.prompt, "Admin PIN").await? else {
            error!("Admin access is required, but no PIN was entered");
            return Err(error::Error::Cancelled);
        };
        let _ = self.auth.sign_in(pin.expose_secret()).await?;
        Ok(())
    }
}

#[async_trait]
pub(crate) trait Command {
    async fn execute(self, ctx: Context) -> Result<()>;
}

/// Line-oriented operator input. A QR scanner acting as a keyboard shows up
/// here as a line holding the roll number.
pub(crate) struct Console<R> {
    lines: LinesStream<R>,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            lines: LinesStream::new(reader.lines()),
        }
    }

    /// The next line with surrounding whitespace removed, or `None` once input
    /// is closed.
    pub(crate) async fn read_line(&mut self) -> Result<Option<String>> {
        Ok(self
            .lines
            .next()
            .await
            .transpose()?
            .map(|line| line.trim().to_owned()))
    }
}

pub(crate) fn stdin() -> Console<BufReader<io::Stdin>> {
    Console::new(BufReader::new(io::stdin()))
}
