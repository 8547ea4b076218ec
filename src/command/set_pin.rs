// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::error;
use secrecy::{ExposeSecret as _, SecretString};

use super::Context;
use crate::{
    error::{self, Result},
    pin,
};

/// Change the admin PIN on the server.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: Context) -> Result<()> {
        ctx.require_admin().await?;
        let message = rotate(&ctx).await?;
        println!("{message}");
        Ok(())
    }
}

async fn ask(ctx: &Context, description: &str) -> Result<SecretString> {
    pin::read_pin(&*ctx.prompt, description)
        .await?
        .ok_or(error::Error::Cancelled)
}

/// Asks for the current and new PINs and rotates them. Returns the server's
/// confirmation.
pub(crate) async fn rotate(ctx: &Context) -> Result<String> {
    let current = ask(ctx, "Current PIN").await?;
    let new = ask(ctx, "New PIN").await?;
    let confirmation = ask(ctx, "Confirm new PIN").await?;

    if new.expose_secret() != confirmation.expose_secret() {
        error!("The new PIN and its confirmation differ");
        return Err(error::Error::Command);
    }

    ctx.auth
        .rotate_pin(current.expose_secret(), new.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::tests::FakeAdmin, command::tests::context};

    #[tokio::test]
    async fn rotation_updates_local_pin_and_token() {
        let answers = [Some("24680"), Some("13579"), Some("13579")];
        let (ctx, session, _) = context(FakeAdmin::with_pin("24680"), &answers);

        assert_eq!(rotate(&ctx).await.unwrap(), "PIN updated");
        assert_eq!(session.local_pin(), "13579");
        assert_eq!(session.admin_token().as_deref(), Some("server-token"));
    }

    #[tokio::test]
    async fn mismatched_confirmation_changes_nothing() {
        let answers = [Some("24680"), Some("13579"), Some("97531")];
        let (ctx, session, _) = context(FakeAdmin::with_pin("24680"), &answers);

        assert!(matches!(rotate(&ctx).await, Err(error::Error::Command)));
        assert_eq!(session.local_pin(), "12345");
    }

    #[tokio::test]
    async fn wrong_current_pin_is_rejected() {
        let answers = [Some("11111"), Some("13579"), Some("13579")];
        let (ctx, _, _) = context(FakeAdmin::with_pin("24680"), &answers);

        assert!(matches!(
            rotate(&ctx).await,
            Err(error::Error::Auth(error::Auth::Rejected(_)))
        ));
    }
}
