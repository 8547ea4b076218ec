// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::info;

use super::Context;
use crate::error::Result;

/// Forget the stored admin session. The local fallback PIN is kept.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: Context) -> Result<()> {
        ctx.auth.session().clear_session()?;
        info!("Admin session cleared");
        println!("Logged out.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::tests::FakeAdmin,
        command::{tests::context, Command as _},
    };

    #[tokio::test]
    async fn logout_keeps_local_pin() {
        let (ctx, session, _) = context(FakeAdmin::with_pin("24680"), &[]);
        session.set_admin_token("server-token").unwrap();
        session.set_local_pin("13579").unwrap();
        session.mark_fast_path_active();

        let command = Command {};
        command.execute(ctx).await.unwrap();
        assert_eq!(session.admin_token(), None);
        assert!(!session.is_fast_path_active());
        assert_eq!(session.local_pin(), "13579");
    }
}
