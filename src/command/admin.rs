// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::{info, warn};
use tokio::io::AsyncBufRead;

use super::{kiosk, set_pin, Console, Context};
use crate::{
    display,
    error::{self, Result},
    route::GuardView,
};

const HELP: &str = "Commands: \"status ROLL\" looks up today's attendance, \"pin\" changes the \
                    admin PIN, \"logout\" signs out, \"kiosk\" returns to kiosk mode and \"quit\" \
                    exits.";

/// Open the admin area, falling back to the kiosk without admin access.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    #[command(flatten)]
    options: kiosk::Options,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: Context) -> Result<()> {
        kiosk::run(&ctx, &self.options, &mut super::stdin(), kiosk::Start::Admin).await
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Leave {
    Kiosk,
    Quit,
}

/// The admin area. Access is checked on entry; visitors without it are sent
/// back to the kiosk.
pub(crate) async fn area<R: AsyncBufRead + Unpin + Send>(
    ctx: &Context,
    console: &mut Console<R>,
) -> Result<Leave> {
    let mut mount = ctx.route_guard().mount();
    if mount.view() == GuardView::Checking {
        println!("Checking admin access…");
    }
    if mount.settled().await? != GuardView::Granted {
        println!("Admin access is required. Returning to kiosk mode.");
        return Ok(Leave::Kiosk);
    }

    info!("Entered the admin area");
    println!("{HELP}");

    loop {
        let Some(line) = console.read_line().await? else {
            return Ok(Leave::Quit);
        };

        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (None, _) => {}
            (Some("status"), Some(roll_no)) => match ctx.status.attendance_status(roll_no).await {
                Ok(status) => println!("{}", display::attendance_status(roll_no, &status)),
                Err(e) => {
                    warn!("Attendance status lookup for {} failed: {}", roll_no, e);
                    println!("Could not look up {roll_no}: {e}");
                }
            },
            (Some("pin"), None) => match set_pin::rotate(ctx).await {
                Ok(message) => println!("{message}"),
                Err(error::Error::Auth(e)) => println!("{e}"),
                Err(error::Error::Cancelled) => println!("PIN change cancelled."),
                Err(error::Error::Command) => println!("PIN not changed."),
                Err(e) => return Err(e),
            },
            (Some("logout"), None) => {
                ctx.auth.session().clear_session()?;
                info!("Admin logged out");
                println!("Logged out.");
                return Ok(Leave::Kiosk);
            }
            (Some("kiosk"), None) => return Ok(Leave::Kiosk),
            (Some("quit"), None) => return Ok(Leave::Quit),
            _ => println!("{HELP}"),
        }
    }
}
