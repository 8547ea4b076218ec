// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    missing_doc_code_examples,
    private_doc_tests,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod api;
mod auth;
mod capture;
mod command;
mod display;
mod error;
mod guard;
mod http;
mod metadata;
mod pin;
mod route;
mod session;
mod storage;

use std::{path::PathBuf, process, sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use error::Result;
use log::{error, warn};
use url::Url;

#[derive(Debug, Subcommand)]
enum Command {
    Kiosk(command::kiosk::Command),
    Admin(command::admin::Command),
    SetPin(command::set_pin::Command),
    Logout(command::logout::Command),
}

#[async_trait]
impl command::Command for Command {
    async fn execute(self, ctx: command::Context) -> Result<()> {
        match self {
            Self::Kiosk(cmd) => cmd.execute(ctx).await,
            Self::Admin(cmd) => cmd.execute(ctx).await,
            Self::SetPin(cmd) => cmd.execute(ctx).await,
            Self::Logout(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// The base URL of the attendance server's API.
    #[arg(long, env = "ROLLGATE_URL", default_value = "http://127.0.0.1:8000/api/", value_parser = Url::parse)]
    url: Url,

    /// Keep the admin session in memory only, forgetting it on exit.
    #[arg(long)]
    no_persist: bool,

    /// How long to wait for the server before treating it as unreachable, in
    /// seconds.
    #[arg(long, env = "ROLLGATE_REQUEST_TIMEOUT", default_value_t = 10)]
    request_timeout: u64,

    /// The camera snapshot sent to the server for face verification. It is
    /// read afresh for every verification.
    #[arg(long, env = "ROLLGATE_CAPTURE_FILE", value_hint = clap::ValueHint::FilePath)]
    capture_file: Option<PathBuf>,

    /// The path to the Pinentry program to use when asking for the admin PIN.
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pinentry_program: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

fn get_session_storage(args: &Args) -> Box<dyn storage::Storage<session::Data>> {
    if !args.no_persist {
        if let Some(file_storage) = storage::File::new("session.json") {
            return Box::new(file_storage);
        }
        warn!("No data directory is available, so the admin session will not outlive this process");
    }

    Box::new(storage::Memory::<session::Data>::new())
}

async fn run(args: Args) -> Result<()> {
    let prompt: Vec<Box<dyn pin::Prompt>> = vec![
        Box::new(args.pinentry_program.clone().map_or_else(
            pin::PinentryPrompt::new,
            pin::PinentryPrompt::new_with_executable,
        )),
        Box::new(pin::RpasswordPrompt),
    ];

    let session = Arc::new(session::SessionStore::open(get_session_storage(&args))?);
    let backend = Arc::new(http::Backend::new(
        args.url,
        Duration::from_secs(args.request_timeout),
        args.capture_file,
    ));

    let ctx = command::Context {
        auth: Arc::new(auth::Authenticator::new(
            Arc::clone(&backend) as Arc<dyn api::AdminApi>,
            session,
        )),
        status: Arc::clone(&backend) as Arc<dyn api::StatusApi>,
        verifier: backend,
        prompt: Arc::new(prompt),
    };

    command::Command::execute(args.command, ctx).await
}

#[tokio::main]
async fn main() {
    let logger_env = env_logger::Env::new()
        .filter_or("ROLLGATE_LOG", "warn")
        .write_style("ROLLGATE_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    if let Err(e) = run(Args::parse()).await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
