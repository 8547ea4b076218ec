// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::{Args, Parser};
use futures_util::StreamExt as _;
use log::{debug, info};
use tokio::{io::AsyncBufRead, select};
use tokio_stream::wrappers::WatchStream;

use super::{admin, Console, Context};
use crate::{
    auth::Access,
    capture::{
        Admission, CaptureController, CaptureState, ExitOutcome, Method, Notice, Step, Timing,
    },
    display,
    error::{self, Result},
    guard::DuplicateGuard,
};

#[derive(Clone, Debug, Args)]
pub(crate) struct Options {
    /// Start with auto-scan turned off, so the input method is chosen for
    /// every student.
    #[arg(long)]
    manual: bool,

    /// How long a verification result stays on screen before the next scan,
    /// in milliseconds.
    #[arg(long, default_value_t = 2000)]
    result_delay_ms: u64,

    /// How long a duplicate notice stays on screen before the next scan, in
    /// milliseconds.
    #[arg(long, default_value_t = 2000)]
    duplicate_delay_ms: u64,
}

impl Options {
    fn timing(&self) -> Timing {
        Timing {
            result_display: Duration::from_millis(self.result_delay_ms),
            duplicate_display: Duration::from_millis(self.duplicate_delay_ms),
        }
    }
}

/// Run the attendance kiosk.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    #[command(flatten)]
    options: Options,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: Context) -> Result<()> {
        run(&ctx, &self.options, &mut super::stdin(), Start::Kiosk).await
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Start {
    Kiosk,
    Admin,
}

/// Alternates between the kiosk and the admin area until input runs out or
/// the operator quits from the admin area.
pub(crate) async fn run<R: AsyncBufRead + Unpin + Send>(
    ctx: &Context,
    options: &Options,
    console: &mut Console<R>,
    start: Start,
) -> Result<()> {
    let mut next = start;
    loop {
        if next == Start::Admin {
            match admin::area(ctx, console).await? {
                admin::Leave::Kiosk => {}
                admin::Leave::Quit => return Ok(()),
            }
        }

        match session(ctx, options, console).await? {
            Left::ToAdmin => next = Start::Admin,
            Left::InputClosed => return Ok(()),
        }
    }
}

enum Left {
    ToAdmin,
    InputClosed,
}

async fn session<R: AsyncBufRead + Unpin + Send>(
    ctx: &Context,
    options: &Options,
    console: &mut Console<R>,
) -> Result<Left> {
    let controller = CaptureController::new(
        !options.manual,
        Arc::new(DuplicateGuard::new(Arc::clone(&ctx.status))),
        Arc::clone(&ctx.verifier),
        Arc::clone(&ctx.auth),
        options.timing(),
    );
    let mut updates = WatchStream::new(controller.subscribe());
    info!("Kiosk mode started");

    loop {
        select! {
            Some(state) = updates.next() => render(&state),
            line = console.read_line() => {
                let Some(line) = line? else {
                    controller.abandon().await;
                    return Ok(Left::InputClosed);
                };

                let step = controller.snapshot().await.step;
                match Input::parse(step, &line) {
                    Input::Exit => {
                        if leave(&controller, console).await? {
                            controller.abandon().await;
                            return Ok(Left::ToAdmin);
                        }
                        render(&controller.snapshot().await);
                    }
                    Input::Help => println!("{}", help(step)),
                    Input::Nothing => {}
                    Input::Unknown => println!("Unrecognized input. {}", help(step)),
                    input => {
                        if apply(&controller, input).await == Admission::Ignored {
                            println!("Busy, try again in a moment.");
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Pick(Method),
    Scan(String),
    Submit(String),
    ToggleAuto,
    SetAuto(bool),
    BackToQr,
    RescanFace,
    RescanQr,
    Reenter,
    StartOver,
    Exit,
    Help,
    Nothing,
    Unknown,
}

impl Input {
    fn parse(step: Step, line: &str) -> Self {
        match (step, line) {
            (_, "") => Self::Nothing,
            (_, "help" | "?") => Self::Help,
            (_, "exit") => Self::Exit,
            (_, "auto") => Self::ToggleAuto,
            (_, "auto on") => Self::SetAuto(true),
            (_, "auto off") => Self::SetAuto(false),
            (Step::Face, "back") => Self::BackToQr,
            (Step::Result, "face") => Self::RescanFace,
            (Step::Result, "qr") => Self::RescanQr,
            (Step::Result, "manual") => Self::Reenter,
            (Step::Result, "start") => Self::StartOver,
            (_, "qr") => Self::Pick(Method::Qr),
            (_, "manual") => Self::Pick(Method::Manual),
            (Step::Qr, roll_no) => Self::Scan(roll_no.to_owned()),
            (Step::Manual, roll_no) => Self::Submit(roll_no.to_owned()),
            (Step::Choose | Step::Face | Step::Result, _) => Self::Unknown,
        }
    }
}

async fn apply(controller: &CaptureController, input: Input) -> Admission {
    match input {
        Input::Pick(method) => controller.pick(method).await,
        Input::Scan(roll_no) => controller.scan(&roll_no).await,
        Input::Submit(roll_no) => controller.submit_manual(&roll_no).await,
        Input::ToggleAuto => controller.toggle_auto_scan().await,
        Input::SetAuto(on) => controller.set_auto_scan(on).await,
        Input::BackToQr => controller.back_to_qr().await,
        Input::RescanFace => controller.rescan_face().await,
        Input::RescanQr => controller.rescan_qr().await,
        Input::Reenter => controller.reenter_roll().await,
        Input::StartOver => controller.start_over().await,
        Input::Exit | Input::Help | Input::Nothing | Input::Unknown => Admission::Ignored,
    }
}

/// Asks for the admin PIN. Returns whether the operator may leave the kiosk.
///
/// Digits accumulate across lines like presses on a keypad. "<" removes the
/// last digit, "clear" removes all of them and an empty line submits early.
async fn leave<R: AsyncBufRead + Unpin + Send>(
    controller: &CaptureController,
    console: &mut Console<R>,
) -> Result<bool> {
    let mut prompt = controller.request_exit();
    println!("Enter the admin PIN to leave kiosk mode, or \"cancel\" to stay.");

    loop {
        println!("PIN {}", prompt.masked());
        let Some(line) = console.read_line().await? else {
            prompt.close();
            return Ok(false);
        };

        match line.as_str() {
            "cancel" => {
                prompt.close();
                println!("Staying in kiosk mode.");
                return Ok(false);
            }
            "<" => {
                prompt.backspace();
                continue;
            }
            "clear" => {
                prompt.clear();
                continue;
            }
            "" => {}
            digits => {
                if !digits.chars().all(|c| prompt.push_digit(c)) {
                    prompt.clear();
                    println!("{}", error::Auth::InvalidFormat);
                    continue;
                }
                if !prompt.is_complete() {
                    continue;
                }
            }
        }

        // A line typed while the server is still being asked closes the
        // prompt. An answer that is already in wins over buffered input.
        let closer = prompt.closer();
        let outcome = {
            let submit = prompt.submit();
            tokio::pin!(submit);
            select! {
                biased;
                outcome = &mut submit => outcome,
                line = console.read_line() => {
                    if line?.is_some() {
                        closer.cancel();
                    }
                    submit.await
                }
            }
        };

        match outcome {
            ExitOutcome::Stay { message } => {
                prompt.clear();
                println!("{message}");
            }
            ExitOutcome::Leave(Access::Token) => return Ok(true),
            ExitOutcome::Leave(Access::LocalFallback) => {
                println!("Server unreachable, signed in with the local PIN.");
                return Ok(true);
            }
            ExitOutcome::Cancelled => {
                debug!("Exit prompt closed during sign-in");
                println!("Staying in kiosk mode.");
                return Ok(false);
            }
        }
    }
}

fn help(step: Step) -> &'static str {
    match step {
        Step::Choose => "Type \"qr\" to scan a QR code or \"manual\" to type a roll number.",
        Step::Qr => "Scan a QR code. Type \"manual\" to type a roll number instead.",
        Step::Manual => "Type a roll number. Type \"qr\" to scan a QR code instead.",
        Step::Face => "Look at the camera. Type \"back\" to cancel.",
        Step::Result => {
            "Type \"face\" to verify again, \"qr\" to scan again, \"manual\" to re-enter the roll \
             number or \"start\" to start over."
        }
    }
}

fn render(state: &CaptureState) {
    let mode = if state.auto_scan { "auto-scan" } else { "manual" };
    match state.step {
        Step::Qr => match state.attempt.as_ref() {
            Some(attempt) => match state.last_notice.as_ref() {
                Some(notice @ Notice::Duplicate { roll_no, .. })
                    if attempt.duplicate_checked && *roll_no == attempt.roll_no =>
                {
                    println!("{}", display::notice_message(notice));
                }
                _ => println!("Checking attendance for {}…", attempt.roll_no),
            },
            None => {
                if let Some(notice) = state.last_notice.as_ref() {
                    println!("Last Attendance:\n{}", display::last_attendance(notice));
                    println!("{}", display::notice_message(notice));
                }
                println!("[{mode}] {}", help(Step::Qr));
            }
        },
        Step::Face => {
            if let Some(attempt) = state.attempt.as_ref() {
                println!(
                    "Verifying face for {} (roll number from {})…",
                    attempt.roll_no, attempt.method
                );
            }
        }
        Step::Result => {
            if let Some(result) = state
                .attempt
                .as_ref()
                .and_then(|attempt| attempt.verification.as_ref())
            {
                println!("{}", display::verification(result));
            }
            if state.auto_scan {
                println!("The next scan starts shortly.");
            } else {
                println!("[{mode}] {}", help(Step::Result));
            }
        }
        Step::Choose | Step::Manual => println!("[{mode}] {}", help(state.step)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::tests::FakeAdmin, command::tests::context};

    #[test]
    fn scanned_lines_become_roll_numbers() {
        assert_eq!(Input::parse(Step::Qr, "S100"), Input::Scan("S100".to_owned()));
        assert_eq!(
            Input::parse(Step::Manual, "S100"),
            Input::Submit("S100".to_owned())
        );
        assert_eq!(Input::parse(Step::Choose, "S100"), Input::Unknown);
        assert_eq!(Input::parse(Step::Face, "S100"), Input::Unknown);
    }

    #[test]
    fn words_depend_on_step() {
        assert_eq!(Input::parse(Step::Choose, "qr"), Input::Pick(Method::Qr));
        assert_eq!(Input::parse(Step::Result, "qr"), Input::RescanQr);
        assert_eq!(Input::parse(Step::Result, "manual"), Input::Reenter);
        assert_eq!(Input::parse(Step::Qr, "manual"), Input::Pick(Method::Manual));
        assert_eq!(Input::parse(Step::Face, "back"), Input::BackToQr);
        assert_eq!(Input::parse(Step::Qr, "back"), Input::Scan("back".to_owned()));
    }

    #[test]
    fn global_words_work_everywhere() {
        for step in [Step::Choose, Step::Qr, Step::Manual, Step::Face, Step::Result] {
            assert_eq!(Input::parse(step, "exit"), Input::Exit);
            assert_eq!(Input::parse(step, "auto"), Input::ToggleAuto);
            assert_eq!(Input::parse(step, "auto off"), Input::SetAuto(false));
            assert_eq!(Input::parse(step, ""), Input::Nothing);
        }
    }

    fn manual() -> Options {
        Options {
            manual: true,
            result_delay_ms: 2000,
            duplicate_delay_ms: 2000,
        }
    }

    async fn drive(ctx: &Context, input: &'static [u8], start: Start) {
        let mut console = Console::new(input);
        run(ctx, &manual(), &mut console, start).await.unwrap();
    }

    #[tokio::test]
    async fn local_pin_opens_admin_area_while_offline() {
        for _ in 0..50 {
            let (ctx, session, status) = context(FakeAdmin::unreachable(), &[]);
            drive(&ctx, b"exit\n12345\nstatus S100\nquit\n", Start::Kiosk).await;

            assert!(session.is_fast_path_active());
            assert_eq!(session.admin_token(), None);
            assert_eq!(status.queries(), vec!["S100".to_owned()]);
        }
    }

    #[tokio::test]
    async fn pin_on_last_line_still_signs_in() {
        let (ctx, session, _) = context(FakeAdmin::unreachable(), &[]);
        drive(&ctx, b"exit\n12345\n", Start::Kiosk).await;

        assert!(session.is_fast_path_active());
    }

    #[tokio::test]
    async fn rejected_pin_keeps_kiosk_locked() {
        let (ctx, session, status) = context(FakeAdmin::with_pin("24680"), &[]);
        drive(&ctx, b"exit\n99999\nstatus S100\n", Start::Kiosk).await;

        assert!(!session.is_fast_path_active());
        assert_eq!(session.admin_token(), None);
        assert!(status.queries().is_empty());
    }

    #[tokio::test]
    async fn cancel_returns_to_kiosk_and_exit_works_again() {
        let (ctx, session, status) = context(FakeAdmin::unreachable(), &[]);
        drive(&ctx, b"exit\n123\ncancel\n", Start::Kiosk).await;
        assert!(!session.is_fast_path_active());

        drive(
            &ctx,
            b"exit\n123\ncancel\nexit\n12345\nstatus S100\nquit\n",
            Start::Kiosk,
        )
        .await;
        assert!(session.is_fast_path_active());
        assert_eq!(status.queries(), vec!["S100".to_owned()]);
    }

    #[tokio::test]
    async fn keypad_edits_before_submitting() {
        let (ctx, session, status) = context(FakeAdmin::with_pin("24680"), &[]);
        drive(
            &ctx,
            b"exit\n12\nclear\n246\n9\n<\n80\nstatus S100\nquit\n",
            Start::Kiosk,
        )
        .await;

        assert_eq!(session.admin_token().as_deref(), Some("server-token"));
        assert_eq!(status.queries(), vec!["S100".to_owned()]);
    }

    #[tokio::test]
    async fn short_or_overlong_pins_never_sign_in() {
        let (ctx, session, _) = context(FakeAdmin::with_pin("24680"), &[]);
        // An empty line submits the three digits early, then six digits are
        // discarded as a whole.
        drive(&ctx, b"exit\n246\n\n246801\n", Start::Kiosk).await;

        assert!(!session.is_fast_path_active());
        assert_eq!(session.admin_token(), None);
    }

    #[tokio::test]
    async fn overlong_line_is_discarded_before_next_entry() {
        let (ctx, session, _) = context(FakeAdmin::with_pin("24680"), &[]);
        drive(&ctx, b"exit\n246801\n24680\nquit\n", Start::Kiosk).await;

        assert_eq!(session.admin_token().as_deref(), Some("server-token"));
    }

    #[tokio::test]
    async fn admin_area_returns_to_kiosk_and_back() {
        let (ctx, session, status) = context(FakeAdmin::unreachable(), &[]);
        drive(
            &ctx,
            b"exit\n12345\nkiosk\nexit\n12345\nstatus S100\nquit\n",
            Start::Kiosk,
        )
        .await;

        assert!(session.is_fast_path_active());
        assert_eq!(status.queries(), vec!["S100".to_owned()]);
    }

    #[tokio::test]
    async fn admin_start_without_access_lands_in_kiosk() {
        let (ctx, session, status) = context(FakeAdmin::with_pin("24680"), &[]);
        // Without access the admin area reads nothing, so the line reaches
        // the kiosk, which does not understand it.
        drive(&ctx, b"status S100\n", Start::Admin).await;

        assert!(!session.is_fast_path_active());
        assert!(status.queries().is_empty());
    }

    #[test]
    fn options_map_to_timing() {
        let options = Options {
            manual: false,
            result_delay_ms: 1500,
            duplicate_delay_ms: 3000,
        };
        let timing = options.timing();
        assert_eq!(timing.result_display, Duration::from_millis(1500));
        assert_eq!(timing.duplicate_display, Duration::from_secs(3));
    }
}
