// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

//! The kiosk's attendance capture: choosing an input method, reading a roll
//! number, checking it against today's attendance, verifying the student's
//! face and showing the outcome until the kiosk resets itself.

mod controller;
mod exit;
mod state;

pub(crate) use controller::{Admission, CaptureController, Timing};
pub(crate) use exit::{ExitOutcome, ExitPrompt};
pub(crate) use state::{CaptureState, Method, Notice, Step};
