// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use uuid::Uuid;

use crate::api::VerificationResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Choose,
    Qr,
    Manual,
    Face,
    Result,
}

impl Step {
    pub(crate) const fn initial(auto_scan: bool) -> Self {
        if auto_scan {
            Self::Qr
        } else {
            Self::Choose
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Choose => "choose",
            Self::Qr => "qr",
            Self::Manual => "manual",
            Self::Face => "face",
            Self::Result => "result",
        })
    }
}

/// Where a roll number came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Method {
    Qr,
    Manual,
}

impl Method {
    pub(crate) const fn step(self) -> Step {
        match self {
            Self::Qr => Step::Qr,
            Self::Manual => Step::Manual,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Qr => "QR code",
            Self::Manual => "manual entry",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CaptureAttempt {
    pub(crate) id: Uuid,
    pub(crate) roll_no: String,
    pub(crate) method: Method,
    pub(crate) duplicate_checked: bool,
    pub(crate) verification: Option<VerificationResult>,
}

impl CaptureAttempt {
    fn new(roll_no: String, method: Method) -> Self {
        Self {
            id: Uuid::new_v4(),
            roll_no,
            method,
            duplicate_checked: false,
            verification: None,
        }
    }
}

/// The most recent outcome, kept after the attempt itself is gone so the scan
/// screen can show it to the next person in line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Notice {
    Recorded(VerificationResult),
    Duplicate {
        roll_no: String,
        name: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CaptureState {
    pub(crate) step: Step,
    pub(crate) auto_scan: bool,
    pub(crate) attempt: Option<CaptureAttempt>,
    pub(crate) last_notice: Option<Notice>,
    /// Bumped on every change. Work started under one generation may only be
    /// applied while the generation is unchanged.
    pub(crate) generation: u64,
}

impl CaptureState {
    pub(crate) const fn new(auto_scan: bool) -> Self {
        Self {
            step: Step::initial(auto_scan),
            auto_scan,
            attempt: None,
            last_notice: None,
            generation: 0,
        }
    }

    pub(crate) const fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn roll_no(&self) -> Option<&str> {
        self.attempt.as_ref().map(|attempt| attempt.roll_no.as_str())
    }

    pub(crate) fn touch(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    pub(crate) fn enter(&mut self, step: Step) -> u64 {
        self.step = step;
        self.touch()
    }

    /// Moves to `step` and forgets the current attempt.
    pub(crate) fn reset_to(&mut self, step: Step) -> u64 {
        self.attempt = None;
        self.enter(step)
    }

    pub(crate) fn begin_attempt(&mut self, roll_no: String, method: Method) -> u64 {
        self.attempt = Some(CaptureAttempt::new(roll_no, method));
        self.touch()
    }

    /// Whether a roll number arriving through `method` may start an attempt.
    pub(crate) fn accepts(&self, method: Method) -> bool {
        self.step == method.step() && self.attempt.is_none()
    }

    pub(crate) fn set_auto_scan(&mut self, on: bool) -> u64 {
        self.auto_scan = on;
        self.reset_to(Step::initial(on))
    }

    pub(crate) fn mark_duplicate_checked(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.duplicate_checked = true;
        }
    }

    pub(crate) fn record_duplicate(&mut self, name: Option<String>) -> u64 {
        self.mark_duplicate_checked();
        if let Some(roll_no) = self.roll_no().map(str::to_owned) {
            self.last_notice = Some(Notice::Duplicate { roll_no, name });
        }
        self.touch()
    }

    pub(crate) fn record_verification(&mut self, result: VerificationResult) -> u64 {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.verification = Some(result.clone());
        }
        self.last_notice = Some(Notice::Recorded(result));
        self.enter(Step::Result)
    }

    /// Drops the verification of the current attempt, keeping its roll number.
    pub(crate) fn clear_verification(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.verification = None;
        }
    }
}
