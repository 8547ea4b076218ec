// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    api::{FaceVerifier, VerificationResult},
    auth::Authenticator,
    guard::{Decision, DuplicateGuard},
};

use super::{
    exit::ExitPrompt,
    state::{CaptureState, Method, Step},
};

/// How long outcomes stay on screen before the kiosk resets itself.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Timing {
    pub(crate) result_display: Duration,
    pub(crate) duplicate_display: Duration,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Admission {
    Accepted,
    Ignored,
}

/// An automatic return to the scan step, valid only while the state it was
/// scheduled from is still current.
struct PendingReset {
    from: Step,
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    state: CaptureState,
    pending: Option<PendingReset>,
}

impl Inner {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!(
                "Cancelling reset scheduled from {} (generation {})",
                pending.from, pending.generation
            );
            pending.handle.abort();
        }
    }
}

#[derive(Clone)]
pub(crate) struct CaptureController {
    inner: Arc<Mutex<Inner>>,
    events: Arc<watch::Sender<CaptureState>>,
    guard: Arc<DuplicateGuard>,
    verifier: Arc<dyn FaceVerifier>,
    auth: Arc<Authenticator>,
    timing: Timing,
}

impl CaptureController {
    pub(crate) fn new(
        auto_scan: bool,
        guard: Arc<DuplicateGuard>,
        verifier: Arc<dyn FaceVerifier>,
        auth: Arc<Authenticator>,
        timing: Timing,
    ) -> Self {
        let state = CaptureState::new(auto_scan);
        let (events, _) = watch::channel(state.clone());

        Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                pending: None,
            })),
            events: Arc::new(events),
            guard,
            verifier,
            auth,
            timing,
        }
    }

    pub(crate) async fn snapshot(&self) -> CaptureState {
        self.inner.lock().await.state.clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.events.subscribe()
    }

    /// Switches to an input method, abandoning whatever was in progress.
    pub(crate) async fn pick(&self, method: Method) -> Admission {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending();
        let _ = inner.state.reset_to(method.step());
        self.publish(&inner);
        Admission::Accepted
    }

    pub(crate) async fn scan(&self, roll_no: &str) -> Admission {
        self.begin(roll_no, Method::Qr).await
    }

    pub(crate) async fn submit_manual(&self, roll_no: &str) -> Admission {
        self.begin(roll_no, Method::Manual).await
    }

    async fn begin(&self, roll_no: &str, method: Method) -> Admission {
        let roll_no = roll_no.trim();
        if roll_no.is_empty() {
            return Admission::Ignored;
        }

        let mut inner = self.inner.lock().await;
        if !inner.state.accepts(method) {
            debug!(
                "Ignoring {} input {} while at {} (attempt active: {})",
                method,
                roll_no,
                inner.state.step,
                inner.state.attempt.is_some()
            );
            return Admission::Ignored;
        }

        inner.cancel_pending();
        let generation = inner.state.begin_attempt(roll_no.to_owned(), method);
        if let Some(attempt) = inner.state.attempt.as_ref() {
            info!(
                "Captured roll number {} from {} (attempt {})",
                attempt.roll_no, attempt.method, attempt.id
            );
        }

        if inner.state.auto_scan {
            self.publish(&inner);
            self.spawn_duplicate_check(roll_no.to_owned(), generation);
        } else {
            let generation = inner.state.enter(Step::Face);
            self.publish(&inner);
            self.spawn_verification(roll_no.to_owned(), generation);
        }

        Admission::Accepted
    }

    /// Runs the face step again for the same roll number.
    pub(crate) async fn rescan_face(&self) -> Admission {
        let mut inner = self.inner.lock().await;
        let roll_no = match (inner.state.step, inner.state.roll_no()) {
            (Step::Result, Some(roll_no)) => roll_no.to_owned(),
            _ => return Admission::Ignored,
        };

        inner.cancel_pending();
        inner.state.clear_verification();
        let generation = inner.state.enter(Step::Face);
        self.publish(&inner);
        self.spawn_verification(roll_no, generation);
        Admission::Accepted
    }

    pub(crate) async fn rescan_qr(&self) -> Admission {
        self.leave_result(Step::Qr).await
    }

    pub(crate) async fn reenter_roll(&self) -> Admission {
        self.leave_result(Step::Manual).await
    }

    pub(crate) async fn start_over(&self) -> Admission {
        self.leave_result(Step::Choose).await
    }

    async fn leave_result(&self, step: Step) -> Admission {
        let mut inner = self.inner.lock().await;
        if inner.state.step != Step::Result {
            return Admission::Ignored;
        }

        inner.cancel_pending();
        let _ = inner.state.reset_to(step);
        self.publish(&inner);
        Admission::Accepted
    }

    /// Abandons a face check in progress. Its answer, if one still arrives,
    /// is dropped.
    pub(crate) async fn back_to_qr(&self) -> Admission {
        let mut inner = self.inner.lock().await;
        if inner.state.step != Step::Face {
            return Admission::Ignored;
        }

        inner.cancel_pending();
        let _ = inner.state.reset_to(Step::Qr);
        self.publish(&inner);
        Admission::Accepted
    }

    pub(crate) async fn set_auto_scan(&self, on: bool) -> Admission {
        let mut inner = self.inner.lock().await;
        if inner.state.auto_scan == on {
            return Admission::Ignored;
        }

        inner.cancel_pending();
        let _ = inner.state.set_auto_scan(on);
        info!("Auto-scan turned {}", if on { "on" } else { "off" });
        self.publish(&inner);
        Admission::Accepted
    }

    pub(crate) async fn toggle_auto_scan(&self) -> Admission {
        let on = !self.inner.lock().await.state.auto_scan;
        self.set_auto_scan(on).await
    }

    /// Opens the PIN prompt for leaving kiosk mode. The capture state is left
    /// untouched, so closing the prompt resumes where the kiosk was.
    pub(crate) fn request_exit(&self) -> ExitPrompt {
        ExitPrompt::new(Arc::clone(&self.auth))
    }

    /// Stops all pending work once the kiosk has been left for good.
    pub(crate) async fn abandon(&self) {
        let mut inner = self.inner.lock().await;
        inner.cancel_pending();
        let _ = inner.state.touch();
        debug!("Capture controller abandoned");
    }

    fn publish(&self, inner: &Inner) {
        let _ = self.events.send_replace(inner.state.clone());
    }

    fn spawn_duplicate_check(&self, roll_no: String, generation: u64) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            let decision = this.guard.check(&roll_no).await;
            this.on_duplicate_checked(&roll_no, generation, decision).await;
        });
    }

    async fn on_duplicate_checked(&self, roll_no: &str, generation: u64, decision: Decision) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_current(generation) {
            debug!("Discarding stale attendance status for {}", roll_no);
            return;
        }

        match decision {
            Decision::Eligible => {
                inner.state.mark_duplicate_checked();
                let generation = inner.state.enter(Step::Face);
                self.publish(&inner);
                self.spawn_verification(roll_no.to_owned(), generation);
            }
            Decision::Duplicate { name } => {
                info!("Attendance already done for roll number {}", roll_no);
                let _ = inner.state.record_duplicate(name);
                self.schedule_reset(&mut inner, self.timing.duplicate_display);
                self.publish(&inner);
            }
        }
    }

    fn spawn_verification(&self, roll_no: String, generation: u64) {
        let this = self.clone();
        let _ = tokio::spawn(async move {
            let result = match this.verifier.verify(&roll_no).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("Face verification for {} failed: {}", roll_no, e);
                    VerificationResult::failed(&roll_no, e.to_string())
                }
            };
            this.on_verified(generation, result).await;
        });
    }

    async fn on_verified(&self, generation: u64, result: VerificationResult) {
        let mut inner = self.inner.lock().await;
        if !inner.state.is_current(generation) {
            debug!("Discarding stale verification for {}", result.roll_no);
            return;
        }

        info!(
            "Verification for {} {}",
            result.roll_no,
            if result.success { "succeeded" } else { "failed" }
        );
        let _ = inner.state.record_verification(result);
        if inner.state.auto_scan {
            self.schedule_reset(&mut inner, self.timing.result_display);
        }
        self.publish(&inner);
    }

    fn schedule_reset(&self, inner: &mut Inner, delay: Duration) {
        inner.cancel_pending();

        let from = inner.state.step;
        let generation = inner.state.generation;
        let this = self.clone();
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            this.on_reset_due(from, generation).await;
        });

        inner.pending = Some(PendingReset {
            from,
            generation,
            handle,
        });
    }

    async fn on_reset_due(&self, from: Step, generation: u64) {
        let mut inner = self.inner.lock().await;
        if inner.state.step != from || !inner.state.is_current(generation) {
            return;
        }

        // This task is the pending reset, so it is released rather than aborted.
        let _ = inner.pending.take();
        let _ = inner.state.reset_to(Step::Qr);
        debug!("Kiosk reset to scanning after {}", from);
        self.publish(&inner);
    }
}
