// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::{select, sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{auth::Authenticator, error::Result};

/// What a protected view may show.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum GuardView {
    /// Access is being checked. Nothing protected may be shown yet.
    Checking,
    Granted,
    /// The visitor is sent back to the kiosk.
    Redirected,
}

/// Sits in front of the admin area.
pub(crate) struct RouteGuard {
    auth: Arc<Authenticator>,
}

impl RouteGuard {
    pub(crate) fn new(auth: Arc<Authenticator>) -> Self {
        Self { auth }
    }

    /// Starts checking access for a newly shown protected view.
    pub(crate) fn mount(&self) -> Mount {
        let session = self.auth.session();
        if session.is_fast_path_active() {
            debug!("Admin fast path is active");
            return Mount::settled_as(GuardView::Granted);
        }

        let Some(token) = session.admin_token() else {
            debug!("No admin token is stored");
            return Mount::settled_as(GuardView::Redirected);
        };

        let (tx, rx) = watch::channel(GuardView::Checking);
        let cancel = CancellationToken::new();

        let auth = Arc::clone(&self.auth);
        let cancel_clone = cancel.clone();
        let task = tokio::spawn(async move {
            let validated = select! {
                biased;
                () = cancel_clone.cancelled() => return,
                r = auth.validate(&token) => r,
            };
            if cancel_clone.is_cancelled() {
                return;
            }

            let view = match validated {
                Ok(true) => GuardView::Granted,
                Ok(false) => {
                    info!("The stored admin token is no longer valid");
                    GuardView::Redirected
                }
                Err(e) => {
                    warn!("Could not validate the stored admin token: {}", e);
                    GuardView::Redirected
                }
            };
            let _ = tx.send(view);
        });

        Mount {
            view: rx,
            cancel,
            task: Some(task),
        }
    }
}

/// A protected view that is currently shown. Dropping it discards any
/// validation still in flight.
pub(crate) struct Mount {
    view: watch::Receiver<GuardView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Mount {
    fn settled_as(view: GuardView) -> Self {
        let (_, rx) = watch::channel(view);
        Self {
            view: rx,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub(crate) fn view(&self) -> GuardView {
        *self.view.borrow()
    }

    /// Waits until access is either granted or refused.
    pub(crate) async fn settled(&mut self) -> Result<GuardView> {
        if self.task.is_none() {
            return Ok(self.view());
        }

        let view = *self
            .view
            .wait_for(|view| *view != GuardView::Checking)
            .await?;
        Ok(view)
    }

    pub(crate) fn unmount(self) {}
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        api::AdminApi,
        auth::tests::{memory_session, FakeAdmin},
        error,
        session::SessionStore,
    };

    fn guard_for(api: Arc<dyn AdminApi>) -> (RouteGuard, Arc<SessionStore>) {
        let session = memory_session();
        let auth = Arc::new(Authenticator::new(api, Arc::clone(&session)));
        (RouteGuard::new(auth), session)
    }

    #[tokio::test]
    async fn fast_path_grants_without_validation() {
        let api = Arc::new(FakeAdmin::with_pin("24680"));
        let (guard, session) = guard_for(Arc::clone(&api) as Arc<dyn AdminApi>);
        session.mark_fast_path_active();

        let mount = guard.mount();
        assert_eq!(mount.view(), GuardView::Granted);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_token_redirects() {
        let api = Arc::new(FakeAdmin::with_pin("24680"));
        let (guard, _) = guard_for(Arc::clone(&api) as Arc<dyn AdminApi>);

        let mut mount = guard.mount();
        assert_eq!(mount.settled().await.unwrap(), GuardView::Redirected);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn valid_token_is_checked_exactly_once() {
        let api = Arc::new(FakeAdmin::with_pin("24680"));
        let (guard, session) = guard_for(Arc::clone(&api) as Arc<dyn AdminApi>);
        session.set_admin_token("server-token").unwrap();

        let mut mount = guard.mount();
        assert_eq!(mount.view(), GuardView::Checking);
        assert_eq!(mount.settled().await.unwrap(), GuardView::Granted);
        assert_eq!(api.calls(), vec!["validate server-token".to_owned()]);
        // A server-validated token does not turn on the fast path.
        assert!(!session.is_fast_path_active());
    }

    #[tokio::test]
    async fn invalid_token_redirects() {
        let api = Arc::new(FakeAdmin::with_pin("24680"));
        let (guard, session) = guard_for(api);
        session.set_admin_token("expired").unwrap();

        let mut mount = guard.mount();
        assert_eq!(mount.settled().await.unwrap(), GuardView::Redirected);
    }

    #[tokio::test]
    async fn validation_error_redirects() {
        let (guard, session) = guard_for(Arc::new(FakeAdmin::unreachable()));
        session.set_admin_token("server-token").unwrap();

        let mut mount = guard.mount();
        assert_eq!(mount.settled().await.unwrap(), GuardView::Redirected);
    }

    /// Validates every token, but only after a long pause.
    struct SlowValidator;

    #[async_trait]
    impl AdminApi for SlowValidator {
        async fn authenticate(&self, _pin: &str) -> Result<String, error::Auth> {
            Err(error::Auth::Unreachable("not used".to_owned()))
        }

        async fn validate(&self, _token: &str) -> Result<bool, error::Auth> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        }

        async fn change_pin(&self, _current_pin: &str, _new_pin: &str) -> Result<String, error::Auth> {
            Err(error::Auth::Unreachable("not used".to_owned()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_after_unmount_is_dropped() {
        let (guard, session) = guard_for(Arc::new(SlowValidator));
        session.set_admin_token("server-token").unwrap();

        let mount = guard.mount();
        let observer = mount.view.clone();
        tokio::time::sleep(Duration::from_secs(1)).await;
        mount.unmount();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(*observer.borrow(), GuardView::Checking);
    }

    #[tokio::test(start_paused = true)]
    async fn each_mount_validates_again() {
        let api = Arc::new(FakeAdmin::with_pin("24680"));
        let (guard, session) = guard_for(Arc::clone(&api) as Arc<dyn AdminApi>);
        session.set_admin_token("server-token").unwrap();

        for _ in 0..3 {
            let mut mount = guard.mount();
            assert_eq!(mount.settled().await.unwrap(), GuardView::Granted);
        }
        assert_eq!(api.calls().len(), 3);
    }
}
