// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::{debug, warn};

use crate::api::StatusApi;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Decision {
    Eligible,
    Duplicate { name: Option<String> },
}

/// Stops a student from being marked twice on the same day.
pub(crate) struct DuplicateGuard {
    api: Arc<dyn StatusApi>,
}

impl DuplicateGuard {
    pub(crate) fn new(api: Arc<dyn StatusApi>) -> Self {
        Self { api }
    }

    /// Asks the server whether `roll_no` is already marked today. A failed
    /// query lets the student through.
    pub(crate) async fn check(&self, roll_no: &str) -> Decision {
        match self.api.attendance_status(roll_no).await {
            Ok(status) if status.already_marked => {
                debug!("Roll number {} is already marked today", roll_no);
                Decision::Duplicate { name: status.name }
            }
            Ok(_) => Decision::Eligible,
            Err(e) => {
                warn!("Attendance status for {} is unknown, continuing anyway: {}", roll_no, e);
                Decision::Eligible
            }
        }
    }
}
