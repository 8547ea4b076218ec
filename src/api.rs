// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

#[derive(Debug, Serialize)]
pub(crate) struct AuthRequest {
    pub(crate) pin: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthResponse {
    pub(crate) token: Option<String>,
    pub(crate) error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ValidateResponse {
    #[serde(default)]
    pub(crate) valid: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PinChangeRequest {
    pub(crate) current_pin: String,
    pub(crate) pin: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MessageResponse {
    pub(crate) message: Option<String>,
    pub(crate) error: Option<String>,
}

/// Today's attendance state for one student, as reported by the server.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub(crate) struct AttendanceStatus {
    #[serde(rename = "alreadyMarked", default)]
    pub(crate) already_marked: bool,
    pub(crate) roll_no: Option<String>,
    pub(crate) name: Option<String>,
    #[serde(rename = "class")]
    pub(crate) class_group: Option<String>,
    pub(crate) batch: Option<String>,
    pub(crate) department: Option<String>,
    pub(crate) time: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) error: Option<String>,
}

/// Body returned by the attendance-marking endpoint, successful or not.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct MarkResponse {
    pub(crate) message: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) roll_no: Option<String>,
    #[serde(rename = "class")]
    pub(crate) class_group: Option<String>,
    pub(crate) batch: Option<String>,
    pub(crate) department: Option<String>,
    pub(crate) time: Option<String>,
    pub(crate) status: Option<String>,
    pub(crate) error: Option<String>,
}

/// Outcome of the face step for one roll number.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct VerificationResult {
    pub(crate) success: bool,
    pub(crate) roll_no: String,
    pub(crate) name: Option<String>,
    pub(crate) class_group: Option<String>,
    pub(crate) batch: Option<String>,
    pub(crate) department: Option<String>,
    pub(crate) time: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) error: bool,
}

impl VerificationResult {
    /// A result for a verifier that could not produce an answer at all.
    pub(crate) fn failed(roll_no: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            roll_no: roll_no.to_owned(),
            message: Some(message.into()),
            error: true,
            ..Self::default()
        }
    }

    pub(crate) fn from_response(roll_no: &str, success: bool, response: MarkResponse) -> Self {
        let message = if success {
            response.message
        } else {
            response.error.or(response.message)
        };

        Self {
            success,
            roll_no: response.roll_no.unwrap_or_else(|| roll_no.to_owned()),
            name: response.name,
            class_group: response.class_group,
            batch: response.batch,
            department: response.department,
            time: response.time,
            message,
            error: !success,
        }
    }
}

/// The admin endpoints of the attendance server.
#[async_trait]
pub(crate) trait AdminApi: Send + Sync {
    /// Exchanges a PIN for an admin token.
    async fn authenticate(&self, pin: &str) -> Result<String, error::Auth>;

    async fn validate(&self, token: &str) -> Result<bool, error::Auth>;

    /// Replaces the server-side PIN, returning the server's confirmation.
    async fn change_pin(&self, current_pin: &str, new_pin: &str) -> Result<String, error::Auth>;
}

#[async_trait]
pub(crate) trait StatusApi: Send + Sync {
    async fn attendance_status(&self, roll_no: &str) -> Result<AttendanceStatus>;
}

#[async_trait]
pub(crate) trait FaceVerifier: Send + Sync {
    async fn verify(&self, roll_no: &str) -> Result<VerificationResult>;
}
