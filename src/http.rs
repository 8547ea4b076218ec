// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io::Write as _, path::PathBuf, time::Duration};

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use tokio::task;
use url::Url;
use uuid::Uuid;

use crate::{
    api::{
        AdminApi, AttendanceStatus, AuthRequest, AuthResponse, FaceVerifier, MarkResponse,
        MessageResponse, PinChangeRequest, StatusApi, ValidateResponse, VerificationResult,
    },
    error::{self, Result},
    metadata,
};

const DEFAULT_REJECTION: &str = "Invalid PIN";

/// A response the server actually sent, whatever its status.
struct Answer {
    status: u16,
    body: String,
}

impl Answer {
    const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Server-side failures mean the server cannot answer the question, which
    /// we treat the same as not reaching it.
    const fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Parses the body, tolerating servers that send an empty or non-JSON
    /// error page alongside a meaningful status code.
    fn json<T: DeserializeOwned + Default>(&self) -> T {
        serde_json::from_str(&self.body).unwrap_or_else(|e| {
            debug!("Ignoring unparseable response body: {}", e);
            T::default()
        })
    }
}

/// Runs a blocking request off the async runtime. Error statuses come back as
/// answers; only failing to talk to the server at all is an error.
async fn send<F>(request: F) -> Result<Answer, String>
where
    F: FnOnce() -> Result<ureq::Response, ureq::Error> + Send + 'static,
{
    let answer = task::spawn_blocking(move || {
        let response = match request() {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(e)) => return Err(e.to_string()),
        };

        let status = response.status();
        let body = response.into_string().unwrap_or_else(|e| {
            debug!("Could not read response body: {}", e);
            String::new()
        });
        Ok(Answer { status, body })
    })
    .await;

    answer.map_err(|e| e.to_string())?
}

/// The attendance server, reached over HTTP.
pub(crate) struct Backend {
    agent: ureq::Agent,
    base: Url,
    capture_file: Option<PathBuf>,
}

impl Backend {
    pub(crate) fn new(base: Url, timeout: Duration, capture_file: Option<PathBuf>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();

        Self {
            agent,
            base: with_trailing_slash(base),
            capture_file,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn auth_endpoint(&self, path: &str) -> Result<Url, error::Auth> {
        self.endpoint(path)
            .map_err(|e| error::Auth::Unreachable(e.to_string()))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn unreachable_status(answer: &Answer) -> error::Auth {
    error::Auth::Unreachable(format!("server answered with HTTP status {}", answer.status))
}

/// Encodes the roll number and the snapshot as `multipart/form-data`.
fn multipart_body(boundary: &str, roll_no: &str, image: &[u8]) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(image.len() + 512);
    write!(
        body,
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"roll_no\"\r\n\r\n\
         {roll_no}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"{roll_no}.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n"
    )?;
    body.extend_from_slice(image);
    write!(body, "\r\n--{boundary}--\r\n")?;
    Ok(body)
}

#[async_trait]
impl AdminApi for Backend {
    async fn authenticate(&self, pin: &str) -> Result<String, error::Auth> {
        let request = self.agent.post(self.auth_endpoint("admin/auth/")?.as_str());
        let payload = AuthRequest {
            pin: pin.to_owned(),
        };
        let answer = send(move || request.send_json(payload))
            .await
            .map_err(error::Auth::Unreachable)?;

        if answer.is_server_error() {
            return Err(unreachable_status(&answer));
        }

        let body: AuthResponse = answer.json();
        match (answer.is_success(), body.token) {
            (true, Some(token)) => Ok(token),
            _ => Err(error::Auth::Rejected(
                body.error.unwrap_or_else(|| DEFAULT_REJECTION.to_owned()),
            )),
        }
    }

    async fn validate(&self, token: &str) -> Result<bool, error::Auth> {
        let request = self
            .agent
            .get(self.auth_endpoint("admin/auth/validate/")?.as_str())
            .set(metadata::ADMIN_TOKEN_HEADER, token);
        let answer = send(move || request.call())
            .await
            .map_err(error::Auth::Unreachable)?;

        if answer.is_server_error() {
            return Err(unreachable_status(&answer));
        }

        let body: ValidateResponse = answer.json();
        Ok(answer.is_success() && body.valid)
    }

    async fn change_pin(&self, current_pin: &str, new_pin: &str) -> Result<String, error::Auth> {
        let request = self.agent.post(self.auth_endpoint("admin/pin/")?.as_str());
        let payload = PinChangeRequest {
            current_pin: current_pin.to_owned(),
            pin: new_pin.to_owned(),
        };
        let answer = send(move || request.send_json(payload))
            .await
            .map_err(error::Auth::Unreachable)?;

        if answer.is_server_error() {
            return Err(unreachable_status(&answer));
        }

        let body: MessageResponse = answer.json();
        if answer.is_success() {
            Ok(body.message.unwrap_or_else(|| "PIN updated".to_owned()))
        } else {
            Err(error::Auth::Rejected(
                body.error
                    .unwrap_or_else(|| "Current PIN incorrect".to_owned()),
            ))
        }
    }
}

#[async_trait]
impl StatusApi for Backend {
    async fn attendance_status(&self, roll_no: &str) -> Result<AttendanceStatus> {
        let mut url = self.endpoint("attendanceStatus/")?;
        let _ = url.query_pairs_mut().append_pair("roll_no", roll_no);

        let request = self.agent.get(url.as_str());
        let answer = send(move || request.call())
            .await
            .map_err(error::Error::Transport)?;

        if answer.is_server_error() {
            return Err(error::Error::Status(answer.status));
        }
        if !answer.is_success() {
            debug!("Attendance status for {} answered with {}", roll_no, answer.status);
        }

        Ok(answer.json())
    }
}

#[async_trait]
impl FaceVerifier for Backend {
    async fn verify(&self, roll_no: &str) -> Result<VerificationResult> {
        let path = self.capture_file.as_ref().ok_or_else(|| {
            warn!("No capture file is configured, so faces cannot be verified");
            error::Error::NoCaptureFile
        })?;
        let image = tokio::fs::read(path).await?;

        let boundary = format!("rollgate-{}", Uuid::new_v4().simple());
        let body = multipart_body(&boundary, roll_no, &image)?;
        let request = self
            .agent
            .post(self.endpoint("markAttendance/")?.as_str())
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            );
        let answer = send(move || request.send_bytes(&body))
            .await
            .map_err(error::Error::Transport)?;

        let body: MarkResponse = answer.json();
        Ok(VerificationResult::from_response(
            roll_no,
            answer.is_success(),
            body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = with_trailing_slash(Url::parse("http://127.0.0.1:8000/api").unwrap());
        assert_eq!(
            base.join("admin/auth/").unwrap().as_str(),
            "http://127.0.0.1:8000/api/admin/auth/"
        );
    }

    #[test]
    fn base_url_with_slash_is_unchanged() {
        let base = with_trailing_slash(Url::parse("http://kiosk.local/api/").unwrap());
        assert_eq!(base.as_str(), "http://kiosk.local/api/");
    }

    #[test]
    fn multipart_body_carries_both_fields() {
        let body = multipart_body("b0undary", "S100", b"\xff\xd8jpeg").unwrap();
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--b0undary\r\nContent-Disposition: form-data; name=\"roll_no\"\r\n\r\nS100\r\n"));
        assert!(text.contains("name=\"image\"; filename=\"S100.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(text.ends_with("jpeg\r\n--b0undary--\r\n"));
    }

    #[test]
    fn answers_are_classified_by_status() {
        let rejected = Answer {
            status: 401,
            body: r#"{"error": "Invalid PIN"}"#.to_owned(),
        };
        assert!(!rejected.is_success());
        assert!(!rejected.is_server_error());
        assert_eq!(
            rejected.json::<AuthResponse>().error.as_deref(),
            Some("Invalid PIN")
        );

        let broken = Answer {
            status: 502,
            body: "<html>Bad Gateway</html>".to_owned(),
        };
        assert!(broken.is_server_error());
        assert!(broken.json::<AuthResponse>().token.is_none());
    }

    #[tokio::test]
    async fn unreachable_server_is_classified_as_unreachable() {
        // Port 9 (discard) on localhost is closed in test environments.
        let backend = Backend::new(
            Url::parse("http://127.0.0.1:9/api/").unwrap(),
            Duration::from_secs(2),
            None,
        );

        let err = backend.authenticate("12345").await.unwrap_err();
        assert!(err.is_unreachable());
        assert!(backend.validate("tok").await.unwrap_err().is_unreachable());
        assert!(matches!(
            backend.attendance_status("S100").await,
            Err(error::Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn missing_capture_file_fails_verification() {
        let backend = Backend::new(
            Url::parse("http://127.0.0.1:9/api/").unwrap(),
            Duration::from_secs(2),
            None,
        );
        assert!(matches!(
            backend.verify("S100").await,
            Err(error::Error::NoCaptureFile)
        ));
    }
}
