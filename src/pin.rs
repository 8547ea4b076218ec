// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{ffi::OsString, path::Path};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::task;

use crate::{
    auth,
    error::{self, Result},
    metadata,
};

/// The digits typed on the kiosk keypad so far.
#[derive(Default)]
pub(crate) struct PinBuffer {
    digits: String,
}

impl PinBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a digit. Non-digits and digits past the PIN length are dropped.
    pub(crate) fn push(&mut self, c: char) -> bool {
        if c.is_ascii_digit() && self.digits.len() < metadata::PIN_LENGTH {
            self.digits.push(c);
            true
        } else {
            false
        }
    }

    pub(crate) fn backspace(&mut self) {
        let _ = self.digits.pop();
    }

    pub(crate) fn clear(&mut self) {
        self.digits.clear();
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.digits
    }

    pub(crate) fn len(&self) -> usize {
        self.digits.len()
    }

    /// One filled dot per entered digit, one hollow dot per remaining slot.
    pub(crate) fn masked(&self) -> String {
        let entered = self.digits.len();
        "•".repeat(entered) + &"○".repeat(metadata::PIN_LENGTH - entered)
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Request {
    description: Option<String>,
    error: Option<String>,
}

pub(crate) struct RequestBuilder {
    description: Option<String>,
    error: Option<String>,
}

impl RequestBuilder {
    pub(crate) const fn new() -> Self {
        Self {
            description: None,
            error: None,
        }
    }

    pub(crate) fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_owned());
        self
    }

    pub(crate) fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_owned());
        self
    }

    pub(crate) fn into_request(self) -> Request {
        Request {
            description: self.description,
            error: self.error,
        }
    }
}

#[async_trait]
pub(crate) trait Prompt: Send + Sync {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>>;
}

#[async_trait]
impl<T: Prompt + ?Sized> Prompt for Box<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        (**self).prompt(req).await
    }
}

#[async_trait]
impl<T: Prompt> Prompt for Vec<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        for candidate in self {
            if let r @ (Ok(Some(_)) | Err(_)) = candidate.prompt(req.clone()).await {
                return r;
            }
        }

        Ok(None)
    }
}

pub(crate) struct PinentryPrompt {
    executable: Option<OsString>,
}

impl PinentryPrompt {
    pub(crate) const fn new() -> Self {
        Self { executable: None }
    }

    pub(crate) fn new_with_executable<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: Some(executable.as_ref().as_os_str().into()),
        }
    }
}

#[async_trait]
impl Prompt for PinentryPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        fn interact<'input>(
            mut input: pinentry::PassphraseInput<'input>,
            title: &'input str,
            req: &'input Request,
        ) -> Result<SecretString> {
            _ = input.required("A 5-digit admin PIN is required to continue.");
            _ = input.with_title(title);
            _ = input.with_prompt("PIN");
            if let Some(description) = req.description.as_ref() {
                _ = input.with_description(description);
            }
            if let Some(e) = req.error.as_ref() {
                _ = input.with_error(e);
            }

            Ok(input.interact()?)
        }

        let title = format!("Admin PIN - {}", *metadata::CLIENT_DISPLAY_NAME);

        let input = self
            .executable
            .as_ref()
            .and_then(pinentry::PassphraseInput::with_binary)
            .or_else(pinentry::PassphraseInput::with_default_binary)
            .map(|input| task::spawn_blocking(move || interact(input, &title, &req)));

        Ok(match input {
            Some(fut) => Some(fut.await??),
            None => None,
        })
    }
}

pub(crate) struct RpasswordPrompt;

#[async_trait]
impl Prompt for RpasswordPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        if let Some(error) = req.error {
            eprintln!("Error: {error}");
        }
        let label = req
            .description
            .map_or_else(|| "PIN: ".to_owned(), |description| format!("{description}: "));

        Ok(Some(
            task::spawn_blocking(move || rpassword::prompt_password(label).map(SecretString::new))
                .await??,
        ))
    }
}

/// Prompts until a PIN with the right shape is entered, or the prompt gives up.
pub(crate) async fn read_pin(prompt: &dyn Prompt, description: &str) -> Result<Option<SecretString>> {
    let mut last_error: Option<String> = None;
    loop {
        let mut builder = RequestBuilder::new().with_description(description);
        if let Some(e) = last_error.as_deref() {
            builder = builder.with_error(e);
        }

        match prompt.prompt(builder.into_request()).await? {
            Some(pin) if auth::check_format(pin.expose_secret()).is_ok() => return Ok(Some(pin)),
            Some(_) => last_error = Some(error::Auth::InvalidFormat.to_string()),
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn buffer_caps_at_pin_length() {
        let mut buffer = PinBuffer::new();
        for c in "1234567".chars() {
            let _ = buffer.push(c);
        }
        assert_eq!(buffer.as_str(), "12345");
        assert!(!buffer.push('8'));
    }

    #[test]
    fn buffer_ignores_non_digits() {
        let mut buffer = PinBuffer::new();
        assert!(!buffer.push('a'));
        assert!(buffer.push('0'));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn buffer_masks_entered_digits() {
        let mut buffer = PinBuffer::new();
        let _ = buffer.push('4');
        let _ = buffer.push('2');
        assert_eq!(buffer.masked(), "••○○○");

        buffer.backspace();
        assert_eq!(buffer.masked(), "•○○○○");

        buffer.clear();
        assert_eq!(buffer.masked(), "○○○○○");
        buffer.backspace();
        assert_eq!(buffer.len(), 0);
    }

    struct Scripted {
        answers: Mutex<Vec<Option<&'static str>>>,
        errors_seen: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Prompt for Scripted {
        async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
            self.errors_seen.lock().unwrap().push(req.error);
            let answer = self.answers.lock().unwrap().remove(0);
            Ok(answer.map(|a| SecretString::new(a.to_owned())))
        }
    }

    #[tokio::test]
    async fn read_pin_reprompts_on_bad_format() {
        let prompt = Scripted {
            answers: Mutex::new(vec![Some("12"), Some("54321")]),
            errors_seen: Mutex::new(Vec::new()),
        };

        let pin = read_pin(&prompt, "Current PIN").await.unwrap().unwrap();
        assert_eq!(pin.expose_secret(), "54321");

        let errors = prompt.errors_seen.lock().unwrap().clone();
        assert_eq!(errors[0], None);
        assert_eq!(errors[1].as_deref(), Some("Enter a 5-digit numeric code"));
    }

    #[tokio::test]
    async fn read_pin_stops_when_prompt_gives_up() {
        let prompt = Scripted {
            answers: Mutex::new(vec![None]),
            errors_seen: Mutex::new(Vec::new()),
        };
        assert!(read_pin(&prompt, "PIN").await.unwrap().is_none());
    }
}
