// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use directories::ProjectDirs;
use inflector::Inflector;
use once_cell::sync::Lazy;

pub(crate) static CLIENT_NAME: Lazy<String> =
    Lazy::new(|| option_env!("CARGO_PKG_NAME").unwrap_or("rollgate").to_owned());
pub(crate) static CLIENT_DISPLAY_NAME: Lazy<String> = Lazy::new(|| CLIENT_NAME.to_title_case());

pub(crate) static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("com", "NoahFontes", &CLIENT_DISPLAY_NAME));

/// The fallback PIN used when the server cannot be reached and no PIN has
/// been stored locally yet.
pub(crate) const DEFAULT_LOCAL_PIN: &str = "12345";

pub(crate) const PIN_LENGTH: usize = 5;

/// Header carrying the admin token on validation requests.
pub(crate) const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";
