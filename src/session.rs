// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::{
    atomic::{AtomicBool, Ordering},
    RwLock,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{self, Result},
    metadata,
    storage::Storage,
};

/// The part of the admin session that survives restarts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Data {
    admin_token: Option<String>,
    #[serde(default = "default_local_pin")]
    local_pin: String,
}

fn default_local_pin() -> String {
    metadata::DEFAULT_LOCAL_PIN.to_owned()
}

impl Default for Data {
    fn default() -> Self {
        Self {
            admin_token: None,
            local_pin: default_local_pin(),
        }
    }
}

/// Admin session state shared by the kiosk and the privileged views.
///
/// The token and local PIN are written through to the backing storage. The
/// fast-path flag is held only in memory, so it lasts exactly as long as this
/// process.
pub(crate) struct SessionStore {
    durable: Box<dyn Storage<Data>>,
    cache: RwLock<Data>,
    fast_path: AtomicBool,
}

impl SessionStore {
    pub(crate) fn open(durable: Box<dyn Storage<Data>>) -> Result<Self> {
        let data = durable.get()?.unwrap_or_default();
        debug!(
            "Opened {} session store (token present: {})",
            if durable.is_persistent() {
                "durable"
            } else {
                "in-memory"
            },
            data.admin_token.is_some()
        );

        Ok(Self {
            durable,
            cache: RwLock::new(data),
            fast_path: AtomicBool::new(false),
        })
    }

    pub(crate) fn admin_token(&self) -> Option<String> {
        self.read(|data| data.admin_token.clone())
    }

    pub(crate) fn set_admin_token(&self, token: &str) -> Result<()> {
        self.write(|data| data.admin_token = Some(token.to_owned()))
    }

    /// Drops the token and the fast-path flag together. The local PIN is a
    /// device setting rather than part of the login, so it stays.
    pub(crate) fn clear_session(&self) -> Result<()> {
        self.fast_path.store(false, Ordering::SeqCst);

        let mut guard = self.cache.write().map_err(|_| error::Storage::Poisoned)?;
        guard.admin_token = None;
        if *guard == Data::default() {
            self.durable.clear()
        } else {
            self.durable.update(&guard)
        }
    }

    pub(crate) fn is_fast_path_active(&self) -> bool {
        self.fast_path.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_fast_path_active(&self) {
        self.fast_path.store(true, Ordering::SeqCst);
    }

    pub(crate) fn local_pin(&self) -> String {
        self.read(|data| data.local_pin.clone())
    }

    pub(crate) fn set_local_pin(&self, pin: &str) -> Result<()> {
        self.write(|data| data.local_pin = pin.to_owned())
    }

    fn read<R>(&self, f: impl FnOnce(&Data) -> R) -> R {
        match self.cache.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write(&self, f: impl FnOnce(&mut Data)) -> Result<()> {
        let mut guard = self.cache.write().map_err(|_| error::Storage::Poisoned)?;
        f(&mut guard);
        self.durable.update(&guard)
    }
}
