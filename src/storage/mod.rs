// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod file;
mod memory;

use crate::error::Result;

pub(crate) use file::File;
pub(crate) use memory::Memory;

pub(crate) trait IsPersistent {
    fn is_persistent(&self) -> bool;
}

impl<T: IsPersistent + ?Sized> IsPersistent for Box<T> {
    fn is_persistent(&self) -> bool {
        (**self).is_persistent()
    }
}

/// A single-slot store for a serializable value.
///
/// Operations are synchronous: callers sit on the kiosk's interactive path and
/// the data involved is a handful of bytes.
pub(crate) trait Storage<T>: Send + Sync + IsPersistent {
    fn get(&self) -> Result<Option<T>>;
    fn update(&self, data: &T) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

impl<Tn, T: Storage<Tn> + ?Sized> Storage<Tn> for Box<T> {
    fn get(&self) -> Result<Option<Tn>> {
        (**self).get()
    }

    fn update(&self, data: &Tn) -> Result<()> {
        (**self).update(data)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}
