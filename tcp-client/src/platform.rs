//! Process-wide networking subsystem lifecycle.
//!
//! Some platforms (Winsock) refuse socket calls until a one-time startup
//! routine has run.  [`ensure_initialized`] performs that startup lazily on
//! first use and arranges for the matching teardown at process exit.  After a
//! successful startup every further call is a single atomic load.  A failed
//! startup is not remembered, so the next call tries again.

use std::sync::{Mutex, OnceLock, PoisonError};

use crate::error::{ClientError, Result};
use crate::sys;

static READY: OnceLock<()> = OnceLock::new();
static STARTUP_LOCK: Mutex<()> = Mutex::new(());

/// Start the networking subsystem if this process has not done so yet.
pub fn ensure_initialized() -> Result<()> {
    if READY.get().is_some() {
        return Ok(());
    }

    let _guard = STARTUP_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if READY.get().is_some() {
        return Ok(());
    }

    sys::startup().map_err(ClientError::PlatformInit)?;
    let _ = READY.set(());
    log::debug!("[platform] networking subsystem ready");
    Ok(())
}

/// Whether [`ensure_initialized`] has succeeded in this process.
pub fn is_initialized() -> bool {
    READY.get().is_some()
}
