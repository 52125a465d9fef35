//! SAM-side session authentication
//!
//! The SAM computes the session MAC over the same exchanges as the card. It
//! issues the terminal challenge, digests every exchange in order, produces
//! the terminal signature and finally checks the card signature.

pub mod calypso_sam;
pub mod commands;

use std::{fmt, sync::Arc};

use bytes::Bytes;
use parking_lot::{Mutex, RawMutex, lock_api::ArcMutexGuard};

pub use calypso_sam::{CalypsoSam, DigestPhase};
pub use commands::{DigestInit, SamCommandRef};

use crate::{Error, Result, transcript::TranscriptEntry};

/// Operations a transaction needs from a SAM, called in this order:
///
/// 1. [`reset`](Self::reset)
/// 2. [`select_diversifier`](Self::select_diversifier), when the card serial is known
/// 3. [`get_challenge`](Self::get_challenge)
/// 4. [`digest_init`](Self::digest_init) with the open session answer
/// 5. [`digest_update`](Self::digest_update) once per exchange
/// 6. [`digest_close`](Self::digest_close)
/// 7. [`digest_authenticate`](Self::digest_authenticate)
pub trait SamAuthenticator: fmt::Debug {
    /// Discard any digest state left by a previous session
    fn reset(&mut self) -> Result<()>;

    /// Diversify the session keys with the card serial number
    fn select_diversifier(&mut self, serial: &[u8]) -> Result<()>;

    /// Obtain the terminal challenge sent in OPEN SECURE SESSION
    fn get_challenge(&mut self, length: u8) -> Result<Bytes>;

    /// Start the digest with the open session answer
    fn digest_init(&mut self, init: &DigestInit) -> Result<()>;

    /// Add one exchange to the digest
    fn digest_update(&mut self, entry: &TranscriptEntry) -> Result<()>;

    /// Finish the digest and return the terminal signature
    fn digest_close(&mut self) -> Result<Bytes>;

    /// Check the card signature; `Ok(false)` means the SAM rejected it
    fn digest_authenticate(&mut self, signature: &[u8]) -> Result<bool>;
}

impl<S: SamAuthenticator + ?Sized> SamAuthenticator for &mut S {
    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn select_diversifier(&mut self, serial: &[u8]) -> Result<()> {
        (**self).select_diversifier(serial)
    }

    fn get_challenge(&mut self, length: u8) -> Result<Bytes> {
        (**self).get_challenge(length)
    }

    fn digest_init(&mut self, init: &DigestInit) -> Result<()> {
        (**self).digest_init(init)
    }

    fn digest_update(&mut self, entry: &TranscriptEntry) -> Result<()> {
        (**self).digest_update(entry)
    }

    fn digest_close(&mut self) -> Result<Bytes> {
        (**self).digest_close()
    }

    fn digest_authenticate(&mut self, signature: &[u8]) -> Result<bool> {
        (**self).digest_authenticate(signature)
    }
}

/// One SAM shared by several readers
///
/// Each session takes a [`SamLease`]; while it is alive no other session can
/// use the SAM.
#[derive(Debug)]
pub struct SharedSam<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSam<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SamAuthenticator> SharedSam<S> {
    /// Share a SAM
    pub fn new(sam: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sam)),
        }
    }

    /// Take the SAM for one session
    ///
    /// Fails with [`Error::SamBusy`] while another lease is alive. The SAM
    /// digest state is reset before the lease is handed out.
    pub fn lease(&self) -> Result<SamLease<S>> {
        let mut guard = self.inner.try_lock_arc().ok_or(Error::SamBusy)?;
        guard.reset()?;
        Ok(SamLease { guard })
    }

    /// Whether a session currently holds the SAM
    pub fn is_leased(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Exclusive access to a shared SAM, released on drop
pub struct SamLease<S> {
    guard: ArcMutexGuard<RawMutex, S>,
}

impl<S: fmt::Debug> fmt::Debug for SamLease<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamLease").field("sam", &*self.guard).finish()
    }
}

impl<S: SamAuthenticator> SamAuthenticator for SamLease<S> {
    fn reset(&mut self) -> Result<()> {
        self.guard.reset()
    }

    fn select_diversifier(&mut self, serial: &[u8]) -> Result<()> {
        self.guard.select_diversifier(serial)
    }

    fn get_challenge(&mut self, length: u8) -> Result<Bytes> {
        self.guard.get_challenge(length)
    }

    fn digest_init(&mut self, init: &DigestInit) -> Result<()> {
        self.guard.digest_init(init)
    }

    fn digest_update(&mut self, entry: &TranscriptEntry) -> Result<()> {
        self.guard.digest_update(entry)
    }

    fn digest_close(&mut self) -> Result<Bytes> {
        self.guard.digest_close()
    }

    fn digest_authenticate(&mut self, signature: &[u8]) -> Result<bool> {
        self.guard.digest_authenticate(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct CountingSam {
        resets: usize,
    }

    impl SamAuthenticator for CountingSam {
        fn reset(&mut self) -> Result<()> {
            self.resets += 1;
            Ok(())
        }

        fn select_diversifier(&mut self, _serial: &[u8]) -> Result<()> {
            Ok(())
        }

        fn get_challenge(&mut self, length: u8) -> Result<Bytes> {
            Ok(Bytes::from(vec![0xC0; usize::from(length)]))
        }

        fn digest_init(&mut self, _init: &DigestInit) -> Result<()> {
            Ok(())
        }

        fn digest_update(&mut self, _entry: &TranscriptEntry) -> Result<()> {
            Ok(())
        }

        fn digest_close(&mut self) -> Result<Bytes> {
            Ok(Bytes::from_static(&[0; 4]))
        }

        fn digest_authenticate(&mut self, _signature: &[u8]) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_lease_is_exclusive() {
        let shared = SharedSam::new(CountingSam::default());
        let other_reader = shared.clone();

        let mut lease = shared.lease().unwrap();
        assert!(other_reader.is_leased());
        assert!(matches!(other_reader.lease(), Err(Error::SamBusy)));
        assert_eq!(lease.get_challenge(4).unwrap().len(), 4);

        drop(lease);
        assert!(!shared.is_leased());
        let lease = other_reader.lease().unwrap();
        assert_eq!(lease.guard.resets, 2);
    }

    #[test]
    fn test_lease_across_threads() {
        let shared = SharedSam::new(CountingSam::default());
        let lease = shared.lease().unwrap();

        let other_reader = shared.clone();
        let busy = std::thread::spawn(move || matches!(other_reader.lease(), Err(Error::SamBusy)))
            .join()
            .unwrap();
        assert!(busy);
        drop(lease);
    }
}
