//! Scheduling priority elevation for the timing-critical section of an
//! exchange.
//!
//! The boost is best-effort: when the platform refuses it (missing
//! privileges) or offers no priority control at all, decoding still works
//! but is more exposed to preemption jitter.

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
mod os_priority {
    use std::io;
    use std::mem;

    use tracing::{debug, warn};

    // The caller's original policy and parameters.
    pub(crate) struct Saved {
        policy: libc::c_int,
        param: libc::sched_param,
    }

    pub(crate) fn elevate() -> Option<Saved> {
        // SAFETY: `pthread_self` has no preconditions.
        let thread = unsafe { libc::pthread_self() };

        let mut policy = 0;
        // SAFETY: `sched_param` is a plain C struct, all zeroes is a valid
        // value.
        let mut param: libc::sched_param = unsafe { mem::zeroed() };

        // SAFETY: `thread` is the calling thread and both out-pointers are
        // valid for writes.
        let ret = unsafe { libc::pthread_getschedparam(thread, &mut policy, &mut param) };
        if ret != 0 {
            warn!(
                "Unable to query the scheduling policy: {}",
                io::Error::from_raw_os_error(ret)
            );
            return None;
        }

        // SAFETY: `sched_get_priority_max` has no preconditions.
        let max = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
        if max < 0 {
            warn!("Real-time scheduling is not available.");
            return None;
        }

        let mut elevated = param;
        elevated.sched_priority = max;

        // SAFETY: `thread` is the calling thread and `elevated` is a valid
        // parameter for `SCHED_FIFO`.
        let ret = unsafe { libc::pthread_setschedparam(thread, libc::SCHED_FIFO, &elevated) };
        if ret != 0 {
            warn!(
                "Unable to raise the acquisition thread priority, \
                 decoding may suffer from jitter: {}",
                io::Error::from_raw_os_error(ret)
            );
            return None;
        }

        debug!("Acquisition thread running with SCHED_FIFO priority {max}.");
        Some(Saved { policy, param })
    }

    pub(crate) fn restore(saved: &Saved) {
        // SAFETY: `pthread_self` has no preconditions; `saved` holds the
        // values previously returned by `pthread_getschedparam`.
        let ret = unsafe {
            libc::pthread_setschedparam(libc::pthread_self(), saved.policy, &saved.param)
        };
        if ret != 0 {
            warn!(
                "Unable to restore the thread priority: {}",
                io::Error::from_raw_os_error(ret)
            );
        }
    }
}

#[cfg(target_os = "windows")]
#[allow(unsafe_code)]
mod os_priority {
    use tracing::warn;

    use windows_sys::Win32::System::Threading::{
        GetCurrentThread, GetThreadPriority, SetThreadPriority, THREAD_PRIORITY_ERROR_RETURN,
        THREAD_PRIORITY_TIME_CRITICAL,
    };

    pub(crate) struct Saved {
        priority: i32,
    }

    pub(crate) fn elevate() -> Option<Saved> {
        // SAFETY: `GetCurrentThread` returns a pseudo handle that is always
        // valid for the calling thread.
        let thread = unsafe { GetCurrentThread() };

        // SAFETY: `thread` is a valid thread handle.
        let priority = unsafe { GetThreadPriority(thread) };
        if priority == THREAD_PRIORITY_ERROR_RETURN as i32 {
            warn!("Unable to query the thread priority.");
            return None;
        }

        // SAFETY: `thread` is a valid thread handle.
        if unsafe { SetThreadPriority(thread, THREAD_PRIORITY_TIME_CRITICAL) } == 0 {
            warn!("Unable to raise the acquisition thread priority.");
            return None;
        }

        Some(Saved { priority })
    }

    pub(crate) fn restore(saved: &Saved) {
        // SAFETY: pseudo handle of the calling thread, priority previously
        // returned by `GetThreadPriority`.
        if unsafe { SetThreadPriority(GetCurrentThread(), saved.priority) } == 0 {
            warn!("Unable to restore the thread priority.");
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
mod os_priority {
    pub(crate) enum Saved {}

    pub(crate) fn elevate() -> Option<Saved> {
        tracing::debug!("No scheduling priority control on this platform.");
        None
    }

    pub(crate) fn restore(saved: &Saved) {
        match *saved {}
    }
}

/// Restores the previous scheduling priority of the current thread when
/// dropped.
///
/// Must be dropped on the thread that created it.
#[must_use = "the priority is restored as soon as the guard is dropped"]
pub struct PriorityGuard {
    saved: Option<os_priority::Saved>,
}

impl PriorityGuard {
    /// Returns `true` if the priority was actually raised.
    #[must_use]
    pub const fn is_elevated(&self) -> bool {
        self.saved.is_some()
    }
}

impl Drop for PriorityGuard {
    fn drop(&mut self) {
        if let Some(saved) = &self.saved {
            os_priority::restore(saved);
        }
    }
}

/// Raises the current thread to the highest available scheduling priority
/// until the returned guard is dropped.
///
/// Failures are logged and yield a guard that does nothing.
pub fn elevate() -> PriorityGuard {
    PriorityGuard {
        saved: os_priority::elevate(),
    }
}
