//! Subprocess helpers shared by the status-line runner and the diff loader.

#[cfg(unix)]
use std::io;

/// Kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned `tokio::process::Child` right after `spawn()` so it is
/// cleaned up if the owning future is cancelled or times out. Call
/// [`ChildGuard::disarm`] once the process has exited normally.
pub(crate) struct ChildGuard {
    child: tokio::process::Child,
    armed: bool,
}

impl ChildGuard {
    pub(crate) fn new(child: tokio::process::Child) -> Self {
        Self { child, armed: true }
    }

    pub(crate) fn child_mut(&mut self) -> &mut tokio::process::Child {
        &mut self.child
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: killpg has no memory-safety preconditions; the pid
                // is the group leader because of set_new_session.
                let killed = unsafe { libc::killpg(pid as i32, libc::SIGKILL) } == 0;
                if !killed {
                    let _ = self.child.start_kill();
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }
        let _ = self.child.try_wait();
    }
}

/// Puts the child in its own session so `ChildGuard` can kill the whole
/// process group.
#[cfg(unix)]
pub(crate) fn set_new_session(cmd: &mut tokio::process::Command) {
    // SAFETY: the closure only calls async-signal-safe libc functions.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            // Linux only: the child dies with tern.
            #[cfg(target_os = "linux")]
            {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                    return Err(io::Error::last_os_error());
                }
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn set_new_session(_cmd: &mut tokio::process::Command) {}
