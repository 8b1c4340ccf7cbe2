//! Host terminal control.
//!
//! Guest programs poll the keyboard one character at a time, so stdin is
//! switched out of canonical mode with echo off for the duration of a run.
//! Signal generation (`ISIG`) is left on: Ctrl-C still raises SIGINT,
//! which [`install_interrupt_handler`] turns into a terminal restore and
//! an exit with status -2.

use std::io::{self, Write};
use std::mem;
use std::os::unix::io::RawFd;

use anyhow::Context;
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

const STDIN_FD: RawFd = libc::STDIN_FILENO;

/// Exit status after an interrupt from the keyboard.
pub const INTERRUPT_EXIT_CODE: i32 = -2;

/// Whether a read from stdin would return without blocking.
///
/// Hangup counts as ready so the following read observes end of input.
pub fn stdin_ready() -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd: STDIN_FD,
        events: libc::POLLIN,
        revents: 0,
    };
    let n = unsafe { libc::poll(&mut pfd, 1, 0) };
    if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(pfd.revents & (libc::POLLIN | libc::POLLHUP) != 0)
}

/// Restores the saved terminal settings on drop.
pub struct RawModeGuard {
    original: libc::termios,
}

impl RawModeGuard {
    /// Disable canonical input and echo on stdin.
    ///
    /// Returns `None` when stdin is not a terminal (piped input), in which
    /// case nothing was changed.
    pub fn enable() -> Option<Self> {
        unsafe {
            let mut original: libc::termios = mem::zeroed();
            if libc::tcgetattr(STDIN_FD, &mut original) != 0 {
                return None;
            }
            let mut raw = original;
            raw.c_lflag &= !(libc::ICANON | libc::ECHO);
            if libc::tcsetattr(STDIN_FD, libc::TCSANOW, &raw) != 0 {
                log::warn!("tcsetattr failed: {}", io::Error::last_os_error());
                return None;
            }
            log::debug!("terminal: canonical mode and echo disabled");
            Some(Self { original })
        }
    }

    /// Settings in effect before [`RawModeGuard::enable`].
    pub fn original(&self) -> libc::termios {
        self.original
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore(&self.original);
        log::debug!("terminal: settings restored");
    }
}

/// Apply saved terminal settings to stdin.
pub fn restore(original: &libc::termios) {
    unsafe {
        libc::tcsetattr(STDIN_FD, libc::TCSANOW, original);
    }
}

/// Handle SIGINT on a background thread: restore `original` if given,
/// print a newline and exit with [`INTERRUPT_EXIT_CODE`].
pub fn install_interrupt_handler(original: Option<libc::termios>) -> anyhow::Result<()> {
    let mut signals = Signals::new([SIGINT]).context("Failed to register SIGINT handler")?;

    std::thread::Builder::new()
        .name("sigint".to_string())
        .spawn(move || {
            if signals.forever().next().is_some() {
                if let Some(original) = original {
                    restore(&original);
                }
                let mut stdout = io::stdout();
                let _ = writeln!(stdout);
                let _ = stdout.flush();
                std::process::exit(INTERRUPT_EXIT_CODE);
            }
        })
        .context("Failed to spawn signal thread")?;

    Ok(())
}
