//! Detaching from the controlling terminal.

use std::io;

/// Fork into the background. The parent exits with status 0; the child
/// returns `Ok` as the leader of a new session.
///
/// Must be called while the process is still single-threaded, i.e. before
/// the tokio runtime is built.
#[cfg(unix)]
pub fn detach() -> io::Result<()> {
    // SAFETY: no other threads exist yet, so the child inherits a
    // consistent address space.
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => {
            // SAFETY: plain syscall with no pointer arguments.
            if unsafe { libc::setsid() } == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
        _ => std::process::exit(0),
    }
}

#[cfg(not(unix))]
pub fn detach() -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "background mode needs fork(2); run with --foreground",
    ))
}
