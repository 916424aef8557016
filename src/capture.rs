//! Standard output/error capture into a collector process
//!
//! [`capture_output_to_process`] starts a child process and points this
//! process's stdout and stderr descriptors at the child's stdin. Anything
//! written to those streams afterwards, by any code, reaches the child:
//! panic messages, C libraries, `println!`. The redirection is one-shot
//! and lasts for the rest of the process.
//!
//! The child is started before any descriptor is touched, so a spawn
//! failure leaves the streams as they were. If swapping the second stream
//! fails, the first is restored from a saved duplicate and the child is
//! killed.

use crate::core::{LoggerError, Result};
use parking_lot::Mutex;
use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// A standard stream of this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdout,
    Stderr,
}

impl StdStream {
    pub fn fd(&self) -> libc::c_int {
        match self {
            StdStream::Stdout => libc::STDOUT_FILENO,
            StdStream::Stderr => libc::STDERR_FILENO,
        }
    }
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdStream::Stdout => f.write_str("stdout"),
            StdStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Descriptor operations needed to redirect a standard stream
pub trait StreamRedirector: Send + Sync {
    /// Duplicate the stream's current descriptor so it can be restored
    fn save(&self, stream: StdStream) -> io::Result<OwnedFd>;

    /// Make the stream's descriptor refer to `target`
    fn redirect(&self, stream: StdStream, target: BorrowedFd<'_>) -> io::Result<()>;

    /// Put back a descriptor obtained from [`save`](Self::save)
    fn restore(&self, stream: StdStream, saved: BorrowedFd<'_>) -> io::Result<()>;
}

/// `dup`/`dup2` based redirector
#[derive(Debug, Default, Clone, Copy)]
pub struct DupRedirector;

impl DupRedirector {
    fn dup2(source: libc::c_int, stream: StdStream) -> io::Result<()> {
        loop {
            // SAFETY: dup2 only manipulates the descriptor table; `source`
            // is a live descriptor borrowed for the duration of the call.
            let result = unsafe { libc::dup2(source, stream.fd()) };
            if result == stream.fd() {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if result == -1 && err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            if result == -1 {
                return Err(err);
            }
            return Err(io::Error::other(format!(
                "dup2 returned descriptor {} instead of {}",
                result,
                stream.fd()
            )));
        }
    }
}

impl StreamRedirector for DupRedirector {
    fn save(&self, stream: StdStream) -> io::Result<OwnedFd> {
        // SAFETY: standard descriptors are open for the life of the process.
        let fd = unsafe { BorrowedFd::borrow_raw(stream.fd()) };
        fd.try_clone_to_owned()
    }

    fn redirect(&self, stream: StdStream, target: BorrowedFd<'_>) -> io::Result<()> {
        Self::dup2(target.as_raw_fd(), stream)
    }

    fn restore(&self, stream: StdStream, saved: BorrowedFd<'_>) -> io::Result<()> {
        Self::dup2(saved.as_raw_fd(), stream)
    }
}

/// Live capture: the collector process and the write end of its stdin
pub struct CaptureSession {
    command: String,
    pid: u32,
    child: Mutex<Child>,
    _stdin: ChildStdin,
}

impl CaptureSession {
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the collector process is still alive
    pub fn is_running(&self) -> bool {
        matches!(self.child.lock().try_wait(), Ok(None))
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .finish()
    }
}

static CAPTURE_STARTED: AtomicBool = AtomicBool::new(false);
static SESSION: OnceLock<CaptureSession> = OnceLock::new();

/// Start `program` with `args` and send stdout/stderr to its stdin
///
/// # Example
///
/// ```no_run
/// use named_logger_system::capture::capture_output_to_process;
///
/// capture_output_to_process("/usr/bin/logger", ["--tag", "myapp"])
///     .expect("capture failed");
/// eprintln!("this line goes to syslog");
/// ```
pub fn capture_output_to_process<I, S>(program: &str, args: I) -> Result<&'static CaptureSession>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    capture_command(command)
}

/// Capture into an already configured command
pub fn capture_command(command: Command) -> Result<&'static CaptureSession> {
    capture_command_with(command, &DupRedirector)
}

pub fn capture_command_with(
    command: Command,
    redirector: &dyn StreamRedirector,
) -> Result<&'static CaptureSession> {
    if CAPTURE_STARTED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(LoggerError::CaptureAlreadyActive);
    }

    match start_session(command, redirector) {
        Ok(session) => Ok(SESSION.get_or_init(|| session)),
        Err(e) => {
            CAPTURE_STARTED.store(false, Ordering::Release);
            Err(e)
        }
    }
}

/// Whether stdout/stderr are currently captured
pub fn capture_active() -> bool {
    SESSION.get().is_some()
}

pub fn capture_session() -> Option<&'static CaptureSession> {
    SESSION.get()
}

fn describe(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn abort_child(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn start_session(mut command: Command, redirector: &dyn StreamRedirector) -> Result<CaptureSession> {
    let description = describe(&command);

    // Anything buffered so far belongs to the original destinations
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let mut child = command
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| LoggerError::capture_spawn(&description, e))?;

    let Some(stdin) = child.stdin.take() else {
        abort_child(child);
        return Err(LoggerError::capture_spawn(
            &description,
            io::Error::other("child has no stdin pipe"),
        ));
    };

    if let Err(e) = swap_streams(stdin.as_fd(), redirector) {
        abort_child(child);
        return Err(e);
    }

    Ok(CaptureSession {
        command: description,
        pid: child.id(),
        child: Mutex::new(child),
        _stdin: stdin,
    })
}

/// Redirect stdout then stderr, restoring stdout if stderr fails
fn swap_streams(target: BorrowedFd<'_>, redirector: &dyn StreamRedirector) -> Result<()> {
    let saved_stdout = redirector
        .save(StdStream::Stdout)
        .map_err(|e| LoggerError::capture_redirect(StdStream::Stdout.to_string(), e))?;

    redirector
        .redirect(StdStream::Stdout, target)
        .map_err(|e| LoggerError::capture_redirect(StdStream::Stdout.to_string(), e))?;

    if let Err(e) = redirector.redirect(StdStream::Stderr, target) {
        if let Err(restore_err) = redirector.restore(StdStream::Stdout, saved_stdout.as_fd()) {
            // stderr is still the original stream at this point
            crate::core::diagnostics::report_error(format!(
                "Failed to restore stdout after capture failure: {}",
                restore_err
            ));
        }
        return Err(LoggerError::capture_redirect(StdStream::Stderr.to_string(), e));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Save(StdStream),
        Redirect(StdStream),
        Restore(StdStream),
    }

    /// Records operations instead of touching real descriptors
    struct Recorder {
        ops: Mutex<Vec<Op>>,
        fail_on: Option<StdStream>,
    }

    impl Recorder {
        fn new(fail_on: Option<StdStream>) -> Self {
            Self {
                ops: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    impl StreamRedirector for Recorder {
        fn save(&self, stream: StdStream) -> io::Result<OwnedFd> {
            self.ops.lock().push(Op::Save(stream));
            Ok(File::open("/dev/null")?.into())
        }

        fn redirect(&self, stream: StdStream, _target: BorrowedFd<'_>) -> io::Result<()> {
            self.ops.lock().push(Op::Redirect(stream));
            if self.fail_on == Some(stream) {
                return Err(io::Error::from_raw_os_error(libc::EBADF));
            }
            Ok(())
        }

        fn restore(&self, stream: StdStream, _saved: BorrowedFd<'_>) -> io::Result<()> {
            self.ops.lock().push(Op::Restore(stream));
            Ok(())
        }
    }

    #[test]
    fn test_spawn_failure_touches_nothing() {
        let recorder = Recorder::new(None);
        let err = start_session(Command::new("/nonexistent/collector"), &recorder).unwrap_err();

        assert!(matches!(err, LoggerError::CaptureSpawn { .. }));
        assert!(err.to_string().contains("/nonexistent/collector"));
        assert!(recorder.ops.lock().is_empty());
    }

    #[test]
    fn test_second_stream_failure_restores_first() {
        let recorder = Recorder::new(Some(StdStream::Stderr));
        let mut command = Command::new("sleep");
        command.arg("30");

        let err = start_session(command, &recorder).unwrap_err();
        assert!(matches!(err, LoggerError::CaptureRedirect { ref stream, .. } if stream == "stderr"));
        assert_eq!(
            *recorder.ops.lock(),
            vec![
                Op::Save(StdStream::Stdout),
                Op::Redirect(StdStream::Stdout),
                Op::Redirect(StdStream::Stderr),
                Op::Restore(StdStream::Stdout),
            ]
        );
    }

    #[test]
    fn test_first_stream_failure_needs_no_restore() {
        let recorder = Recorder::new(Some(StdStream::Stdout));
        let err = start_session(Command::new("cat"), &recorder).unwrap_err();
        assert!(err.is_capture());
        assert!(!recorder.ops.lock().contains(&Op::Restore(StdStream::Stdout)));
    }

    #[test]
    fn test_successful_swap_keeps_child() {
        let recorder = Recorder::new(None);
        let session = start_session(Command::new("cat"), &recorder).unwrap();
        assert!(session.is_running());
        assert_eq!(session.command(), "cat");
        assert!(session.pid() > 0);
        assert_eq!(recorder.ops.lock().len(), 3);
    }

    #[test]
    fn test_describe_joins_arguments() {
        let mut command = Command::new("/usr/bin/logger");
        command.args(["--tag", "app"]);
        assert_eq!(describe(&command), "/usr/bin/logger --tag app");
    }
}
