//! Output to the local syslog daemon through the POSIX syslog API
//!
//! POSIX allows one `openlog` connection per process. The most recently
//! created `SyslogOutput` owns it: a newer one replaces the identity and
//! facility of an older one, and dropping an older one leaves the newer
//! connection open.

use crate::core::{LogLevel, LoggerError, Result, TextOutput};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Connection id of the output whose `openlog` is in effect, 0 for none
static CONNECTION_OWNER: Mutex<u64> = Mutex::new(0);

/// Syslog facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facility {
    Kern,
    #[default]
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Lpr,
    News,
    Uucp,
    Cron,
    AuthPriv,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    pub fn code(&self) -> libc::c_int {
        match self {
            Facility::Kern => libc::LOG_KERN,
            Facility::User => libc::LOG_USER,
            Facility::Mail => libc::LOG_MAIL,
            Facility::Daemon => libc::LOG_DAEMON,
            Facility::Auth => libc::LOG_AUTH,
            Facility::Syslog => libc::LOG_SYSLOG,
            Facility::Lpr => libc::LOG_LPR,
            Facility::News => libc::LOG_NEWS,
            Facility::Uucp => libc::LOG_UUCP,
            Facility::Cron => libc::LOG_CRON,
            Facility::AuthPriv => libc::LOG_AUTHPRIV,
            Facility::Local0 => libc::LOG_LOCAL0,
            Facility::Local1 => libc::LOG_LOCAL1,
            Facility::Local2 => libc::LOG_LOCAL2,
            Facility::Local3 => libc::LOG_LOCAL3,
            Facility::Local4 => libc::LOG_LOCAL4,
            Facility::Local5 => libc::LOG_LOCAL5,
            Facility::Local6 => libc::LOG_LOCAL6,
            Facility::Local7 => libc::LOG_LOCAL7,
        }
    }

    /// Name as accepted by `logger --priority`
    pub fn name(&self) -> &'static str {
        match self {
            Facility::Kern => "kern",
            Facility::User => "user",
            Facility::Mail => "mail",
            Facility::Daemon => "daemon",
            Facility::Auth => "auth",
            Facility::Syslog => "syslog",
            Facility::Lpr => "lpr",
            Facility::News => "news",
            Facility::Uucp => "uucp",
            Facility::Cron => "cron",
            Facility::AuthPriv => "authpriv",
            Facility::Local0 => "local0",
            Facility::Local1 => "local1",
            Facility::Local2 => "local2",
            Facility::Local3 => "local3",
            Facility::Local4 => "local4",
            Facility::Local5 => "local5",
            Facility::Local6 => "local6",
            Facility::Local7 => "local7",
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Facility {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        let facility = match s.trim().to_lowercase().as_str() {
            "kern" => Facility::Kern,
            "user" => Facility::User,
            "mail" => Facility::Mail,
            "daemon" => Facility::Daemon,
            "auth" => Facility::Auth,
            "syslog" => Facility::Syslog,
            "lpr" => Facility::Lpr,
            "news" => Facility::News,
            "uucp" => Facility::Uucp,
            "cron" => Facility::Cron,
            "authpriv" => Facility::AuthPriv,
            "local0" => Facility::Local0,
            "local1" => Facility::Local1,
            "local2" => Facility::Local2,
            "local3" => Facility::Local3,
            "local4" => Facility::Local4,
            "local5" => Facility::Local5,
            "local6" => Facility::Local6,
            "local7" => Facility::Local7,
            other => {
                return Err(LoggerError::config(
                    "syslog facility",
                    format!("unknown facility '{}'", other),
                ))
            }
        };
        Ok(facility)
    }
}

pub struct SyslogOutput {
    /// `openlog` keeps the pointer, so the string lives as long as we do
    _ident: CString,
    facility: Facility,
    connection: u64,
}

impl SyslogOutput {
    pub fn new(procname: &str, facility: Facility) -> Result<Self> {
        let ident = CString::new(procname).map_err(|_| {
            LoggerError::config("syslog", "process name contains a NUL byte")
        })?;

        let connection = NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed);
        let mut owner = CONNECTION_OWNER.lock();
        // SAFETY: `ident` is NUL-terminated and owned by the returned value,
        // which calls `closelog` before releasing it while still the owner.
        unsafe {
            libc::openlog(ident.as_ptr(), libc::LOG_PID | libc::LOG_NDELAY, facility.code());
        }
        *owner = connection;

        Ok(Self {
            _ident: ident,
            facility,
            connection,
        })
    }

    /// Whether this output's `openlog` is the one in effect
    pub fn owns_connection(&self) -> bool {
        *CONNECTION_OWNER.lock() == self.connection
    }

    pub fn facility(&self) -> Facility {
        self.facility
    }

    /// Strip the line terminator and any interior NULs
    fn message(line: &[u8]) -> CString {
        let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
        let bytes: Vec<u8> = trimmed.iter().copied().filter(|b| *b != 0).collect();
        // No NULs remain, so this cannot fail
        CString::new(bytes).unwrap_or_default()
    }
}

impl TextOutput for SyslogOutput {
    fn output(&self, level: LogLevel, line: &[u8]) -> Result<()> {
        let message = Self::message(line);
        let priority = self.facility.code() | level.syslog_severity();

        // SAFETY: the format is a static "%s" and `message` is a valid C string.
        unsafe {
            libc::syslog(priority, b"%s\0".as_ptr().cast::<libc::c_char>(), message.as_ptr());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "syslog"
    }
}

impl Drop for SyslogOutput {
    fn drop(&mut self) {
        let mut owner = CONNECTION_OWNER.lock();
        if *owner == self.connection {
            // SAFETY: closelog has no preconditions.
            unsafe { libc::closelog() };
            *owner = 0;
        }
    }
}
