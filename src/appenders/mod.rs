//! Text outputs

pub mod buffered;
pub mod syslog;
pub mod writer;

pub use buffered::{BufferedOutput, BufferedOutputBuilder, DrainReport, DEFAULT_SHUTDOWN_TIMEOUT};
pub use syslog::{Facility, SyslogOutput};
pub use writer::WriterOutput;
