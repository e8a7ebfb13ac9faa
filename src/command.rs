//! Run external commands (`journalctl`, `dmesg`, `lsusb`) with a deadline
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, ErrorKind, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run `program` with `args` and return stdout if it exits successfully within `timeout`
///
/// A missing binary, a non-zero exit status and a timeout are all errors of kind [`ErrorKind::Command`]; the child is killed on timeout.
pub(crate) fn run(
    program: &'static str,
    args: &[&str],
    timeout: Duration,
) -> Result<String> {
    log::debug!("Running '{} {}'", program, args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            Error::new(
                ErrorKind::Command(program),
                &format!("Failed to run '{}': Error({})", program, e),
            )
        })?;

    // drain stdout on another thread so a full pipe cannot stall the child
    let mut stdout = child.stdout.take().ok_or_else(|| {
        Error::new(ErrorKind::Command(program), "Failed to capture stdout")
    })?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::new(
                ErrorKind::Command(program),
                &format!("'{}' timed out after {:?}", program, timeout),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let buf = reader
        .join()
        .map_err(|_| Error::new(ErrorKind::Command(program), "stdout reader panicked"))??;

    if !status.success() {
        return Err(Error::new(
            ErrorKind::Command(program),
            &format!("'{}' returned non-zero status {}", program, status),
        ));
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
