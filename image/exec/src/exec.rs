/*++

Licensed under the Apache-2.0 license.

File Name:

    exec.rs

Abstract:

    Runs an external engine (subprocess) with a timeout. Failures carry the
    engine name, exit code and stderr.

--*/

use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use otfad_image_types::{OtfadError, OtfadResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executes a command (subprocess) and waits at most `timeout` for it.
///
/// The child is killed on timeout. Its stdout is logged at debug level and
/// its stderr is returned in the error when it exits unsuccessfully.
pub fn exec(engine: &'static str, cmd: &mut Command, timeout: Duration) -> OtfadResult<()> {
    debug!("{engine}: running {:?}", collect_args(cmd));
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| OtfadError::EngineLaunch {
            engine,
            exe: PathBuf::from(cmd.get_program()),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let status = wait_timeout(&mut child, timeout).map_err(|source| OtfadError::EngineIo {
        engine,
        path: PathBuf::from(cmd.get_program()),
        source,
    })?;
    // Children of a killed engine may still hold the pipes, so the drain
    // threads are only joined once the engine exited on its own.
    let Some(status) = status else {
        return Err(OtfadError::EngineTimeout { engine, timeout });
    };
    let stdout = collect(stdout);
    let stderr = collect(stderr);

    for line in stdout.lines() {
        debug!("{engine}: {line}");
    }
    if !status.success() {
        return Err(OtfadError::EngineFailed {
            engine,
            code: status.code(),
            stderr,
        });
    }
    if !stderr.is_empty() {
        warn!("{engine}: {}", stderr.trim_end());
    }
    Ok(())
}

fn wait_timeout(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // Already exited between the two calls if kill fails
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

pub(crate) fn collect_args(cmd: &Command) -> Vec<OsString> {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsString::from)
        .collect()
}
