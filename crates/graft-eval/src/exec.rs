//! Resource-limited execution of external commands
//!
//! Each command leads its own process group. Its stdout and stderr are
//! drained by two reader threads into one channel; the calling thread
//! polls that channel with a bounded wait so a silent, hung child never
//! blocks it past the time limit. On timeout or output cap the whole
//! process group is killed with `SIGKILL`.

use crate::status::StatusKind;
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest single wait on the output channel
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wait between exit checks once both pipes are closed
const REAP_INTERVAL: Duration = Duration::from_millis(5);

const CHUNK: usize = 4096;

/// What to run and under which limits
#[derive(Debug, Clone)]
pub struct ExecRequest<'a> {
    /// Program followed by its arguments
    pub cmd: &'a [String],
    pub cwd: &'a Path,
    /// Extra environment on top of the inherited one
    pub env: &'a [(String, String)],
    pub timeout: Duration,
    /// Cap on combined stdout + stderr bytes; `None` is unlimited
    pub lengthout: Option<u64>,
}

/// Outcome of one command
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    pub cmd: Vec<String>,
    /// `Success` means the process ran to completion, whatever its exit code
    pub status: StatusKind,
    /// `None` when killed by a signal or never started
    pub return_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub runtime: Duration,
    /// Combined output bytes observed
    pub output_length: u64,
    /// Process id of the group leader, if it was spawned
    pub pid: Option<u32>,
}

impl ExecResult {
    fn not_started(cmd: &[String]) -> Self {
        Self {
            cmd: cmd.to_vec(),
            status: StatusKind::CliError,
            return_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            runtime: Duration::ZERO,
            output_length: 0,
            pid: None,
        }
    }

    /// Stdout decoded lossily
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded lossily
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Command line joined for display
    #[must_use]
    pub fn command_line(&self) -> String {
        shlex::try_join(self.cmd.iter().map(String::as_str)).unwrap_or_else(|_| self.cmd.join(" "))
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Out,
    Err,
}

/// Split a command string the way a POSIX shell would
///
/// Returns `None` on unbalanced quotes.
#[must_use]
pub fn split_command(line: &str) -> Option<Vec<String>> {
    shlex::split(line.trim())
}

/// Run one command to completion or until a limit is hit
#[must_use]
pub fn run_command(request: &ExecRequest<'_>) -> ExecResult {
    let Some((program, args)) = request.cmd.split_first() else {
        return ExecResult::not_started(request.cmd);
    };
    let start = Instant::now();
    let spawned = Command::new(program)
        .args(args)
        .current_dir(request.cwd)
        .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            debug!(cmd = %program, error = %e, "failed to spawn");
            return ExecResult::not_started(request.cmd);
        }
    };
    let pid = child.id();
    let output = drain(&mut child);

    let mut result = ExecResult {
        cmd: request.cmd.to_vec(),
        status: StatusKind::Success,
        return_code: None,
        stdout: Vec::new(),
        stderr: Vec::new(),
        runtime: Duration::ZERO,
        output_length: 0,
        pid: Some(pid),
    };

    // phase 1: collect output until both pipes close
    loop {
        let elapsed = start.elapsed();
        if elapsed >= request.timeout {
            result.status = StatusKind::Timeout;
            break;
        }
        let wait = POLL_INTERVAL.min(request.timeout - elapsed);
        match output.recv_timeout(wait) {
            Ok((stream, chunk)) => {
                result.output_length += chunk.len() as u64;
                match stream {
                    Stream::Out => result.stdout.extend_from_slice(&chunk),
                    Stream::Err => result.stderr.extend_from_slice(&chunk),
                }
                if request.lengthout.is_some_and(|cap| result.output_length >= cap) {
                    result.status = StatusKind::Lengthout;
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // phase 2: reap the child within what is left of the budget
    if result.status == StatusKind::Success {
        loop {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    result.return_code = exit.code();
                    break;
                }
                Ok(None) if start.elapsed() >= request.timeout => {
                    result.status = StatusKind::Timeout;
                    break;
                }
                Ok(None) => thread::sleep(REAP_INTERVAL),
                Err(e) => {
                    warn!(pid, error = %e, "failed to poll child");
                    result.status = StatusKind::Timeout;
                    break;
                }
            }
        }
    }

    if result.status != StatusKind::Success {
        kill_group(&mut child);
        result.return_code = child.wait().ok().and_then(|exit| exit.code());
    }
    result.runtime = start.elapsed();
    result
}

/// Spawn one reader thread per pipe feeding a shared channel
fn drain(child: &mut Child) -> Receiver<(Stream, Vec<u8>)> {
    let (tx, rx) = channel::unbounded();
    if let Some(pipe) = child.stdout.take() {
        let tx = tx.clone();
        thread::spawn(move || pump(pipe, Stream::Out, &tx));
    }
    if let Some(pipe) = child.stderr.take() {
        thread::spawn(move || pump(pipe, Stream::Err, &tx));
    }
    rx
}

fn pump(mut pipe: impl Read, stream: Stream, tx: &channel::Sender<(Stream, Vec<u8>)>) {
    let mut buf = [0u8; CHUNK];
    loop {
        match pipe.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if tx.send((stream, buf[..n].to_vec())).is_err() {
                    return;
                }
            }
        }
    }
}

fn kill_group(child: &mut Child) {
    let Ok(raw) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pid = raw, error = %e, "killpg failed, killing leader only");
        let _ = child.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn request<'a>(cmd: &'a [String], cwd: &'a Path) -> ExecRequest<'a> {
        ExecRequest {
            cmd,
            cwd,
            env: &[],
            timeout: Duration::from_secs(10),
            lengthout: None,
        }
    }

    #[test]
    fn captures_both_streams_and_exit_code() {
        let cmd = sh("echo out; echo err >&2; exit 3");
        let result = run_command(&request(&cmd, Path::new(".")));
        assert_eq!(result.status, StatusKind::Success);
        assert_eq!(result.return_code, Some(3));
        assert_eq!(result.stdout_text(), "out\n");
        assert_eq!(result.stderr_text(), "err\n");
        assert_eq!(result.output_length, 8);
    }

    #[test]
    fn missing_executable_is_cli_error() {
        let cmd = vec!["graft-no-such-binary-here".to_string()];
        let result = run_command(&request(&cmd, Path::new(".")));
        assert_eq!(result.status, StatusKind::CliError);
        assert_eq!(result.pid, None);
        let empty: Vec<String> = Vec::new();
        assert_eq!(run_command(&request(&empty, Path::new("."))).status, StatusKind::CliError);
    }

    #[test]
    fn output_cap_kills() {
        let cmd = sh("yes");
        let mut req = request(&cmd, Path::new("."));
        req.lengthout = Some(1000);
        let result = run_command(&req);
        assert_eq!(result.status, StatusKind::Lengthout);
        assert!(result.output_length >= 1000);
    }

    #[test]
    fn env_is_injected() {
        let cmd = sh("printf %s \"$GRAFT_BASENAME\"");
        let env = vec![("GRAFT_BASENAME".to_string(), "triangle".to_string())];
        let mut req = request(&cmd, Path::new("."));
        req.env = &env;
        assert_eq!(run_command(&req).stdout_text(), "triangle");
    }

    #[test]
    fn split_like_a_shell() {
        assert_eq!(
            split_command("  ./run.sh 'a b' c\\ d  ").unwrap(),
            vec!["./run.sh", "a b", "c d"]
        );
        assert!(split_command("echo 'open").is_none());
    }
}
