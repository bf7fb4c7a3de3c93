//! # Command-Line Tool Backends
//!
//! Mouse injection by running `xdotool` (X11) or `ydotool` (Wayland) once
//! per call. Gamepad operations are not supported and fall back to the
//! trait's no-op defaults.
//!
//! Calls only queue the invocation. A worker task runs queued invocations in
//! order with `tokio::process`, each bounded by the command timeout; a tool
//! that hangs is killed. The receive loop never waits on a subprocess.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use super::{session_is_wayland, BackendError, BackendResult, InputBackend};
use crate::protocol::packet::MouseButton;

/// Invocations waiting for the worker; further calls are dropped when full
const QUEUE_CAPACITY: usize = 64;

/// Supported command-line tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Xdotool,
    Ydotool,
}

impl Tool {
    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Tool::Xdotool => "xdotool",
            Tool::Ydotool => "ydotool",
        }
    }

    /// Arguments for a relative pointer move
    #[must_use]
    pub fn move_args(self, dx: i32, dy: i32) -> Vec<String> {
        match self {
            Tool::Xdotool => vec![
                "mousemove_relative".into(),
                "--".into(),
                dx.to_string(),
                dy.to_string(),
            ],
            Tool::Ydotool => vec![
                "mousemove".into(),
                "-x".into(),
                dx.to_string(),
                "-y".into(),
                dy.to_string(),
            ],
        }
    }

    /// Arguments for a button press or release
    #[must_use]
    pub fn button_args(self, button: MouseButton, pressed: bool) -> Vec<String> {
        match self {
            Tool::Xdotool => {
                // X11 numbers the middle button 2 and the right button 3
                let code = match button {
                    MouseButton::Left => "1",
                    MouseButton::Right => "3",
                    MouseButton::Middle => "2",
                };
                let action = if pressed { "mousedown" } else { "mouseup" };
                vec![action.into(), code.into()]
            }
            Tool::Ydotool => {
                let code = match button {
                    MouseButton::Left => "0x00",
                    MouseButton::Right => "0x01",
                    MouseButton::Middle => "0x02",
                };
                let flag = if pressed { "-d" } else { "-u" };
                vec!["click".into(), flag.into(), code.into()]
            }
        }
    }

    /// Arguments for a wheel scroll, `None` for a zero delta
    #[must_use]
    pub fn scroll_args(self, delta: i32) -> Option<Vec<String>> {
        if delta == 0 {
            return None;
        }
        let args = match self {
            Tool::Xdotool => {
                let wheel = if delta > 0 { "4" } else { "5" };
                vec![
                    "click".into(),
                    "--repeat".into(),
                    delta.unsigned_abs().to_string(),
                    wheel.into(),
                ]
            }
            Tool::Ydotool => vec!["mousemove".into(), "-w".into(), delta.to_string()],
        };
        Some(args)
    }
}

/// Find an executable in `PATH`
#[must_use]
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Mouse backend driving an external tool.
#[derive(Debug)]
pub struct CommandBackend {
    tool: Tool,
    queue: Mutex<Option<mpsc::Sender<Vec<String>>>>,
}

impl CommandBackend {
    /// xdotool backend for X11 sessions
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] under Wayland, when `xdotool`
    /// is not in `PATH`, or outside a Tokio runtime.
    pub fn xdotool(timeout: Duration) -> Result<Self, BackendError> {
        if session_is_wayland() {
            return Err(BackendError::Unavailable(
                "xdotool does not work in Wayland sessions".to_string(),
            ));
        }
        Self::with_tool(Tool::Xdotool, timeout)
    }

    /// ydotool backend for Wayland sessions
    ///
    /// The worker first checks for the `ydotoold` daemon and warns if it
    /// does not appear to be running, since every call would then fail.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when `ydotool` is not in `PATH`
    /// or outside a Tokio runtime.
    pub fn ydotool(timeout: Duration) -> Result<Self, BackendError> {
        Self::with_tool(Tool::Ydotool, timeout)
    }

    fn with_tool(tool: Tool, timeout: Duration) -> Result<Self, BackendError> {
        let executable = find_in_path(tool.program()).ok_or_else(|| {
            BackendError::Unavailable(format!("{} not found in PATH", tool.program()))
        })?;
        Self::spawn(tool, executable, timeout)
    }

    /// Start the worker task for `executable`
    fn spawn(tool: Tool, executable: PathBuf, timeout: Duration) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            BackendError::Unavailable(format!("{} needs a Tokio runtime: {}", tool.program(), e))
        })?;

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        runtime.spawn(run_queue(tool, executable, timeout, rx));

        Ok(Self {
            tool,
            queue: Mutex::new(Some(tx)),
        })
    }

    fn run(&self, args: Vec<String>) -> BackendResult {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = queue.as_ref() else {
            return Err(BackendError::Closed);
        };

        tx.try_send(args).map_err(|e| match e {
            TrySendError::Full(_) => BackendError::Command {
                program: self.tool.program(),
                reason: "queue full, call dropped".to_string(),
            },
            TrySendError::Closed(_) => BackendError::Closed,
        })
    }
}

/// Run queued invocations one at a time until every sender is gone
async fn run_queue(
    tool: Tool,
    executable: PathBuf,
    timeout: Duration,
    mut rx: mpsc::Receiver<Vec<String>>,
) {
    if tool == Tool::Ydotool && !ydotoold_running().await {
        warn!("ydotoold is not running; start it (e.g. `sudo ydotoold`) for ydotool input");
    }

    while let Some(args) = rx.recv().await {
        trace!("{} {}", tool.program(), args.join(" "));
        if let Err(e) = run_command(tool.program(), &executable, &args[..], timeout).await {
            debug!("{}", e);
        }
    }
    debug!("{} worker stopped", tool.program());
}

/// Whether a `ydotoold` process exists; assumes yes if `pgrep` is unavailable
async fn ydotoold_running() -> bool {
    Command::new("pgrep")
        .args(["-x", "ydotoold"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(true)
}

/// Run `executable` and wait at most `timeout` for it to exit.
///
/// The child is killed if the wait times out.
///
/// # Errors
///
/// Returns [`BackendError::Command`] if the process cannot be spawned, exits
/// unsuccessfully, or is killed after the timeout.
pub async fn run_command<S: AsRef<OsStr>>(
    program: &'static str,
    executable: &Path,
    args: &[S],
    timeout: Duration,
) -> BackendResult {
    let command_error = |reason: String| BackendError::Command { program, reason };

    let mut child = Command::new(executable)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| command_error(format!("spawn failed: {}", e)))?;

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => Err(command_error(format!("exited with {}", status))),
        Ok(Err(e)) => Err(command_error(format!("wait failed: {}", e))),
        Err(_) => {
            // Reap the killed child so it does not linger as a zombie
            let _ = child.kill().await;
            Err(command_error(format!("timed out after {:?}", timeout)))
        }
    }
}

impl InputBackend for CommandBackend {
    fn name(&self) -> &'static str {
        self.tool.program()
    }

    fn method(&self) -> &'static str {
        match self.tool {
            Tool::Xdotool => "X11 command-line tool",
            Tool::Ydotool => "Wayland uinput command-line tool",
        }
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> BackendResult {
        self.run(self.tool.move_args(dx, dy))
    }

    fn mouse_button(&self, button: MouseButton, pressed: bool) -> BackendResult {
        self.run(self.tool.button_args(button, pressed))
    }

    fn mouse_scroll(&self, delta: i32) -> BackendResult {
        match self.tool.scroll_args(delta) {
            Some(args) => self.run(args),
            None => Ok(()),
        }
    }

    /// Stop accepting calls; already queued invocations still run
    fn close(&self) -> BackendResult {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio_test::assert_ok;

    #[test]
    fn test_xdotool_move_args() {
        assert_eq!(
            Tool::Xdotool.move_args(-3, 7),
            vec!["mousemove_relative", "--", "-3", "7"]
        );
    }

    #[test]
    fn test_ydotool_move_args() {
        assert_eq!(
            Tool::Ydotool.move_args(4, -2),
            vec!["mousemove", "-x", "4", "-y", "-2"]
        );
    }

    #[test]
    fn test_xdotool_button_numbers() {
        assert_eq!(
            Tool::Xdotool.button_args(MouseButton::Left, true),
            vec!["mousedown", "1"]
        );
        assert_eq!(
            Tool::Xdotool.button_args(MouseButton::Right, false),
            vec!["mouseup", "3"]
        );
        assert_eq!(
            Tool::Xdotool.button_args(MouseButton::Middle, true),
            vec!["mousedown", "2"]
        );
    }

    #[test]
    fn test_ydotool_button_codes() {
        assert_eq!(
            Tool::Ydotool.button_args(MouseButton::Left, true),
            vec!["click", "-d", "0x00"]
        );
        assert_eq!(
            Tool::Ydotool.button_args(MouseButton::Middle, false),
            vec!["click", "-u", "0x02"]
        );
    }

    #[test]
    fn test_scroll_args() {
        assert_eq!(
            Tool::Xdotool.scroll_args(3),
            Some(vec!["click".into(), "--repeat".into(), "3".into(), "4".into()])
        );
        assert_eq!(
            Tool::Xdotool.scroll_args(-1),
            Some(vec!["click".into(), "--repeat".into(), "1".into(), "5".into()])
        );
        assert_eq!(
            Tool::Ydotool.scroll_args(-2),
            Some(vec!["mousemove".into(), "-w".into(), "-2".into()])
        );
        assert_eq!(Tool::Xdotool.scroll_args(0), None);
        assert_eq!(Tool::Ydotool.scroll_args(0), None);
    }

    #[test]
    fn test_missing_program_not_in_path() {
        assert!(find_in_path("pad-bridge-no-such-tool").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_success_and_failure() {
        if let Some(sh) = find_in_path("sh") {
            assert_ok!(run_command("sh", &sh, &["-c", "exit 0"], Duration::from_secs(5)).await);

            let err = run_command("sh", &sh, &["-c", "exit 3"], Duration::from_secs(5))
                .await
                .unwrap_err();
            assert!(matches!(err, BackendError::Command { program: "sh", .. }));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_command_kills_hung_process() {
        if let Some(sh) = find_in_path("sh") {
            let start = Instant::now();
            let err = run_command("sh", &sh, &["-c", "sleep 5"], Duration::from_millis(100))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("timed out"));
            assert!(start.elapsed() < Duration::from_secs(4));
        }
    }

    #[tokio::test]
    async fn test_run_command_missing_executable() {
        let err = run_command(
            "xdotool",
            Path::new("/nonexistent/pad-bridge-tool"),
            &["mousemove_relative"],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("spawn failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_calls_do_not_wait_for_the_tool() {
        if let Some(sh) = find_in_path("sh") {
            // `sh mousemove_relative ...` fails; the worker only logs it
            let backend = CommandBackend::spawn(Tool::Xdotool, sh, Duration::from_secs(5)).unwrap();

            let start = Instant::now();
            for _ in 0..10 {
                assert_ok!(backend.mouse_move(1, -1));
            }
            assert_ok!(backend.mouse_button(MouseButton::Left, true));
            assert_ok!(backend.mouse_scroll(0));
            assert!(start.elapsed() < Duration::from_secs(1));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_full_queue_drops_calls() {
        if let Some(sh) = find_in_path("sh") {
            let backend = CommandBackend::spawn(Tool::Xdotool, sh, Duration::from_secs(5)).unwrap();

            // Nothing yields to the worker here, so the queue only fills up
            let results: Vec<_> = (0..=QUEUE_CAPACITY)
                .map(|_| backend.mouse_move(1, 1))
                .collect();
            assert!(results[..QUEUE_CAPACITY].iter().all(Result::is_ok));
            assert!(matches!(
                results[QUEUE_CAPACITY],
                Err(BackendError::Command { program: "xdotool", .. })
            ));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_rejects_further_calls() {
        if let Some(sh) = find_in_path("sh") {
            let backend = CommandBackend::spawn(Tool::Ydotool, sh, Duration::from_secs(1)).unwrap();
            assert_ok!(backend.close());
            assert!(matches!(backend.mouse_move(1, 1), Err(BackendError::Closed)));
            assert!(matches!(backend.mouse_scroll(2), Err(BackendError::Closed)));
        }
    }

    #[test]
    fn test_spawn_outside_runtime_is_unavailable() {
        let result = CommandBackend::spawn(
            Tool::Xdotool,
            PathBuf::from("/usr/bin/xdotool"),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}
