use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::{DeviceError, DeviceResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs host commands. The seam that lets device bindings be tested without a device attached.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> DeviceResult<CommandOutput>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> DeviceResult<CommandOutput> {
        let command_line = render_command(program, args);
        log::trace!("Running `{command_line}`");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DeviceError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Drain both pipes while waiting, a chatty child would otherwise block on a full pipe
        // and look like a timeout.
        let stdout_handle = child.stdout.take().map(drain);
        let stderr_handle = child.stderr.take().map(drain);
        let collect = |handle: Option<JoinHandle<Vec<u8>>>| {
            handle
                .and_then(|h| h.join().ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
                .unwrap_or_default()
        };

        let start = Instant::now();
        let exit_code = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status.code(),
                Ok(None) => {
                    if start.elapsed() > timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        collect(stdout_handle);
                        collect(stderr_handle);
                        return Err(DeviceError::Timeout {
                            command: command_line,
                            timeout,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(source) => {
                    collect(stdout_handle);
                    collect(stderr_handle);
                    return Err(DeviceError::Spawn {
                        program: program.to_string(),
                        source,
                    });
                }
            }
        };

        Ok(CommandOutput {
            stdout: collect(stdout_handle),
            stderr: collect(stderr_handle),
            exit_code,
        })
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = reader.read_to_end(&mut buffer);
        buffer
    })
}

pub(crate) fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let output = SystemCommandRunner
            .run("sh", &sh("echo hello; echo oops >&2; exit 3"), Duration::from_secs(10))
            .unwrap();

        assert_eq!("hello\n", output.stdout);
        assert_eq!("oops\n", output.stderr);
        assert_eq!(Some(3), output.exit_code);
        assert!(!output.success());
    }

    #[test]
    fn large_output_does_not_deadlock() {
        let output = SystemCommandRunner
            .run(
                "sh",
                &sh("i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done"),
                Duration::from_secs(10),
            )
            .expect("expected large-output command to complete without timing out");

        assert!(output.success());
        assert!(output.stdout.len() >= 1_000_000);
    }

    #[test]
    fn timeout_kills_the_child() {
        let result = SystemCommandRunner.run("sh", &sh("exec sleep 5"), Duration::from_millis(200));
        assert!(matches!(result, Err(DeviceError::Timeout { .. })));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = SystemCommandRunner.run(
            "definitely-not-a-real-program-xyz",
            &[],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(DeviceError::Spawn { .. })));
    }
}
