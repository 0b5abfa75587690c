use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::command::{render_command, CommandOutput, CommandRunner, SystemCommandRunner};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::geometry::Point;
use crate::ui_tree::UiNode;

const SHELL_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);
const LAYOUT_DEVICE_PATH: &str = "/data/local/tmp/perf_harness_layout.json";

/// How to reach a device through `hdc`.
#[derive(Clone)]
pub struct HdcConnection {
    hdc_path: PathBuf,
    serial: Option<String>,
    runner: Arc<dyn CommandRunner>,
}

impl HdcConnection {
    pub fn new(hdc_path: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self::with_runner(hdc_path, serial, Arc::new(SystemCommandRunner))
    }

    pub fn with_runner(
        hdc_path: impl Into<PathBuf>,
        serial: Option<String>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            hdc_path: hdc_path.into(),
            serial,
            runner,
        }
    }

    pub fn hdc_path(&self) -> &Path {
        &self.hdc_path
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn target_args(&self) -> Vec<String> {
        match &self.serial {
            Some(serial) => vec!["-t".to_string(), serial.clone()],
            None => Vec::new(),
        }
    }

    /// Arguments for `hdc` that run `command` in a device shell.
    pub fn shell_args(&self, command: &str) -> Vec<String> {
        let mut args = self.target_args();
        args.push("shell".to_string());
        args.push(command.to_string());
        args
    }

    /// Arguments for `hdc` that copy a device file to the host.
    pub fn recv_args(&self, remote: &str, local: &Path) -> Vec<String> {
        let mut args = self.target_args();
        args.push("file".to_string());
        args.push("recv".to_string());
        args.push(remote.to_string());
        args.push(local.display().to_string());
        args
    }

    fn run(&self, args: &[String], timeout: Duration) -> DeviceResult<CommandOutput> {
        let program = self.hdc_path.display().to_string();
        let output = self.runner.run(&program, args, timeout)?;
        if !output.success() {
            return Err(DeviceError::CommandFailed {
                command: render_command(&program, args),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Run a shell command on the device and return its stdout.
    pub fn shell(&self, command: &str) -> DeviceResult<String> {
        log::trace!("hdc shell {command}");
        self.run(&self.shell_args(command), SHELL_TIMEOUT)
            .map(|output| output.stdout)
    }

    /// Copy a file from the device to the host.
    pub fn recv(&self, remote: &str, local: &Path) -> DeviceResult<()> {
        log::debug!("Pulling {remote} to {}", local.display());
        self.run(&self.recv_args(remote, local), TRANSFER_TIMEOUT)
            .map(|_| ())
    }
}

/// A device driven through `hdc` with the on-device `uitest` and `aa` tools.
pub struct HdcDevice {
    connection: HdcConnection,
    name: String,
}

impl HdcDevice {
    pub fn new(connection: HdcConnection) -> Self {
        let name = connection
            .serial()
            .map(ToString::to_string)
            .unwrap_or_else(|| "default".to_string());
        Self { connection, name }
    }

    pub fn connection(&self) -> &HdcConnection {
        &self.connection
    }

    fn ui_input(&self, args: &str) -> DeviceResult<()> {
        self.connection
            .shell(&format!("uitest uiInput {args}"))
            .map(|_| ())
    }
}

impl Device for HdcDevice {
    fn serial(&self) -> &str {
        &self.name
    }

    fn start_app(&mut self, package: &str, ability: &str) -> DeviceResult<()> {
        let output = self
            .connection
            .shell(&format!("aa start -a {ability} -b {package}"))?;
        // `aa` reports failures on stdout with a zero exit code.
        if output.contains("error") {
            return Err(DeviceError::CommandFailed {
                command: format!("aa start -a {ability} -b {package}"),
                exit_code: Some(0),
                stderr: output.trim().to_string(),
            });
        }
        Ok(())
    }

    fn stop_app(&mut self, package: &str) -> DeviceResult<()> {
        self.connection
            .shell(&format!("aa force-stop {package}"))
            .map(|_| ())
    }

    fn tap(&mut self, point: Point) -> DeviceResult<()> {
        self.ui_input(&format!("click {} {}", point.x, point.y))
    }

    fn swipe(&mut self, from: Point, to: Point, speed: u32) -> DeviceResult<()> {
        self.ui_input(&format!(
            "swipe {} {} {} {} {speed}",
            from.x, from.y, to.x, to.y
        ))
    }

    fn input_text(&mut self, point: Point, text: &str) -> DeviceResult<()> {
        self.ui_input(&format!(
            "inputText {} {} {}",
            point.x,
            point.y,
            shell_quote(text)
        ))
    }

    fn press_back(&mut self) -> DeviceResult<()> {
        self.ui_input("keyEvent Back")
    }

    fn dump_layout(&mut self) -> DeviceResult<UiNode> {
        self.connection
            .shell(&format!("uitest dumpLayout -p {LAYOUT_DEVICE_PATH}"))?;
        let json = self.connection.shell(&format!("cat {LAYOUT_DEVICE_PATH}"))?;
        UiNode::parse(&json)
    }

    fn pids_of(&mut self, package: &str) -> DeviceResult<Vec<u32>> {
        // `pidof` exits non-zero when nothing matches, which is not an error here.
        let output = self
            .connection
            .runner
            .run(
                &self.connection.hdc_path.display().to_string(),
                &self.connection.shell_args(&format!("pidof {package}")),
                SHELL_TIMEOUT,
            )?;
        Ok(parse_pids(&output.stdout))
    }
}

fn parse_pids(output: &str) -> Vec<u32> {
    let mut pids = output
        .split_whitespace()
        .filter_map(|p| p.parse::<u32>().ok())
        .collect::<Vec<_>>();
    pids.sort_unstable();
    pids.dedup();
    pids
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
