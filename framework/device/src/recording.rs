use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::Device;
use crate::error::DeviceResult;
use crate::geometry::Point;
use crate::selector::Selector;
use crate::ui_tree::UiNode;

const DRY_RUN_SCREEN_BOUNDS: &str = "[0,0][1080,2340]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    StartApp { package: String, ability: String },
    StopApp { package: String },
    Tap(Point),
    Swipe { from: Point, to: Point, speed: u32 },
    InputText { at: Point, text: String },
    Back,
    DumpLayout,
}

/// A device that performs nothing and remembers every action it was asked to do.
///
/// Used for `--dry-run` to check a scenario's flow without hardware, and in tests. The action log
/// is shared, so it can still be inspected after the device has been handed to the runner.
pub struct RecordingDevice {
    serial: String,
    layout: UiNode,
    pids: Vec<u32>,
    permissive: bool,
    actions: Arc<Mutex<Vec<DeviceAction>>>,
}

impl RecordingDevice {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            layout: UiNode::default(),
            pids: Vec::new(),
            permissive: false,
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A device for dry runs: the screen is a single 1080x2340 root and every selector resolves
    /// to an element in the middle of it, so scenarios can run to completion.
    pub fn dry_run(serial: impl Into<String>) -> Self {
        let mut root = UiNode::default();
        root.attributes
            .insert("bounds".to_string(), DRY_RUN_SCREEN_BOUNDS.to_string());

        Self {
            layout: root,
            permissive: true,
            ..Self::new(serial)
        }
    }

    /// The UI tree returned by every [Device::dump_layout] call.
    pub fn with_layout(mut self, layout: UiNode) -> Self {
        self.layout = layout;
        self
    }

    /// The pids reported for any package.
    pub fn with_pids(mut self, pids: Vec<u32>) -> Self {
        self.pids = pids;
        self
    }

    pub fn action_log(&self) -> Arc<Mutex<Vec<DeviceAction>>> {
        self.actions.clone()
    }

    pub fn actions(&self) -> Vec<DeviceAction> {
        self.actions.lock().clone()
    }

    fn record(&self, action: DeviceAction) {
        log::debug!("[{}] {action:?}", self.serial);
        self.actions.lock().push(action);
    }
}

impl Device for RecordingDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn start_app(&mut self, package: &str, ability: &str) -> DeviceResult<()> {
        self.record(DeviceAction::StartApp {
            package: package.to_string(),
            ability: ability.to_string(),
        });
        Ok(())
    }

    fn stop_app(&mut self, package: &str) -> DeviceResult<()> {
        self.record(DeviceAction::StopApp {
            package: package.to_string(),
        });
        Ok(())
    }

    fn tap(&mut self, point: Point) -> DeviceResult<()> {
        self.record(DeviceAction::Tap(point));
        Ok(())
    }

    fn swipe(&mut self, from: Point, to: Point, speed: u32) -> DeviceResult<()> {
        self.record(DeviceAction::Swipe { from, to, speed });
        Ok(())
    }

    fn input_text(&mut self, point: Point, text: &str) -> DeviceResult<()> {
        self.record(DeviceAction::InputText {
            at: point,
            text: text.to_string(),
        });
        Ok(())
    }

    fn press_back(&mut self) -> DeviceResult<()> {
        self.record(DeviceAction::Back);
        Ok(())
    }

    fn dump_layout(&mut self) -> DeviceResult<UiNode> {
        self.record(DeviceAction::DumpLayout);
        Ok(self.layout.clone())
    }

    fn pids_of(&mut self, _package: &str) -> DeviceResult<Vec<u32>> {
        Ok(self.pids.clone())
    }

    fn find_element(&mut self, selector: &Selector) -> DeviceResult<Option<UiNode>> {
        let root = self.dump_layout()?;
        if let Some(node) = selector.find_first(&root) {
            return Ok(Some(node.clone()));
        }

        if !self.permissive {
            return Ok(None);
        }

        let mut node = UiNode::default();
        node.attributes
            .insert("type".to_string(), "DryRunElement".to_string());
        node.attributes
            .insert("description".to_string(), selector.to_string());
        node.attributes.insert(
            "bounds".to_string(),
            root.attr("bounds").unwrap_or(DRY_RUN_SCREEN_BOUNDS).to_string(),
        );
        Ok(Some(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceExt;

    #[test]
    fn dry_run_resolves_any_selector() {
        let mut device = RecordingDevice::dry_run("dry-run");
        device.tap_on(&Selector::text("Anything")).unwrap();

        assert_eq!(
            Some(DeviceAction::Tap(Point::new(540, 1170))),
            device.actions().last().cloned()
        );
    }

    #[test]
    fn strict_device_reports_missing_elements() {
        let mut device = RecordingDevice::new("strict");
        assert_eq!(None, device.find_element(&Selector::text("Anything")).unwrap());
    }

    #[test]
    fn action_log_is_shared() {
        let mut device = RecordingDevice::new("shared").with_pids(vec![42]);
        let log = device.action_log();

        device.start_app("com.example", "EntryAbility").unwrap();
        device.press_back().unwrap();

        assert_eq!(2, log.lock().len());
        assert_eq!(vec![42], device.pids_of("com.example").unwrap());
    }
}
