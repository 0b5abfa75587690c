use std::time::{Duration, Instant};

use crate::error::{DeviceError, DeviceResult};
use crate::geometry::Point;
use crate::selector::Selector;
use crate::ui_tree::UiNode;

/// Default swipe speed in pixels per second.
pub const DEFAULT_SWIPE_SPEED: u32 = 2000;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_secs(5);

/// The device automation capability that scenarios drive.
///
/// Implementations only need to provide the primitive operations, element lookup and waiting
/// are layered on top by [DeviceExt].
pub trait Device: Send {
    /// Serial of the device, or a descriptive name for devices that are not real hardware.
    fn serial(&self) -> &str;

    fn start_app(&mut self, package: &str, ability: &str) -> DeviceResult<()>;

    fn stop_app(&mut self, package: &str) -> DeviceResult<()>;

    fn tap(&mut self, point: Point) -> DeviceResult<()>;

    /// Swipe from one point to another at `speed` pixels per second.
    fn swipe(&mut self, from: Point, to: Point, speed: u32) -> DeviceResult<()>;

    /// Focus the input at `point` and type `text` into it.
    fn input_text(&mut self, point: Point, text: &str) -> DeviceResult<()>;

    fn press_back(&mut self) -> DeviceResult<()>;

    /// Capture the current UI tree.
    fn dump_layout(&mut self) -> DeviceResult<UiNode>;

    /// Process ids of all processes whose name starts with the package name.
    fn pids_of(&mut self, package: &str) -> DeviceResult<Vec<u32>>;

    /// Look for an element in the current UI, without waiting.
    fn find_element(&mut self, selector: &Selector) -> DeviceResult<Option<UiNode>> {
        let root = self.dump_layout()?;
        Ok(selector.find_first(&root).cloned())
    }
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn serial(&self) -> &str {
        (**self).serial()
    }

    fn start_app(&mut self, package: &str, ability: &str) -> DeviceResult<()> {
        (**self).start_app(package, ability)
    }

    fn stop_app(&mut self, package: &str) -> DeviceResult<()> {
        (**self).stop_app(package)
    }

    fn tap(&mut self, point: Point) -> DeviceResult<()> {
        (**self).tap(point)
    }

    fn swipe(&mut self, from: Point, to: Point, speed: u32) -> DeviceResult<()> {
        (**self).swipe(from, to, speed)
    }

    fn input_text(&mut self, point: Point, text: &str) -> DeviceResult<()> {
        (**self).input_text(point, text)
    }

    fn press_back(&mut self) -> DeviceResult<()> {
        (**self).press_back()
    }

    fn dump_layout(&mut self) -> DeviceResult<UiNode> {
        (**self).dump_layout()
    }

    fn pids_of(&mut self, package: &str) -> DeviceResult<Vec<u32>> {
        (**self).pids_of(package)
    }

    fn find_element(&mut self, selector: &Selector) -> DeviceResult<Option<UiNode>> {
        (**self).find_element(selector)
    }
}

/// Element lookup and gestures built from the [Device] primitives.
pub trait DeviceExt: Device {
    /// The first element on screen matching `selector`, without waiting.
    fn find(&mut self, selector: &Selector) -> DeviceResult<Option<UiNode>> {
        self.find_element(selector)
    }

    /// Whether an element matching `selector` is currently on screen.
    fn exists(&mut self, selector: &Selector) -> DeviceResult<bool> {
        Ok(self.find_element(selector)?.is_some())
    }

    /// Poll the UI until an element matches or the timeout elapses.
    fn wait_for(&mut self, selector: &Selector, timeout: Duration) -> DeviceResult<UiNode> {
        let start = Instant::now();
        loop {
            if let Some(node) = self.find_element(selector)? {
                return Ok(node);
            }

            if start.elapsed() >= timeout {
                return Err(DeviceError::ElementNotFound {
                    selector: selector.to_string(),
                    timeout,
                });
            }

            std::thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(start.elapsed())));
        }
    }

    /// Wait up to five seconds for an element and tap its centre.
    fn tap_on(&mut self, selector: &Selector) -> DeviceResult<()> {
        let node = self.wait_for(selector, DEFAULT_FIND_TIMEOUT)?;
        let bounds = node
            .bounds()
            .ok_or_else(|| DeviceError::Layout(format!("matched element has no bounds: {selector}")))?;
        log::debug!("Tapping {selector} at {}", bounds.center());
        self.tap(bounds.center())
    }

    /// Wait for an input element, then type into it.
    fn input_on(&mut self, selector: &Selector, text: &str) -> DeviceResult<()> {
        let node = self.wait_for(selector, DEFAULT_FIND_TIMEOUT)?;
        let bounds = node
            .bounds()
            .ok_or_else(|| DeviceError::Layout(format!("matched element has no bounds: {selector}")))?;
        self.input_text(bounds.center(), text)
    }

    /// Sleep, leaving the app to run on its own. Used for the idle parts of a step.
    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Swipe upwards across the middle of the screen, scrolling content down.
    fn swipe_up(&mut self) -> DeviceResult<()> {
        let screen = screen_bounds(self)?;
        self.swipe(
            screen.relative(0.5, 0.8),
            screen.relative(0.5, 0.3),
            DEFAULT_SWIPE_SPEED,
        )
    }

    /// Swipe downwards across the middle of the screen, scrolling content up.
    fn swipe_down(&mut self) -> DeviceResult<()> {
        let screen = screen_bounds(self)?;
        self.swipe(
            screen.relative(0.5, 0.3),
            screen.relative(0.5, 0.8),
            DEFAULT_SWIPE_SPEED,
        )
    }
}

impl<D: Device + ?Sized> DeviceExt for D {}

fn screen_bounds<D: Device + ?Sized>(device: &mut D) -> DeviceResult<crate::geometry::Bounds> {
    device
        .dump_layout()?
        .bounds()
        .ok_or_else(|| DeviceError::Layout("root node has no bounds".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceAction, RecordingDevice};
    use crate::ui_tree::tests::LAYOUT;

    fn device() -> RecordingDevice {
        RecordingDevice::new("test").with_layout(UiNode::parse(LAYOUT).unwrap())
    }

    #[test]
    fn tap_on_taps_element_centre() {
        let mut device = device();
        device.tap_on(&Selector::text("Cart")).unwrap();

        assert_eq!(
            Some(DeviceAction::Tap(Point::new(900, 2250))),
            device.actions().last().cloned()
        );
    }

    #[test]
    fn find_does_not_wait() {
        let mut device = device();

        assert!(device.find(&Selector::text("Cart")).unwrap().is_some());
        assert!(device.exists(&Selector::text("Cart")).unwrap());
        assert!(!device.exists(&Selector::text("Checkout")).unwrap());
    }

    #[test]
    fn wait_for_missing_element_times_out() {
        let mut device = device();
        let err = device
            .wait_for(&Selector::text("Checkout"), Duration::from_millis(10))
            .unwrap_err();

        assert!(matches!(err, DeviceError::ElementNotFound { .. }));
    }

    #[test]
    fn swipe_up_uses_screen_fractions() {
        let mut device = device();
        device.swipe_up().unwrap();

        assert_eq!(
            Some(DeviceAction::Swipe {
                from: Point::new(540, 1872),
                to: Point::new(540, 702),
                speed: DEFAULT_SWIPE_SPEED,
            }),
            device.actions().last().cloned()
        );
    }

    #[test]
    fn boxed_device_delegates() {
        let recording = device();
        let actions = recording.action_log();
        let mut boxed: Box<dyn Device> = Box::new(recording);

        boxed.tap_on(&Selector::text("Recommended")).unwrap();

        assert!(actions.lock().contains(&DeviceAction::Tap(Point::new(220, 230))));
    }
}
