use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use gpiocdev::line::Bias;
use gpiocdev::line::EdgeDetection;

use crate::config::ButtonId;
use crate::config::GpioConfig;
use crate::led::LedCommand;
use crate::modes::ModeName;
use crate::selector::PendingSwitch;

/// How long the monitor blocks on the chip before checking whether it should stop.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Drops presses that follow the previously accepted one too closely.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if self
            .last
            .is_some_and(|last| now.saturating_duration_since(last) < self.window)
        {
            return false;
        }
        self.last = Some(now);
        true
    }
}

/// Watches the button lines on a dedicated thread.
#[derive(Debug)]
pub struct ButtonMonitor {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ButtonMonitor {
    /// Request the button lines and start watching them.
    ///
    /// Returns `None` when the chip or lines cannot be requested, so the
    /// application keeps running without buttons.
    pub fn start<F>(
        config: &GpioConfig,
        led: Option<tokio::sync::mpsc::Sender<LedCommand>>,
        mut on_press: F,
    ) -> Option<Self>
    where
        F: FnMut(ButtonId) + Send + 'static,
    {
        let buttons: HashMap<u32, ButtonId> = config
            .lines
            .iter()
            .map(|(button, offset)| (*offset, *button))
            .collect();
        if buttons.is_empty() {
            tracing::info!("No button lines configured");
            return None;
        }

        let offsets: Vec<u32> = buttons.keys().copied().collect();
        let request = gpiocdev::Request::builder()
            .on_chip(config.chip.as_std_path())
            .with_consumer(env!("CARGO_PKG_NAME"))
            .with_lines(&offsets)
            .as_input()
            .with_bias(Bias::PullUp)
            .with_edge_detection(EdgeDetection::FallingEdge)
            .request();

        let request = match request {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(chip = %config.chip, %error, "Buttons not available");
                return None;
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let mut debouncer = Debouncer::new(config.debounce);
        let press_flash = LedCommand::Flash {
            count: 1,
            on: config.press_flash,
            off: Duration::ZERO,
        };

        let handle = std::thread::spawn({
            let running = running.clone();
            move || {
                tracing::info!(lines = ?offsets, "Button monitor started");

                while running.load(Ordering::Relaxed) {
                    match request.wait_edge_event(POLL_INTERVAL) {
                        Ok(true) => {}
                        Ok(false) => continue,
                        Err(error) => {
                            tracing::error!(%error, "Waiting for button events failed");
                            break;
                        }
                    }

                    let event = match request.read_edge_event() {
                        Ok(event) => event,
                        Err(error) => {
                            tracing::error!(%error, "Reading button event failed");
                            break;
                        }
                    };

                    let Some(button) = buttons.get(&event.offset).copied() else {
                        continue;
                    };

                    if !debouncer.accept(Instant::now()) {
                        tracing::debug!(%button, "Ignoring bounce");
                        continue;
                    }

                    tracing::info!(%button, "Button pressed");
                    if let Some(led) = led.as_ref() {
                        let _ = led.try_send(press_flash);
                    }
                    on_press(button);
                }

                tracing::info!("Button monitor stopped");
            }
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Button monitor panicked");
            }
        }
    }
}

/// Callback turning a button press into a switch request via the configured mapping.
pub fn switch_on_press(
    buttons: BTreeMap<ButtonId, String>,
    pending: PendingSwitch,
) -> impl FnMut(ButtonId) + Send + 'static {
    move |button| {
        let Some(target) = buttons.get(&button) else {
            tracing::warn!(%button, "Button has no mode assigned");
            return;
        };

        match target.parse::<ModeName>() {
            Ok(mode) => pending.request_switch(mode),
            Err(error) => tracing::warn!(%button, %error, "Ignoring button press"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_debounce_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        let start = Instant::now();

        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_millis(100)));
        assert!(!debouncer.accept(start + Duration::from_millis(499)));
        assert!(debouncer.accept(start + Duration::from_millis(500)));
        assert!(!debouncer.accept(start + Duration::from_millis(700)));
        assert!(debouncer.accept(start + Duration::from_millis(1200)));
    }

    #[test]
    fn test_press_requests_mapped_mode() {
        let buttons = BTreeMap::from([
            (ButtonId::A, "weather".to_string()),
            (ButtonId::B, "solar_monitor".to_string()),
        ]);
        let pending = PendingSwitch::default();
        let mut on_press = switch_on_press(buttons, pending.clone());

        on_press(ButtonId::B);
        on_press(ButtonId::D);
        assert_eq!(pending.take(), None);

        on_press(ButtonId::A);
        assert_eq!(pending.take(), Some(ModeName::Weather));
    }

    #[test]
    fn test_missing_chip_gives_no_monitor() {
        let config = GpioConfig {
            chip: "/dev/paperframe-no-such-chip".into(),
            ..GpioConfig::default()
        };
        assert!(ButtonMonitor::start(&config, None, |_| {}).is_none());
    }
}
