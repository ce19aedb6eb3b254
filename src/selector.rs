use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use crate::display::Display;
use crate::led::LedCommand;
use crate::modes::Mode;
use crate::modes::ModeName;

const FLASH_ON: Duration = Duration::from_millis(200);
const FLASH_OFF: Duration = Duration::from_millis(100);

/// Switch request handed from the button thread to the scheduler.
///
/// Holds at most one request; a newer request replaces an older one.
#[derive(Debug, Clone, Default)]
pub struct PendingSwitch(Arc<Mutex<Option<ModeName>>>);

impl PendingSwitch {
    pub fn request_switch(&self, name: ModeName) {
        tracing::debug!(mode = %name, "Switch requested");
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(name);
    }

    pub(crate) fn take(&self) -> Option<ModeName> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Owns the modes and decides which one receives `update()`.
pub struct Selector<M> {
    registry: BTreeMap<ModeName, M>,
    current: Option<ModeName>,
    pending: PendingSwitch,
    led: Option<tokio::sync::mpsc::Sender<LedCommand>>,
}

impl<M: Mode> Selector<M> {
    /// Start with `initial` if it is registered, otherwise with the first registered mode.
    pub fn new(registry: BTreeMap<ModeName, M>, initial: ModeName) -> Self {
        let current = if registry.contains_key(&initial) {
            Some(initial)
        } else {
            let fallback = registry.keys().next().copied();
            tracing::warn!(mode = %initial, ?fallback, "Initial mode not available");
            fallback
        };

        Self {
            registry,
            current,
            pending: PendingSwitch::default(),
            led: None,
        }
    }

    pub fn with_led(mut self, led: tokio::sync::mpsc::Sender<LedCommand>) -> Self {
        self.led = Some(led);
        self
    }

    /// Handle for requesting switches from other threads.
    pub fn pending(&self) -> PendingSwitch {
        self.pending.clone()
    }

    pub fn current(&self) -> Option<ModeName> {
        self.current
    }

    /// Apply a queued switch request. Returns whether the current mode changed.
    pub fn apply_pending(&mut self) -> bool {
        let Some(requested) = self.pending.take() else {
            return false;
        };

        if self.current == Some(requested) {
            tracing::debug!(mode = %requested, "Already in requested mode");
            return false;
        }

        let Some(mode) = self.registry.get_mut(&requested) else {
            tracing::error!(mode = %requested, "Requested mode is not available");
            return false;
        };

        tracing::info!(from = ?self.current, to = %requested, "Switching mode");
        mode.on_enter();
        self.current = Some(requested);
        self.acknowledge(requested);
        true
    }

    fn acknowledge(&self, mode: ModeName) {
        let Some(led) = self.led.as_ref() else {
            return;
        };

        let command = LedCommand::Flash {
            count: mode.flash_count(),
            on: FLASH_ON,
            off: FLASH_OFF,
        };
        if let Err(error) = led.try_send(command) {
            tracing::warn!(%mode, %error, "Could not queue LED acknowledgement");
        }
    }

    /// One scheduler iteration. Mode errors are shown on the display, never returned.
    pub async fn tick(&mut self, display: &mut dyn Display) -> bool {
        let switched = self.apply_pending();

        let Some(name) = self.current else {
            return switched;
        };
        let Some(mode) = self.registry.get_mut(&name) else {
            return switched;
        };

        if let Err(error) = mode.update(display).await {
            tracing::error!(mode = %name, ?error, "Mode update failed");
            let message = format!("Error in {name}: {error}");
            if let Err(error) = crate::screens::show_error(display, &message) {
                tracing::error!(?error, "Failed to show error screen");
            }
        }

        switched
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::display::testing::RecordingDisplay;
    use crate::modes::ModeError;

    #[derive(Default)]
    struct FakeMode {
        updates: usize,
        entered: usize,
        fail: bool,
    }

    impl Mode for FakeMode {
        async fn update(&mut self, _display: &mut dyn Display) -> Result<(), ModeError> {
            self.updates += 1;
            if self.fail {
                Err(ModeError::Display(crate::display::DisplayError::NoFrame))
            } else {
                Ok(())
            }
        }

        fn on_enter(&mut self) {
            self.entered += 1;
        }
    }

    fn selector(names: &[ModeName]) -> Selector<FakeMode> {
        let registry: BTreeMap<_, _> = names.iter().map(|n| (*n, FakeMode::default())).collect();
        Selector::new(registry, names[0])
    }

    #[test]
    fn test_switch_to_other_mode() {
        let mut selector = selector(&[ModeName::PhotoCycle, ModeName::Weather]);
        selector.pending().request_switch(ModeName::Weather);

        assert!(selector.apply_pending());
        assert_eq!(selector.current(), Some(ModeName::Weather));
        assert_eq!(selector.registry[&ModeName::Weather].entered, 1);

        // The request was consumed
        assert!(!selector.apply_pending());
    }

    #[test]
    fn test_switch_to_current_mode_is_noop() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let mut selector = selector(&[ModeName::PhotoCycle, ModeName::Weather]).with_led(tx);
        selector.pending().request_switch(ModeName::PhotoCycle);

        assert!(!selector.apply_pending());
        assert_eq!(selector.current(), Some(ModeName::PhotoCycle));
        assert_eq!(selector.registry[&ModeName::PhotoCycle].entered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_switch_to_unregistered_mode() {
        let mut selector = selector(&[ModeName::PhotoCycle]);
        selector.pending().request_switch(ModeName::DeviantartRss);

        assert!(!selector.apply_pending());
        assert_eq!(selector.current(), Some(ModeName::PhotoCycle));
        assert!(selector.pending.take().is_none());
    }

    #[test]
    fn test_last_request_wins() {
        let mut selector = selector(&[
            ModeName::PhotoCycle,
            ModeName::NewsFeed,
            ModeName::Weather,
        ]);
        let pending = selector.pending();
        pending.request_switch(ModeName::NewsFeed);
        pending.request_switch(ModeName::Weather);

        assert!(selector.apply_pending());
        assert_eq!(selector.current(), Some(ModeName::Weather));
        assert_eq!(selector.registry[&ModeName::NewsFeed].entered, 0);
    }

    #[test]
    fn test_switch_flashes_led() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let mut selector = selector(&[ModeName::PhotoCycle, ModeName::NewsFeed]).with_led(tx);
        selector.pending().request_switch(ModeName::NewsFeed);
        selector.apply_pending();

        let LedCommand::Flash { count, .. } = rx.try_recv().unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_full_led_queue_does_not_block() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let mut selector = selector(&[ModeName::PhotoCycle, ModeName::Weather]).with_led(tx);

        for name in [ModeName::Weather, ModeName::PhotoCycle, ModeName::Weather] {
            selector.pending().request_switch(name);
            assert!(selector.apply_pending());
        }
        assert_eq!(selector.current(), Some(ModeName::Weather));
    }

    #[test]
    fn test_unknown_initial_mode_falls_back() {
        let registry: BTreeMap<_, _> = [(ModeName::NewsFeed, FakeMode::default())].into();
        let selector = Selector::new(registry, ModeName::PhotoCycle);
        assert_eq!(selector.current(), Some(ModeName::NewsFeed));
    }

    #[tokio::test]
    async fn test_tick_updates_current_mode() {
        let mut selector = selector(&[ModeName::PhotoCycle, ModeName::Weather]);
        let mut display = RecordingDisplay::new(80, 48);

        selector.pending().request_switch(ModeName::Weather);
        assert!(selector.tick(&mut display).await);
        assert!(!selector.tick(&mut display).await);

        assert_eq!(selector.registry[&ModeName::Weather].updates, 2);
        assert_eq!(selector.registry[&ModeName::PhotoCycle].updates, 0);
        assert!(display.shown.is_empty());
    }

    #[tokio::test]
    async fn test_failing_update_shows_error_once() {
        let mut selector = selector(&[ModeName::PhotoCycle]);
        selector
            .registry
            .get_mut(&ModeName::PhotoCycle)
            .unwrap()
            .fail = true;
        let mut display = RecordingDisplay::new(800, 480);

        selector.tick(&mut display).await;

        assert_eq!(display.shown.len(), 1);
        assert!(display.shown[0].pixels().any(|p| p.0 == [255, 0, 0]));
    }

    #[tokio::test]
    async fn test_empty_registry_ticks_quietly() {
        let mut selector: Selector<FakeMode> = Selector::new(BTreeMap::new(), ModeName::Weather);
        let mut display = RecordingDisplay::new(80, 48);

        assert!(!selector.tick(&mut display).await);
        assert_eq!(selector.current(), None);
    }
}
