use std::thread::JoinHandle;
use std::time::Duration;

use camino::Utf8Path;
use gpiocdev::line::Value;

const QUEUE_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    Flash { count: u8, on: Duration, off: Duration },
}

/// Thread driving the feedback LED from a queue of commands.
///
/// The thread exits once every sender has been dropped.
#[derive(Debug)]
pub struct LedWorker {
    handle: JoinHandle<()>,
}

impl LedWorker {
    /// Request the LED line and start the worker. `None` when the line is unavailable.
    pub fn start(
        chip: &Utf8Path,
        offset: u32,
    ) -> Option<(Self, tokio::sync::mpsc::Sender<LedCommand>)> {
        let request = gpiocdev::Request::builder()
            .on_chip(chip.as_std_path())
            .with_consumer(env!("CARGO_PKG_NAME"))
            .with_line(offset)
            .as_output(Value::Inactive)
            .request();

        let request = match request {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(%chip, offset, %error, "LED not available");
                return None;
            }
        };

        let worker = Self::spawn(move |on| {
            let value = if on { Value::Active } else { Value::Inactive };
            if let Err(error) = request.set_value(offset, value) {
                tracing::warn!(offset, %error, "Failed to set LED");
            }
        });
        Some(worker)
    }

    /// Start the worker with an arbitrary LED setter.
    pub fn spawn<F>(mut set_led: F) -> (Self, tokio::sync::mpsc::Sender<LedCommand>)
    where
        F: FnMut(bool) + Send + 'static,
    {
        let (sender, mut receiver) = tokio::sync::mpsc::channel(QUEUE_DEPTH);

        let handle = std::thread::spawn(move || {
            tracing::debug!("LED worker started");
            while let Some(command) = receiver.blocking_recv() {
                match command {
                    LedCommand::Flash { count, on, off } => {
                        for i in 0..count {
                            if i > 0 {
                                std::thread::sleep(off);
                            }
                            set_led(true);
                            std::thread::sleep(on);
                            set_led(false);
                        }
                    }
                }
            }
            tracing::debug!("LED worker finished");
        });

        (Self { handle }, sender)
    }

    /// Wait for the worker to drain its queue. Only returns once all senders are gone.
    pub fn join(self) {
        if self.handle.join().is_err() {
            tracing::error!("LED worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_flash_sequence() {
        let states = Arc::new(Mutex::new(Vec::new()));
        let (worker, sender) = LedWorker::spawn({
            let states = states.clone();
            move |on| states.lock().unwrap().push(on)
        });

        sender
            .try_send(LedCommand::Flash {
                count: 3,
                on: Duration::from_millis(1),
                off: Duration::from_millis(1),
            })
            .unwrap();
        drop(sender);
        worker.join();

        assert_eq!(
            *states.lock().unwrap(),
            vec![true, false, true, false, true, false]
        );
    }
}
