//! Logger setup. While the terminal UI owns the screen, records are held in
//! memory and written to stderr once the terminal is restored.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Shared buffer that collects formatted log records
#[derive(Clone, Default)]
pub struct HeldLog(Arc<Mutex<Vec<u8>>>);

impl HeldLog {
    /// Write everything held so far to `out` and empty the buffer
    pub fn drain_to(&self, out: &mut impl Write) -> io::Result<()> {
        let held = std::mem::take(&mut *self.lock()?);
        out.write_all(&held)?;
        out.flush()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Vec<u8>>> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))
    }
}

impl Write for HeldLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install the global logger (filtered by `RUST_LOG`, errors only by default).
/// With `hold`, records go to the returned buffer instead of stderr.
pub fn init(hold: bool) -> HeldLog {
    let held = HeldLog::default();
    let env = env_logger::Env::default().default_filter_or("error");
    let mut builder = env_logger::Builder::from_env(env);
    if hold {
        builder.target(env_logger::Target::Pipe(Box::new(held.clone())));
    }
    builder.init();
    held
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_records_drain_once() {
        let held = HeldLog::default();
        let mut writer = held.clone();
        writeln!(writer, "[ERROR covid_map::app] Failed to load dataset").unwrap();

        let mut out = Vec::new();
        held.drain_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[ERROR covid_map::app] Failed to load dataset\n"
        );

        let mut again = Vec::new();
        held.drain_to(&mut again).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_logger_writes_into_held_buffer() {
        let held = HeldLog::default();
        let logger = env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
            .target(env_logger::Target::Pipe(Box::new(held.clone())))
            .build();

        log::Log::log(
            &logger,
            &log::Record::builder()
                .level(log::Level::Error)
                .args(format_args!("fetch failed"))
                .build(),
        );

        let mut out = Vec::new();
        held.drain_to(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "ERROR: fetch failed\n");
    }
}
