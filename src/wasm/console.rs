use std::io;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;
use web_sys::console;

/// Buffers one formatted event and hands it to the console on drop.
pub struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        let msg = JsValue::from_str(line.trim_end());
        match self.level {
            Level::ERROR => console::error_1(&msg),
            Level::WARN => console::warn_1(&msg),
            Level::INFO => console::info_1(&msg),
            _ => console::log_1(&msg),
        }
    }
}

pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            level: Level::INFO,
            buf: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        ConsoleWriter {
            level: *meta.level(),
            buf: Vec::new(),
        }
    }
}

/// Routes tracing output and panics to the browser console. Safe to call
/// more than once.
pub fn init() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            console::error_1(&JsValue::from_str(&format!("{info}")));
        }));

        // The default timer reads the system clock, which wasm32 lacks.
        let installed = tracing_subscriber::fmt()
            .with_writer(ConsoleMakeWriter)
            .with_max_level(Level::DEBUG)
            .without_time()
            .with_target(false)
            .try_init();
        // On failure a global subscriber already exists and receives this.
        if let Err(err) = installed {
            tracing::debug!(%err, "keeping the existing tracing subscriber");
        }
    });
}
