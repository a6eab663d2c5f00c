//! UART log output.
//!
//! Drains both per-core log streams to a TX-only UART so the host side of
//! the emulator stays observable without touching the real-time loops.
//!
//! # Hardware Setup
//!
//! ```text
//! ESP32-S3 GPIO6 (TX) ──────▶ USB-UART RX
//!                              └─▶ PC Serial Monitor
//! ```
//!
//! **WARNING**: GPIO6 conflicts with Octal PSRAM. Only use on Quad flash
//! boards!

use crate::logging::LogEntry;

#[cfg(not(test))]
use crate::log_globals::{IF_LOG_STREAM, SYNTH_LOG_STREAM};

#[cfg(not(test))]
use esp_idf_svc::hal::gpio;
#[cfg(not(test))]
use esp_idf_svc::hal::peripheral::Peripheral;
#[cfg(not(test))]
use esp_idf_svc::hal::uart::{self, UartTxDriver};

/// UART configuration for logging.
pub struct UartLoggerConfig {
    pub baud_rate: u32,
    pub tx_pin: u8,
}

impl Default for UartLoggerConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            tx_pin: 6, // GPIO6 - UART TX (Quad flash, GPIO6 free for UART)
        }
    }
}

/// Format log entry to string.
///
/// Format: `[timestamp_us] LEVEL: message\n`
fn format_log_entry(entry: &LogEntry, buf: &mut [u8]) -> usize {
    use core::fmt::Write;

    struct BufWriter<'a> {
        buf: &'a mut [u8],
        pos: usize,
    }

    impl<'a> Write for BufWriter<'a> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            let remaining = self.buf.len() - self.pos;
            let to_write = bytes.len().min(remaining);
            self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
            Ok(())
        }
    }

    let mut writer = BufWriter { buf, pos: 0 };

    let _ = write!(
        writer,
        "[{:10}] {}: {}\n",
        entry.timestamp_us,
        entry.level.as_str(),
        core::str::from_utf8(&entry.msg[..entry.len as usize]).unwrap_or("<invalid utf8>")
    );

    writer.pos
}

/// Initialize UART1 TX-only for logging output.
#[cfg(not(test))]
pub fn init_uart_logger<'d>(
    uart: impl Peripheral<P = esp_idf_svc::hal::uart::UART1> + 'd,
    tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'd,
    config: &UartLoggerConfig,
) -> Result<UartTxDriver<'d>, esp_idf_svc::sys::EspError> {
    let uart_config =
        uart::config::Config::default().baudrate(esp_idf_svc::hal::units::Hertz(config.baud_rate));

    UartTxDriver::new(
        uart,
        tx_pin,
        Option::<gpio::AnyIOPin>::None, // CTS
        Option::<gpio::AnyIOPin>::None, // RTS
        &uart_config,
    )
}

/// Write a single log entry to UART.
#[cfg(not(test))]
pub fn write_log_to_uart(uart: &mut UartTxDriver<'_>, entry: &LogEntry) {
    let mut format_buf = [0u8; 256];
    let len = format_log_entry(entry, &mut format_buf);
    let _ = uart.write(&format_buf[..len]);
}

/// UART log drain loop.
///
/// Runs above the render loop's priority on core 1 but sleeps nearly
/// always; while a session renders it backs off entirely, because logs
/// are droppable and sample deadlines are not.
///
/// Drains IF_LOG_STREAM and SYNTH_LOG_STREAM in bounded bursts and
/// reports dropped-message counts every 10 seconds.
#[cfg(not(test))]
pub fn uart_logger_task(uart: &mut UartTxDriver<'_>, signal: &crate::signal::SignalState) -> ! {
    let mut format_buf = [0u8; 256];
    let mut last_dropped_report = 0i64;

    loop {
        if signal.is_busy() {
            unsafe {
                esp_idf_svc::sys::vTaskDelay(1);
            }
            continue;
        }

        let mut work_done = false;

        // Priority 1: interface stream (protocol events, faults)
        for _ in 0..8 {
            let Some(entry) = IF_LOG_STREAM.drain() else {
                break;
            };
            let len = format_log_entry(&entry, &mut format_buf);
            let _ = uart.write(&format_buf[..len]);
            work_done = true;
        }

        // Priority 2: synthesis stream (session reports)
        for _ in 0..8 {
            let Some(entry) = SYNTH_LOG_STREAM.drain() else {
                break;
            };
            let len = format_log_entry(&entry, &mut format_buf);
            let _ = uart.write(&format_buf[..len]);
            work_done = true;
        }

        // Report dropped messages every 10 seconds
        let now = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        if now - last_dropped_report > 10_000_000 {
            let if_dropped = IF_LOG_STREAM.dropped();
            let synth_dropped = SYNTH_LOG_STREAM.dropped();

            if if_dropped > 0 || synth_dropped > 0 {
                let mut msg = [0u8; 64];
                let len = crate::logging::format_to_buffer(
                    &mut msg,
                    format_args!("[WARN] Dropped: IF={}, SYNTH={}\n", if_dropped, synth_dropped),
                );
                let _ = uart.write(&msg[..len]);

                IF_LOG_STREAM.reset_dropped();
                SYNTH_LOG_STREAM.reset_dropped();
            }

            last_dropped_report = now;
        }

        // Yield between bursts; longer when nothing is flowing
        unsafe {
            esp_idf_svc::sys::vTaskDelay(if work_done { 1 } else { 10 });
        }
    }
}
