//! RustSp0256Emulator - Main entry point
//!
//! Core layout:
//! - Core 0 (interface): the ALD edge-detection loop, paced by the
//!   monotonic timer, driving LRQ/SBY back to the host.
//! - Core 1 (synthesis): the render loop at high priority, with the UART
//!   log drain above it that sleeps except for brief idle-time bursts.
//!
//! Everything shared is a `'static` atomic structure; the cores meet only
//! at the single-slot request channel and the signal state.

#![no_std]
#![no_main]

use esp_idf_svc::sys as esp_idf_sys;

#[cfg(feature = "embedded-bank")]
use core::cell::UnsafeCell;

use rust_sp0256_emulator::{
    allophone::AllophoneTable,
    channel::RequestSlot,
    config::CONFIG,
    fault::{FaultCode, FaultState},
    hal::{BusPinConfig, EspClock, PwmConfig, PwmSink, SignalBus},
    log_globals::{IF_LOG_STREAM, SYNTH_LOG_STREAM},
    playback::PlaybackEngine,
    protocol::{ProtocolEvent, ProtocolMonitor},
    rt_debug, rt_error, rt_info, rt_warn,
    signal::SignalState,
    uart_logger::{self, UartLoggerConfig},
};

/// Version string (set by build.rs, includes git hash)
const VERSION: &str = env!("VERSION_STRING");

/// "Hello" in allophones, the classic bring-up test.
const DEMO_SEQUENCE: [u8; 5] = [27, 7, 45, 53, 1]; // HH1 EH LL OW PA2

const SYNTH_TASK_STACK: u32 = 8192;
const LOG_TASK_STACK: u32 = 4096;
const SYNTH_TASK_PRIORITY: u32 = 5;
const LOG_TASK_PRIORITY: u32 = 6;

// Shared structures, statically allocated, wired into both cores.
static SIGNAL_STATE: SignalState = SignalState::new();
static REQUEST_SLOT: RequestSlot = RequestSlot::new();
static FAULT_STATE: FaultState = FaultState::new();

// Wrapper to make UnsafeCell Sync for the static sample pool.
// SAFETY: written exactly once during single-threaded startup, then only
// handed out as shared slices.
#[cfg(feature = "embedded-bank")]
#[repr(transparent)]
struct SyncCell<T>(UnsafeCell<T>);

#[cfg(feature = "embedded-bank")]
unsafe impl<T> Sync for SyncCell<T> {}

#[cfg(feature = "embedded-bank")]
impl<T> SyncCell<T> {
    const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    fn get(&self) -> *mut T {
        self.0.get()
    }
}

/// Decoded-sample pool for the flashed bank (~64 allophones of 8-bit PCM).
#[cfg(feature = "embedded-bank")]
const SAMPLE_POOL_SIZE: usize = 96 * 1024;

#[cfg(feature = "embedded-bank")]
static SAMPLE_POOL: SyncCell<[i8; SAMPLE_POOL_SIZE]> = SyncCell::new([0; SAMPLE_POOL_SIZE]);

/// The SP56 bank image compiled into flash.
#[cfg(feature = "embedded-bank")]
static BANK_IMAGE: &[u8] = include_bytes!("../assets/allophones.dat");

// Runtime-initialized singletons; written once in main before any task
// that reads them is spawned.
static mut ALLOPHONE_TABLE: Option<AllophoneTable<'static>> = None;
static mut PWM_SINK: Option<PwmSink<'static>> = None;
static mut LOG_UART: Option<esp_idf_svc::hal::uart::UartTxDriver<'static>> = None;

fn timestamp_us() -> i64 {
    unsafe { esp_idf_sys::esp_timer_get_time() }
}

#[cfg(feature = "embedded-bank")]
fn build_table() -> AllophoneTable<'static> {
    use rust_sp0256_emulator::allophone::AllophoneBank;

    // SAFETY: the pool is written only here, during single-threaded
    // startup; the table then serves immutable slices into it.
    let pool: &'static mut [i8] = unsafe { &mut (*SAMPLE_POOL.get())[..] };

    let now = timestamp_us();
    let decoded =
        AllophoneBank::parse(BANK_IMAGE).and_then(|bank| AllophoneTable::from_bank(&bank, pool));

    match decoded {
        Ok(table) => {
            rt_info!(
                IF_LOG_STREAM,
                now,
                "sample bank loaded: {} samples",
                table.total_samples()
            );
            table
        }
        Err(err) => {
            // Record in the fault history, then release the latch: the
            // placeholder table degrades to silence but the protocol side
            // still behaves and pauses still time correctly.
            FAULT_STATE.set(FaultCode::BankError, 0);
            FAULT_STATE.clear();
            rt_warn!(
                IF_LOG_STREAM,
                now,
                "sample bank rejected ({}), using placeholder table",
                err
            );
            AllophoneTable::placeholder()
        }
    }
}

#[cfg(not(feature = "embedded-bank"))]
fn build_table() -> AllophoneTable<'static> {
    rt_warn!(
        IF_LOG_STREAM,
        timestamp_us(),
        "no embedded sample bank, using placeholder table"
    );
    AllophoneTable::placeholder()
}

/// Initialize the allophone table (call once at startup).
fn init_allophone_table() -> &'static AllophoneTable<'static> {
    unsafe {
        ALLOPHONE_TABLE = Some(build_table());
        ALLOPHONE_TABLE.as_ref().unwrap()
    }
}

/// Synthesis task (core 1, high priority).
///
/// Polls the request slot with a short busy-wait so trigger-to-audio
/// latency stays in the tens of microseconds, then renders with
/// sample-accurate deadlines.
extern "C" fn synthesis_task(_arg: *mut core::ffi::c_void) {
    // SAFETY: both statics are initialized before this task is spawned
    let table = unsafe { ALLOPHONE_TABLE.as_ref().expect("table not initialized") };
    let sink = unsafe { PWM_SINK.take().expect("sink not initialized") };

    let mut engine = PlaybackEngine::new(
        table,
        &REQUEST_SLOT,
        &SIGNAL_STATE,
        &FAULT_STATE,
        EspClock,
        sink,
    );

    rt_info!(SYNTH_LOG_STREAM, timestamp_us(), "render loop running");

    loop {
        match engine.run_once() {
            Some(Ok(report)) => {
                rt_info!(
                    SYNTH_LOG_STREAM,
                    timestamp_us(),
                    "session {}: {} samples in {} us ({} permille, {} late)",
                    report.allophone_id,
                    report.samples_emitted,
                    report.elapsed_us,
                    report.accuracy_permille(),
                    report.late_samples
                );
            }
            Some(Err(fault)) => {
                rt_error!(
                    SYNTH_LOG_STREAM,
                    timestamp_us(),
                    "render fault: {:?}",
                    fault
                );
            }
            None => {
                // Idle or halted: short busy-wait, not vTaskDelay — a
                // tick-quantum sleep would add milliseconds to the next
                // trigger. The log drain preempts from above briefly.
                unsafe { esp_idf_sys::esp_rom_delay_us(10) };
            }
        }
    }
}

/// Log drain task (core 1, above the render loop, sleeps nearly always).
extern "C" fn log_drain_task(_arg: *mut core::ffi::c_void) {
    // SAFETY: initialized before this task is spawned
    let uart = unsafe { LOG_UART.as_mut().expect("uart not initialized") };
    uart_logger::uart_logger_task(uart, &SIGNAL_STATE)
}

/// Speak the bring-up demo through the same facade path the host uses.
fn speak_demo(monitor: &mut ProtocolMonitor<'_>) {
    for &id in DEMO_SEQUENCE.iter() {
        while SIGNAL_STATE.is_busy() {
            unsafe { esp_idf_sys::vTaskDelay(1) };
        }
        let _ = monitor.submit(id);
    }
}

#[no_mangle]
fn main() {
    // Initialize ESP-IDF
    esp_idf_sys::link_patches();

    // Both hot loops busy-wait on their cores, so the idle tasks the task
    // watchdog subscribes will starve. The fault state is the watchdog here.
    unsafe {
        esp_idf_sys::esp_task_wdt_deinit();
    }

    let table = init_allophone_table();
    rt_info!(
        IF_LOG_STREAM,
        timestamp_us(),
        "{} booting: {} allophones, {} total samples",
        VERSION,
        table.iter().count(),
        table.total_samples()
    );

    let Ok(peripherals) = esp_idf_svc::hal::peripherals::Peripherals::take() else {
        return;
    };

    // Hardware bring-up: bus pins, PWM output, log UART
    let mut bus = match SignalBus::new(&BusPinConfig::default()) {
        Ok(bus) => bus,
        Err(_) => {
            FAULT_STATE.set(FaultCode::HardwareFault, 0);
            return;
        }
    };

    match PwmSink::new(
        peripherals.ledc.channel0,
        peripherals.ledc.timer0,
        &PwmConfig::default(),
    ) {
        Ok(sink) => unsafe { PWM_SINK = Some(sink) },
        Err(_) => {
            FAULT_STATE.set(FaultCode::HardwareFault, 1);
            return;
        }
    }

    match uart_logger::init_uart_logger(
        peripherals.uart1,
        peripherals.pins.gpio6,
        &UartLoggerConfig::default(),
    ) {
        Ok(uart) => unsafe { LOG_UART = Some(uart) },
        Err(_) => {
            FAULT_STATE.set(FaultCode::HardwareFault, 2);
            return;
        }
    }

    // Spawn the synthesis side on core 1
    unsafe {
        esp_idf_sys::xTaskCreatePinnedToCore(
            Some(synthesis_task),
            b"synth\0".as_ptr() as *const _,
            SYNTH_TASK_STACK,
            core::ptr::null_mut(),
            SYNTH_TASK_PRIORITY,
            core::ptr::null_mut(),
            1,
        );
        esp_idf_sys::xTaskCreatePinnedToCore(
            Some(log_drain_task),
            b"logdrain\0".as_ptr() as *const _,
            LOG_TASK_STACK,
            core::ptr::null_mut(),
            LOG_TASK_PRIORITY,
            core::ptr::null_mut(),
            1,
        );
    }

    // Interface side stays on this task (core 0)
    let mut monitor = ProtocolMonitor::new(&SIGNAL_STATE, &REQUEST_SLOT, &FAULT_STATE);
    monitor.set_debounce_polls(CONFIG.debounce_polls());
    let mut config_gen = CONFIG.generation();
    let mut poll_interval = CONFIG.poll_interval_us() as i64;

    if CONFIG.startup_demo() {
        speak_demo(&mut monitor);
    }

    rt_info!(
        IF_LOG_STREAM,
        timestamp_us(),
        "interface loop running ({} us poll, debounce {})",
        poll_interval,
        CONFIG.debounce_polls()
    );

    // Power-on line levels: ready + standby
    let mut driven_busy = SIGNAL_STATE.is_busy();
    let _ = bus.drive(driven_busy);

    let mut next_poll = timestamp_us();
    loop {
        // Reload cached parameters when the config generation moves
        let gen = CONFIG.generation();
        if gen != config_gen {
            config_gen = gen;
            monitor.set_debounce_polls(CONFIG.debounce_polls());
            poll_interval = CONFIG.poll_interval_us() as i64;
        }

        // Sample the bus and feed the edge detector
        let ald = bus.ald_level();
        let address = bus.read_address();
        if let Some(event) = monitor.poll(ald, address) {
            let now = timestamp_us();
            match event {
                ProtocolEvent::Latched(id) => {
                    let name = table.get(id).map(|entry| entry.name()).unwrap_or("?");
                    rt_info!(IF_LOG_STREAM, now, "ALD: latched {} ({})", id, name);
                }
                ProtocolEvent::IgnoredBusy => {
                    rt_debug!(IF_LOG_STREAM, now, "ALD edge while busy, ignored");
                }
                ProtocolEvent::InvalidAddress => {
                    // Unreachable from a 6-bit bus; log and carry on
                    rt_warn!(IF_LOG_STREAM, now, "invalid address {} rejected", address);
                }
                ProtocolEvent::Overrun => {
                    rt_error!(IF_LOG_STREAM, now, "channel overrun: protocol halted");
                }
            }
        }

        // Mirror busy/standby onto the LRQ and SBY lines. Acceptance above
        // raises busy in the same iteration, so LRQ asserts within one
        // poll period of the edge; completion on the other core is picked
        // up here at most one period late.
        let busy = SIGNAL_STATE.is_busy();
        if busy != driven_busy {
            driven_busy = busy;
            if bus.drive(busy).is_err() {
                FAULT_STATE.set(FaultCode::HardwareFault, 3);
            }
        }

        // Absolute-deadline pacing, same discipline as the sample clock
        next_poll += poll_interval;
        if timestamp_us() >= next_poll {
            // Fell behind (config change, log burst); resync, don't burst
            next_poll = timestamp_us();
        } else {
            while timestamp_us() < next_poll {
                core::hint::spin_loop();
            }
        }
    }
}
