//! Shared helpers for the integration tests.

use kernel_mmu::{AddressSpace, ConfigError, FrameAlloc, HostFrames, MmuConfig, PageArena, PhysMapper};
use log::{LevelFilter, Log, Metadata, Record};
use std::sync::Once;

/// Minimal `log` sink: `[LEVEL] target: message` on stderr.
pub struct StderrLogger {
    max_level: LevelFilter,
}

impl StderrLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger::new(LevelFilter::Trace);

/// Install the logger once per test binary.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Build an address space over either backend.
pub trait Backend: FrameAlloc + PhysMapper + Sized {
    fn create(config: &MmuConfig) -> Result<Self, ConfigError>;
}

impl Backend for PageArena {
    fn create(config: &MmuConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config))
    }
}

impl Backend for HostFrames {
    fn create(config: &MmuConfig) -> Result<Self, ConfigError> {
        Self::new(config)
    }
}

pub fn address_space<B: Backend>(page_offset_bits: u32, levels: u32) -> AddressSpace<B> {
    init_logging();
    let config = MmuConfig::new(page_offset_bits, levels).expect("valid geometry");
    let memory = B::create(&config).expect("backend");
    AddressSpace::with_memory(config, memory).expect("address space")
}
