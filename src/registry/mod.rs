// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Driver Registry
//!
//! OID-keyed table of registered peripheral drivers and their lifecycle:
//!
//! ```text
//! Unregistered → Registered → Initialized ⇄ Polling
//!                                  │
//!                                  └→ Closed
//! ```
//!
//! `Unregistered` is the absence of an entry. `Closed` parks the OID until a firmware reset.
//! The registry is the sole owner of every device handle; a handle exists exactly while the
//! entry is `Initialized` or `Polling`. All operations are called from the dispatcher's single
//! execution context, which is what makes hooks non-reentrant.
//!
//! ## Modules
//!
//! - [`attrs`] - Typed per-driver attribute store.
//! - [`driver`] - The registration contract (`Driver` trait, `DriverConfig`).

pub mod attrs;
pub mod driver;

pub use attrs::{AttrBag, AttrError, AttrValue};
pub use driver::{Driver, DriverConfig, DriverError, HookSet, PollStatus, SampleBuf};

use log::{debug, warn};

use crate::bus::{BusClaim, BusManager};

/// Registry capacity; OIDs are `0..MAX_DRIVERS`.
pub const MAX_DRIVERS: usize = 64;

/// Object identifier naming one driver instance.
pub type Oid = u8;

/// Lifecycle state of a live registry entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriverState {
    Registered,
    Initialized,
    Polling,
    Closed,
}

/// Failures from registry operations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegistryError {
    OidOutOfRange,
    AlreadyRegistered,
    /// No live entry under this OID.
    Unknown,
    WrongState,
    NoPollHook,
    /// Attribute write rejected.
    Attr(AttrError),
    /// Init hook failed; the entry stayed `Registered`.
    Init(DriverError),
    /// Read/Poll hook failed.
    Hook(DriverError),
}

struct Entry<D> {
    config: DriverConfig,
    state: DriverState,
    device: Option<D>,
    claim: Option<BusClaim>,
    poll_errors: u32,
}

/// Fixed-capacity driver table, generic over the firmware's device handle type.
pub struct Registry<D: Driver> {
    entries: [Option<Entry<D>>; MAX_DRIVERS],
}

impl<D: Driver> Registry<D> {
    pub fn new() -> Self {
        Self {
            entries: core::array::from_fn(|_| None),
        }
    }

    fn entry(&self, oid: Oid) -> Result<&Entry<D>, RegistryError> {
        self.entries
            .get(oid as usize)
            .ok_or(RegistryError::OidOutOfRange)?
            .as_ref()
            .ok_or(RegistryError::Unknown)
    }

    fn entry_mut(&mut self, oid: Oid) -> Result<&mut Entry<D>, RegistryError> {
        self.entries
            .get_mut(oid as usize)
            .ok_or(RegistryError::OidOutOfRange)?
            .as_mut()
            .ok_or(RegistryError::Unknown)
    }

    /// Current lifecycle state, `None` for vacant OIDs.
    pub fn state(&self, oid: Oid) -> Option<DriverState> {
        self.entry(oid).ok().map(|e| e.state)
    }

    /// Config of a live entry.
    pub fn config(&self, oid: Oid) -> Option<&DriverConfig> {
        self.entry(oid).ok().map(|e| &e.config)
    }

    /// Whether the entry currently owns a device handle.
    pub fn has_device(&self, oid: Oid) -> bool {
        self.entry(oid).is_ok_and(|e| e.device.is_some())
    }

    /// Store a new entry in state `Registered`. Does not run Init.
    pub fn register(&mut self, oid: Oid, config: DriverConfig) -> Result<(), RegistryError> {
        let slot = self
            .entries
            .get_mut(oid as usize)
            .ok_or(RegistryError::OidOutOfRange)?;
        if slot.is_some() {
            return Err(RegistryError::AlreadyRegistered);
        }
        *slot = Some(Entry {
            config,
            state: DriverState::Registered,
            device: None,
            claim: None,
            poll_errors: 0,
        });
        debug!("oid {} registered", oid);
        Ok(())
    }

    /// Attach an attribute. Only possible before Init locks the bag.
    pub fn set_attr(
        &mut self,
        oid: Oid,
        key: &[u8],
        value: AttrValue,
    ) -> Result<(), RegistryError> {
        let entry = self.entry_mut(oid)?;
        if entry.state == DriverState::Closed {
            return Err(RegistryError::Unknown);
        }
        entry
            .config
            .attrs_mut()
            .set(key, value)
            .map_err(RegistryError::Attr)
    }

    /// Run the Init hook: `Registered → Initialized`. A failed Init releases the bus claim
    /// and leaves the entry `Registered`.
    pub fn configure(
        &mut self,
        oid: Oid,
        buses: &mut BusManager<'_>,
    ) -> Result<(), RegistryError> {
        let entry = self.entry_mut(oid)?;
        match entry.state {
            DriverState::Registered => {}
            DriverState::Closed => return Err(RegistryError::Unknown),
            _ => return Err(RegistryError::WrongState),
        }
        let claim = buses
            .claim(entry.config.bus_kind(), entry.config.bus_index())
            .map_err(|_| RegistryError::Init(DriverError::Failed("no_such_bus")))?;
        match D::init(&entry.config, buses) {
            Ok(device) => {
                entry.device = Some(device);
                entry.claim = Some(claim);
                entry.config.attrs_mut().lock();
                entry.state = DriverState::Initialized;
                debug!("oid {} initialized", oid);
                Ok(())
            }
            Err(err) => {
                buses.release(claim);
                Err(RegistryError::Init(err))
            }
        }
    }

    /// One-shot Read. Valid in `Initialized` and `Polling`.
    pub fn query(
        &mut self,
        oid: Oid,
        buses: &mut BusManager<'_>,
        params: &[u8],
        out: &mut SampleBuf,
    ) -> Result<(), RegistryError> {
        let entry = self.entry_mut(oid)?;
        match entry.state {
            DriverState::Initialized | DriverState::Polling => {}
            DriverState::Closed => return Err(RegistryError::Unknown),
            DriverState::Registered => return Err(RegistryError::WrongState),
        }
        let Some(device) = entry.device.as_mut() else {
            return Err(RegistryError::WrongState);
        };
        device.read(buses, params, out).map_err(RegistryError::Hook)
    }

    /// `Initialized → Polling`. The caller mirrors the transition into the scheduler.
    pub fn start_poll(&mut self, oid: Oid) -> Result<(), RegistryError> {
        let entry = self.entry_mut(oid)?;
        match entry.state {
            DriverState::Initialized => {}
            DriverState::Closed => return Err(RegistryError::Unknown),
            _ => return Err(RegistryError::WrongState),
        }
        let Some(device) = entry.device.as_ref() else {
            return Err(RegistryError::WrongState);
        };
        if !device.hooks().contains(HookSet::POLL) {
            return Err(RegistryError::NoPollHook);
        }
        entry.state = DriverState::Polling;
        debug!("oid {} polling", oid);
        Ok(())
    }

    /// `Polling → Initialized`.
    pub fn stop_poll(&mut self, oid: Oid) -> Result<(), RegistryError> {
        let entry = self.entry_mut(oid)?;
        match entry.state {
            DriverState::Polling => {}
            DriverState::Closed => return Err(RegistryError::Unknown),
            _ => return Err(RegistryError::WrongState),
        }
        entry.state = DriverState::Initialized;
        debug!("oid {} stopped polling", oid);
        Ok(())
    }

    /// Tear an entry down. Runs the Close hook if a handle exists; Close failures are
    /// logged, never surfaced. The OID stays parked in `Closed` until firmware reset.
    pub fn close(&mut self, oid: Oid, buses: &mut BusManager<'_>) -> Result<(), RegistryError> {
        let entry = self.entry_mut(oid)?;
        if entry.state == DriverState::Closed {
            return Err(RegistryError::Unknown);
        }
        if let Some(mut device) = entry.device.take() {
            if let Err(err) = device.close(buses) {
                warn!("oid {} close failed: {:?}", oid, err);
            }
        }
        if let Some(claim) = entry.claim.take() {
            buses.release(claim);
        }
        entry.state = DriverState::Closed;
        debug!("oid {} closed", oid);
        Ok(())
    }

    /// Invoke the Poll hook. Only meaningful in `Polling`.
    pub fn poll_entry(
        &mut self,
        oid: Oid,
        buses: &mut BusManager<'_>,
        out: &mut SampleBuf,
    ) -> Result<PollStatus, RegistryError> {
        let entry = self.entry_mut(oid)?;
        if entry.state != DriverState::Polling {
            return Err(RegistryError::WrongState);
        }
        let Some(device) = entry.device.as_mut() else {
            return Err(RegistryError::WrongState);
        };
        device.poll(buses, out).map_err(RegistryError::Hook)
    }

    /// Bump the per-entry poll error counter (`__errors`).
    pub fn note_poll_error(&mut self, oid: Oid) {
        if let Ok(entry) = self.entry_mut(oid) {
            entry.poll_errors = entry.poll_errors.saturating_add(1);
        }
    }

    /// Attribute lookup on a live entry. The reserved key `__errors` reads the
    /// per-entry poll error counter.
    pub fn attr(&self, oid: Oid, key: &[u8]) -> Option<AttrValue> {
        let entry = self.entry(oid).ok()?;
        if entry.state == DriverState::Closed {
            return None;
        }
        if key == b"__errors" {
            return Some(AttrValue::U64(u64::from(entry.poll_errors)));
        }
        entry.config.attrs().get(key)
    }
}

impl<D: Driver> Default for Registry<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, BusIo, BusKind};

    struct NullBus;

    impl BusIo for NullBus {
        fn write(&mut self, _addr: u16, _bytes: &[u8]) -> Result<(), BusError> {
            Ok(())
        }

        fn read(&mut self, _addr: u16, buf: &mut [u8]) -> Result<(), BusError> {
            buf.fill(0);
            Ok(())
        }

        fn write_then_read(
            &mut self,
            _addr: u16,
            _bytes: &[u8],
            buf: &mut [u8],
        ) -> Result<(), BusError> {
            buf.fill(0);
            Ok(())
        }
    }

    /// Minimal in-tree driver: behavior is steered by the config name.
    struct MockDriver {
        polls: u8,
        pollable: bool,
    }

    impl Driver for MockDriver {
        fn init(config: &DriverConfig, _buses: &mut BusManager<'_>) -> Result<Self, DriverError> {
            if config.name() == b"mock_badinit" {
                return Err(DriverError::Bus(BusError::Nack));
            }
            Ok(Self {
                polls: 0,
                pollable: config.name() != b"mock_nopoll",
            })
        }

        fn hooks(&self) -> HookSet {
            let base = HookSet::INIT | HookSet::READ;
            if self.pollable {
                base | HookSet::POLL
            } else {
                base
            }
        }

        fn read(
            &mut self,
            _buses: &mut BusManager<'_>,
            params: &[u8],
            out: &mut SampleBuf,
        ) -> Result<(), DriverError> {
            out.extend_from_slice(params);
            Ok(())
        }

        fn poll(
            &mut self,
            _buses: &mut BusManager<'_>,
            out: &mut SampleBuf,
        ) -> Result<PollStatus, DriverError> {
            self.polls += 1;
            out.push(self.polls);
            Ok(PollStatus::Ready)
        }
    }

    fn cfg(name: &[u8]) -> DriverConfig {
        DriverConfig::new(name, BusKind::I2c, 0, 0x29).unwrap()
    }

    fn buses(io: &mut NullBus) -> BusManager<'_> {
        let mut mgr = BusManager::new();
        mgr.install(BusKind::I2c, 0, io).unwrap();
        mgr
    }

    #[test]
    fn oid_range_and_double_register() {
        let mut reg: Registry<MockDriver> = Registry::new();
        assert_eq!(
            reg.register(64, cfg(b"mock")),
            Err(RegistryError::OidOutOfRange)
        );
        reg.register(5, cfg(b"mock")).unwrap();
        assert_eq!(
            reg.register(5, cfg(b"mock")),
            Err(RegistryError::AlreadyRegistered)
        );
        assert_eq!(reg.state(5), Some(DriverState::Registered));
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(1, cfg(b"mock")).unwrap();
        assert!(!reg.has_device(1));

        reg.configure(1, &mut buses).unwrap();
        assert_eq!(reg.state(1), Some(DriverState::Initialized));
        assert!(reg.has_device(1));

        reg.start_poll(1).unwrap();
        assert_eq!(reg.state(1), Some(DriverState::Polling));
        assert!(reg.has_device(1));

        reg.stop_poll(1).unwrap();
        assert_eq!(reg.state(1), Some(DriverState::Initialized));

        reg.close(1, &mut buses).unwrap();
        assert_eq!(reg.state(1), Some(DriverState::Closed));
        assert!(!reg.has_device(1));
    }

    #[test]
    fn failed_init_stays_registered() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(2, cfg(b"mock_badinit")).unwrap();
        assert_eq!(
            reg.configure(2, &mut buses),
            Err(RegistryError::Init(DriverError::Bus(BusError::Nack)))
        );
        assert_eq!(reg.state(2), Some(DriverState::Registered));
        assert!(!reg.has_device(2));

        // Query before Init is a state error.
        let mut out = SampleBuf::new();
        assert_eq!(
            reg.query(2, &mut buses, &[], &mut out),
            Err(RegistryError::WrongState)
        );
    }

    #[test]
    fn query_valid_in_initialized_and_polling() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(3, cfg(b"mock")).unwrap();
        reg.configure(3, &mut buses).unwrap();

        let mut out = SampleBuf::new();
        reg.query(3, &mut buses, b"ping", &mut out).unwrap();
        assert_eq!(out.as_slice(), b"ping");

        reg.start_poll(3).unwrap();
        out.clear();
        reg.query(3, &mut buses, b"pong", &mut out).unwrap();
        assert_eq!(out.as_slice(), b"pong");
    }

    #[test]
    fn start_poll_requires_poll_hook() {
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        let mut reg: Registry<MockDriver> = Registry::new();
        reg.register(9, cfg(b"mock_nopoll")).unwrap();
        reg.configure(9, &mut buses).unwrap();
        assert_eq!(reg.start_poll(9), Err(RegistryError::NoPollHook));
        assert_eq!(reg.state(9), Some(DriverState::Initialized));
    }

    #[test]
    fn stop_poll_twice() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(4, cfg(b"mock")).unwrap();
        reg.configure(4, &mut buses).unwrap();
        reg.start_poll(4).unwrap();
        reg.stop_poll(4).unwrap();
        assert_eq!(reg.stop_poll(4), Err(RegistryError::WrongState));
    }

    #[test]
    fn closed_oid_is_parked() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(6, cfg(b"mock")).unwrap();
        reg.configure(6, &mut buses).unwrap();
        reg.close(6, &mut buses).unwrap();

        assert_eq!(reg.close(6, &mut buses), Err(RegistryError::Unknown));
        assert_eq!(reg.configure(6, &mut buses), Err(RegistryError::Unknown));
        assert_eq!(reg.start_poll(6), Err(RegistryError::Unknown));
        // The slot stays occupied: re-registration is not possible until reset.
        assert_eq!(
            reg.register(6, cfg(b"mock")),
            Err(RegistryError::AlreadyRegistered)
        );
    }

    #[test]
    fn close_while_polling() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(7, cfg(b"mock")).unwrap();
        reg.configure(7, &mut buses).unwrap();
        reg.start_poll(7).unwrap();
        reg.close(7, &mut buses).unwrap();
        assert_eq!(reg.state(7), Some(DriverState::Closed));
    }

    #[test]
    fn attrs_lock_and_errors_counter() {
        let mut reg: Registry<MockDriver> = Registry::new();
        let mut io = NullBus;
        let mut buses = buses(&mut io);
        reg.register(8, cfg(b"mock")).unwrap();
        reg.set_attr(8, b"rate", AttrValue::U64(100)).unwrap();
        reg.configure(8, &mut buses).unwrap();

        assert_eq!(
            reg.set_attr(8, b"rate", AttrValue::U64(200)),
            Err(RegistryError::Attr(AttrError::Locked))
        );
        assert_eq!(reg.attr(8, b"rate"), Some(AttrValue::U64(100)));

        assert_eq!(reg.attr(8, b"__errors"), Some(AttrValue::U64(0)));
        reg.note_poll_error(8);
        reg.note_poll_error(8);
        assert_eq!(reg.attr(8, b"__errors"), Some(AttrValue::U64(2)));
    }
}
