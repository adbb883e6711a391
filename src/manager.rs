//! High-level emulator manager
//!
//! This module owns the emulated remotes of every controller slot, runs the
//! periodic tick that drives their report loops, and routes packets from the
//! host to the right device.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::backend::{InputSource, MiiStorage, Transport};
use crate::config::{Config, DeviceSource};
use crate::wiimote::constants::MAX_WIIMOTES;
use crate::wiimote::Wiimote;

/// Remote wired to boxed collaborators, as stored in the arena
pub type EmulatedWiimote = Wiimote<Arc<dyn Transport>, Box<dyn InputSource>, Box<dyn MiiStorage>>;

/// Capacity of the inbound packet queue
const INBOUND_QUEUE_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Manager is already running")]
    AlreadyRunning,

    #[error("Slot {0} is out of range")]
    SlotOutOfRange(usize),

    #[error("Slot {0} already has a device")]
    SlotOccupied(usize),

    #[error("Slot {0} is not configured as emulated")]
    NotEmulated(usize),

    #[error("Inbound packet channel closed")]
    ChannelClosed,

    #[error("Failed to start worker thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// HID channel a packet arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Control,
    Interrupt,
}

/// A packet from the host, addressed to one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub slot: usize,
    pub channel: u16,
    pub kind: ChannelKind,
    pub data: Vec<u8>,
}

/// Slot-indexed owner of the emulated remotes
pub struct DeviceArena {
    slots: Vec<Option<Arc<EmulatedWiimote>>>,
}

impl Default for DeviceArena {
    fn default() -> Self {
        Self { slots: (0..MAX_WIIMOTES).map(|_| None).collect() }
    }
}

impl DeviceArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a device in the slot matching its index
    pub fn attach(
        &mut self,
        device: EmulatedWiimote,
    ) -> Result<Arc<EmulatedWiimote>, ManagerError> {
        let index = device.index();
        let slot = self.slots.get_mut(index).ok_or(ManagerError::SlotOutOfRange(index))?;
        if slot.is_some() {
            return Err(ManagerError::SlotOccupied(index));
        }
        let device = Arc::new(device);
        *slot = Some(Arc::clone(&device));
        Ok(device)
    }

    pub fn detach(&mut self, index: usize) -> Option<Arc<EmulatedWiimote>> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    pub fn get(&self, index: usize) -> Option<Arc<EmulatedWiimote>> {
        self.slots.get(index).and_then(|slot| slot.clone())
    }

    /// Every attached device, in slot order
    pub fn devices(&self) -> Vec<Arc<EmulatedWiimote>> {
        self.slots.iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Manager for the emulated remotes
pub struct EmulatorManager {
    config: Config,
    arena: Arc<Mutex<DeviceArena>>,
    packet_sender: Sender<InboundPacket>,
    packet_receiver: Receiver<InboundPacket>,
    /// Running flag
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl EmulatorManager {
    pub fn new(config: Config) -> Self {
        let (packet_sender, packet_receiver) = bounded(INBOUND_QUEUE_SIZE);
        Self {
            config,
            arena: Arc::new(Mutex::new(DeviceArena::new())),
            packet_sender,
            packet_receiver,
            running: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn arena(&self) -> std::sync::MutexGuard<'_, DeviceArena> {
        self.arena.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the remote of an emulated slot
    pub fn attach(
        &self,
        index: usize,
        transport: Arc<dyn Transport>,
        input: Box<dyn InputSource>,
        storage: Box<dyn MiiStorage>,
    ) -> Result<Arc<EmulatedWiimote>, ManagerError> {
        if index >= MAX_WIIMOTES {
            return Err(ManagerError::SlotOutOfRange(index));
        }
        if self.config.source(index) != DeviceSource::Emulated {
            return Err(ManagerError::NotEmulated(index));
        }

        let device = Wiimote::new(index, transport, input, storage, &self.config.settings);
        let device = self.arena().attach(device)?;
        info!("✓ {} attached", device.name());
        Ok(device)
    }

    /// Remove and return the remote of a slot
    pub fn detach(&self, index: usize) -> Option<Arc<EmulatedWiimote>> {
        let device = self.arena().detach(index);
        if let Some(device) = &device {
            info!("{} detached", device.name());
        }
        device
    }

    pub fn device(&self, index: usize) -> Option<Arc<EmulatedWiimote>> {
        self.arena().get(index)
    }

    pub fn device_count(&self) -> usize {
        self.arena().len()
    }

    /// Sender the transport uses to hand host packets to the pump thread
    pub fn packet_sender(&self) -> Sender<InboundPacket> {
        self.packet_sender.clone()
    }

    /// Queue a host packet for the pump thread
    pub fn submit(&self, packet: InboundPacket) -> Result<(), ManagerError> {
        self.packet_sender.send(packet).map_err(|_| ManagerError::ChannelClosed)
    }

    /// Route a host packet synchronously on the calling thread
    pub fn deliver(&self, packet: &InboundPacket) {
        Self::route(&self.arena, packet);
    }

    fn route(arena: &Mutex<DeviceArena>, packet: &InboundPacket) {
        let device = arena.lock().unwrap_or_else(|e| e.into_inner()).get(packet.slot);
        let Some(device) = device else {
            warn!("Packet for empty slot {} dropped", packet.slot);
            return;
        };

        let result = match packet.kind {
            ChannelKind::Control => device.control_channel(packet.channel, &packet.data),
            ChannelKind::Interrupt => device.interrupt_channel(packet.channel, &packet.data),
        };
        if let Err(e) = result {
            debug!("{}: packet not handled: {}", device.name(), e);
        }
    }

    /// Tick every attached device once
    pub fn tick(&self) {
        Self::tick_all(&self.arena);
    }

    fn tick_all(arena: &Mutex<DeviceArena>) {
        let devices = arena.lock().unwrap_or_else(|e| e.into_inner()).devices();
        for device in devices {
            device.update();
        }
    }

    /// Start the tick and packet pump threads
    pub fn start(&mut self) -> Result<(), ManagerError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(ManagerError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);
        info!("Starting emulator manager...");

        if let Err(e) = self.start_tick_thread().and_then(|_| self.start_pump_thread()) {
            self.stop();
            return Err(e);
        }

        info!("✓ Manager started at {} Hz", self.config.settings.tick_rate_hz);
        Ok(())
    }

    fn start_tick_thread(&mut self) -> Result<(), ManagerError> {
        let arena = Arc::clone(&self.arena);
        let running = Arc::clone(&self.running);
        let period = Duration::from_secs_f64(1.0 / f64::from(self.config.settings.tick_rate_hz));

        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;

        let handle = thread::Builder::new().name("tick".to_string()).spawn(move || {
            runtime.block_on(async {
                info!("Tick thread started");

                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                while running.load(Ordering::SeqCst) {
                    interval.tick().await;
                    Self::tick_all(&arena);
                }

                info!("Tick thread exited");
            });
        })?;

        self.workers.push(handle);
        Ok(())
    }

    fn start_pump_thread(&mut self) -> Result<(), ManagerError> {
        let arena = Arc::clone(&self.arena);
        let running = Arc::clone(&self.running);
        let receiver = self.packet_receiver.clone();

        let handle = thread::Builder::new().name("packet-pump".to_string()).spawn(move || {
            info!("Packet pump thread started");

            while running.load(Ordering::SeqCst) {
                match receiver.recv_timeout(Duration::from_millis(16)) {
                    Ok(packet) => Self::route(&arena, &packet),
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            info!("Packet pump thread exited");
        })?;

        self.workers.push(handle);
        Ok(())
    }

    /// Stop the worker threads and wait for them to exit
    pub fn stop(&mut self) {
        if self.workers.is_empty() && !self.running.load(Ordering::SeqCst) {
            return;
        }
        info!("Stopping emulator manager...");
        self.running.store(false, Ordering::SeqCst);

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
    }

    /// Check if the manager is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for EmulatorManager {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryMiiStorage, MockInputSource, MockTransport};
    use crate::config::SlotConfig;
    use crate::wiimote::constants::*;

    fn two_slot_config() -> Config {
        Config {
            slots: vec![
                SlotConfig { index: 0, source: DeviceSource::Emulated },
                SlotConfig { index: 1, source: DeviceSource::Real },
                SlotConfig { index: 3, source: DeviceSource::Emulated },
            ],
            ..Default::default()
        }
    }

    fn attach(
        manager: &EmulatorManager,
        index: usize,
        transport: &MockTransport,
    ) -> Result<Arc<EmulatedWiimote>, ManagerError> {
        manager.attach(
            index,
            Arc::new(transport.clone()),
            Box::new(MockInputSource::new()),
            Box::new(MemoryMiiStorage::new()),
        )
    }

    #[test]
    fn test_attach_respects_slot_table() {
        let manager = EmulatorManager::new(two_slot_config());
        let transport = MockTransport::new();

        assert!(attach(&manager, 0, &transport).is_ok());
        assert!(attach(&manager, 3, &transport).is_ok());
        assert!(matches!(attach(&manager, 0, &transport), Err(ManagerError::SlotOccupied(0))));
        assert!(matches!(attach(&manager, 1, &transport), Err(ManagerError::NotEmulated(1))));
        assert!(matches!(attach(&manager, 2, &transport), Err(ManagerError::NotEmulated(2))));
        assert!(matches!(attach(&manager, 4, &transport), Err(ManagerError::SlotOutOfRange(4))));
        assert_eq!(manager.device_count(), 2);
        assert_eq!(manager.device(3).unwrap().name(), "Wiimote Emu 4");

        assert!(manager.detach(0).is_some());
        assert!(manager.detach(0).is_none());
        assert_eq!(manager.device_count(), 1);
    }

    #[test]
    fn test_deliver_and_tick() {
        let manager = EmulatorManager::new(Config::default());
        let transport = MockTransport::new();
        attach(&manager, 0, &transport).unwrap();

        manager.deliver(&InboundPacket {
            slot: 0,
            channel: 0x41,
            kind: ChannelKind::Interrupt,
            data: vec![0xA2, RT_LEDS, 0x10],
        });
        // Packets for empty slots are dropped
        manager.deliver(&InboundPacket {
            slot: 2,
            channel: 0x41,
            kind: ChannelKind::Interrupt,
            data: vec![0xA2],
        });

        manager.tick();
        let sent = transport.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].data[1], RT_ACK_DATA);
        assert_eq!(sent[1].data[1], RT_STATUS_REPORT);
    }

    #[test]
    fn test_start_stop() {
        let mut manager = EmulatorManager::new(Config::default());
        let transport = MockTransport::new();
        attach(&manager, 0, &transport).unwrap();

        manager.start().unwrap();
        assert!(manager.is_running());
        assert!(matches!(manager.start(), Err(ManagerError::AlreadyRunning)));

        manager
            .submit(InboundPacket {
                slot: 0,
                channel: 0x41,
                kind: ChannelKind::Interrupt,
                data: vec![0xA2, RT_REPORT_MODE, 0x02, 0x30],
            })
            .unwrap();

        // Wait for the ack and the first status report
        for _ in 0..200 {
            if transport.len() >= 2 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        manager.stop();
        assert!(!manager.is_running());

        let sent = transport.sent();
        assert!(sent.iter().any(|p| p.data[1] == RT_ACK_DATA));
        assert!(sent.iter().any(|p| p.data[1] == RT_STATUS_REPORT));
    }
}
