use std::path::Path;

use rand::{SeedableRng, rngs::StdRng};

use super::{Chip8Error, Chip8Result, Display, Fault, LoadError, Machine, Opcode, TimerMode};
use crate::u4;

/// CHIP-8 interpreter: sole owner of one [`Machine`].
pub struct Chip8 {
    pub(crate) machine: Machine,
    pub(crate) rng: StdRng,
    timer_mode: TimerMode,
}

impl Chip8 {
    pub fn new() -> Self {
        Chip8 {
            machine: Machine::new(),
            rng: StdRng::from_os_rng(),
            timer_mode: TimerMode::default(),
        }
    }

    /// Uses a fixed seed for `CXNN`, making runs reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_timer_mode(mut self, timer_mode: TimerMode) -> Self {
        self.timer_mode = timer_mode;
        self
    }

    pub fn timer_mode(&self) -> TimerMode {
        self.timer_mode
    }

    /// Puts the machine back into its power-on state, font included.
    pub fn reset(&mut self) {
        log::debug!("Resetting machine");
        self.machine.reset();
    }

    /// Resets the machine and loads a ROM into memory.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), LoadError> {
        self.machine.reset();
        self.machine.load(rom)?;
        log::debug!("Loaded {} byte ROM", rom.len());
        Ok(())
    }

    /// Reads a ROM from disk and loads it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = path.as_ref();
        let rom = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.load(&rom)
    }

    /// Executes a single CPU cycle (fetch, decode, execute).
    ///
    /// In [`TimerMode::PerCycle`] both timers are decremented once the
    /// instruction has run. A faulting instruction or an `FX0A` that is still
    /// waiting for a key leaves the timers alone.
    pub fn cpu_cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        let pc = self.machine.pc;
        self.machine.cycle_count += 1;

        let opcode = self.fetch().map_err(|fault| self.error(fault, pc, None))?;
        let decoded_opcode = Opcode::decode(opcode);
        log::trace!("{pc:03X}: {opcode:04X} {decoded_opcode}");

        let result = self
            .execute(decoded_opcode)
            .map_err(|fault| self.error(fault, pc, Some(opcode)))?;

        if self.timer_mode == TimerMode::PerCycle && result != Chip8Result::WaitingForKey {
            self.tick_timers();
        }

        Ok(result)
    }

    /// Alias of [`Chip8::cpu_cycle`].
    pub fn step(&mut self) -> Result<Chip8Result, Chip8Error> {
        self.cpu_cycle()
    }

    /// Decrements the delay and sound timers, stopping at zero.
    pub fn tick_timers(&mut self) {
        self.machine.delay_timer = self.machine.delay_timer.saturating_sub(1);
        self.machine.sound_timer = self.machine.sound_timer.saturating_sub(1);
    }

    /// Returns true if the sound timer is greater than zero, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.machine.sound_timer > 0
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.machine.keypad[key] = pressed;
    }

    /// Hands out the display if it changed since the last call, clearing the draw flag.
    pub fn take_frame(&mut self) -> Option<&Display<bool>> {
        if !self.machine.draw_flag {
            return None;
        }

        self.machine.draw_flag = false;
        Some(&self.machine.display)
    }

    /// Read-only view of the machine state.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Fetches the next 16-bit opcode from memory.
    fn fetch(&self) -> Result<u16, Fault> {
        let high = self.machine.read(self.machine.pc, 0)?;
        let low = self.machine.read(self.machine.pc, 1)?;

        Ok(u16::from_be_bytes([high, low]))
    }

    fn error(&self, fault: Fault, pc: u16, opcode: Option<u16>) -> Chip8Error {
        Chip8Error {
            fault,
            pc,
            opcode,
            cycle: self.machine.cycle_count,
        }
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}
