use super::{
    DISPLAY_X, DISPLAY_Y, Display, FONT, FONT_END_ADDRESS, FONT_START_ADDRESS, Fault, LoadError,
};

// Standard CHIP-8 memory layout
pub const ROM_START_ADDRESS: usize = 0x200;
pub const MEMORY_SIZE: usize = 4096;
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - ROM_START_ADDRESS;
pub const STACK_SIZE: usize = 16;

/// CHIP-8 machine state
pub struct Machine {
    /// 4KB memory array
    pub(crate) memory: [u8; MEMORY_SIZE],
    /// Display buffer: 64x32 monochrome pixels
    pub(crate) display: Display<bool>,

    /// Program counter: address of the next instruction to execute
    pub(crate) pc: u16,
    /// Index register: used for memory operations
    pub(crate) i: u16,
    /// General-purpose registers V0-VF (VF is used as a flag register)
    pub(crate) v: [u8; 16],
    /// Return addresses, valid up to `sp`
    pub(crate) stack: [u16; STACK_SIZE],
    pub(crate) sp: usize,

    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,

    /// Keypad state: 16 keys mapped as booleans (true = pressed)
    pub(crate) keypad: [bool; 16],
    /// Set when the display changed, cleared once the frame has been taken.
    pub(crate) draw_flag: bool,
    pub(crate) cycle_count: u64,
}

impl Machine {
    pub fn new() -> Self {
        let mut machine = Machine {
            memory: [0; MEMORY_SIZE],
            display: [[false; DISPLAY_X]; DISPLAY_Y],
            pc: ROM_START_ADDRESS as u16,
            i: 0,
            v: [0; 16],
            stack: [0; STACK_SIZE],
            sp: 0,
            delay_timer: 0,
            sound_timer: 0,
            keypad: [false; 16],
            draw_flag: false,
            cycle_count: 0,
        };
        machine.reset();
        machine
    }

    /// Returns every field to its power-on value and reinstalls the font.
    pub fn reset(&mut self) {
        self.memory = [0; MEMORY_SIZE];
        self.memory[FONT_START_ADDRESS..FONT_END_ADDRESS].copy_from_slice(&FONT);
        self.display = [[false; DISPLAY_X]; DISPLAY_Y];
        self.pc = ROM_START_ADDRESS as u16;
        self.i = 0;
        self.v = [0; 16];
        self.stack = [0; STACK_SIZE];
        self.sp = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.keypad = [false; 16];
        self.draw_flag = false;
        self.cycle_count = 0;
    }

    /// Copies a ROM into memory at 0x200.
    ///
    /// The ROM is rejected as a whole when it is empty or does not fit.
    pub fn load(&mut self, rom: &[u8]) -> Result<(), LoadError> {
        if rom.is_empty() {
            return Err(LoadError::Empty);
        }

        let rom_end = ROM_START_ADDRESS + rom.len();
        self.memory
            .get_mut(ROM_START_ADDRESS..rom_end)
            .ok_or(LoadError::Capacity {
                size: rom.len(),
                max_size: MAX_ROM_SIZE,
            })?
            .copy_from_slice(rom);

        Ok(())
    }

    /// Reads the byte at `base + offset`.
    pub fn read(&self, base: u16, offset: u16) -> Result<u8, Fault> {
        let address = base as usize + offset as usize;
        self.memory
            .get(address)
            .copied()
            .ok_or(Fault::MemoryOutOfBounds { address })
    }

    /// Writes the byte at `base + offset`.
    pub fn write(&mut self, base: u16, offset: u16, value: u8) -> Result<(), Fault> {
        let address = base as usize + offset as usize;
        *self
            .memory
            .get_mut(address)
            .ok_or(Fault::MemoryOutOfBounds { address })? = value;
        Ok(())
    }

    /// Checks that all `len` bytes starting at `base` are addressable, so
    /// multi-byte instructions fault before touching any state.
    pub fn check_span(&self, base: u16, len: u16) -> Result<(), Fault> {
        let end = base as usize + len as usize;
        if len > 0 && end > MEMORY_SIZE {
            return Err(Fault::MemoryOutOfBounds {
                address: (base as usize).max(MEMORY_SIZE),
            });
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, addr: u16) -> Result<(), Fault> {
        let slot = self.stack.get_mut(self.sp).ok_or(Fault::StackOverflow)?;
        *slot = addr;
        self.sp += 1;
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<u16, Fault> {
        self.sp = self.sp.checked_sub(1).ok_or(Fault::StackUnderflow)?;
        Ok(self.stack[self.sp])
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    pub fn display(&self) -> &Display<bool> {
        &self.display
    }

    /// Get the state of a pixel on the display (true = on, false = off).
    ///
    /// Returns `None` outside the 64x32 screen.
    pub fn pixel(&self, y: usize, x: usize) -> Option<bool> {
        self.display.get(y)?.get(x).copied()
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn i(&self) -> u16 {
        self.i
    }

    pub fn v(&self) -> &[u8; 16] {
        &self.v
    }

    /// Active return addresses, oldest first.
    pub fn stack(&self) -> &[u16] {
        &self.stack[..self.sp]
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn keypad(&self) -> &[bool; 16] {
        &self.keypad
    }

    pub fn draw_flag(&self) -> bool {
        self.draw_flag
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_installs_font_and_clears_state() {
        let mut machine = Machine::new();
        machine.v[3] = 9;
        machine.pc = 0x345;
        machine.draw_flag = true;
        machine.memory[0x300] = 0xAB;
        machine.push(0x222).unwrap();

        machine.reset();

        assert_eq!(&machine.memory[..FONT.len()], &FONT[..]);
        assert_eq!(machine.memory[0x300], 0);
        assert_eq!(machine.pc, 0x200);
        assert_eq!(machine.v, [0; 16]);
        assert!(machine.stack().is_empty());
        assert!(!machine.draw_flag);
        assert_eq!(machine.cycle_count, 0);
    }

    #[test]
    fn load_copies_rom_at_0x200() {
        let mut machine = Machine::new();
        machine.load(&[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(&machine.memory[0x200..0x203], &[0x12, 0x34, 0x56]);
        assert_eq!(machine.memory[0x203], 0);
    }

    #[test]
    fn load_accepts_exactly_max_size() {
        let mut machine = Machine::new();
        let rom = vec![0xEE; MAX_ROM_SIZE];
        machine.load(&rom).unwrap();
        assert_eq!(machine.memory[MEMORY_SIZE - 1], 0xEE);
    }

    #[test]
    fn load_rejects_oversized_rom_without_copying() {
        let mut machine = Machine::new();
        let rom = vec![0xEE; MAX_ROM_SIZE + 1];
        let err = machine.load(&rom).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Capacity {
                size: 3585,
                max_size: 3584
            }
        ));
        assert_eq!(machine.memory[ROM_START_ADDRESS], 0);
    }

    #[test]
    fn load_rejects_empty_rom() {
        let mut machine = Machine::new();
        assert!(matches!(machine.load(&[]), Err(LoadError::Empty)));
    }

    #[test]
    fn stack_is_bounded_both_ways() {
        let mut machine = Machine::new();
        assert_eq!(machine.pop(), Err(Fault::StackUnderflow));

        for n in 0..STACK_SIZE as u16 {
            machine.push(0x200 + n * 2).unwrap();
        }
        assert_eq!(machine.push(0x400), Err(Fault::StackOverflow));
        assert_eq!(machine.stack().len(), STACK_SIZE);
        assert_eq!(machine.pop(), Ok(0x200 + 15 * 2));
    }

    #[test]
    fn memory_access_is_range_checked() {
        let mut machine = Machine::new();
        assert_eq!(machine.read(0xFFF, 0), Ok(0));
        assert_eq!(
            machine.read(0xFFF, 1),
            Err(Fault::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(
            machine.write(0xFFFF, 2, 1),
            Err(Fault::MemoryOutOfBounds { address: 0x10001 })
        );
    }

    #[test]
    fn span_check_reports_first_unaddressable_byte() {
        let machine = Machine::new();
        assert_eq!(machine.check_span(0xFFD, 3), Ok(()));
        assert_eq!(
            machine.check_span(0xFFE, 3),
            Err(Fault::MemoryOutOfBounds { address: 0x1000 })
        );
        assert_eq!(
            machine.check_span(0x1234, 1),
            Err(Fault::MemoryOutOfBounds { address: 0x1234 })
        );
        assert_eq!(machine.check_span(0xFFFF, 0), Ok(()));
    }

    #[test]
    fn pixel_is_none_off_screen() {
        let mut machine = Machine::new();
        machine.display[31][63] = true;
        assert_eq!(machine.pixel(31, 63), Some(true));
        assert_eq!(machine.pixel(0, 0), Some(false));
        assert_eq!(machine.pixel(32, 0), None);
        assert_eq!(machine.pixel(0, 64), None);
    }
}
