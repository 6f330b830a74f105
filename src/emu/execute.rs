use rand::Rng;

use super::{
    Chip8, Chip8Result, DISPLAY_X, DISPLAY_Y, FONT_GLYPH_SIZE, FONT_START_ADDRESS, Fault, Opcode,
    OpcodeALU,
};
use crate::u4;

impl Chip8 {
    pub(crate) fn execute(&mut self, opcode: Opcode) -> Result<Chip8Result, Fault> {
        let m = &mut self.machine;
        m.pc = m.pc.wrapping_add(2);

        match opcode {
            Opcode::ClearDisplay => {
                m.display = [[false; DISPLAY_X]; DISPLAY_Y];
                m.draw_flag = true;
                return Ok(Chip8Result::WaitForNextFrame);
            }
            Opcode::Jump { nnn } => {
                m.pc = nnn;
            }
            Opcode::JumpWithOffset { nnn } => {
                m.pc = nnn + u16::from(m.v[0]);
            }
            Opcode::Call { nnn } => {
                m.push(m.pc)?;
                m.pc = nnn;
            }
            Opcode::Return => {
                m.pc = m.pop()?;
            }
            Opcode::SkipRegEqualImm { x, nn } => {
                if m.v[x] == nn {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegNotEqualImm { x, nn } => {
                if m.v[x] != nn {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegEqualReg { x, y } => {
                if m.v[x] == m.v[y] {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SkipRegNotEqualReg { x, y } => {
                if m.v[x] != m.v[y] {
                    m.pc = m.pc.wrapping_add(2);
                }
            }
            Opcode::SetRegImm { x, nn } => {
                m.v[x] = nn;
            }
            Opcode::AddRegImm { x, nn } => {
                m.v[x] = m.v[x].wrapping_add(nn);
            }
            Opcode::ALU { x, y, op } => {
                self.execute_alu(x, y, op);
            }
            Opcode::Random { x, nn } => {
                let rand_byte: u8 = self.rng.random();
                m.v[x] = rand_byte & nn;
            }
            Opcode::SetIndexImm { nnn } => {
                m.i = nnn;
            }
            Opcode::AddIndexReg { x } => {
                let offset = m.v[x];
                m.i = m
                    .i
                    .checked_add(offset.into())
                    .ok_or(Fault::IndexOverflow { index: m.i, offset })?;
            }
            Opcode::Draw { x, y, n } => {
                return self.execute_draw(x, y, n);
            }
            Opcode::SkipIfPressed { x } => {
                if self.key_pressed(x)? {
                    self.machine.pc = self.machine.pc.wrapping_add(2);
                }
            }
            Opcode::SkipIfNotPressed { x } => {
                if !self.key_pressed(x)? {
                    self.machine.pc = self.machine.pc.wrapping_add(2);
                }
            }
            Opcode::WaitForKey { x } => {
                return Ok(self.execute_wait_for_key(x));
            }
            Opcode::ReadDelayTimer { x } => {
                m.v[x] = m.delay_timer;
            }
            Opcode::SetDelayTimer { x } => {
                m.delay_timer = m.v[x];
            }
            Opcode::SetSoundTimer { x } => {
                m.sound_timer = m.v[x];
            }
            Opcode::FontChar { x } => {
                m.i = FONT_START_ADDRESS as u16 + u16::from(m.v[x]) * FONT_GLYPH_SIZE as u16;
            }
            Opcode::BCD { x } => {
                let value = m.v[x];
                m.check_span(m.i, 3)?;
                m.write(m.i, 0, value / 100)?;
                m.write(m.i, 1, (value / 10) % 10)?;
                m.write(m.i, 2, value % 10)?;
            }
            Opcode::StoreRegs { x } => {
                m.check_span(m.i, u16::from(u8::from(x)) + 1)?;
                for reg_index in 0..=usize::from(x) {
                    m.write(m.i, reg_index as u16, m.v[reg_index])?;
                }
            }
            Opcode::LoadRegs { x } => {
                m.check_span(m.i, u16::from(u8::from(x)) + 1)?;
                for reg_index in 0..=usize::from(x) {
                    m.v[reg_index] = m.read(m.i, reg_index as u16)?;
                }
            }
            Opcode::Unknown(opcode) => {
                return Err(Fault::UnknownOpcode { opcode });
            }
        };

        Ok(Chip8Result::Continue)
    }

    // VF is written before VX and VX is computed from the updated registers,
    // so with X = F the result overwrites the flag and with Y = F the new flag
    // is the operand. 8XY6 and 8XYE shift VX in place; VY is not read.
    fn execute_alu(&mut self, x: u4, y: u4, op: OpcodeALU) {
        let v = &mut self.machine.v;

        match op {
            OpcodeALU::Set => v[x] = v[y],
            OpcodeALU::Or => v[x] |= v[y],
            OpcodeALU::And => v[x] &= v[y],
            OpcodeALU::Xor => v[x] ^= v[y],
            OpcodeALU::Add => {
                v[0xF] = u8::from(v[x].checked_add(v[y]).is_none());
                v[x] = v[x].wrapping_add(v[y]);
            }
            OpcodeALU::Sub => {
                v[0xF] = u8::from(v[x] > v[y]);
                v[x] = v[x].wrapping_sub(v[y]);
            }
            OpcodeALU::SubReverse => {
                v[0xF] = u8::from(v[y] > v[x]);
                v[x] = v[y].wrapping_sub(v[x]);
            }
            OpcodeALU::ShiftRight => {
                v[0xF] = v[x] & 1;
                v[x] >>= 1;
            }
            OpcodeALU::ShiftLeft => {
                v[0xF] = v[x] >> 7;
                v[x] <<= 1;
            }
        }
    }

    fn execute_draw(&mut self, x: u4, y: u4, n: u4) -> Result<Chip8Result, Fault> {
        let m = &mut self.machine;
        let x_pos = m.v[x] as usize;
        let y_pos = m.v[y] as usize;
        m.check_span(m.i, u16::from(u8::from(n)))?;

        let mut any_erased = false;
        for row in 0..usize::from(n) {
            let sprite_byte = m.read(m.i, row as u16)?;

            for col in 0..8 {
                // If current sprite bit is non-zero
                if (sprite_byte & (0x80 >> col)) != 0 {
                    // Sprites wrap around both edges of the screen
                    let pixel =
                        &mut m.display[(y_pos + row) % DISPLAY_Y][(x_pos + col) % DISPLAY_X];

                    if *pixel {
                        any_erased = true;
                    }

                    // Flip the pixel
                    *pixel ^= true;
                }
            }
        }

        m.v[0xF] = u8::from(any_erased);
        m.draw_flag = true;
        Ok(Chip8Result::WaitForNextFrame)
    }

    /// FX0A: stores the highest-numbered pressed key, or rewinds the PC so
    /// the instruction runs again next cycle.
    fn execute_wait_for_key(&mut self, x: u4) -> Chip8Result {
        let m = &mut self.machine;

        match (0..16u8).rev().find(|&key| m.keypad[usize::from(key)]) {
            Some(key) => {
                m.v[x] = key;
                Chip8Result::Continue
            }
            None => {
                // Repeat this instruction until a key is pressed
                m.pc = m.pc.wrapping_sub(2);
                Chip8Result::WaitingForKey
            }
        }
    }

    fn key_pressed(&self, x: u4) -> Result<bool, Fault> {
        let key = self.machine.v[x];
        self.machine
            .keypad
            .get(usize::from(key))
            .copied()
            .ok_or(Fault::InvalidKey { key })
    }
}
