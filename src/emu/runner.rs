use super::{
    Chip8, Chip8Error, Chip8Result, Display, Fault, InvalidCpuHz, TimerMode, UnknownOpcodePolicy,
};
use crate::u4;

pub const DEFAULT_CPU_HZ: f32 = 700.0;
pub const TIMER_HZ: f32 = 60.0;

const TIMER_TIME_STEP: f32 = 1.0 / TIMER_HZ;

/// High-level emulator runner that manages timing internally.
pub struct Chip8Runner {
    chip8: Chip8,
    cpu_time_step: f32,
    on_unknown_opcode: UnknownOpcodePolicy,
    cpu_dt_accumulator: f32,
    timer_dt_accumulator: f32,
}

impl Chip8Runner {
    pub fn new(chip8: Chip8) -> Self {
        Self {
            chip8,
            cpu_time_step: 1.0 / DEFAULT_CPU_HZ,
            on_unknown_opcode: UnknownOpcodePolicy::default(),
            cpu_dt_accumulator: 0.0,
            timer_dt_accumulator: 0.0,
        }
    }

    /// Instructions executed per second of emulated time.
    ///
    /// Zero, negative and non-finite rates are rejected.
    pub fn with_cpu_hz(mut self, cpu_hz: f32) -> Result<Self, InvalidCpuHz> {
        if !cpu_hz.is_finite() || cpu_hz <= 0.0 {
            return Err(InvalidCpuHz(cpu_hz));
        }
        self.cpu_time_step = 1.0 / cpu_hz;
        Ok(self)
    }

    pub fn with_unknown_opcode_policy(mut self, policy: UnknownOpcodePolicy) -> Self {
        self.on_unknown_opcode = policy;
        self
    }

    /// Update emulator by delta time, handles both CPU and timer cycles.
    ///
    /// Runs as many CPU cycles as fit into the elapsed time `dt`. Timers are
    /// ticked here at 60Hz only when the machine uses [`TimerMode::External`].
    /// Returns early if a frame has to be rendered before the next CPU cycle
    /// or the program is waiting for a key.
    pub fn update(&mut self, dt: f32) -> Result<Chip8Result, Chip8Error> {
        self.cpu_dt_accumulator += dt;

        if self.chip8.timer_mode() == TimerMode::External {
            self.timer_dt_accumulator += dt;

            while self.timer_dt_accumulator >= TIMER_TIME_STEP {
                self.chip8.tick_timers();
                self.timer_dt_accumulator -= TIMER_TIME_STEP;
            }
        }

        while self.cpu_dt_accumulator >= self.cpu_time_step {
            self.cpu_dt_accumulator -= self.cpu_time_step;

            match self.cycle()? {
                result @ (Chip8Result::WaitForNextFrame | Chip8Result::WaitingForKey) => {
                    // If we need to wait for the next frame we stop executing cycles.
                    // We also clear the accumulator to avoid "catching up" too fast in the next frame.
                    self.cpu_dt_accumulator = 0.0;
                    return Ok(result);
                }
                Chip8Result::Continue => {}
            }
        }

        Ok(Chip8Result::Continue)
    }

    /// Runs one instruction, applying the unknown opcode policy.
    fn cycle(&mut self) -> Result<Chip8Result, Chip8Error> {
        match self.chip8.cpu_cycle() {
            Err(
                err @ Chip8Error {
                    fault: Fault::UnknownOpcode { .. },
                    ..
                },
            ) if self.on_unknown_opcode == UnknownOpcodePolicy::Skip => {
                log::warn!("Skipping: {err}");
                Ok(Chip8Result::Continue)
            }
            result => result,
        }
    }

    /// Returns true if the sound timer is active, indicating a beep should be played.
    pub fn should_beep(&self) -> bool {
        self.chip8.should_beep()
    }

    /// Set the state of a key on the keypad.
    pub fn set_key(&mut self, key: u4, pressed: bool) {
        self.chip8.set_key(key, pressed)
    }

    /// Hands out the display if it changed since the last call.
    pub fn take_frame(&mut self) -> Option<&Display<bool>> {
        self.chip8.take_frame()
    }

    pub fn chip8_ref(&self) -> &Chip8 {
        &self.chip8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner_with(rom: &[u8], timer_mode: TimerMode) -> Chip8Runner {
        let mut chip8 = Chip8::new().with_seed(0).with_timer_mode(timer_mode);
        chip8.load(rom).unwrap();
        Chip8Runner::new(chip8).with_cpu_hz(100.0).unwrap()
    }

    #[test]
    fn runs_cycles_for_elapsed_time() {
        // 7001: ADD V0, 1 ; 1200: JP 200
        let mut runner = runner_with(&[0x70, 0x01, 0x12, 0x00], TimerMode::PerCycle);

        runner.update(0.105).unwrap();

        let machine = runner.chip8_ref().machine();
        assert_eq!(machine.cycle_count(), 10);
        assert_eq!(machine.v()[0], 5);
    }

    #[test]
    fn rejects_rates_that_cannot_advance() {
        for cpu_hz in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = Chip8Runner::new(Chip8::new()).with_cpu_hz(cpu_hz).err();
            assert!(err.is_some(), "{cpu_hz} was accepted");
        }
        assert!(Chip8Runner::new(Chip8::new()).with_cpu_hz(0.5).is_ok());
    }

    #[test]
    fn stops_early_after_draw() {
        // 00E0: CLS ; 7001: ADD V0, 1
        let mut runner = runner_with(&[0x00, 0xE0, 0x70, 0x01], TimerMode::PerCycle);

        let result = runner.update(1.0).unwrap();

        assert_eq!(result, Chip8Result::WaitForNextFrame);
        assert_eq!(runner.chip8_ref().machine().cycle_count(), 1);
        assert!(runner.take_frame().is_some());
        assert!(runner.take_frame().is_none());
    }

    #[test]
    fn ticks_external_timers_at_60hz() {
        // 6078: LD V0, 120 ; F015: LD DT, V0 ; 1204: JP 204
        let mut runner = runner_with(
            &[0x60, 0x78, 0xF0, 0x15, 0x12, 0x04],
            TimerMode::External,
        );
        runner.update(0.025).unwrap();
        assert_eq!(runner.chip8_ref().machine().delay_timer(), 120);

        runner.update(0.5).unwrap();
        let delay = runner.chip8_ref().machine().delay_timer();
        assert!((89..=91).contains(&delay), "delay timer was {delay}");
    }

    #[test]
    fn unknown_opcode_halts_by_default() {
        let mut runner = runner_with(&[0xFF, 0xFF], TimerMode::PerCycle);

        let err = runner.update(0.02).unwrap_err();

        assert_eq!(err.fault, Fault::UnknownOpcode { opcode: 0xFFFF });
        assert_eq!(err.pc, 0x200);
        assert_eq!(err.opcode, Some(0xFFFF));
        assert_eq!(err.cycle, 1);
    }

    #[test]
    fn unknown_opcode_can_be_skipped() {
        // FFFF: unknown ; 6007: LD V0, 7
        let mut runner = runner_with(&[0xFF, 0xFF, 0x60, 0x07], TimerMode::PerCycle)
            .with_unknown_opcode_policy(UnknownOpcodePolicy::Skip);

        runner.update(0.025).unwrap();

        let machine = runner.chip8_ref().machine();
        assert_eq!(machine.v()[0], 7);
        assert_eq!(machine.pc(), 0x204);
    }

    #[test]
    fn stack_faults_ignore_skip_policy() {
        // 00EE: RET with an empty stack
        let mut runner = runner_with(&[0x00, 0xEE], TimerMode::PerCycle)
            .with_unknown_opcode_policy(UnknownOpcodePolicy::Skip);

        let err = runner.update(0.02).unwrap_err();
        assert_eq!(err.fault, Fault::StackUnderflow);
    }
}
