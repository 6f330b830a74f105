use std::{
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::{CommandFactory, Parser, ValueEnum};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, Frame,
    buffer::Buffer,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Paragraph, Widget},
};

use chip8_vm::{
    emu::{
        Chip8, Chip8Runner, DEFAULT_CPU_HZ, DISPLAY_X, DISPLAY_Y, Display, TimerMode,
        UnknownOpcodePolicy,
    },
    u4,
};

/// Mapping from keyboard keys to CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::Char('x'), // 0x0
    KeyCode::Char('1'), // 0x1
    KeyCode::Char('2'), // 0x2
    KeyCode::Char('3'), // 0x3
    KeyCode::Char('q'), // 0x4
    KeyCode::Char('w'), // 0x5
    KeyCode::Char('e'), // 0x6
    KeyCode::Char('a'), // 0x7
    KeyCode::Char('s'), // 0x8
    KeyCode::Char('d'), // 0x9
    KeyCode::Char('z'), // 0xA
    KeyCode::Char('c'), // 0xB
    KeyCode::Char('4'), // 0xC
    KeyCode::Char('r'), // 0xD
    KeyCode::Char('f'), // 0xE
    KeyCode::Char('v'), // 0xF
];

// Key release events are not fired in terminals on Linux.
// To handle this, we implement a timeout after which we consider a key released.
const KEY_RELEASE_TIMEOUT: Duration = Duration::from_millis(50);

const FRAME_TIME: Duration = Duration::from_millis(16);

fn keypad_key(code: KeyCode) -> Option<u4> {
    let idx = KEY_MAP.iter().position(|&k| k == code)?;
    u4::try_from(idx as u8).ok()
}

struct App {
    runner: Chip8Runner,
    /// Last frame handed out by the interpreter.
    frame: Display<bool>,
    should_quit: bool,
    last_tick: Instant,
    key_press_times: [Option<Instant>; 16],
}

impl App {
    fn new(args: &Args) -> anyhow::Result<Self> {
        let mut chip8 = Chip8::new().with_timer_mode(args.timer_mode.into());
        if let Some(seed) = args.seed {
            chip8 = chip8.with_seed(seed);
        }
        chip8
            .load_file(&args.rom_path)
            .context("Failed to load ROM into CHIP-8 memory")?;

        let runner = Chip8Runner::new(chip8)
            .with_cpu_hz(args.cpu_hz)?
            .with_unknown_opcode_policy(args.on_unknown.into());

        Ok(Self {
            runner,
            frame: [[false; DISPLAY_X]; DISPLAY_Y],
            should_quit: false,
            last_tick: Instant::now(),
            key_press_times: [None; 16],
        })
    }

    fn run(&mut self, terminal: &mut DefaultTerminal) -> anyhow::Result<()> {
        while !self.should_quit {
            let dt = self.last_tick.elapsed().as_secs_f32();
            self.last_tick = Instant::now();

            self.runner.update(dt).context("Chip8 Execution error")?;

            if let Some(frame) = self.runner.take_frame() {
                self.frame = *frame;
            }

            terminal.draw(|frame| self.draw(frame))?;

            self.check_key_timeout();

            if event::poll(FRAME_TIME)? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key_event(key);
                }
            }
        }

        Ok(())
    }

    fn draw(&self, frame: &mut Frame) {
        frame.render_widget(self, frame.area());
    }

    fn check_key_timeout(&mut self) {
        let now = Instant::now();

        for (idx, press_time) in self.key_press_times.iter_mut().enumerate() {
            if let Some(time) = press_time
                && now.duration_since(*time) > KEY_RELEASE_TIMEOUT
                && let Ok(key) = u4::try_from(idx as u8)
            {
                *press_time = None;
                self.runner.set_key(key, false);
            }
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        // Handle Ctrl+C globally
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        let Some(chip8_key) = keypad_key(key.code) else {
            return;
        };
        let idx = usize::from(chip8_key);

        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                self.runner.set_key(chip8_key, true);
                self.key_press_times[idx] = Some(Instant::now());
            }
            KeyEventKind::Release => {
                self.runner.set_key(chip8_key, false);
                self.key_press_times[idx] = None;
            }
        }
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        const MIN_WIDTH: u16 = DISPLAY_X as u16 + 2;
        const MIN_HEIGHT: u16 = DISPLAY_Y as u16 + 2 + 1;
        if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
            Paragraph::new(format!(
                "Terminal is too small ({}x{} min)",
                MIN_WIDTH, MIN_HEIGHT
            ))
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .render(area, buf);

            return;
        }

        let [display, status] = Layout::vertical([
            Constraint::Length(DISPLAY_Y as u16 + 2),
            Constraint::Length(1),
        ])
        .areas(area);

        self.render_display(display, buf);
        self.render_status(status, buf);
    }
}

impl App {
    fn render_display(&self, area: Rect, buf: &mut Buffer) {
        let text: Vec<Line> = self
            .frame
            .iter()
            .map(|row| {
                row.iter()
                    .map(|pixel| Span::styled(if *pixel { "█" } else { " " }, Style::default().green()))
                    .collect()
            })
            .collect();

        Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::bordered().title(" CHIP-8 "))
            .render(area, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        let machine = self.runner.chip8_ref().machine();
        let beep = if self.runner.should_beep() { " BEEP" } else { "" };

        Paragraph::new(format!(
            "PC: {:03X}  I: {:03X}  DT: {:02X}  ST: {:02X}  cycle: {}{}",
            machine.pc(),
            machine.i(),
            machine.delay_timer(),
            machine.sound_timer(),
            machine.cycle_count(),
            beep
        ))
        .alignment(Alignment::Center)
        .render(area, buf);
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TimerModeArg {
    /// Timers decrement once per executed instruction
    PerCycle,
    /// Timers decrement at 60Hz independent of the CPU rate
    External,
}

impl From<TimerModeArg> for TimerMode {
    fn from(arg: TimerModeArg) -> Self {
        match arg {
            TimerModeArg::PerCycle => TimerMode::PerCycle,
            TimerModeArg::External => TimerMode::External,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum UnknownOpcodeArg {
    /// Stop with an error
    Halt,
    /// Log a warning and continue with the next instruction
    Skip,
}

impl From<UnknownOpcodeArg> for UnknownOpcodePolicy {
    fn from(arg: UnknownOpcodeArg) -> Self {
        match arg {
            UnknownOpcodeArg::Halt => UnknownOpcodePolicy::Halt,
            UnknownOpcodeArg::Skip => UnknownOpcodePolicy::Skip,
        }
    }
}

/// CHIP-8 interpreter running in the terminal.
///
/// Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Escape is used to exit the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = DEFAULT_CPU_HZ, value_parser = parse_cpu_hz)]
    cpu_hz: f32,

    /// How the delay and sound timers are driven
    #[arg(long, value_enum, default_value_t = TimerModeArg::External)]
    timer_mode: TimerModeArg,

    /// What to do on an undecodable instruction
    #[arg(long, value_enum, default_value_t = UnknownOpcodeArg::Halt)]
    on_unknown: UnknownOpcodeArg,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Write logs to this file (filtered by RUST_LOG, default "info")
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_cpu_hz(s: &str) -> Result<f32, String> {
    match s.parse::<f32>() {
        Ok(hz) if hz.is_finite() && hz > 0.0 => Ok(hz),
        Ok(_) => Err(format!("CPU rate must be greater than zero: '{}'", s)),
        Err(e) => Err(format!("Invalid CPU rate '{}': {}", s, e)),
    }
}

/// The terminal belongs to the UI, so logs only go to a file.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = File::create(path).context("Failed to create log file")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("Failed to initialize logger")?;

    Ok(())
}

/// Builds the app, attaching the usage line when the ROM or options are unusable.
fn start_app(args: &Args) -> anyhow::Result<App> {
    App::new(args).with_context(|| {
        format!(
            "Failed to initialize application\n\n{}",
            Args::command().render_usage()
        )
    })
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.log_file.as_deref())?;

    let mut app = start_app(&args)?;
    log::info!("Loaded {}", args.rom_path.display());

    let mut terminal = ratatui::init();
    let app_result = app.run(&mut terminal);
    ratatui::restore();

    if let Err(e) = &app_result {
        log::error!("{e:#}");
    }
    app_result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_rate_must_be_positive_and_finite() {
        assert_eq!(parse_cpu_hz("700"), Ok(700.0));
        assert_eq!(parse_cpu_hz("0.5"), Ok(0.5));
        for bad in ["0", "-1", "NaN", "inf", "fast"] {
            assert!(parse_cpu_hz(bad).is_err(), "{bad} was accepted");
        }
    }

    #[test]
    fn cpu_rate_flag_is_validated() {
        assert!(Args::try_parse_from(["emu", "rom.ch8", "--cpu-hz", "0"]).is_err());
        let args = Args::try_parse_from(["emu", "rom.ch8"]).unwrap();
        assert_eq!(args.cpu_hz, DEFAULT_CPU_HZ);
    }

    #[test]
    fn missing_rom_error_includes_usage() {
        let args = Args::try_parse_from(["emu", "definitely/not/a/rom.ch8"]).unwrap();
        let err = start_app(&args).err().unwrap();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to load ROM"), "{message}");
        assert!(message.contains("Usage:"), "{message}");
    }

    #[test]
    fn key_map_covers_the_keypad() {
        assert_eq!(keypad_key(KeyCode::Char('x')), Some(u4::new(0x0)));
        assert_eq!(keypad_key(KeyCode::Char('v')), Some(u4::new(0xF)));
        assert_eq!(keypad_key(KeyCode::Char('p')), None);
    }
}
