//! # Control Loop
//!
//! Fixed-rate loop that polls the operator inputs, updates the shared
//! [`ModeState`] and sends one drive frame per tick.
//!
//! ## Input Modes
//!
//! | Mode | Period | Inputs |
//! |------|--------|--------|
//! | Gamepad | 50 ms | Stick + analog joystick fusion, debounced buttons |
//! | Keyboard | 100 ms | Direct mode keys, no drive intent |
//!
//! A frame goes out on every tick in both modes. While drive is disabled
//! the frame is the fail-safe `D 0 0 0 0 0`, so the motor controller is
//! refreshed continuously and never acts on a stale command.
//!
//! ## Degradation
//!
//! - No gamepad: keyboard mode from the start
//! - Gamepad lost mid-run: keyboard mode from the next tick
//! - No keyboard either: the loop keeps sending frames from the current mode
//! - No analog joystick: it always reads centered
//! - No serial link: frames are dropped

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::adc::AdcReader;
use crate::command::DriveCommand;
use crate::config::Config;
use crate::controller::gamepad::EvdevGamepad;
use crate::controller::keyboard::EvdevKeyboard;
use crate::controller::{Gamepad, GamepadState, Keyboard};
use crate::debounce::{Button, ButtonBank};
use crate::fusion::{fuse, IntentVector};
use crate::mode::{ModeState, WheelPreset, AUX_LEVEL_MIN};
use crate::serial::MotorLink;
use crate::viewer::Viewer;

/// Which input path drives the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Gamepad,
    Keyboard,
}

/// Hardware owned by the loop. Every device may be absent.
#[derive(Default)]
pub struct Devices {
    pub gamepad: Option<Box<dyn Gamepad>>,
    pub keyboard: Option<Box<dyn Keyboard>>,
    pub adc: AdcReader,
    pub link: MotorLink,
    pub viewer: Option<Viewer>,
}

impl Devices {
    /// Open every configured device, substituting absent variants.
    pub async fn open(config: &Config) -> Self {
        let viewer = Viewer::launch(&config.viewer).await;
        let link = MotorLink::open(&config.serial).await;
        let adc = AdcReader::open(&config.adc);

        let gamepad = match EvdevGamepad::open(&config.controller.device_path) {
            Ok(gamepad) => Some(Box::new(gamepad) as Box<dyn Gamepad>),
            Err(e) => {
                warn!("No USB gamepad ({}). Using keyboard fallback.", e);
                None
            }
        };

        let keyboard = if gamepad.is_none() {
            open_keyboard(&config.controller.keyboard_path)
        } else {
            None
        };

        Self {
            gamepad,
            keyboard,
            adc,
            link,
            viewer,
        }
    }
}

fn open_keyboard(path: &str) -> Option<Box<dyn Keyboard>> {
    match EvdevKeyboard::open(path) {
        Ok(keyboard) => Some(Box::new(keyboard)),
        Err(e) => {
            warn!("No keyboard available ({}); mode can only change remotely", e);
            None
        }
    }
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub ticks: u64,
    pub frames_sent: u64,
    pub write_failures: u64,
}

/// The rover's control loop.
pub struct ControlLoop {
    mode: Arc<ModeState>,
    devices: Devices,
    buttons: ButtonBank,
    deadzone: f64,
    gamepad_period: Duration,
    keyboard_period: Duration,
    keyboard_path: String,
    log_interval_frames: u64,
    stats: ShutdownReport,
}

impl ControlLoop {
    #[must_use]
    pub fn new(mode: Arc<ModeState>, devices: Devices, config: &Config) -> Self {
        Self {
            mode,
            devices,
            buttons: ButtonBank::new(),
            deadzone: config.controller.deadzone,
            gamepad_period: Duration::from_millis(config.timing.gamepad_period_ms),
            keyboard_period: Duration::from_millis(config.timing.keyboard_period_ms),
            keyboard_path: config.controller.keyboard_path.clone(),
            log_interval_frames: config.timing.log_interval_frames.max(1),
            stats: ShutdownReport::default(),
        }
    }

    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        if self.devices.gamepad.is_some() {
            InputMode::Gamepad
        } else {
            InputMode::Keyboard
        }
    }

    /// Tick period for the current input mode.
    #[must_use]
    pub fn period(&self) -> Duration {
        match self.input_mode() {
            InputMode::Gamepad => self.gamepad_period,
            InputMode::Keyboard => self.keyboard_period,
        }
    }

    #[must_use]
    pub fn stats(&self) -> ShutdownReport {
        self.stats
    }

    /// Run one tick: poll, update mode, send a frame. Returns the frame sent.
    pub async fn tick(&mut self) -> DriveCommand {
        let command = match self.poll_gamepad() {
            Some(pad) => self.gamepad_tick(&pad),
            None => self.keyboard_tick(),
        };

        self.transmit(&command).await;
        self.stats.ticks += 1;

        if self.stats.ticks % self.log_interval_frames == 0 {
            let status = self.mode.snapshot();
            info!(
                "Tick {}: {} frames sent, {} write failures (enabled={}, brush={}, wheel={})",
                self.stats.ticks,
                self.stats.frames_sent,
                self.stats.write_failures,
                status.enabled,
                status.brush,
                status.wheel
            );
        }

        command
    }

    /// Poll the gamepad, dropping it if it has gone away.
    fn poll_gamepad(&mut self) -> Option<GamepadState> {
        let gamepad = self.devices.gamepad.as_mut()?;
        match gamepad.poll() {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Gamepad {} lost ({}). Switching to keyboard fallback.", gamepad.name(), e);
                self.devices.gamepad = None;
                self.buttons.reset();
                if self.devices.keyboard.is_none() {
                    self.devices.keyboard = open_keyboard(&self.keyboard_path);
                }
                None
            }
        }
    }

    fn gamepad_tick(&mut self, pad: &GamepadState) -> DriveCommand {
        if self.buttons.edge(Button::EnableToggle, pad.btn_b) {
            let enabled = self.mode.toggle_enabled();
            self.mode.set_aux_level(AUX_LEVEL_MIN as i32);
            info!("Controls {}", if enabled { "enabled" } else { "disabled" });
        }

        if self.buttons.edge(Button::AuxUp, pad.btn_a) {
            self.mode.step_aux_level(1);
        }
        if self.buttons.edge(Button::AuxDown, pad.btn_y) {
            self.mode.step_aux_level(-1);
        }

        for (held, preset) in [
            (pad.btn_lb, WheelPreset::Slow),
            (pad.btn_x, WheelPreset::Medium),
            (pad.btn_rb, WheelPreset::Fast),
        ] {
            if held {
                self.mode.set_wheel_preset(preset.level() as i32);
            }
        }

        if !self.mode.is_enabled() {
            return DriveCommand::FAIL_SAFE;
        }

        let joystick = self.devices.adc.read_intent();
        let intent = fuse(pad.intent(), joystick, self.deadzone);

        DriveCommand::compute(true, intent, self.mode.max_speed(), self.mode.aux_level(), self.deadzone)
    }

    fn keyboard_tick(&mut self) -> DriveCommand {
        if let Some(keyboard) = self.devices.keyboard.as_mut() {
            match keyboard.poll() {
                Ok(commands) => {
                    for command in commands {
                        self.mode.apply(command);
                    }
                }
                Err(e) => {
                    warn!("Keyboard lost: {}", e);
                    self.devices.keyboard = None;
                }
            }
        }

        if !self.mode.is_enabled() {
            return DriveCommand::FAIL_SAFE;
        }

        DriveCommand::compute(
            true,
            IntentVector::ZERO,
            self.mode.max_speed(),
            self.mode.aux_level(),
            self.deadzone,
        )
    }

    /// Sends one frame, giving up after one tick period so a stalled link
    /// cannot hold up the loop or shutdown.
    async fn transmit(&mut self, command: &DriveCommand) {
        let period = self.period();
        match timeout(period, self.devices.link.send_frame(command)).await {
            Ok(Ok(true)) => {
                self.stats.frames_sent += 1;
                debug!("{}", command);
            }
            Ok(Ok(false)) => debug!("{} (no link)", command),
            Ok(Err(e)) => {
                self.stats.write_failures += 1;
                warn!("{}", e);
            }
            Err(_) => {
                self.stats.write_failures += 1;
                warn!("Frame write timed out after {} ms", period.as_millis());
            }
        }
    }

    /// Run until `shutdown` resolves, then release every device.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use rover_teleop::config::Config;
    /// use rover_teleop::control::{ControlLoop, Devices};
    /// use rover_teleop::mode::ModeState;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let config = Config::default();
    ///     let devices = Devices::open(&config).await;
    ///     let control = ControlLoop::new(Arc::new(ModeState::new()), devices, &config);
    ///     let report = control.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
    ///     println!("Sent {} frames", report.frames_sent);
    /// }
    /// ```
    pub async fn run<F>(mut self, shutdown: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Starting control loop in {:?} mode at {} ms per tick",
            self.input_mode(),
            self.period().as_millis()
        );
        if let Some(gamepad) = self.devices.gamepad.as_ref() {
            info!("Driving from gamepad: {}", gamepad.name());
        }

        loop {
            let started = Instant::now();
            self.tick().await;
            let deadline = started + self.period();

            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.teardown().await;
        self.stats
    }

    async fn teardown(&mut self) {
        // The port is dropped even if its final flush times out
        if timeout(self.period(), self.devices.link.close()).await.is_err() {
            warn!("Timed out closing {}", self.devices.link.device_path());
        }
        if let Some(viewer) = self.devices.viewer.take() {
            viewer.stop().await;
        }
        self.devices.gamepad = None;
        self.devices.keyboard = None;
        self.devices.adc = AdcReader::Absent;

        info!(
            "Control loop stopped after {} ticks ({} frames sent, {} write failures)",
            self.stats.ticks, self.stats.frames_sent, self.stats.write_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adc::MockAnalogSource;
    use crate::error::{Result, TeleopError};
    use crate::mode::ModeCommand;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Gamepad replaying a script; `None` simulates a disconnect.
    struct ScriptedGamepad {
        steps: VecDeque<Option<GamepadState>>,
        last: GamepadState,
    }

    impl ScriptedGamepad {
        fn new(steps: Vec<Option<GamepadState>>) -> Self {
            Self {
                steps: steps.into(),
                last: GamepadState::new(),
            }
        }
    }

    impl Gamepad for ScriptedGamepad {
        fn poll(&mut self) -> Result<GamepadState> {
            match self.steps.pop_front() {
                Some(Some(state)) => {
                    self.last = state;
                    Ok(state)
                }
                Some(None) => Err(TeleopError::Controller("unplugged".to_string())),
                None => Ok(self.last),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Keyboard replaying one batch of commands per poll.
    struct ScriptedKeyboard {
        batches: Arc<Mutex<VecDeque<Vec<ModeCommand>>>>,
    }

    impl Keyboard for ScriptedKeyboard {
        fn poll(&mut self) -> Result<Vec<ModeCommand>> {
            Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    fn pressed(f: impl FnOnce(&mut GamepadState)) -> Option<GamepadState> {
        let mut state = GamepadState::new();
        f(&mut state);
        Some(state)
    }

    fn idle() -> Option<GamepadState> {
        Some(GamepadState::new())
    }

    fn build(
        gamepad: Option<Vec<Option<GamepadState>>>,
        keyboard: Option<Vec<Vec<ModeCommand>>>,
        adc: AdcReader,
    ) -> (ControlLoop, Arc<ModeState>, MockSerialPort) {
        let mode = Arc::new(ModeState::new());
        let port = MockSerialPort::new();
        let devices = Devices {
            gamepad: gamepad.map(|steps| Box::new(ScriptedGamepad::new(steps)) as Box<dyn Gamepad>),
            keyboard: keyboard.map(|batches| {
                Box::new(ScriptedKeyboard {
                    batches: Arc::new(Mutex::new(batches.into())),
                }) as Box<dyn Keyboard>
            }),
            adc,
            link: MotorLink::with_port(Box::new(port.clone()), "/dev/mock0"),
            viewer: None,
        };
        let control = ControlLoop::new(Arc::clone(&mode), devices, &Config::default());
        (control, mode, port)
    }

    #[tokio::test]
    async fn test_disabled_sends_fail_safe_every_tick() {
        let stick_forward = pressed(|s| s.axis_y = -1.0);
        let (mut control, _mode, port) =
            build(Some(vec![stick_forward, stick_forward, stick_forward]), None, AdcReader::Absent);

        for _ in 0..3 {
            assert_eq!(control.tick().await, DriveCommand::FAIL_SAFE);
        }
        assert_eq!(port.get_written_lines(), vec!["D 0 0 0 0 0\n"; 3]);
        assert_eq!(control.stats().frames_sent, 3);
    }

    #[tokio::test]
    async fn test_enable_toggle_resets_aux_same_tick() {
        let (mut control, mode, port) = build(
            Some(vec![pressed(|s| {
                s.btn_b = true;
                s.axis_y = -1.0;
            })]),
            None,
            AdcReader::Absent,
        );
        mode.set_aux_level(2);

        let command = control.tick().await;

        assert!(mode.is_enabled());
        assert_eq!(mode.aux_level(), 0);
        assert_eq!(command.aux, 0);
        assert_eq!(port.get_written_lines(), vec!["D 30 30 30 30 0\n"]);
    }

    #[tokio::test]
    async fn test_held_enable_button_toggles_once() {
        let b = pressed(|s| s.btn_b = true);
        let (mut control, mode, _port) = build(Some(vec![b, b, b, idle(), b]), None, AdcReader::Absent);

        let mut history = Vec::new();
        for _ in 0..5 {
            control.tick().await;
            history.push(mode.is_enabled());
        }
        assert_eq!(history, vec![true, true, true, true, false]);
    }

    #[tokio::test]
    async fn test_aux_up_presses_saturate() {
        let a = pressed(|s| s.btn_a = true);
        let (mut control, mode, _port) =
            build(Some(vec![a, idle(), a, idle(), a, idle(), a]), None, AdcReader::Absent);

        assert!(!mode.is_enabled());
        let mut levels = vec![mode.aux_level()];
        for tick in 0..7 {
            control.tick().await;
            if tick % 2 == 0 {
                levels.push(mode.aux_level());
            }
        }
        assert_eq!(levels, vec![0, 1, 2, 3, 3]);
    }

    #[tokio::test]
    async fn test_aux_down_press() {
        let y = pressed(|s| s.btn_y = true);
        let (mut control, mode, _port) = build(Some(vec![y, y, idle(), y]), None, AdcReader::Absent);
        mode.set_aux_level(3);

        control.tick().await;
        control.tick().await;
        assert_eq!(mode.aux_level(), 2);
        control.tick().await;
        control.tick().await;
        assert_eq!(mode.aux_level(), 1);
    }

    #[tokio::test]
    async fn test_enabled_drive_frames() {
        let (mut control, mode, port) = build(
            Some(vec![
                pressed(|s| s.axis_y = -0.9),
                pressed(|s| s.axis_x = -0.5),
                pressed(|s| {
                    s.axis_x = 0.1;
                    s.axis_y = 0.1;
                }),
            ]),
            None,
            AdcReader::Absent,
        );
        mode.enable();
        mode.set_aux_level(1);
        mode.set_wheel_preset(1);

        control.tick().await;
        mode.set_wheel_preset(2);
        control.tick().await;
        control.tick().await;

        assert_eq!(
            port.get_written_lines(),
            vec!["D 27 27 27 27 1\n", "D -22 22 -22 22 1\n", "D 0 0 0 0 1\n"]
        );
    }

    #[tokio::test]
    async fn test_wheel_buttons_select_presets() {
        let (mut control, mode, port) = build(
            Some(vec![
                pressed(|s| {
                    s.btn_rb = true;
                    s.axis_y = -1.0;
                }),
                pressed(|s| {
                    s.btn_x = true;
                    s.axis_y = -1.0;
                }),
                pressed(|s| {
                    s.btn_lb = true;
                    s.axis_y = -1.0;
                }),
            ]),
            None,
            AdcReader::Absent,
        );
        mode.enable();

        for _ in 0..3 {
            control.tick().await;
        }
        assert_eq!(
            port.get_written_lines(),
            vec!["D 60 60 60 60 0\n", "D 45 45 45 45 0\n", "D 30 30 30 30 0\n"]
        );
    }

    #[tokio::test]
    async fn test_idle_gamepad_uses_analog_joystick() {
        let mut source = MockAnalogSource::new();
        // y channel 0 pushed fully forward, x channel 1 centered
        source.expect_read_channel().returning(|channel| Ok(if channel == 0 { 1023 } else { 512 }));
        let adc = AdcReader::with_source(Box::new(source), 1, 0);

        let (mut control, mode, port) = build(Some(vec![idle()]), None, adc);
        mode.enable();

        control.tick().await;
        assert_eq!(port.get_written_lines(), vec!["D 29 29 29 29 0\n"]);
    }

    #[tokio::test]
    async fn test_active_gamepad_overrides_analog_joystick() {
        let mut source = MockAnalogSource::new();
        source.expect_read_channel().returning(|channel| Ok(if channel == 0 { 1023 } else { 512 }));
        let adc = AdcReader::with_source(Box::new(source), 1, 0);

        let (mut control, mode, port) = build(Some(vec![pressed(|s| s.axis_x = 1.0)]), None, adc);
        mode.enable();

        control.tick().await;
        assert_eq!(port.get_written_lines(), vec!["D 30 -30 30 -30 0\n"]);
    }

    #[tokio::test]
    async fn test_keyboard_fallback_drives_link() {
        let (mut control, mode, port) = build(
            None,
            Some(vec![
                vec![],
                vec![ModeCommand::Enable, ModeCommand::Brush(2)],
                vec![ModeCommand::Wheel(WheelPreset::Fast)],
                vec![ModeCommand::Disable],
            ]),
            AdcReader::Absent,
        );

        assert_eq!(control.input_mode(), InputMode::Keyboard);
        assert_eq!(control.period(), Duration::from_millis(100));

        for _ in 0..4 {
            control.tick().await;
        }

        assert_eq!(
            port.get_written_lines(),
            vec!["D 0 0 0 0 0\n", "D 0 0 0 0 2\n", "D 0 0 0 0 2\n", "D 0 0 0 0 0\n"]
        );
        assert_eq!(mode.max_speed(), 60);
    }

    #[tokio::test]
    async fn test_no_inputs_still_refreshes_link() {
        let (mut control, mode, port) = build(None, None, AdcReader::Absent);
        control.tick().await;
        mode.enable();
        mode.set_aux_level(3);
        control.tick().await;
        assert_eq!(port.get_written_lines(), vec!["D 0 0 0 0 0\n", "D 0 0 0 0 3\n"]);
    }

    #[tokio::test]
    async fn test_gamepad_loss_falls_back_to_keyboard() {
        let (mut control, mode, _port) = build(
            Some(vec![idle(), None]),
            Some(vec![vec![], vec![ModeCommand::Enable]]),
            AdcReader::Absent,
        );

        assert_eq!(control.input_mode(), InputMode::Gamepad);
        assert_eq!(control.period(), Duration::from_millis(50));
        control.tick().await;

        control.tick().await;
        assert_eq!(control.input_mode(), InputMode::Keyboard);
        assert!(!mode.is_enabled());

        control.tick().await;
        assert!(mode.is_enabled());
    }

    #[tokio::test]
    async fn test_write_failure_counted_and_not_retried() {
        let (mut control, _mode, port) = build(None, None, AdcReader::Absent);

        port.set_write_error(Some(std::io::ErrorKind::BrokenPipe));
        control.tick().await;
        port.set_write_error(None);
        control.tick().await;

        let stats = control.stats();
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.frames_sent, 1);
        assert_eq!(port.get_written_lines().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_changes_seen_next_tick() {
        let (mut control, mode, port) = build(Some(vec![pressed(|s| s.axis_y = -1.0)]), None, AdcReader::Absent);

        crate::remote::handle_command(&mode, "enable");
        crate::remote::handle_command(&mode, "wheel3");
        crate::remote::handle_command(&mode, "brush1");
        control.tick().await;

        assert_eq!(port.get_written_lines(), vec!["D 60 60 60 60 1\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_holds_rate_and_tears_down_once() {
        let (control, _mode, port) = build(Some(vec![]), None, AdcReader::Absent);

        let report = control.run(tokio::time::sleep(Duration::from_millis(1000))).await;

        assert!((19..=21).contains(&report.ticks), "ticks = {}", report.ticks);
        assert_eq!(report.frames_sent, report.ticks);
        assert_eq!(port.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keyboard_mode_uses_longer_period() {
        let (control, _mode, _port) = build(None, None, AdcReader::Absent);

        let report = control.run(tokio::time::sleep(Duration::from_millis(1000))).await;

        assert!((9..=11).contains(&report.ticks), "ticks = {}", report.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_link_times_out_within_tick() {
        let (mut control, _mode, port) = build(Some(vec![]), None, AdcReader::Absent);
        port.set_stalled(true);

        let started = Instant::now();
        assert_eq!(control.tick().await, DriveCommand::FAIL_SAFE);

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50) && elapsed < Duration::from_millis(100), "{:?}", elapsed);
        assert_eq!(control.stats().write_failures, 1);
        assert_eq!(control.stats().frames_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_link_does_not_block_shutdown() {
        let (control, _mode, port) = build(Some(vec![]), None, AdcReader::Absent);
        port.set_stalled(true);

        let report = control.run(tokio::time::sleep(Duration::from_millis(1000))).await;

        assert!((19..=21).contains(&report.ticks), "ticks = {}", report.ticks);
        assert_eq!(report.write_failures, report.ticks);
        assert_eq!(report.frames_sent, 0);
        assert_eq!(port.close_count(), 1);
    }
}
