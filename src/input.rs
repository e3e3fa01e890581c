use macroquad::prelude::*;
use gilrs::{Axis, Gilrs};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    A,
    Up,
    Down,
    Plus,
    Home,
    /// Matches any of the buttons above
    Any,
}

impl Button {
    fn bit(self) -> u8 {
        match self {
            Button::A => 1 << 0,
            Button::Up => 1 << 1,
            Button::Down => 1 << 2,
            Button::Plus => 1 << 3,
            Button::Home => 1 << 4,
            Button::Any => 0b1_1111,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Went down this frame
    Pressed,
    Held,
    /// Went up this frame
    Released,
}

/// Set of buttons that are down at one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonSet(u8);

impl ButtonSet {
    pub const EMPTY: ButtonSet = ButtonSet(0);

    pub fn with(mut self, button: Button) -> Self {
        self.insert(button);
        self
    }

    pub fn insert(&mut self, button: Button) {
        self.0 |= button.bit();
    }

    pub fn contains(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }
}

#[derive(Error, Debug)]
#[error("input device error: {0}")]
pub struct DeviceError(pub String);

/// Something that can report which buttons are currently down.
pub trait InputDevice {
    fn sample(&mut self) -> Result<ButtonSet, DeviceError>;
}

/// Per-frame view of the controllers with edge detection.
pub struct Input {
    device: Box<dyn InputDevice>,
    current: ButtonSet,
    previous: ButtonSet,
}

impl Input {
    pub fn new(device: Box<dyn InputDevice>) -> Self {
        Input {
            device,
            current: ButtonSet::EMPTY,
            previous: ButtonSet::EMPTY,
        }
    }

    /// Samples the device. Call once per frame before any `get`.
    pub fn refresh(&mut self) {
        self.previous = self.current;
        self.current = match self.device.sample() {
            Ok(held) => held,
            Err(e) => {
                tracing::debug!("{}; treating as no input", e);
                ButtonSet::EMPTY
            }
        };
    }

    pub fn get(&self, trigger: Trigger, button: Button) -> bool {
        let mask = button.bit();
        let (now, before) = (self.current.0 & mask, self.previous.0 & mask);
        match trigger {
            Trigger::Pressed => now & !before != 0,
            Trigger::Held => self.current.contains(button),
            Trigger::Released => before & !now != 0,
        }
    }
}

/// Keyboard plus every gamepad gilrs can see.
pub struct GamepadDevice {
    gilrs: Option<Gilrs>,
}

impl GamepadDevice {
    const ANALOG_DEADZONE: f32 = 0.5;

    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(e) => {
                tracing::warn!("Gamepad support unavailable, using keyboard only: {}", e);
                None
            }
        };
        GamepadDevice { gilrs }
    }

    fn sample_keyboard(held: &mut ButtonSet) {
        let keys = [
            (KeyCode::Up, Button::Up),
            (KeyCode::Down, Button::Down),
            (KeyCode::Enter, Button::A),
            (KeyCode::Space, Button::Plus),
            (KeyCode::Escape, Button::Home),
        ];
        for (key, button) in keys {
            if is_key_down(key) {
                held.insert(button);
            }
        }
    }

    fn sample_controllers(gilrs: &mut Gilrs, held: &mut ButtonSet) {
        // drain events so the cached gamepad state is current
        while gilrs.next_event().is_some() {}

        let buttons = [
            (gilrs::Button::DPadUp, Button::Up),
            (gilrs::Button::DPadDown, Button::Down),
            (gilrs::Button::South, Button::A),
            (gilrs::Button::Start, Button::Plus),
            (gilrs::Button::Mode, Button::Home),
        ];
        for (_, gamepad) in gilrs.gamepads() {
            for (pad_button, button) in buttons {
                if gamepad.is_pressed(pad_button) {
                    held.insert(button);
                }
            }

            // +Y is up on the left stick
            let y = gamepad.value(Axis::LeftStickY);
            if y > Self::ANALOG_DEADZONE {
                held.insert(Button::Up);
            } else if y < -Self::ANALOG_DEADZONE {
                held.insert(Button::Down);
            }
        }
    }
}

impl InputDevice for GamepadDevice {
    fn sample(&mut self) -> Result<ButtonSet, DeviceError> {
        let mut held = ButtonSet::EMPTY;
        Self::sample_keyboard(&mut held);
        if let Some(gilrs) = self.gilrs.as_mut() {
            Self::sample_controllers(gilrs, &mut held);
        }
        Ok(held)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedDevice;
    use super::*;

    fn held(buttons: &[Button]) -> Result<ButtonSet, DeviceError> {
        Ok(buttons.iter().fold(ButtonSet::EMPTY, |set, &b| set.with(b)))
    }

    #[test]
    fn press_hold_release_edges() {
        let device = ScriptedDevice::new(vec![held(&[Button::A]), held(&[Button::A]), held(&[])]);
        let mut input = Input::new(Box::new(device));

        input.refresh();
        assert!(input.get(Trigger::Pressed, Button::A));
        assert!(input.get(Trigger::Held, Button::A));
        assert!(!input.get(Trigger::Released, Button::A));

        input.refresh();
        assert!(!input.get(Trigger::Pressed, Button::A));
        assert!(input.get(Trigger::Held, Button::A));

        input.refresh();
        assert!(!input.get(Trigger::Held, Button::A));
        assert!(input.get(Trigger::Released, Button::A));
    }

    #[test]
    fn any_matches_every_button() {
        let device = ScriptedDevice::new(vec![held(&[Button::Down])]);
        let mut input = Input::new(Box::new(device));
        input.refresh();
        assert!(input.get(Trigger::Pressed, Button::Any));
        assert!(!input.get(Trigger::Pressed, Button::Up));
    }

    #[test]
    fn read_error_counts_as_no_input() {
        let device = ScriptedDevice::new(vec![
            held(&[Button::Plus]),
            Err(DeviceError("unplugged".into())),
            held(&[Button::Plus]),
        ]);
        let mut input = Input::new(Box::new(device));

        input.refresh();
        assert!(input.get(Trigger::Held, Button::Plus));

        input.refresh();
        assert!(!input.get(Trigger::Held, Button::Any));
        assert!(input.get(Trigger::Released, Button::Plus));

        // after the failed read the button is a fresh press again
        input.refresh();
        assert!(input.get(Trigger::Pressed, Button::Plus));
    }

    #[test]
    fn device_error_display() {
        let err = DeviceError("gamepad unplugged".into());
        assert_eq!(err.to_string(), "input device error: gamepad unplugged");
    }

    #[test]
    fn button_set_membership() {
        let set = ButtonSet::EMPTY.with(Button::Up).with(Button::Home);
        assert!(set.contains(Button::Up));
        assert!(set.contains(Button::Home));
        assert!(!set.contains(Button::A));
        assert!(set.contains(Button::Any));
        assert!(!ButtonSet::EMPTY.contains(Button::Any));
    }
}
