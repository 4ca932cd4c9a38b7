//! Color and scenario value types and their wire forms.

/// Built-in scenario slots recognized by the device firmware.
///
/// Slots `CUSTOM_1..=CUSTOM_4` are writable through
/// [`TelinkLight::edit_scenario`](crate::light::TelinkLight::edit_scenario);
/// the rest are factory animations.
pub mod scenario_id {
    pub const CUSTOM_1: u8 = 0x00;
    pub const CUSTOM_2: u8 = 0x01;
    pub const CUSTOM_3: u8 = 0x02;
    pub const CUSTOM_4: u8 = 0x03;
    pub const JUMP: u8 = 0x81;
    pub const GRADIENT: u8 = 0x82;
    pub const FREQUENCY: u8 = 0x83;
    pub const LOOP: u8 = 0x84;
    pub const MORNING: u8 = 0x85;
    pub const NOON: u8 = 0x86;
    pub const DINNER: u8 = 0x87;
    pub const WARN: u8 = 0x88;
    pub const COLD: u8 = 0x89;
    pub const SIX_COLOR_GRADIENT: u8 = 0x8A;
    pub const SIX_COLOR_JUMP: u8 = 0x8B;
    pub const WHITE: u8 = 0x8C;
    pub const RED_GRADIENT: u8 = 0x8D;
    pub const SEA: u8 = 0x8E;
    pub const THREE_COLOR_JUMP: u8 = 0x8F;
    pub const THREE_COLOR_GRADIENT: u8 = 0x90;
    pub const SEVEN_COLOR_JUMP: u8 = 0x91;
    pub const SEVEN_COLOR_GRADIENT: u8 = 0x92;
    pub const RGB_MORNING: u8 = 0x93;
    pub const RGB_NOON: u8 = 0x94;
    pub const RGB_DINNER: u8 = 0x95;
    pub const FOREST: u8 = 0x96;
    pub const FLAME: u8 = 0x97;
    pub const RELAX: u8 = 0x98;
    pub const WORK: u8 = 0x99;
    pub const DEFAULT: u8 = 0xFF;
}

pub const KELVIN_MIN: u16 = 2700;
pub const KELVIN_MAX: u16 = 6500;

/// A color state: RGB channels, the two white-point channels (Y = warm,
/// W = cool), and a brightness in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub y: u8,
    pub w: u8,
    pub brightness: u8,
}

impl Color {
    /// RGB color at the given brightness (clamped to 100).
    pub fn rgb(r: u8, g: u8, b: u8, brightness: u8) -> Self {
        Self {
            r,
            g,
            b,
            y: 0,
            w: 0,
            brightness: brightness.min(100),
        }
    }

    /// White light from raw Y/W channel values.
    ///
    /// A zero brightness is raised to 3 so the lamp stays visibly lit.
    pub fn white(y: u8, w: u8, brightness: u8) -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            y,
            w,
            brightness: Self::floor_brightness(brightness),
        }
    }

    /// White light from a black-body temperature in kelvin, clamped to
    /// [2700, 6500]. One channel saturates while the other follows a linear
    /// ramp over the range.
    pub fn from_kelvin(kelvin: u16, brightness: u8) -> Self {
        let k = kelvin.clamp(KELVIN_MIN, KELVIN_MAX) as u32;
        let (y, w) = if k > 4600 {
            ((((KELVIN_MAX as u32 - k) * 255) / 1900) as u8, 255)
        } else {
            (255, (((k - KELVIN_MIN as u32) * 255) / 1900) as u8)
        };
        Self::white(y, w, brightness)
    }

    fn floor_brightness(brightness: u8) -> u8 {
        match brightness.min(100) {
            0 => 3,
            b => b,
        }
    }

    /// 8-byte wire form: `brightness, R, G, B, Y, W, 0, 0`.
    pub fn encode(&self) -> [u8; 8] {
        [self.brightness, self.r, self.g, self.b, self.y, self.w, 0, 0]
    }
}

pub const DEFAULT_STEP_SPEED: u8 = 7;

/// One scenario step: a color shown at an animation speed of 0..=15.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioStep {
    pub color: Color,
    pub speed: u8,
}

/// An ordered list of colors the device cycles through, each with its own
/// animation speed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a color at the default speed.
    pub fn add_color(&mut self, color: Color) {
        self.add_color_with_speed(color, DEFAULT_STEP_SPEED);
    }

    /// Appends a color; the speed is masked to its low 4 bits.
    pub fn add_color_with_speed(&mut self, color: Color, speed: u8) {
        self.steps.push(ScenarioStep {
            color,
            speed: speed & 0x0F,
        });
    }

    /// Replaces the color at `index`, keeping its speed.
    pub fn replace_color(&mut self, index: usize, color: Color) {
        self.steps[index].color = color;
    }

    /// Removes the step at `index`.
    pub fn remove_color(&mut self, index: usize) {
        self.steps.remove(index);
    }

    /// Sets the speed of the step at `index`, masked to its low 4 bits.
    pub fn set_speed(&mut self, index: usize, speed: u8) {
        self.steps[index].speed = speed & 0x0F;
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[ScenarioStep] {
        &self.steps
    }

    /// 12-byte wire form of step `index`: a 4-byte header
    /// `{0, is_last, 0x10 + speed, 0x10·index + len}` followed by the color
    /// encoding. `index` must be in range.
    pub fn step_bytes(&self, index: usize) -> [u8; 12] {
        let step = &self.steps[index];
        let n = self.steps.len() as u8;
        let is_last = index == self.steps.len() - 1;
        let mut out = [0u8; 12];
        out[1] = is_last as u8;
        out[2] = 0x10 + step.speed;
        out[3] = 0x10 * index as u8 + n;
        out[4..].copy_from_slice(&step.color.encode());
        out
    }
}
