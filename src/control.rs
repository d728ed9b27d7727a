//! Control word driven onto the `uio_in` bus.
//!
//! | Bits | Field        |
//! |------|--------------|
//! | 0    | `run`        |
//! | 1    | `step_mode`  |
//! | 2    | `step_in`    |
//! | 3-4  | unused, zero |
//! | 5-7  | `tick_scale` |
//!
//! Every field is masked to its width, so out-of-range inputs are truncated to their
//! low-order bits instead of being rejected.

const RUN_BIT: u8 = 0;
const STEP_MODE_BIT: u8 = 1;
const STEP_IN_BIT: u8 = 2;
const TICK_SCALE_SHIFT: u8 = 5;
const TICK_SCALE_MASK: i64 = 0b111;

/// Packs the four control fields into one byte.
pub fn control_word(run: i64, step_mode: i64, step_in: i64, tick_scale: i64) -> u8 {
    (((tick_scale & TICK_SCALE_MASK) as u8) << TICK_SCALE_SHIFT)
        | (((step_in & 1) as u8) << STEP_IN_BIT)
        | (((step_mode & 1) as u8) << STEP_MODE_BIT)
        | (((run & 1) as u8) << RUN_BIT)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ControlWord {
    pub run: u8,
    pub step_mode: u8,
    pub step_in: u8,
    pub tick_scale: u8,
}

impl ControlWord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(mut self, run: i64) -> Self {
        self.run = (run & 1) as u8;
        self
    }

    pub fn step_mode(mut self, step_mode: i64) -> Self {
        self.step_mode = (step_mode & 1) as u8;
        self
    }

    pub fn step_in(mut self, step_in: i64) -> Self {
        self.step_in = (step_in & 1) as u8;
        self
    }

    pub fn tick_scale(mut self, tick_scale: i64) -> Self {
        self.tick_scale = (tick_scale & TICK_SCALE_MASK) as u8;
        self
    }

    pub fn encode(&self) -> u8 {
        control_word(
            i64::from(self.run),
            i64::from(self.step_mode),
            i64::from(self.step_in),
            i64::from(self.tick_scale),
        )
    }

    /// Bits 3-4 are ignored.
    pub fn decode(word: u8) -> Self {
        Self {
            run: (word >> RUN_BIT) & 1,
            step_mode: (word >> STEP_MODE_BIT) & 1,
            step_in: (word >> STEP_IN_BIT) & 1,
            tick_scale: word >> TICK_SCALE_SHIFT,
        }
    }

    pub fn is_free_running(&self) -> bool {
        self.run == 1 && self.step_mode == 0
    }

    pub fn is_stepping(&self) -> bool {
        self.run == 1 && self.step_mode == 1
    }
}

impl From<ControlWord> for u8 {
    fn from(word: ControlWord) -> u8 {
        word.encode()
    }
}

impl From<u8> for ControlWord {
    fn from(word: u8) -> Self {
        ControlWord::decode(word)
    }
}
