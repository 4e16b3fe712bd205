//! Sliding-window framing.

use takt_flow::{FlowResult, Lifecycle, Node, Step};

use crate::block::AudioBlock;

/// Emits a `win`-frame window for every `hop`-frame input block.
///
/// The window slides by `hop` frames per step and is zero-prepended until
/// enough input has accumulated, so the first output already has the full
/// window length. When `win < hop` only the trailing `win` frames of each
/// input are kept.
pub struct Framer {
    win: usize,
    hop: usize,
    buffer: AudioBlock,
    life: Lifecycle,
}

impl Framer {
    /// A framer producing `win`-frame windows every `hop` input frames.
    pub fn new(win: usize, hop: usize, channels: usize) -> Self {
        assert!(win > 0 && hop > 0);
        Self {
            win,
            hop,
            buffer: AudioBlock::zeros(win, channels),
            life: Lifecycle::new(),
        }
    }
}

impl Node for Framer {
    type In = AudioBlock;
    type Out = AudioBlock;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: AudioBlock) -> FlowResult<Step<AudioBlock>> {
        self.life.running()?;
        debug_assert_eq!(input.frames(), self.hop, "framer expects hop-sized blocks");
        debug_assert_eq!(input.channels(), self.buffer.channels());

        if self.win < self.hop {
            let from = input.frames() - self.win;
            return Ok(Step::Yield(input.slice_frames(from..input.frames())));
        }

        let ch = self.buffer.channels();
        let keep = (self.win - self.hop) * ch;
        let data = self.buffer.data_mut();
        data.copy_within(self.hop * ch.., 0);
        data[keep..].copy_from_slice(input.data());
        Ok(Step::Yield(self.buffer.clone()))
    }

    fn close(&mut self) -> FlowResult<()> {
        self.life.close();
        Ok(())
    }
}
