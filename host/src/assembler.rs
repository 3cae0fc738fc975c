use crate::parser;

/// line separator the radio gateway prints after every frame
pub const DEFAULT_SEPARATOR: &str = "----------------------";

/// largest frame buffered before it is dropped as runaway input
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024;

/// outcome of feeding one line that closed a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    /// a complete frame carrying at least one message
    Frame(String),
    /// the frame closed but every `Msg=` in it was blank (or absent)
    EmptyPayload,
    /// the frame outgrew the size limit, this many buffered bytes were dropped
    Oversized(usize),
}

/// rebuilds frames out of a line stream
///
/// lines are trimmed and blank ones ignored. everything up to and including
/// the separator line is one frame. a frame that grows past `max_frame_bytes`
/// is dropped, and the rest of it is skipped up to its separator.
#[derive(Debug)]
pub struct FrameAssembler {
    separator: String,
    max_frame_bytes: usize,
    buffer: String,
    discarding: bool,
}

impl FrameAssembler {
    pub fn new(separator: impl Into<String>, max_frame_bytes: usize) -> Self {
        Self {
            separator: separator.into(),
            max_frame_bytes,
            buffer: String::new(),
            discarding: false,
        }
    }

    /// feed one line, returns Some once a separator closes the frame
    pub fn push_line(&mut self, line: &str) -> Option<Assembled> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let closes = line.contains(self.separator.as_str());
        if self.discarding {
            self.discarding = !closes;
            return None;
        }

        if self.buffer.len() + line.len() + 1 > self.max_frame_bytes {
            let dropped = self.discard();
            self.discarding = !closes;
            return Some(Assembled::Oversized(dropped + line.len()));
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');
        if !closes {
            return None;
        }

        let frame = std::mem::take(&mut self.buffer);
        let frame = frame.trim().to_string();
        if parser::has_message(&frame) {
            Some(Assembled::Frame(frame))
        } else {
            Some(Assembled::EmptyPayload)
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// bytes buffered for a frame that has not closed yet
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// give up on the open frame, skipping input until the next separator
    ///
    /// returns how many buffered bytes were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer = String::new();
        self.discarding = true;
        dropped
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR, DEFAULT_MAX_FRAME_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(asm: &mut FrameAssembler, text: &str) -> Vec<Assembled> {
        text.lines().filter_map(|l| asm.push_line(l)).collect()
    }

    #[test]
    fn frame_closes_on_separator() {
        let mut asm = FrameAssembler::default();
        let out = feed(
            &mut asm,
            "Nodo: nodo-1\n\nDatos: Sat=3 Msg=Temp: 20\n   ----------------------  \n",
        );
        assert_eq!(
            out,
            vec![Assembled::Frame(
                "Nodo: nodo-1\nDatos: Sat=3 Msg=Temp: 20\n----------------------".to_string()
            )]
        );
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn blank_payload_frames_are_flagged() {
        let mut asm = FrameAssembler::default();
        let out = feed(&mut asm, "Nodo: 1\nDatos: Msg=\n----------------------\n");
        assert_eq!(out, vec![Assembled::EmptyPayload]);
    }

    #[test]
    fn open_frame_keeps_buffering() {
        let mut asm = FrameAssembler::new("====", DEFAULT_MAX_FRAME_BYTES);
        assert!(feed(&mut asm, "Nodo: 1\nDatos: Msg=Temp: 1\n").is_empty());
        assert!(asm.pending() > 0);
        let out = feed(&mut asm, "====\n");
        assert!(matches!(out.as_slice(), [Assembled::Frame(f)] if f.ends_with("====")));
    }

    #[test]
    fn runaway_frame_is_dropped_and_buffer_stays_bounded() {
        let mut asm = FrameAssembler::new("====", 64);
        let mut out = Vec::new();
        for _ in 0..10_000 {
            out.extend(asm.push_line("Datos: Msg=Temp: 20"));
            assert!(asm.pending() <= 64);
        }
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Assembled::Oversized(n) if n > 0));

        // the tail of the runaway frame is skipped, the next frame is whole
        assert_eq!(asm.push_line("===="), None);
        let out = feed(&mut asm, "Nodo: 2\nDatos: Msg=pH: 7\n====\n");
        assert_eq!(out, vec![Assembled::Frame("Nodo: 2\nDatos: Msg=pH: 7\n====".to_string())]);
    }
}
