//! F3DEX2 display list commands
//!
//! One opcode table shared by every reader of display lists. Commands are
//! two words except for the handful the table marks wider.

use crate::core::{Error, Result};
use crate::mesh::{DisplayCommand, Vertex, VERTEX_BUFFER_SIZE};
use crate::scene::TransformMatrix;

use super::stream::BinReader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Noop = 0x00,
    Vtx = 0x01,
    ModifyVtx = 0x02,
    CullDl = 0x03,
    BranchZ = 0x04,
    Tri1 = 0x05,
    Tri2 = 0x06,
    Quad = 0x07,
    DmaIo = 0xD6,
    Texture = 0xD7,
    PopMtx = 0xD8,
    GeometryMode = 0xD9,
    Mtx = 0xDA,
    MoveWord = 0xDB,
    MoveMem = 0xDC,
    LoadUcode = 0xDD,
    Dl = 0xDE,
    EndDl = 0xDF,
    NoopRdp = 0xE0,
    RdpHalf1 = 0xE1,
    SetOtherModeL = 0xE2,
    SetOtherModeH = 0xE3,
    TexRect = 0xE4,
    TexRectFlip = 0xE5,
    LoadSync = 0xE6,
    PipeSync = 0xE7,
    TileSync = 0xE8,
    FullSync = 0xE9,
    SetKeyGb = 0xEA,
    SetKeyR = 0xEB,
    SetConvert = 0xEC,
    SetScissor = 0xED,
    SetPrimDepth = 0xEE,
    RdpSetOtherMode = 0xEF,
    LoadTlut = 0xF0,
    RdpHalf2 = 0xF1,
    SetTileSize = 0xF2,
    LoadBlock = 0xF3,
    LoadTile = 0xF4,
    SetTile = 0xF5,
    FillRect = 0xF6,
    SetFillColor = 0xF7,
    SetFogColor = 0xF8,
    SetBlendColor = 0xF9,
    SetPrimColor = 0xFA,
    SetEnvColor = 0xFB,
    SetCombine = 0xFC,
    SetImg = 0xFD,
    SetZImg = 0xFE,
    SetCImg = 0xFF,
}

impl Opcode {
    pub fn from_u8(b: u8) -> Option<Self> {
        use Opcode::*;
        Some(match b {
            0x00 => Noop,
            0x01 => Vtx,
            0x02 => ModifyVtx,
            0x03 => CullDl,
            0x04 => BranchZ,
            0x05 => Tri1,
            0x06 => Tri2,
            0x07 => Quad,
            0xD6 => DmaIo,
            0xD7 => Texture,
            0xD8 => PopMtx,
            0xD9 => GeometryMode,
            0xDA => Mtx,
            0xDB => MoveWord,
            0xDC => MoveMem,
            0xDD => LoadUcode,
            0xDE => Dl,
            0xDF => EndDl,
            0xE0 => NoopRdp,
            0xE1 => RdpHalf1,
            0xE2 => SetOtherModeL,
            0xE3 => SetOtherModeH,
            0xE4 => TexRect,
            0xE5 => TexRectFlip,
            0xE6 => LoadSync,
            0xE7 => PipeSync,
            0xE8 => TileSync,
            0xE9 => FullSync,
            0xEA => SetKeyGb,
            0xEB => SetKeyR,
            0xEC => SetConvert,
            0xED => SetScissor,
            0xEE => SetPrimDepth,
            0xEF => RdpSetOtherMode,
            0xF0 => LoadTlut,
            0xF1 => RdpHalf2,
            0xF2 => SetTileSize,
            0xF3 => LoadBlock,
            0xF4 => LoadTile,
            0xF5 => SetTile,
            0xF6 => FillRect,
            0xF7 => SetFillColor,
            0xF8 => SetFogColor,
            0xF9 => SetBlendColor,
            0xFA => SetPrimColor,
            0xFB => SetEnvColor,
            0xFC => SetCombine,
            0xFD => SetImg,
            0xFE => SetZImg,
            0xFF => SetCImg,
            _ => return None,
        })
    }

    /// Encoded length in 32-bit words.
    pub fn words(self) -> usize {
        match self {
            Opcode::BranchZ | Opcode::LoadUcode => 4,
            Opcode::TexRect | Opcode::TexRectFlip => 6,
            _ => 2,
        }
    }
}

/// A decoded display list command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Load `count` vertices from `addr` into buffer slots ending before `end`.
    LoadVertices { count: usize, end: usize, addr: u32 },
    /// Buffer slots, already divided by two.
    Tri1([usize; 3]),
    Tri2([usize; 3], [usize; 3]),
    Matrix { addr: u32 },
    /// Pop `bytes / 64` matrices.
    PopMatrix { bytes: u32 },
    /// Call (`push`) or jump to another list.
    List { addr: u32, push: bool },
    End,
    PipeSync,
    GeometryMode { clear: u32, set: u32 },
    /// Anything else, words verbatim.
    Other { opcode: Opcode, words: Vec<u32> },
}

impl Command {
    /// Decode a command from its words; `words.len()` must match the opcode width.
    pub fn decode(opcode: Opcode, words: &[u32]) -> Self {
        let (w0, w1) = (words[0], words[1]);
        let slot = |shift: u32| ((w0 >> shift) & 0xFF) as usize / 2;
        let slot1 = |shift: u32| ((w1 >> shift) & 0xFF) as usize / 2;
        match opcode {
            Opcode::Vtx => Command::LoadVertices {
                count: ((w0 >> 12) & 0xFF) as usize,
                end: (w0 & 0xFF) as usize / 2,
                addr: w1,
            },
            Opcode::Tri1 => Command::Tri1([slot(16), slot(8), slot(0)]),
            Opcode::Tri2 | Opcode::Quad => {
                Command::Tri2([slot(16), slot(8), slot(0)], [slot1(16), slot1(8), slot1(0)])
            }
            Opcode::Mtx => Command::Matrix { addr: w1 },
            Opcode::PopMtx => Command::PopMatrix { bytes: w1 },
            Opcode::Dl => Command::List {
                addr: w1,
                push: (w0 >> 16) & 0xFF == 0,
            },
            Opcode::EndDl => Command::End,
            Opcode::PipeSync => Command::PipeSync,
            Opcode::GeometryMode => Command::GeometryMode {
                clear: !w0 & 0x00FF_FFFF,
                set: w1,
            },
            _ => Command::Other {
                opcode,
                words: words.to_vec(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub const END_DL: [u32; 2] = [0xDF00_0000, 0];
pub const PIPE_SYNC: [u32; 2] = [0xE700_0000, 0];
pub const POP_MATRIX: [u32; 2] = [0xD838_0002, 0x40];

pub fn load_vertices(count: usize, end: usize, addr: u32) -> [u32; 2] {
    [0x0100_0000 | (count as u32) << 12 | 2 * end as u32, addr]
}

fn pack_slots(s: [u8; 3]) -> u32 {
    (2 * s[0] as u32) << 16 | (2 * s[1] as u32) << 8 | 2 * s[2] as u32
}

pub fn tri1(s: [u8; 3]) -> [u32; 2] {
    [0x0500_0000 | pack_slots(s), 0]
}

pub fn tri2(a: [u8; 3], b: [u8; 3]) -> [u32; 2] {
    [0x0600_0000 | pack_slots(a), pack_slots(b)]
}

pub fn matrix(addr: u32) -> [u32; 2] {
    [0xDA38_0000, addr]
}

pub fn call_list(addr: u32) -> [u32; 2] {
    [0xDE00_0000, addr]
}

pub fn geometry_mode(clear: u32, set: u32) -> [u32; 2] {
    [0xD900_0000 | (!clear & 0x00FF_FFFF), set]
}

/// Words of a non-triangle mesh command; `None` for triangle batches.
pub fn encode_display_command(cmd: &DisplayCommand) -> Option<[u32; 2]> {
    match cmd {
        DisplayCommand::Triangles(_) => None,
        DisplayCommand::PipeSync => Some(PIPE_SYNC),
        DisplayCommand::GeometryMode { clear, set } => Some(geometry_mode(*clear, *set)),
        DisplayCommand::Raw(words) => Some(*words),
    }
}

// ---------------------------------------------------------------------------
// Vertex buffer
// ---------------------------------------------------------------------------

/// Which vertex address each slot of the hardware vertex buffer holds.
#[derive(Clone, Debug)]
pub struct VertexWindow {
    slots: [Option<u32>; VERTEX_BUFFER_SIZE],
}

impl Default for VertexWindow {
    fn default() -> Self {
        Self {
            slots: [None; VERTEX_BUFFER_SIZE],
        }
    }
}

impl VertexWindow {
    /// Apply a vertex load; `at` is the command offset for error reporting.
    pub fn load(&mut self, count: usize, end: usize, addr: u32, at: usize) -> Result<()> {
        if end > VERTEX_BUFFER_SIZE || count > end {
            return Err(Error::corrupt(
                at,
                format!("vertex load of {} ending at slot {} overflows the buffer", count, end),
            ));
        }
        for (k, slot) in self.slots[end - count..end].iter_mut().enumerate() {
            *slot = Some(addr.wrapping_add((Vertex::COMPILED_SIZE * k) as u32));
        }
        Ok(())
    }

    /// Address loaded into `slot`.
    pub fn resolve(&self, slot: usize, at: usize) -> Result<u32> {
        if slot >= VERTEX_BUFFER_SIZE {
            return Err(Error::corrupt(at, format!("vertex slot {} out of range", slot)));
        }
        self.slots[slot]
            .ok_or_else(|| Error::corrupt(at, format!("vertex slot {} was never loaded", slot)))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// A command with its position and raw words.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoded {
    pub offset: usize,
    pub command: Command,
    pub words: Vec<u32>,
}

/// Reads commands one at a time from a display list in a file.
pub struct CommandReader<'a, 'b> {
    reader: &'b mut BinReader<'a>,
}

impl<'a, 'b> CommandReader<'a, 'b> {
    /// Start reading at `offset`.
    pub fn new(reader: &'b mut BinReader<'a>, offset: usize) -> Result<Self> {
        reader.seek(offset)?;
        Ok(Self { reader })
    }

    pub fn pos(&self) -> usize {
        self.reader.pos()
    }

    /// Continue reading at another offset.
    pub fn jump(&mut self, offset: usize) -> Result<()> {
        self.reader.seek(offset)
    }

    /// Read a vertex record at `offset`, then return to the current command.
    pub fn vertex_at(&mut self, offset: usize) -> Result<Vertex> {
        let resume = self.reader.pos();
        self.reader.seek(offset)?;
        let r = &mut *self.reader;
        let position = [r.i16()?, r.i16()?, r.i16()?];
        let flag = r.u16()?;
        let uv = [r.i16()?, r.i16()?];
        let color = [r.u8()?, r.u8()?, r.u8()?, r.u8()?];
        self.reader.seek(resume)?;
        if flag != 0 {
            return Err(Error::corrupt(offset + 6, format!("vertex padding is {:04X}", flag)));
        }
        Ok(Vertex { position, uv, color })
    }

    /// Read a fixed-point matrix at `offset`, then return to the current command.
    pub fn matrix_at(&mut self, offset: usize) -> Result<TransformMatrix> {
        let resume = self.reader.pos();
        self.reader.seek(offset)?;
        let mut halves = [0u16; 32];
        for h in halves.iter_mut() {
            *h = self.reader.u16()?;
        }
        self.reader.seek(resume)?;
        Ok(TransformMatrix::from_halves(&halves))
    }

    /// Next command in the list.
    ///
    /// An opcode outside the table is [`Error::UnknownOpcode`]; the reader
    /// cannot know its width, so the list cannot continue past it.
    pub fn next_command(&mut self) -> Result<Decoded> {
        let offset = self.reader.pos();
        let w0 = self.reader.u32()?;
        let op = (w0 >> 24) as u8;
        let opcode = Opcode::from_u8(op).ok_or(Error::UnknownOpcode { opcode: op, offset })?;

        let mut words = Vec::with_capacity(opcode.words());
        words.push(w0);
        for _ in 1..opcode.words() {
            words.push(self.reader.u32()?);
        }
        Ok(Decoded {
            offset,
            command: Command::decode(opcode, &words),
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_table_widths() {
        assert_eq!(Opcode::from_u8(0xDD).map(Opcode::words), Some(4));
        assert_eq!(Opcode::from_u8(0xE5).map(Opcode::words), Some(6));
        assert_eq!(Opcode::from_u8(0xDE).map(Opcode::words), Some(2));
        assert_eq!(Opcode::from_u8(0x08), None);
        assert_eq!(Opcode::from_u8(0xD5), None);
        for b in 0..=0xFFu8 {
            if let Some(op) = Opcode::from_u8(b) {
                assert_eq!(op as u8, b);
            }
        }
    }

    #[test]
    fn test_encoders_decode_back() {
        let [w0, w1] = load_vertices(3, 5, 0x8021_0040);
        assert_eq!(w0, 0x0100_300A);
        assert_eq!(
            Command::decode(Opcode::Vtx, &[w0, w1]),
            Command::LoadVertices { count: 3, end: 5, addr: 0x8021_0040 }
        );

        assert_eq!(tri1([0, 1, 2]), [0x0500_0204, 0]);
        assert_eq!(tri2([0, 1, 2], [2, 1, 3]), [0x0600_0204, 0x0004_0206]);
        assert_eq!(
            Command::decode(Opcode::Tri2, &tri2([0, 1, 2], [2, 1, 3])),
            Command::Tri2([0, 1, 2], [2, 1, 3])
        );

        let mode = geometry_mode(0x0000_0400, 0x0020_0000);
        assert_eq!(mode[0], 0xD9FF_FBFF);
        assert_eq!(
            Command::decode(Opcode::GeometryMode, &mode),
            Command::GeometryMode { clear: 0x400, set: 0x0020_0000 }
        );
        assert_eq!(geometry_mode(0, 0x400)[0], 0xD9FF_FFFF);
    }

    #[test]
    fn test_window_load_and_resolve() {
        let mut window = VertexWindow::default();
        window.load(2, 5, 0x8021_0100, 0).unwrap();
        assert_eq!(window.resolve(3, 0).unwrap(), 0x8021_0100);
        assert_eq!(window.resolve(4, 0).unwrap(), 0x8021_0110);
        assert!(window.resolve(2, 0).is_err());
        assert!(window.resolve(40, 0).is_err());
        assert!(window.load(4, 33, 0x8021_0000, 0).is_err());
    }

    #[test]
    fn test_reader_wide_and_unknown() {
        let bytes = words_to_bytes(&[
            0xDD00_0000, 1, 2, 3, // load ucode, 4 words
            0xDE01_0000, 0x8021_0100,
            0x0800_0000, 0,
        ]);
        let mut r = BinReader::new(&bytes);
        let mut cmds = CommandReader::new(&mut r, 0).unwrap();

        let first = cmds.next_command().unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(first.words, [0xDD00_0000, 1, 2, 3]);
        assert!(matches!(first.command, Command::Other { opcode: Opcode::LoadUcode, .. }));

        let second = cmds.next_command().unwrap();
        assert_eq!(second.offset, 16);
        assert_eq!(second.command, Command::List { addr: 0x8021_0100, push: false });

        let err = cmds.next_command().unwrap_err();
        assert!(matches!(err, Error::UnknownOpcode { opcode: 0x08, offset: 24 }));
    }
}
