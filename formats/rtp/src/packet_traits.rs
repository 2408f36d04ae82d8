use core::fmt;
use std::io::{self, Cursor};

/// Packets whose wire size is known without looking at an instance.
pub trait FixedSizePacket {
    const SIZE: usize;
}

/// Wire size of a concrete packet, padding included.
pub trait PacketSize {
    fn packet_size(&self) -> usize;
}

pub trait ReadFrom<R: io::Read>: Sized {
    type Error;
    fn read_from(reader: &mut R) -> Result<Self, Self::Error>;
}

/// Cursor-based read that yields `None` when the buffer does not yet hold a
/// whole packet, leaving the caller free to retry with more bytes.
pub trait TryReadFrom<R: AsRef<[u8]>>: Sized {
    type Error;
    fn try_read_from(cursor: &mut Cursor<R>) -> Result<Option<Self>, Self::Error>;
}

/// Read the body of a packet whose header has already been consumed.
pub trait ReadRemainingFrom<Header, R: io::Read>: Sized {
    type Error;
    fn read_remaining_from(header: Header, reader: &mut R) -> Result<Self, Self::Error>;
}

pub trait WriteTo<W: io::Write> {
    type Error: fmt::Debug;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error>;
}
