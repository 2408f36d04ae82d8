use std::{io, string::FromUtf8Error};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtpFormatError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("packet truncated while reading {0}")]
    PacketTruncated(&'static str),
    #[error("unsupported RTP version: {0}")]
    UnsupportedVersion(u8),
    #[error("RTP payload type out of range: {0}")]
    PayloadTypeOutOfRange(u8),
    #[error("unknown RTCP payload type: {0}")]
    UnknownRtcpPayloadType(u8),
    #[error("unknown SDES item kind: {0}")]
    UnknownSdesItemKind(u8),
    #[error("SDES value exceeds 255 bytes: {0}")]
    SdesValueTooLarge(String),
    #[error("SDES packet carries more than 31 chunks")]
    SdesTooManyChunks,
    #[error("packet carries more than 15 CSRC entries")]
    TooManyCsrc,
    #[error("bye packet carries more than 31 sources")]
    ByeTooManySources,
    #[error("bye reason exceeds 255 bytes: {0}")]
    ByeReasonTooLarge(String),
    #[error("report carries more than 31 report blocks")]
    TooManyReportBlocks,
    #[error("wrong payload type: {0}")]
    WrongPayloadType(String),
    #[error("invalid text field: {0}")]
    InvalidText(#[from] FromUtf8Error),
    #[error("bad padding size: {0}")]
    BadPaddingSize(usize),
    #[error("app packet name must be 4 ascii bytes")]
    BadAppPacketName,
    #[error("app packet subtype out of range: {0}")]
    BadAppSubtype(u8),
    #[error("rtcp compound packet is empty")]
    EmptyCompoundPacket,
    #[error("rtcp compound packet must start with a sender or receiver report")]
    BadFirstPacketInCompound,
    #[error("rtcp compound packet carries no CNAME item")]
    MissingCnameInCompound,
}

pub type RtpFormatResult<T> = Result<T, RtpFormatError>;
