use crate::EncodeError;
use core::fmt;

/// Maximum RTU ADU: address + 253-byte PDU + 2-byte CRC.
pub const RTU_MAX_ADU_LEN: usize = 256;
/// Maximum TCP ADU: 7-byte MBAP header + 253-byte PDU.
pub const TCP_MAX_ADU_LEN: usize = 260;
pub const MBAP_HEADER_LEN: usize = 7;
pub const CRC_LEN: usize = 2;

/// Network kind a [`Message`] is framed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Net {
    Rtu,
    Tcp,
    /// RTU frames carried over a TCP stream.
    Enc,
}

impl Net {
    pub const fn max_adu_len(self) -> usize {
        match self {
            Self::Rtu => RTU_MAX_ADU_LEN,
            Self::Tcp | Self::Enc => TCP_MAX_ADU_LEN,
        }
    }

    /// Bytes in front of the function code. The slave address is the last of them.
    pub const fn header_len(self) -> usize {
        match self {
            Self::Rtu | Self::Enc => 1,
            Self::Tcp => MBAP_HEADER_LEN,
        }
    }

    /// Bytes the transport appends after the PDU.
    pub const fn trailer_len(self) -> usize {
        match self {
            Self::Rtu | Self::Enc => CRC_LEN,
            Self::Tcp => 0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rtu => "rtu",
            Self::Tcp => "tcp",
            Self::Enc => "enc",
        }
    }
}

impl fmt::Display for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One application data unit on its way to or from a transport.
///
/// The buffer has a fixed capacity chosen by the network kind; `adu_size`
/// tracks how many bytes are valid, including a checksum once a transport
/// has appended one. The MBAP header of [`Net::Tcp`] messages is left zeroed
/// for the TCP backend to fill.
#[derive(Clone)]
pub struct Message {
    net: Net,
    buf: [u8; TCP_MAX_ADU_LEN],
    adu_size: usize,
}

impl Message {
    pub const fn new(net: Net) -> Self {
        Self {
            net,
            buf: [0u8; TCP_MAX_ADU_LEN],
            adu_size: 0,
        }
    }

    /// Builds a message addressed to `slave` carrying `pdu` (function code + data).
    ///
    /// Room for the transport trailer is reserved, so a message built here can
    /// always be prepared for sending.
    pub fn with_pdu(net: Net, slave: u8, pdu: &[u8]) -> Result<Self, EncodeError> {
        if pdu.is_empty() {
            return Err(EncodeError::InvalidLength);
        }
        let header_len = net.header_len();
        if header_len + pdu.len() + net.trailer_len() > net.max_adu_len() {
            return Err(EncodeError::BufferTooSmall);
        }

        let mut msg = Self::new(net);
        msg.buf[header_len - 1] = slave;
        msg.buf[header_len..header_len + pdu.len()].copy_from_slice(pdu);
        msg.adu_size = header_len + pdu.len();
        Ok(msg)
    }

    /// Wraps raw ADU bytes, typically a frame read from the wire.
    pub fn from_adu(net: Net, adu: &[u8]) -> Result<Self, EncodeError> {
        let mut msg = Self::new(net);
        msg.extend_from_slice(adu)?;
        Ok(msg)
    }

    pub const fn net(&self) -> Net {
        self.net
    }

    pub const fn capacity(&self) -> usize {
        self.net.max_adu_len()
    }

    pub const fn adu_size(&self) -> usize {
        self.adu_size
    }

    pub fn adu(&self) -> &[u8] {
        &self.buf[..self.adu_size]
    }

    pub fn adu_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.adu_size]
    }

    /// The whole buffer up to capacity, for receivers filling it in place.
    /// Follow with [`Message::set_adu_size`].
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        &mut self.buf[..capacity]
    }

    pub fn set_adu_size(&mut self, adu_size: usize) -> Result<(), EncodeError> {
        if adu_size > self.capacity() {
            return Err(EncodeError::BufferTooSmall);
        }
        self.adu_size = adu_size;
        Ok(())
    }

    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let end = self.adu_size + data.len();
        if end > self.capacity() {
            return Err(EncodeError::BufferTooSmall);
        }
        self.buf[self.adu_size..end].copy_from_slice(data);
        self.adu_size = end;
        Ok(())
    }

    pub fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.adu_size)
    }

    /// Number of bytes after the header: function code, data and any trailer.
    pub fn size(&self) -> usize {
        self.adu_size.saturating_sub(self.net.header_len())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn slave(&self) -> Option<u8> {
        self.adu().get(self.net.header_len() - 1).copied()
    }

    pub fn function(&self) -> Option<u8> {
        self.adu().get(self.net.header_len()).copied()
    }

    /// The received checksum held in the last two ADU bytes, in the register
    /// form returned by [`crate::crc16`].
    pub fn crc(&self) -> Option<u16> {
        let adu = self.adu();
        match adu {
            [.., lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.buf = [0u8; TCP_MAX_ADU_LEN];
        self.adu_size = 0;
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.net == other.net && self.adu() == other.adu()
    }
}

impl Eq for Message {}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("net", &self.net)
            .field("adu", &self.adu())
            .finish()
    }
}
