//! RTU frame checksums and the frame buffer shared by Modbus byte transports.
//!
//! `busframe-core` provides the CRC16 used by RTU and RTU-over-TCP (ENC)
//! framing and a fixed-capacity [`Message`] that carries one ADU through
//! preparation, transmission and validation. It is `no_std`-compatible.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod frame;
pub mod message;

pub use error::{DecodeError, EncodeError};
pub use frame::rtu::crc16;
pub use message::{Message, Net};
