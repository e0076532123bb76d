//! `ntrip-core`: an async NTRIP (v2.0) triad — Caster, Client and Server —
//! plus the byte framer and NMEA utilities they share.
//!
//! The [`caster`] module multiplexes RTCM3 corrections from one producer
//! per mountpoint out to any number of consumers and serves the
//! sourcetable. [`client`] dials an upstream caster in download
//! direction and exposes a lazy, restartable byte stream. [`server`]
//! dials upstream in upload direction with a bounded, back-pressured
//! send queue. [`framer`] turns a raw, interleaved byte stream into
//! whole NMEA/RTCM3 frames; [`nmea`] covers NMEA checksums and the
//! `$PQTMEPE`→`$GPGST` conversion.

pub mod caster;
pub mod client;
pub mod config;
pub mod connector;
pub mod credentials;
pub mod error;
pub mod framer;
pub mod nmea;
pub mod server;
pub mod snip;
pub mod sourcetable;

pub use caster::Caster;
pub use client::NtripClient;
pub use credentials::NtripCredentials;
pub use error::NtripError;
pub use framer::{Frame, Framer};
pub use server::NtripServer;
