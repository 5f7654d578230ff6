use crate::error::{Error, Result};
use crate::hosts::HostPool;
use crate::packet::PacketTemplate;
use crate::pcap::{self, GlobalHeader, RecordHeader, GLOBAL_HEADER_LEN, RECORD_HEADER_LEN};
use crate::structs::*;
use crate::temporal;

use rand_core::*;
use rand_distr::{Bernoulli, Distribution};
use std::io::Write;

const MICROS: u64 = pcap::MICROS_PER_SECOND as u64;

/// Container and per-packet parameters shared by every file of a run
#[derive(Debug, Clone, Default)]
pub struct CaptureSettings {
    pub header: GlobalHeader,
    pub template: PacketTemplate,
}

/// Progress of one build. Transitions only go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildState {
    Idle,
    HeaderWritten,
    Emitting,
    Closed,
}

impl BuildState {
    fn advance(&mut self, next: BuildState) {
        debug_assert!(next > *self);
        log::trace!("Capture builder: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// Assembles capture files: one global header, then timestamped packets
/// until the time window or the size budget runs out.
#[derive(Debug, Clone)]
pub struct CaptureFileBuilder {
    settings: CaptureSettings,
    frame_len: usize,
}

impl CaptureFileBuilder {
    pub fn new(settings: CaptureSettings) -> Self {
        let frame_len = settings.template.frame_len();
        CaptureFileBuilder {
            settings,
            frame_len,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Encoded size of one packet, record header included
    pub fn per_packet_size(&self) -> u64 {
        (RECORD_HEADER_LEN + self.frame_len) as u64
    }

    /// Maximum number of packets that fit in `max_size` bytes
    pub fn packet_budget(&self, max_size: u64) -> Result<u64> {
        if max_size <= GLOBAL_HEADER_LEN as u64 {
            return Err(Error::Configuration(format!(
                "maximum size must exceed the {GLOBAL_HEADER_LEN}-byte global header, got {max_size}"
            )));
        }
        let budget = (max_size - GLOBAL_HEADER_LEN as u64) / self.per_packet_size();
        if budget < 1 {
            return Err(Error::Configuration(format!(
                "maximum size of {max_size} bytes cannot hold a single {}-byte packet",
                self.per_packet_size()
            )));
        }
        Ok(budget)
    }

    fn check(&self, request: &CaptureRequest) -> Result<u64> {
        if request.duration == 0 {
            return Err(Error::Configuration("duration must be positive".into()));
        }
        match request.start.checked_add(request.duration - 1) {
            // record timestamps are 32-bit seconds
            Some(last) if last <= u32::MAX as u64 => (),
            _ => {
                return Err(Error::Configuration(format!(
                    "capture window of {}s starting at {} ends after the last pcap timestamp",
                    request.duration, request.start
                )))
            }
        }
        if self.frame_len > self.settings.header.snaplen as usize {
            return Err(Error::Configuration(format!(
                "{}-byte frames exceed the snaplen of {}",
                self.frame_len, self.settings.header.snaplen
            )));
        }
        self.packet_budget(request.max_size)
    }

    /// Build a whole capture in memory
    pub fn build(
        &self,
        request: &CaptureRequest,
        hosts: &HostPool,
        rng: &mut impl RngCore,
    ) -> Result<Capture> {
        let mut bytes = Vec::new();
        let packet_count = self.build_into(request, hosts, rng, &mut bytes)?;
        Ok(Capture {
            bytes,
            packet_count,
        })
    }

    /// Build a capture into `out` and return the number of packets.
    /// Nothing is written when the request is invalid, but `out` may hold a
    /// partial capture if encoding or writing fails midway.
    pub fn build_into<W: Write>(
        &self,
        request: &CaptureRequest,
        hosts: &HostPool,
        rng: &mut impl RngCore,
        out: &mut W,
    ) -> Result<u64> {
        let budget = self.check(request)?;
        let frame_len: u32 = self.frame_len.try_into().map_err(|_| {
            Error::Configuration(format!("frame length {} is too large", self.frame_len))
        })?;
        let endianness = self.settings.header.endianness;
        let coin = Bernoulli::new(0.5).map_err(|e| Error::Configuration(e.to_string()))?;
        let mut state = BuildState::Idle;

        out.write_all(&pcap::encode_global_header(&self.settings.header))?;
        state.advance(BuildState::HeaderWritten);

        let end_second = request.start + request.duration - 1;
        let mut current_second = request.start;
        let mut current_micros = 0u64;
        let mut emitted = 0u64;
        state.advance(BuildState::Emitting);

        while current_second < end_second && emitted < budget {
            let direction = if coin.sample(rng) {
                Direction::Outbound
            } else {
                Direction::Inbound
            };
            let (src, dst) = hosts.pick_pair(direction, rng)?;
            let frame = self.settings.template.encode_frame(&src, &dst)?;
            let record = RecordHeader {
                ts_seconds: current_second,
                // always normalized below one second
                ts_micros: current_micros as u32,
                included_len: frame_len,
                original_len: frame_len,
            };
            out.write_all(&pcap::encode_record_header(&record, endianness)?)?;
            out.write_all(&frame)?;
            emitted += 1;

            if emitted < budget {
                let remaining_micros = ((end_second - current_second) * MICROS)
                    .saturating_sub(current_micros);
                let delay =
                    temporal::inter_packet_delay_micros(remaining_micros, budget - emitted, rng)?;
                current_micros += delay;
                while current_micros >= MICROS {
                    current_second += 1;
                    current_micros -= MICROS;
                }
            }
        }

        out.flush()?;
        state.advance(BuildState::Closed);
        log::debug!(
            "Capture of {emitted} packets ({} bytes) from {} over {}s",
            GLOBAL_HEADER_LEN as u64 + emitted * self.per_packet_size(),
            request.start,
            request.duration
        );
        Ok(emitted)
    }
}
