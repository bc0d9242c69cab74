//! Chunked transfer encoding support
//!
//! Incremental decoder for `Transfer-Encoding: chunked` response bodies.

use super::parser::find_crlf;
use super::{Error, Result};

/// Chunked decoder
///
/// Decodes HTTP chunked transfer encoding format. Input can be fed in
/// arbitrary pieces; the decoder keeps its position between calls.
#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: DecoderState,
    chunk_size: usize,
    chunk_read: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            chunk_size: 0,
            chunk_read: 0,
        }
    }

    /// Decode from the input buffer into the output buffer
    ///
    /// Returns (bytes_consumed, bytes_decoded, is_complete). A call that
    /// consumes and decodes nothing needs more input.
    pub fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, bool)> {
        let mut input_pos = 0;
        let mut output_pos = 0;

        while input_pos < input.len() && output_pos < output.len() {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(&input[input_pos..]) else {
                        break;
                    };
                    let line = String::from_utf8_lossy(&input[input_pos..input_pos + crlf_pos]);

                    // Chunk extensions after ';' are ignored
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    self.chunk_size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                    input_pos += crlf_pos + 2;
                    self.chunk_read = 0;

                    self.state = if self.chunk_size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::ChunkData
                    };
                }

                DecoderState::ChunkData => {
                    let remaining_in_chunk = self.chunk_size - self.chunk_read;
                    let available_input = input.len() - input_pos;
                    let available_output = output.len() - output_pos;

                    let to_copy = remaining_in_chunk.min(available_input).min(available_output);

                    output[output_pos..output_pos + to_copy]
                        .copy_from_slice(&input[input_pos..input_pos + to_copy]);

                    input_pos += to_copy;
                    output_pos += to_copy;
                    self.chunk_read += to_copy;

                    if self.chunk_read == self.chunk_size {
                        self.state = DecoderState::ChunkEnd;
                    } else {
                        break;
                    }
                }

                DecoderState::ChunkEnd => {
                    if input.len() - input_pos < 2 {
                        break;
                    }
                    if &input[input_pos..input_pos + 2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    input_pos += 2;
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    if input.len() - input_pos < 2 {
                        break;
                    }
                    if &input[input_pos..input_pos + 2] == b"\r\n" {
                        input_pos += 2;
                        self.state = DecoderState::Complete;
                        return Ok((input_pos, output_pos, true));
                    }
                    // Trailer headers are skipped up to the empty line
                    match find_crlf(&input[input_pos..]) {
                        Some(crlf_pos) => input_pos += crlf_pos + 2,
                        None => break,
                    }
                }

                DecoderState::Complete => {
                    return Ok((input_pos, output_pos, true));
                }
            }
        }

        Ok((input_pos, output_pos, self.state == DecoderState::Complete))
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}
