
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use num_complex::Complex;

use crate::DoaErr;
use crate::types::SampleSequence;

pub const BUFFER_SIZE:usize = 2048;

/// Frames of a multi-channel capture stored as little-endian `i16` pairs, `I0 Q0 I1 Q1 ...`, one pair
/// per channel per sample time.  Each item is one sample from every channel.
pub struct InterleavedSource<R: Read> {
	src: R,
	n_channels: usize,
	buffer: Vec<u8>,
	buffer_idx: usize,
	buffer_valid_len: usize,
}

impl<R: Read> InterleavedSource<R> {

	pub fn new(src:R, n_channels:usize) -> Result<Self, DoaErr> {
		if n_channels == 0 { return Err(DoaErr::InvalidConfig("a capture needs at least one channel".into())); }
		Ok(Self { src, n_channels, buffer: vec![0u8; BUFFER_SIZE * 4 * n_channels], buffer_idx: 0, buffer_valid_len: 0 })
	}

	fn frame_bytes(&self) -> usize { 4 * self.n_channels }

	fn buffer_frames(&mut self) -> Result<(), DoaErr> {
		// Keep any partial frame left over from the last read
		let leftover = self.buffer_valid_len - self.buffer_idx;
		self.buffer.copy_within(self.buffer_idx..self.buffer_valid_len, 0);
		self.buffer_idx = 0;
		self.buffer_valid_len = leftover;

		while self.buffer_valid_len < self.frame_bytes() {
			let n = self.src.read(&mut self.buffer[self.buffer_valid_len..]).map_err(|e| DoaErr::Io(format!("{}", e)))?;
			if n == 0 { break; }
			self.buffer_valid_len += n;
		}
		Ok(())
	}

}

impl<R: Read> Iterator for InterleavedSource<R> {
	type Item = Result<Vec<Complex<f64>>, DoaErr>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.buffer_valid_len - self.buffer_idx < self.frame_bytes() {
			if let Err(e) = self.buffer_frames() { return Some(Err(e)); }
			// A trailing partial frame is dropped
			if self.buffer_valid_len < self.frame_bytes() { return None; }
		}

		let frame = &self.buffer[self.buffer_idx..self.buffer_idx + self.frame_bytes()];
		let ans:Vec<Complex<f64>> = frame.chunks_exact(4).map(|iq| Complex{
			re: LittleEndian::read_i16(&iq[0..2]) as f64,
			im: LittleEndian::read_i16(&iq[2..4]) as f64,
		}).collect();

		self.buffer_idx += self.frame_bytes();
		Some(Ok(ans))
	}
}

/// De-interleaves up to `max_samples` samples per channel (everything when `None`)
pub fn read_channels<R: Read>(src:R, n_channels:usize, fs:f64, max_samples:Option<usize>) -> Result<Vec<SampleSequence>, DoaErr> {
	let mut channels:Vec<Vec<Complex<f64>>> = vec![vec![]; n_channels];
	let source = InterleavedSource::new(src, n_channels)?;

	for frame in source.take(max_samples.unwrap_or(std::usize::MAX)) {
		for (ch, s) in channels.iter_mut().zip(frame?.into_iter()) {
			ch.push(s);
		}
	}

	channels.into_iter().map(|samples| SampleSequence::new(samples, fs)).collect()
}

pub fn read_channels_from_file<P: AsRef<Path>>(path:P, n_channels:usize, fs:f64, max_samples:Option<usize>) -> Result<Vec<SampleSequence>, DoaErr> {
	let file = File::open(path.as_ref()).map_err(|e| DoaErr::Io(format!("{}: {}", path.as_ref().display(), e)))?;
	read_channels(BufReader::new(file), n_channels, fs, max_samples)
}

/// Inverse of `read_channels`.  Samples are multiplied by `scale` and saturated to `i16`.
pub fn write_channels<W: Write>(dst:W, channels:&[SampleSequence], scale:f64) -> Result<(), DoaErr> {
	let n = channels.first().map(|c| c.len()).ok_or(DoaErr::EmptySignal)?;
	if let Some(bad) = channels.iter().find(|c| c.len() != n) {
		return Err(DoaErr::LengthMismatch{ expected: n, actual: bad.len() });
	}

	let to_i16 = |x:f64| -> i16 { (x * scale).round().max(std::i16::MIN as f64).min(std::i16::MAX as f64) as i16 };
	let mut dst = BufWriter::new(dst);
	for idx in 0..n {
		for ch in channels.iter() {
			let s = ch.samples[idx];
			dst.write_i16::<LittleEndian>(to_i16(s.re)).map_err(|e| DoaErr::Io(format!("{}", e)))?;
			dst.write_i16::<LittleEndian>(to_i16(s.im)).map_err(|e| DoaErr::Io(format!("{}", e)))?;
		}
	}
	dst.flush().map_err(|e| DoaErr::Io(format!("{}", e)))
}
