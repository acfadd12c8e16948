//! Line reader over a (compressed) OSM planet file.
//!
//! Decompression runs on a background thread which fills one of two fixed size buffers while
//! the caller drains the other. Buffers are handed back and forth through two bounded
//! channels: the worker waits for a drained buffer, the reader waits for a filled one. Lines
//! therefore arrive in file order and memory use is bounded by the two buffers plus the
//! longest line.
//!
//! A file may be the concatenation of several compressed streams (parallel bzip2 tools
//! produce these). When one stream ends and bytes remain, a new decoder is started on them.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bzip2::bufread::BzDecoder;
use crossbeam_channel::{bounded, never, Receiver, Sender};
use log::{debug, warn};
use memchr::memchr2;
use xz::bufread::XzDecoder;

use crate::errors::{Error, ErrorKind, Result};

const BUFFER_COUNT: usize = 2;
const INPUT_BUFFER: usize = 64 * 1024;

const BZIP2_MAGIC: &[u8] = b"BZh";
const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Bzip2,
    Xz,
    Plain,
}

impl Compression {
    /// Guesses the format from the first bytes of the file.
    pub fn detect(header: &[u8]) -> Option<Compression> {
        if header.starts_with(BZIP2_MAGIC) {
            Some(Compression::Bzip2)
        } else if header.starts_with(XZ_MAGIC) {
            Some(Compression::Xz)
        } else {
            let text = header.strip_prefix(UTF8_BOM).unwrap_or(header);
            match text.iter().find(|b| !b.is_ascii_whitespace()) {
                Some(b'<') => Some(Compression::Plain),
                Some(_) => None,
                None => Some(Compression::Plain),
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
            Compression::Plain => "plain",
        }
    }
}

enum Decoder {
    Plain(BufReader<File>),
    Bzip2(BzDecoder<BufReader<File>>),
    Xz(XzDecoder<BufReader<File>>),
    Exhausted,
}

impl Decoder {
    fn start(compression: Compression, input: BufReader<File>) -> Decoder {
        match compression {
            Compression::Plain => Decoder::Plain(input),
            Compression::Bzip2 => Decoder::Bzip2(BzDecoder::new(input)),
            // Decodes concatenated xz streams and stream padding on its own.
            Compression::Xz => Decoder::Xz(XzDecoder::new_multi_decoder(input)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decoder::Plain(input) => input.read(buf),
            Decoder::Bzip2(decoder) => decoder.read(buf),
            Decoder::Xz(decoder) => decoder.read(buf),
            Decoder::Exhausted => Ok(0),
        }
    }

    fn into_input(self) -> Option<BufReader<File>> {
        match self {
            Decoder::Plain(input) => Some(input),
            Decoder::Bzip2(decoder) => Some(decoder.into_inner()),
            Decoder::Xz(decoder) => Some(decoder.into_inner()),
            Decoder::Exhausted => None,
        }
    }
}

fn decode_error(compression: Compression, err: io::Error) -> Error {
    match (compression, err.kind()) {
        (Compression::Plain, _) => err.into(),
        (
            _,
            io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Other,
        ) => Error::decompress(format!("{} stream: {err}", compression.as_str())),
        _ => err.into(),
    }
}

/// Decompressed bytes of every stream in the file, in order.
struct BlockSource {
    compression: Compression,
    decoder: Decoder,
    streams: usize,
}

impl BlockSource {
    fn new(compression: Compression, input: BufReader<File>) -> BlockSource {
        BlockSource {
            compression,
            decoder: Decoder::start(compression, input),
            streams: 1,
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let compression = self.compression;
        loop {
            let read = self
                .decoder
                .read(buf)
                .map_err(|err| decode_error(compression, err))?;
            if read > 0 || buf.is_empty() {
                return Ok(read);
            }
            if !self.next_stream()? {
                return Ok(0);
            }
        }
    }

    /// Called when the current decoder is finished. Starts a decoder on the remaining
    /// bytes, or returns false at end of file.
    fn next_stream(&mut self) -> Result<bool> {
        let decoder = mem::replace(&mut self.decoder, Decoder::Exhausted);
        if self.compression == Compression::Plain {
            return Ok(false);
        }
        let Some(mut input) = decoder.into_input() else {
            return Ok(false);
        };
        if input.fill_buf()?.is_empty() {
            return Ok(false);
        }
        self.streams += 1;
        debug!(stream = self.streams, format = self.compression.as_str(); "Starting next compressed stream");
        self.decoder = Decoder::start(self.compression, input);
        Ok(true)
    }

    /// Fills `buf` completely unless the input runs out first.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let read = self.read(&mut buf[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        Ok(filled)
    }
}

struct Buffer {
    data: Box<[u8]>,
    len: usize,
}

impl Buffer {
    fn new(size: usize) -> Buffer {
        Buffer {
            data: vec![0; size].into_boxed_slice(),
            len: 0,
        }
    }

    fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

enum Fill {
    Data(Buffer),
    End,
    Failed(Error),
}

fn decompress_worker(
    mut source: BlockSource,
    drained: Receiver<Buffer>,
    filled: Sender<Fill>,
    stop: Arc<AtomicBool>,
) {
    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }
        let Ok(mut buffer) = drained.recv() else {
            break;
        };
        if stop.load(Ordering::Acquire) {
            break;
        }
        let message = match source.fill(&mut buffer.data[..]) {
            Ok(0) => Fill::End,
            Ok(len) => {
                buffer.len = len;
                Fill::Data(buffer)
            }
            Err(err) => Fill::Failed(err),
        };
        let last = !matches!(message, Fill::Data(_));
        if filled.send(message).is_err() || last {
            break;
        }
    }
    debug!(streams = source.streams; "Decompression worker exiting");
}

pub struct PlanetReader {
    path: PathBuf,
    compression: Compression,
    filled: Receiver<Fill>,
    drained: Option<Sender<Buffer>>,
    current: Option<Buffer>,
    offset: usize,
    line: Vec<u8>,
    at_end: bool,
    lines: u64,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PlanetReader {
    pub fn open(path: &Path, buffer_size: usize) -> Result<PlanetReader> {
        if buffer_size == 0 {
            return Err(Error::config("buffer size must be at least 1 byte"));
        }
        let file = File::open(path).map_err(|err| {
            Error::new(ErrorKind::Io, format!("unable to open {}: {err}", path.display()))
        })?;
        let mut input = BufReader::with_capacity(INPUT_BUFFER, file);
        let compression = Compression::detect(input.fill_buf()?).ok_or_else(|| {
            Error::decompress(format!("{} is not a bzip2, xz or XML file", path.display()))
        })?;

        let (drained_tx, drained_rx) = bounded(BUFFER_COUNT);
        let (filled_tx, filled_rx) = bounded(BUFFER_COUNT);
        for _ in 0..BUFFER_COUNT {
            drained_tx
                .send(Buffer::new(buffer_size))
                .map_err(|_| Error::resource("buffer channel closed before start"))?;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let source = BlockSource::new(compression, input);
        let worker = thread::Builder::new()
            .name("planet-decompress".to_string())
            .spawn({
                let stop = Arc::clone(&stop);
                move || decompress_worker(source, drained_rx, filled_tx, stop)
            })
            .map_err(|err| Error::resource(format!("unable to start decompression thread: {err}")))?;

        let shown = path.display().to_string();
        debug!(path = shown.as_str(), format = compression.as_str(), buffer_size = buffer_size; "Opened planet file");

        Ok(PlanetReader {
            path: path.to_path_buf(),
            compression,
            filled: filled_rx,
            drained: Some(drained_tx),
            current: None,
            offset: 0,
            line: Vec::new(),
            at_end: false,
            lines: 0,
            stop,
            worker: Some(worker),
        })
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Number of lines returned so far.
    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    /// Next non-empty line without its CR/LF terminator, or `None` at end of input.
    pub fn read_line(&mut self) -> Result<Option<&[u8]>> {
        self.line.clear();
        loop {
            let Some(buffer) = self.current.as_ref() else {
                if self.at_end {
                    break;
                }
                self.receive()?;
                continue;
            };
            let pending = &buffer.filled()[self.offset..];
            match memchr2(b'\n', b'\r', pending) {
                Some(end) => {
                    self.line.extend_from_slice(&pending[..end]);
                    self.offset += end + 1;
                    if !self.line.is_empty() {
                        break;
                    }
                }
                None => {
                    self.line.extend_from_slice(pending);
                    self.recycle();
                }
            }
        }

        if self.line.is_empty() {
            Ok(None)
        } else {
            self.lines += 1;
            Ok(Some(self.line.as_slice()))
        }
    }

    fn receive(&mut self) -> Result<()> {
        match self.filled.recv() {
            Ok(Fill::Data(buffer)) => {
                self.current = Some(buffer);
                self.offset = 0;
                Ok(())
            }
            Ok(Fill::End) => {
                self.at_end = true;
                Ok(())
            }
            Ok(Fill::Failed(err)) => {
                self.at_end = true;
                Err(err)
            }
            Err(_) => {
                self.at_end = true;
                Err(Error::resource("decompression worker stopped unexpectedly"))
            }
        }
    }

    /// Hands the fully drained buffer back to the worker.
    fn recycle(&mut self) {
        if let Some(mut buffer) = self.current.take() {
            buffer.len = 0;
            self.offset = 0;
            if let Some(drained) = &self.drained {
                // Fails only once the worker has sent its final message, which receive() reports.
                drained.send(buffer).ok();
            }
        }
    }

    /// Stops the worker and waits for it to exit.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Release);
        drop(self.drained.take());
        drop(mem::replace(&mut self.filled, never()));

        let joined = worker.join();
        self.current = None;
        joined.map_err(|_| {
            Error::resource(format!("decompression worker for {} panicked", self.path.display()))
        })?;
        let shown = self.path.display().to_string();
        debug!(path = shown.as_str(), lines = self.lines; "Closed planet file");
        Ok(())
    }
}

impl Drop for PlanetReader {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(err = err.message.as_str(); "Planet reader did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use bzip2::write::BzEncoder;
    use tempfile::NamedTempFile;
    use xz::write::XzEncoder;

    use super::*;

    fn bzip2(data: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn xz(data: &[u8]) -> Vec<u8> {
        let mut encoder = XzEncoder::new(Vec::new(), 6);
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn temp_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn read_all(path: &Path, buffer_size: usize) -> Result<Vec<String>> {
        let mut reader = PlanetReader::open(path, buffer_size)?;
        let mut lines = Vec::new();
        while let Some(line) = reader.read_line()? {
            lines.push(String::from_utf8(line.to_vec()).unwrap());
        }
        reader.close()?;
        Ok(lines)
    }

    fn sample_document(lines: usize) -> String {
        let mut text = String::from("<?xml version='1.0' encoding='UTF-8'?>\n<osm version=\"0.6\">\n");
        for i in 0..lines {
            text.push_str(&format!(" <node id=\"{i}\" lat=\"1.0\" lon=\"2.0\"/>\n"));
        }
        text.push_str("</osm>\n");
        text
    }

    #[test]
    fn detects_formats() {
        assert_eq!(Compression::detect(b"BZh91AY&SY"), Some(Compression::Bzip2));
        assert_eq!(Compression::detect(&[0xFD, b'7', b'z', b'X', b'Z', 0x00, 0x00]), Some(Compression::Xz));
        assert_eq!(Compression::detect(b"  \n<?xml"), Some(Compression::Plain));
        assert_eq!(Compression::detect(b""), Some(Compression::Plain));
        assert_eq!(Compression::detect(b"PK\x03\x04"), None);
        assert_eq!(Compression::detect(b"\xEF\xBB\xBF<?xml"), Some(Compression::Plain));
        assert_eq!(Compression::detect(b"\xEF\xBB\xBF"), Some(Compression::Plain));
        assert_eq!(Compression::detect(b"\xEF\xBB\xBFtext"), None);
    }

    #[test]
    fn strips_terminators_and_skips_blank_lines() {
        let expected = vec!["<a>", "<b>", "<c>", "<d>"];
        let text: &[u8] = b"<a>\r\n<b>\n\n\r\n\r<c>\r<d>";
        let plain = temp_file(text);
        assert_eq!(read_all(plain.path(), 1024).unwrap(), expected);
        let compressed = temp_file(&bzip2(text));
        assert_eq!(read_all(compressed.path(), 3).unwrap(), expected);
    }

    #[test]
    fn buffer_size_does_not_change_lines() {
        let text = sample_document(200);
        let file = temp_file(&bzip2(text.as_bytes()));
        let expected: Vec<String> = text.lines().map(str::to_string).collect();
        for size in [1, 3, 7, 64, 4096, 900_000] {
            assert_eq!(read_all(file.path(), size).unwrap(), expected, "buffer size {size}");
        }
    }

    #[test]
    fn reads_concatenated_bzip2_streams() {
        let mut bytes = bzip2(b"<a>\n<b>\n");
        bytes.extend(bzip2(b"<c>\n"));
        bytes.extend(bzip2(b"<d>\n<e>"));
        let file = temp_file(&bytes);
        assert_eq!(read_all(file.path(), 2).unwrap(), vec!["<a>", "<b>", "<c>", "<d>", "<e>"]);
    }

    #[test]
    fn reads_concatenated_xz_streams() {
        let mut bytes = xz(b"<a>\n<b");
        bytes.extend(xz(b">\n<c>\n"));
        let file = temp_file(&bytes);
        assert_eq!(read_all(file.path(), 5).unwrap(), vec!["<a>", "<b>", "<c>"]);
    }

    #[test]
    fn truncated_stream_is_a_decompress_error() {
        let bytes = bzip2(sample_document(50).as_bytes());
        let file = temp_file(&bytes[..bytes.len() / 2]);
        let err = read_all(file.path(), 1024).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decompress);
    }

    #[test]
    fn reads_padded_xz_streams_with_large_buffer() {
        let text = sample_document(300);
        let (head, tail) = text.as_bytes().split_at(1000);
        let mut bytes = xz(head);
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend(xz(tail));
        let file = temp_file(&bytes);
        let expected: Vec<String> = text.lines().map(str::to_string).collect();
        assert_eq!(read_all(file.path(), 900_000).unwrap(), expected);
    }

    #[test]
    fn trailing_garbage_is_a_decompress_error() {
        let mut bytes = xz(b"<a>\n");
        bytes.extend_from_slice(b"this is not xz");
        let file = temp_file(&bytes);
        let err = read_all(file.path(), 1024).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decompress);
    }

    #[test]
    fn plain_input_with_byte_order_mark() {
        let file = temp_file(b"\xEF\xBB\xBF<?xml version='1.0'?>\n<osm>\n</osm>\n");
        let lines = read_all(file.path(), 16).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("<?xml version='1.0'?>"));
        assert_eq!(lines[2], "</osm>");
    }

    #[test]
    fn unknown_format_fails_at_open() {
        let file = temp_file(b"PK\x03\x04 zip archive");
        let err = PlanetReader::open(file.path(), 1024).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Decompress);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PlanetReader::open(Path::new("/nonexistent/planet.osm.bz2"), 1024).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Io);
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let file = temp_file(b"<osm/>");
        let err = PlanetReader::open(file.path(), 0).err().unwrap();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn reopening_reads_the_same_lines() {
        let file = temp_file(&xz(sample_document(30).as_bytes()));
        let first = read_all(file.path(), 16).unwrap();
        let second = read_all(file.path(), 16).unwrap();
        assert_eq!(first.len(), 33);
        assert_eq!(first, second);
    }

    #[test]
    fn close_before_end_joins_worker() {
        let file = temp_file(&bzip2(sample_document(5_000).as_bytes()));
        let mut reader = PlanetReader::open(file.path(), 32).unwrap();
        for _ in 0..10 {
            assert!(reader.read_line().unwrap().is_some());
        }
        assert_eq!(reader.lines_read(), 10);
        assert_eq!(reader.compression(), Compression::Bzip2);
        reader.close().unwrap();
    }

    #[test]
    fn drop_without_close_does_not_hang() {
        let file = temp_file(&bzip2(sample_document(5_000).as_bytes()));
        let mut reader = PlanetReader::open(file.path(), 8).unwrap();
        assert!(reader.read_line().unwrap().is_some());
        drop(reader);
    }

    #[test]
    fn end_of_stream_is_sticky() {
        let file = temp_file(b"<osm>\n");
        let mut reader = PlanetReader::open(file.path(), 4).unwrap();
        assert_eq!(reader.read_line().unwrap(), Some(&b"<osm>"[..]));
        assert_eq!(reader.read_line().unwrap(), None);
        assert_eq!(reader.read_line().unwrap(), None);
        reader.close().unwrap();
    }
}
