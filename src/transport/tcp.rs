//! TCP dealer connections
//!
//! Frame layout on the stream:
//! - Flags (u8), bit 0 = MORE
//! - Length (u32 BE)
//! - Data (`length` bytes)
//!
//! On connect the dealer sends a single greeting frame carrying its routing
//! identity. A reader thread pumps inbound frames into a queue bounded by the
//! receive high-water mark, so a slow writer pushes back on the socket.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;

use bytes::Bytes;

use super::errors::{TransportError, TransportResult};
use super::frame::{multipart, Frame};
use super::queue::{Queue, Resource};
use super::{Connection, DealerOptions};

/// Frame flag bits on the TCP stream.
pub mod flags {
    /// More frames of the same message follow.
    pub const MORE: u8 = 0b0000_0001;
}

/// Size of the per-frame header (flags + length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Largest frame accepted from the stream (256 MiB).
pub const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

/// Writes one frame.
///
/// Frames larger than [`MAX_FRAME_SIZE`] are refused with `InvalidInput`
/// before anything is written, since no reader would accept them.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> io::Result<()> {
    let len = frame_length(frame.len())?;
    let flags = if frame.has_more() { flags::MORE } else { 0 };
    let mut header = [0u8; FRAME_HEADER_SIZE];
    header[0] = flags;
    header[1..].copy_from_slice(&len.to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(frame.data())
}

fn frame_length(len: usize) -> io::Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes exceeds limit of {}", len, MAX_FRAME_SIZE),
            )
        })
}

/// Reads one frame.
///
/// Returns `Ok(None)` on a clean end of stream at a frame boundary.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Frame>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match reader.read_exact(&mut header[..1]) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    reader.read_exact(&mut header[1..])?;

    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit of {}", len, MAX_FRAME_SIZE),
        ));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data)?;
    Ok(Some(Frame::new(data, header[0] & flags::MORE != 0)))
}

/// Socket state the context tears down.
struct TcpSocket {
    inbound: Arc<Queue<Frame>>,
    stream: TcpStream,
}

impl Resource for TcpSocket {
    fn terminate(&self) {
        self.inbound.terminate();
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn close(&self) {
        self.inbound.close();
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn interrupt(&self) {
        self.inbound.interrupt();
    }
}

/// Dealer connected over TCP.
pub(crate) struct TcpDealer {
    identity: String,
    socket: Arc<TcpSocket>,
    writer: BufWriter<TcpStream>,
}

impl TcpDealer {
    pub(crate) fn connect(addr: &str, options: &DealerOptions) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        write_frame(&mut writer, &Frame::last(Bytes::from(options.identity.clone().into_bytes())))?;
        writer.flush()?;

        let inbound = Arc::new(Queue::new(options.recv_hwm));
        let reader = stream.try_clone()?;
        let socket = Arc::new(TcpSocket {
            inbound: Arc::clone(&inbound),
            stream,
        });

        thread::Builder::new()
            .name(format!("{}-recv", options.identity))
            .spawn(move || pump(reader, inbound))?;

        Ok(Self {
            identity: options.identity.clone(),
            socket,
            writer,
        })
    }

    pub(crate) fn resource(&self) -> Arc<dyn Resource> {
        self.socket.clone()
    }

    pub(crate) fn inbound(&self) -> Arc<dyn Resource> {
        self.socket.inbound.clone()
    }
}

/// Moves frames from the stream into the inbound queue until either side
/// goes away.
fn pump(stream: TcpStream, inbound: Arc<Queue<Frame>>) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_frame(&mut reader) {
            Ok(Some(frame)) => {
                if inbound.push(frame).is_err() {
                    return;
                }
            }
            Ok(None) => {
                inbound.close();
                return;
            }
            Err(e) => {
                inbound.fail(&e);
                return;
            }
        }
    }
}

impl Connection for TcpDealer {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn recv(&mut self) -> TransportResult<Option<Frame>> {
        self.socket.inbound.pop()
    }

    fn send(&mut self, parts: Vec<Bytes>) -> TransportResult<()> {
        let result = multipart(parts)
            .iter()
            .try_for_each(|frame| write_frame(&mut self.writer, frame))
            .and_then(|()| self.writer.flush());

        match result {
            Ok(()) => Ok(()),
            // A shut down socket during termination is not a fault
            Err(_) if self.socket.inbound.is_terminated() => Err(TransportError::Terminated),
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

impl Drop for TcpDealer {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        self.socket.close();
    }
}
