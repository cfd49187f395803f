use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;
use super::name::{DomainName, MAX_LABEL_LEN, MAX_NAME_LEN};

/// Upper bound on compression pointers followed while decoding one name
const MAX_POINTER_HOPS: usize = 64;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;

    /// Reads the component. `packet_buf` is the whole message, needed to
    /// follow compression pointers.
    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<(), ParseError>;

    fn read_name<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<DomainName, ParseError> {
        let mut labels = Vec::new();
        loop {
            let label_len = reader.read_var::<u8>(8)?;
            if label_len == 0 {
                break;
            }
            if label_len & 0xC0 == 0xC0 {
                let low = reader.read_var::<u8>(8)?;
                let mut offset = (((label_len & 0x3F) as usize) << 8) | low as usize;
                decode_labels(packet_buf, &mut offset, packet_buf, &mut labels)?;
                break;
            }
            if label_len as usize > MAX_LABEL_LEN {
                return Err(ParseError::InvalidLabel);
            }
            let mut buf = vec![0; label_len as usize];
            reader.read_bytes(&mut buf)?;
            labels.push(buf);
        }

        DomainName::from_labels(labels)
    }

    fn write_name<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        name: &DomainName,
    ) -> Result<(), ParseError> {
        writer.write_bytes(&name.to_wire())?;
        Ok(())
    }
}

/// Decodes a name from `data` starting at `*pos`, following compression
/// pointers into `packet`. On return `*pos` points just past the name as it
/// appears in `data`.
pub fn read_name_at(data: &[u8], pos: &mut usize, packet: &[u8]) -> Result<DomainName, ParseError> {
    let mut labels = Vec::new();
    decode_labels(data, pos, packet, &mut labels)?;
    DomainName::from_labels(labels)
}

fn decode_labels(
    data: &[u8],
    pos: &mut usize,
    packet: &[u8],
    labels: &mut Vec<Vec<u8>>,
) -> Result<(), ParseError> {
    let mut source = data;
    let mut cursor = *pos;
    let mut jumped = false;
    let mut hops = 0;
    let mut wire_len = 1;

    loop {
        let len = *source.get(cursor).ok_or(ParseError::Truncated)? as usize;
        if len == 0 {
            cursor += 1;
            break;
        }
        if len & 0xC0 == 0xC0 {
            let low = *source.get(cursor + 1).ok_or(ParseError::Truncated)? as usize;
            if !jumped {
                *pos = cursor + 2;
                jumped = true;
            }
            hops += 1;
            if hops > MAX_POINTER_HOPS {
                return Err(ParseError::CompressionLoop);
            }
            source = packet;
            cursor = ((len & 0x3F) << 8) | low;
            continue;
        }
        if len > MAX_LABEL_LEN {
            return Err(ParseError::InvalidLabel);
        }
        wire_len += len + 1;
        if wire_len > MAX_NAME_LEN {
            return Err(ParseError::NameTooLong);
        }
        let label = source
            .get(cursor + 1..cursor + 1 + len)
            .ok_or(ParseError::Truncated)?;
        labels.push(label.to_vec());
        cursor += 1 + len;
    }

    if !jumped {
        *pos = cursor;
    }
    Ok(())
}
