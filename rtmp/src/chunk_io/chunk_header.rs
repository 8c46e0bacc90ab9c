use super::ChunkSerializationError;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::io::Write;

pub const MIN_CHUNK_STREAM_ID: u32 = 2;
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

const MAX_ONE_BYTE_CSID: u32 = 63;
const MAX_TWO_BYTE_CSID: u32 = 319;
const CSID_OFFSET: u32 = 64;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ChunkHeaderFormat {
    Full,  // Format 0
    Empty, // Format 3
}

impl ChunkHeaderFormat {
    fn mask(self) -> u8 {
        match self {
            ChunkHeaderFormat::Full => 0b0000_0000,
            ChunkHeaderFormat::Empty => 0b1100_0000,
        }
    }
}

/// A single chunk header as it goes on the wire.  Everything besides the chunk stream id is
/// only written for `ChunkHeaderFormat::Full` headers.
#[derive(PartialEq, Debug, Clone)]
pub struct ChunkHeader {
    pub chunk_stream_id: u32,
    pub format: ChunkHeaderFormat,
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
}

impl ChunkHeader {
    /// A type 0 header announcing a whole message
    pub fn full(
        chunk_stream_id: u32,
        message_type_id: u8,
        message_length: u32,
        message_stream_id: u32,
        timestamp: u32,
    ) -> ChunkHeader {
        ChunkHeader {
            chunk_stream_id,
            format: ChunkHeaderFormat::Full,
            timestamp,
            message_length,
            message_type_id,
            message_stream_id,
        }
    }

    /// A type 3 header that continues the previous message on the same chunk stream
    pub fn continuation(chunk_stream_id: u32) -> ChunkHeader {
        ChunkHeader {
            chunk_stream_id,
            format: ChunkHeaderFormat::Empty,
            timestamp: 0,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
        }
    }

    /// Writes the header.  Timestamp and message length only get 3 bytes on the wire, so
    /// anything above 0xFFFFFF loses its high order byte.  Extended timestamps are never written.
    pub fn write_to(&self, bytes: &mut dyn Write) -> Result<(), ChunkSerializationError> {
        add_basic_header(bytes, self.format, self.chunk_stream_id)?;
        if self.format == ChunkHeaderFormat::Empty {
            return Ok(());
        }

        bytes.write_u24::<BigEndian>(self.timestamp & 0x00FF_FFFF)?;
        bytes.write_u24::<BigEndian>(self.message_length & 0x00FF_FFFF)?;
        bytes.write_u8(self.message_type_id)?;
        bytes.write_u32::<LittleEndian>(self.message_stream_id)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChunkSerializationError> {
        let mut bytes = Vec::with_capacity(3 + 11);
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// How many bytes the basic header takes for a chunk stream id
pub fn basic_header_length(csid: u32) -> usize {
    match csid {
        x if x <= MAX_ONE_BYTE_CSID => 1,
        x if x <= MAX_TWO_BYTE_CSID => 2,
        _ => 3,
    }
}

fn add_basic_header(
    bytes: &mut dyn Write,
    format: ChunkHeaderFormat,
    csid: u32,
) -> Result<(), ChunkSerializationError> {
    if csid < MIN_CHUNK_STREAM_ID || csid > MAX_CHUNK_STREAM_ID {
        return Err(ChunkSerializationError::InvalidChunkStreamId { csid });
    }

    match basic_header_length(csid) {
        1 => bytes.write_u8(format.mask() | csid as u8)?,
        2 => {
            bytes.write_u8(format.mask())?;
            bytes.write_u8((csid - CSID_OFFSET) as u8)?;
        }
        _ => {
            // Three byte form stores (csid - 64) little endian
            bytes.write_u8(format.mask() | 1)?;
            bytes.write_u16::<LittleEndian>((csid - CSID_OFFSET) as u16)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
    use std::io::{Cursor, Read};

    /// Reads a basic header back the way a receiving peer would
    fn read_basic_header<R: Read>(bytes: &mut R) -> (u8, u32) {
        let first = bytes.read_u8().unwrap();
        let format = first >> 6;
        let csid = match first & 0b0011_1111 {
            0 => bytes.read_u8().unwrap() as u32 + 64,
            1 => bytes.read_u16::<LittleEndian>().unwrap() as u32 + 64,
            x => x as u32,
        };

        (format, csid)
    }

    #[test]
    fn basic_header_width_depends_on_csid_range() {
        let cases = [
            (2_u32, 1_usize),
            (3, 1),
            (63, 1),
            (64, 2),
            (200, 2),
            (319, 2),
            (320, 3),
            (1000, 3),
            (65599, 3),
        ];

        for &(csid, expected_width) in cases.iter() {
            let header = ChunkHeader::full(csid, 20, 10, 0, 0);
            let bytes = header.to_bytes().unwrap();

            assert_eq!(bytes.len(), expected_width + 11, "Unexpected header size for csid {}", csid);
            assert_eq!(basic_header_length(csid), expected_width);

            let mut cursor = Cursor::new(bytes);
            let (format, decoded_csid) = read_basic_header(&mut cursor);
            assert_eq!(format, 0, "Unexpected format for csid {}", csid);
            assert_eq!(decoded_csid, csid, "csid did not survive encoding");
        }
    }

    #[test]
    fn every_valid_csid_decodes_back_exactly() {
        for csid in MIN_CHUNK_STREAM_ID..=MAX_CHUNK_STREAM_ID {
            let bytes = ChunkHeader::continuation(csid).to_bytes().unwrap();
            assert_eq!(bytes.len(), basic_header_length(csid));

            let mut cursor = Cursor::new(bytes);
            let (format, decoded_csid) = read_basic_header(&mut cursor);
            assert_eq!(format, 3);
            assert_eq!(decoded_csid, csid);
        }
    }

    #[test]
    fn full_header_field_layout() {
        let header = ChunkHeader::full(3, 20, 300, 1, 72);
        let mut cursor = Cursor::new(header.to_bytes().unwrap());

        assert_eq!(cursor.read_u8().unwrap(), 3 | 0b0000_0000, "Unexpected csid value");
        assert_eq!(cursor.read_u24::<BigEndian>().unwrap(), 72, "Unexpected timestamp value");
        assert_eq!(cursor.read_u24::<BigEndian>().unwrap(), 300, "Unexpected message length value");
        assert_eq!(cursor.read_u8().unwrap(), 20, "Unexpected type id");
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 1, "Unexpected message stream id");
    }

    #[test]
    fn oversized_fields_are_truncated_to_three_bytes() {
        let header = ChunkHeader::full(3, 20, 0x0123_4567, 0, 0x89AB_CDEF);
        let mut cursor = Cursor::new(header.to_bytes().unwrap());

        cursor.read_u8().unwrap();
        assert_eq!(cursor.read_u24::<BigEndian>().unwrap(), 0x00AB_CDEF, "Unexpected timestamp value");
        assert_eq!(cursor.read_u24::<BigEndian>().unwrap(), 0x0023_4567, "Unexpected message length value");
    }

    #[test]
    fn continuation_header_is_basic_header_only() {
        assert_eq!(ChunkHeader::continuation(3).to_bytes().unwrap(), vec![0b1100_0011]);
        assert_eq!(ChunkHeader::continuation(100).to_bytes().unwrap(), vec![0b1100_0000, 36]);
        assert_eq!(ChunkHeader::continuation(400).to_bytes().unwrap(), vec![0b1100_0001, 80, 1]);
    }

    #[test]
    fn reserved_and_out_of_range_csids_are_rejected() {
        for &csid in [0_u32, 1, 65600, u32::max_value()].iter() {
            match ChunkHeader::full(csid, 20, 0, 0, 0).to_bytes() {
                Err(ChunkSerializationError::InvalidChunkStreamId { csid: reported }) => {
                    assert_eq!(reported, csid)
                }
                x => panic!("Expected InvalidChunkStreamId for csid {}, received {:?}", csid, x),
            }
        }
    }
}
