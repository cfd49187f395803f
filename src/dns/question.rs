use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};
use serde::Serialize;

use super::{
    ParseError,
    common::PacketComponent,
    enums::{DNSResourceClass, DNSResourceType},
    name::DomainName,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DNSQuestion {
    pub name: DomainName,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(name: DomainName, qtype: DNSResourceType, qclass: DNSResourceClass) -> Self {
        Self { name, qtype, qclass }
    }
}

impl PacketComponent for DNSQuestion {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError> {
        self.write_name(writer, &self.name)?;
        writer.write_var::<u16>(16, self.qtype.into())?;
        writer.write_var::<u16>(16, self.qclass.into())?;
        Ok(())
    }

    fn read<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: &[u8],
    ) -> Result<(), ParseError> {
        let name = self.read_name(reader, packet_buf)?;
        let qtype = reader.read_var::<u16>(16)?.into();
        let qclass = reader.read_var::<u16>(16)?.into();
        *self = DNSQuestion {
            name,
            qtype,
            qclass,
        };
        Ok(())
    }
}
