use crate::consts::{
    MODBUS_BROADCAST, MODBUS_CRC_LEN, MODBUS_GET_HOLDINGS, MODBUS_MAX_READ_COUNT,
    MODBUS_MAX_WRITE_COUNT, MODBUS_SET_HOLDINGS_BULK,
};
use crate::{append_crc, check_crc, ErrorKind, VectorTrait};

/// Modbus RTU request generator/response parser, the master side of the slave engine
///
/// One object can be used for multiple calls
pub struct ModbusRequest {
    pub slave_id: u8,
    pub func: u8,
    pub reg: u16,
    pub count: u16,
}

impl ModbusRequest {
    pub fn new(slave_id: u8) -> Self {
        Self {
            slave_id,
            func: 0,
            reg: 0,
            count: 0,
        }
    }

    pub fn generate_get_holdings<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        count: u16,
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        if count == 0 || count > MODBUS_MAX_READ_COUNT {
            return Err(ErrorKind::OOB);
        }
        self.reg = reg;
        self.count = count;
        self.func = MODBUS_GET_HOLDINGS;
        request.clear();
        self.push_header(request)?;
        append_crc(request)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn generate_set_holdings_bulk<V: VectorTrait<u8>>(
        &mut self,
        reg: u16,
        values: &[u16],
        request: &mut V,
    ) -> Result<(), ErrorKind> {
        if values.is_empty() || values.len() > usize::from(MODBUS_MAX_WRITE_COUNT) {
            return Err(ErrorKind::OOB);
        }
        self.reg = reg;
        self.count = values.len() as u16;
        self.func = MODBUS_SET_HOLDINGS_BULK;
        request.clear();
        self.push_header(request)?;
        request.push((values.len() * 2) as u8)?;
        for v in values {
            request.extend(&v.to_be_bytes())?;
        }
        append_crc(request)
    }

    fn push_header<V: VectorTrait<u8>>(&self, request: &mut V) -> Result<(), ErrorKind> {
        request.extend(&[self.slave_id, self.func])?;
        request.extend(&self.reg.to_be_bytes())?;
        request.extend(&self.count.to_be_bytes())
    }

    /// Returns the payload between the function code and CRC
    fn parse_response<'a>(&self, buf: &'a [u8]) -> Result<&'a [u8], ErrorKind> {
        if self.slave_id == MODBUS_BROADCAST {
            // broadcasts are not answered unless the slave is told to
            return Err(ErrorKind::FrameBroken);
        }
        if buf.len() < 3 + MODBUS_CRC_LEN {
            return Err(ErrorKind::FrameBroken);
        }
        if !check_crc(buf) {
            return Err(ErrorKind::FrameCRCError);
        }
        let payload = &buf[2..buf.len() - MODBUS_CRC_LEN];
        if buf[0] != self.slave_id {
            return Err(ErrorKind::FrameBroken);
        }
        if buf[1] != self.func {
            if buf[1] == self.func | 0x80 {
                return Err(ErrorKind::from_modbus_error(payload[0]));
            }
            return Err(ErrorKind::FrameBroken);
        }
        Ok(payload)
    }

    /// Parse response and make sure there's no Modbus error inside
    ///
    /// For writes the response must echo the address and count requested. The input buffer
    /// SHOULD be cut to actual response length
    pub fn parse_ok(&self, buf: &[u8]) -> Result<(), ErrorKind> {
        let payload = self.parse_response(buf)?;
        if self.func == MODBUS_SET_HOLDINGS_BULK
            && (payload.len() != 4
                || u16::from_be_bytes([payload[0], payload[1]]) != self.reg
                || u16::from_be_bytes([payload[2], payload[3]]) != self.count)
        {
            return Err(ErrorKind::FrameBroken);
        }
        Ok(())
    }

    /// Parse response, make sure there's no Modbus error inside, plus parse response data as u16
    ///
    /// The input buffer SHOULD be cut to actual response length
    pub fn parse_u16<V: VectorTrait<u16>>(
        &self,
        buf: &[u8],
        result: &mut V,
    ) -> Result<(), ErrorKind> {
        let payload = self.parse_response(buf)?;
        let byte_count = usize::from(payload[0]);
        let data = &payload[1..];
        if byte_count != data.len() || byte_count != usize::from(self.count) * 2 {
            return Err(ErrorKind::FrameBroken);
        }
        for chunk in data.chunks_exact(2) {
            result.push(u16::from_be_bytes([chunk[0], chunk[1]]))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_get_holdings() {
        let mut mreq = ModbusRequest::new(1);
        let mut request: Vec<u8> = Vec::new();
        mreq.generate_get_holdings(8, 2, &mut request).unwrap();
        assert_eq!(request, [0x01, 0x03, 0x00, 0x08, 0x00, 0x02, 0x45, 0xC9]);
        assert!(mreq.generate_get_holdings(0, 126, &mut request).is_err());
        assert!(mreq.generate_get_holdings(0, 0, &mut request).is_err());
    }

    #[test]
    fn test_generate_set_holdings_bulk() {
        let mut mreq = ModbusRequest::new(3);
        let mut request: Vec<u8> = Vec::new();
        mreq.generate_set_holdings_bulk(5, &[0x1234, 0x0001], &mut request)
            .unwrap();
        assert_eq!(
            &request[..11],
            &[0x03, 0x10, 0x00, 0x05, 0x00, 0x02, 0x04, 0x12, 0x34, 0x00, 0x01]
        );
        assert_eq!(request.len(), 13);
        assert!(check_crc(&request));
        assert!(mreq
            .generate_set_holdings_bulk(0, &[0; 124], &mut request)
            .is_err());
    }

    #[test]
    fn test_parse_u16() {
        let mut mreq = ModbusRequest::new(1);
        let mut request: Vec<u8> = Vec::new();
        mreq.generate_get_holdings(0, 2, &mut request).unwrap();
        let mut response: Vec<u8> = vec![0x01, 0x03, 0x04, 0xAB, 0xCD, 0x00, 0x07];
        append_crc(&mut response).unwrap();
        let mut result: Vec<u16> = Vec::new();
        mreq.parse_u16(&response, &mut result).unwrap();
        assert_eq!(result, [0xABCD, 0x0007]);
        // short payload
        let mut response: Vec<u8> = vec![0x01, 0x03, 0x02, 0xAB, 0xCD];
        append_crc(&mut response).unwrap();
        assert_eq!(
            mreq.parse_u16(&response, &mut result),
            Err(ErrorKind::FrameBroken)
        );
    }

    #[test]
    fn test_parse_exception() {
        let mut mreq = ModbusRequest::new(2);
        let mut request: Vec<u8> = Vec::new();
        mreq.generate_get_holdings(600, 1, &mut request).unwrap();
        let mut response: Vec<u8> = vec![0x02, 0x83, 0x02];
        append_crc(&mut response).unwrap();
        let mut result: Vec<u16> = Vec::new();
        assert_eq!(
            mreq.parse_u16(&response, &mut result),
            Err(ErrorKind::IllegalDataAddress)
        );
        let last = response.len() - 1;
        response[last] ^= 0xff;
        assert_eq!(mreq.parse_ok(&response), Err(ErrorKind::FrameCRCError));
    }

    #[test]
    fn test_parse_write_echo() {
        let mut mreq = ModbusRequest::new(1);
        let mut request: Vec<u8> = Vec::new();
        mreq.generate_set_holdings_bulk(5, &[1, 2], &mut request)
            .unwrap();
        let mut response: Vec<u8> = request[..6].to_vec();
        append_crc(&mut response).unwrap();
        mreq.parse_ok(&response).unwrap();
        let mut response: Vec<u8> = vec![0x01, 0x10, 0x00, 0x06, 0x00, 0x02];
        append_crc(&mut response).unwrap();
        assert_eq!(mreq.parse_ok(&response), Err(ErrorKind::FrameBroken));
    }
}
