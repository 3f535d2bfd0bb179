//! User Data Header information elements

use serde::{Deserialize, Serialize};

use crate::errors::EncodingError;

/// IEI: concatenated short message, 8-bit reference
pub const IEI_CONCAT_8BIT: u8 = 0x00;
/// IEI: concatenated short message, 16-bit reference
pub const IEI_CONCAT_16BIT: u8 = 0x08;
/// IEI: application port addressing, 8-bit ports
pub const IEI_PORT_8BIT: u8 = 0x04;
/// IEI: application port addressing, 16-bit ports
pub const IEI_PORT_16BIT: u8 = 0x05;

/// A single UDH information element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InformationElement {
    /// Part `number` of `parts` of the concatenated message `reference`
    Concatenation { reference: u16, parts: u8, number: u8 },
    /// Application port addressing
    PortAddress { destination: u16, source: u16 },
    /// Any IE without a dedicated representation
    Other { iei: u8, data: Vec<u8> },
}

impl InformationElement {
    /// Build an IE from its identifier and raw data
    pub fn from_raw(iei: u8, data: &[u8]) -> Self {
        match (iei, data) {
            (IEI_CONCAT_8BIT, &[reference, parts, number]) => InformationElement::Concatenation {
                reference: u16::from(reference),
                parts,
                number,
            },
            (IEI_CONCAT_16BIT, &[ref_hi, ref_lo, parts, number]) => {
                InformationElement::Concatenation {
                    reference: u16::from_be_bytes([ref_hi, ref_lo]),
                    parts,
                    number,
                }
            }
            (IEI_PORT_8BIT, &[destination, source]) => InformationElement::PortAddress {
                destination: u16::from(destination),
                source: u16::from(source),
            },
            (IEI_PORT_16BIT, &[d_hi, d_lo, s_hi, s_lo]) => InformationElement::PortAddress {
                destination: u16::from_be_bytes([d_hi, d_lo]),
                source: u16::from_be_bytes([s_hi, s_lo]),
            },
            _ => InformationElement::Other { iei, data: data.to_vec() },
        }
    }

    /// Identifier this element encodes with (8- or 16-bit variants picked by value)
    pub fn iei(&self) -> u8 {
        match self {
            InformationElement::Concatenation { reference, .. } => {
                if *reference > 0xFF { IEI_CONCAT_16BIT } else { IEI_CONCAT_8BIT }
            }
            InformationElement::PortAddress { destination, source } => {
                if *destination > 0xFF || *source > 0xFF { IEI_PORT_16BIT } else { IEI_PORT_8BIT }
            }
            InformationElement::Other { iei, .. } => *iei,
        }
    }

    fn data(&self) -> Vec<u8> {
        match self {
            InformationElement::Concatenation { reference, parts, number } => {
                if *reference > 0xFF {
                    let [hi, lo] = reference.to_be_bytes();
                    vec![hi, lo, *parts, *number]
                } else {
                    vec![*reference as u8, *parts, *number]
                }
            }
            InformationElement::PortAddress { destination, source } => {
                if *destination > 0xFF || *source > 0xFF {
                    let mut data = destination.to_be_bytes().to_vec();
                    data.extend_from_slice(&source.to_be_bytes());
                    data
                } else {
                    vec![*destination as u8, *source as u8]
                }
            }
            InformationElement::Other { data, .. } => data.clone(),
        }
    }

    /// Encode as IEI, length, data
    pub fn encode(&self) -> Vec<u8> {
        let data = self.data();
        let mut out = Vec::with_capacity(data.len() + 2);
        out.push(self.iei());
        out.push(data.len() as u8);
        out.extend_from_slice(&data);
        out
    }

    /// Encoded length including the IEI and length octets
    pub fn encoded_len(&self) -> usize {
        self.data().len() + 2
    }
}

/// Decode a complete UDH (without its leading length octet)
pub fn decode_udh(header: &[u8]) -> Result<Vec<InformationElement>, EncodingError> {
    let mut elements = Vec::new();
    let mut pos = 0;

    while pos < header.len() {
        let iei = header[pos];
        let len = *header.get(pos + 1).ok_or(EncodingError::BufferTooShort)? as usize;
        let data = header
            .get(pos + 2..pos + 2 + len)
            .ok_or(EncodingError::BufferTooShort)?;
        elements.push(InformationElement::from_raw(iei, data));
        pos += 2 + len;
    }

    Ok(elements)
}

/// Encode a list of elements into a UDH (without its leading length octet)
pub fn encode_udh(elements: &[InformationElement]) -> Vec<u8> {
    elements.iter().flat_map(InformationElement::encode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenation() {
        let ie = InformationElement::Concatenation { reference: 23, parts: 3, number: 1 };
        assert_eq!(ie.encode(), vec![0x00, 0x03, 0x17, 0x03, 0x01]);

        let ie = InformationElement::Concatenation { reference: 384, parts: 4, number: 2 };
        assert_eq!(ie.encode(), vec![0x08, 0x04, 0x01, 0x80, 0x04, 0x02]);
        assert_eq!(ie.encoded_len(), 6);
        assert_eq!(decode_udh(&ie.encode()).unwrap(), vec![ie]);
    }

    #[test]
    fn test_port_address() {
        let ie = InformationElement::PortAddress { destination: 100, source: 50 };
        assert_eq!(ie.encode(), vec![0x04, 0x02, 0x64, 0x32]);

        let ie = InformationElement::PortAddress { destination: 1234, source: 5222 };
        assert_eq!(ie.encode(), vec![0x05, 0x04, 0x04, 0xD2, 0x14, 0x66]);
    }

    #[test]
    fn test_decode_multiple_and_unknown() {
        let header = [0x00, 0x03, 0xC3, 0x01, 0x01, 0x70, 0x01, 0xAA];
        let elements = decode_udh(&header).unwrap();
        assert_eq!(
            elements,
            vec![
                InformationElement::Concatenation { reference: 0xC3, parts: 1, number: 1 },
                InformationElement::Other { iei: 0x70, data: vec![0xAA] },
            ]
        );
        assert_eq!(encode_udh(&elements), header.to_vec());
    }

    #[test]
    fn test_decode_truncated() {
        assert_eq!(decode_udh(&[0x00, 0x03, 0x01]), Err(EncodingError::BufferTooShort));
    }
}
