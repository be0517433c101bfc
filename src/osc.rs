//! Codificación OSC 1.0 mínima para los mensajes de control.
//!
//! Solo se necesita un bundle "inmediato" con un único mensaje de un float.
//! Todo en big-endian y las cadenas rellenadas con NUL hasta múltiplo de 4.

const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Time tag reservado de OSC que significa "ejecutar inmediatamente"
pub const IMMEDIATE: u64 = 1;

fn push_padded_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    // Al menos un NUL de terminación
    let pad = 4 - (s.len() % 4);
    out.extend(std::iter::repeat(0u8).take(pad));
}

/// Mensaje `address ,f value`
pub fn encode_float_message(address: &str, value: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(address.len() + 12);
    push_padded_str(&mut out, address);
    push_padded_str(&mut out, ",f");
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// Bundle inmediato que envuelve un mensaje de un float
pub fn encode_bundle_immediate(address: &str, value: f32) -> Vec<u8> {
    let message = encode_float_message(address, value);

    let mut out = Vec::with_capacity(16 + 4 + message.len());
    out.extend_from_slice(BUNDLE_TAG);
    out.extend_from_slice(&IMMEDIATE.to_be_bytes());
    out.extend_from_slice(&(message.len() as i32).to_be_bytes());
    out.extend_from_slice(&message);
    out
}

/// Extrae (dirección, valor) de un bundle producido por
/// `encode_bundle_immediate`. Pensado para receptores de prueba.
pub fn decode_bundle_float(packet: &[u8]) -> Option<(String, f32)> {
    if packet.len() < 20 || &packet[..8] != BUNDLE_TAG {
        return None;
    }
    let size = i32::from_be_bytes([packet[16], packet[17], packet[18], packet[19]]) as usize;
    let message = packet.get(20..20 + size)?;

    let addr_end = message.iter().position(|&b| b == 0)?;
    let address = std::str::from_utf8(&message[..addr_end]).ok()?.to_string();
    let tags_start = (addr_end / 4 + 1) * 4;
    if message.get(tags_start..tags_start + 2)? != b",f" {
        return None;
    }
    let value_start = tags_start + 4;
    let raw = message.get(value_start..value_start + 4)?;
    let value = f32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
    Some((address, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_layout() {
        let msg = encode_float_message("/dxl/0/G", -1.0);
        let mut expected = Vec::new();
        expected.extend_from_slice(b"/dxl/0/G\0\0\0\0");
        expected.extend_from_slice(b",f\0\0");
        expected.extend_from_slice(&[0xBF, 0x80, 0x00, 0x00]);
        assert_eq!(msg, expected);
    }

    #[test]
    fn bundle_header_and_size() {
        let packet = encode_bundle_immediate("/dxl/0/G", 1.0);
        assert_eq!(&packet[..8], b"#bundle\0");
        assert_eq!(&packet[8..16], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&packet[16..20], &[0, 0, 0, 20]);
        assert_eq!(packet.len(), 40);
    }

    #[test]
    fn decode_reads_back_address_and_value() {
        let packet = encode_bundle_immediate("/dxl/0/G", 0.0);
        assert_eq!(
            decode_bundle_float(&packet),
            Some(("/dxl/0/G".to_string(), 0.0))
        );
        assert_eq!(decode_bundle_float(b"not a bundle at all!"), None);
    }

    #[test]
    fn address_length_multiple_of_four_gets_full_pad() {
        let msg = encode_float_message("/abc", 2.0);
        assert_eq!(&msg[..8], b"/abc\0\0\0\0");
    }
}
