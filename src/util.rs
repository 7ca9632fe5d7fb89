#![allow(unused)] // used depending on the target.

use crate::error::{Error, ErrorKind};
use crate::{Result, Uuid};

/// The Bluetooth Base UUID that 16-bit and 32-bit SIG assigned UUIDs are expanded onto.
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Expands a 16-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u16(uuid: u16) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Expands a 32-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u32(uuid: u32) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Parses a service filter. The empty string means "no filter".
///
/// Accepts the 128-bit text form as well as the short 16-bit (`180F`) and 32-bit (`0000180F`) forms.
pub fn parse_service_filter(filter: &str) -> Result<Option<Uuid>> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Ok(None);
    }

    if filter.bytes().all(|b| b.is_ascii_hexdigit()) {
        match filter.len() {
            4 => {
                if let Ok(short) = u16::from_str_radix(filter, 16) {
                    return Ok(Some(bluetooth_uuid_from_u16(short)));
                }
            }
            8 => {
                if let Ok(short) = u32::from_str_radix(filter, 16) {
                    return Ok(Some(bluetooth_uuid_from_u32(short)));
                }
            }
            _ => {}
        }
    }

    Uuid::parse_str(filter).map(Some).map_err(|err| {
        Error::new(
            ErrorKind::InvalidParameter,
            Some(Box::new(err)),
            format!("service filter `{filter}` is not a UUID"),
        )
    })
}

/// Derives the correlation hash for a peer from its manufacturer specific data.
///
/// Takes `(company_id, payload)` pairs and hex encodes the payload of the lowest company id. Peers that advertise
/// no manufacturer data, or only empty payloads, have no hash.
pub fn correlation_hash<'a, I>(manufacturer_data: I) -> Option<String>
where
    I: IntoIterator<Item = (u16, &'a [u8])>,
{
    manufacturer_data
        .into_iter()
        .filter(|(_, data)| !data.is_empty())
        .min_by_key(|(company_id, _)| *company_id)
        .map(|(_, data)| hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_means_unfiltered() {
        assert_eq!(parse_service_filter("").unwrap(), None);
        assert_eq!(parse_service_filter("  ").unwrap(), None);
    }

    #[test]
    fn filter_must_be_a_uuid() {
        let uuid = parse_service_filter("0000180f-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(uuid, Some(Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb)));

        let err = parse_service_filter("svc-123").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn short_filters_expand_onto_base_uuid() {
        let battery = Some(Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb));
        assert_eq!(parse_service_filter("180F").unwrap(), battery);
        assert_eq!(parse_service_filter("180f").unwrap(), battery);
        assert_eq!(parse_service_filter("0000180f").unwrap(), battery);
        assert_eq!(
            parse_service_filter("1234abcd").unwrap(),
            Some(Uuid::from_u128(0x1234abcd_0000_1000_8000_00805f9b34fb))
        );

        for bad in ["+18F", "18F", "180G", "0000180"] {
            let err = parse_service_filter(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidParameter, "{bad}");
        }
    }

    #[test]
    fn hash_uses_lowest_company_id() {
        let data = [(0x02ff, &[0xaa, 0xbb][..]), (0x004c, &[0x01, 0x02, 0x0f][..])];
        assert_eq!(correlation_hash(data).as_deref(), Some("01020f"));
    }

    #[test]
    fn no_payload_no_hash() {
        assert_eq!(correlation_hash(std::iter::empty::<(u16, &[u8])>()), None);
        assert_eq!(correlation_hash([(0x004c, &[][..])]), None);
    }
}
