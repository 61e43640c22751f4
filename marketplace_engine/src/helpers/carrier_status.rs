use crate::db_types::ShipmentStatus;

/// Maps a carrier tracking status code to a shipment status.
///
/// | code              | status             |
/// |-------------------|--------------------|
/// | `M`               | created            |
/// | `P`               | shipped            |
/// | `I`, `AR`, `DP`   | in_transit         |
/// | `OFD`             | out_for_delivery   |
/// | `D`               | delivered          |
/// | `X`               | exception          |
///
/// Codes are matched case-insensitively. Unknown codes return `None` and are ignored by the tracker.
pub fn shipment_status_from_carrier_code(code: &str) -> Option<ShipmentStatus> {
    match code.trim().to_ascii_uppercase().as_str() {
        "M" => Some(ShipmentStatus::Created),
        "P" => Some(ShipmentStatus::Shipped),
        "I" | "AR" | "DP" => Some(ShipmentStatus::InTransit),
        "OFD" => Some(ShipmentStatus::OutForDelivery),
        "D" => Some(ShipmentStatus::Delivered),
        "X" => Some(ShipmentStatus::Exception),
        _ => None,
    }
}
