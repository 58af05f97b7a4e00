//! Millimetre→twip and pixel→EMU conversions used by page setup and logo
//! sizing (spec §4.8 steps 2–3).

/// 1 mm = 56.69 twentieths-of-a-point ("twips").
pub fn mm_to_twips(mm: f64) -> i64 {
    (mm * 56.69).round() as i64
}

/// 1 px = 9525 EMU at the standard 96 DPI OOXML assumes for drawings.
pub fn px_to_emu(px: f64) -> i64 {
    (px * 9525.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_width_converts_to_the_familiar_twip_value() {
        assert_eq!(mm_to_twips(210.0), 11905);
    }

    #[test]
    fn standard_logo_box_converts_to_emu() {
        assert_eq!(px_to_emu(180.0), 1714500);
        assert_eq!(px_to_emu(120.0), 1143000);
    }
}
