//! Level conversions between dB and linear sample values.
//!
//! Full scale is 16384 (0 dB). Two stream kinds share the i16 sample type but
//! map dB differently: *amplitude* streams use a ÷10 exponent, *magnitude*
//! streams ÷20. The attenuation maps bucket a linear level into integer dB
//! steps offset 3 dB above full scale, for histograms and level logging.

/// Full-scale sample value, the 0 dB reference.
pub const FULL_SCALE: i32 = 16384;

/// 10·log10(16384) — dB offset of the amplitude mapping.
const AMP_REF_DB: f32 = 42.144_199;

/// 20·log10(16384) — dB offset of the magnitude mapping.
const MAG_REF_DB: f32 = 84.288_399;

/// Convert dB to a linear amplitude level (16384 = 0 dB).
pub fn db_to_amp(db: f32) -> i32 {
    10.0_f32.powf((db + AMP_REF_DB) / 10.0).round() as i32
}

/// Convert dB to a linear magnitude level (16384 = 0 dB).
pub fn db_to_mag(db: f32) -> i32 {
    10.0_f32.powf((db + MAG_REF_DB) / 20.0).round() as i32
}

/// Convert a dB ratio to a linear amplitude factor (no full-scale offset).
pub fn db_to_amp_f(db: f32) -> f32 {
    10.0_f32.powf(db / 10.0)
}

/// Convert a dB ratio to a linear magnitude factor (no full-scale offset).
pub fn db_to_mag_f(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

// Attenuation thresholds: entry k is the smallest level with attenuation k,
// i.e. ceil(10^((ref + 3 - k) / div)). Full scale lands in bucket 3.
const AMP_ATT_LUT: [i32; 36] = [
    32691, 25967, 20627, 16384, 13015, 10338, 8212, 6523, 5182, 4116, 3270,
    2597, 2063, 1639, 1302, 1034, 822, 653, 519, 412, 327, 260, 207, 164,
    131, 104, 83, 66, 52, 42, 33, 26, 21, 17, 14, 11,
];

const MAG_ATT_LUT: [i32; 36] = [
    23144, 20627, 18384, 16384, 14603, 13015, 11599, 10338, 9214, 8212, 7319,
    6523, 5814, 5182, 4618, 4116, 3668, 3270, 2914, 2597, 2315, 2063, 1839,
    1639, 1461, 1302, 1160, 1034, 922, 822, 732, 653, 582, 519, 462, 412,
];

fn level_to_att(level: i32, lut: &[i32; 36]) -> u32 {
    lut.iter()
        .position(|&t| level >= t)
        .unwrap_or(lut.len()) as u32
}

/// Attenuation bucket `[0, 36]` for an amplitude-stream level.
pub fn amp_to_att(a: i16) -> u32 {
    level_to_att(a as i32, &AMP_ATT_LUT)
}

/// Attenuation bucket `[0, 36]` for a magnitude-stream level.
pub fn mag_to_att(m: i16) -> u32 {
    level_to_att(m as i32, &MAG_ATT_LUT)
}
