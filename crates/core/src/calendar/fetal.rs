//! Typical fetal size by gestational week.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetalSize {
    pub week: u32,
    /// Everyday object of about the same size.
    pub comparison: &'static str,
    /// Crown-rump length up to week 19, crown-heel length afterwards.
    pub length_cm: f32,
    pub weight_g: f32,
}

const fn size(week: u32, comparison: &'static str, length_cm: f32, weight_g: f32) -> FetalSize {
    FetalSize {
        week,
        comparison,
        length_cm,
        weight_g,
    }
}

pub const FIRST_TABLE_WEEK: u32 = 4;
pub const LAST_TABLE_WEEK: u32 = 40;

static FETAL_SIZES: [FetalSize; 37] = [
    size(4, "poppy seed", 0.1, 0.0),
    size(5, "sesame seed", 0.2, 0.0),
    size(6, "lentil", 0.6, 0.0),
    size(7, "blueberry", 1.3, 0.0),
    size(8, "raspberry", 1.6, 1.0),
    size(9, "grape", 2.3, 2.0),
    size(10, "kumquat", 3.1, 4.0),
    size(11, "fig", 4.1, 7.0),
    size(12, "lime", 5.4, 14.0),
    size(13, "lemon", 7.4, 23.0),
    size(14, "nectarine", 8.7, 43.0),
    size(15, "apple", 10.1, 70.0),
    size(16, "avocado", 11.6, 100.0),
    size(17, "pear", 13.0, 140.0),
    size(18, "bell pepper", 14.2, 190.0),
    size(19, "mango", 15.3, 240.0),
    size(20, "banana", 25.6, 300.0),
    size(21, "carrot", 26.7, 360.0),
    size(22, "papaya", 27.8, 430.0),
    size(23, "grapefruit", 28.9, 501.0),
    size(24, "cantaloupe", 30.0, 600.0),
    size(25, "cauliflower", 34.6, 660.0),
    size(26, "lettuce", 35.6, 760.0),
    size(27, "rutabaga", 36.6, 875.0),
    size(28, "eggplant", 37.6, 1005.0),
    size(29, "butternut squash", 38.6, 1153.0),
    size(30, "cabbage", 39.9, 1319.0),
    size(31, "coconut", 41.1, 1502.0),
    size(32, "jicama", 42.4, 1702.0),
    size(33, "pineapple", 43.7, 1918.0),
    size(34, "large cantaloupe", 45.0, 2146.0),
    size(35, "honeydew melon", 46.2, 2383.0),
    size(36, "romaine lettuce", 47.4, 2622.0),
    size(37, "swiss chard", 48.6, 2859.0),
    size(38, "leek", 49.8, 3083.0),
    size(39, "watermelon", 50.7, 3288.0),
    size(40, "pumpkin", 51.2, 3462.0),
];

/// Table entry for `week`, `None` outside weeks 4 to 40.
pub fn fetal_size_for_week(week: u32) -> Option<&'static FetalSize> {
    if !(FIRST_TABLE_WEEK..=LAST_TABLE_WEEK).contains(&week) {
        return None;
    }
    FETAL_SIZES.get((week - FIRST_TABLE_WEEK) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_contiguous_and_growing() {
        for (offset, entry) in FETAL_SIZES.iter().enumerate() {
            assert_eq!(entry.week, FIRST_TABLE_WEEK + offset as u32);
        }
        assert!(FETAL_SIZES
            .windows(2)
            .all(|pair| pair[1].length_cm > pair[0].length_cm && pair[1].weight_g >= pair[0].weight_g));
    }

    #[test]
    fn lookup_bounds() {
        assert_eq!(fetal_size_for_week(3), None);
        assert_eq!(fetal_size_for_week(4).map(|s| s.comparison), Some("poppy seed"));
        assert_eq!(fetal_size_for_week(20).map(|s| s.comparison), Some("banana"));
        assert_eq!(fetal_size_for_week(40).map(|s| s.weight_g), Some(3462.0));
        assert_eq!(fetal_size_for_week(41), None);
    }
}
