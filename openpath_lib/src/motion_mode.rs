use serde::{Deserialize, Serialize};

/// Mode predicted by the tracking platform for a sensed section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionMode {
    #[default]
    Unknown,
    Walking,
    Bicycling,
    Bus,
    Train,
    Car,
    AirOrHsr,
    Subway,
    Tram,
    LightRail,
}

impl MotionMode {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MotionMode::Walking,
            2 => MotionMode::Bicycling,
            3 => MotionMode::Bus,
            4 => MotionMode::Train,
            5 => MotionMode::Car,
            6 => MotionMode::AirOrHsr,
            7 => MotionMode::Subway,
            8 => MotionMode::Tram,
            9 => MotionMode::LightRail,
            _ => MotionMode::Unknown,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            MotionMode::Unknown => 0,
            MotionMode::Walking => 1,
            MotionMode::Bicycling => 2,
            MotionMode::Bus => 3,
            MotionMode::Train => 4,
            MotionMode::Car => 5,
            MotionMode::AirOrHsr => 6,
            MotionMode::Subway => 7,
            MotionMode::Tram => 8,
            MotionMode::LightRail => 9,
        }
    }
}

#[test]
fn unknown_codes_fall_back() {
    assert_eq!(MotionMode::from_code(5), MotionMode::Car);
    assert_eq!(MotionMode::from_code(42), MotionMode::Unknown);
    assert_eq!(MotionMode::from_code(MotionMode::LightRail.code()), MotionMode::LightRail);
    assert_eq!(serde_json::to_string(&MotionMode::AirOrHsr).unwrap(), "\"AIR_OR_HSR\"");
}
