pub mod durations;
pub mod segment_crossing;
