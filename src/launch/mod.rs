pub mod capabilities;
pub mod launcher;
