pub mod providers;
pub mod r#trait;
