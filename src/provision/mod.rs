pub mod lock;
pub mod provisioner;
pub mod status;
