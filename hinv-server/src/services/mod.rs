//! Services behind the HTTP layer

pub mod backup;
pub mod images;
pub mod lookup;
